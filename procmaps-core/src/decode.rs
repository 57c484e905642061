use std::fmt;
use std::num::ParseIntError;

use bitflags::bitflags;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::{MapsResult, ParseOptions, RawFields};

pub(crate) trait FromStrRadix: Sized {
    fn from_str_radix(t: &str, radix: u32) -> Result<Self, ParseIntError>;
}

impl FromStrRadix for u64 {
    fn from_str_radix(s: &str, radix: u32) -> Result<u64, ParseIntError> {
        u64::from_str_radix(s, radix)
    }
}

impl FromStrRadix for u32 {
    fn from_str_radix(s: &str, radix: u32) -> Result<u32, ParseIntError> {
        u32::from_str_radix(s, radix)
    }
}

/// Rejects anything that isn't a non-empty run of digits in `radix`.
///
/// `from_str_radix` on its own would also accept a leading `+`.
pub(crate) fn ensure_digits(s: &str, radix: u32, what: &str) -> MapsResult<()> {
    if s.is_empty() {
        return Err(build_malformed!(format!("Expected a {}, found an empty field", what)));
    }
    if let Some(c) = s.chars().find(|c| !c.is_digit(radix)) {
        return Err(build_malformed!(format!(
            "Failed to parse {:?} as a base-{} {} (unexpected {:?})",
            s, radix, what, c
        )));
    }
    Ok(())
}

fn split_into_num<T: FromStrRadix>(s: &str, sep: char, radix: u32) -> MapsResult<(T, T)> {
    let mut parts = s.splitn(2, sep);
    let a = expect!(parts.next(), format!("Missing first half of {:?}", s));
    let b = expect!(parts.next(), format!("Missing {:?} in {:?}", sep, s));
    ensure_digits(a, radix, "number")?;
    ensure_digits(b, radix, "number")?;
    let a = expect!(FromStrRadix::from_str_radix(a, radix), format!("Failed to parse {:?}", s));
    let b = expect!(FromStrRadix::from_str_radix(b, radix), format!("Failed to parse {:?}", s));
    Ok((a, b))
}

bitflags! {
    /// The permissions of a mapping, as shown in the second column of a maps line.
    ///
    /// Exactly one of `SHARED` and `PRIVATE` is set on a decoded value.
    #[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct MMPermissions: u8 {
        /// No permissions
        const NONE = 0;
        /// Read permission
        const READ = 1 << 0;
        /// Write permission
        const WRITE = 1 << 1;
        /// Execute permission
        const EXECUTE = 1 << 2;
        /// Memory is shared with another process.
        ///
        /// Mutually exclusive with PRIVATE.
        const SHARED = 1 << 3;
        /// Memory is private (and copy-on-write)
        ///
        /// Mutually exclusive with SHARED.
        const PRIVATE = 1 << 4;
    }
}

impl MMPermissions {
    /// Decodes the fixed 4 character permission column, e.g. `r-xp`.
    ///
    /// Every position must hold either its letter or `-`, and the last one must be `p` or `s`.
    pub fn from_token(s: &str) -> MapsResult<MMPermissions> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err(build_malformed!(format!(
                "Permissions {:?} should be exactly 4 characters",
                s
            )));
        }

        let mut perms = MMPermissions::NONE;
        for (&b, (letter, flag)) in bytes[..3].iter().zip([
            (b'r', MMPermissions::READ),
            (b'w', MMPermissions::WRITE),
            (b'x', MMPermissions::EXECUTE),
        ]) {
            if b == letter {
                perms |= flag;
            } else if b != b'-' {
                return Err(build_malformed!(format!(
                    "Unexpected {:?} in permissions {:?}, expected {:?} or '-'",
                    b as char, s, letter as char
                )));
            }
        }

        match bytes[3] {
            b'p' => perms |= MMPermissions::PRIVATE,
            b's' => perms |= MMPermissions::SHARED,
            other => {
                return Err(build_malformed!(format!(
                    "Unexpected {:?} in permissions {:?}, expected 'p' or 's'",
                    other as char, s
                )))
            }
        }

        Ok(perms)
    }
}

impl fmt::Display for MMPermissions {
    /// Writes the permissions back in the `rwxp` form used by the maps file.
    ///
    /// The last column is `s` whenever `SHARED` is set, `p` for `PRIVATE` alone, and `-` when
    /// neither is set.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        let sharing = if self.contains(MMPermissions::SHARED) {
            's'
        } else if self.contains(MMPermissions::PRIVATE) {
            'p'
        } else {
            '-'
        };
        write!(
            f,
            "{}{}{}{}",
            flag(self.contains(MMPermissions::READ), 'r'),
            flag(self.contains(MMPermissions::WRITE), 'w'),
            flag(self.contains(MMPermissions::EXECUTE), 'x'),
            sharing,
        )
    }
}

/// Decodes a base-16 address or offset.
pub fn decode_hex(s: &str) -> MapsResult<u64> {
    Ok(from_str!(u64, s, 16))
}

/// Decodes the `start-end` address pair, which must describe a non-empty range.
pub fn decode_address_range(start: &str, end: &str) -> MapsResult<(u64, u64)> {
    let start = decode_hex(start)?;
    let end = decode_hex(end)?;
    if start >= end {
        return Err(build_malformed!(format!(
            "Start address {:#x} is not below end address {:#x}",
            start, end
        )));
    }
    Ok((start, end))
}

/// Decodes a `major:minor` device pair in the given radix.
pub fn decode_device(s: &str, radix: u32) -> MapsResult<(u32, u32)> {
    split_into_num(s, ':', radix)
}

/// Decodes a base-10 inode number.
pub fn decode_inode(s: &str) -> MapsResult<u64> {
    Ok(from_str!(u64, s))
}

/// The typed values of one maps line, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFields<'a> {
    pub address_start: u64,
    pub address_end: u64,
    pub perms: MMPermissions,
    pub offset: u64,
    pub device_major: u32,
    pub device_minor: u32,
    pub inode: u64,
    /// The backing path, still borrowed from the line
    pub path: &'a str,
}

impl<'a> DecodedFields<'a> {
    pub fn decode(raw: RawFields<'a>, options: &ParseOptions) -> MapsResult<DecodedFields<'a>> {
        let (address_start, address_end) = decode_address_range(raw.address_start, raw.address_end)?;
        let perms = MMPermissions::from_token(raw.perms)?;
        let offset = decode_hex(raw.offset)?;
        let (device_major, device_minor) = decode_device(raw.dev, options.device_radix.radix())?;
        let inode = decode_inode(raw.inode)?;

        Ok(DecodedFields {
            address_start,
            address_end,
            perms,
            offset,
            device_major,
            device_minor,
            inode,
            path: raw.path,
        })
    }
}
