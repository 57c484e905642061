use std::str::FromStr;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::{
    classify, Device, DecodedFields, MMPermissions, MapsError, MapsResult, MappingKind, ParseOptions, RawFields,
    DELETED_SUFFIX,
};

/// One entry of a `/proc/<pid>/maps` file: a contiguous virtual memory area.
///
/// Records are only ever built by parsing a line, see [`MappingRecord::from_line`] or
/// [`RegionList`](crate::RegionList).
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingRecord {
    /// First address of the mapping
    pub address_start: u64,
    /// One past the last address of the mapping
    pub address_end: u64,
    /// `address_end - address_start`, always greater than zero
    pub length: u64,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    /// Private (copy-on-write) if true, shared otherwise
    pub is_private: bool,
    /// The offset into the file/whatever
    pub offset: u64,
    pub device_major: u32,
    pub device_minor: u32,
    /// The inode on that device
    ///
    /// 0 indicates that no inode is associated with the memory region, as would be the case with
    /// BSS (uninitialized data).
    pub inode: u64,
    /// The path column, verbatim.  Empty for anonymous memory.
    pub backing_path: String,
    pub kind: MappingKind,
    /// The name of a named anonymous mapping, truncated to
    /// [`ParseOptions::anon_name_max_len`] bytes
    pub anon_name: Option<String>,
    /// Whether the backing file was unlinked after being mapped
    pub file_deleted: bool,
}

impl MappingRecord {
    /// Parses a single maps line with the default [`ParseOptions`].
    ///
    /// A trailing `\n` is optional.
    pub fn from_line(line: &str) -> MapsResult<MappingRecord> {
        MappingRecord::from_line_with(line, &ParseOptions::default())
    }

    pub fn from_line_with(line: &str, options: &ParseOptions) -> MapsResult<MappingRecord> {
        let fields = DecodedFields::decode(RawFields::split(line)?, options)?;
        let class = classify(fields.path, options.anon_name_max_len);

        let mut backing_path = String::new();
        backing_path.try_reserve_exact(fields.path.len())?;
        backing_path.push_str(fields.path);

        Ok(MappingRecord {
            address_start: fields.address_start,
            address_end: fields.address_end,
            length: fields.address_end - fields.address_start,
            readable: fields.perms.contains(MMPermissions::READ),
            writable: fields.perms.contains(MMPermissions::WRITE),
            executable: fields.perms.contains(MMPermissions::EXECUTE),
            is_private: fields.perms.contains(MMPermissions::PRIVATE),
            offset: fields.offset,
            device_major: fields.device_major,
            device_minor: fields.device_minor,
            inode: fields.inode,
            backing_path,
            kind: class.kind,
            anon_name: class.anon_name,
            file_deleted: class.file_deleted,
        })
    }

    /// The address range, as `(start, end)`
    pub fn address(&self) -> (u64, u64) {
        (self.address_start, self.address_end)
    }

    pub fn perms(&self) -> MMPermissions {
        let mut perms = MMPermissions::NONE;
        perms.set(MMPermissions::READ, self.readable);
        perms.set(MMPermissions::WRITE, self.writable);
        perms.set(MMPermissions::EXECUTE, self.executable);
        if self.is_private {
            perms | MMPermissions::PRIVATE
        } else {
            perms | MMPermissions::SHARED
        }
    }

    pub fn dev(&self) -> Device {
        Device {
            major: self.device_major,
            minor: self.device_minor,
        }
    }

    /// Does this mapping cover `addr`?
    pub fn contains(&self, addr: u64) -> bool {
        self.address_start <= addr && addr < self.address_end
    }

    /// True for any mapping not backed by a file or a special kernel region
    pub fn is_anonymous(&self) -> bool {
        matches!(
            self.kind,
            MappingKind::AnonPrivate | MappingKind::AnonShared | MappingKind::AnonAnonymous
        )
    }

    /// The thread ID of a [`MappingKind::ThreadStack`] mapping.
    ///
    /// This corresponds to the `/proc/<pid>/task/<tid>/` path.
    pub fn stack_tid(&self) -> Option<u32> {
        if self.kind != MappingKind::ThreadStack {
            return None;
        }
        self.backing_path
            .strip_prefix("[stack:")
            .and_then(|s| s.strip_suffix(']'))
            .and_then(|tid| tid.parse().ok())
    }

    /// The text inside the brackets of a pseudo-path like `[vdso]` or `[anon:foo]`.
    pub fn pseudo_name(&self) -> Option<&str> {
        match self.kind {
            MappingKind::File | MappingKind::AnonAnonymous => None,
            _ => {
                let inner = self.backing_path.strip_prefix('[')?;
                Some(inner.find(']').map_or(inner, |idx| &inner[..idx]))
            }
        }
    }

    /// For a file mapping, the path of the file without the `(deleted)` marker.
    pub fn file_path(&self) -> Option<&str> {
        if self.kind != MappingKind::File {
            return None;
        }
        match self.backing_path.strip_suffix(DELETED_SUFFIX) {
            Some(path) if self.file_deleted => Some(path.strip_suffix(' ').unwrap_or(path)),
            _ => Some(&self.backing_path),
        }
    }
}

impl FromStr for MappingRecord {
    type Err = MapsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MappingRecord::from_line(s)
    }
}
