#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// The maximum length (in bytes) of an anonymous mapping name.
///
/// Longer names, as set with `prctl(PR_SET_VMA_ANON_NAME)`, are truncated to this length.
pub const ANON_NAME_MAX_LEN: usize = 80;

/// The radix the `major:minor` device column is written in.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum DeviceRadix {
    /// Base 10
    #[default]
    Decimal,
    /// Base 16.  This is what the linux kernel writes (`%02x:%02x`), so a device like
    /// `fd:01` can only be read in this mode.
    Hexadecimal,
}

impl DeviceRadix {
    pub fn radix(self) -> u32 {
        match self {
            DeviceRadix::Decimal => 10,
            DeviceRadix::Hexadecimal => 16,
        }
    }
}

/// Knobs for how maps lines get decoded.
///
/// ```rust
/// use procmaps_core::{DeviceRadix, ParseOptions};
///
/// let options = ParseOptions::new().with_anon_name_max_len(16);
/// assert_eq!(options.device_radix, DeviceRadix::Decimal);
/// assert_eq!(ParseOptions::kernel().device_radix, DeviceRadix::Hexadecimal);
/// ```
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseOptions {
    /// Names of anonymous mappings are truncated to this many bytes
    pub anon_name_max_len: usize,
    /// How to read the device column
    pub device_radix: DeviceRadix,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            anon_name_max_len: ANON_NAME_MAX_LEN,
            device_radix: DeviceRadix::Decimal,
        }
    }
}

impl ParseOptions {
    pub fn new() -> ParseOptions {
        ParseOptions::default()
    }

    /// Options matching the exact output of the running kernel (hexadecimal device numbers).
    pub fn kernel() -> ParseOptions {
        ParseOptions::default().with_device_radix(DeviceRadix::Hexadecimal)
    }

    pub fn with_anon_name_max_len(mut self, len: usize) -> ParseOptions {
        self.anon_name_max_len = len;
        self
    }

    pub fn with_device_radix(mut self, radix: DeviceRadix) -> ParseOptions {
        self.device_radix = radix;
        self
    }
}
