#![allow(unknown_lints)]
#![deny(rustdoc::broken_intra_doc_links, rustdoc::invalid_html_tags)]
//! This crate provides the data structures and parsing for the linux `/proc/<pid>/maps` file,
//! which lists the virtual memory areas mapped into a process.
//!
//! This crate doesn't touch the filesystem.  It parses anything that implements
//! [`std::io::Read`] (or [`std::io::BufRead`]), or any iterator of raw lines.  If you want to
//! read the maps of a live process, see the `procmaps` crate, which re-exports everything here.
//!
//! # Format
//!
//! Each line of a maps file describes one mapping:
//!
//! ```text
//! 7f2c4a1e4000-7f2c4a20a000 r-xp 00000000 08:01 1050645    /usr/lib/ld-linux-x86-64.so.2
//! ```
//!
//! The fields are the address range, the permissions, the offset into the backing object, the
//! device (`major:minor`), the inode, and finally the path of the backing object (which may be
//! empty, or may be a pseudo-path like `[heap]`).
//!
//! # Examples
//!
//! ```rust
//! use procmaps_core::{FromRead, MappingKind, RegionList};
//!
//! let data = "55d0c4e4a000-55d0c4e6b000 rw-p 00000000 00:00 0 \t[heap]\n\
//!             7ffd1b9e2000-7ffd1ba03000 rw-p 00000000 00:00 0 \t[stack]\n";
//! let maps = RegionList::from_read(data.as_bytes()).unwrap();
//!
//! let mut cursor = maps.cursor();
//! assert_eq!(cursor.advance().unwrap().kind, MappingKind::Heap);
//! assert_eq!(cursor.advance().unwrap().kind, MappingKind::ProcessStack);
//! assert!(cursor.advance().is_none());
//! ```
//!
//! # Cargo features
//!
//! * `serde1` -- Optional.  Derives `Serialize` and `Deserialize` for the data types.
//! * `backtrace` -- Optional.  Captures a stack trace whenever a [`MalformedLine`] is raised.

use std::collections::TryReserveError;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

macro_rules! build_malformed {
    ($err: expr) => {
        crate::MapsError::MalformedLine(crate::MalformedLine::new(format!("{}", $err), file!(), line!()))
    };
    ($err: expr, $msg: expr) => {
        crate::MapsError::MalformedLine(crate::MalformedLine::new(
            format!("{}: {}", $msg, $err),
            file!(),
            line!(),
        ))
    };
}

macro_rules! expect {
    ($e:expr) => {
        match crate::IntoResult::into($e) {
            Ok(v) => v,
            Err(e) => return Err(build_malformed!(e)),
        }
    };
    ($e:expr, $msg:expr) => {
        match crate::IntoResult::into($e) {
            Ok(v) => v,
            Err(e) => return Err(build_malformed!(e, $msg)),
        }
    };
}

macro_rules! from_str {
    ($t:tt, $e:expr) => {{
        let e = $e;
        crate::decode::ensure_digits(e, 10, stringify!($t))?;
        expect!(
            $t::from_str_radix(e, 10),
            format!("Failed to parse {:?} as a {}", e, stringify!($t))
        )
    }};
    ($t:tt, $e:expr, $radix:expr) => {{
        let e = $e;
        let radix = $radix;
        crate::decode::ensure_digits(e, radix, stringify!($t))?;
        expect!(
            $t::from_str_radix(e, radix),
            format!("Failed to parse {:?} as a base-{} {}", e, radix, stringify!($t))
        )
    }};
}

mod extract;
pub use extract::*;

mod decode;
pub use decode::*;

mod classify;
pub use classify::*;

mod options;
pub use options::*;

mod record;
pub use record::*;

mod region;
pub use region::*;

/// A value that was expected but absent
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NoneError;

impl fmt::Display for NoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value was missing")
    }
}

pub(crate) trait IntoResult<T, E> {
    fn into(t: Self) -> Result<T, E>;
}

impl<T> IntoResult<T, NoneError> for Option<T> {
    fn into(t: Option<T>) -> Result<T, NoneError> {
        t.ok_or(NoneError)
    }
}

impl<T, E> IntoResult<T, E> for Result<T, E> {
    fn into(t: Result<T, E>) -> Result<T, E> {
        t
    }
}

/// A type that can be parsed from anything implementing [`Read`].
///
/// Any [`FromBufRead`] type gets this for free (the reader gets wrapped in a [`BufReader`]).
pub trait FromRead: Sized {
    /// Read the type from a Read.
    fn from_read<R: Read>(r: R) -> MapsResult<Self>;

    /// Read the type from a file.
    ///
    /// Failing to open the file is reported as [`MapsError::SourceUnavailable`].  Any error
    /// raised while parsing will have `path` attached to it.
    fn from_file<P: AsRef<Path>>(path: P) -> MapsResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| MapsError::SourceUnavailable(e, Some(path.to_owned())))?;
        Self::from_read(file).map_err(|e| e.error_path(path))
    }
}

/// A type that can be parsed from anything implementing [`BufRead`].
pub trait FromBufRead: Sized {
    fn from_buf_read<R: BufRead>(r: R) -> MapsResult<Self>;
}

impl<T: FromBufRead> FromRead for T {
    fn from_read<R: Read>(r: R) -> MapsResult<Self> {
        T::from_buf_read(BufReader::new(r))
    }
}

/// Details about a line that could not be parsed.
///
/// `file` and `line` point at the check inside this crate that rejected the input, which makes
/// it much easier to track down kernel output this crate doesn't understand yet.
#[derive(Debug)]
pub struct MalformedLine {
    /// What was wrong with the line
    pub msg: String,
    /// The 1-based number of the offending line, if it was read from a multi-line source
    pub line_number: Option<usize>,
    /// The offending line, without its terminator
    pub content: Option<String>,
    /// The path of the maps file, if known
    pub path: Option<PathBuf>,
    pub file: &'static str,
    pub line: u32,
    #[cfg(feature = "backtrace")]
    pub backtrace: backtrace::Backtrace,
}

impl MalformedLine {
    #[doc(hidden)]
    pub fn new(msg: String, file: &'static str, line: u32) -> MalformedLine {
        MalformedLine {
            msg,
            line_number: None,
            content: None,
            path: None,
            file,
            line,
            #[cfg(feature = "backtrace")]
            backtrace: backtrace::Backtrace::new(),
        }
    }

    /// Attaches the position and text of the offending line
    pub(crate) fn at(mut self, line_number: usize, content: &str) -> MalformedLine {
        self.line_number = Some(line_number);
        self.content = Some(content.trim_end_matches('\n').to_owned());
        self
    }
}

impl fmt::Display for MalformedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed maps line")?;
        if let Some(path) = &self.path {
            write!(f, " in {}", path.display())?;
        }
        if let Some(n) = self.line_number {
            write!(f, " at line {}", n)?;
        }
        write!(f, ": {}", self.msg)?;
        if let Some(content) = &self.content {
            write!(f, " ({:?})", content)?;
        }
        Ok(())
    }
}

/// The various error conditions in the procmaps crate.
///
/// Any error means that no usable [`RegionList`] was produced.
#[derive(Debug)]
pub enum MapsError {
    /// The maps source could not be opened or accessed.
    ///
    /// This is the case if the process doesn't exist, or if you don't have permission to read
    /// its maps.  The path is included when known.
    SourceUnavailable(io::Error, Option<PathBuf>),
    /// An I/O error occurred in the middle of reading the maps source.
    ///
    /// A normal end of input is never reported this way.
    SourceReadFailure(io::Error, Option<PathBuf>),
    /// Storage for a record could not be allocated.
    AllocationFailure(TryReserveError),
    /// A line doesn't match the expected layout.
    MalformedLine(MalformedLine),
}

impl MapsError {
    /// Attaches `path` to this error, if it doesn't already carry one.
    pub fn error_path(mut self, path: &Path) -> MapsError {
        match &mut self {
            MapsError::SourceUnavailable(_, p) | MapsError::SourceReadFailure(_, p) => {
                if p.is_none() {
                    *p = Some(path.to_owned());
                }
            }
            MapsError::MalformedLine(m) => {
                if m.path.is_none() {
                    m.path = Some(path.to_owned());
                }
            }
            MapsError::AllocationFailure(_) => {}
        }
        self
    }

    /// The path associated with this error, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            MapsError::SourceUnavailable(_, p) | MapsError::SourceReadFailure(_, p) => p.as_deref(),
            MapsError::MalformedLine(m) => m.path.as_deref(),
            MapsError::AllocationFailure(_) => None,
        }
    }

    /// Is this a [`MapsError::SourceUnavailable`] caused by a missing file?
    pub fn is_not_found(&self) -> bool {
        matches!(self, MapsError::SourceUnavailable(e, _) if e.kind() == io::ErrorKind::NotFound)
    }

    /// Is this a [`MapsError::SourceUnavailable`] caused by missing permissions?
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, MapsError::SourceUnavailable(e, _) if e.kind() == io::ErrorKind::PermissionDenied)
    }
}

impl fmt::Display for MapsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapsError::SourceUnavailable(e, Some(p)) => write!(f, "Unable to open {}: {}", p.display(), e),
            MapsError::SourceUnavailable(e, None) => write!(f, "Unable to open maps source: {}", e),
            MapsError::SourceReadFailure(e, Some(p)) => write!(f, "Error reading {}: {}", p.display(), e),
            MapsError::SourceReadFailure(e, None) => write!(f, "Error reading maps source: {}", e),
            MapsError::AllocationFailure(e) => write!(f, "Unable to allocate a memory map record: {}", e),
            MapsError::MalformedLine(m) => write!(f, "{}", m),
        }
    }
}

impl std::error::Error for MapsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapsError::SourceUnavailable(e, _) | MapsError::SourceReadFailure(e, _) => Some(e),
            MapsError::AllocationFailure(e) => Some(e),
            MapsError::MalformedLine(_) => None,
        }
    }
}

impl From<io::Error> for MapsError {
    fn from(io: io::Error) -> Self {
        MapsError::SourceReadFailure(io, None)
    }
}

impl From<TryReserveError> for MapsError {
    fn from(e: TryReserveError) -> Self {
        MapsError::AllocationFailure(e)
    }
}

impl From<MalformedLine> for MapsError {
    fn from(m: MalformedLine) -> Self {
        MapsError::MalformedLine(m)
    }
}

/// The result type of procmaps operations
pub type MapsResult<T> = Result<T, MapsError>;

/// A device number, as `(major, minor)`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Device {
    pub major: u32,
    pub minor: u32,
}
