#![allow(unknown_lints)]
#![deny(rustdoc::broken_intra_doc_links, rustdoc::invalid_html_tags)]
//! This crate reads the memory mapping table of a linux process, the `/proc/<pid>/maps` file,
//! and turns it into a list of typed records.
//!
//! All of the data structures and the parsing live in the `procmaps-core` crate, which is
//! re-exported here.  This crate adds the part that actually opens the file.
//!
//! # Examples
//!
//! List every file mapped into the current process:
//!
//! ```rust
//! use procmaps::{MapsSource, MappingKind};
//!
//! let maps = procmaps::parse(MapsSource::Myself).unwrap();
//! let mut cursor = maps.cursor();
//! while let Some(map) = cursor.advance() {
//!     if map.kind == MappingKind::File {
//!         println!("{:#x}-{:#x} {}", map.address_start, map.address_end, map.backing_path);
//!     }
//! }
//! maps.release();
//! ```
//!
//! # Device numbers
//!
//! The kernel writes the `major:minor` column in hexadecimal (`fd:01` on LVM or device-mapper
//! systems), so everything in this crate that reads a live maps file uses
//! [`ParseOptions::kernel()`] unless told otherwise.  The parsers in `procmaps-core`, used on
//! their own, read that column as decimal.
//!
//! # Cargo features
//!
//! * `serde1` -- Optional.  Derives `Serialize` and `Deserialize` for the data types.
//! * `backtrace` -- Optional.  Captures a stack trace whenever a [`MalformedLine`] is raised.

pub use procmaps_core::*;

use log::debug;
use rustix::fs::{Mode, OFlags};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

const DEFAULT_ROOT: &str = "/proc";

/// A wrapper around a `File` that remembers the name of the path
struct FileWrapper {
    inner: File,
    path: PathBuf,
}

impl FileWrapper {
    /// Opens `path` read-only (and close-on-exec).
    ///
    /// Any failure here is a [`MapsError::SourceUnavailable`].
    fn open<P: AsRef<Path>>(path: P) -> MapsResult<FileWrapper> {
        let p = path.as_ref();
        let fd = rustix::fs::open(p, OFlags::RDONLY | OFlags::CLOEXEC, Mode::empty())
            .map_err(|e| MapsError::SourceUnavailable(e.into(), Some(p.to_owned())))?;
        Ok(FileWrapper {
            inner: File::from(fd),
            path: p.to_owned(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for FileWrapper {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Which process's maps to read.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MapsSource {
    /// The calling process, through the `/proc/self` symlink
    Myself,
    /// The process with this PID
    Pid(i32),
}

impl From<i32> for MapsSource {
    /// A negative PID means the calling process.
    fn from(pid: i32) -> Self {
        if pid < 0 {
            MapsSource::Myself
        } else {
            MapsSource::Pid(pid)
        }
    }
}

impl MapsSource {
    fn dir_name(&self) -> String {
        match self {
            MapsSource::Myself => "self".to_owned(),
            MapsSource::Pid(pid) => pid.to_string(),
        }
    }
}

/// Reads maps files, with a configurable procfs location and [`ParseOptions`].
///
/// In case you have procfs filesystem mounted to a location other than `/proc`, use
/// [`MapsReader::with_root()`].  The options default to [`ParseOptions::kernel()`], matching
/// what the kernel writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapsReader {
    root: PathBuf,
    options: ParseOptions,
}

impl Default for MapsReader {
    fn default() -> Self {
        MapsReader::with_root(DEFAULT_ROOT)
    }
}

impl MapsReader {
    pub fn new() -> MapsReader {
        MapsReader::default()
    }

    /// Reads from a procfs mounted at `root` instead of `/proc`
    pub fn with_root<P: Into<PathBuf>>(root: P) -> MapsReader {
        MapsReader {
            root: root.into(),
            options: ParseOptions::kernel(),
        }
    }

    pub fn options(mut self, options: ParseOptions) -> MapsReader {
        self.options = options;
        self
    }

    /// The maps file that [`MapsReader::read`] would open for `source`
    pub fn path_for(&self, source: MapsSource) -> PathBuf {
        self.root.join(source.dir_name()).join("maps")
    }

    /// Reads and parses the maps of `source`.
    ///
    /// The file is closed before this returns, whether or not parsing succeeded.
    pub fn read(&self, source: MapsSource) -> MapsResult<RegionList> {
        let path = self.path_for(source);
        debug!("Reading memory mappings from {}", path.display());
        let file = FileWrapper::open(&path)?;
        let path = file.path().to_owned();
        RegionList::from_buf_read_with(BufReader::new(file), &self.options).map_err(|e| e.error_path(&path))
    }
}

/// Parses the memory mappings of `source` from `/proc`, with [`ParseOptions::kernel()`].
///
/// `source` can be a [`MapsSource`] or a PID (where any negative PID means the calling process).
pub fn parse<S: Into<MapsSource>>(source: S) -> MapsResult<RegionList> {
    MapsReader::new().read(source.into())
}

/// Like [`parse`], with the given options.
pub fn parse_with<S: Into<MapsSource>>(source: S, options: &ParseOptions) -> MapsResult<RegionList> {
    MapsReader::new().options(options.clone()).read(source.into())
}
