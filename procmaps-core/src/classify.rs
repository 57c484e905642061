#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Marker the kernel appends to the path of a mapped file that has since been unlinked.
pub const DELETED_SUFFIX: &str = "(deleted)";

const ANON_PREFIX: &str = "[anon:";
const ANON_SHMEM_PREFIX: &str = "[anon_shmem:";

/// What kind of memory backs a mapping, as told by its path column.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MappingKind {
    /// A mapped file
    File,
    /// The initial process's (also known as the main thread's) stack.
    ProcessStack,
    /// A thread's stack, `[stack:<tid>]`.
    ///
    /// (Linux 3.4 to 4.4 only)
    ThreadStack,
    /// The virtual dynamically linked shared object.
    Vdso,
    /// Shared kernel variables
    Vvar,
    /// obsolete virtual syscalls, succeeded by vdso
    Vsyscall,
    /// The process's heap.
    Heap,
    /// A named private anonymous mapping, `[anon:<name>]`.
    ///
    /// (since Linux 5.17)
    AnonPrivate,
    /// A named shared anonymous mapping, `[anon_shmem:<name>]`.
    ///
    /// (since Linux 6.2)
    AnonShared,
    /// An unnamed anonymous mapping as obtained via mmap(2).
    AnonAnonymous,
    /// Some other pseudo-path
    Other,
}

/// The outcome of classifying a backing path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: MappingKind,
    /// Only set for [`MappingKind::AnonPrivate`] and [`MappingKind::AnonShared`]
    pub anon_name: Option<String>,
    /// Only ever true for [`MappingKind::File`]
    pub file_deleted: bool,
}

impl Classification {
    fn of(kind: MappingKind) -> Classification {
        Classification {
            kind,
            anon_name: None,
            file_deleted: false,
        }
    }

    fn anon(kind: MappingKind, rest: &str, max_len: usize) -> Classification {
        // no closing bracket means the name runs to the end of the path
        let name = rest.split(']').next().unwrap_or(rest);
        Classification {
            kind,
            anon_name: Some(truncate_to_boundary(name, max_len).to_owned()),
            file_deleted: false,
        }
    }
}

/// Works out what kind of mapping `path` names.
///
/// The checks run in a fixed order and the first match wins.  This never fails: a bracketed
/// tag that isn't recognized is [`MappingKind::Other`], and anything not bracketed is a file.
pub fn classify(path: &str, anon_name_max_len: usize) -> Classification {
    if path.is_empty() {
        Classification::of(MappingKind::AnonAnonymous)
    } else if path == "[stack]" {
        Classification::of(MappingKind::ProcessStack)
    } else if path.starts_with("[stack:") {
        Classification::of(MappingKind::ThreadStack)
    } else if path.starts_with("[vdso]") {
        Classification::of(MappingKind::Vdso)
    } else if path.starts_with("[heap]") {
        Classification::of(MappingKind::Heap)
    } else if let Some(rest) = path.strip_prefix(ANON_PREFIX) {
        Classification::anon(MappingKind::AnonPrivate, rest, anon_name_max_len)
    } else if let Some(rest) = path.strip_prefix(ANON_SHMEM_PREFIX) {
        Classification::anon(MappingKind::AnonShared, rest, anon_name_max_len)
    } else if path.starts_with("[vvar]") {
        Classification::of(MappingKind::Vvar)
    } else if path.starts_with("[vsyscall]") {
        Classification::of(MappingKind::Vsyscall)
    } else if path.starts_with('[') {
        Classification::of(MappingKind::Other)
    } else {
        Classification {
            kind: MappingKind::File,
            anon_name: None,
            file_deleted: path.ends_with(DELETED_SUFFIX),
        }
    }
}

/// The longest prefix of `s` that is at most `max` bytes and ends on a char boundary.
pub(crate) fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ANON_NAME_MAX_LEN;

    fn kind(path: &str) -> MappingKind {
        classify(path, ANON_NAME_MAX_LEN).kind
    }

    #[test]
    fn test_classify_kinds() {
        assert_eq!(kind(""), MappingKind::AnonAnonymous);
        assert_eq!(kind("[stack]"), MappingKind::ProcessStack);
        assert_eq!(kind("[stack:154]"), MappingKind::ThreadStack);
        assert_eq!(kind("[vdso]"), MappingKind::Vdso);
        assert_eq!(kind("[vvar]"), MappingKind::Vvar);
        assert_eq!(kind("[vvar_vclock]"), MappingKind::Other);
        assert_eq!(kind("[vsyscall]"), MappingKind::Vsyscall);
        assert_eq!(kind("[heap]"), MappingKind::Heap);
        assert_eq!(kind("[anon:foo]"), MappingKind::AnonPrivate);
        assert_eq!(kind("[anon_shmem:bar]"), MappingKind::AnonShared);
        assert_eq!(kind("[foo]"), MappingKind::Other);
        assert_eq!(kind("[uprobes]"), MappingKind::Other);
        assert_eq!(kind("/lib/libfoo.so"), MappingKind::File);
        assert_eq!(kind("anon_inode:[perf_event]"), MappingKind::File);
    }

    #[test]
    fn test_classify_stack_is_exact() {
        // only the exact tag is the process stack, anything longer is some other tag
        assert_eq!(kind("[stack] "), MappingKind::Other);
        assert_eq!(kind("[stackguard]"), MappingKind::Other);
    }

    #[test]
    fn test_anon_names() {
        let c = classify("[anon:java heap]", ANON_NAME_MAX_LEN);
        assert_eq!(c.kind, MappingKind::AnonPrivate);
        assert_eq!(c.anon_name.as_deref(), Some("java heap"));
        assert!(!c.file_deleted);

        let c = classify("[anon_shmem:shared]", ANON_NAME_MAX_LEN);
        assert_eq!(c.kind, MappingKind::AnonShared);
        assert_eq!(c.anon_name.as_deref(), Some("shared"));

        let c = classify("[anon:]", ANON_NAME_MAX_LEN);
        assert_eq!(c.anon_name.as_deref(), Some(""));

        let c = classify("[anon:unterminated", ANON_NAME_MAX_LEN);
        assert_eq!(c.anon_name.as_deref(), Some("unterminated"));

        assert_eq!(classify("[heap]", ANON_NAME_MAX_LEN).anon_name, None);
        assert_eq!(classify("", ANON_NAME_MAX_LEN).anon_name, None);
    }

    #[test]
    fn test_anon_name_truncation() {
        let long = "x".repeat(200);
        let c = classify(&format!("[anon:{}]", long), ANON_NAME_MAX_LEN);
        assert_eq!(c.anon_name.unwrap().len(), ANON_NAME_MAX_LEN);

        let c = classify("[anon:abcdef]", 3);
        assert_eq!(c.anon_name.as_deref(), Some("abc"));

        // a multi-byte character straddling the limit is dropped entirely
        let c = classify("[anon:aé]", 2);
        assert_eq!(c.anon_name.as_deref(), Some("a"));

        let c = classify("[anon:abc]", 0);
        assert_eq!(c.anon_name.as_deref(), Some(""));
    }

    #[test]
    fn test_deleted() {
        let c = classify("/lib/x.so (deleted)", ANON_NAME_MAX_LEN);
        assert_eq!(c.kind, MappingKind::File);
        assert!(c.file_deleted);

        assert!(!classify("/lib/x.so", ANON_NAME_MAX_LEN).file_deleted);
        // shorter than the suffix itself
        assert!(!classify("/a", ANON_NAME_MAX_LEN).file_deleted);
        assert!(!classify("x", ANON_NAME_MAX_LEN).file_deleted);
        assert!(classify("(deleted)", ANON_NAME_MAX_LEN).file_deleted);
        // only files are ever deleted
        assert!(!classify("[foo] (deleted)", ANON_NAME_MAX_LEN).file_deleted);
    }
}
