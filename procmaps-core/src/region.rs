use std::io::{self, BufRead};
use std::iter::FusedIterator;

use log::{debug, trace, warn};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::{FromBufRead, MapsError, MapsResult, MappingRecord, ParseOptions};

/// The memory mappings of a process, in the order they appear in its `maps` file.
///
/// The kernel lists mappings in ascending, non-overlapping address order.  This is neither
/// checked nor enforced here; records are kept exactly in the order they were read.
///
/// The list owns its records.  Borrow them through [`RegionList::cursor`] or
/// [`RegionList::iter`], and give them all back at once with [`RegionList::release`].
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionList {
    records: Vec<MappingRecord>,
}

impl RegionList {
    /// Parses maps lines from `r` using the given options.
    ///
    /// Reaching the end of input (even straight away) finishes the parse.  A read error is a
    /// [`MapsError::SourceReadFailure`], and a line that doesn't decode is a
    /// [`MapsError::MalformedLine`].  In both cases everything parsed so far is dropped.
    pub fn from_buf_read_with<R: BufRead>(mut r: R, options: &ParseOptions) -> MapsResult<RegionList> {
        let mut list = RegionList::default();
        let mut buf = Vec::new();
        let mut line_number = 0;

        loop {
            buf.clear();
            // Ok(0) is the end of input, a failed read is an Err
            if r.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_number += 1;
            let line = String::from_utf8_lossy(&buf);
            list.push(parse_line(&line, line_number, options)?)?;
        }

        debug!("Parsed {} memory mappings", list.len());
        Ok(list)
    }

    /// Parses maps lines handed over one at a time.
    ///
    /// The lines may or may not include their terminating `\n`.  An `Err` from the iterator is
    /// reported as [`MapsError::SourceReadFailure`].
    pub fn from_lines<I, S>(lines: I, options: &ParseOptions) -> MapsResult<RegionList>
    where
        I: IntoIterator<Item = io::Result<S>>,
        S: AsRef<str>,
    {
        let mut list = RegionList::default();
        for (idx, line) in lines.into_iter().enumerate() {
            let line = line?;
            list.push(parse_line(line.as_ref(), idx + 1, options)?)?;
        }

        debug!("Parsed {} memory mappings", list.len());
        Ok(list)
    }

    fn push(&mut self, record: MappingRecord) -> MapsResult<()> {
        self.records.try_reserve(1)?;
        self.records.push(record);
        Ok(())
    }

    /// The number of mappings
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The mapping at position `idx`, in file order
    pub fn get(&self, idx: usize) -> Option<&MappingRecord> {
        self.records.get(idx)
    }

    /// Returns a cursor positioned on the first mapping.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor { list: self, pos: 0 }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MappingRecord> {
        self.records.iter()
    }

    /// Finds the mapping that contains `addr`, if any
    pub fn find(&self, addr: u64) -> Option<&MappingRecord> {
        self.records.iter().find(|r| r.contains(addr))
    }

    /// Frees every record along with the text it owns.
    ///
    /// This consumes the list, so nothing can traverse it afterwards.
    pub fn release(self) {
        trace!("Releasing {} memory mappings", self.records.len());
        drop(self.records);
    }
}

fn parse_line(line: &str, line_number: usize, options: &ParseOptions) -> MapsResult<MappingRecord> {
    match MappingRecord::from_line_with(line, options) {
        Ok(record) => {
            trace!(
                "line {}: {:#x}-{:#x} {:?} {:?}",
                line_number,
                record.address_start,
                record.address_end,
                record.kind,
                record.backing_path
            );
            Ok(record)
        }
        Err(MapsError::MalformedLine(m)) => {
            let m = m.at(line_number, line);
            warn!("{}", m);
            Err(MapsError::MalformedLine(m))
        }
        Err(e) => Err(e),
    }
}

impl FromBufRead for RegionList {
    fn from_buf_read<R: BufRead>(r: R) -> MapsResult<Self> {
        RegionList::from_buf_read_with(r, &ParseOptions::default())
    }
}

impl<'a> IntoIterator for &'a RegionList {
    type IntoIter = std::slice::Iter<'a, MappingRecord>;
    type Item = &'a MappingRecord;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for RegionList {
    type IntoIter = std::vec::IntoIter<MappingRecord>;
    type Item = MappingRecord;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Where a [`Cursor`] currently stands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// The next call to [`Cursor::advance`] returns the record at this index
    Active(usize),
    /// Every record has been handed out
    Exhausted,
}

/// A forward-only position in a [`RegionList`].
///
/// The cursor borrows the list, so it can't outlive it.  Once it runs past the last record it
/// stays exhausted.  It is also an [`Iterator`] over the remaining records.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    list: &'a RegionList,
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Returns the current record and moves on to the next one.
    ///
    /// Returns `None` once every record has been returned, however many times it's called.
    pub fn advance(&mut self) -> Option<&'a MappingRecord> {
        let record = self.list.records.get(self.pos)?;
        self.pos += 1;
        Some(record)
    }

    pub fn state(&self) -> CursorState {
        if self.pos < self.list.len() {
            CursorState::Active(self.pos)
        } else {
            CursorState::Exhausted
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.state() == CursorState::Exhausted
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = &'a MappingRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.list.len().saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Cursor<'_> {}

impl FusedIterator for Cursor<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FromRead, MappingKind};

    const MAPS: &str = "55d0c4e2f000-55d0c4e31000 r--p 00000000 08:01 1311226                    /usr/bin/cat
55d0c4e31000-55d0c4e36000 r-xp 00002000 08:01 1311226                    /usr/bin/cat
55d0c4e4a000-55d0c4e6b000 rw-p 00000000 00:00 0                          [heap]
7f2c4a000000-7f2c4a021000 rw-p 00000000 00:00 0                          [anon:libc_malloc]
7f2c4a1c0000-7f2c4a1e2000 r--p 00000000 08:01 1050640                    /usr/lib/libc.so.6 (deleted)
7f2c4a1e2000-7f2c4a1e4000 rw-p 00000000 00:00 0
7ffd1b9e2000-7ffd1ba03000 rw-p 00000000 00:00 0                          [stack]
7ffd1ba3e000-7ffd1ba42000 r--p 00000000 00:00 0                          [vvar]
7ffd1ba42000-7ffd1ba44000 r-xp 00000000 00:00 0                          [vdso]
ffffffffff600000-ffffffffff601000 --xp 00000000 00:00 0                  [vsyscall]
";

    #[test]
    fn test_parse_maps() {
        let maps = RegionList::from_read(MAPS.as_bytes()).unwrap();
        assert_eq!(maps.len(), 10);

        let kinds: Vec<_> = maps.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MappingKind::File,
                MappingKind::File,
                MappingKind::Heap,
                MappingKind::AnonPrivate,
                MappingKind::File,
                MappingKind::AnonAnonymous,
                MappingKind::ProcessStack,
                MappingKind::Vvar,
                MappingKind::Vdso,
                MappingKind::Vsyscall,
            ]
        );

        for r in &maps {
            assert!(r.address_start < r.address_end);
            assert_eq!(r.length, r.address_end - r.address_start);
        }

        assert_eq!(maps.get(1).unwrap().offset, 0x2000);
        assert_eq!(maps.get(3).unwrap().anon_name.as_deref(), Some("libc_malloc"));
        assert!(maps.get(4).unwrap().file_deleted);
        assert_eq!(maps.get(9).unwrap().address_start, 0xffff_ffff_ff60_0000);
        assert!(maps.get(10).is_none());
    }

    #[test]
    fn test_cursor() {
        let maps = RegionList::from_read(MAPS.as_bytes()).unwrap();
        let mut cursor = maps.cursor();
        assert_eq!(cursor.state(), CursorState::Active(0));
        assert_eq!(cursor.len(), 10);

        let mut count = 0;
        while let Some(record) = cursor.advance() {
            assert_eq!(record, maps.get(count).unwrap());
            count += 1;
            if count < maps.len() {
                assert_eq!(cursor.state(), CursorState::Active(count));
            }
        }
        assert_eq!(count, maps.len());
        assert!(cursor.is_exhausted());

        // exhaustion is terminal
        for _ in 0..3 {
            assert!(cursor.advance().is_none());
            assert_eq!(cursor.state(), CursorState::Exhausted);
        }

        // cursors are independent of each other
        assert_eq!(maps.cursor().count(), 10);
    }

    #[test]
    fn test_empty_input() {
        let maps = RegionList::from_read("".as_bytes()).unwrap();
        assert!(maps.is_empty());
        let mut cursor = maps.cursor();
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert!(cursor.advance().is_none());
        maps.release();
    }

    #[test]
    fn test_missing_final_newline() {
        let maps = RegionList::from_read("1000-2000 r--p 00000000 00:00 0 [heap]".as_bytes()).unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps.get(0).unwrap().backing_path, "[heap]");
    }

    #[test]
    fn test_malformed_line_number() {
        let data = "1000-2000 r--p 00000000 00:00 0 [heap]\n\
                    3000 4000 r--p 00000000 00:00 0 [stack]\n\
                    5000-6000 r--p 00000000 00:00 0\n";
        match RegionList::from_read(data.as_bytes()) {
            Err(MapsError::MalformedLine(m)) => {
                assert_eq!(m.line_number, Some(2));
                assert_eq!(m.content.as_deref(), Some("3000 4000 r--p 00000000 00:00 0 [stack]"));
            }
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn test_blank_line_is_malformed() {
        let data = "1000-2000 r--p 00000000 00:00 0 [heap]\n\n";
        assert!(matches!(
            RegionList::from_read(data.as_bytes()),
            Err(MapsError::MalformedLine(_))
        ));
    }

    struct FailingReader {
        data: &'static [u8],
    }

    impl io::Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::Other, "device went away"));
            }
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_read_failure() {
        let r = FailingReader {
            data: b"1000-2000 r--p 00000000 00:00 0 [heap]\n",
        };
        match RegionList::from_read(r) {
            Err(MapsError::SourceReadFailure(e, None)) => assert_eq!(e.kind(), io::ErrorKind::Other),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn test_from_lines() {
        let lines = MAPS.lines().map(Ok::<_, io::Error>);
        let maps = RegionList::from_lines(lines, &ParseOptions::default()).unwrap();
        assert_eq!(maps, RegionList::from_read(MAPS.as_bytes()).unwrap());

        let lines = vec![
            Ok("1000-2000 r--p 00000000 00:00 0 [heap]\n".to_string()),
            Err(io::Error::new(io::ErrorKind::Other, "interrupted")),
        ];
        assert!(matches!(
            RegionList::from_lines(lines, &ParseOptions::default()),
            Err(MapsError::SourceReadFailure(..))
        ));

        let lines = vec![Ok("1000-2000 r--p 00000000 00:00 0 [heap]"), Ok("1000 2000 r--p")];
        match RegionList::from_lines(lines, &ParseOptions::default()) {
            Err(MapsError::MalformedLine(m)) => assert_eq!(m.line_number, Some(2)),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn test_non_utf8_path() {
        let mut data = b"1000-2000 r--p 00000000 08:01 12 /tmp/".to_vec();
        data.extend_from_slice(&[0xff, 0xfe]);
        data.push(b'\n');
        let maps = RegionList::from_read(&data[..]).unwrap();
        let r = maps.get(0).unwrap();
        assert_eq!(r.kind, MappingKind::File);
        assert!(r.backing_path.starts_with("/tmp/"));
    }

    #[test]
    fn test_find() {
        let maps = RegionList::from_read(MAPS.as_bytes()).unwrap();
        assert_eq!(maps.find(0x55d0c4e4a010).unwrap().kind, MappingKind::Heap);
        assert_eq!(maps.find(0x7ffd1ba42000).unwrap().kind, MappingKind::Vdso);
        assert!(maps.find(0x10).is_none());
    }

    #[test]
    fn test_into_iter() {
        let maps = RegionList::from_read(MAPS.as_bytes()).unwrap();
        let paths: Vec<String> = maps.into_iter().map(|r| r.backing_path).collect();
        assert_eq!(paths.len(), 10);
        assert_eq!(paths[0], "/usr/bin/cat");
        assert_eq!(paths[5], "");
    }

    #[cfg(feature = "serde1")]
    #[test]
    fn test_serde() {
        let maps = RegionList::from_read(MAPS.as_bytes()).unwrap();
        let json = serde_json::to_string(&maps).unwrap();
        let back: RegionList = serde_json::from_str(&json).unwrap();
        assert_eq!(maps, back);
    }
}
