use crate::MapsResult;

/// Splits a maps line into delimiter-bounded fields, front to back.
///
/// Each call hands out the text before the next delimiter and moves past it.  The returned
/// slices borrow from the line, nothing is copied here.
#[derive(Debug, Clone)]
pub struct FieldExtractor<'a> {
    rest: &'a str,
}

impl<'a> FieldExtractor<'a> {
    /// Starts extracting from `line`.  A single trailing `\n` is not part of any field.
    pub fn new(line: &'a str) -> FieldExtractor<'a> {
        FieldExtractor {
            rest: line.strip_suffix('\n').unwrap_or(line),
        }
    }

    /// Returns the text preceding the first `delimiter`, and advances past the delimiter.
    ///
    /// If the delimiter doesn't occur in the remaining text the line is malformed.
    pub fn next_field(&mut self, delimiter: char) -> MapsResult<&'a str> {
        match self.rest.find(delimiter) {
            Some(idx) => {
                let field = &self.rest[..idx];
                self.rest = &self.rest[idx + delimiter.len_utf8()..];
                Ok(field)
            }
            None => Err(build_malformed!(format!(
                "Expected {:?} in {:?}",
                delimiter, self.rest
            ))),
        }
    }

    /// Returns the text preceding the first space or tab, or all of the remaining text if
    /// there is no whitespace left (the line terminator ends the field).
    ///
    /// The whitespace itself is left in place, see [`FieldExtractor::remainder`].
    pub fn next_word(&mut self) -> &'a str {
        let idx = self.rest.find(is_blank).unwrap_or(self.rest.len());
        let field = &self.rest[..idx];
        self.rest = &self.rest[idx..];
        field
    }

    /// Everything after the next run of spaces and tabs, up to the end of the line.
    pub fn remainder(self) -> &'a str {
        self.rest.trim_start_matches(is_blank)
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// The raw, undecoded fields of one maps line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFields<'a> {
    pub address_start: &'a str,
    pub address_end: &'a str,
    pub perms: &'a str,
    pub offset: &'a str,
    pub dev: &'a str,
    pub inode: &'a str,
    /// The backing path, may be empty
    pub path: &'a str,
}

impl<'a> RawFields<'a> {
    /// Splits `line` into its fields.
    ///
    /// The layout is `<start>-<end> <perms> <offset> <major>:<minor> <inode> <path>`, where the
    /// path is separated from the inode by any amount of spaces or tabs.
    pub fn split(line: &'a str) -> MapsResult<RawFields<'a>> {
        let mut s = FieldExtractor::new(line);
        let address = s.next_field(' ')?;
        let perms = s.next_field(' ')?;
        let offset = s.next_field(' ')?;
        let dev = s.next_field(' ')?;
        let inode = s.next_word();
        let path = s.remainder();

        let mut range = FieldExtractor::new(address);
        let address_start = range.next_field('-')?;
        let address_end = range.remainder();

        Ok(RawFields {
            address_start,
            address_end,
            perms,
            offset,
            dev,
            inode,
            path,
        })
    }
}
