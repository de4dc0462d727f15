//! Line lexer for layout files
//!
//! Works on one comment-free line at a time and never modifies it; every
//! token borrows from the line.

/// Characters separating tokens
pub(crate) const BLANK: [char; 2] = [' ', '\t'];

/// Keyword introducing a file inclusion
const SOURCE_KEYWORD: &str = "source";

/// Layout file syntax version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutVersion {
    /// Legacy syntax: hex addresses, bare names, no comments
    V1,
    /// Comments, quoting, auto-detected number base and `source`
    V2,
}

impl LayoutVersion {
    /// Numeric version as written in the `# flashrom layout` header
    pub fn number(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

/// Directive keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    Source,
}

/// A string value (region name or file name)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Value<'a> {
    /// Text between a pair of `"`
    Quoted(&'a str),
    /// Text up to the next blank
    Bare(&'a str),
}

impl<'a> Value<'a> {
    pub(crate) fn as_str(&self) -> &'a str {
        match *self {
            Value::Quoted(s) | Value::Bare(s) => s,
        }
    }
}

/// Cursor over a single line
#[derive(Debug, Clone)]
pub(crate) struct Lexer<'a> {
    line: &'a str,
    pos: usize,
    version: LayoutVersion,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(line: &'a str, version: LayoutVersion) -> Self {
        Self {
            line,
            pos: 0,
            version,
        }
    }

    /// Unconsumed part of the line
    pub(crate) fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }

    /// Skip spaces and tabs, returning how many were skipped
    pub(crate) fn blank(&mut self) -> usize {
        let rest = self.rest();
        let skipped = rest.len() - rest.trim_start_matches(BLANK).len();
        self.pos += skipped;
        skipped
    }

    /// Consume the `:` address separator
    pub(crate) fn separator(&mut self) -> bool {
        if self.rest().starts_with(':') {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a directive keyword
    ///
    /// Keywords only exist in version 2 and must be followed by a blank, a
    /// quote or the end of the line.
    pub(crate) fn keyword(&mut self) -> Option<Keyword> {
        if self.version != LayoutVersion::V2 {
            return None;
        }
        let after = self.rest().strip_prefix(SOURCE_KEYWORD)?;
        match after.chars().next() {
            None | Some(' ') | Some('\t') | Some('"') => {
                self.pos += SOURCE_KEYWORD.len();
                Some(Keyword::Source)
            }
            _ => None,
        }
    }

    /// Consume an address
    ///
    /// Leading blanks and a sign are accepted like `strtol` does. Version 1
    /// addresses are always hex (`0x` prefix optional); version 2 picks the
    /// base from the prefix: `0x` hex, `0` octal, decimal otherwise.
    /// Negative values and values above `u32::MAX` are rejected.
    pub(crate) fn number(&mut self) -> Option<u32> {
        let saved = self.pos;
        self.blank();
        let value = self.number_inner();
        if value.is_none() {
            self.pos = saved;
        }
        value
    }

    fn number_inner(&mut self) -> Option<u32> {
        let bytes = self.rest().as_bytes();
        let mut i = 0;
        let negative = match bytes.first() {
            Some(b'-') => {
                i += 1;
                true
            }
            Some(b'+') => {
                i += 1;
                false
            }
            _ => false,
        };

        let has_hex_prefix = bytes.len() > i + 2
            && bytes[i] == b'0'
            && (bytes[i + 1] == b'x' || bytes[i + 1] == b'X')
            && bytes[i + 2].is_ascii_hexdigit();
        let radix = match self.version {
            LayoutVersion::V1 => 16,
            LayoutVersion::V2 if has_hex_prefix => 16,
            LayoutVersion::V2 if bytes.get(i) == Some(&b'0') => 8,
            LayoutVersion::V2 => 10,
        };
        if has_hex_prefix {
            i += 2;
        }

        let digits_start = i;
        let mut value: u64 = 0;
        while let Some(digit) = bytes.get(i).and_then(|&b| (b as char).to_digit(radix)) {
            value = value
                .checked_mul(u64::from(radix))?
                .checked_add(u64::from(digit))?;
            i += 1;
        }
        if i == digits_start || (negative && value != 0) {
            return None;
        }
        let value = u32::try_from(value).ok()?;
        self.pos += i;
        Some(value)
    }

    /// Consume a possibly quoted value
    ///
    /// A quoted value runs to the next `"`; a bare value to the next blank.
    /// Version 1 has no quoting. Empty values and unterminated quotes yield
    /// `None`.
    pub(crate) fn value(&mut self) -> Option<Value<'a>> {
        let rest = self.rest();
        if self.version == LayoutVersion::V2 {
            if let Some(quoted) = rest.strip_prefix('"') {
                let len = quoted.find('"')?;
                if len == 0 {
                    return None;
                }
                self.pos += len + 2;
                return Some(Value::Quoted(&quoted[..len]));
            }
        }
        let len = rest.find(BLANK).unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(Value::Bare(&rest[..len]))
    }
}
