//! Textual layout file parsing
//!
//! Parses layout files in the flashrom text format:
//!
//! ```text
//! # flashrom layout 2
//! 0x000000:0x000fff "flash descriptor"   # quoted names may contain blanks
//! 0x001000:0x1fffff me
//! source "bios.layout"                   # relative to this file's directory
//! ```
//!
//! Files without the `# flashrom layout <N>` header are version 1: each line
//! is `<hex>:<hex> <name>`, comments and quoting do not exist, and malformed
//! lines are skipped with a warning instead of failing the parse.

use std::fs;
use std::path::{Path, PathBuf};

use super::lexer::{Keyword, LayoutVersion, Lexer, BLANK};
use super::{Region, RegionTable};
use crate::error::{Error, Malformed, Result};

/// Header announcing a versioned layout file
pub const LAYOUT_MARKER: &str = "# flashrom layout ";

/// Lines must be shorter than this many bytes (comments excluded)
pub const MAX_LINE_LEN: usize = 1024;

/// Maximum nesting of `source` directives
pub const MAX_SOURCE_DEPTH: usize = 16;

/// One syntactically valid, non-blank line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line<'a> {
    /// `source <file>`
    Source { file: &'a str, trailing: &'a str },
    /// `<start>:<end> <name>`
    Entry {
        start: u32,
        end: u32,
        name: &'a str,
        trailing: &'a str,
    },
}

/// Parse a single line (without comment) into a [`Line`]
///
/// Checks are applied in a fixed order and the first failure is reported.
fn parse_line(line: &str, version: LayoutVersion) -> core::result::Result<Line<'_>, Malformed> {
    let mut lexer = Lexer::new(line, version);
    lexer.blank();

    if lexer.keyword() == Some(Keyword::Source) {
        lexer.blank();
        let file = lexer.value().ok_or(Malformed::SourcePath)?;
        lexer.blank();
        return Ok(Line::Source {
            file: file.as_str(),
            trailing: lexer.rest(),
        });
    }

    let start = lexer.number().ok_or(Malformed::StartAddress)?;
    lexer.blank();
    if !lexer.separator() {
        return Err(Malformed::Separator);
    }
    let end = lexer.number().ok_or(Malformed::EndAddress)?;
    if lexer.blank() == 0 {
        return Err(Malformed::MissingBlank);
    }
    let name = lexer.value().ok_or(Malformed::RegionName)?;
    if start >= end {
        return Err(Malformed::NonPositiveLength);
    }
    lexer.blank();

    Ok(Line::Entry {
        start,
        end,
        name: name.as_str(),
        trailing: lexer.rest(),
    })
}

/// Determine the layout version from the start of a file
///
/// Leading blanks are skipped; without the header the file is version 1.
fn detect_version(path: &Path, data: &[u8]) -> Result<LayoutVersion> {
    let undetermined = || Error::VersionUndetermined {
        path: path.to_path_buf(),
    };

    let start = data
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .ok_or_else(undetermined)?;
    let Some(after) = data[start..].strip_prefix(LAYOUT_MARKER.as_bytes()) else {
        return Ok(LayoutVersion::V1);
    };

    let version = parse_header_version(after).ok_or_else(undetermined)?;
    if version < 2 {
        log::warn!(
            "Layout file {:?} declares itself to be version {}, but self declaration has \
             only been possible since version 2. Continuing anyway.",
            path,
            version
        );
    }
    match version {
        1 => Ok(LayoutVersion::V1),
        2 => Ok(LayoutVersion::V2),
        _ => Err(Error::UnsupportedVersion {
            path: path.to_path_buf(),
            version,
        }),
    }
}

/// Read a signed decimal integer, skipping leading white space
fn parse_header_version(data: &[u8]) -> Option<i64> {
    let skip = data.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let data = &data[skip..];
    let sign_len = usize::from(matches!(data.first(), Some(b'+') | Some(b'-')));
    let digits = data[sign_len..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    core::str::from_utf8(&data[..sign_len + digits])
        .ok()?
        .parse()
        .ok()
}

/// Resolve a `source` argument against the directory of the including file
fn resolve_source(including: &Path, file: &str) -> PathBuf {
    let file = Path::new(file);
    if file.is_absolute() {
        return file.to_path_buf();
    }
    match including.parent() {
        Some(dir) => dir.join(file),
        None => file.to_path_buf(),
    }
}

/// Layout file parser
///
/// Appends every entry of a layout file, and of all files it sources, to a
/// region table. A failed parse leaves the entries parsed so far in the
/// table; callers must discard it.
pub struct LayoutParser<'t> {
    table: &'t mut RegionTable,
    /// Canonical paths of the files currently being parsed, outermost first
    active: Vec<PathBuf>,
}

impl<'t> LayoutParser<'t> {
    /// Create a parser filling `table`
    pub fn new(table: &'t mut RegionTable) -> Self {
        Self {
            table,
            active: Vec::new(),
        }
    }

    /// Parse the layout file at `path` (and everything it sources)
    pub fn parse(&mut self, path: &Path) -> Result<()> {
        if self.active.len() >= MAX_SOURCE_DEPTH {
            return Err(Error::SourceTooDeep {
                path: path.to_path_buf(),
                max: MAX_SOURCE_DEPTH,
            });
        }

        let data = fs::read(path).map_err(|e| {
            log::error!("Could not open layout file {:?}: {}", path, e);
            Error::from_io(path, e)
        })?;
        let canonical = fs::canonicalize(path).map_err(|e| Error::from_io(path, e))?;
        if self.active.contains(&canonical) {
            return Err(Error::SourceCycle {
                path: path.to_path_buf(),
            });
        }

        let version = detect_version(path, &data)?;
        log::debug!(
            "Parsing layout file {:?} according to version {}",
            path,
            version.number()
        );

        self.active.push(canonical);
        let result = self.parse_lines(path, version, &data);
        self.active.pop();
        result
    }

    fn parse_lines(&mut self, path: &Path, version: LayoutVersion, data: &[u8]) -> Result<()> {
        for (idx, raw) in data.split(|&b| b == b'\n').enumerate() {
            let lineno = idx + 1;
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

            let content = match raw.iter().position(|&b| b == b'#') {
                Some(_) if version == LayoutVersion::V1 => {
                    log::error!(
                        "Line {} of version 1 layout file {:?} contains a forbidden #",
                        lineno,
                        path
                    );
                    return Err(Error::MalformedEntry {
                        path: path.to_path_buf(),
                        line: lineno,
                        reason: Malformed::ForbiddenComment,
                    });
                }
                Some(comment) => &raw[..comment],
                None => raw,
            };

            if content.len() >= MAX_LINE_LEN {
                return Err(Error::LineTooLong {
                    path: path.to_path_buf(),
                    line: lineno,
                    max: MAX_LINE_LEN,
                });
            }

            let parsed = core::str::from_utf8(content)
                .map_err(|_| Malformed::InvalidUtf8)
                .and_then(|line| {
                    if line.trim_matches(BLANK).is_empty() {
                        return Ok(None);
                    }
                    log::trace!("Parsing line {} of {:?}: \"{}\"", lineno, path, line);
                    parse_line(line, version).map(Some)
                });

            match parsed {
                Ok(None) => {}
                Ok(Some(line)) => self.apply(path, lineno, line)?,
                Err(reason) if version == LayoutVersion::V1 => {
                    log::warn!(
                        "Skipping line {} of version 1 layout file {:?}: {}",
                        lineno,
                        path,
                        reason
                    );
                }
                Err(reason) => {
                    log::error!(
                        "Error parsing version 2 layout entry at {:?} line {}: {}",
                        path,
                        lineno,
                        reason
                    );
                    return Err(Error::MalformedEntry {
                        path: path.to_path_buf(),
                        line: lineno,
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, path: &Path, lineno: usize, line: Line<'_>) -> Result<()> {
        match line {
            Line::Source { file, trailing } => {
                if !trailing.is_empty() {
                    log::warn!(
                        "Source file name \"{}\" at {:?} line {} is not followed by white space only",
                        file,
                        path,
                        lineno
                    );
                }
                let target = resolve_source(path, file);
                log::debug!("Sourcing layout file {:?} from {:?}", target, path);
                self.parse(&target)
            }
            Line::Entry {
                start,
                end,
                name,
                trailing,
            } => {
                log::debug!("Parsed entry: 0x{:08x} - 0x{:08x} named \"{}\"", start, end, name);
                if !trailing.is_empty() {
                    log::warn!(
                        "Region name \"{}\" at {:?} line {} is not followed by white space only",
                        name,
                        path,
                        lineno
                    );
                }
                self.table.add(Region::new(name, start, end)).map_err(|e| {
                    log::error!("{:?} line {}: {}", path, lineno, e);
                    e
                })
            }
        }
    }
}

/// Parse the layout file at `path` into `table`
pub fn parse_layout(path: impl AsRef<Path>, table: &mut RegionTable) -> Result<()> {
    LayoutParser::new(table).parse(path.as_ref())
}
