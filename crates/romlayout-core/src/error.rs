//! Error types for romlayout-core

use core::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a layout entry line was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// Start address missing or not a valid number
    StartAddress,
    /// `:` does not follow the start address
    Separator,
    /// End address missing or not a valid number
    EndAddress,
    /// End address is not followed by blank space
    MissingBlank,
    /// Region name is empty or its quote is not terminated
    RegionName,
    /// `start >= end`
    NonPositiveLength,
    /// `source` is not followed by a usable file name
    SourcePath,
    /// `#` in a version 1 file
    ForbiddenComment,
    /// Line is not valid UTF-8
    InvalidUtf8,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartAddress => write!(f, "could not convert start address"),
            Self::Separator => write!(f, "address separator does not follow start address"),
            Self::EndAddress => write!(f, "could not convert end address"),
            Self::MissingBlank => write!(f, "end address is not followed by white space"),
            Self::RegionName => write!(f, "could not find region name"),
            Self::NonPositiveLength => write!(f, "length of region is not positive"),
            Self::SourcePath => write!(f, "could not find file name of source directive"),
            Self::ForbiddenComment => write!(f, "version 1 layouts may not contain '#'"),
            Self::InvalidUtf8 => write!(f, "line is not valid UTF-8"),
        }
    }
}

/// Errors produced while parsing layouts, selecting regions and building images
#[derive(Debug, Error)]
pub enum Error {
    /// A layout line could not be parsed
    #[error("{}:{line}: {reason}", .path.display())]
    MalformedEntry {
        /// Layout file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: Malformed,
    },

    /// A layout line does not fit the line buffer
    #[error("{}:{line}: line is longer than the allowed {max} chars", .path.display())]
    LineTooLong {
        /// Layout file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Line length bound
        max: usize,
    },

    /// The version header could not be read
    #[error("could not determine version of layout file '{}'", .path.display())]
    VersionUndetermined {
        /// Layout file
        path: PathBuf,
    },

    /// The file declares a version this parser does not know
    #[error("unknown layout file version {version} in '{}'", .path.display())]
    UnsupportedVersion {
        /// Layout file
        path: PathBuf,
        /// Declared version
        version: i64,
    },

    /// A `source` directive would re-enter a file that is still being parsed
    #[error("'{}' sources itself (directly or indirectly)", .path.display())]
    SourceCycle {
        /// File that would be parsed again
        path: PathBuf,
    },

    /// `source` directives nest deeper than allowed
    #[error("'{}' is nested more than {max} source directives deep", .path.display())]
    SourceTooDeep {
        /// File that would exceed the bound
        path: PathBuf,
        /// Nesting bound
        max: usize,
    },

    /// Region name is already present in the table
    #[error("region name \"{0}\" used multiple times")]
    DuplicateName(String),

    /// Region table is full
    #[error("more than the {0} allowed layout entries")]
    CapacityExceeded(usize),

    /// A layout or override file does not exist
    #[error("could not open '{}': file not found", .path.display())]
    FileNotFound {
        /// Missing file
        path: PathBuf,
    },

    /// I/O failure on a layout or override file
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Override file size differs from the region size
    #[error("image size ({actual} B) of '{}' doesn't match the size of region \"{region}\" ({expected} B)", .path.display())]
    SizeMismatch {
        /// Region being overridden
        region: String,
        /// Override file
        path: PathBuf,
        /// Region size
        expected: u64,
        /// File size
        actual: u64,
    },

    /// Include directive names a region that is not in the table
    #[error("invalid region specified: \"{0}\"")]
    UnknownRegion(String),

    /// Include directives exist but no layout was loaded
    #[error("region requested (\"{0}\") but no layout data is available")]
    NoLayoutLoaded(String),

    /// Include directive has no region name
    #[error("empty region name in include directive \"{0}\"")]
    EmptyIncludeSpec(String),

    /// The exact include directive was registered before
    #[error("duplicate region name: \"{0}\"")]
    DuplicateIncludeSpec(String),

    /// Two different include directives target the same region
    #[error("region \"{0}\" is included more than once")]
    DuplicateInclude(String),

    /// Too many include directives
    #[error("too many regions included ({0})")]
    TooManyIncludes(usize),

    /// An included region extends beyond the chip
    #[error("region \"{name}\" (0x{start:08x} - 0x{end:08x}) extends beyond chip size 0x{chip_size:x}")]
    RegionOutOfBounds {
        /// Region name
        name: String,
        /// Region start
        start: u32,
        /// Region end
        end: u32,
        /// Chip size in bytes
        chip_size: usize,
    },

    /// Chip is larger than 32-bit offsets can address
    #[error("chip size {0} exceeds the 4 GiB address space")]
    ChipTooLarge(usize),

    /// A content buffer is shorter than the chip
    #[error("buffer of {len} bytes is smaller than chip size {chip_size}")]
    BufferTooSmall {
        /// Buffer length
        len: usize,
        /// Chip size in bytes
        chip_size: usize,
    },

    /// Reading old chip content failed
    #[error("read of {len} bytes at offset {offset:#x} failed: {source}")]
    ChipRead {
        /// Chip offset
        offset: u32,
        /// Bytes requested
        len: usize,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Map an I/O error on `path` to [`Error::FileNotFound`] or [`Error::Io`]
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
