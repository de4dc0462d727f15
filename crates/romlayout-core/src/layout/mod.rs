//! Flash layout support
//!
//! A layout divides a flash chip into named regions. This module provides:
//!
//! - the [`RegionTable`] holding those regions
//! - the text layout file parser, including the `source` directive
//! - the [`IncludeSelector`] that marks regions for a write operation
//!
//! ```ignore
//! let mut table = RegionTable::new();
//! parse_layout("board.layout", &mut table)?;
//!
//! let mut includes = IncludeSelector::new();
//! includes.register("bios:bios.bin")?;
//! includes.resolve(&mut table)?;
//! ```

mod include;
mod lexer;
mod parser;
mod types;

pub use include::{split_include_spec, IncludeSelector};
pub use lexer::LayoutVersion;
pub use parser::{parse_layout, LayoutParser, LAYOUT_MARKER, MAX_LINE_LEN, MAX_SOURCE_DEPTH};
pub use types::*;
