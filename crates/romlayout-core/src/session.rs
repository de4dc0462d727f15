//! Per-invocation layout state
//!
//! A [`LayoutSession`] owns the region table and the include directives of
//! one flashing operation and ties the parser, the include selector and the
//! image reconstructor together.

use std::path::Path;

use crate::error::Result;
use crate::image::{self, ChipReader, OldContent, ReconstructStats};
use crate::layout::{parse_layout, IncludeSelector, Region, RegionTable};

/// Region table plus include directives for one operation
///
/// Nothing is reset implicitly: call [`LayoutSession::clear_all_state`]
/// before reusing a session for another operation.
#[derive(Debug, Clone, Default)]
pub struct LayoutSession {
    table: RegionTable,
    includes: IncludeSelector,
}

impl LayoutSession {
    /// Create an empty session with the default capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session holding up to `capacity` regions and directives
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: RegionTable::with_capacity(capacity),
            includes: IncludeSelector::with_capacity(capacity),
        }
    }

    /// Parse a layout file into the region table
    ///
    /// May be called several times; all files share one table. After an
    /// error the table is incomplete and the session should be cleared.
    pub fn parse_layout(&mut self, path: impl AsRef<Path>) -> Result<()> {
        parse_layout(path, &mut self.table)
    }

    /// Register a `region[:file]` include directive
    pub fn register_include(&mut self, spec: impl Into<String>) -> Result<()> {
        self.includes.register(spec)
    }

    /// Apply the registered include directives to the region table
    pub fn resolve_includes(&mut self) -> Result<()> {
        self.includes.resolve(&mut self.table)
    }

    /// Build the final image in `new`
    ///
    /// See [`image::reconstruct`]. `reader` is only used when `old_valid` is
    /// false.
    pub fn reconstruct_image<R: ChipReader + ?Sized>(
        &self,
        chip_size: usize,
        old: &mut [u8],
        new: &mut [u8],
        old_valid: bool,
        reader: &mut R,
    ) -> Result<ReconstructStats> {
        image::reconstruct(
            &self.table,
            !self.includes.is_empty(),
            chip_size,
            OldContent::new(old, old_valid, reader),
            new,
        )
    }

    /// Look up a region by exact name
    pub fn find_region(&self, name: &str) -> Option<&Region> {
        self.table
            .find_by_name(name)
            .and_then(|idx| self.table.get(idx))
    }

    /// Drop all regions, override paths and include directives
    pub fn clear_all_state(&mut self) {
        self.includes.clear();
        self.table.clear();
    }

    /// The region table
    pub fn table(&self) -> &RegionTable {
        &self.table
    }

    /// The include directives
    pub fn includes(&self) -> &IncludeSelector {
        &self.includes
    }
}
