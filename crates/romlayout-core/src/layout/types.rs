//! Layout types
//!
//! The region table shared by the parser, the include selector and the
//! image reconstructor.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default number of entries a region table (and the include list) can hold
pub const MAX_REGIONS: usize = 32;

/// A named region within a flash chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Name of the region (case-sensitive)
    pub name: String,
    /// Start address (inclusive)
    pub start: u32,
    /// End address (inclusive)
    pub end: u32,
    /// Whether this region is included in the current operation
    pub included: bool,
    /// File whose contents replace this region, if any
    pub override_file: Option<PathBuf>,
}

impl Region {
    /// Create a new, not included region
    pub fn new(name: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            included: false,
            override_file: None,
        }
    }

    /// Get the size of this region in bytes
    ///
    /// Returned as `u64` since `0:0xFFFFFFFF` spans 4 GiB.
    pub fn size(&self) -> u64 {
        u64::from(self.end) - u64::from(self.start) + 1
    }

    /// Check if an address is within this region
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Check if this region overlaps with another
    pub fn overlaps(&self, other: &Region) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Override file attached by an include directive
    pub fn override_file(&self) -> Option<&Path> {
        self.override_file.as_deref()
    }
}

/// Ordered, capacity-bounded table of regions
///
/// Insertion order is significant: lookups return the first match and the
/// image reconstructor breaks ties between overlapping regions by it.
#[derive(Debug, Clone)]
pub struct RegionTable {
    regions: Vec<Region>,
    capacity: usize,
}

impl RegionTable {
    /// Create an empty table holding up to [`MAX_REGIONS`] entries
    pub fn new() -> Self {
        Self::with_capacity(MAX_REGIONS)
    }

    /// Create an empty table holding up to `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            regions: Vec::new(),
            capacity,
        }
    }

    /// Append a region
    ///
    /// Fails if the name is already taken or the table is full.
    pub fn add(&mut self, region: Region) -> Result<()> {
        if self.find_by_name(&region.name).is_some() {
            return Err(Error::DuplicateName(region.name));
        }
        if self.regions.len() >= self.capacity {
            return Err(Error::CapacityExceeded(self.capacity));
        }
        self.regions.push(region);
        Ok(())
    }

    /// Index of the first region called `name`
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        let idx = self.regions.iter().position(|r| r.name == name);
        log::trace!(
            "Looking for region \"{}\"... {}",
            name,
            if idx.is_some() { "found" } else { "not found" }
        );
        idx
    }

    /// Get a region by index
    pub fn get(&self, idx: usize) -> Option<&Region> {
        self.regions.get(idx)
    }

    /// Get a region by index, mutable
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Region> {
        self.regions.get_mut(idx)
    }

    /// Iterate over all regions in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Get all included regions
    pub fn included(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.included)
    }

    /// Check if any regions are included
    pub fn has_included(&self) -> bool {
        self.regions.iter().any(|r| r.included)
    }

    /// Get the number of regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Maximum number of regions
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all regions (names and override paths included)
    pub fn clear(&mut self) {
        self.regions.clear();
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new()
    }
}
