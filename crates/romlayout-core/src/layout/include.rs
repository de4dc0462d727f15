//! Region selection
//!
//! Include directives have the form `<region>[:<file>]`. They are recorded
//! verbatim first and only checked against the region table when resolved,
//! so they can be given before any layout is loaded.

use std::path::PathBuf;

use super::{RegionTable, MAX_REGIONS};
use crate::error::{Error, Result};

/// Split a directive into region name and optional override file
///
/// Only the first `:` separates; an empty file part means no file.
pub fn split_include_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once(':') {
        Some((name, "")) => (name, None),
        Some((name, file)) => (name, Some(file)),
        None => (spec, None),
    }
}

/// Ordered list of include directives
#[derive(Debug, Clone)]
pub struct IncludeSelector {
    specs: Vec<String>,
    capacity: usize,
}

impl IncludeSelector {
    /// Create an empty selector accepting up to [`MAX_REGIONS`] directives
    pub fn new() -> Self {
        Self::with_capacity(MAX_REGIONS)
    }

    /// Create an empty selector accepting up to `capacity` directives
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            specs: Vec::new(),
            capacity,
        }
    }

    /// Record a directive without looking at any layout
    pub fn register(&mut self, spec: impl Into<String>) -> Result<()> {
        let spec = spec.into();
        if self.specs.len() >= self.capacity {
            return Err(Error::TooManyIncludes(self.specs.len()));
        }
        if split_include_spec(&spec).0.is_empty() {
            return Err(Error::EmptyIncludeSpec(spec));
        }
        if self.specs.contains(&spec) {
            return Err(Error::DuplicateIncludeSpec(spec));
        }
        self.specs.push(spec);
        Ok(())
    }

    /// Mark every selected region as included and attach override files
    ///
    /// Directives are processed in registration order; the first failure
    /// aborts and leaves the table in a state the caller must discard.
    pub fn resolve(&self, table: &mut RegionTable) -> Result<()> {
        let Some(first) = self.specs.first() else {
            return Ok(());
        };
        if table.is_empty() {
            log::error!(
                "Region requested (\"{}\"), but no layout data is available",
                first
            );
            return Err(Error::NoLayoutLoaded(first.clone()));
        }

        let mut targeted = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let (name, file) = split_include_spec(spec);
            let Some(idx) = table.find_by_name(name) else {
                log::error!("Invalid region specified: \"{}\"", spec);
                return Err(Error::UnknownRegion(spec.clone()));
            };
            if targeted.contains(&idx) {
                log::error!("Region \"{}\" is included more than once", name);
                return Err(Error::DuplicateInclude(name.to_string()));
            }
            targeted.push(idx);

            let region = table
                .get_mut(idx)
                .ok_or_else(|| Error::UnknownRegion(spec.clone()))?;
            region.included = true;
            if let Some(file) = file {
                region.override_file = Some(PathBuf::from(file));
            }
        }

        let quoted: Vec<String> = self.specs.iter().map(|s| format!("\"{}\"", s)).collect();
        log::info!(
            "Using region{}: {}.",
            if self.specs.len() > 1 { "s" } else { "" },
            quoted.join(", ")
        );
        Ok(())
    }

    /// Iterate over the raw directives in registration order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(String::as_str)
    }

    /// Number of directives
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if no directive was registered
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Drop all directives
    pub fn clear(&mut self) {
        self.specs.clear();
    }
}

impl Default for IncludeSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Region;
    use std::path::Path;

    fn table() -> RegionTable {
        let mut table = RegionTable::new();
        table.add(Region::new("fd", 0x0, 0xFFF)).unwrap();
        table.add(Region::new("bios", 0x1000, 0x1FFF)).unwrap();
        table.add(Region::new("me", 0x2000, 0x2FFF)).unwrap();
        table
    }

    #[test]
    fn test_split_include_spec() {
        assert_eq!(split_include_spec("bios"), ("bios", None));
        assert_eq!(split_include_spec("bios:bios.bin"), ("bios", Some("bios.bin")));
        assert_eq!(split_include_spec("bios:"), ("bios", None));
        assert_eq!(split_include_spec("bios:C:/img.bin"), ("bios", Some("C:/img.bin")));
    }

    #[test]
    fn test_register_rejects_empty_and_duplicates() {
        let mut includes = IncludeSelector::new();
        assert!(matches!(includes.register(""), Err(Error::EmptyIncludeSpec(_))));
        assert!(matches!(includes.register(":x.bin"), Err(Error::EmptyIncludeSpec(_))));

        includes.register("bios").unwrap();
        assert!(matches!(
            includes.register("bios"),
            Err(Error::DuplicateIncludeSpec(ref s)) if s == "bios"
        ));
        // Different raw strings are only compared against each other at resolve time
        includes.register("bios:bios.bin").unwrap();
        assert_eq!(includes.len(), 2);
    }

    #[test]
    fn test_register_capacity() {
        let mut includes = IncludeSelector::with_capacity(1);
        includes.register("a").unwrap();
        assert!(matches!(includes.register("b"), Err(Error::TooManyIncludes(1))));
    }

    #[test]
    fn test_register_does_not_need_layout() {
        let mut includes = IncludeSelector::new();
        includes.register("does-not-exist").unwrap();
        assert_eq!(includes.iter().collect::<Vec<_>>(), ["does-not-exist"]);
    }

    #[test]
    fn test_resolve() {
        let mut table = table();
        let mut includes = IncludeSelector::new();
        includes.register("me").unwrap();
        includes.register("bios:new/bios.bin").unwrap();
        includes.resolve(&mut table).unwrap();

        let bios = table.get(table.find_by_name("bios").unwrap()).unwrap();
        assert!(bios.included);
        assert_eq!(bios.override_file(), Some(Path::new("new/bios.bin")));
        let me = table.get(table.find_by_name("me").unwrap()).unwrap();
        assert!(me.included);
        assert_eq!(me.override_file(), None);
        assert!(!table.get(0).unwrap().included);
    }

    #[test]
    fn test_resolve_without_directives() {
        let mut empty = RegionTable::new();
        IncludeSelector::new().resolve(&mut empty).unwrap();
    }

    #[test]
    fn test_resolve_without_layout() {
        let mut includes = IncludeSelector::new();
        includes.register("bios").unwrap();
        let result = includes.resolve(&mut RegionTable::new());
        assert!(matches!(result, Err(Error::NoLayoutLoaded(ref s)) if s == "bios"));
    }

    #[test]
    fn test_resolve_unknown_region() {
        let mut includes = IncludeSelector::new();
        includes.register("bios").unwrap();
        includes.register("BIOS:x.bin").unwrap();
        let result = includes.resolve(&mut table());
        assert!(matches!(result, Err(Error::UnknownRegion(ref s)) if s == "BIOS:x.bin"));
    }

    #[test]
    fn test_resolve_same_region_twice() {
        let mut includes = IncludeSelector::new();
        includes.register("bios").unwrap();
        includes.register("bios:bios.bin").unwrap();
        let result = includes.resolve(&mut table());
        assert!(matches!(result, Err(Error::DuplicateInclude(ref s)) if s == "bios"));
    }

    #[test]
    fn test_clear() {
        let mut includes = IncludeSelector::new();
        includes.clear();
        includes.register("bios").unwrap();
        includes.clear();
        assert!(includes.is_empty());
        includes.register("bios").unwrap();
    }
}
