//! Final image reconstruction
//!
//! When only some regions are written, the image sent to the chip is built
//! from three sources:
//!
//! - included regions with an override file take the file's bytes
//! - included regions without one keep what the caller staged in the new image
//! - everything else keeps the chip's current (old) content
//!
//! Old content may not have been read yet. In that case it is fetched through
//! a [`ChipReader`] for exactly the ranges that are preserved, so that a
//! partial write never has to read the whole chip.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::layout::{Region, RegionTable};

/// Largest chip addressable with 32-bit offsets
pub const MAX_CHIP_SIZE: u64 = 1 << 32;

/// Source of the chip's current content
///
/// Typically a programmer doing a real (slow) flash read.
pub trait ChipReader {
    /// Fill `buf` with the chip content starting at `offset`
    fn read_range(&mut self, offset: u32, buf: &mut [u8]) -> io::Result<()>;
}

impl<F> ChipReader for F
where
    F: FnMut(u32, &mut [u8]) -> io::Result<()>,
{
    fn read_range(&mut self, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        self(offset, buf)
    }
}

/// Reader for callers whose old content is already valid
///
/// Every read fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReader;

impl ChipReader for NoReader {
    fn read_range(&mut self, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!(
                "no chip reader available for {} bytes at {:#x}",
                buf.len(),
                offset
            ),
        ))
    }
}

/// Statistics about a reconstruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructStats {
    /// Bytes copied from old content into the new image
    pub bytes_preserved: usize,
    /// Bytes taken from override files
    pub bytes_from_files: usize,
    /// Number of [`ChipReader::read_range`] calls
    pub chip_reads: usize,
    /// Bytes fetched through the reader
    pub bytes_read: usize,
}

/// The chip's current content, possibly not read yet
pub struct OldContent<'a, R: ChipReader + ?Sized> {
    buf: &'a mut [u8],
    valid: bool,
    reader: &'a mut R,
}

impl<'a, R: ChipReader + ?Sized> OldContent<'a, R> {
    /// Wrap the old-content buffer
    ///
    /// If `valid` is false, ranges are read through `reader` into `buf` right
    /// before they are needed.
    pub fn new(buf: &'a mut [u8], valid: bool, reader: &'a mut R) -> Self {
        Self { buf, valid, reader }
    }

    /// Copy `[start, start + len)` of the old content into `new`
    fn copy_to(
        &mut self,
        new: &mut [u8],
        start: u32,
        len: usize,
        stats: &mut ReconstructStats,
    ) -> Result<()> {
        let range = start as usize..start as usize + len;
        if !self.valid {
            log::debug!("Read a chunk starting from 0x{:06x} (len=0x{:06x})", start, len);
            self.reader
                .read_range(start, &mut self.buf[range.clone()])
                .map_err(|source| Error::ChipRead {
                    offset: start,
                    len,
                    source,
                })?;
            stats.chip_reads += 1;
            stats.bytes_read += len;
        }
        new[range.clone()].copy_from_slice(&self.buf[range]);
        stats.bytes_preserved += len;
        Ok(())
    }
}

/// Pick the included region to process at `offset`
///
/// The first region (in table order) containing `offset` wins; otherwise the
/// one starting closest after it, ties broken by table order.
fn next_included_region(table: &RegionTable, offset: u32) -> Option<&Region> {
    let mut best: Option<&Region> = None;
    for region in table.included() {
        if offset > region.end {
            continue;
        }
        if offset >= region.start {
            return Some(region);
        }
        if best.is_none_or(|b| region.start < b.start) {
            best = Some(region);
        }
    }
    best
}

/// Replace a region in `new` with the contents of its override file
fn read_override_file(region: &Region, path: &Path, new: &mut [u8]) -> Result<usize> {
    let mut file = File::open(path).map_err(|e| {
        log::error!("Opening layout image file {:?} failed: {}", path, e);
        Error::from_io(path, e)
    })?;
    let actual = file
        .metadata()
        .map_err(|e| Error::from_io(path, e))?
        .len();
    if actual != region.size() {
        log::error!(
            "Image size ({} B) of {:?} doesn't match the size of region \"{}\" ({} B)",
            actual,
            path,
            region.name,
            region.size()
        );
        return Err(Error::SizeMismatch {
            region: region.name.clone(),
            path: path.to_path_buf(),
            expected: region.size(),
            actual,
        });
    }

    let dest = &mut new[region.start as usize..=region.end as usize];
    file.read_exact(dest).map_err(|e| Error::from_io(path, e))?;
    log::debug!(
        "Read {} bytes for region \"{}\" from {:?}",
        dest.len(),
        region.name,
        path
    );
    Ok(dest.len())
}

/// Check buffers and included regions against the chip size
fn check_bounds(table: &RegionTable, chip_size: usize, old_len: usize, new_len: usize) -> Result<()> {
    if chip_size as u64 > MAX_CHIP_SIZE {
        return Err(Error::ChipTooLarge(chip_size));
    }
    for len in [old_len, new_len] {
        if len < chip_size {
            return Err(Error::BufferTooSmall { len, chip_size });
        }
    }
    if let Some(region) = table.included().find(|r| r.end as usize >= chip_size) {
        return Err(Error::RegionOutOfBounds {
            name: region.name.clone(),
            start: region.start,
            end: region.end,
            chip_size,
        });
    }
    Ok(())
}

/// Build the image to write in `new`
///
/// `includes_registered` tells whether any include directive was given; if
/// not, `new` is a whole-chip image and is left untouched. Otherwise bytes
/// outside the included regions are taken from `old`, and included regions
/// with an override file are replaced by the file's contents.
///
/// On error `new` may be partially built and must not be written.
pub fn reconstruct<R: ChipReader + ?Sized>(
    table: &RegionTable,
    includes_registered: bool,
    chip_size: usize,
    mut old: OldContent<'_, R>,
    new: &mut [u8],
) -> Result<ReconstructStats> {
    let mut stats = ReconstructStats::default();
    if !includes_registered {
        return Ok(stats);
    }
    check_bounds(table, chip_size, old.buf.len(), new.len())?;

    let mut start: u32 = 0;
    while (start as usize) < chip_size {
        let Some(region) = next_included_region(table, start) else {
            old.copy_to(new, start, chip_size - start as usize, &mut stats)?;
            break;
        };

        if region.start > start {
            old.copy_to(new, start, (region.start - start) as usize, &mut stats)?;
        }

        if let Some(path) = region.override_file() {
            stats.bytes_from_files += read_override_file(region, path, new)?;
        }

        match region.end.checked_add(1) {
            Some(next) => start = next,
            None => break,
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::ops::Range;
    use tempfile::tempdir;

    const CHIP_SIZE: usize = 0x10000;

    fn included(name: &str, start: u32, end: u32) -> Region {
        let mut region = Region::new(name, start, end);
        region.included = true;
        region
    }

    fn staged() -> Vec<u8> {
        (0..CHIP_SIZE).map(|i| (i % 251) as u8).collect()
    }

    /// Reader over a fixed chip image that records every call
    struct Recorder {
        chip: Vec<u8>,
        calls: Vec<Range<usize>>,
    }

    impl Recorder {
        fn new(fill: u8) -> Self {
            Self {
                chip: vec![fill; CHIP_SIZE],
                calls: Vec::new(),
            }
        }
    }

    impl ChipReader for Recorder {
        fn read_range(&mut self, offset: u32, buf: &mut [u8]) -> io::Result<()> {
            let start = offset as usize;
            self.calls.push(start..start + buf.len());
            buf.copy_from_slice(&self.chip[start..start + buf.len()]);
            Ok(())
        }
    }

    #[test]
    fn test_no_includes_is_whole_chip_write() {
        let mut table = RegionTable::new();
        table.add(included("bios", 0x1000, 0x1FFF)).unwrap();
        let mut old = vec![0xFF; CHIP_SIZE];
        let mut new = staged();
        let mut reader = Recorder::new(0xFF);

        let stats = reconstruct(
            &table,
            false,
            CHIP_SIZE,
            OldContent::new(&mut old, false, &mut reader),
            &mut new,
        )
        .unwrap();

        assert_eq!(new, staged());
        assert_eq!(stats, ReconstructStats::default());
        assert!(reader.calls.is_empty());
    }

    #[test]
    fn test_single_region_keeps_staged_bytes() {
        let mut table = RegionTable::new();
        table.add(Region::new("fd", 0, 0xFFF)).unwrap();
        table.add(included("BIOS", 0x1000, 0x1FFF)).unwrap();
        let mut old = vec![0xFF; CHIP_SIZE];
        let mut new = staged();

        let stats = reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut old, true, &mut NoReader),
            &mut new,
        )
        .unwrap();

        let expected = staged();
        assert!(new[..0x1000].iter().all(|&b| b == 0xFF));
        assert_eq!(new[0x1000..0x2000], expected[0x1000..0x2000]);
        assert!(new[0x2000..].iter().all(|&b| b == 0xFF));
        assert_eq!(stats.bytes_preserved, CHIP_SIZE - 0x1000);
        assert_eq!(stats.chip_reads, 0);
    }

    #[test]
    fn test_lazy_reads_cover_only_gaps() {
        let mut table = RegionTable::new();
        table.add(included("b", 0x4000, 0x4FFF)).unwrap();
        table.add(included("a", 0x1000, 0x1FFF)).unwrap();
        table.add(Region::new("unused", 0x2000, 0x3FFF)).unwrap();
        let mut old = vec![0u8; CHIP_SIZE];
        let mut new = staged();
        let mut reader = Recorder::new(0xA5);

        let stats = reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut old, false, &mut reader),
            &mut new,
        )
        .unwrap();

        assert_eq!(reader.calls, [0..0x1000, 0x2000..0x4000, 0x5000..CHIP_SIZE]);
        assert_eq!(stats.chip_reads, 3);
        assert_eq!(stats.bytes_read, CHIP_SIZE - 0x2000);
        assert!(new[0x2000..0x4000].iter().all(|&b| b == 0xA5));
        assert!(old[0x1000..0x2000].iter().all(|&b| b == 0));
        assert_eq!(new[0x4000..0x5000], staged()[0x4000..0x5000]);
    }

    #[test]
    fn test_override_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bios.bin");
        let content: Vec<u8> = (0..0x1000).map(|i| (i * 7) as u8).collect();
        fs::write(&path, &content).unwrap();

        let mut table = RegionTable::new();
        let mut bios = included("BIOS", 0x1000, 0x1FFF);
        bios.override_file = Some(path);
        table.add(bios).unwrap();
        let mut old = vec![0xFF; CHIP_SIZE];
        let mut new = staged();

        let stats = reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut old, true, &mut NoReader),
            &mut new,
        )
        .unwrap();

        assert_eq!(new[0x1000..0x2000], content[..]);
        assert!(new[..0x1000].iter().all(|&b| b == 0xFF));
        assert_eq!(stats.bytes_from_files, 0x1000);
    }

    #[test]
    fn test_override_size_mismatch_aborts() {
        let dir = tempdir().unwrap();
        for len in [0xFFF, 0x1001] {
            let path = dir.path().join(format!("bios-{:x}.bin", len));
            fs::write(&path, vec![0u8; len]).unwrap();

            let mut table = RegionTable::new();
            let mut bios = included("BIOS", 0x1000, 0x1FFF);
            bios.override_file = Some(path);
            table.add(bios).unwrap();
            table.add(included("later", 0x3000, 0x3FFF)).unwrap();
            let mut old = vec![0u8; CHIP_SIZE];
            let mut new = staged();
            let mut reader = Recorder::new(0xFF);

            let result = reconstruct(
                &table,
                true,
                CHIP_SIZE,
                OldContent::new(&mut old, false, &mut reader),
                &mut new,
            );
            assert!(matches!(
                result,
                Err(Error::SizeMismatch { expected: 0x1000, actual, .. }) if actual == len as u64
            ));
            // Nothing after the failing region was touched
            assert_eq!(reader.calls, [0..0x1000]);
            assert_eq!(new[0x2000..], staged()[0x2000..]);
        }
    }

    #[test]
    fn test_missing_override_file() {
        let dir = tempdir().unwrap();
        let mut table = RegionTable::new();
        let mut bios = included("BIOS", 0x1000, 0x1FFF);
        bios.override_file = Some(dir.path().join("missing.bin"));
        table.add(bios).unwrap();
        let mut old = vec![0u8; CHIP_SIZE];
        let mut new = staged();

        let result = reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut old, true, &mut NoReader),
            &mut new,
        );
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn test_overlap_prefers_region_containing_offset() {
        let dir = tempdir().unwrap();
        let b_path = dir.path().join("b.bin");
        fs::write(&b_path, vec![0xBB; 0x1000]).unwrap();

        let mut table = RegionTable::new();
        table.add(included("A", 0x0, 0xFFF)).unwrap();
        let mut b = included("B", 0x800, 0x17FF);
        b.override_file = Some(b_path);
        table.add(b).unwrap();

        assert_eq!(next_included_region(&table, 0).unwrap().name, "A");
        assert_eq!(next_included_region(&table, 0x1000).unwrap().name, "B");
        assert!(next_included_region(&table, 0x1800).is_none());

        let mut old = vec![0x11; CHIP_SIZE];
        let mut new = staged();
        let mut reader = Recorder::new(0x11);
        reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut old, false, &mut reader),
            &mut new,
        )
        .unwrap();

        // B was applied after A and its file covers B's whole range
        assert_eq!(new[..0x800], staged()[..0x800]);
        assert!(new[0x800..0x1800].iter().all(|&b| b == 0xBB));
        assert_eq!(reader.calls, [0x1800..CHIP_SIZE]);
    }

    #[test]
    fn test_overlap_tie_break_is_table_order() {
        let mut table = RegionTable::new();
        table.add(included("late", 0x2000, 0x2FFF)).unwrap();
        table.add(included("wide", 0x1000, 0x3FFF)).unwrap();
        table.add(included("same-start", 0x1000, 0x1FFF)).unwrap();

        // Nothing contains 0: the smallest start wins, first in table order
        assert_eq!(next_included_region(&table, 0).unwrap().name, "wide");
        // Both "late" and "wide" contain 0x2000: first in table order
        assert_eq!(next_included_region(&table, 0x2000).unwrap().name, "late");
    }

    #[test]
    fn test_region_at_end_of_address_space() {
        let mut table = RegionTable::new();
        table.add(included("top", 0xF000, u32::MAX)).unwrap();
        assert!(matches!(
            reconstruct(
                &table,
                true,
                CHIP_SIZE,
                OldContent::new(&mut vec![0; CHIP_SIZE], true, &mut NoReader),
                &mut staged(),
            ),
            Err(Error::RegionOutOfBounds { .. })
        ));

        let mut table = RegionTable::new();
        table.add(included("tail", 0xF000, 0xFFFF)).unwrap();
        let mut old = vec![0u8; CHIP_SIZE];
        let mut new = staged();
        let mut reader = Recorder::new(0x5A);
        let stats = reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut old, false, &mut reader),
            &mut new,
        )
        .unwrap();
        assert_eq!(reader.calls, [0..0xF000]);
        assert_eq!(stats.bytes_preserved, 0xF000);
    }

    #[test]
    fn test_includes_registered_but_nothing_included() {
        let table = RegionTable::new();
        let mut old = vec![0u8; CHIP_SIZE];
        let mut new = staged();
        let mut reader = Recorder::new(0x42);
        reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut old, false, &mut reader),
            &mut new,
        )
        .unwrap();
        assert_eq!(reader.calls, [0..CHIP_SIZE]);
        assert!(new.iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_short_buffers() {
        let table = RegionTable::new();
        let result = reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut vec![0; CHIP_SIZE - 1], true, &mut NoReader),
            &mut staged(),
        );
        assert!(matches!(result, Err(Error::BufferTooSmall { .. })));
    }

    #[test]
    fn test_reader_failure() {
        let mut table = RegionTable::new();
        table.add(included("bios", 0x1000, 0x1FFF)).unwrap();
        let mut old = vec![0u8; CHIP_SIZE];
        let mut new = staged();
        let result = reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut old, false, &mut NoReader),
            &mut new,
        );
        assert!(matches!(result, Err(Error::ChipRead { offset: 0, len: 0x1000, .. })));
    }

    #[test]
    fn test_closure_reader() {
        let mut table = RegionTable::new();
        table.add(included("bios", 0x0, 0x7FFF)).unwrap();
        let mut old = vec![0u8; CHIP_SIZE];
        let mut new = staged();
        let mut total = 0;
        let mut reader = |offset: u32, buf: &mut [u8]| -> io::Result<()> {
            assert_eq!(offset, 0x8000);
            total += buf.len();
            buf.fill(0xEE);
            Ok(())
        };
        reconstruct(
            &table,
            true,
            CHIP_SIZE,
            OldContent::new(&mut old, false, &mut reader),
            &mut new,
        )
        .unwrap();
        assert_eq!(total, 0x8000);
        assert!(new[0x8000..].iter().all(|&b| b == 0xEE));
    }
}
