//! romlayout-dummy - In-memory flash emulator
//!
//! This crate provides a dummy chip that holds its contents in memory and
//! serves them through [`ChipReader`]. Every read is recorded, which makes
//! it useful for checking how much of a chip an operation actually reads
//! without real hardware.

use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;

use romlayout_core::image::ChipReader;

/// Configuration for the dummy chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Largest single read the emulated programmer accepts (0 = unlimited)
    pub max_read_len: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: 16 * 1024 * 1024,
            max_read_len: 0,
        }
    }
}

/// Dummy flash chip
///
/// Emulates an erased (all `0xFF`) chip unless created with initial data.
pub struct DummyChip {
    config: DummyConfig,
    data: Vec<u8>,
    reads: Vec<Range<usize>>,
}

impl DummyChip {
    /// Create a new erased dummy chip with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            reads: Vec::new(),
        }
    }

    /// Create a new dummy chip with default configuration (16 MiB)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy chip with pre-filled data
    ///
    /// Data beyond the chip size is ignored; a shorter buffer leaves the
    /// rest erased.
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut chip = Self::new(config);
        let len = core::cmp::min(initial_data.len(), chip.data.len());
        chip.data[..len].copy_from_slice(&initial_data[..len]);
        chip
    }

    /// Create a dummy chip whose contents come from an image file
    ///
    /// The chip size is the file size.
    pub fn from_image_file(path: impl AsRef<Path>, max_read_len: usize) -> io::Result<Self> {
        let data = fs::read(path.as_ref())?;
        log::debug!(
            "Dummy chip loaded {} bytes from {:?}",
            data.len(),
            path.as_ref()
        );
        Ok(Self {
            config: DummyConfig {
                size: data.len(),
                max_read_len,
            },
            data,
            reads: Vec::new(),
        })
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Chip size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Byte ranges of every read so far, in order
    pub fn reads(&self) -> &[Range<usize>] {
        &self.reads
    }

    /// Total number of bytes read so far
    pub fn bytes_read(&self) -> usize {
        self.reads.iter().map(|r| r.len()).sum()
    }

    /// Forget the recorded reads
    pub fn reset_stats(&mut self) {
        self.reads.clear();
    }
}

impl ChipReader for DummyChip {
    fn read_range(&mut self, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "read of {} bytes at {:#x} beyond chip size {:#x}",
                        buf.len(),
                        offset,
                        self.data.len()
                    ),
                )
            })?;

        let chunk = match self.config.max_read_len {
            0 => buf.len(),
            n => n,
        };
        for (i, piece) in buf.chunks_mut(chunk.max(1)).enumerate() {
            let from = start + i * chunk;
            piece.copy_from_slice(&self.data[from..from + piece.len()]);
        }

        log::trace!("Dummy read 0x{:08x}..0x{:08x}", start, end);
        self.reads.push(start..end);
        Ok(())
    }
}
