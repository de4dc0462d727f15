//! Image build command
//!
//! Emulates the preparation step of a partial flash write: the chip content
//! comes from an image file loaded into a [`DummyChip`], and the resulting
//! image is written to a file instead of the chip.

use std::fs;
use std::io;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use romlayout_core::image::{ChipReader, NoReader, MAX_CHIP_SIZE};
use romlayout_core::layout::RegionTable;
use romlayout_dummy::{DummyChip, DummyConfig};

use crate::cli::LayoutArgs;

/// Default chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

/// Options of the build command
pub struct BuildOptions<'a> {
    /// Layout files and include directives
    pub layout: &'a LayoutArgs,
    /// Chip size, if given explicitly
    pub chip_size: Option<usize>,
    /// Image holding the current chip content
    pub old: Option<&'a Path>,
    /// New image
    pub new: &'a Path,
    /// Output image
    pub output: &'a Path,
    /// Read the whole chip before reconstructing
    pub preread: bool,
}

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Chip reader that advances a progress bar
struct ProgressReader<'a, R: ChipReader + ?Sized> {
    inner: &'a mut R,
    pb: ProgressBar,
}

impl<R: ChipReader + ?Sized> ChipReader for ProgressReader<'_, R> {
    fn read_range(&mut self, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        self.inner.read_range(offset, buf)?;
        self.pb.inc(buf.len() as u64);
        Ok(())
    }
}

/// Number of chip bytes outside every included region
fn preserved_bytes(table: &RegionTable, chip_size: usize) -> u64 {
    let mut spans: Vec<(u64, u64)> = table
        .included()
        .map(|r| (r.start as u64, (r.end as u64 + 1).min(chip_size as u64)))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort_unstable();

    let mut covered = 0;
    let mut reach = 0;
    for (start, end) in spans {
        let start = start.max(reach);
        if end > start {
            covered += end - start;
            reach = end;
        }
    }
    chip_size as u64 - covered
}

/// Read the whole chip in chunks
fn preread_chip(chip: &mut DummyChip, old: &mut [u8]) -> Result<(), Box<dyn std::error::Error>> {
    let pb = create_progress_bar_with_phase(old.len() as u64, "Reading")?;

    let mut offset = 0usize;
    for chunk in old.chunks_mut(READ_CHUNK_SIZE) {
        chip.read_range(offset as u32, chunk)?;
        offset += chunk.len();
        pb.set_position(offset as u64);
    }

    pb.finish_with_message("Read complete");
    Ok(())
}

/// Build the image a partial write would send to the chip
pub fn cmd_build(opts: &BuildOptions<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let session = super::load_session(opts.layout)?;

    let mut chip = match opts.old {
        Some(path) => DummyChip::from_image_file(path, READ_CHUNK_SIZE)
            .map_err(|e| format!("Failed to load old image {:?}: {}", path, e))?,
        None => {
            let size = opts.chip_size.ok_or("Either --old or --chip-size is required")?;
            DummyChip::new(DummyConfig {
                size,
                max_read_len: READ_CHUNK_SIZE,
            })
        }
    };

    let chip_size = opts.chip_size.unwrap_or(chip.size());
    if chip_size != chip.size() {
        return Err(format!(
            "Old image is {} bytes but chip size is {} bytes",
            chip.size(),
            chip_size
        )
        .into());
    }
    if chip_size == 0 || chip_size as u64 > MAX_CHIP_SIZE {
        return Err(format!("Unsupported chip size {}", chip_size).into());
    }
    println!(
        "Chip size: {} bytes ({})",
        chip_size,
        super::format_size(chip_size as u64)
    );

    let mut image = fs::read(opts.new)?;
    println!("Read {} bytes from {:?}", image.len(), opts.new);
    if image.len() > chip_size {
        return Err(format!(
            "New image is {} bytes, larger than the chip ({} bytes)",
            image.len(),
            chip_size
        )
        .into());
    }
    if image.len() < chip_size {
        log::info!(
            "Padding new image with 0xFF from 0x{:08X} to 0x{:08X}",
            image.len(),
            chip_size
        );
        image.resize(chip_size, 0xFF);
    }

    let mut old = vec![0u8; chip_size];
    let stats = if opts.preread {
        preread_chip(&mut chip, &mut old)?;
        session.reconstruct_image(chip_size, &mut old, &mut image, true, &mut NoReader)?
    } else {
        let expected = if session.includes().is_empty() {
            0
        } else {
            preserved_bytes(session.table(), chip_size)
        };
        let pb = create_progress_bar_with_phase(expected, "Reading")?;
        let mut reader = ProgressReader {
            inner: &mut chip,
            pb,
        };
        let stats =
            session.reconstruct_image(chip_size, &mut old, &mut image, false, &mut reader)?;
        reader.pb.finish_with_message("Read complete");
        stats
    };

    log::info!(
        "Reconstructed image: {} bytes preserved, {} bytes from files",
        stats.bytes_preserved,
        stats.bytes_from_files
    );
    log::debug!(
        "{} chip reads, {} bytes through the reader",
        stats.chip_reads,
        stats.bytes_read
    );
    println!(
        "Read {} of {} chip bytes in {} operation(s)",
        chip.bytes_read(),
        chip_size,
        chip.reads().len()
    );

    fs::write(opts.output, &image)?;
    println!("Wrote {} bytes to {:?}", image.len(), opts.output);

    Ok(())
}
