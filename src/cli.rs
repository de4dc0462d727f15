//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a size string like "16 MiB", "0x1000000" or "65536"
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<usize>() {
        return Ok(n);
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return usize::from_str_radix(hex.trim(), 16)
            .map_err(|e| format!("Invalid hex value: {}", e));
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: usize = num_str
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

#[derive(Parser)]
#[command(name = "romlayout")]
#[command(author, version, about = "Flash layout tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Layout and region selection shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct LayoutArgs {
    /// Layout file in flashrom text syntax (may be given several times)
    #[arg(short, long)]
    pub layout: Vec<PathBuf>,

    /// Select a region, optionally with a file holding its content
    /// (`name` or `name:file`, may be given several times)
    #[arg(short, long, value_name = "REGION[:FILE]")]
    pub include: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Layout file operations
    #[command(subcommand)]
    Layout(LayoutCommands),

    /// Build the image a partial write would send to the chip
    Build {
        #[command(flatten)]
        layout: LayoutArgs,

        /// Chip size (defaults to the size of the old image)
        #[arg(long, value_parser = parse_size)]
        chip_size: Option<usize>,

        /// Current chip content; the chip is emulated from this image
        /// (erased if omitted)
        #[arg(long)]
        old: Option<PathBuf>,

        /// New image, padded with 0xFF up to the chip size
        #[arg(long)]
        new: PathBuf,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Read the whole chip up front instead of only the preserved ranges
        #[arg(long)]
        preread: bool,
    },
}

#[derive(Subcommand)]
pub enum LayoutCommands {
    /// Parse layout files and show the region table
    Show {
        #[command(flatten)]
        layout: LayoutArgs,
    },
}
