//! romlayout - Flash layout tool
//!
//! Parses flashrom-style layout files, selects regions with `--include`
//! directives and builds the image a partial flash write would send to the
//! chip. The chip itself is emulated from an image file, so the tool also
//! shows how much of the chip a partial write has to read back.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, LayoutCommands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Layout(subcmd) => match subcmd {
            LayoutCommands::Show { layout } => commands::layout::cmd_show(&layout),
        },
        Commands::Build {
            layout,
            chip_size,
            old,
            new,
            output,
            preread,
        } => commands::build::cmd_build(&commands::build::BuildOptions {
            layout: &layout,
            chip_size,
            old: old.as_deref(),
            new: &new,
            output: &output,
            preread,
        }),
    };

    result
}
