//! Layout command implementations

use crate::cli::LayoutArgs;
use romlayout_core::layout::RegionTable;

/// Show the region table built from the given layout files
pub fn cmd_show(args: &LayoutArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.layout.is_empty() {
        return Err("No layout file given. Use --layout FILE.".into());
    }

    let session = super::load_session(args)?;
    print_layout(session.table(), !session.includes().is_empty());
    Ok(())
}

/// Print the region table
///
/// The include column is only meaningful once directives were resolved.
pub fn print_layout(table: &RegionTable, selection: bool) {
    println!("Layout Information");
    println!("==================");
    println!("Regions: {} of {}", table.len(), table.capacity());

    println!(
        "\n{:<20} {:>10} {:>10} {:>10} {:>8}  {}",
        "Name", "Start", "End", "Size", "Include", "File"
    );
    println!("{:-<74}", "");

    for region in table.iter() {
        let include = match (selection, region.included) {
            (false, _) => "all",
            (true, true) => "yes",
            (true, false) => "-",
        };
        let file = region
            .override_file()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        println!(
            "{:<20} {:#010X} {:#010X} {:>10} {:>8}  {}",
            region.name,
            region.start,
            region.end,
            super::format_size(region.size()),
            include,
            file
        );
    }
}
