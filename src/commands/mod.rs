//! CLI command implementations
//!
//! Both commands load layouts and include directives into a
//! [`romlayout_core::LayoutSession`] the same way; `build` then reconstructs
//! an image against an emulated chip.

pub mod build;
pub mod layout;

use crate::cli::LayoutArgs;
use romlayout_core::LayoutSession;

/// Parse every layout file and apply the include directives
fn load_session(args: &LayoutArgs) -> Result<LayoutSession, Box<dyn std::error::Error>> {
    let mut session = LayoutSession::new();

    for file in &args.layout {
        session.parse_layout(file)?;
        log::debug!("Loaded layout {:?}", file);
    }
    for spec in &args.include {
        session.register_include(spec.as_str())?;
    }
    session.resolve_includes()?;

    Ok(session)
}

/// Format a byte count for display
fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
