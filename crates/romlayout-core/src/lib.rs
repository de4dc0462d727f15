//! romlayout-core - Flash layout engine
//!
//! This crate parses flashrom-style text layouts, selects the regions a write
//! operation should touch, and reconstructs the image to send to the chip
//! from the caller's new image, per-region override files and the chip's
//! current content.
//!
//! The programmer transport is not part of this crate: old content is pulled
//! through the [`image::ChipReader`] trait, and only for the ranges that are
//! actually preserved.
//!
//! # Example
//!
//! ```ignore
//! use romlayout_core::LayoutSession;
//!
//! let mut session = LayoutSession::new();
//! session.parse_layout("board.layout")?;
//! session.register_include("bios:bios.bin")?;
//! session.resolve_includes()?;
//!
//! let mut old = vec![0u8; chip_size];
//! session.reconstruct_image(chip_size, &mut old, &mut image, false, &mut programmer)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod image;
pub mod layout;
pub mod session;

pub use error::{Error, Malformed, Result};
pub use session::LayoutSession;
