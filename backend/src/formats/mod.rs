//! Game file format inspection.
//!
//! Classification and the format-specific structural checks that run before
//! the source scanner: HTML skeleton rules, zip bundle layout, and thumbnail
//! headers. Nothing here executes submitted content.

pub mod bundle;
pub mod classifier;
pub mod html;
pub mod thumbnail;

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;

/// Largest game file the service will ever buffer (the 3d_premium ceiling).
pub const MAX_GAME_FILE_BYTES: u64 = 50 * MB;

/// Ceiling for a standalone script and for `game.js` inside a bundle.
pub const SCRIPT_MAX_BYTES: u64 = 50 * KB;

pub use classifier::{classify, read_cap, sniff_kind, Artifact, ArtifactKind};
