//! I/O operations for loading and saving data.
//!
//! This module handles everything persisted by the training loop:
//! - Edit manifest (`edit.json`) serialization
//! - Checkpoint headers (point count for geometry restore)
//! - Validation/test image grids
//! - Test-epoch video assembly

pub mod checkpoint;
pub mod grid;
pub mod manifest;
pub mod video;

// Re-export public types and functions
pub use checkpoint::{peek_header, read_header, write_header, CheckpointError, CheckpointHeader};
pub use grid::{compose_grid, quantize_unit_rgb, save_image_grid};
pub use manifest::{EditManifest, ManifestRecord, MANIFEST_FILE};
pub use video::{assemble_video, collect_numbered_frames};
