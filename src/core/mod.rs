//! Core data structures and math.
//!
//! This module contains the fundamental types used throughout the system:
//! - `Frame`: one time slice of the captured scene
//! - `ResolvedCamera`: rasterizer-convention camera derived per batch
//! - `PatchRect`: the square editing/refinement region
//! - Point-cloud initialization for the geometry adapter
//!
//! All types here are "pure data" - no I/O, no rendering logic.

mod camera;
mod frame;
pub mod init;
mod patch;

// Re-export public types
pub use camera::{
    fov_from_projection, projection_matrix, resolve_camera, CameraError, ResolvedCamera, ZFAR,
    ZNEAR,
};
pub use frame::{crop_mask, crop_rgb, splice_rgb, Frame, MaskImage};
pub use init::{random_sphere_cloud, PointCloud, SH_C0};
pub use patch::{select_patch, PatchRect};
