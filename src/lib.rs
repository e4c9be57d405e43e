//! # splat-instruct: instruction-driven editing of dynamic Gaussian scenes
//!
//! This crate implements the edit-render-train loop used to steer a dynamic
//! 3D Gaussian-splatting scene toward a text instruction. A 2D image-editing
//! guidance model produces per-frame supervision targets; those targets are
//! cached, spliced back into the ground-truth frames, and used to jointly
//! train the scene geometry, a render refiner (generator) and a
//! discriminator.
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - `core`: Fundamental data structures (frames, cameras, patches, init)
//! - `edit`: Edit cache and guidance-input compositing
//! - `optim`: Losses, loss-weight schedules, and the training orchestrator
//! - `render`: The rasterizer contract (gradient-tracked and detached modes)
//! - `guidance`: The text-driven image editor contract
//! - `scene`: The scene-geometry adapter and loss-collaborator contracts
//! - `io`: Persistence (edit manifest, checkpoints, image grids, video)
//!
//! Rendering internals, the guidance model internals, and the neural loss
//! networks are external collaborators consumed through narrow trait
//! interfaces. Everything that makes the loop stateful lives here: the edit
//! cache, the patch protocol and the three-optimizer step ordering.

// Core data structures and math
pub mod core;

// Edit cache and compositing
pub mod edit;

// Text-driven guidance contract
pub mod guidance;

// I/O operations (manifest, checkpoints, grids, video)
pub mod io;

// Optimization (losses, schedules, training orchestration)
pub mod optim;

// Rasterizer contract
pub mod render;

// Scene geometry and loss collaborator contracts
pub mod scene;

// Re-export commonly used types at crate root for convenience
pub use crate::core::{Frame, PatchRect, PointCloud, ResolvedCamera};
pub use edit::{EditCache, GuidanceInput};
pub use optim::trainer::{Trainer, TrainerConfig};
pub use render::{RenderMode, RenderOutput};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
