//! Optimization components (losses, schedules, training orchestration).
//!
//! This module contains everything needed for training:
//! - Loss terms with explicit gradients
//! - Time-varying loss-weight schedules
//! - The per-step training orchestrator

pub mod loss;
pub mod schedule;
pub mod trainer;

pub use schedule::{LossWeights, WeightSchedule};
pub use trainer::{Collaborators, StepReport, TrainError, Trainer, TrainerConfig};
