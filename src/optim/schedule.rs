//! Loss-weight schedules.
//!
//! Each auxiliary loss term carries a coefficient that may vary over
//! training. Constant covers most terms; the linear ramp matches how the
//! adversarial and perceptual weights are typically warmed up after editing
//! starts.

use serde::{Deserialize, Serialize};

/// A possibly time-varying loss coefficient.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum WeightSchedule {
    /// Fixed coefficient.
    Constant(f32),

    /// Linear ramp from `from` at `start_step` to `to` at `end_step`,
    /// clamped outside that range.
    Linear {
        from: f32,
        to: f32,
        start_step: u64,
        end_step: u64,
    },
}

impl WeightSchedule {
    /// Coefficient value at a global step.
    pub fn value(&self, step: u64) -> f32 {
        match *self {
            WeightSchedule::Constant(v) => v,
            WeightSchedule::Linear {
                from,
                to,
                start_step,
                end_step,
            } => {
                if step <= start_step || end_step <= start_step {
                    from
                } else if step >= end_step {
                    to
                } else {
                    let t = (step - start_step) as f32 / (end_step - start_step) as f32;
                    from + (to - from) * t
                }
            }
        }
    }

    /// A schedule that is zero everywhere.
    pub fn off() -> Self {
        WeightSchedule::Constant(0.0)
    }
}

/// Coefficients for every term of the weighted auxiliary sum plus the
/// discriminator loss.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LossWeights {
    /// Image-space L1 between refined render and cached edit target.
    pub lambda_g_l1: WeightSchedule,

    /// Perceptual distance between refined render and cached edit target.
    pub lambda_g_perceptual: WeightSchedule,

    /// Adversarial generator loss.
    pub lambda_g_adversarial: WeightSchedule,

    /// L2 regularizer on position residuals.
    pub lambda_xyz_residual: WeightSchedule,

    /// L2 regularizer on scale residuals.
    pub lambda_scaling_residual: WeightSchedule,

    /// L2 regularizer on the dynamic-feature residual, when reported.
    pub lambda_flow_residual: WeightSchedule,

    /// Discriminator loss scale.
    pub lambda_discriminator: WeightSchedule,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            lambda_g_l1: WeightSchedule::Constant(1.0),
            lambda_g_perceptual: WeightSchedule::Constant(1.0),
            lambda_g_adversarial: WeightSchedule::Constant(0.01),
            lambda_xyz_residual: WeightSchedule::Constant(1.0),
            lambda_scaling_residual: WeightSchedule::Constant(1.0),
            lambda_flow_residual: WeightSchedule::Constant(1.0),
            lambda_discriminator: WeightSchedule::Constant(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_schedule() {
        let s = WeightSchedule::Constant(0.5);
        assert_relative_eq!(s.value(0), 0.5);
        assert_relative_eq!(s.value(1_000_000), 0.5);
    }

    #[test]
    fn test_linear_ramp_clamps() {
        let s = WeightSchedule::Linear {
            from: 0.0,
            to: 1.0,
            start_step: 100,
            end_step: 200,
        };
        assert_relative_eq!(s.value(0), 0.0);
        assert_relative_eq!(s.value(100), 0.0);
        assert_relative_eq!(s.value(150), 0.5);
        assert_relative_eq!(s.value(200), 1.0);
        assert_relative_eq!(s.value(500), 1.0);
    }

    #[test]
    fn test_degenerate_ramp_holds_start_value() {
        let s = WeightSchedule::Linear {
            from: 0.3,
            to: 0.7,
            start_step: 50,
            end_step: 50,
        };
        assert_relative_eq!(s.value(49), 0.3);
        assert_relative_eq!(s.value(51), 0.3);
    }
}
