//! Scene-geometry adapter and loss-collaborator contracts.
//!
//! The point-based scene representation owns its parameters, learning-rate
//! schedules and density-control state. The training loop never mutates the
//! geometry directly: it drives growth and pruning through
//! [`SceneGeometry::update_density_control`] after the photometric backward
//! has populated the per-point gradient accumulators.
//!
//! The perceptual and adversarial losses are neural collaborators. Their
//! methods take the term's configured weight and accumulate the weighted
//! gradients into their own parameter groups; the loop only sees scalar
//! loss values.

use crate::core::PointCloud;
use image::Rgb32FImage;
use nalgebra::Vector3;

/// The point-based scene representation.
pub trait SceneGeometry {
    /// (Re-)initialize from an initial point cloud with a spatial budget.
    fn create_from_initial_points(&mut self, cloud: &PointCloud, budget: f32);

    /// Current number of scene points.
    fn num_points(&self) -> usize;

    /// Length of the coarse position learning-rate schedule.
    fn position_lr_max_steps(&self) -> u64;

    /// Advance the coarse learning-rate schedule.
    fn update_learning_rate(&mut self, step: u64);

    /// Advance the fine schedule, used once the coarse one is exhausted.
    /// `step` counts from the end of the coarse schedule.
    fn update_learning_rate_fine(&mut self, step: u64);

    /// Grow/prune points from this step's statistics.
    ///
    /// Must run after a backward pass has populated the per-point gradient
    /// accumulators and before the parameters move again: it inspects those
    /// accumulators together with the view-space position gradients.
    fn update_density_control(
        &mut self,
        iteration: u64,
        visibility: &[bool],
        radii: &[f32],
        viewspace_grads: &[Vector3<f32>],
        extent: f32,
    );

    /// Differentiable per-point position correction offsets.
    fn xyz_residual(&self) -> &[Vector3<f32>];

    /// Differentiable per-point scale correction offsets.
    fn scaling_residual(&self) -> &[Vector3<f32>];

    /// Accumulate regularizer gradients into the residual parameters.
    fn accumulate_residual_grads(&mut self, d_xyz: &[Vector3<f32>], d_scaling: &[Vector3<f32>]);
}

/// Perceptual-similarity loss network.
pub trait PerceptualLoss {
    /// Weighted perceptual distance between `value` and `target`.
    ///
    /// Accumulates `weight`-scaled gradients toward `value`'s producer and
    /// returns the unweighted scalar distance.
    fn distance(
        &mut self,
        value: &Rgb32FImage,
        target: &Rgb32FImage,
        weight: f32,
    ) -> anyhow::Result<f32>;
}

/// GAN loss pair around the discriminator network.
///
/// Both sides read the same `target`/`refined` pair; within one training
/// step the target must be the cache entry as written earlier in that step.
pub trait AdversarialLoss {
    /// Generator-side loss: accumulates `weight`-scaled gradients into the
    /// refiner through the discriminator, discriminator frozen. Returns the
    /// unweighted scalar loss.
    fn generator_loss(
        &mut self,
        target: &Rgb32FImage,
        refined: &Rgb32FImage,
        weight: f32,
    ) -> anyhow::Result<f32>;

    /// Discriminator-side loss: a fresh forward through the discriminator
    /// only, no graph shared with the generator pass. Accumulates
    /// `weight`-scaled gradients into the discriminator parameters and
    /// returns the unweighted scalar loss; the caller applies the weight to
    /// the reported value.
    fn discriminator_loss(
        &mut self,
        target: &Rgb32FImage,
        refined: &Rgb32FImage,
        weight: f32,
    ) -> anyhow::Result<f32>;
}

/// One independently stepped parameter group.
///
/// The loop holds three of these (geometry, generator, discriminator) and
/// steps them in exactly that order: the discriminator loss reads the
/// generator's freshly updated output.
pub trait Optimizer {
    /// Apply accumulated gradients.
    fn step(&mut self);

    /// Clear accumulated gradients.
    fn zero_grad(&mut self);
}
