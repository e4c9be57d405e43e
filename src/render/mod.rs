//! Rasterizer contract.
//!
//! Rendering internals are out of scope; the training loop consumes the
//! rasterizer through this interface. Two things matter to the loop:
//!
//! - rendering must distinguish gradient-tracked training passes from
//!   detached evaluation passes ([`RenderMode`]), and
//! - backward passes are driven from image space: the loop computes
//!   `dL/d(image)` and hands it back, the rasterizer accumulates parameter
//!   gradients internally and reports per-point view-space position
//!   gradients, which feed density control.

use crate::core::{PatchRect, ResolvedCamera};
use image::Rgb32FImage;
use nalgebra::Vector3;
use thiserror::Error;

/// Rasterizer failure. Aborts the current step; no retry.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Whether a render participates in gradient tracking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Gradient-tracked training pass.
    Train,

    /// Detached evaluation pass (guidance inputs, validation, test).
    Eval,
}

/// Per-step render result bundle. Lives for exactly one step.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    /// Primary RGB render at frame resolution, [0,1].
    pub render: Rgb32FImage,

    /// Refined RGB render of the patch region (refiner output resolution).
    pub refine: Rgb32FImage,

    /// Per-Gaussian visibility filter for this view.
    pub visibility: Vec<bool>,

    /// Per-Gaussian screen-space radii.
    pub radii: Vec<f32>,

    /// Background color the render used.
    pub background: Vector3<f32>,

    /// Dynamic-feature residual values, if the scene carries a deformation
    /// head. Regularized toward zero when present.
    pub dynamic_feature_residual: Option<Vec<f32>>,
}

impl RenderOutput {
    pub fn refine_size(&self) -> u32 {
        self.refine.width()
    }
}

/// Image-space gradients for a backward pass, row-major per pixel.
///
/// `d_render` matches the primary render, `d_refine` the refined patch.
/// Either may be absent when a pass only flows through one output.
#[derive(Clone, Debug, Default)]
pub struct RenderGrads {
    pub d_render: Option<Vec<Vector3<f32>>>,
    pub d_refine: Option<Vec<Vector3<f32>>>,
    /// Gradient toward the dynamic-feature residual, when the render
    /// reported one.
    pub d_dynamic_feature: Option<Vec<f32>>,
}

/// The splatting rasterizer plus its refiner head.
pub trait Renderer {
    /// Render one view at one moment, refining only the patch region.
    fn render(
        &mut self,
        camera: &ResolvedCamera,
        moment: usize,
        background: Vector3<f32>,
        patch: &PatchRect,
        mode: RenderMode,
    ) -> Result<RenderOutput, RenderError>;

    /// Push image-space gradients back through the most recent
    /// [`RenderMode::Train`] render.
    ///
    /// Accumulates into the scene-geometry and refiner parameter groups and
    /// returns the per-point view-space position gradients of this pass.
    /// With `retain_graph` the forward state stays alive so a second
    /// backward over the same render is valid.
    fn backward(
        &mut self,
        grads: RenderGrads,
        retain_graph: bool,
    ) -> Result<Vec<Vector3<f32>>, RenderError>;
}
