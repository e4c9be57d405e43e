//! Text-driven image-editing guidance contract.
//!
//! The guidance model takes the composited patch (refined render blended
//! into ground truth), the original ground-truth patch, and a prompt
//! embedding, and returns an edited image that becomes the supervision
//! target for that frame. It is stateless per call; internally it may run an
//! iterative diffusion process, which is why edits are expensive and cached.
//!
//! Implementations are injected at construction from a closed set known at
//! build time; there is no string-keyed registry.

use crate::edit::GuidanceInput;
use image::Rgb32FImage;
use thiserror::Error;

/// Guidance failure. Editing is expensive, so there is no automatic retry:
/// the error aborts the current step and retry policy is the operator's.
#[derive(Debug, Error)]
pub enum GuidanceError {
    /// The model returned an image of the wrong shape.
    #[error("malformed guidance output: expected {expected}x{expected}, got {got_w}x{got_h}")]
    MalformedOutput {
        expected: u32,
        got_w: u32,
        got_h: u32,
    },

    #[error("guidance backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Reusable prompt embedding consumed by [`Guidance::edit`].
///
/// Opaque to the training loop; produced once by a [`PromptProcessor`] and
/// handed to every edit call.
#[derive(Clone, Debug)]
pub struct PromptEmbedding(Vec<f32>);

impl PromptEmbedding {
    pub fn new(data: Vec<f32>) -> Self {
        Self(data)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Encodes the editing instruction into a reusable embedding.
pub trait PromptProcessor {
    fn embed(&self) -> Result<PromptEmbedding, GuidanceError>;
}

/// The instruction-conditioned image editor.
pub trait Guidance {
    /// Edit the composited patch toward the instruction.
    ///
    /// The returned image must match the input's spatial resolution; the
    /// caller verifies this and surfaces a
    /// [`GuidanceError::MalformedOutput`] otherwise.
    fn edit(
        &mut self,
        input: &GuidanceInput,
        original_patch: &Rgb32FImage,
        prompt: &PromptEmbedding,
    ) -> Result<Rgb32FImage, GuidanceError>;
}
