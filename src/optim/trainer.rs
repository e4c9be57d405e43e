//! Training orchestration.
//!
//! One trainer step walks the full edit-render-train protocol:
//!
//! 1. select the patch;
//! 2. refresh the edit cache if guidance is due (detached render, composite,
//!    guidance call, resize back to patch resolution, persist);
//! 3. splice the cached edit into the ground truth at the *cached* patch
//!    coordinates to form the authoritative target;
//! 4. gradient-tracked render;
//! 5. photometric backward with the graph retained, density control, then
//!    the weighted auxiliary backward;
//! 6. step and zero the geometry and generator optimizers, in that order;
//! 7. discriminator loss against the current cached target on a fresh
//!    forward, step and zero the discriminator optimizer last.
//!
//! The loop is single threaded and synchronous; collaborator failures abort
//! the step and propagate.

use crate::core::{
    crop_mask, crop_rgb, random_sphere_cloud, resolve_camera, select_patch, splice_rgb,
    CameraError, Frame, PatchRect, PointCloud,
};
use crate::edit::{composite, resize_rgb, CacheError, EditCache, EditPolicy};
use crate::guidance::{Guidance, GuidanceError, PromptEmbedding, PromptProcessor};
use crate::io::checkpoint::{peek_header, CheckpointError};
use crate::io::{assemble_video, save_image_grid};
use crate::optim::loss::{
    l1_loss_and_grad, mean_square_and_grad, mean_square_scalar_and_grad,
    photometric_loss_and_grad, rgb_to_vec,
};
use crate::optim::schedule::LossWeights;
use crate::render::{RenderError, RenderGrads, RenderMode, RenderOutput, Renderer};
use crate::scene::{AdversarialLoss, Optimizer, PerceptualLoss, SceneGeometry};

use image::Rgb32FImage;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the training loop. Each aborts the current step; the
/// camera variant is fatal for the whole run.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Guidance(#[from] GuidanceError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// A loss was asked for frame `frame` at step `step` while editing is
    /// active but no cache entry exists. `needs_edit` guarantees an entry
    /// before first use, so reaching this is a configuration or programming
    /// error.
    #[error("no edit cache entry for frame {frame} at step {step}")]
    MissingEditEntry { frame: usize, step: u64 },

    #[error("collaborator error: {0}")]
    Collaborator(#[from] anyhow::Error),
}

/// Training configuration.
#[derive(Clone, Debug)]
pub struct TrainerConfig {
    /// Scene extent passed to density control.
    pub extent: f32,

    /// Initial random point count when no prior geometry exists.
    pub num_pts: usize,

    /// Spatial budget handed to the geometry adapter at initialization.
    pub point_budget: f32,

    /// Probability of inverting the background to white for a step.
    pub invert_bg_prob: f32,

    /// Re-edit interval in steps; 0 disables editing.
    pub per_editing_step: u64,

    /// Global step at which editing starts.
    pub start_editing_step: u64,

    /// Side length S of the editing/refinement patch.
    pub patch_size: u32,

    /// Directory edits are persisted into.
    pub edit_dir: PathBuf,

    /// Prior edit directory to resume from, if any.
    pub resume_edit_dir: Option<PathBuf>,

    /// Directory for validation/test grids and videos.
    pub save_dir: PathBuf,

    /// Seed for the process-wide generator (point cloud, background flips).
    pub seed: u64,

    /// Frame rate of the assembled test video.
    pub test_fps: u32,

    /// Loss-term coefficients.
    pub weights: LossWeights,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            extent: 5.0,
            num_pts: 100,
            point_budget: 10.0,
            invert_bg_prob: 0.5,
            per_editing_step: 10,
            start_editing_step: 1000,
            patch_size: 512,
            edit_dir: PathBuf::from("outputs/edit"),
            resume_edit_dir: None,
            save_dir: PathBuf::from("outputs"),
            seed: 0,
            test_fps: 30,
            weights: LossWeights::default(),
        }
    }
}

/// External collaborators, injected at construction.
///
/// Selection among concrete implementations happens at the call site from a
/// closed set known at build time; the trainer never looks anything up by
/// name.
pub struct Collaborators {
    pub renderer: Box<dyn Renderer>,
    pub guidance: Box<dyn Guidance>,
    pub prompt_processor: Box<dyn PromptProcessor>,
    pub geometry: Box<dyn SceneGeometry>,
    pub perceptual: Box<dyn PerceptualLoss>,
    pub adversarial: Box<dyn AdversarialLoss>,
    /// Parameter-group optimizers, stepped in exactly this order.
    pub opt_geometry: Box<dyn Optimizer>,
    pub opt_generator: Box<dyn Optimizer>,
    pub opt_discriminator: Box<dyn Optimizer>,
}

/// Scalar outcome of one training step.
#[derive(Clone, Debug)]
pub struct StepReport {
    pub step: u64,
    pub edited: bool,
    pub loss_photometric: f32,
    pub loss_refine_l1: f32,
    pub loss_perceptual: f32,
    pub loss_generator: f32,
    pub loss_xyz_residual: f32,
    pub loss_scaling_residual: f32,
    pub loss_flow_residual: Option<f32>,
    pub loss_discriminator: f32,
    pub num_points: usize,
}

/// The per-step training orchestrator.
pub struct Trainer {
    cfg: TrainerConfig,
    cache: EditCache,
    renderer: Box<dyn Renderer>,
    guidance: Box<dyn Guidance>,
    prompt: PromptEmbedding,
    geometry: Box<dyn SceneGeometry>,
    perceptual: Box<dyn PerceptualLoss>,
    adversarial: Box<dyn AdversarialLoss>,
    opt_geometry: Box<dyn Optimizer>,
    opt_generator: Box<dyn Optimizer>,
    opt_discriminator: Box<dyn Optimizer>,
    rng: StdRng,
    global_step: u64,
}

impl Trainer {
    /// Build a trainer.
    ///
    /// Initializes the geometry from a random ball of points when it comes
    /// up empty, encodes the prompt once for reuse, and either resumes the
    /// edit cache from a prior directory or starts a fresh one.
    pub fn new(cfg: TrainerConfig, collaborators: Collaborators) -> Result<Self, TrainError> {
        let Collaborators {
            renderer,
            guidance,
            prompt_processor,
            mut geometry,
            perceptual,
            adversarial,
            opt_geometry,
            opt_generator,
            opt_discriminator,
        } = collaborators;

        let mut rng = StdRng::seed_from_u64(cfg.seed);

        if geometry.num_points() == 0 {
            log::info!(
                target: "splat_instruct::train",
                "generating random point cloud ({})",
                cfg.num_pts
            );
            let cloud = random_sphere_cloud(cfg.num_pts, &mut rng);
            geometry.create_from_initial_points(&cloud, cfg.point_budget);
        }

        let prompt = prompt_processor.embed()?;

        let policy = EditPolicy {
            per_editing_step: cfg.per_editing_step,
            start_editing_step: cfg.start_editing_step,
        };
        let cache = match &cfg.resume_edit_dir {
            Some(dir) => EditCache::load(dir, policy)?,
            None => EditCache::create(&cfg.edit_dir, policy)?,
        };

        Ok(Self {
            cfg,
            cache,
            renderer,
            guidance,
            prompt,
            geometry,
            perceptual,
            adversarial,
            opt_geometry,
            opt_generator,
            opt_discriminator,
            rng,
            global_step: 0,
        })
    }

    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    pub fn edit_cache(&self) -> &EditCache {
        &self.cache
    }

    pub fn num_points(&self) -> usize {
        self.geometry.num_points()
    }

    /// Re-create the geometry at the point count recorded in a checkpoint,
    /// so the persisted parameters can be applied on top.
    pub fn prepare_checkpoint_restore(&mut self, checkpoint: &Path) -> Result<u64, TrainError> {
        let header = peek_header(checkpoint)?;
        let cloud = PointCloud::placeholder(header.num_points as usize);
        self.geometry
            .create_from_initial_points(&cloud, self.cfg.point_budget);
        self.global_step = header.iteration;
        Ok(header.num_points)
    }

    /// Black background, inverted to white with probability
    /// `invert_bg_prob`.
    fn sample_background(&mut self) -> Vector3<f32> {
        if self.rng.gen::<f32>() < self.cfg.invert_bg_prob {
            Vector3::new(1.0, 1.0, 1.0)
        } else {
            Vector3::zeros()
        }
    }

    /// One detached or gradient-tracked render of `frame` at `patch`.
    fn render_frame(
        &mut self,
        frame: &Frame,
        patch: &PatchRect,
        background: Vector3<f32>,
        mode: RenderMode,
    ) -> Result<RenderOutput, TrainError> {
        let camera = resolve_camera(&frame.c2w, &frame.proj, frame.width(), frame.height())?;
        Ok(self
            .renderer
            .render(&camera, frame.moment, background, patch, mode)?)
    }

    /// Run guidance for this frame and record the result.
    ///
    /// Renders detached, composites the refined patch into the ground truth
    /// (mask-weighted when a mask exists), calls the guidance model, resizes
    /// its output back to patch resolution and overwrites the cache entry
    /// plus the on-disk manifest.
    fn refresh_edit(
        &mut self,
        frame: &Frame,
        patch: &PatchRect,
        background: Vector3<f32>,
    ) -> Result<(), TrainError> {
        let full_out = self.render_frame(frame, patch, background, RenderMode::Eval)?;
        let refine_size = full_out.refine_size();

        let original_patch = crop_rgb(&frame.gt_rgb, patch);
        let mask_patch = frame.mask.as_ref().map(|m| crop_mask(m, patch));
        let input = composite(
            &full_out.refine,
            &original_patch,
            mask_patch.as_ref(),
            refine_size,
        );

        let edited = self.guidance.edit(&input, &original_patch, &self.prompt)?;
        if edited.width() != input.size() || edited.height() != input.size() {
            return Err(GuidanceError::MalformedOutput {
                expected: input.size(),
                got_w: edited.width(),
                got_h: edited.height(),
            }
            .into());
        }

        // Cache at source-patch resolution, detached.
        let edited = resize_rgb(&edited, patch.size, patch.size);
        self.cache.record(frame.index, edited, (patch.x, patch.y))?;

        log::debug!(
            target: "splat_instruct::train",
            "edited frame {} at step {} (patch {},{})",
            frame.index,
            self.global_step,
            patch.x,
            patch.y
        );
        Ok(())
    }

    /// The authoritative photometric target: ground truth with the cached
    /// edit spliced in at the coordinates stored with the entry (which may
    /// differ from this step's selection).
    ///
    /// Requires a cache entry when editing is active; before that, or when a
    /// resumed cache happens to hold an entry early, the entry still wins.
    fn spliced_target(&self, frame: &Frame, step: u64) -> Result<Rgb32FImage, TrainError> {
        let entry = match self.cache.get(frame.index) {
            Some(entry) => entry,
            None if self.cache.policy().editing_active(step) => {
                return Err(TrainError::MissingEditEntry {
                    frame: frame.index,
                    step,
                });
            }
            None => return Ok(frame.gt_rgb.clone()),
        };

        let mut target = frame.gt_rgb.clone();
        let entry_patch = PatchRect {
            x: entry.patch.0,
            y: entry.patch.1,
            size: self.cfg.patch_size,
        };
        let resized = resize_rgb(&entry.image, entry_patch.size, entry_patch.size);
        splice_rgb(&mut target, &entry_patch, &resized);
        Ok(target)
    }

    /// The target the refiner and discriminator are supervised on: the
    /// current cache entry (possibly written earlier this very step, and
    /// possibly stale on steps where editing did not run), or the raw
    /// ground-truth patch while no entry exists yet.
    fn edit_target(&self, frame: &Frame, patch: &PatchRect, size: u32) -> Rgb32FImage {
        match self.cache.get(frame.index) {
            Some(entry) => resize_rgb(&entry.image, size, size),
            None => resize_rgb(&crop_rgb(&frame.gt_rgb, patch), size, size),
        }
    }

    /// Run one training step.
    pub fn training_step(&mut self, frame: &Frame) -> Result<StepReport, TrainError> {
        let step = self.global_step;
        let patch = select_patch(
            frame.width(),
            frame.height(),
            self.cfg.patch_size,
            frame.bbox,
        );

        // Geometry learning rates advance at half the step rate; past the
        // coarse schedule the fine one takes over.
        let iteration = step / 2;
        let lr_max = self.geometry.position_lr_max_steps();
        if iteration < lr_max {
            self.geometry.update_learning_rate(iteration);
        } else {
            self.geometry.update_learning_rate_fine(iteration - lr_max);
        }

        let background = self.sample_background();

        // Cache refresh. The only point in the step where the cache is
        // written; all reads below observe this step's entry.
        let mut edited = false;
        if self.cache.needs_edit(frame.index, step) {
            self.refresh_edit(frame, &patch, background)?;
            edited = true;
        }

        let target_full = self.spliced_target(frame, step)?;

        // Gradient-tracked render.
        let out = self.render_frame(frame, &patch, background, RenderMode::Train)?;

        // Photometric term, backed first with the graph retained: density
        // control reads the per-point accumulators this backward populates.
        let (loss_photometric, d_render) = photometric_loss_and_grad(
            &rgb_to_vec(&out.render),
            &rgb_to_vec(&target_full),
            frame.width(),
            frame.height(),
        );
        let viewspace_grads = self.renderer.backward(
            RenderGrads {
                d_render: Some(d_render),
                ..Default::default()
            },
            true,
        )?;

        self.geometry.update_density_control(
            iteration,
            &out.visibility,
            &out.radii,
            &viewspace_grads,
            self.cfg.extent,
        );

        // Weighted auxiliary sum toward the cached edit target.
        let refine_size = out.refine_size();
        let edit_target = self.edit_target(frame, &patch, refine_size);
        let refine_vec = rgb_to_vec(&out.refine);
        let edit_vec = rgb_to_vec(&edit_target);

        let w_l1 = self.cfg.weights.lambda_g_l1.value(step);
        let (loss_refine_l1, mut d_refine) = l1_loss_and_grad(&refine_vec, &edit_vec);
        for g in &mut d_refine {
            *g *= w_l1;
        }

        let loss_perceptual = self.perceptual.distance(
            &out.refine,
            &edit_target,
            self.cfg.weights.lambda_g_perceptual.value(step),
        )?;
        let loss_generator = self.adversarial.generator_loss(
            &edit_target,
            &out.refine,
            self.cfg.weights.lambda_g_adversarial.value(step),
        )?;

        // Residual regularizers keep the corrective offsets near zero.
        let w_xyz = self.cfg.weights.lambda_xyz_residual.value(step);
        let (loss_xyz_residual, mut d_xyz) = mean_square_and_grad(self.geometry.xyz_residual());
        for g in &mut d_xyz {
            *g *= w_xyz;
        }
        let w_scaling = self.cfg.weights.lambda_scaling_residual.value(step);
        let (loss_scaling_residual, mut d_scaling) =
            mean_square_and_grad(self.geometry.scaling_residual());
        for g in &mut d_scaling {
            *g *= w_scaling;
        }
        self.geometry.accumulate_residual_grads(&d_xyz, &d_scaling);

        let mut loss_flow_residual = None;
        let mut d_dynamic_feature = None;
        if let Some(features) = &out.dynamic_feature_residual {
            let w_flow = self.cfg.weights.lambda_flow_residual.value(step);
            let (loss, mut d) = mean_square_scalar_and_grad(features);
            for g in &mut d {
                *g *= w_flow;
            }
            loss_flow_residual = Some(loss);
            d_dynamic_feature = Some(d);
        }

        // Second backward over the same render; the graph was retained.
        self.renderer.backward(
            RenderGrads {
                d_render: None,
                d_refine: Some(d_refine),
                d_dynamic_feature,
            },
            false,
        )?;

        // Geometry before generator; the discriminator comes after both.
        self.opt_geometry.step();
        self.opt_generator.step();
        self.opt_geometry.zero_grad();
        self.opt_generator.zero_grad();

        // Discriminator pass: fresh forward, same cached target as above.
        let w_d = self.cfg.weights.lambda_discriminator.value(step);
        let loss_discriminator =
            self.adversarial
                .discriminator_loss(&edit_target, &out.refine, w_d)?
                * w_d;
        self.opt_discriminator.step();
        self.opt_discriminator.zero_grad();

        let report = StepReport {
            step,
            edited,
            loss_photometric,
            loss_refine_l1,
            loss_perceptual,
            loss_generator,
            loss_xyz_residual,
            loss_scaling_residual,
            loss_flow_residual,
            loss_discriminator,
            num_points: self.geometry.num_points(),
        };

        log::debug!(
            target: "splat_instruct::train",
            "step {}: photometric={:.6} refine_l1={:.6} D={:.6} gaussians={}",
            step,
            report.loss_photometric,
            report.loss_refine_l1,
            report.loss_discriminator,
            report.num_points
        );

        self.global_step += 1;
        Ok(report)
    }

    /// Render a validation view and persist a side-by-side grid of the
    /// primary render, the refined patch and the comparison target (the
    /// cached edit resized to frame resolution when one exists).
    pub fn validation_step(&mut self, frame: &Frame) -> Result<PathBuf, TrainError> {
        let patch = select_patch(
            frame.width(),
            frame.height(),
            self.cfg.patch_size,
            frame.bbox,
        );
        let out = self.render_frame(frame, &patch, Vector3::zeros(), RenderMode::Eval)?;

        let comparison = match self.cache.get(frame.index) {
            Some(entry) => resize_rgb(&entry.image, frame.width(), frame.height()),
            None => frame.gt_rgb.clone(),
        };

        let path = self
            .cfg
            .save_dir
            .join(format!("it{}-{}.png", self.global_step, frame.index));
        save_image_grid(&path, &[&out.render, &out.refine, &comparison])?;
        Ok(path)
    }

    /// Render a test view and persist a render/refine grid under the test
    /// directory, named by frame index so the video pass can order it.
    pub fn test_step(&mut self, frame: &Frame) -> Result<PathBuf, TrainError> {
        let patch = select_patch(
            frame.width(),
            frame.height(),
            self.cfg.patch_size,
            frame.bbox,
        );
        let out = self.render_frame(frame, &patch, Vector3::zeros(), RenderMode::Eval)?;

        let path = self
            .test_dir()
            .join(format!("{:05}.png", frame.index));
        save_image_grid(&path, &[&out.render, &out.refine])?;
        Ok(path)
    }

    /// Assemble every saved test frame into a video at the configured rate.
    pub fn on_test_epoch_end(&self) -> anyhow::Result<PathBuf> {
        let dir = self.test_dir();
        let out = self
            .cfg
            .save_dir
            .join(format!("it{}-test.mp4", self.global_step));
        assemble_video(&dir, &out, self.cfg.test_fps)?;
        Ok(out)
    }

    fn test_dir(&self) -> PathBuf {
        self.cfg
            .save_dir
            .join(format!("it{}-test", self.global_step))
    }
}
