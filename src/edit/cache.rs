//! The edit cache.
//!
//! A process-lifetime map from frame index to the most recent edited image
//! and the patch location it was produced at. The cache is persisted as it
//! grows: one image per frame plus a single `edit.json` manifest, rewritten
//! after every edit so a killed run resumes without re-editing.
//!
//! `record` and `load` are the only mutators. The step loop is single
//! threaded, so reads never race writes; the only ordering requirement is
//! read-after-write within one step.

use crate::io::grid::quantize_unit_rgb;
use crate::io::manifest::{EditManifest, ManifestRecord};
use image::Rgb32FImage;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from cache persistence.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// When to (re-)invoke guidance.
#[derive(Clone, Copy, Debug)]
pub struct EditPolicy {
    /// Re-edit every N steps; 0 disables editing entirely.
    pub per_editing_step: u64,

    /// Global step at which editing starts.
    pub start_editing_step: u64,
}

impl EditPolicy {
    /// Whether the editing phase is active at `step`.
    pub fn editing_active(&self, step: u64) -> bool {
        self.per_editing_step > 0 && step >= self.start_editing_step
    }
}

/// The last edit for one frame.
#[derive(Clone, Debug)]
pub struct EditCacheEntry {
    /// Edited image at source-patch resolution, detached from any gradient
    /// state (a plain pixel buffer).
    pub image: Rgb32FImage,

    /// Patch top-left `(x, y)` the edit was produced at. Splicing always
    /// follows these coordinates, not the current step's selection.
    pub patch: (u32, u32),
}

/// Process-lifetime edited-frame store with a disk mirror.
pub struct EditCache {
    policy: EditPolicy,
    dir: PathBuf,
    entries: HashMap<usize, EditCacheEntry>,
    manifest: EditManifest,
}

impl EditCache {
    /// Start an empty cache persisting into `dir` (created if missing).
    pub fn create(dir: &Path, policy: EditPolicy) -> Result<Self, CacheError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            policy,
            dir: dir.to_path_buf(),
            entries: HashMap::new(),
            manifest: EditManifest::new(),
        })
    }

    /// Resume from a prior edit directory.
    ///
    /// Loads `edit.json` and every image it references, so frames edited by
    /// an earlier run are not re-edited before their interval comes up again.
    pub fn load(dir: &Path, policy: EditPolicy) -> Result<Self, CacheError> {
        let manifest = EditManifest::load(dir)?;
        let mut entries = HashMap::new();

        for (index, record) in manifest.iter() {
            let img = image::open(dir.join(&record.file_path))?.to_rgb32f();
            entries.insert(
                index,
                EditCacheEntry {
                    image: img,
                    patch: (record.patches[0], record.patches[1]),
                },
            );
        }

        log::info!(
            target: "splat_instruct::edit",
            "resumed edit cache from {:?} ({} frames)",
            dir,
            entries.len()
        );

        Ok(Self {
            policy,
            dir: dir.to_path_buf(),
            entries,
            manifest,
        })
    }

    /// Whether guidance must run for `frame_index` at `step`.
    ///
    /// True when the editing phase is active and either the frame has never
    /// been edited or the step lands on the re-edit interval.
    pub fn needs_edit(&self, frame_index: usize, step: u64) -> bool {
        self.policy.editing_active(step)
            && (!self.entries.contains_key(&frame_index)
                || step % self.policy.per_editing_step == 0)
    }

    /// Overwrite the entry for a frame and mirror it to disk.
    ///
    /// Writes the image as `{:05}.png` and rewrites the manifest; entries are
    /// replaced whole, never merged.
    pub fn record(
        &mut self,
        frame_index: usize,
        image: Rgb32FImage,
        patch: (u32, u32),
    ) -> Result<(), CacheError> {
        let file_name = format!("{:05}.png", frame_index);
        quantize_unit_rgb(&image).save(self.dir.join(&file_name))?;

        self.manifest.insert(
            frame_index,
            ManifestRecord {
                file_path: file_name,
                patches: [patch.0, patch.1],
            },
        );
        self.manifest.save(&self.dir)?;

        self.entries.insert(frame_index, EditCacheEntry { image, patch });
        Ok(())
    }

    pub fn get(&self, frame_index: usize) -> Option<&EditCacheEntry> {
        self.entries.get(&frame_index)
    }

    pub fn contains(&self, frame_index: usize) -> bool {
        self.entries.contains_key(&frame_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy(&self) -> EditPolicy {
        self.policy
    }
}
