//! Video assembly for test epochs.
//!
//! Test steps drop one grid image per frame, named by frame number. At epoch
//! end those are collected in numeric order and handed to `ffmpeg` for
//! encoding; container formats are not this crate's business.

use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Collect images in `dir` whose file stem is a number, sorted numerically.
///
/// Only `.png` and `.jpg` files participate; anything else in the directory
/// is ignored.
pub fn collect_numbered_frames(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut frames: Vec<(u64, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let ext_ok = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("png") | Some("jpg")
        );
        if !ext_ok {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(number) = stem.parse::<u64>() {
            frames.push((number, path));
        }
    }

    frames.sort_by_key(|(number, _)| *number);
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

/// Encode every numbered frame in `dir` into a video at a fixed frame rate.
///
/// Writes an ffmpeg concat list next to the frames and shells out to
/// `ffmpeg`. Fails when the directory holds no frames or ffmpeg exits
/// nonzero.
pub fn assemble_video(dir: &Path, out: &Path, fps: u32) -> anyhow::Result<()> {
    let frames = collect_numbered_frames(dir)?;
    if frames.is_empty() {
        bail!("no numbered frames found in {:?}", dir);
    }

    let list_path = dir.join("frames.txt");
    let mut list = String::new();
    for frame in &frames {
        // Absolute paths keep the list independent of ffmpeg's working dir.
        let abs = frame.canonicalize()?;
        list.push_str(&format!("file '{}'\n", abs.display()));
    }
    fs::write(&list_path, list)?;

    log::info!(
        target: "splat_instruct::io",
        "assembling {} frames from {:?} into {:?} at {} fps",
        frames.len(),
        dir,
        out,
        fps
    );

    let status = Command::new("ffmpeg")
        .arg("-y")
        .args(["-f", "concat", "-safe", "0"])
        .arg("-i")
        .arg(&list_path)
        .args(["-r", &fps.to_string()])
        .args(["-pix_fmt", "yuv420p"])
        .arg(out)
        .status()
        .context("failed to launch ffmpeg")?;

    if !status.success() {
        bail!("ffmpeg exited with {}", status);
    }
    Ok(())
}
