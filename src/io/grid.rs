//! Side-by-side image grids for validation and test steps.
//!
//! Panels (primary render, refined patch, comparison target) can come at
//! different resolutions; they are scaled to a common height and
//! concatenated horizontally before saving.

use image::imageops::{self, FilterType};
use image::{Rgb32FImage, RgbImage};
use std::path::Path;

/// Quantize a [0,1] f32 image to 8-bit RGB.
pub fn quantize_unit_rgb(img: &Rgb32FImage) -> RgbImage {
    let mut out = RgbImage::new(img.width(), img.height());
    for (x, y, p) in img.enumerate_pixels() {
        out.put_pixel(
            x,
            y,
            image::Rgb([
                (p[0].clamp(0.0, 1.0) * 255.0) as u8,
                (p[1].clamp(0.0, 1.0) * 255.0) as u8,
                (p[2].clamp(0.0, 1.0) * 255.0) as u8,
            ]),
        );
    }
    out
}

/// Concatenate panels horizontally at a common height.
///
/// Each panel is scaled (bilinear, aspect preserved) to the tallest panel's
/// height. Returns `None` when `panels` is empty.
pub fn compose_grid(panels: &[&Rgb32FImage]) -> Option<RgbImage> {
    let height = panels.iter().map(|p| p.height()).max()?;

    let scaled: Vec<RgbImage> = panels
        .iter()
        .map(|p| {
            let q = quantize_unit_rgb(p);
            if q.height() == height {
                q
            } else {
                let w = (q.width() as u64 * height as u64 / q.height() as u64).max(1) as u32;
                imageops::resize(&q, w, height, FilterType::Triangle)
            }
        })
        .collect();

    let total_width: u32 = scaled.iter().map(|p| p.width()).sum();
    let mut grid = RgbImage::new(total_width, height);
    let mut x_off = 0i64;
    for panel in &scaled {
        imageops::replace(&mut grid, panel, x_off, 0);
        x_off += panel.width() as i64;
    }
    Some(grid)
}

/// Compose and save a grid. Empty panel lists are a no-op.
pub fn save_image_grid(path: &Path, panels: &[&Rgb32FImage]) -> Result<(), image::ImageError> {
    if let Some(grid) = compose_grid(panels) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        grid.save(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat(v: f32, w: u32, h: u32) -> Rgb32FImage {
        Rgb32FImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    #[test]
    fn test_grid_width_is_sum_of_panels() {
        let a = flat(0.1, 16, 16);
        let b = flat(0.5, 8, 16);
        let grid = compose_grid(&[&a, &b]).unwrap();
        assert_eq!(grid.width(), 24);
        assert_eq!(grid.height(), 16);
        assert_eq!(grid.get_pixel(0, 0)[0], 25); // 0.1 * 255
        assert_eq!(grid.get_pixel(16, 0)[0], 127); // 0.5 * 255
    }

    #[test]
    fn test_mixed_heights_are_scaled_up() {
        let a = flat(0.2, 32, 32);
        let b = flat(0.8, 8, 8);
        let grid = compose_grid(&[&a, &b]).unwrap();
        assert_eq!(grid.height(), 32);
        assert_eq!(grid.width(), 32 + 32);
    }

    #[test]
    fn test_empty_panels_compose_none() {
        assert!(compose_grid(&[]).is_none());
    }
}
