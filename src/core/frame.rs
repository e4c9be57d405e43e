//! Frame data model.
//!
//! A frame is one time slice of the captured dynamic scene: an RGB image in
//! [0,1], an optional editing mask and bounding box, the camera pose and the
//! stored projection, and the moment (time index) the rasterizer should
//! evaluate the dynamic geometry at.

use crate::core::PatchRect;
use image::{imageops, ImageBuffer, Luma, Rgb32FImage};
use nalgebra::Matrix4;

/// Single-channel f32 mask, 1.0 = editable region.
pub type MaskImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// One training/validation/test sample.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Frame index; also the edit-cache key.
    pub index: usize,

    /// Ground-truth RGB, normalized [0,1].
    pub gt_rgb: Rgb32FImage,

    /// Optional binary editing mask.
    pub mask: Option<MaskImage>,

    /// Optional bounding box `[x1, y1, x2, y2]` around the editable subject.
    pub bbox: Option<[f32; 4]>,

    /// Camera-to-world pose.
    pub c2w: Matrix4<f32>,

    /// Stored intrinsic projection.
    pub proj: Matrix4<f32>,

    /// Time index into the dynamic scene.
    pub moment: usize,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.gt_rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.gt_rgb.height()
    }
}

/// Crop an RGB patch out of a frame image.
///
/// The patch is in bounds by selector construction.
pub fn crop_rgb(img: &Rgb32FImage, patch: &PatchRect) -> Rgb32FImage {
    imageops::crop_imm(img, patch.x, patch.y, patch.size, patch.size).to_image()
}

/// Crop a mask patch out of a frame mask.
pub fn crop_mask(mask: &MaskImage, patch: &PatchRect) -> MaskImage {
    imageops::crop_imm(mask, patch.x, patch.y, patch.size, patch.size).to_image()
}

/// Overwrite the patch region of `frame` with `patch_img`.
///
/// `patch_img` must already be at patch resolution.
pub fn splice_rgb(frame: &mut Rgb32FImage, patch: &PatchRect, patch_img: &Rgb32FImage) {
    debug_assert_eq!(patch_img.width(), patch.size);
    debug_assert_eq!(patch_img.height(), patch.size);
    imageops::replace(frame, patch_img, patch.x as i64, patch.y as i64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_image(w: u32, h: u32) -> Rgb32FImage {
        Rgb32FImage::from_fn(w, h, |x, y| {
            Rgb([x as f32 / w as f32, y as f32 / h as f32, 0.5])
        })
    }

    #[test]
    fn test_crop_splice_round_trip() {
        let original = gradient_image(64, 48);
        let patch = PatchRect { x: 10, y: 5, size: 16 };

        let cropped = crop_rgb(&original, &patch);
        assert_eq!(cropped.width(), 16);
        assert_eq!(cropped.height(), 16);

        let mut spliced = original.clone();
        splice_rgb(&mut spliced, &patch, &cropped);
        assert_eq!(spliced, original);
    }

    #[test]
    fn test_splice_replaces_only_patch_region() {
        let mut frame = gradient_image(32, 32);
        let patch = PatchRect { x: 8, y: 8, size: 8 };
        let white = Rgb32FImage::from_pixel(8, 8, Rgb([1.0, 1.0, 1.0]));

        let before = frame.clone();
        splice_rgb(&mut frame, &patch, &white);

        assert_eq!(frame.get_pixel(8, 8), &Rgb([1.0, 1.0, 1.0]));
        assert_eq!(frame.get_pixel(15, 15), &Rgb([1.0, 1.0, 1.0]));
        assert_eq!(frame.get_pixel(7, 7), before.get_pixel(7, 7));
        assert_eq!(frame.get_pixel(16, 16), before.get_pixel(16, 16));
    }
}
