//! Guidance-input compositing.
//!
//! The guidance model sees a blend of the freshly refined render and the
//! original frame. With a mask, the refined pixels replace only the masked
//! region and an auxiliary alpha channel carries `1 - mask`; without one the
//! refined patch passes through whole. Patch resolution S and the refiner's
//! output resolution R can differ, so everything is brought to a common
//! working resolution first (bilinear).

use crate::core::MaskImage;
use image::imageops::{self, FilterType};
use image::{Luma, Rgb, Rgb32FImage};

/// Composited input for the guidance model.
///
/// Four channels when a mask participated (RGB plus inverted-mask alpha),
/// three otherwise.
#[derive(Clone, Debug)]
pub struct GuidanceInput {
    pub rgb: Rgb32FImage,
    pub alpha: Option<MaskImage>,
}

impl GuidanceInput {
    pub fn size(&self) -> u32 {
        self.rgb.width()
    }

    pub fn channels(&self) -> u32 {
        if self.alpha.is_some() {
            4
        } else {
            3
        }
    }
}

/// Bilinear RGB resize. No-op when already at the target size.
pub fn resize_rgb(img: &Rgb32FImage, width: u32, height: u32) -> Rgb32FImage {
    if img.width() == width && img.height() == height {
        return img.clone();
    }
    imageops::resize(img, width, height, FilterType::Triangle)
}

/// Bilinear mask resize. No-op when already at the target size.
pub fn resize_mask(mask: &MaskImage, width: u32, height: u32) -> MaskImage {
    if mask.width() == width && mask.height() == height {
        return mask.clone();
    }
    imageops::resize(mask, width, height, FilterType::Triangle)
}

/// Blend the refined render with the original frame patch.
///
/// All inputs are resized to `refine_size`. With a mask the output is
/// `refined * mask + original * (1 - mask)` per pixel plus an alpha channel
/// of `1 - mask`; without one the refined patch is returned unchanged
/// (implicit full replacement).
///
/// Pure function of its inputs: calling twice with the same data yields the
/// same output.
pub fn composite(
    refined: &Rgb32FImage,
    original_patch: &Rgb32FImage,
    mask_patch: Option<&MaskImage>,
    refine_size: u32,
) -> GuidanceInput {
    let refined = resize_rgb(refined, refine_size, refine_size);

    let Some(mask) = mask_patch else {
        return GuidanceInput {
            rgb: refined,
            alpha: None,
        };
    };

    let original = resize_rgb(original_patch, refine_size, refine_size);
    let mask = resize_mask(mask, refine_size, refine_size);

    let mut rgb = Rgb32FImage::new(refine_size, refine_size);
    let mut alpha = MaskImage::new(refine_size, refine_size);

    for y in 0..refine_size {
        for x in 0..refine_size {
            let m = mask.get_pixel(x, y)[0];
            let r = refined.get_pixel(x, y);
            let o = original.get_pixel(x, y);
            rgb.put_pixel(
                x,
                y,
                Rgb([
                    r[0] * m + o[0] * (1.0 - m),
                    r[1] * m + o[1] * (1.0 - m),
                    r[2] * m + o[2] * (1.0 - m),
                ]),
            );
            alpha.put_pixel(x, y, Luma([1.0 - m]));
        }
    }

    GuidanceInput {
        rgb,
        alpha: Some(alpha),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat(v: [f32; 3], size: u32) -> Rgb32FImage {
        Rgb32FImage::from_pixel(size, size, Rgb(v))
    }

    fn flat_mask(v: f32, size: u32) -> MaskImage {
        MaskImage::from_pixel(size, size, Luma([v]))
    }

    #[test]
    fn test_all_ones_mask_returns_refined() {
        let refined = flat([0.9, 0.1, 0.4], 8);
        let original = flat([0.2, 0.2, 0.2], 8);
        let mask = flat_mask(1.0, 8);

        let out = composite(&refined, &original, Some(&mask), 8);
        assert_eq!(out.channels(), 4);
        for p in out.rgb.pixels() {
            assert_relative_eq!(p[0], 0.9, epsilon = 1e-6);
            assert_relative_eq!(p[1], 0.1, epsilon = 1e-6);
            assert_relative_eq!(p[2], 0.4, epsilon = 1e-6);
        }
        for a in out.alpha.unwrap().pixels() {
            assert_relative_eq!(a[0], 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_all_zeros_mask_returns_original() {
        let refined = flat([0.9, 0.1, 0.4], 8);
        let original = flat([0.2, 0.3, 0.5], 8);
        let mask = flat_mask(0.0, 8);

        let out = composite(&refined, &original, Some(&mask), 8);
        for p in out.rgb.pixels() {
            assert_relative_eq!(p[0], 0.2, epsilon = 1e-6);
            assert_relative_eq!(p[1], 0.3, epsilon = 1e-6);
            assert_relative_eq!(p[2], 0.5, epsilon = 1e-6);
        }
        for a in out.alpha.unwrap().pixels() {
            assert_relative_eq!(a[0], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_no_mask_passes_refined_through() {
        let refined = flat([0.6, 0.6, 0.6], 16);
        let original = flat([0.0, 0.0, 0.0], 16);

        let out = composite(&refined, &original, None, 16);
        assert_eq!(out.channels(), 3);
        assert_eq!(out.rgb, refined);
    }

    #[test]
    fn test_composite_is_idempotent() {
        let refined = flat([0.7, 0.2, 0.1], 8);
        let original = flat([0.1, 0.8, 0.3], 8);
        let mask = flat_mask(0.25, 8);

        let a = composite(&refined, &original, Some(&mask), 12);
        let b = composite(&refined, &original, Some(&mask), 12);
        assert_eq!(a.rgb, b.rgb);
        assert_eq!(a.alpha, b.alpha);
    }

    #[test]
    fn test_resize_between_patch_and_refine_resolution() {
        let refined = flat([0.5, 0.5, 0.5], 32);
        let out = composite(&refined, &flat([0.0; 3], 64), None, 64);
        assert_eq!(out.size(), 64);
    }
}
