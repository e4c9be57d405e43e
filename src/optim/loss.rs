//! Loss terms for the edit-render-train loop.
//!
//! Every function returns `(loss, dL/d(value))` so the gradients can be
//! pushed back through the rasterizer contract explicitly. The photometric
//! term is the splatting-paper mix `0.8 * L1 + 0.2 * (1 - SSIM)`; SSIM is
//! computed on luminance with an 11x11 Gaussian window, sigma 1.5.

use image::Rgb32FImage;
use nalgebra::Vector3;

/// L1 subgradient: zero at zero, unlike `f32::signum` which maps +0.0 to 1.
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Flatten an RGB image into row-major per-pixel vectors.
pub fn rgb_to_vec(img: &Rgb32FImage) -> Vec<Vector3<f32>> {
    img.pixels().map(|p| Vector3::new(p[0], p[1], p[2])).collect()
}

/// Mean absolute error over an image, returning (loss, d_value).
///
/// The mean runs over pixels and channels; `value` and `target` must match.
pub fn l1_loss_and_grad(
    value: &[Vector3<f32>],
    target: &[Vector3<f32>],
) -> (f32, Vec<Vector3<f32>>) {
    assert_eq!(value.len(), target.len());
    let n = (value.len() as f32).max(1.0);
    let scale = 1.0 / (3.0 * n);

    let mut loss = 0.0f32;
    let mut d = vec![Vector3::<f32>::zeros(); value.len()];
    for i in 0..value.len() {
        let diff = value[i] - target[i];
        loss += (diff.x.abs() + diff.y.abs() + diff.z.abs()) * scale;
        d[i] = Vector3::new(sign(diff.x), sign(diff.y), sign(diff.z)) * scale;
    }
    (loss, d)
}

/// Mean of squared components, returning (loss, d_values).
///
/// The L2 regularizer for residual parameters: penalizes corrective offsets
/// away from zero.
pub fn mean_square_and_grad(values: &[Vector3<f32>]) -> (f32, Vec<Vector3<f32>>) {
    let n = (values.len() as f32).max(1.0);
    let scale = 1.0 / (3.0 * n);

    let mut loss = 0.0f32;
    let mut d = vec![Vector3::<f32>::zeros(); values.len()];
    for i in 0..values.len() {
        let v = values[i];
        loss += v.dot(&v) * scale;
        d[i] = v * (2.0 * scale);
    }
    (loss, d)
}

/// Scalar flavor of [`mean_square_and_grad`], for the dynamic-feature
/// residual the renderer may report.
pub fn mean_square_scalar_and_grad(values: &[f32]) -> (f32, Vec<f32>) {
    let n = (values.len() as f32).max(1.0);
    let mut loss = 0.0f32;
    let mut d = vec![0.0f32; values.len()];
    for i in 0..values.len() {
        loss += values[i] * values[i] / n;
        d[i] = 2.0 * values[i] / n;
    }
    (loss, d)
}

fn luminance(rgb: Vector3<f32>) -> f32 {
    0.299 * rgb.x + 0.587 * rgb.y + 0.114 * rgb.z
}

fn d_luminance_to_rgb(dy: f32) -> Vector3<f32> {
    Vector3::new(0.299 * dy, 0.587 * dy, 0.114 * dy)
}

fn gaussian_kernel_offsets(radius: i32, sigma: f32) -> Vec<(i32, i32, f32)> {
    let mut out = Vec::new();
    let denom = 2.0 * sigma * sigma;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            out.push((dx, dy, (-r2 / denom).exp()));
        }
    }
    out
}

/// Photometric loss `0.8 * L1 + 0.2 * (1 - SSIM)` with gradient.
///
/// SSIM runs on luminance with an 11x11 Gaussian window (sigma 1.5); window
/// weights are renormalized over valid pixels at the image boundary. The
/// returned gradient is dL/d(value) in RGB.
pub fn photometric_loss_and_grad(
    value: &[Vector3<f32>],
    target: &[Vector3<f32>],
    width: u32,
    height: u32,
) -> (f32, Vec<Vector3<f32>>) {
    assert_eq!(value.len(), target.len());
    assert_eq!(value.len(), (width * height) as usize);

    let n = (value.len() as f32).max(1.0);

    // L1 component (RGB, mean over channels).
    let (l1, d_l1) = l1_loss_and_grad(value, target);

    // SSIM on luminance.
    let value_y: Vec<f32> = value.iter().copied().map(luminance).collect();
    let target_y: Vec<f32> = target.iter().copied().map(luminance).collect();
    let mut d_dssim_y = vec![0.0f32; value.len()];

    let radius = 5i32; // 11x11
    let sigma = 1.5f32;
    let kernel = gaussian_kernel_offsets(radius, sigma);

    let c1 = 0.01f32 * 0.01f32;
    let c2 = 0.03f32 * 0.03f32;

    let w_i = width as i32;
    let h_i = height as i32;

    let mut dssim = 0.0f32;
    for py in 0..h_i {
        for px in 0..w_i {
            // Normalize kernel weights for valid pixels at the boundary.
            let mut wsum_local = 0.0f32;
            for &(dx, dy, w) in &kernel {
                let x = px + dx;
                let y = py + dy;
                if x < 0 || x >= w_i || y < 0 || y >= h_i {
                    continue;
                }
                wsum_local += w;
            }
            if wsum_local <= 0.0 {
                continue;
            }

            let mut mu_x = 0.0f32;
            let mut mu_y = 0.0f32;
            for &(dx, dy, w) in &kernel {
                let x = px + dx;
                let y = py + dy;
                if x < 0 || x >= w_i || y < 0 || y >= h_i {
                    continue;
                }
                let wi = w / wsum_local;
                let idx = (y * w_i + x) as usize;
                mu_x += wi * value_y[idx];
                mu_y += wi * target_y[idx];
            }

            let mut var_x = 0.0f32;
            let mut var_y = 0.0f32;
            let mut cov = 0.0f32;
            for &(dx, dy, w) in &kernel {
                let x = px + dx;
                let y = py + dy;
                if x < 0 || x >= w_i || y < 0 || y >= h_i {
                    continue;
                }
                let wi = w / wsum_local;
                let idx = (y * w_i + x) as usize;
                let dxv = value_y[idx] - mu_x;
                let dyv = target_y[idx] - mu_y;
                var_x += wi * dxv * dxv;
                var_y += wi * dyv * dyv;
                cov += wi * dxv * dyv;
            }

            let a = 2.0 * mu_x * mu_y + c1;
            let b = 2.0 * cov + c2;
            let c = mu_x * mu_x + mu_y * mu_y + c1;
            let d = var_x + var_y + c2;
            let inv_cd = 1.0 / (c * d).max(1e-6);
            let ssim = (a * b) * inv_cd;

            dssim += (1.0 - ssim) / n;

            let d_ssim_da = b * inv_cd;
            let d_ssim_db = a * inv_cd;
            let d_ssim_dc = -(ssim / c.max(1e-6));
            let d_ssim_dd = -(ssim / d.max(1e-6));

            let d_ssim_d_mu_x = d_ssim_da * (2.0 * mu_y) + d_ssim_dc * (2.0 * mu_x);
            let d_ssim_d_var_x = d_ssim_dd;
            let d_ssim_d_cov = d_ssim_db * 2.0;

            for &(dx, dy, w) in &kernel {
                let x = px + dx;
                let y = py + dy;
                if x < 0 || x >= w_i || y < 0 || y >= h_i {
                    continue;
                }
                let wi = w / wsum_local;
                let idx = (y * w_i + x) as usize;
                let dxv = value_y[idx] - mu_x;
                let dyv = target_y[idx] - mu_y;

                let d_ssim_dxq = d_ssim_d_mu_x * wi
                    + d_ssim_d_var_x * (2.0 * wi * dxv)
                    + d_ssim_d_cov * (wi * dyv);

                // d(1-ssim)/d(x_q) = -d(ssim)/d(x_q)
                d_dssim_y[idx] += -d_ssim_dxq / n;
            }
        }
    }

    let l1_weight = 0.8f32;
    let dssim_weight = 0.2f32;

    let mut loss = l1_weight * l1 + dssim_weight * dssim;
    if !loss.is_finite() {
        loss = 0.0;
    }

    let mut grad = vec![Vector3::<f32>::zeros(); value.len()];
    for i in 0..value.len() {
        grad[i] = d_l1[i] * l1_weight + d_luminance_to_rgb(d_dssim_y[i] * dssim_weight);
    }

    (loss, grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_l1_zero_for_identical_images() {
        let img = vec![Vector3::new(0.3, 0.6, 0.9); 16];
        let (loss, grad) = l1_loss_and_grad(&img, &img);
        assert_relative_eq!(loss, 0.0, epsilon = 1e-7);
        assert!(grad.iter().all(|g| g.norm() < 1e-6));
    }

    #[test]
    fn test_l1_single_pixel() {
        let value = vec![Vector3::new(0.0, 1.0, 0.5)];
        let target = vec![Vector3::new(1.0, 0.0, 0.5)];
        let (loss, grad) = l1_loss_and_grad(&value, &target);
        assert_relative_eq!(loss, 2.0 / 3.0, epsilon = 1e-6);
        assert!(grad[0].x < 0.0 && grad[0].y > 0.0);
    }

    #[test]
    fn test_mean_square_gradient() {
        let values = vec![Vector3::new(0.3, -0.2, 0.0), Vector3::new(0.1, 0.0, -0.4)];
        let (loss, grad) = mean_square_and_grad(&values);
        let expected = (0.09 + 0.04 + 0.01 + 0.16) / 6.0;
        assert_relative_eq!(loss, expected, epsilon = 1e-6);
        assert_relative_eq!(grad[0].x, 2.0 * 0.3 / 6.0, epsilon = 1e-6);
        assert_relative_eq!(grad[1].z, 2.0 * -0.4 / 6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_mean_square_scalar() {
        let values = [1.0f32, -2.0, 0.0, 1.0];
        let (loss, grad) = mean_square_scalar_and_grad(&values);
        assert_relative_eq!(loss, 6.0 / 4.0, epsilon = 1e-6);
        assert_relative_eq!(grad[1], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_photometric_loss_gradient_smoke() {
        let width = 8u32;
        let height = 8u32;
        let n = (width * height) as usize;
        let value = vec![Vector3::new(0.2, 0.4, 0.6); n];
        let target = vec![Vector3::new(0.25, 0.35, 0.55); n];
        let (loss, grad) = photometric_loss_and_grad(&value, &target, width, height);
        assert!(loss.is_finite());
        assert_eq!(grad.len(), n);
        for g in grad {
            assert!(g.x.is_finite() && g.y.is_finite() && g.z.is_finite());
        }
    }

    #[test]
    fn test_photometric_gradient_matches_finite_difference() {
        let width = 8u32;
        let height = 8u32;
        let n = (width * height) as usize;

        let mut value = vec![Vector3::new(0.2, 0.2, 0.2); n];
        let target = vec![Vector3::new(0.25, 0.15, 0.3); n];

        let (loss, grad) = photometric_loss_and_grad(&value, &target, width, height);
        assert!(loss.is_finite());

        let idx = 3 * (width as usize) + 4;
        let eps = 1e-3f32;

        let base = value[idx];
        value[idx] = Vector3::new(base.x + eps, base.y, base.z);
        let (loss_p, _) = photometric_loss_and_grad(&value, &target, width, height);
        value[idx] = Vector3::new(base.x - eps, base.y, base.z);
        let (loss_m, _) = photometric_loss_and_grad(&value, &target, width, height);
        value[idx] = base;

        let numerical = (loss_p - loss_m) / (2.0 * eps);
        let analytical = grad[idx].x;

        let diff = (numerical - analytical).abs();
        assert!(
            diff < 5e-2,
            "finite diff mismatch: numerical={numerical} analytical={analytical} diff={diff}"
        );
    }

    #[test]
    fn test_rgb_to_vec_layout() {
        let mut img = Rgb32FImage::new(2, 2);
        img.put_pixel(1, 0, image::Rgb([0.1, 0.2, 0.3]));
        let v = rgb_to_vec(&img);
        assert_eq!(v.len(), 4);
        assert_relative_eq!(v[1].y, 0.2, epsilon = 1e-7);
    }
}
