//! Camera resolution for the splatting rasterizer.
//!
//! Training batches carry a stored 4x4 projection matrix and a
//! camera-to-world pose. The rasterizer wants its own conventions: a
//! world-to-view transform, field-of-view angles, a projection rebuilt on
//! fixed near/far planes, and the camera center. This module derives all of
//! those.
//!
//! The stored projection may not share the rasterizer's near/far planes, so
//! the field of view is recovered from the focal diagonal terms and a fresh
//! projection is built from it.

use nalgebra::{Matrix4, Vector3};
use thiserror::Error;

/// Near plane used for every rebuilt rasterizer projection.
pub const ZNEAR: f32 = 0.01;

/// Far plane used for every rebuilt rasterizer projection.
pub const ZFAR: f32 = 100.0;

/// Errors produced while resolving a camera.
#[derive(Debug, Error)]
pub enum CameraError {
    /// A focal diagonal term of the projection matrix is zero or near zero.
    /// This is a broken configuration, not a transient condition.
    #[error("degenerate projection matrix: focal term P[{0},{0}] = {1}")]
    DegenerateProjection(usize, f32),

    /// The flipped camera-to-world pose is singular and cannot be inverted.
    #[error("camera pose is not invertible")]
    SingularPose,
}

/// A camera in rasterizer conventions, ready to render with.
#[derive(Clone, Debug)]
pub struct ResolvedCamera {
    /// Horizontal field of view (radians)
    pub fov_x: f32,

    /// Vertical field of view (radians)
    pub fov_y: f32,

    /// Target image width (pixels)
    pub width: u32,

    /// Target image height (pixels)
    pub height: u32,

    /// World-to-view transform
    pub world_view: Matrix4<f32>,

    /// Combined view-projection transform
    pub full_proj: Matrix4<f32>,

    /// Camera center in world coordinates
    pub camera_center: Vector3<f32>,
}

/// Build a perspective projection matrix from near/far planes and
/// field-of-view angles.
///
/// This is the symmetric-frustum form used by the splatting rasterizer:
/// `P[0][0] = 1/tan(fov_x/2)`, `P[1][1] = 1/tan(fov_y/2)`, depth mapped to
/// `[0, 1]` with `P[3][2] = 1` (positive z forward).
pub fn projection_matrix(znear: f32, zfar: f32, fov_x: f32, fov_y: f32) -> Matrix4<f32> {
    let tan_half_fov_y = (fov_y / 2.0).tan();
    let tan_half_fov_x = (fov_x / 2.0).tan();

    let top = tan_half_fov_y * znear;
    let bottom = -top;
    let right = tan_half_fov_x * znear;
    let left = -right;

    let mut p = Matrix4::<f32>::zeros();
    let z_sign = 1.0f32;

    p[(0, 0)] = 2.0 * znear / (right - left);
    p[(1, 1)] = 2.0 * znear / (top - bottom);
    p[(0, 2)] = (right + left) / (right - left);
    p[(1, 2)] = (top + bottom) / (top - bottom);
    p[(3, 2)] = z_sign;
    p[(2, 2)] = z_sign * zfar / (zfar - znear);
    p[(2, 3)] = -(zfar * znear) / (zfar - znear);
    p
}

/// Recover `(fov_x, fov_y)` from a projection matrix's focal diagonal terms.
///
/// The recovery is `fov = 2 * atan((znear / P[k][k]) / znear)`, so the near
/// plane cancels and the stored projection's own near/far planes do not have
/// to match the rasterizer's.
///
/// Fails when a focal term is zero or near zero (degenerate camera). That is
/// fatal for the run: propagate, do not retry.
pub fn fov_from_projection(proj: &Matrix4<f32>, znear: f32) -> Result<(f32, f32), CameraError> {
    const EPS: f32 = 1e-8;

    for k in 0..2 {
        let focal = proj[(k, k)];
        if focal.abs() < EPS {
            return Err(CameraError::DegenerateProjection(k, focal));
        }
    }

    let right = znear / proj[(0, 0)];
    let top = znear / proj[(1, 1)];
    let tan_half_fov_x = right / znear;
    let tan_half_fov_y = top / znear;

    Ok((tan_half_fov_x.atan() * 2.0, tan_half_fov_y.atan() * 2.0))
}

/// Negate the third axis of a camera-to-world pose.
///
/// The stored poses use a convention whose z axis points opposite the
/// rasterizer's; flipping the third column converts between the two.
fn convert_pose(c2w: &Matrix4<f32>) -> Matrix4<f32> {
    let mut flip = Matrix4::<f32>::identity();
    flip[(2, 2)] = -1.0;
    c2w * flip
}

/// Derive a renderable camera from a camera-to-world pose and a stored
/// projection matrix.
///
/// Steps:
/// 1. Flip the pose's third axis into rasterizer convention.
/// 2. Invert the pose to get the world-to-view transform.
/// 3. Recover the field of view from the stored projection's focal terms.
/// 4. Rebuild a projection on fixed planes [`ZNEAR`]/[`ZFAR`].
/// 5. Combine into the full view-projection transform and pull the camera
///    center out of the inverted view transform.
pub fn resolve_camera(
    c2w: &Matrix4<f32>,
    proj: &Matrix4<f32>,
    width: u32,
    height: u32,
) -> Result<ResolvedCamera, CameraError> {
    let (fov_x, fov_y) = fov_from_projection(proj, ZNEAR)?;

    let c2w = convert_pose(c2w);
    let world_view = c2w.try_inverse().ok_or(CameraError::SingularPose)?;

    let raster_proj = projection_matrix(ZNEAR, ZFAR, fov_x, fov_y);
    let full_proj = raster_proj * world_view;

    let view_inv = world_view.try_inverse().ok_or(CameraError::SingularPose)?;
    let camera_center = Vector3::new(view_inv[(0, 3)], view_inv[(1, 3)], view_inv[(2, 3)]);

    Ok(ResolvedCamera {
        fov_x,
        fov_y,
        width,
        height,
        world_view,
        full_proj,
        camera_center,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fov_round_trip() {
        let fov_x = 0.9f32;
        let fov_y = 0.7f32;
        let p = projection_matrix(ZNEAR, ZFAR, fov_x, fov_y);
        let (rx, ry) = fov_from_projection(&p, ZNEAR).unwrap();
        assert_relative_eq!(rx, fov_x, epsilon = 1e-5);
        assert_relative_eq!(ry, fov_y, epsilon = 1e-5);
    }

    #[test]
    fn test_fov_recovery_ignores_foreign_near_plane() {
        // The stored projection was built with different planes; recovery
        // must still return the same angles.
        let p = projection_matrix(0.5, 2000.0, 1.1, 0.8);
        let (rx, ry) = fov_from_projection(&p, ZNEAR).unwrap();
        assert_relative_eq!(rx, 1.1, epsilon = 1e-4);
        assert_relative_eq!(ry, 0.8, epsilon = 1e-4);
    }

    #[test]
    fn test_degenerate_projection_is_fatal() {
        let mut p = projection_matrix(ZNEAR, ZFAR, 1.0, 1.0);
        p[(0, 0)] = 0.0;
        let err = fov_from_projection(&p, ZNEAR).unwrap_err();
        assert!(matches!(err, CameraError::DegenerateProjection(0, _)));
    }

    #[test]
    fn test_resolve_camera_center_matches_pose_translation() {
        // Camera at (1, 2, 3): the axis flip leaves translation untouched.
        let mut c2w = Matrix4::<f32>::identity();
        c2w[(0, 3)] = 1.0;
        c2w[(1, 3)] = 2.0;
        c2w[(2, 3)] = 3.0;
        let proj = projection_matrix(ZNEAR, ZFAR, 1.0, 1.0);

        let cam = resolve_camera(&c2w, &proj, 800, 800).unwrap();
        assert_relative_eq!(cam.camera_center.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(cam.camera_center.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(cam.camera_center.z, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_world_view_inverts_flipped_pose() {
        let mut c2w = Matrix4::<f32>::identity();
        c2w[(0, 3)] = -4.0;
        let proj = projection_matrix(ZNEAR, ZFAR, 0.9, 0.9);

        let cam = resolve_camera(&c2w, &proj, 640, 480).unwrap();
        let product = cam.world_view * convert_pose(&c2w);
        for r in 0..4 {
            for c in 0..4 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert_relative_eq!(product[(r, c)], expected, epsilon = 1e-5);
            }
        }
    }
}
