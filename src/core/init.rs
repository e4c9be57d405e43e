//! Point-cloud initialization.
//!
//! The capture sets this system trains on ship no sparse reconstruction, so
//! when the geometry adapter has nothing to convert from, the scene starts
//! from a small random cloud sampled uniformly inside a ball around the
//! origin. The adapter densifies from there.

use nalgebra::Vector3;
use rand::Rng;

/// SH DC basis constant Y_0^0.
pub const SH_C0: f32 = 0.28209479;

/// Initial points handed to the geometry adapter.
///
/// Colors are plain [0,1] RGB; the adapter converts them into SH DC
/// coefficients itself.
#[derive(Clone, Debug)]
pub struct PointCloud {
    pub points: Vec<Vector3<f32>>,
    pub colors: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All-zero placeholder cloud of a given size.
    ///
    /// Used on checkpoint restore, where only the point count matters: the
    /// adapter is re-created at the right size and the checkpoint overwrites
    /// every parameter afterwards.
    pub fn placeholder(num_pts: usize) -> Self {
        Self {
            points: vec![Vector3::zeros(); num_pts],
            colors: vec![Vector3::zeros(); num_pts],
            normals: vec![Vector3::zeros(); num_pts],
        }
    }
}

/// Sample `num_pts` points uniformly inside a ball of radius 0.25.
///
/// Directions come from uniform angles (`cos(theta)` uniform in [-1,1]), the
/// radius from `0.25 * cbrt(u)` so density is uniform in volume. Colors are
/// faint random SH DC offsets mapped through `c * Y_0^0 + 0.5`, i.e. near
/// mid-gray. Normals are zero.
pub fn random_sphere_cloud<R: Rng>(num_pts: usize, rng: &mut R) -> PointCloud {
    let mut points = Vec::with_capacity(num_pts);
    let mut colors = Vec::with_capacity(num_pts);

    for _ in 0..num_pts {
        let phi = rng.gen::<f32>() * 2.0 * std::f32::consts::PI;
        let cos_theta = rng.gen::<f32>() * 2.0 - 1.0;
        let theta = cos_theta.acos();
        let radius = 0.25 * rng.gen::<f32>().cbrt();

        points.push(Vector3::new(
            radius * theta.sin() * phi.cos(),
            radius * theta.sin() * phi.sin(),
            radius * theta.cos(),
        ));

        let sh = Vector3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()) / 255.0;
        colors.push(sh * SH_C0 + Vector3::new(0.5, 0.5, 0.5));
    }

    PointCloud {
        points,
        colors,
        normals: vec![Vector3::zeros(); num_pts],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cloud_stays_inside_ball() {
        let mut rng = StdRng::seed_from_u64(0x5EED_0001);
        let cloud = random_sphere_cloud(500, &mut rng);
        assert_eq!(cloud.len(), 500);
        for p in &cloud.points {
            assert!(p.norm() <= 0.25 + 1e-6);
        }
    }

    #[test]
    fn test_colors_near_mid_gray() {
        let mut rng = StdRng::seed_from_u64(0x5EED_0002);
        let cloud = random_sphere_cloud(100, &mut rng);
        for c in &cloud.colors {
            for ch in [c.x, c.y, c.z] {
                assert!(ch >= 0.5 && ch <= 0.5 + SH_C0 / 255.0 + 1e-6);
            }
        }
    }

    #[test]
    fn test_seed_determinism() {
        let a = random_sphere_cloud(50, &mut StdRng::seed_from_u64(7));
        let b = random_sphere_cloud(50, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.points, b.points);
        assert_eq!(a.colors, b.colors);
    }

    #[test]
    fn test_placeholder_is_zeroed() {
        let cloud = PointCloud::placeholder(13);
        assert_eq!(cloud.len(), 13);
        assert!(cloud.points.iter().all(|p| p == &Vector3::zeros()));
    }
}
