//! Spatial math: примитивы, intersection тесты, sampling
//!
//! Базовые типы (Vec3, Quat, Transform): из bevy/glam, здесь только то,
//! чего в bevy нет: narrow phase и детерминированный spread.

use bevy::prelude::*;
use rand::Rng;

pub mod intersect;
pub mod shapes;

pub use intersect::{
    capsule_capsule, capsule_triangle, capsule_triangle_distance, closest_point_on_segment,
    closest_point_on_triangle, closest_points_segment_triangle, closest_points_segments,
    ray_aabb, ray_sphere, ray_triangle, ContactManifold,
};
pub use shapes::{Aabb, Capsule, Ray, Triangle};

/// Направление внутри конуса вокруг `axis`
///
/// `cone_degrees`: полный угол раствора конуса. Распределение равномерное
/// по телесному углу. При нулевом угле RNG не трогается.
pub fn sample_cone<R: Rng>(rng: &mut R, axis: Vec3, cone_degrees: f32) -> Vec3 {
    let Some(axis) = axis.try_normalize() else {
        return Vec3::ZERO;
    };

    let half_angle = (cone_degrees * 0.5).to_radians();
    if half_angle <= 0.0 {
        return axis;
    }

    let cos_max = half_angle.cos();
    let cos_theta = 1.0 - rng.gen::<f32>() * (1.0 - cos_max);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = rng.gen::<f32>() * std::f32::consts::TAU;

    let (u, v) = axis.any_orthonormal_pair();
    (axis * cos_theta + (u * phi.cos() + v * phi.sin()) * sin_theta).normalize()
}

/// Горизонтальная проекция (Y = 0)
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Направление взгляда из yaw/pitch (радианы). yaw = 0 смотрит в -Z.
pub fn look_direction(yaw: f32, pitch: f32) -> Vec3 {
    let rotation = Quat::from_rotation_y(yaw) * Quat::from_rotation_x(pitch);
    rotation * Vec3::NEG_Z
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_sample_cone_stays_inside() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let axis = Vec3::new(1.0, 0.0, 1.0).normalize();

        for _ in 0..500 {
            let dir = sample_cone(&mut rng, axis, 10.0);
            assert!((dir.length() - 1.0).abs() < 1e-4);
            let angle = dir.angle_between(axis).to_degrees();
            assert!(angle <= 5.0 + 1e-3, "angle {} outside half cone", angle);
        }
    }

    #[test]
    fn test_sample_cone_zero_spread_is_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let dir = sample_cone(&mut rng, Vec3::new(0.0, 0.0, -3.0), 0.0);
        assert_eq!(dir, Vec3::NEG_Z);
    }

    #[test]
    fn test_sample_cone_deterministic() {
        let mut a = ChaCha8Rng::seed_from_u64(99);
        let mut b = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..10 {
            assert_eq!(sample_cone(&mut a, Vec3::X, 30.0), sample_cone(&mut b, Vec3::X, 30.0));
        }
    }

    #[test]
    fn test_look_direction() {
        assert!(look_direction(0.0, 0.0).distance(Vec3::NEG_Z) < 1e-6);
        // yaw +90° поворачивает -Z в -X
        let left = look_direction(std::f32::consts::FRAC_PI_2, 0.0);
        assert!(left.distance(Vec3::NEG_X) < 1e-5);
        assert!(look_direction(0.0, 0.3).y > 0.0);
    }
}
