//! Player control marker + углы обзора

use bevy::prelude::*;

/// Marker component для player-controlled entity
///
/// Input системы фильтруют `With<Player>`.
#[derive(Component, Debug, Clone, Copy, Default)]
#[require(LookAngles)]
pub struct Player;

/// Yaw/pitch камеры игрока (радианы)
///
/// yaw = 0 смотрит в -Z. Pitch ограничен `max_pitch` из конфига игрока.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct LookAngles {
    pub yaw: f32,
    pub pitch: f32,
}

impl LookAngles {
    pub fn apply_delta(&mut self, yaw_delta: f32, pitch_delta: f32, max_pitch: f32) {
        self.yaw = (self.yaw + yaw_delta).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + pitch_delta).clamp(-max_pitch, max_pitch);
    }

    pub fn forward(&self) -> Vec3 {
        crate::math::look_direction(self.yaw, self.pitch)
    }

    /// Горизонтальные базисные векторы (forward, right) для WASD
    pub fn ground_basis(&self) -> (Vec3, Vec3) {
        let forward = crate::math::look_direction(self.yaw, 0.0);
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        (forward, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_clamped() {
        let max_pitch = 25.0_f32.to_radians();
        let mut look = LookAngles::default();

        look.apply_delta(0.0, 2.0, max_pitch);
        assert_eq!(look.pitch, max_pitch);

        look.apply_delta(0.0, -5.0, max_pitch);
        assert_eq!(look.pitch, -max_pitch);
    }

    #[test]
    fn test_ground_basis() {
        let look = LookAngles::default();
        let (forward, right) = look.ground_basis();
        assert!(forward.distance(Vec3::NEG_Z) < 1e-6);
        assert!(right.distance(Vec3::X) < 1e-6);
    }
}
