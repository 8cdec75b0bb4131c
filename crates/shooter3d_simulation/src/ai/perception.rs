//! Perception: дистанция + опциональный line of sight по геометрии уровня

use bevy::prelude::*;

use super::simple_fsm::{AIConfig, TargetView};
use crate::components::EntityId;
use crate::world::Level;

pub fn eye_position(position: Vec3, config: &AIConfig) -> Vec3 {
    position + Vec3::Y * config.eye_height
}

/// Видит ли агент точку `target` (центр цели)
pub fn perceives(level: &Level, config: &AIConfig, position: Vec3, target: Vec3) -> bool {
    if position.distance(target) > config.perception_radius {
        return false;
    }
    !config.requires_line_of_sight
        || level.line_of_sight(eye_position(position, config), eye_position(target, config))
}

/// Полный view цели для FSM
pub fn view_target(level: &Level, config: &AIConfig, position: Vec3, target: Vec3) -> TargetView {
    let perceived = perceives(level, config, position, target);
    TargetView {
        position: target,
        perceived,
        attackable: perceived && position.distance(target) <= config.attack_range,
    }
}

/// Ближайшая воспринимаемая цель; при равной дистанции: меньший id
pub fn nearest_perceived(
    level: &Level,
    config: &AIConfig,
    position: Vec3,
    candidates: &[(EntityId, Vec3)],
) -> Option<EntityId> {
    candidates
        .iter()
        .filter(|(_, target)| perceives(level, config, position, *target))
        .min_by(|(a_id, a), (b_id, b)| {
            position
                .distance_squared(*a)
                .total_cmp(&position.distance_squared(*b))
                .then(a_id.cmp(b_id))
        })
        .map(|(id, _)| *id)
}
