//! Physics & collision
//!
//! Порядок внутри `TickSet::Physics`:
//! movement input → jump/gravity → integrate → static resolution →
//! projectile sweeps → dynamic contacts → bounds.

use bevy::prelude::*;

pub mod broad_phase;
pub mod collision;
pub mod movement;

pub use broad_phase::UniformGrid;
pub use collision::{
    detect_contacts, detect_projectile_impacts, enforce_bounds, resolve_static, resolve_static_collisions,
    StaticResolution, SweptBody,
};
pub use movement::{
    apply_jump_and_gravity, apply_movement_input, horizontal_velocity, integrate_velocity, KinematicController,
    MovementInput,
};

use crate::components::EntityId;
use crate::{SimulationTick, TickSet};

/// Event: два тела (хотя бы одно dynamic) пересеклись
///
/// `a < b` по id. `normal` выталкивает `a` от `b`. Физика это не разрешает:
/// интерпретируют combat (снаряды, pickups) и AI (separation).
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub a: EntityId,
    pub b: EntityId,
    pub normal: Vec3,
    pub depth: f32,
    pub point: Vec3,
}

/// Event: swept тело ударилось о static геометрию
///
/// `obstacle = None`: геометрия уровня, `Some`: StaticObstacle entity.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct StaticImpact {
    pub entity: EntityId,
    pub obstacle: Option<EntityId>,
    pub point: Vec3,
    pub normal: Vec3,
}

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<Contact>()
            .add_event::<StaticImpact>()
            .add_systems(
                SimulationTick,
                (
                    apply_movement_input,
                    apply_jump_and_gravity,
                    integrate_velocity,
                    resolve_static_collisions,
                    detect_projectile_impacts,
                    detect_contacts,
                    enforce_bounds,
                )
                    .chain()
                    .in_set(TickSet::Physics),
            );
    }
}
