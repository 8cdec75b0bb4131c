//! Combat: оружие, снаряды, урон, pickups
//!
//! ECS ответственность:
//! - Weapon state machine (ammo, cooldown, reload)
//! - FireIntent → снаряд (spread из DeterministicRng)
//! - Contact / StaticImpact → DamageDealt, смерть, splash
//! - Events для эффектов: ShotFired, FireRejected, DamageDealt, EntityDied,
//!   PickupCollected

use bevy::prelude::*;

pub mod damage;
pub mod pickup;
pub mod projectile;
pub mod weapon;


pub use damage::{announce_deaths, apply_damage, resolve_projectile_hits};
pub use pickup::{apply_pickup, collect_pickups, Pickup, PickupKind};
pub use projectile::{
    fire_weapon, muzzle_position, process_fire_intents, process_reload_requests, tick_projectile_lifetimes, try_fire,
    FireIntent, Projectile, ReloadRequest,
};
pub use weapon::{tick_weapon_timers, WeaponDefinition, WeaponPhase, WeaponState};

use crate::components::{EntityId, EntityKind};
use crate::error::FireError;
use crate::registry::DeathCause;
use crate::{SimulationTick, TickSet};

/// Event: выстрел состоялся, снаряд заспавнен
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct ShotFired {
    pub shooter: EntityId,
    pub projectile: EntityId,
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Event: выстрел отклонён state machine оружия
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireRejected {
    pub shooter: EntityId,
    pub reason: FireError,
}

/// Event: попадание засчитано
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct DamageDealt {
    pub target: EntityId,
    pub source: Option<EntityId>,
    pub amount: u32,
    pub remaining: u32,
    pub point: Vec3,
}

/// Event: entity умер (ровно один раз на id)
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDied {
    pub id: EntityId,
    pub kind: EntityKind,
    pub cause: DeathCause,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickupCollected {
    pub pickup: EntityId,
    pub collector: EntityId,
    pub kind: PickupKind,
    pub amount: u32,
}

/// Combat Plugin
///
/// Порядок выполнения:
/// 1. Weapons: таймеры → reload requests → fire intents
/// 2. Contacts: попадания → pickups → lifetime снарядов
/// 3. Deaths: Dead marker + EntityDied
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<FireIntent>()
            .add_event::<ReloadRequest>()
            .add_event::<ShotFired>()
            .add_event::<FireRejected>()
            .add_event::<DamageDealt>()
            .add_event::<EntityDied>()
            .add_event::<PickupCollected>();

        app.add_systems(
            SimulationTick,
            (tick_weapon_timers, process_reload_requests, process_fire_intents)
                .chain()
                .in_set(TickSet::Weapons),
        )
        .add_systems(
            SimulationTick,
            (resolve_projectile_hits, collect_pickups, tick_projectile_lifetimes)
                .chain()
                .in_set(TickSet::Contacts),
        )
        .add_systems(SimulationTick, announce_deaths.in_set(TickSet::Deaths));
    }
}
