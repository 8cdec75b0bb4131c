//! Projectiles: FireIntent → спавн снаряда, lifetime
//!
//! Снаряд: обычный entity (kind = Projectile) с `Projectile` payload,
//! `Owner` и swept коллизией. Попадания разрешает `damage` по Contact /
//! StaticImpact events.

use std::collections::BTreeSet;

use bevy::prelude::*;
use rand::Rng;

use super::weapon::{WeaponDefinition, WeaponState};
use super::{FireRejected, ShotFired};
use crate::components::{Dead, EntityId, EntityKind, SimEntity};
use crate::error::{FireError, SimulationError, SimulationResult};
use crate::logger;
use crate::math::sample_cone;
use crate::registry::{DeathCause, EntityAttributes, EntityRegistry};
use crate::DeterministicRng;

/// Payload снаряда (копия нужных полей WeaponDefinition на момент выстрела)
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Projectile {
    pub lifetime_remaining: u32,
    pub damage: u32,
    pub piercing: bool,
    pub splash_radius: Option<f32>,
    pub self_damage: bool,
    pub friendly_fire: bool,
    /// Kind стрелка на момент выстрела (для friendly fire)
    pub faction: EntityKind,
    /// Уже поражённые цели (piercing бьёт каждую один раз)
    pub hits: BTreeSet<EntityId>,
}

impl Projectile {
    pub fn from_definition(definition: &WeaponDefinition, faction: EntityKind) -> Self {
        Self {
            lifetime_remaining: definition.projectile_lifetime_ticks,
            damage: definition.damage,
            piercing: definition.piercing,
            splash_radius: definition.splash_radius,
            self_damage: definition.self_damage,
            friendly_fire: definition.friendly_fire,
            faction,
            hits: BTreeSet::new(),
        }
    }
}

/// Event: entity хочет выстрелить в направлении `aim`
///
/// Игрок: из PlayerIntent, враги: из AI Attack state.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct FireIntent {
    pub shooter: EntityId,
    pub aim: Vec3,
}

/// Event: запрос ручной перезарядки
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadRequest {
    pub entity: EntityId,
}

/// Позиция дула: центр + высота + вынос вдоль прицела
pub fn muzzle_position(transform: &Transform, definition: &WeaponDefinition, aim: Vec3) -> Vec3 {
    transform.translation + Vec3::Y * definition.muzzle_height + aim * definition.muzzle_distance
}

/// Один выстрел: проверка state machine, spread, спавн снаряда через registry
///
/// Нулевой `aim` заменяется на forward стрелка.
pub fn fire_weapon<R: Rng>(
    shooter: EntityId,
    shooter_kind: EntityKind,
    transform: &Transform,
    weapon: &mut WeaponState,
    aim: Vec3,
    rng: &mut R,
    registry: &mut EntityRegistry,
) -> Result<ShotFired, FireError> {
    let aim = aim.try_normalize().unwrap_or_else(|| transform.forward().as_vec3());
    weapon.try_fire()?;

    let definition = weapon.definition.clone();
    let direction = sample_cone(rng, aim, definition.spread_degrees);
    let origin = muzzle_position(transform, &definition, aim);
    let projectile_transform =
        Transform::from_translation(origin).with_rotation(Quat::from_rotation_arc(Vec3::NEG_Z, direction));

    let projectile = registry.spawn(
        EntityKind::Projectile,
        projectile_transform,
        EntityAttributes::projectile(
            shooter,
            Projectile::from_definition(&definition, shooter_kind),
            definition.projectile_radius,
            direction * definition.projectile_speed,
        ),
    );

    Ok(ShotFired {
        shooter,
        projectile,
        origin,
        direction,
    })
}

/// Выстрел вне schedule (тесты, скрипты). Событие `ShotFired` тоже пишется.
pub fn try_fire(world: &mut World, shooter: EntityId, aim: Vec3) -> SimulationResult<ShotFired> {
    let entity = {
        let registry = world.resource::<EntityRegistry>();
        if registry.is_dead(shooter) {
            return Err(SimulationError::InvalidEntityReference(shooter));
        }
        registry
            .resolve(shooter)
            .ok_or(SimulationError::InvalidEntityReference(shooter))?
    };
    let (transform, kind) = match (world.get::<Transform>(entity), world.get::<SimEntity>(entity)) {
        (Some(transform), Some(sim)) => (*transform, sim.kind),
        _ => return Err(SimulationError::InvalidEntityReference(shooter)),
    };

    let result = world.resource_scope(|world, mut registry: Mut<EntityRegistry>| {
        world.resource_scope(|world, mut rng: Mut<DeterministicRng>| {
            let mut weapon = world.get_mut::<WeaponState>(entity).ok_or(FireError::NoWeapon)?;
            fire_weapon(shooter, kind, &transform, &mut weapon, aim, &mut rng.rng, &mut registry)
        })
    });

    match result {
        Ok(shot) => {
            world.send_event(shot);
            Ok(shot)
        }
        Err(reason) => {
            world.send_event(FireRejected { shooter, reason });
            Err(reason.into())
        }
    }
}

/// Система: ручная перезарядка
pub fn process_reload_requests(
    mut requests: EventReader<ReloadRequest>,
    registry: Res<EntityRegistry>,
    mut weapons: Query<&mut WeaponState, Without<Dead>>,
) {
    for request in requests.read() {
        let Some(entity) = registry.resolve_alive(request.entity) else {
            continue;
        };
        if let Ok(mut weapon) = weapons.get_mut(entity) {
            if weapon.start_reload() {
                logger::log(&format!("{} reloading", request.entity));
            }
        }
    }
}

/// Система: FireIntent → снаряды
///
/// Intents обрабатываются в порядке shooter id: spread из общего seeded
/// RNG воспроизводим.
pub fn process_fire_intents(
    mut intents: EventReader<FireIntent>,
    mut registry: ResMut<EntityRegistry>,
    mut rng: ResMut<DeterministicRng>,
    mut shooters: Query<(&SimEntity, &Transform, Option<&mut WeaponState>), Without<Dead>>,
    mut fired: EventWriter<ShotFired>,
    mut rejected: EventWriter<FireRejected>,
) {
    let mut pending: Vec<FireIntent> = intents.read().copied().collect();
    pending.sort_by_key(|intent| intent.shooter);

    for intent in pending {
        let Some(entity) = registry.resolve_alive(intent.shooter) else {
            logger::log_warning(&format!("fire intent from missing entity {}", intent.shooter));
            continue;
        };
        let Ok((sim, transform, weapon)) = shooters.get_mut(entity) else {
            continue;
        };
        let Some(mut weapon) = weapon else {
            rejected.write(FireRejected {
                shooter: intent.shooter,
                reason: FireError::NoWeapon,
            });
            continue;
        };

        let kind = sim.kind;
        let transform = *transform;
        match fire_weapon(
            intent.shooter,
            kind,
            &transform,
            &mut weapon,
            intent.aim,
            &mut rng.rng,
            &mut registry,
        ) {
            Ok(shot) => {
                fired.write(shot);
            }
            Err(reason) => {
                rejected.write(FireRejected {
                    shooter: intent.shooter,
                    reason,
                });
            }
        }
    }
}

/// Система: lifetime снарядов, истёкшие помечаются мёртвыми (`Expired`)
pub fn tick_projectile_lifetimes(
    mut registry: ResMut<EntityRegistry>,
    mut projectiles: Query<(&SimEntity, &mut Projectile), Without<Dead>>,
) {
    let mut expired = Vec::new();
    for (entity, mut projectile) in projectiles.iter_mut() {
        if registry.is_dead(entity.id) {
            continue;
        }
        projectile.lifetime_remaining = projectile.lifetime_remaining.saturating_sub(1);
        if projectile.lifetime_remaining == 0 {
            expired.push(entity.id);
        }
    }
    expired.sort();

    for id in expired {
        if let Err(err) = registry.mark_dead(id, DeathCause::Expired) {
            logger::log_error(&format!("tick_projectile_lifetimes: {}", err));
        }
    }
}
