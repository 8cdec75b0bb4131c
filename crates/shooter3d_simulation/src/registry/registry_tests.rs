//! Tests for EntityRegistry lifecycle (spawn buffer, mark_dead, commit).

use bevy::prelude::*;

use super::*;
use crate::combat::PickupKind;
use crate::components::{Collider, EntityKind, SimEntity};

fn obstacle() -> EntityAttributes {
    EntityAttributes::obstacle(Collider::sphere(0.5), Some(10))
}

fn spawn_committed(world: &mut World, registry: &mut EntityRegistry, position: Vec3) -> EntityId {
    let id = registry.spawn(EntityKind::StaticObstacle, Transform::from_translation(position), obstacle());
    registry.commit(world);
    id
}

#[test]
fn test_ids_monotonic_and_spawn_buffered() {
    let mut world = World::new();
    let mut registry = EntityRegistry::new();

    let first = registry.spawn(EntityKind::StaticObstacle, Transform::default(), obstacle());
    let second = registry.spawn(EntityKind::Pickup, Transform::default(), EntityAttributes::pickup(PickupKind::Ammo, 0.5));
    assert!(first < second);

    // До commit в мире ничего нет
    assert!(registry.resolve(first).is_none());
    assert!(registry.contains(first));
    assert_eq!(registry.kind(second), Some(EntityKind::Pickup));

    let report = registry.commit(&mut world);
    assert_eq!(report.spawned, vec![first, second]);

    let entity = registry.resolve(first).unwrap();
    let sim = world.get::<SimEntity>(entity).unwrap();
    assert_eq!(sim.id, first);
    assert_eq!(sim.kind, EntityKind::StaticObstacle);
}

#[test]
fn test_mark_dead_idempotent() {
    let mut world = World::new();
    let mut registry = EntityRegistry::new();
    let id = spawn_committed(&mut world, &mut registry, Vec3::ZERO);

    assert_eq!(registry.mark_dead(id, DeathCause::Impact), Ok(true));
    assert_eq!(registry.mark_dead(id, DeathCause::Expired), Ok(false));

    let deaths = registry.take_unannounced();
    assert_eq!(deaths.len(), 1);
    assert_eq!(deaths[0].cause, DeathCause::Impact);
    assert!(registry.take_unannounced().is_empty());
}

#[test]
fn test_mark_dead_unknown_id_fails() {
    let mut registry = EntityRegistry::new();
    assert_eq!(
        registry.mark_dead(EntityId(99), DeathCause::Expired),
        Err(SimulationError::InvalidEntityReference(EntityId(99)))
    );
}

#[test]
fn test_dead_entity_visible_until_commit() {
    let mut world = World::new();
    let mut registry = EntityRegistry::new();
    let id = spawn_committed(&mut world, &mut registry, Vec3::X);

    registry.mark_dead(id, DeathCause::Killed { killer: None }).unwrap();
    // Все системы тика ещё видят entity
    assert!(registry.resolve(id).is_some());
    assert!(registry.resolve_alive(id).is_none());
    assert!(registry.get(&world, id).unwrap().dead);

    let entity = registry.resolve(id).unwrap();
    let report = registry.commit(&mut world);
    assert_eq!(report.removed, vec![id]);
    assert!(registry.resolve(id).is_none());
    assert!(registry.get(&world, id).is_none());
    assert!(world.get_entity(entity).is_err());

    // После удаления id неизвестен
    assert!(registry.mark_dead(id, DeathCause::Expired).is_err());
}

#[test]
fn test_spawn_then_death_same_tick_discarded() {
    let mut world = World::new();
    let mut registry = EntityRegistry::new();

    let doomed = registry.spawn(EntityKind::StaticObstacle, Transform::default(), obstacle());
    let survivor = registry.spawn(EntityKind::StaticObstacle, Transform::default(), obstacle());
    assert_eq!(registry.mark_dead(doomed, DeathCause::Impact), Ok(true));
    assert_eq!(registry.count_alive(EntityKind::StaticObstacle), 1);

    let report = registry.commit(&mut world);
    assert_eq!(report.discarded, vec![doomed]);
    assert_eq!(report.spawned, vec![survivor]);
    assert_eq!(report.late_deaths.len(), 1);
    assert!(registry.resolve(doomed).is_none());
    assert!(registry.resolve(survivor).is_some());
    assert_eq!(world.query::<&SimEntity>().iter(&world).count(), 1);
}

#[test]
fn test_for_each_alive_in_id_order() {
    let mut world = World::new();
    let mut registry = EntityRegistry::new();
    let a = spawn_committed(&mut world, &mut registry, Vec3::new(3.0, 0.0, 0.0));
    let b = spawn_committed(&mut world, &mut registry, Vec3::new(1.0, 0.0, 0.0));
    let c = spawn_committed(&mut world, &mut registry, Vec3::new(2.0, 0.0, 0.0));
    registry.mark_dead(b, DeathCause::Impact).unwrap();

    let mut seen = Vec::new();
    registry.for_each_alive(&world, |view| view.kind == EntityKind::StaticObstacle, |view| seen.push(view.id));
    assert_eq!(seen, vec![a, c]);

    let mut far = Vec::new();
    registry.for_each_alive(&world, |view| view.transform.translation.x > 2.5, |view| far.push(view.id));
    assert_eq!(far, vec![a]);
}

#[test]
fn test_duplicate_live_id_is_violation() {
    let mut world = World::new();
    let mut registry = EntityRegistry::new();
    let id = spawn_committed(&mut world, &mut registry, Vec3::ZERO);

    registry.force_pending(id, EntityKind::StaticObstacle, obstacle());
    let report = registry.commit(&mut world);

    assert!(report.spawned.is_empty());
    assert_eq!(registry.violations().len(), 1);
    assert_eq!(registry.live_count(), 1);
}
