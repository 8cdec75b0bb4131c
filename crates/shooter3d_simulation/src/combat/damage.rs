//! Damage: projectile hits, splash, death announcement
//!
//! Попадания читаются из `Contact` (снаряд vs entity) и `StaticImpact`
//! (снаряд vs стена/obstacle). На один снаряд за тик: entity hits по порядку
//! вдоль полёта, потом: стена, если снаряд ещё жив.

use std::collections::{BTreeMap, BTreeSet};

use bevy::prelude::*;

use super::projectile::Projectile;
use super::{DamageDealt, EntityDied};
use crate::components::{Capabilities, Collider, Dead, EntityId, EntityKind, Health, Owner, PhysicsBody, SimEntity};
use crate::logger;
use crate::math::closest_point_on_segment;
use crate::physics::{Contact, StaticImpact};
use crate::registry::{DeathCause, EntityRegistry};

type DamageTargets<'w, 's> = Query<
    'w,
    's,
    (&'static SimEntity, &'static Capabilities, &'static Collider, &'static Transform, &'static mut Health),
    (Without<Dead>, Without<Projectile>),
>;

/// Урон по цели. Возвращает `true`, если удар засчитан (цель damageable и жива).
///
/// Здоровье насыщается на нуле; на нуле цель помечается мёртвой (один раз:
/// registry игнорирует повторные пометки).
pub fn apply_damage(
    targets: &mut DamageTargets,
    registry: &mut EntityRegistry,
    events: &mut EventWriter<DamageDealt>,
    target: EntityId,
    amount: u32,
    source: Option<EntityId>,
    point: Vec3,
) -> bool {
    let Some(entity) = registry.resolve_alive(target) else {
        return false;
    };
    let Ok((_, capabilities, _, _, mut health)) = targets.get_mut(entity) else {
        return false;
    };
    if !capabilities.damageable {
        return false;
    }

    let dealt = health.take_damage(amount);
    events.write(DamageDealt {
        target,
        source,
        amount: dealt,
        remaining: health.current,
        point,
    });

    if !health.is_alive() {
        if let Err(err) = registry.mark_dead(target, DeathCause::Killed { killer: source }) {
            logger::log_error(&format!("apply_damage: {}", err));
        }
    }
    true
}

/// Кого снаряд не трогает: владелец без self_damage, свои без friendly_fire
fn is_exempt(projectile: &Projectile, owner: EntityId, target: EntityId, target_kind: EntityKind) -> bool {
    if target == owner {
        return !projectile.self_damage;
    }
    target_kind == projectile.faction && !projectile.friendly_fire
}

/// Splash вокруг `center` (расстояние до поверхности формы цели)
#[allow(clippy::too_many_arguments)]
fn apply_splash(
    targets: &mut DamageTargets,
    registry: &mut EntityRegistry,
    events: &mut EventWriter<DamageDealt>,
    projectile: &Projectile,
    owner: EntityId,
    center: Vec3,
    radius: f32,
    direct: Option<EntityId>,
) {
    let mut victims: Vec<(EntityId, EntityKind)> = targets
        .iter()
        .filter(|(_, capabilities, ..)| capabilities.damageable)
        .filter(|(_, _, collider, transform, _)| {
            let shape = collider.world_shape(transform);
            let closest = closest_point_on_segment(center, shape.a, shape.b);
            (closest.distance(center) - shape.radius).max(0.0) <= radius
        })
        .map(|(entity, ..)| (entity.id, entity.kind))
        .collect();
    victims.sort();

    for (victim, kind) in victims {
        if Some(victim) == direct || is_exempt(projectile, owner, victim, kind) {
            continue;
        }
        apply_damage(targets, registry, events, victim, projectile.damage, Some(owner), center);
    }
}

#[derive(Debug, Clone, Copy)]
struct EntityHit {
    travel: f32,
    target: EntityId,
    point: Vec3,
}

/// Система: разрешение попаданий снарядов
pub fn resolve_projectile_hits(
    mut contacts: EventReader<Contact>,
    mut impacts: EventReader<StaticImpact>,
    mut registry: ResMut<EntityRegistry>,
    mut projectiles: Query<(&mut Projectile, &Owner, &PhysicsBody), Without<Dead>>,
    mut targets: DamageTargets,
    mut damage_events: EventWriter<DamageDealt>,
) {
    let mut entity_hits: BTreeMap<EntityId, Vec<EntityHit>> = BTreeMap::new();
    for contact in contacts.read() {
        for (shot, other) in [(contact.a, contact.b), (contact.b, contact.a)] {
            if registry.kind(shot) != Some(EntityKind::Projectile) {
                continue;
            }
            if matches!(registry.kind(other), Some(EntityKind::Projectile) | None) {
                continue;
            }
            let origin = registry
                .resolve(shot)
                .and_then(|entity| projectiles.get(entity).ok())
                .map(|(_, _, body)| body.previous_position)
                .unwrap_or(contact.point);
            entity_hits.entry(shot).or_default().push(EntityHit {
                travel: origin.distance(contact.point),
                target: other,
                point: contact.point,
            });
        }
    }

    let mut static_hits: BTreeMap<EntityId, StaticImpact> = BTreeMap::new();
    for impact in impacts.read() {
        if registry.kind(impact.entity) == Some(EntityKind::Projectile) {
            static_hits.entry(impact.entity).or_insert(*impact);
        }
    }

    let shots: BTreeSet<EntityId> = entity_hits.keys().chain(static_hits.keys()).copied().collect();
    for shot in shots {
        let Some(entity) = registry.resolve_alive(shot) else {
            continue;
        };
        let Ok((mut projectile, owner, _)) = projectiles.get_mut(entity) else {
            continue;
        };
        let owner = owner.0;

        let mut hits = entity_hits.remove(&shot).unwrap_or_default();
        hits.sort_by(|x, y| x.travel.total_cmp(&y.travel).then(x.target.cmp(&y.target)));

        let mut consumed = false;
        for hit in hits {
            if projectile.hits.contains(&hit.target) {
                continue;
            }
            let Some(target_kind) = registry.kind(hit.target) else {
                continue;
            };
            if hit.target == owner && !projectile.self_damage {
                // Снаряд вылетает из владельца
                continue;
            }
            let Some(target_entity) = registry.resolve_alive(hit.target) else {
                continue;
            };
            let damageable = targets
                .get(target_entity)
                .map(|(_, capabilities, ..)| capabilities.damageable)
                .unwrap_or(false);
            if !damageable {
                // Triggers (pickups) снаряд не останавливают
                continue;
            }
            if is_exempt(&projectile, owner, hit.target, target_kind) {
                // Свой без friendly fire: снаряд гасится без урона
                consumed = true;
                break;
            }

            apply_damage(
                &mut targets,
                &mut registry,
                &mut damage_events,
                hit.target,
                projectile.damage,
                Some(owner),
                hit.point,
            );
            projectile.hits.insert(hit.target);
            if let Some(radius) = projectile.splash_radius {
                apply_splash(
                    &mut targets,
                    &mut registry,
                    &mut damage_events,
                    &projectile,
                    owner,
                    hit.point,
                    radius,
                    Some(hit.target),
                );
            }
            if !projectile.piercing {
                consumed = true;
                break;
            }
        }

        if !consumed {
            if let Some(impact) = static_hits.get(&shot) {
                if let Some(obstacle) = impact.obstacle {
                    if !projectile.hits.contains(&obstacle) {
                        apply_damage(
                            &mut targets,
                            &mut registry,
                            &mut damage_events,
                            obstacle,
                            projectile.damage,
                            Some(owner),
                            impact.point,
                        );
                        projectile.hits.insert(obstacle);
                    }
                }
                if let Some(radius) = projectile.splash_radius {
                    apply_splash(
                        &mut targets,
                        &mut registry,
                        &mut damage_events,
                        &projectile,
                        owner,
                        impact.point,
                        radius,
                        impact.obstacle,
                    );
                }
                // Стена останавливает и piercing снаряды
                consumed = true;
            }
        }

        if consumed {
            if let Err(err) = registry.mark_dead(shot, DeathCause::Impact) {
                logger::log_error(&format!("resolve_projectile_hits: {}", err));
            }
        }
    }
}

/// Система (фаза Deaths): смерти тика → `Dead` marker + `EntityDied`
///
/// Ровно одно событие на id: registry отдаёт каждую запись один раз.
pub fn announce_deaths(
    mut commands: Commands,
    mut registry: ResMut<EntityRegistry>,
    mut died: EventWriter<EntityDied>,
) {
    for record in registry.take_unannounced() {
        if let Some(entity) = registry.resolve(record.id) {
            if let Ok(mut entity_commands) = commands.get_entity(entity) {
                entity_commands.insert(Dead);
            }
        }
        if matches!(record.kind, EntityKind::Player | EntityKind::Enemy | EntityKind::StaticObstacle) {
            logger::log_info(&format!(
                "{} {} died: {:?}",
                record.kind.as_str(),
                record.id,
                record.cause
            ));
        }
        died.write(EntityDied {
            id: record.id,
            kind: record.kind,
            cause: record.cause,
        });
    }
}
