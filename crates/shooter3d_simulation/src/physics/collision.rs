//! Collision detection + resolution
//!
//! Политика:
//! - dynamic vs static (уровень, StaticObstacle) → positional correction вдоль
//!   нормали, компонента velocity "в стену" обнуляется, до 3 проходов
//! - swept body (снаряд) vs static → `StaticImpact` event, без коррекции
//! - dynamic vs dynamic / trigger → `Contact` event, без коррекции
//!
//! Все обходы: в порядке `EntityId`, candidate pairs отсортированы.

use std::collections::BTreeMap;

use bevy::prelude::*;

use super::broad_phase::UniformGrid;
use super::movement::KinematicController;
use super::{Contact, StaticImpact};
use crate::components::{Capabilities, Collider, Dead, EntityId, EntityKind, PhysicsBody, SimEntity};
use crate::logger;
use crate::math::{capsule_capsule, capsule_triangle, closest_point_on_segment, Capsule};
use crate::registry::{DeathCause, EntityRegistry};
use crate::world::Level;

/// Зазор для ground probe и broad phase (метры)
pub const SKIN: f32 = 0.05;
pub const RESOLUTION_PASSES: usize = 3;
/// normal.y выше этого: пол (≈ 45°)
pub const GROUND_NORMAL_Y: f32 = 0.7;
/// Ячейка grid для dynamic тел
pub const BODY_CELL_SIZE: f32 = 2.0;

/// Marker: тело тестируется swept-капсулой previous → current (снаряды)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct SweptBody;

/// Результат выталкивания из static геометрии
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticResolution {
    pub offset: Vec3,
    pub normals: Vec<Vec3>,
    pub grounded: bool,
}

impl StaticResolution {
    /// Убирает компоненту velocity, направленную в поверхности
    pub fn clip_velocity(&self, mut velocity: Vec3) -> Vec3 {
        for normal in &self.normals {
            let into = velocity.dot(*normal);
            if into < 0.0 {
                velocity -= *normal * into;
            }
        }
        velocity
    }
}

/// Выталкивает капсулу из треугольников уровня и static obstacles
pub fn resolve_static(shape: &Capsule, level: &Level, obstacles: &[Capsule]) -> StaticResolution {
    let mut result = StaticResolution::default();
    let mut current = *shape;

    for _ in 0..RESOLUTION_PASSES {
        let mut moved = false;

        for index in level.query_aabb(&current.aabb().expanded(SKIN)) {
            let Some(tri) = level.triangle(index) else {
                continue;
            };
            if let Some(contact) = capsule_triangle(&current, tri) {
                let push = contact.normal * contact.depth;
                current = current.translated(push);
                result.offset += push;
                result.normals.push(contact.normal);
                result.grounded |= contact.normal.y > GROUND_NORMAL_Y;
                moved = true;
            }
        }

        for obstacle in obstacles {
            if let Some(contact) = capsule_capsule(&current, obstacle) {
                let push = contact.normal * contact.depth;
                current = current.translated(push);
                result.offset += push;
                result.normals.push(contact.normal);
                result.grounded |= contact.normal.y > GROUND_NORMAL_Y;
                moved = true;
            }
        }

        if !moved {
            break;
        }
    }

    if !result.grounded {
        result.grounded = probe_ground(&current, level, obstacles);
    }
    result
}

/// Есть ли пол в пределах SKIN под капсулой
fn probe_ground(shape: &Capsule, level: &Level, obstacles: &[Capsule]) -> bool {
    let probe = shape.translated(Vec3::NEG_Y * SKIN);
    let on_level = level.query_aabb(&probe.aabb()).into_iter().any(|index| {
        level
            .triangle(index)
            .and_then(|tri| capsule_triangle(&probe, tri))
            .is_some_and(|contact| contact.normal.y > GROUND_NORMAL_Y)
    });
    on_level
        || obstacles.iter().any(|obstacle| {
            capsule_capsule(&probe, obstacle).is_some_and(|contact| contact.normal.y > GROUND_NORMAL_Y)
        })
}

/// Форма тела на этот тик: swept capsule для снарядов, обычная для остальных
pub fn tick_shape(collider: &Collider, transform: &Transform, body: &PhysicsBody, swept: bool) -> Capsule {
    if swept {
        Capsule::new(body.previous_position, transform.translation, collider.volume.radius())
    } else {
        collider.world_shape(transform)
    }
}

/// Система: dynamic тела vs уровень и static obstacles
pub fn resolve_static_collisions(
    level: Res<Level>,
    mut bodies: Query<
        (
            &SimEntity,
            &Capabilities,
            &Collider,
            &mut Transform,
            &mut PhysicsBody,
            Option<&mut KinematicController>,
        ),
        (Without<Dead>, Without<SweptBody>),
    >,
) {
    let mut obstacles: Vec<(EntityId, Capsule)> = bodies
        .iter()
        .filter(|(_, capabilities, ..)| capabilities.solid && !capabilities.dynamic)
        .map(|(entity, _, collider, transform, ..)| (entity.id, collider.world_shape(transform)))
        .collect();
    obstacles.sort_by_key(|(id, _)| *id);
    let obstacles: Vec<Capsule> = obstacles.into_iter().map(|(_, shape)| shape).collect();

    let mut dynamic: Vec<_> = bodies
        .iter_mut()
        .filter(|(_, capabilities, ..)| capabilities.dynamic)
        .collect();
    dynamic.sort_by_key(|(entity, ..)| entity.id);

    for (_, _, collider, mut transform, mut body, controller) in dynamic {
        let shape = collider.world_shape(&transform);
        let resolution = resolve_static(&shape, &level, &obstacles);

        if resolution.offset != Vec3::ZERO {
            transform.translation += resolution.offset;
            body.velocity = resolution.clip_velocity(body.velocity);
        }
        if let Some(mut controller) = controller {
            controller.grounded = resolution.grounded;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SweepHit {
    /// Расстояние вдоль sweep от previous_position
    travel: f32,
    stop_at: Vec3,
    point: Vec3,
    normal: Vec3,
    obstacle: Option<EntityId>,
}

fn earliest_static_hit(sweep: &Capsule, level: &Level, obstacles: &[(EntityId, Capsule)]) -> Option<SweepHit> {
    let mut best: Option<SweepHit> = None;
    let mut consider = |point: Vec3, normal: Vec3, obstacle: Option<EntityId>| {
        let stop_at = closest_point_on_segment(point, sweep.a, sweep.b);
        let travel = sweep.a.distance(stop_at);
        if best.is_none_or(|hit| travel < hit.travel) {
            best = Some(SweepHit {
                travel,
                stop_at,
                point,
                normal,
                obstacle,
            });
        }
    };

    for index in level.query_aabb(&sweep.aabb()) {
        let Some(tri) = level.triangle(index) else {
            continue;
        };
        if let Some(contact) = capsule_triangle(sweep, tri) {
            consider(contact.point, contact.normal, None);
        }
    }
    for (id, obstacle) in obstacles {
        if let Some(contact) = capsule_capsule(sweep, obstacle) {
            consider(contact.point, contact.normal, Some(*id));
        }
    }
    best
}

/// Система: swept тела (снаряды) vs static: `StaticImpact`
///
/// Снаряд останавливается в точке удара, чтобы dynamic contacts этого тика
/// не "видели" его за стеной.
pub fn detect_projectile_impacts(
    level: Res<Level>,
    mut swept: Query<(&SimEntity, &Collider, &mut Transform, &PhysicsBody), (With<SweptBody>, Without<Dead>)>,
    statics: Query<(&SimEntity, &Capabilities, &Collider, &Transform), (Without<SweptBody>, Without<Dead>)>,
    mut impacts: EventWriter<StaticImpact>,
) {
    let mut obstacles: Vec<(EntityId, Capsule)> = statics
        .iter()
        .filter(|(_, capabilities, ..)| capabilities.solid && !capabilities.dynamic)
        .map(|(entity, _, collider, transform)| (entity.id, collider.world_shape(transform)))
        .collect();
    obstacles.sort_by_key(|(id, _)| *id);

    let mut projectiles: Vec<_> = swept.iter_mut().collect();
    projectiles.sort_by_key(|(entity, ..)| entity.id);

    for (entity, collider, mut transform, body) in projectiles {
        let sweep = tick_shape(collider, &transform, body, true);
        let Some(hit) = earliest_static_hit(&sweep, &level, &obstacles) else {
            continue;
        };
        transform.translation = hit.stop_at;
        impacts.write(StaticImpact {
            entity: entity.id,
            obstacle: hit.obstacle,
            point: hit.point,
            normal: hit.normal,
        });
    }
}

/// Система: broad phase (grid) + narrow phase для dynamic/trigger тел
pub fn detect_contacts(
    bodies: Query<(&SimEntity, &Capabilities, &Collider, &Transform, &PhysicsBody, Has<SweptBody>), Without<Dead>>,
    mut contacts: EventWriter<Contact>,
) {
    let mut shapes: BTreeMap<EntityId, (Capsule, Capabilities, EntityKind)> = BTreeMap::new();
    for (entity, capabilities, collider, transform, body, swept) in bodies.iter() {
        if !capabilities.reports_contacts() {
            continue;
        }
        let shape = tick_shape(collider, transform, body, swept);
        shapes.insert(entity.id, (shape, *capabilities, entity.kind));
    }

    let mut grid = UniformGrid::new(BODY_CELL_SIZE);
    for (id, (shape, ..)) in &shapes {
        grid.insert(*id, &shape.aabb());
    }

    for (a, b) in grid.candidate_pairs() {
        let (Some((shape_a, caps_a, kind_a)), Some((shape_b, caps_b, kind_b))) = (shapes.get(&a), shapes.get(&b)) else {
            continue;
        };
        // Два trigger'а и два снаряда друг другу не интересны
        if !caps_a.dynamic && !caps_b.dynamic {
            continue;
        }
        if *kind_a == EntityKind::Projectile && *kind_b == EntityKind::Projectile {
            continue;
        }
        if let Some(manifold) = capsule_capsule(shape_a, shape_b) {
            contacts.write(Contact {
                a,
                b,
                normal: manifold.normal,
                depth: manifold.depth,
                point: manifold.point,
            });
        }
    }
}

/// Система: dynamic тела за пределами уровня помечаются мёртвыми
pub fn enforce_bounds(
    level: Res<Level>,
    mut registry: ResMut<EntityRegistry>,
    bodies: Query<(&SimEntity, &Capabilities, &Transform), Without<Dead>>,
) {
    let mut escaped: Vec<EntityId> = bodies
        .iter()
        .filter(|(_, capabilities, transform)| capabilities.dynamic && !level.contains(transform.translation))
        .map(|(entity, ..)| entity.id)
        .collect();
    escaped.sort();

    for id in escaped {
        match registry.mark_dead(id, DeathCause::OutOfBounds) {
            Ok(true) => logger::log(&format!("{} left level bounds", id)),
            Ok(false) => {}
            Err(err) => logger::log_error(&format!("enforce_bounds: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::build_flat;

    #[test]
    fn test_capsule_pushed_out_of_floor() {
        let level = build_flat(10.0).unwrap();
        // Центр на 0.9: низ капсулы (0.5 + 0.5) на 0.1 под полом
        let shape = Capsule::upright(Vec3::new(1.0, 0.9, 2.0), 0.5, 0.5);
        let resolution = resolve_static(&shape, &level, &[]);

        assert!(resolution.grounded);
        assert!((resolution.offset.y - 0.1).abs() < 1e-4, "{:?}", resolution.offset);
        assert!(resolution.offset.x.abs() < 1e-5 && resolution.offset.z.abs() < 1e-5);
    }

    #[test]
    fn test_velocity_into_floor_zeroed() {
        let level = build_flat(10.0).unwrap();
        let shape = Capsule::upright(Vec3::new(1.0, 0.95, 2.0), 0.5, 0.5);
        let resolution = resolve_static(&shape, &level, &[]);
        let velocity = resolution.clip_velocity(Vec3::new(3.0, -10.0, 1.0));
        assert!(velocity.y.abs() < 1e-4);
        assert!((velocity.x - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_standing_on_floor_is_grounded_without_push() {
        let level = build_flat(10.0).unwrap();
        let shape = Capsule::upright(Vec3::new(1.0, 1.02, 2.0), 0.5, 0.5);
        let resolution = resolve_static(&shape, &level, &[]);
        assert_eq!(resolution.offset, Vec3::ZERO);
        assert!(resolution.grounded);
    }

    #[test]
    fn test_airborne_not_grounded() {
        let level = build_flat(10.0).unwrap();
        let shape = Capsule::upright(Vec3::new(1.0, 3.0, 2.0), 0.5, 0.5);
        assert!(!resolve_static(&shape, &level, &[]).grounded);
    }

    #[test]
    fn test_pushed_out_of_obstacle() {
        let level = build_flat(10.0).unwrap();
        let obstacle = Capsule::upright(Vec3::new(0.0, 1.0, 0.0), 0.5, 0.5);
        let shape = Capsule::upright(Vec3::new(0.8, 3.0, 0.0), 0.5, 0.5);
        let resolution = resolve_static(&shape, &level, &[obstacle]);
        // Сумма радиусов 1.0, было 0.8 → сдвиг +0.2 по X
        assert!((resolution.offset.x - 0.2).abs() < 1e-4, "{:?}", resolution.offset);
        assert!(!resolution.grounded);
    }

    #[test]
    fn test_sweep_hits_wall_before_end() {
        let level = build_flat(10.0).unwrap();
        // Снаряд летит вниз сквозь пол за один тик
        let sweep = Capsule::new(Vec3::new(1.0, 1.0, 2.0), Vec3::new(1.0, -1.0, 2.0), 0.05);
        let hit = earliest_static_hit(&sweep, &level, &[]).unwrap();
        assert!(hit.obstacle.is_none());
        assert!(hit.point.y.abs() < 1e-4);
        assert!(hit.travel <= 1.0 + 1e-4);
    }
}
