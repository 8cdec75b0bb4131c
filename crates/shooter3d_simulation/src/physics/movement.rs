//! Kinematic контроллер для игрока и врагов
//!
//! Архитектура:
//! - Custom velocity integration (без физического движка)
//! - MovementInput → горизонтальная velocity, gravity + jump → вертикальная
//! - grounded выставляет collision resolution (floor contact), не эта система
//!
//! Детерминизм: fixed dt из `TickClock`, порядок обхода не влияет на результат
//! (каждое тело обновляется независимо).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{Capabilities, Dead, PhysicsBody};
use crate::TickClock;

/// Input меньше этого считается "стоим"
const INPUT_DEAD_ZONE_SQ: f32 = 1e-4;

/// Kinematic контроллер компонент
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct KinematicController {
    /// Максимальная горизонтальная скорость (m/s)
    pub move_speed: f32,
    /// Гравитация (m/s², отрицательная)
    pub gravity: f32,
    /// Начальная вертикальная скорость прыжка (m/s)
    pub jump_speed: f32,
    #[serde(skip)]
    pub grounded: bool,
}

impl Default for KinematicController {
    fn default() -> Self {
        Self {
            move_speed: 10.0,
            gravity: -30.0,
            jump_speed: 15.0,
            grounded: false,
        }
    }
}

/// Входные данные для движения
///
/// Для игрока заполняется из `PlayerIntent`, для врагов: AI steering.
/// `direction` в мировых координатах, длина ≤ 1 (доля от move_speed).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct MovementInput {
    pub direction: Vec3,
    pub jump: bool,
}

/// Горизонтальная velocity из input (длина input ограничена 1)
pub fn horizontal_velocity(controller: &KinematicController, input: &MovementInput) -> Vec2 {
    let planar = Vec2::new(input.direction.x, input.direction.z);
    if planar.length_squared() <= INPUT_DEAD_ZONE_SQ {
        return Vec2::ZERO;
    }
    planar.clamp_length_max(1.0) * controller.move_speed
}

/// Система применения движения от input
pub fn apply_movement_input(
    mut query: Query<(&KinematicController, &MovementInput, &mut PhysicsBody), Without<Dead>>,
) {
    for (controller, input, mut body) in query.iter_mut() {
        let planar = horizontal_velocity(controller, input);
        body.velocity.x = planar.x;
        body.velocity.z = planar.y;
    }
}

/// Система jump + gravity
///
/// Прыжок только с земли; после прыжка grounded сбрасывается до следующего
/// floor contact.
pub fn apply_jump_and_gravity(
    mut query: Query<(&mut KinematicController, &mut MovementInput, &mut PhysicsBody), Without<Dead>>,
    clock: Res<TickClock>,
) {
    for (mut controller, mut input, mut body) in query.iter_mut() {
        if controller.grounded && input.jump {
            body.velocity.y = controller.jump_speed;
            controller.grounded = false;
        } else if !controller.grounded {
            body.velocity.y += controller.gravity * clock.dt;
        } else if body.velocity.y < 0.0 {
            body.velocity.y = 0.0;
        }
        // Jump: одноразовый
        input.jump = false;
    }
}

/// Система интеграции velocity → Transform: position += velocity × dt
///
/// `previous_position` сохраняется для swept тестов (снаряды).
pub fn integrate_velocity(
    mut query: Query<(&Capabilities, &mut PhysicsBody, &mut Transform), Without<Dead>>,
    clock: Res<TickClock>,
) {
    for (capabilities, mut body, mut transform) in query.iter_mut() {
        if !capabilities.dynamic {
            continue;
        }
        body.previous_position = transform.translation;
        transform.translation += body.velocity * clock.dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_input_logic() {
        let controller = KinematicController::default();
        let input = MovementInput {
            direction: Vec3::Z,
            jump: false,
        };
        let planar = horizontal_velocity(&controller, &input);
        assert!((planar.y - 10.0).abs() < 1e-5, "velocity.z = {}", planar.y);
        assert!(planar.x.abs() < 1e-5);
    }

    #[test]
    fn test_movement_input_capped_and_partial() {
        let controller = KinematicController::default();

        let over = MovementInput {
            direction: Vec3::new(3.0, 0.0, 4.0),
            jump: false,
        };
        assert!((horizontal_velocity(&controller, &over).length() - 10.0).abs() < 1e-4);

        // Arrive: половина input = половина скорости
        let half = MovementInput {
            direction: Vec3::new(0.5, 0.0, 0.0),
            jump: false,
        };
        assert!((horizontal_velocity(&controller, &half).x - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_dead_zone_stops() {
        let controller = KinematicController::default();
        let input = MovementInput {
            direction: Vec3::new(0.001, 5.0, 0.0),
            jump: false,
        };
        assert_eq!(horizontal_velocity(&controller, &input), Vec2::ZERO);
    }

    #[test]
    fn test_gravity_and_jump_systems() {
        let mut world = World::new();
        world.insert_resource(TickClock::new(60.0));

        let airborne = world
            .spawn((
                KinematicController::default(),
                MovementInput::default(),
                PhysicsBody::default(),
            ))
            .id();
        let jumper = world
            .spawn((
                KinematicController {
                    grounded: true,
                    ..default()
                },
                MovementInput {
                    direction: Vec3::ZERO,
                    jump: true,
                },
                PhysicsBody::default(),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(apply_jump_and_gravity);
        schedule.run(&mut world);

        let fall = world.get::<PhysicsBody>(airborne).unwrap().velocity.y;
        assert!((fall - (-30.0 / 60.0)).abs() < 1e-5);

        let jump = world.get::<PhysicsBody>(jumper).unwrap().velocity.y;
        assert_eq!(jump, 15.0);
        assert!(!world.get::<KinematicController>(jumper).unwrap().grounded);
        assert!(!world.get::<MovementInput>(jumper).unwrap().jump);
    }
}
