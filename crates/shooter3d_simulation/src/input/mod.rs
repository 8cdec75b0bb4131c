//! Input: decoded player intent → movement, look, fire, reload
//!
//! Внешний слой кладёт `PlayerIntent` раз в кадр. Фаза Input каждого тика
//! переводит его в `MovementInput`, `LookAngles`, `FireIntent`, `ReloadRequest`.
//! One-shot поля (jump, reload, look delta) копятся до ближайшего тика и
//! применяются один раз.

use bevy::prelude::*;

use crate::combat::{FireIntent, ReloadRequest};
use crate::components::{Dead, LookAngles, Player, SimEntity};
use crate::physics::MovementInput;
use crate::{SimulationTick, TickSet};

/// Предел pitch по умолчанию (градусы)
pub const DEFAULT_MAX_PITCH_DEGREES: f32 = 25.0;

/// Намерения игрока за кадр
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerIntent {
    /// x: strafe вправо, y: вперёд (длина ≤ 1)
    pub movement: Vec2,
    /// yaw/pitch delta в радианах
    pub look_delta: Vec2,
    /// Явное направление прицела; `None`: по взгляду
    pub aim: Option<Vec3>,
    pub fire: bool,
    pub jump: bool,
    pub reload: bool,
    pub pause_toggle: bool,
    pub quit: bool,
}

impl PlayerIntent {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn moving(movement: Vec2) -> Self {
        Self {
            movement,
            ..default()
        }
    }

    pub fn firing(aim: Option<Vec3>) -> Self {
        Self {
            fire: true,
            aim,
            ..default()
        }
    }

    /// Объединить с более поздним intent: held-поля берутся из нового,
    /// one-shot накапливаются
    pub fn merge(&mut self, later: &PlayerIntent) {
        self.movement = later.movement;
        self.aim = later.aim;
        self.fire = later.fire;
        self.look_delta += later.look_delta;
        self.jump |= later.jump;
        self.reload |= later.reload;
        self.pause_toggle |= later.pause_toggle;
        self.quit |= later.quit;
    }

    /// Сбросить one-shot поля после тика
    pub fn consume_one_shots(&mut self) {
        self.look_delta = Vec2::ZERO;
        self.jump = false;
        self.reload = false;
    }
}

/// Ограничение pitch камеры игрока (радианы)
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct LookLimits {
    pub max_pitch: f32,
}

impl Default for LookLimits {
    fn default() -> Self {
        Self {
            max_pitch: DEFAULT_MAX_PITCH_DEGREES.to_radians(),
        }
    }
}

/// Система: PlayerIntent → компоненты игрока + intents
pub fn apply_player_intent(
    mut intent: ResMut<PlayerIntent>,
    limits: Res<LookLimits>,
    mut players: Query<(&SimEntity, &mut LookAngles, &mut MovementInput, &mut Transform), (With<Player>, Without<Dead>)>,
    mut fire_intents: EventWriter<FireIntent>,
    mut reload_requests: EventWriter<ReloadRequest>,
) {
    for (sim, mut look, mut movement, mut transform) in players.iter_mut() {
        look.apply_delta(intent.look_delta.x, intent.look_delta.y, limits.max_pitch);
        transform.rotation = Quat::from_rotation_y(look.yaw);

        let (forward, right) = look.ground_basis();
        let planar = intent.movement.clamp_length_max(1.0);
        movement.direction = right * planar.x + forward * planar.y;
        movement.jump |= intent.jump;

        if intent.reload {
            reload_requests.write(ReloadRequest { entity: sim.id });
        }
        if intent.fire {
            let aim = intent
                .aim
                .and_then(|aim| aim.try_normalize())
                .unwrap_or_else(|| look.forward());
            fire_intents.write(FireIntent { shooter: sim.id, aim });
        }
    }
    intent.consume_one_shots();
}

pub struct PlayerInputPlugin;

impl Plugin for PlayerInputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlayerIntent>()
            .init_resource::<LookLimits>()
            .add_systems(SimulationTick, apply_player_intent.in_set(TickSet::Input));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{EntityId, EntityKind};

    fn setup() -> (World, Entity) {
        let mut world = World::new();
        world.init_resource::<PlayerIntent>();
        world.init_resource::<LookLimits>();
        world.init_resource::<Events<FireIntent>>();
        world.init_resource::<Events<ReloadRequest>>();
        let player = world
            .spawn((
                SimEntity {
                    id: EntityId(1),
                    kind: EntityKind::Player,
                },
                Player,
                MovementInput::default(),
                Transform::default(),
            ))
            .id();
        (world, player)
    }

    fn run(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(apply_player_intent);
        schedule.run(world);
    }

    #[test]
    fn test_merge_accumulates_one_shots() {
        let mut intent = PlayerIntent {
            jump: true,
            look_delta: Vec2::new(0.1, 0.0),
            aim: Some(Vec3::X),
            fire: true,
            ..default()
        };
        intent.merge(&PlayerIntent {
            movement: Vec2::Y,
            look_delta: Vec2::new(0.2, 0.05),
            ..default()
        });
        assert!(intent.jump);
        assert!(!intent.fire);
        assert_eq!(intent.aim, None);
        assert_eq!(intent.movement, Vec2::Y);
        assert!((intent.look_delta - Vec2::new(0.3, 0.05)).length() < 1e-6);
    }

    #[test]
    fn test_forward_movement_follows_yaw() {
        let (mut world, player) = setup();
        *world.resource_mut::<PlayerIntent>() = PlayerIntent {
            movement: Vec2::Y,
            look_delta: Vec2::new(std::f32::consts::FRAC_PI_2, 0.0),
            ..default()
        };
        run(&mut world);

        // yaw +90° поворачивает -Z в -X
        let movement = world.get::<MovementInput>(player).unwrap();
        assert!((movement.direction - Vec3::NEG_X).length() < 1e-5);

        // look delta: one-shot, movement остаётся
        let intent = *world.resource::<PlayerIntent>();
        assert_eq!(intent.look_delta, Vec2::ZERO);
        assert_eq!(intent.movement, Vec2::Y);
    }

    #[test]
    fn test_pitch_clamped() {
        let (mut world, player) = setup();
        world.resource_mut::<PlayerIntent>().look_delta = Vec2::new(0.0, 2.0);
        run(&mut world);

        let look = world.get::<LookAngles>(player).unwrap();
        assert!((look.pitch - 25f32.to_radians()).abs() < 1e-5);
    }

    #[test]
    fn test_fire_writes_intent_along_look() {
        let (mut world, _) = setup();
        world.resource_mut::<PlayerIntent>().fire = true;
        run(&mut world);

        let intents: Vec<FireIntent> = world.resource_mut::<Events<FireIntent>>().drain().collect();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].shooter, EntityId(1));
        assert!((intents[0].aim - Vec3::NEG_Z).length() < 1e-5);
        // fire: held-поле, не сбрасывается
        assert!(world.resource::<PlayerIntent>().fire);
    }
}
