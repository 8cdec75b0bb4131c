//! Shooter3D Simulation Core
//!
//! ECS-симуляция на Bevy 0.16: детерминированный fixed-timestep тик
//! для first-person шутера. Рендер, звук, ввод: снаружи.
//!
//! Порядок тика (`TickSet`, chain):
//! Input → Ai → Weapons → Physics → Contacts → Deaths → Session → Publish → Commit
//!
//! Тик: отдельный schedule `SimulationTick`, его гоняет `FrameScheduler`
//! (никакого `app.update()` и `Time<Fixed>`): ровно N тиков за кадр, один поток.

use bevy::ecs::schedule::{ExecutorKind, ScheduleLabel};
use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod ai;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod input;
pub mod logger;
pub mod math;
pub mod physics;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod world;

// Re-export базовых типов для удобства
pub use ai::{AIConfig, AIPlugin, AIState};
pub use combat::{CombatPlugin, DamageDealt, EntityDied, FireIntent, PickupCollected, ShotFired};
pub use components::*;
pub use config::SimulationConfig;
pub use error::{FireError, SimulationError, SimulationResult};
pub use input::{PlayerInputPlugin, PlayerIntent};
pub use logger::*;
pub use physics::PhysicsPlugin;
pub use registry::{DeathCause, EntityRegistry};
pub use scheduler::{EffectEvent, EffectsSink, FrameReport, FrameScheduler};
pub use session::{GameSession, SessionPlugin, SessionState};
pub use snapshot::{FrameSnapshot, SnapshotBuffer, SnapshotPlugin, SnapshotReader};

/// Schedule одного simulation tick
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimulationTick;

/// Фазы тика (строгий порядок)
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickSet {
    /// Часы + PlayerIntent
    Input,
    /// FSM, steering, FireIntent врагов
    Ai,
    /// Таймеры оружия, reload, спавн снарядов
    Weapons,
    /// Интеграция, static коллизии, contacts, bounds
    Physics,
    /// Попадания, pickups, lifetime, separation
    Contacts,
    /// Dead marker + EntityDied
    Deaths,
    /// Score, часы матча, Victory/Defeat
    Session,
    /// Snapshot тика в double buffer
    Publish,
    /// Удаление мёртвых, спавн буфера, сброс внутренних событий
    Commit,
}

/// Номер тика + фиксированный dt
///
/// `tick` увеличивается в начале тика: внутри тика N он равен N (с 1).
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct TickClock {
    pub tick: u64,
    pub dt: f32,
}

impl TickClock {
    pub fn new(tick_hz: f32) -> Self {
        Self { tick: 0, dt: 1.0 / tick_hz }
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

pub fn advance_tick_clock(mut clock: ResMut<TickClock>) {
    clock.tick += 1;
}

/// Exclusive система: внутренние события живут ровно один тик
///
/// Effect-события (ShotFired, DamageDealt, ...) забирает scheduler после тика.
pub fn clear_tick_events(world: &mut World) {
    world.resource_mut::<Events<physics::Contact>>().clear();
    world.resource_mut::<Events<physics::StaticImpact>>().clear();
    world.resource_mut::<Events<combat::FireIntent>>().clear();
    world.resource_mut::<Events<combat::ReloadRequest>>().clear();
}

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.edit_schedule(SimulationTick, |schedule| {
            schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        })
        .configure_sets(
            SimulationTick,
            (
                TickSet::Input,
                TickSet::Ai,
                TickSet::Weapons,
                TickSet::Physics,
                TickSet::Contacts,
                TickSet::Deaths,
                TickSet::Session,
                TickSet::Publish,
                TickSet::Commit,
            )
                .chain(),
        )
        .add_plugins((
            PlayerInputPlugin,
            AIPlugin,
            CombatPlugin,
            PhysicsPlugin,
            SessionPlugin,
            SnapshotPlugin,
        ))
        .add_systems(SimulationTick, advance_tick_clock.before(input::apply_player_intent).in_set(TickSet::Input))
        .add_systems(
            SimulationTick,
            (registry::commit_removals, clear_tick_events).chain().in_set(TickSet::Commit),
        );
    }
}

/// Создаёт headless Bevy App матча (состояние Loading, без уровня и entity)
pub fn create_headless_app(config: &SimulationConfig) -> App {
    let mut app = App::new();
    init_logger();
    app.insert_resource(TickClock::new(config.tick_hz))
        .insert_resource(DeterministicRng::new(config.seed))
        .insert_resource(EntityRegistry::new())
        .insert_resource(GameSession::loading(config.seed, config.tick_hz))
        .insert_resource(PlayerIntent::default())
        .insert_resource(input::LookLimits {
            max_pitch: config.player.max_pitch_degrees.to_radians(),
        })
        .add_plugins(SimulationPlugin);

    app
}

/// Loading: проверка конфига, уровень, спавн матча
///
/// Ошибки конфига и уровня возвращаются до того, как что-либо стало
/// видимым; вызывающий уходит в Menu.
pub fn load_match(config: &SimulationConfig, buffer: SnapshotBuffer) -> SimulationResult<App> {
    config.validate()?;
    let level = config.level.build(config.seed)?;
    config.validate_against(&level)?;

    let mut app = create_headless_app(config);
    app.insert_resource(buffer);

    let world = app.world_mut();
    let (player, enemies) = world.resource_scope(|world, mut registry: Mut<EntityRegistry>| {
        let spawned = config.spawn_match(&mut registry, &level)?;
        registry.commit(world);
        SimulationResult::Ok(spawned)
    })?;
    world.insert_resource(level);

    let mut session = world.resource_mut::<GameSession>();
    session.player = Some(player);
    session.enemies_spawned = enemies;

    logger::log_info(&format!(
        "match loaded: seed {}, player {}, {} enemies",
        config.seed, player, enemies
    ));
    Ok(app)
}

/// Один simulation tick
pub fn run_tick(app: &mut App) {
    app.world_mut().run_schedule(SimulationTick);
}

/// Snapshot мира для сравнения детерминизма
///
/// Debug-представление компонента `T` всех sim entity в порядке id.
pub fn world_snapshot<T: Component + std::fmt::Debug>(world: &mut World) -> Vec<u8> {
    let mut snapshot = Vec::new();

    let mut query = world.query::<(&SimEntity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();
    entities.sort_by_key(|(sim, _)| sim.id);

    for (sim, component) in entities {
        snapshot.extend_from_slice(&sim.id.0.to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
