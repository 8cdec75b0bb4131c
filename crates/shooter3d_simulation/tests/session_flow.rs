//! Session lifecycle через FrameScheduler
//!
//! Menu → Loading → Playing → Paused/Victory/Defeat, restart, quit,
//! ошибки загрузки, лимит тиков за кадр.

use bevy::prelude::*;
use shooter3d_simulation::combat::try_fire;
use shooter3d_simulation::config::{AgentDefinition, EnemySpawn, DEFAULT_MAX_TICKS_PER_FRAME};
use shooter3d_simulation::session::{MatchOutcome, MemoryStore, SessionSummary, SessionTransition};
use shooter3d_simulation::world::LevelSource;
use shooter3d_simulation::*;

const FRAME: f32 = 1.0 / 60.0;

/// Два безоружных врага, которые никого не видят
fn quiet_config() -> SimulationConfig {
    let sentry = AgentDefinition {
        weapon: None,
        ai: AIConfig {
            perception_radius: 0.1,
            ..AIConfig::default()
        },
        ..AgentDefinition::grunt()
    };
    let mut config = SimulationConfig {
        level: LevelSource::Flat { half_extent: 40.0 },
        enemies: vec![
            EnemySpawn {
                agent: "sentry".to_string(),
                position: [10.0, 1.0, 0.0],
            },
            EnemySpawn {
                agent: "sentry".to_string(),
                position: [-10.0, 1.0, 0.0],
            },
        ],
        pickups: Vec::new(),
        obstacles: Vec::new(),
        ..SimulationConfig::default()
    };
    config.agents.insert("sentry".to_string(), sentry);
    config
}

fn start(config: SimulationConfig) -> FrameScheduler {
    let mut scheduler = FrameScheduler::new(config).with_store(Box::new(MemoryStore::new()));
    scheduler.new_match().expect("match should load");
    scheduler
}

fn summaries(scheduler: &FrameScheduler) -> Vec<SessionSummary> {
    scheduler.store().unwrap().load_all().unwrap()
}

fn enemy_ids(scheduler: &FrameScheduler) -> Vec<EntityId> {
    scheduler
        .snapshot()
        .entities
        .iter()
        .filter(|entity| entity.kind == EntityKind::Enemy)
        .map(|entity| entity.id)
        .collect()
}

fn kill(scheduler: &mut FrameScheduler, ids: &[EntityId]) {
    let world = scheduler.world_mut().unwrap();
    let mut registry = world.resource_mut::<EntityRegistry>();
    for id in ids {
        registry.mark_dead(*id, DeathCause::Killed { killer: None }).unwrap();
    }
}

fn pause_toggle() -> PlayerIntent {
    PlayerIntent {
        pause_toggle: true,
        ..PlayerIntent::default()
    }
}

fn went_to(transitions: &[SessionTransition], to: SessionState) -> bool {
    transitions.iter().any(|transition| transition.to == to)
}

#[test]
fn test_new_match_enters_playing() {
    let mut scheduler = start(quiet_config());
    assert_eq!(scheduler.state(), SessionState::Playing);

    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.tick, 0);
    assert_eq!(snapshot.session_state, SessionState::Playing);
    assert_eq!(snapshot.count(EntityKind::Player), 1);
    assert_eq!(snapshot.count(EntityKind::Enemy), 2);

    let report = scheduler.frame(FRAME, PlayerIntent::idle());
    assert_eq!(report.ticks_run, 1);
    let path: Vec<(SessionState, SessionState)> =
        report.transitions.iter().map(|transition| (transition.from, transition.to)).collect();
    assert_eq!(
        path,
        vec![
            (SessionState::Menu, SessionState::Loading),
            (SessionState::Loading, SessionState::Playing)
        ]
    );
    assert_eq!(report.snapshot.tick, 1);
}

#[test]
fn test_new_match_rejected_while_playing() {
    let mut scheduler = start(quiet_config());
    assert!(matches!(
        scheduler.new_match(),
        Err(SimulationError::InvalidTransition {
            from: SessionState::Playing,
            ..
        })
    ));
    assert_eq!(scheduler.state(), SessionState::Playing);
}

#[test]
fn test_pause_freezes_simulation() {
    let mut scheduler = start(quiet_config());
    let moving = PlayerIntent::moving(Vec2::Y);
    for _ in 0..10 {
        scheduler.frame(FRAME, moving);
    }

    let paused = scheduler.frame(FRAME, pause_toggle());
    assert_eq!(paused.ticks_run, 0);
    assert_eq!(scheduler.state(), SessionState::Paused);
    assert_eq!(paused.snapshot.session_state, SessionState::Paused);
    assert_eq!(paused.snapshot.tick, 10);

    for _ in 0..20 {
        let report = scheduler.frame(FRAME, moving);
        assert_eq!(report.ticks_run, 0);
        assert_eq!(report.snapshot.tick, 10);
        assert_eq!(report.snapshot.entities, paused.snapshot.entities);
    }
    // Long frame во время паузы не копится в backlog
    assert_eq!(scheduler.frame(5.0, moving).ticks_run, 0);

    let resumed = scheduler.frame(FRAME, pause_toggle());
    assert_eq!(scheduler.state(), SessionState::Playing);
    assert_eq!(resumed.ticks_run, 1);
    assert_eq!(resumed.snapshot.tick, 11);
}

#[test]
fn test_resume_when_not_paused_fails() {
    let mut scheduler = start(quiet_config());
    assert!(scheduler.resume().is_err());
    assert_eq!(scheduler.state(), SessionState::Playing);
}

#[test]
fn test_restart_discards_match_state() {
    let mut scheduler = start(quiet_config());
    let player = scheduler.session().and_then(|session| session.player).unwrap();

    try_fire(scheduler.world_mut().unwrap(), player, Vec3::NEG_Z).unwrap();
    for _ in 0..2 {
        scheduler.frame(FRAME, PlayerIntent::idle());
    }
    assert_eq!(scheduler.snapshot().count(EntityKind::Projectile), 1);

    scheduler.restart().unwrap();

    assert_eq!(scheduler.state(), SessionState::Playing);
    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.tick, 0);
    assert_eq!(snapshot.score, 0);
    assert_eq!(snapshot.count(EntityKind::Projectile), 0);
    assert_eq!(snapshot.count(EntityKind::Enemy), 2);
    assert_eq!(scheduler.session().unwrap().elapsed_ticks, 0);

    let saved = summaries(&scheduler);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].outcome, MatchOutcome::Aborted);
    assert_eq!(saved[0].elapsed_ticks, 2);

    let report = scheduler.frame(FRAME, PlayerIntent::idle());
    assert!(went_to(&report.transitions, SessionState::Loading));
    assert!(went_to(&report.transitions, SessionState::Playing));
}

#[test]
fn test_victory_when_all_enemies_dead() {
    let mut scheduler = start(quiet_config());
    let enemies = enemy_ids(&scheduler);
    scheduler.frame(FRAME, PlayerIntent::idle());

    kill(&mut scheduler, &enemies);
    let report = scheduler.frame(FRAME, PlayerIntent::idle());

    assert!(went_to(&report.transitions, SessionState::Victory));
    assert_eq!(scheduler.state(), SessionState::Victory);
    assert_eq!(report.snapshot.session_state, SessionState::Victory);
    assert_eq!(report.snapshot.kills, 2);
    assert_eq!(report.snapshot.score, 200);

    // Матч окончен: тики больше не идут
    let idle = scheduler.frame(FRAME, PlayerIntent::idle());
    assert_eq!(idle.ticks_run, 0);
    assert_eq!(idle.snapshot.tick, report.snapshot.tick);

    let saved = summaries(&scheduler);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].outcome, MatchOutcome::Victory);
    assert_eq!(saved[0].kills, 2);
    assert_eq!(saved[0].seed, scheduler.config().seed);
}

#[test]
fn test_defeat_when_player_dies() {
    let mut scheduler = start(quiet_config());
    let player = scheduler.session().and_then(|session| session.player).unwrap();
    kill(&mut scheduler, &[player]);

    let report = scheduler.frame(FRAME, PlayerIntent::idle());
    assert!(went_to(&report.transitions, SessionState::Defeat));
    assert_eq!(scheduler.state(), SessionState::Defeat);
    assert_eq!(summaries(&scheduler)[0].outcome, MatchOutcome::Defeat);
}

#[test]
fn test_defeat_wins_same_tick_tie() {
    let mut scheduler = start(quiet_config());
    let player = scheduler.session().and_then(|session| session.player).unwrap();
    let mut doomed = enemy_ids(&scheduler);
    doomed.push(player);
    kill(&mut scheduler, &doomed);

    let report = scheduler.frame(FRAME, PlayerIntent::idle());
    assert!(went_to(&report.transitions, SessionState::Defeat));
    assert!(!went_to(&report.transitions, SessionState::Victory));
    assert_eq!(scheduler.state(), SessionState::Defeat);
}

#[test]
fn test_player_out_of_bounds_is_defeat() {
    let mut scheduler = start(quiet_config());
    let player = scheduler.session().and_then(|session| session.player).unwrap();
    {
        let world = scheduler.world_mut().unwrap();
        let entity = world.resource::<EntityRegistry>().resolve(player).unwrap();
        world.get_mut::<Transform>(entity).unwrap().translation = Vec3::new(500.0, 1.0, 0.0);
    }

    let report = scheduler.frame(FRAME, PlayerIntent::idle());
    assert!(report.effects.iter().any(|effect| matches!(
        effect,
        EffectEvent::EntityDied(died) if died.id == player && died.cause == DeathCause::OutOfBounds
    )));
    assert_eq!(scheduler.state(), SessionState::Defeat);
}

#[test]
fn test_quit_returns_to_menu_with_aborted_summary() {
    let mut scheduler = start(quiet_config());
    for _ in 0..5 {
        scheduler.frame(FRAME, PlayerIntent::idle());
    }

    let report = scheduler.frame(
        FRAME,
        PlayerIntent {
            quit: true,
            ..PlayerIntent::default()
        },
    );
    assert_eq!(report.ticks_run, 0);
    assert_eq!(scheduler.state(), SessionState::Menu);
    assert!(scheduler.world().is_none());
    assert_eq!(report.snapshot.session_state, SessionState::Menu);
    assert!(report.snapshot.entities.is_empty());

    let saved = summaries(&scheduler);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].outcome, MatchOutcome::Aborted);
    assert_eq!(saved[0].elapsed_ticks, 5);

    // Из меню можно начать новый матч
    scheduler.new_match().unwrap();
    assert_eq!(scheduler.state(), SessionState::Playing);
}

#[test]
fn test_tick_cap_discards_backlog() {
    let mut scheduler = start(quiet_config());

    let long = scheduler.frame(1.0, PlayerIntent::idle());
    assert_eq!(long.ticks_run, DEFAULT_MAX_TICKS_PER_FRAME);
    assert_eq!(long.snapshot.tick, 5);

    // Остаток backlog выброшен
    let empty = scheduler.frame(0.0, PlayerIntent::idle());
    assert_eq!(empty.ticks_run, 0);

    let next = scheduler.frame(FRAME, PlayerIntent::idle());
    assert_eq!(next.ticks_run, 1);
    assert_eq!(next.snapshot.tick, 6);
}

#[test]
fn test_short_frames_accumulate() {
    let mut scheduler = start(quiet_config());
    let half = FRAME * 0.5;

    assert_eq!(scheduler.frame(half, PlayerIntent::idle()).ticks_run, 0);
    assert_eq!(scheduler.frame(half, PlayerIntent::idle()).ticks_run, 1);
    assert_eq!(scheduler.snapshot().tick, 1);
}

#[test]
fn test_invalid_config_returns_to_menu() {
    let mut config = quiet_config();
    config.enemies[0].position = [500.0, 1.0, 0.0];
    let mut scheduler = FrameScheduler::new(config);

    let err = scheduler.new_match().unwrap_err();
    assert!(matches!(err, SimulationError::Configuration(_)), "{:?}", err);
    assert_eq!(scheduler.state(), SessionState::Menu);
    assert_eq!(scheduler.last_error(), Some(&err));
    assert_eq!(scheduler.snapshot().session_state, SessionState::Menu);
    assert!(scheduler.snapshot().entities.is_empty());

    let report = scheduler.frame(FRAME, PlayerIntent::idle());
    assert_eq!(report.ticks_run, 0);
    let path: Vec<(SessionState, SessionState)> =
        report.transitions.iter().map(|transition| (transition.from, transition.to)).collect();
    assert_eq!(
        path,
        vec![
            (SessionState::Menu, SessionState::Loading),
            (SessionState::Loading, SessionState::Menu)
        ]
    );

    scheduler.set_config(quiet_config());
    scheduler.new_match().unwrap();
    assert_eq!(scheduler.state(), SessionState::Playing);
    assert!(scheduler.last_error().is_none());
}

#[test]
fn test_unknown_weapon_config_fails_loading() {
    let mut config = quiet_config();
    config.player.weapon = Some("railgun".to_string());
    let mut scheduler = FrameScheduler::new(config);

    assert!(scheduler.new_match().is_err());
    assert!(matches!(scheduler.last_error(), Some(SimulationError::Configuration(msg)) if msg.contains("railgun")));
}

fn player_yaw(scheduler: &mut FrameScheduler) -> f32 {
    let world = scheduler.world_mut().unwrap();
    let mut query = world.query_filtered::<&LookAngles, With<Player>>();
    query.iter(world).next().map(|look| look.yaw).unwrap()
}

#[test]
fn test_one_shot_input_survives_frames_without_ticks() {
    let mut scheduler = start(quiet_config());
    const RENDER_FRAME: f32 = 1.0 / 144.0;

    let first = scheduler.frame(
        RENDER_FRAME,
        PlayerIntent {
            look_delta: Vec2::new(0.5, 0.0),
            jump: true,
            ..PlayerIntent::default()
        },
    );
    assert_eq!(first.ticks_run, 0);

    let mut ticks = 0;
    for _ in 0..5 {
        ticks += scheduler.frame(RENDER_FRAME, PlayerIntent::idle()).ticks_run;
    }
    assert_eq!(ticks, 2);
    // Delta применена ровно один раз первым тиком
    assert!((player_yaw(&mut scheduler) - 0.5).abs() < 1e-5);
    assert_eq!(scheduler.world().unwrap().resource::<PlayerIntent>().look_delta, Vec2::ZERO);
}

#[test]
fn test_look_deltas_of_tickless_frames_add_up() {
    let mut scheduler = start(quiet_config());
    let look = PlayerIntent {
        look_delta: Vec2::new(0.1, 0.0),
        ..PlayerIntent::default()
    };

    assert_eq!(scheduler.frame(0.004, look).ticks_run, 0);
    assert_eq!(scheduler.frame(0.004, look).ticks_run, 0);
    assert_eq!(scheduler.frame(0.01, look).ticks_run, 1);
    assert!((player_yaw(&mut scheduler) - 0.3).abs() < 1e-5);
}
