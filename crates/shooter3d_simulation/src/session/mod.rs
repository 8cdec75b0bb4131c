//! Game session: state machine, score, win/lose, summaries
//!
//! Фаза Session тика: учёт смертей → часы матча → проверка исхода.
//! Меню/загрузка/пауза живут вне тика (управляет `FrameScheduler`).

use bevy::prelude::*;

pub mod state;
pub mod summary;

pub use state::{validate_transition, GameSession, MatchOutcome, SessionState, SessionTransition};
pub use summary::{JsonFileStore, MemoryStore, SessionStore, SessionSummary};

use crate::ai::AgentProfile;
use crate::combat::EntityDied;
use crate::components::EntityKind;
use crate::logger;
use crate::registry::{DeathCause, EntityRegistry};
use crate::{SimulationTick, TickSet};

/// Система: смерти врагов → kills и score (score_value профиля агента)
pub fn track_session_stats(
    mut died: EventReader<EntityDied>,
    mut session: ResMut<GameSession>,
    registry: Res<EntityRegistry>,
    profiles: Query<&AgentProfile>,
) {
    for death in died.read() {
        if death.kind != EntityKind::Enemy {
            continue;
        }
        let DeathCause::Killed { .. } = death.cause else {
            continue;
        };
        let score_value = registry
            .resolve(death.id)
            .and_then(|entity| profiles.get(entity).ok())
            .map(|profile| profile.score_value)
            .unwrap_or(0);
        session.kills += 1;
        session.score += score_value;
    }
}

pub fn advance_session_clock(mut session: ResMut<GameSession>) {
    if session.state().runs_ticks() {
        session.elapsed_ticks += 1;
    }
}

/// Система: Victory / Defeat
///
/// Defeat: игрок помечен мёртвым. Victory: все заспавненные враги
/// уничтожены (и был хотя бы один). Одновременно: побеждает Defeat.
pub fn evaluate_outcome(
    registry: Res<EntityRegistry>,
    mut session: ResMut<GameSession>,
    mut transitions: EventWriter<SessionTransition>,
) {
    if session.state() != SessionState::Playing {
        return;
    }

    let player_down = session
        .player
        .is_some_and(|player| registry.is_dead(player) || !registry.contains(player));
    let enemies_cleared = session.enemies_spawned > 0 && registry.count_alive(EntityKind::Enemy) == 0;

    let next = if player_down {
        SessionState::Defeat
    } else if enemies_cleared {
        SessionState::Victory
    } else {
        return;
    };

    match session.transition(next) {
        Ok(event) => {
            logger::log_info(&format!(
                "match over: {} (score {}, kills {})",
                next.as_str(),
                session.score,
                session.kills
            ));
            transitions.write(event);
        }
        Err(err) => logger::log_error(&format!("evaluate_outcome: {}", err)),
    }
}

pub struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SessionTransition>().add_systems(
            SimulationTick,
            (track_session_stats, advance_session_clock, evaluate_outcome)
                .chain()
                .in_set(TickSet::Session),
        );
    }
}
