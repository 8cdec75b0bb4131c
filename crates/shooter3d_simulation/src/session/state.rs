//! Session state machine + per-match статистика

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::error::{SimulationError, SimulationResult};
use crate::logger;

/// Top-level состояние
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Menu,
    Loading,
    Playing,
    Paused,
    Victory,
    Defeat,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Menu => "Menu",
            SessionState::Loading => "Loading",
            SessionState::Playing => "Playing",
            SessionState::Paused => "Paused",
            SessionState::Victory => "Victory",
            SessionState::Defeat => "Defeat",
        }
    }

    /// Таблица переходов. `→ Loading` из матча: restart.
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Menu, Loading)
                | (Loading, Playing)
                | (Loading, Menu)
                | (Playing, Paused)
                | (Playing, Victory)
                | (Playing, Defeat)
                | (Playing, Menu)
                | (Playing, Loading)
                | (Paused, Playing)
                | (Paused, Menu)
                | (Paused, Loading)
                | (Victory, Menu)
                | (Victory, Loading)
                | (Defeat, Menu)
                | (Defeat, Loading)
        )
    }

    /// Только Playing гоняет тики
    pub fn runs_ticks(self) -> bool {
        self == SessionState::Playing
    }

    pub fn is_finished(self) -> bool {
        matches!(self, SessionState::Victory | SessionState::Defeat)
    }
}

/// Проверка перехода по таблице
pub fn validate_transition(from: SessionState, to: SessionState) -> SimulationResult<()> {
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(SimulationError::InvalidTransition { from, to })
    }
}

/// Event: переход состояния сессии
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTransition {
    pub from: SessionState,
    pub to: SessionState,
    /// Тик матча, на котором случился переход
    pub tick: u64,
}

impl SessionTransition {
    /// Проверяет по таблице и логирует
    pub fn checked(from: SessionState, to: SessionState, tick: u64) -> SimulationResult<Self> {
        validate_transition(from, to)?;
        logger::log_info(&format!("session: {} → {} (tick {})", from.as_str(), to.as_str(), tick));
        Ok(Self { from, to, tick })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Victory,
    Defeat,
    /// Выход в меню / restart до конца матча
    Aborted,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Victory => "victory",
            MatchOutcome::Defeat => "defeat",
            MatchOutcome::Aborted => "aborted",
        }
    }
}

/// Состояние матча (resource simulation App)
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct GameSession {
    state: SessionState,
    pub seed: u64,
    pub tick_hz: f32,
    pub elapsed_ticks: u64,
    pub score: u32,
    pub kills: u32,
    pub player: Option<EntityId>,
    pub enemies_spawned: u32,
    pub outcome: Option<MatchOutcome>,
}

impl GameSession {
    /// Новая сессия в Loading
    pub fn loading(seed: u64, tick_hz: f32) -> Self {
        Self {
            state: SessionState::Loading,
            seed,
            tick_hz,
            elapsed_ticks: 0,
            score: 0,
            kills: 0,
            player: None,
            enemies_spawned: 0,
            outcome: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn elapsed_secs(&self) -> f64 {
        if self.tick_hz > 0.0 {
            self.elapsed_ticks as f64 / self.tick_hz as f64
        } else {
            0.0
        }
    }

    /// Переход по таблице; состояние не меняется при ошибке
    pub fn transition(&mut self, to: SessionState) -> SimulationResult<SessionTransition> {
        let event = SessionTransition::checked(self.state, to, self.elapsed_ticks)?;
        self.state = to;
        match to {
            SessionState::Victory => self.outcome = Some(MatchOutcome::Victory),
            SessionState::Defeat => self.outcome = Some(MatchOutcome::Defeat),
            SessionState::Menu | SessionState::Loading if self.outcome.is_none() => {
                self.outcome = Some(MatchOutcome::Aborted)
            }
            _ => {}
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use SessionState::*;
        assert!(Menu.can_transition(Loading));
        assert!(Playing.can_transition(Paused));
        assert!(Paused.can_transition(Playing));
        assert!(Victory.can_transition(Loading));

        assert!(!Menu.can_transition(Playing));
        assert!(!Paused.can_transition(Victory));
        assert!(!Victory.can_transition(Playing));
        assert!(!Defeat.can_transition(Victory));
        assert!(!Loading.can_transition(Paused));
    }

    #[test]
    fn test_invalid_transition_keeps_state() {
        let mut session = GameSession::loading(7, 60.0);
        let err = session.transition(SessionState::Paused).unwrap_err();
        assert_eq!(
            err,
            SimulationError::InvalidTransition {
                from: SessionState::Loading,
                to: SessionState::Paused
            }
        );
        assert_eq!(session.state(), SessionState::Loading);
    }

    #[test]
    fn test_outcome_recorded() {
        let mut session = GameSession::loading(1, 60.0);
        session.transition(SessionState::Playing).unwrap();
        session.elapsed_ticks = 120;
        let event = session.transition(SessionState::Defeat).unwrap();
        assert_eq!(event.tick, 120);
        assert_eq!(session.outcome, Some(MatchOutcome::Defeat));
        assert!((session.elapsed_secs() - 2.0).abs() < 1e-9);

        // Выход в меню после конца матча не перетирает итог
        session.transition(SessionState::Menu).unwrap();
        assert_eq!(session.outcome, Some(MatchOutcome::Defeat));
    }

    #[test]
    fn test_abort_outcome() {
        let mut session = GameSession::loading(1, 60.0);
        session.transition(SessionState::Playing).unwrap();
        session.transition(SessionState::Paused).unwrap();
        session.transition(SessionState::Menu).unwrap();
        assert_eq!(session.outcome, Some(MatchOutcome::Aborted));
    }
}
