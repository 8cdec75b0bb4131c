//! Frame scheduler: fixed timestep + session lifecycle
//!
//! Владеет simulation `App` матча. За кадр: 0..N тиков из аккумулятора,
//! не больше `max_ticks_per_frame`; остальной backlog выбрасывается.
//! Pause/resume сбрасывают аккумулятор. После каждого тика effect-события
//! забираются в `FrameReport` и `EffectsSink`.

use std::sync::Arc;

use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;

use crate::combat::{DamageDealt, EntityDied, FireRejected, PickupCollected, ShotFired};
use crate::config::SimulationConfig;
use crate::error::{SimulationError, SimulationResult};
use crate::input::PlayerIntent;
use crate::logger;
use crate::session::{GameSession, SessionState, SessionStore, SessionSummary, SessionTransition};
use crate::snapshot::{publish_snapshot, FrameSnapshot, SnapshotBuffer, SnapshotReader};
use crate::{load_match, run_tick};

pub use crate::config::DEFAULT_MAX_TICKS_PER_FRAME;

/// Доля тика, которую аккумулятор прощает (погрешность f32 dt кадра)
const ACCUMULATOR_EPSILON: f64 = 1e-6;

/// Событие для audio/effects collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectEvent {
    ShotFired(ShotFired),
    FireRejected(FireRejected),
    HitLanded(DamageDealt),
    EntityDied(EntityDied),
    PickupCollected(PickupCollected),
}

/// Получатель эффектов; core его не ждёт
pub trait EffectsSink: Send {
    fn on_effect(&mut self, effect: &EffectEvent);
}

/// Итог кадра
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub ticks_run: u32,
    pub effects: Vec<EffectEvent>,
    pub transitions: Vec<SessionTransition>,
    pub snapshot: Arc<FrameSnapshot>,
}

/// Забрать effect-события тика в порядке записи
fn drain_effects(world: &mut World, effects: &mut Vec<EffectEvent>) {
    effects.extend(world.resource_mut::<Events<ShotFired>>().drain().map(EffectEvent::ShotFired));
    effects.extend(world.resource_mut::<Events<FireRejected>>().drain().map(EffectEvent::FireRejected));
    effects.extend(world.resource_mut::<Events<DamageDealt>>().drain().map(EffectEvent::HitLanded));
    effects.extend(world.resource_mut::<Events<EntityDied>>().drain().map(EffectEvent::EntityDied));
    effects.extend(world.resource_mut::<Events<PickupCollected>>().drain().map(EffectEvent::PickupCollected));
}

pub struct FrameScheduler {
    config: SimulationConfig,
    app: Option<App>,
    accumulator: f64,
    last_error: Option<SimulationError>,
    /// Переходы вне тика (new_match, pause, ...) до следующего кадра
    pending_transitions: Vec<SessionTransition>,
    buffer: SnapshotBuffer,
    sink: Option<Box<dyn EffectsSink>>,
    store: Option<Box<dyn SessionStore>>,
    summary_saved: bool,
}

impl FrameScheduler {
    /// Scheduler в Menu; конфиг проверяется при new_match
    pub fn new(config: SimulationConfig) -> Self {
        logger::init_logger();
        Self {
            config,
            app: None,
            accumulator: 0.0,
            last_error: None,
            pending_transitions: Vec::new(),
            buffer: SnapshotBuffer::default(),
            sink: None,
            store: None,
            summary_saved: false,
        }
    }

    pub fn with_effects_sink(mut self, sink: Box<dyn EffectsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_store(mut self, store: Box<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Новый конфиг для следующего new_match/restart
    pub fn set_config(&mut self, config: SimulationConfig) {
        self.config = config;
    }

    pub fn state(&self) -> SessionState {
        self.session().map(GameSession::state).unwrap_or(SessionState::Menu)
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.app.as_ref().and_then(|app| app.world().get_resource::<GameSession>())
    }

    /// Сообщение последней ошибки Loading (для UI меню)
    pub fn last_error(&self) -> Option<&SimulationError> {
        self.last_error.as_ref()
    }

    pub fn reader(&self) -> SnapshotReader {
        self.buffer.reader()
    }

    pub fn snapshot(&self) -> Arc<FrameSnapshot> {
        self.buffer.current()
    }

    pub fn world(&self) -> Option<&World> {
        self.app.as_ref().map(|app| app.world())
    }

    pub fn world_mut(&mut self) -> Option<&mut World> {
        self.app.as_mut().map(|app| app.world_mut())
    }

    pub fn store(&self) -> Option<&dyn SessionStore> {
        self.store.as_deref()
    }

    fn record(&mut self, transition: SessionTransition) {
        self.pending_transitions.push(transition);
    }

    /// Переход вне тика в живой сессии
    fn transition_session(&mut self, to: SessionState) -> SimulationResult<()> {
        let app = self
            .app
            .as_mut()
            .ok_or(SimulationError::InvalidTransition { from: SessionState::Menu, to })?;
        let transition = app.world_mut().resource_mut::<GameSession>().transition(to)?;
        self.record(transition);
        Ok(())
    }

    /// Переопубликовать текущий snapshot с новым session state (вне тика)
    fn republish_state(&self, state: SessionState) {
        let current = self.buffer.current();
        self.buffer.publish(FrameSnapshot {
            session_state: state,
            ..(*current).clone()
        });
    }

    /// Menu → Loading → Playing
    pub fn new_match(&mut self) -> SimulationResult<()> {
        let from = self.state();
        if from != SessionState::Menu {
            return Err(SimulationError::InvalidTransition {
                from,
                to: SessionState::Loading,
            });
        }
        self.record(SessionTransition::checked(SessionState::Menu, SessionState::Loading, 0)?);
        self.load()
    }

    /// Loading → Playing или Loading → Menu с `last_error`
    fn load(&mut self) -> SimulationResult<()> {
        self.accumulator = 0.0;
        self.summary_saved = false;

        match load_match(&self.config, self.buffer.clone()) {
            Ok(mut app) => {
                let transition = app.world_mut().resource_mut::<GameSession>().transition(SessionState::Playing)?;
                self.record(transition);
                self.last_error = None;
                self.app = Some(app);
                self.publish_initial();
                Ok(())
            }
            Err(err) => {
                logger::log_error(&format!("loading failed: {}", err));
                self.record(SessionTransition::checked(SessionState::Loading, SessionState::Menu, 0)?);
                self.last_error = Some(err.clone());
                self.app = None;
                self.buffer.publish(FrameSnapshot::empty(SessionState::Menu));
                Err(err)
            }
        }
    }

    /// Snapshot стартового состояния до первого тика
    fn publish_initial(&mut self) {
        let Some(app) = self.app.as_mut() else {
            return;
        };
        if let Err(err) = app.world_mut().run_system_once(publish_snapshot) {
            logger::log_error(&format!("initial snapshot: {}", err));
        }
    }

    pub fn pause(&mut self) -> SimulationResult<()> {
        self.transition_session(SessionState::Paused)?;
        self.accumulator = 0.0;
        self.republish_state(SessionState::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> SimulationResult<()> {
        if self.state() != SessionState::Paused {
            return Err(SimulationError::InvalidTransition {
                from: self.state(),
                to: SessionState::Playing,
            });
        }
        self.transition_session(SessionState::Playing)?;
        self.accumulator = 0.0;
        self.republish_state(SessionState::Playing);
        Ok(())
    }

    /// Свежий registry и сессия с тем же конфигом
    pub fn restart(&mut self) -> SimulationResult<()> {
        self.transition_session(SessionState::Loading)?;
        self.save_summary();
        // Снаряды в полёте и прочее состояние матча: просто выбрасываются
        self.app = None;
        self.load()
    }

    pub fn return_to_menu(&mut self) -> SimulationResult<()> {
        self.transition_session(SessionState::Menu)?;
        self.save_summary();
        self.app = None;
        self.accumulator = 0.0;
        self.buffer.publish(FrameSnapshot::empty(SessionState::Menu));
        Ok(())
    }

    /// Сводка матча в store (один раз на матч)
    fn save_summary(&mut self) {
        if self.summary_saved {
            return;
        }
        let Some(session) = self.session() else {
            return;
        };
        let summary = SessionSummary::from_session(session);
        self.summary_saved = true;
        logger::log_info(&format!(
            "session summary: {} score {} kills {} ({} ticks)",
            summary.outcome.as_str(),
            summary.score,
            summary.kills,
            summary.elapsed_ticks
        ));
        if let Some(store) = self.store.as_mut() {
            if let Err(err) = store.save(&summary) {
                logger::log_error(&format!("session store: {}", err));
            }
        }
    }

    /// Один кадр: control-поля intent, затем тики из аккумулятора
    pub fn frame(&mut self, dt: f32, intent: PlayerIntent) -> FrameReport {
        let mut effects = Vec::new();

        if intent.quit && self.app.is_some() {
            if let Err(err) = self.return_to_menu() {
                logger::log_warning(&format!("quit ignored: {}", err));
            }
        } else if intent.pause_toggle {
            let toggled = match self.state() {
                SessionState::Playing => self.pause(),
                SessionState::Paused => self.resume(),
                other => Err(SimulationError::InvalidTransition {
                    from: other,
                    to: SessionState::Paused,
                }),
            };
            if let Err(err) = toggled {
                logger::log_warning(&format!("pause toggle ignored: {}", err));
            }
        }

        let ticks_run = self.run_ticks(dt, intent, &mut effects);

        if let Some(sink) = self.sink.as_mut() {
            for effect in &effects {
                sink.on_effect(effect);
            }
        }

        let transitions = std::mem::take(&mut self.pending_transitions);
        FrameReport {
            ticks_run,
            effects,
            transitions,
            snapshot: self.buffer.current(),
        }
    }

    fn run_ticks(&mut self, dt: f32, intent: PlayerIntent, effects: &mut Vec<EffectEvent>) -> u32 {
        if !self.state().runs_ticks() {
            return 0;
        }
        let tick_dt = 1.0 / self.config.tick_hz as f64;
        let max_ticks = self.config.max_ticks_per_frame.max(1);
        if dt.is_finite() && dt > 0.0 {
            self.accumulator += dt as f64;
        }

        let Some(app) = self.app.as_mut() else {
            return 0;
        };
        // Held-поля действуют все тики кадра. One-shot копятся между кадрами
        // без тиков, пока их не заберёт первый тик.
        app.world_mut().resource_mut::<PlayerIntent>().merge(&PlayerIntent {
            pause_toggle: false,
            quit: false,
            ..intent
        });

        let mut ticks_run = 0;
        let mut finished = false;
        while ticks_run < max_ticks && self.accumulator + tick_dt * ACCUMULATOR_EPSILON >= tick_dt {
            run_tick(app);
            self.accumulator = (self.accumulator - tick_dt).max(0.0);
            ticks_run += 1;

            let world = app.world_mut();
            drain_effects(world, effects);
            let transitions: Vec<SessionTransition> =
                world.resource_mut::<Events<SessionTransition>>().drain().collect();
            for transition in transitions {
                finished |= transition.to.is_finished();
                self.pending_transitions.push(transition);
            }
            if finished {
                self.accumulator = 0.0;
                break;
            }
        }

        if ticks_run == max_ticks && self.accumulator >= tick_dt {
            logger::log_warning(&format!(
                "frame backlog {:.3}s discarded (tick cap {})",
                self.accumulator, max_ticks
            ));
            self.accumulator %= tick_dt;
            // Остаток почти в целый тик: погрешность деления, не backlog
            if self.accumulator + tick_dt * ACCUMULATOR_EPSILON >= tick_dt {
                self.accumulator = 0.0;
            }
        }
        if finished {
            self.save_summary();
        }
        ticks_run
    }
}
