//! Read-only snapshot для render collaborator
//!
//! Double buffer: симуляция собирает следующий `FrameSnapshot` и подменяет
//! `Arc` под локом раз в тик. Reader держит неизменяемый `Arc` текущего.

use std::sync::{Arc, RwLock};

use bevy::prelude::*;

use crate::combat::{WeaponPhase, WeaponState};
use crate::components::{Capabilities, Dead, EntityId, EntityKind, Health, PhysicsBody, SimEntity};
use crate::session::{GameSession, SessionState};
use crate::{SimulationTick, TickClock, TickSet};

/// Ниже этой горизонтальной скорости entity считается стоящим
const MOVING_SPEED_THRESHOLD: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    Idle,
    Moving,
    Firing,
    Reloading,
    Dying,
}

impl VisualState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualState::Idle => "idle",
            VisualState::Moving => "moving",
            VisualState::Firing => "firing",
            VisualState::Reloading => "reloading",
            VisualState::Dying => "dying",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub transform: Transform,
    pub visual: VisualState,
    /// (current, max) для damageable
    pub health: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub tick: u64,
    pub session_state: SessionState,
    pub score: u32,
    pub kills: u32,
    /// Упорядочены по id
    pub entities: Vec<EntitySnapshot>,
}

impl FrameSnapshot {
    pub fn empty(session_state: SessionState) -> Self {
        Self {
            tick: 0,
            session_state,
            score: 0,
            kills: 0,
            entities: Vec::new(),
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities
            .binary_search_by_key(&id, |entity| entity.id)
            .ok()
            .map(|index| &self.entities[index])
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|entity| entity.kind == kind).count()
    }
}

/// Сторона симуляции: подмена текущего snapshot
#[derive(Resource, Debug, Clone)]
pub struct SnapshotBuffer {
    current: Arc<RwLock<Arc<FrameSnapshot>>>,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(FrameSnapshot::empty(SessionState::Menu))
    }
}

impl SnapshotBuffer {
    pub fn new(initial: FrameSnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// Атомарная подмена; читатели со старым `Arc` его дочитывают
    pub fn publish(&self, snapshot: FrameSnapshot) {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next;
    }

    pub fn current(&self) -> Arc<FrameSnapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            current: Arc::clone(&self.current),
        }
    }
}

/// Сторона рендера: только чтение
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    current: Arc<RwLock<Arc<FrameSnapshot>>>,
}

impl SnapshotReader {
    pub fn current(&self) -> Arc<FrameSnapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }
}

/// Визуальный тег из состояния entity
pub fn visual_state(dead: bool, body: Option<&PhysicsBody>, weapon: Option<&WeaponState>) -> VisualState {
    if dead {
        return VisualState::Dying;
    }
    if let Some(weapon) = weapon {
        match weapon.phase {
            WeaponPhase::Reloading => return VisualState::Reloading,
            WeaponPhase::Firing => return VisualState::Firing,
            WeaponPhase::Ready | WeaponPhase::Cooldown => {}
        }
    }
    let moving = body.is_some_and(|body| Vec2::new(body.velocity.x, body.velocity.z).length() > MOVING_SPEED_THRESHOLD);
    if moving {
        VisualState::Moving
    } else {
        VisualState::Idle
    }
}

type SnapshotQuery<'w, 's> = Query<
    'w,
    's,
    (
        &'static SimEntity,
        &'static Transform,
        &'static Health,
        &'static Capabilities,
        Option<&'static PhysicsBody>,
        Option<&'static WeaponState>,
        Has<Dead>,
    ),
>;

/// Собрать snapshot текущего мира (упорядочен по id)
pub fn capture_snapshot(tick: u64, session: &GameSession, entities: &SnapshotQuery) -> FrameSnapshot {
    let mut captured: Vec<EntitySnapshot> = entities
        .iter()
        .map(|(sim, transform, health, capabilities, body, weapon, dead)| EntitySnapshot {
            id: sim.id,
            kind: sim.kind,
            transform: *transform,
            visual: visual_state(dead, body, weapon),
            health: capabilities.damageable.then_some((health.current, health.max)),
        })
        .collect();
    captured.sort_by_key(|entity| entity.id);

    FrameSnapshot {
        tick,
        session_state: session.state(),
        score: session.score,
        kills: session.kills,
        entities: captured,
    }
}

/// Система (фаза Publish)
pub fn publish_snapshot(
    clock: Res<TickClock>,
    session: Res<GameSession>,
    buffer: Res<SnapshotBuffer>,
    entities: SnapshotQuery,
) {
    buffer.publish(capture_snapshot(clock.tick, &session, &entities));
}

pub struct SnapshotPlugin;

impl Plugin for SnapshotPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SnapshotBuffer>()
            .add_systems(SimulationTick, publish_snapshot.in_set(TickSet::Publish));
    }
}
