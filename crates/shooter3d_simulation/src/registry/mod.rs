//! Entity Registry: владелец всех игровых entity
//!
//! - `EntityId` выдаётся монотонно, никогда не переиспользуется
//! - spawn буферизуется и материализуется на commit (в порядке id)
//! - смерть двухфазная: `mark_dead` в любой фазе тика → `Dead` marker в
//!   фазе Deaths → despawn в `commit_removals`, когда все системы тика её
//!   уже видели
//!
//! Weak-ссылки во всём крейте: `EntityId`, проверяемые через `resolve`.

use std::collections::BTreeMap;

use bevy::prelude::*;

pub mod attributes;

#[cfg(test)]
mod registry_tests;

pub use attributes::{EntityAttributes, KindAttributes};

use crate::components::{Capabilities, EntityId, EntityKind, Health, PhysicsBody};
use crate::error::{SimulationError, SimulationResult};
use crate::logger;

/// Причина смерти entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    /// Урон до нуля. `killer`: стрелок (если известен)
    Killed { killer: Option<EntityId> },
    /// Истёк lifetime (снаряды)
    Expired,
    /// Вылетел за bounds уровня
    OutOfBounds,
    /// Снаряд израсходован о цель или стену
    Impact,
    /// Pickup подобран
    Consumed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathRecord {
    pub id: EntityId,
    pub kind: EntityKind,
    pub cause: DeathCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LiveEntry {
    entity: Entity,
    kind: EntityKind,
}

struct PendingSpawn {
    id: EntityId,
    kind: EntityKind,
    transform: Transform,
    attributes: EntityAttributes,
}

/// Что сделал commit (для логов и тестов)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub removed: Vec<EntityId>,
    pub spawned: Vec<EntityId>,
    /// Spawn + death в одном тике: entity так и не появился в мире
    pub discarded: Vec<EntityId>,
    /// Смерти, не объявленные к моменту commit
    pub late_deaths: Vec<DeathRecord>,
}

/// Read-only view entity (копия видимых полей)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityView {
    pub id: EntityId,
    pub kind: EntityKind,
    pub entity: Entity,
    pub transform: Transform,
    pub velocity: Vec3,
    pub health: Health,
    pub capabilities: Capabilities,
    pub dead: bool,
}

#[derive(Resource, Default)]
pub struct EntityRegistry {
    next_id: u64,
    live: BTreeMap<EntityId, LiveEntry>,
    pending: Vec<PendingSpawn>,
    /// Помечены мёртвыми в текущем тике
    marked_dead: BTreeMap<EntityId, DeathRecord>,
    /// Ещё не превращены в EntityDied
    unannounced: Vec<DeathRecord>,
    violations: Vec<String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Выделяет id и буферизует spawn до commit
    pub fn spawn(&mut self, kind: EntityKind, transform: Transform, attributes: EntityAttributes) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.pending.push(PendingSpawn {
            id,
            kind,
            transform,
            attributes,
        });
        id
    }

    /// Bevy entity для живого (в мире) id, включая помеченных в этом тике
    pub fn resolve(&self, id: EntityId) -> Option<Entity> {
        self.live.get(&id).map(|entry| entry.entity)
    }

    /// Как `resolve`, но `None` для помеченных мёртвыми
    pub fn resolve_alive(&self, id: EntityId) -> Option<Entity> {
        if self.marked_dead.contains_key(&id) {
            return None;
        }
        self.resolve(id)
    }

    pub fn kind(&self, id: EntityId) -> Option<EntityKind> {
        self.live
            .get(&id)
            .map(|entry| entry.kind)
            .or_else(|| self.pending.iter().find(|spawn| spawn.id == id).map(|spawn| spawn.kind))
    }

    pub fn is_dead(&self, id: EntityId) -> bool {
        self.marked_dead.contains_key(&id)
    }

    pub fn is_pending(&self, id: EntityId) -> bool {
        self.pending.iter().any(|spawn| spawn.id == id)
    }

    /// Id известен (в мире или в буфере spawn)
    pub fn contains(&self, id: EntityId) -> bool {
        self.live.contains_key(&id) || self.is_pending(id)
    }

    /// Пометить мёртвым. `Ok(false)`: уже мёртв, повторная запись не делается.
    pub fn mark_dead(&mut self, id: EntityId, cause: DeathCause) -> SimulationResult<bool> {
        if self.marked_dead.contains_key(&id) {
            return Ok(false);
        }
        let kind = self.kind(id).ok_or(SimulationError::InvalidEntityReference(id))?;
        let record = DeathRecord { id, kind, cause };
        self.marked_dead.insert(id, record);
        self.unannounced.push(record);
        Ok(true)
    }

    /// Забирает смерти, ещё не объявленные событием (в порядке пометки)
    pub fn take_unannounced(&mut self) -> Vec<DeathRecord> {
        std::mem::take(&mut self.unannounced)
    }

    /// Живые (в мире, не помеченные) id в порядке возрастания
    pub fn alive_ids(&self) -> Vec<EntityId> {
        self.live
            .keys()
            .filter(|id| !self.marked_dead.contains_key(id))
            .copied()
            .collect()
    }

    /// Живые + ожидающие spawn данного kind
    pub fn count_alive(&self, kind: EntityKind) -> usize {
        let live = self
            .live
            .iter()
            .filter(|(id, entry)| entry.kind == kind && !self.marked_dead.contains_key(id))
            .count();
        let pending = self
            .pending
            .iter()
            .filter(|spawn| spawn.kind == kind && !self.marked_dead.contains_key(&spawn.id))
            .count();
        live + pending
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    fn record_violation(&mut self, message: String) {
        logger::log_error(&format!("invariant violation: {}", message));
        self.violations.push(message);
    }

    pub fn get(&self, world: &World, id: EntityId) -> Option<EntityView> {
        let entry = self.live.get(&id)?;
        let entity = world.get_entity(entry.entity).ok()?;
        Some(EntityView {
            id,
            kind: entry.kind,
            entity: entry.entity,
            transform: entity.get::<Transform>().copied().unwrap_or_default(),
            velocity: entity.get::<PhysicsBody>().map(|body| body.velocity).unwrap_or_default(),
            health: entity.get::<Health>().copied().unwrap_or_default(),
            capabilities: entity.get::<Capabilities>().copied().unwrap_or(Capabilities::NONE),
            dead: self.marked_dead.contains_key(&id),
        })
    }

    /// Обход живых entity в порядке id
    pub fn for_each_alive(
        &self,
        world: &World,
        mut predicate: impl FnMut(&EntityView) -> bool,
        mut visitor: impl FnMut(&EntityView),
    ) {
        for id in self.alive_ids() {
            if let Some(view) = self.get(world, id) {
                if predicate(&view) {
                    visitor(&view);
                }
            }
        }
    }

    /// Конец тика: despawn мёртвых, материализация spawn'ов
    pub fn commit(&mut self, world: &mut World) -> CommitReport {
        let mut report = CommitReport {
            late_deaths: self.take_unannounced(),
            ..default()
        };

        let dead = std::mem::take(&mut self.marked_dead);
        for id in dead.keys() {
            if let Some(entry) = self.live.remove(id) {
                if !world.despawn(entry.entity) {
                    self.record_violation(format!("{} was already gone from the world", id));
                }
                report.removed.push(*id);
            }
        }

        let pending = std::mem::take(&mut self.pending);
        for spawn in pending {
            if dead.contains_key(&spawn.id) {
                report.discarded.push(spawn.id);
                continue;
            }
            if self.live.contains_key(&spawn.id) {
                self.record_violation(format!("duplicate spawn of live id {}", spawn.id));
                continue;
            }
            let mut entity = world.spawn_empty();
            let bevy_entity = entity.id();
            spawn
                .attributes
                .insert_into(spawn.id, spawn.kind, spawn.transform, &mut entity);
            self.live.insert(
                spawn.id,
                LiveEntry {
                    entity: bevy_entity,
                    kind: spawn.kind,
                },
            );
            report.spawned.push(spawn.id);
        }

        report
    }

    /// Прямая регистрация (только для тестов инвариантов)
    #[cfg(test)]
    pub(crate) fn force_pending(&mut self, id: EntityId, kind: EntityKind, attributes: EntityAttributes) {
        self.pending.push(PendingSpawn {
            id,
            kind,
            transform: Transform::default(),
            attributes,
        });
    }
}

/// Exclusive система фазы Commit
///
/// Единственное место, где entity реально удаляются/добавляются.
pub fn commit_removals(world: &mut World) {
    let report = world.resource_scope(|world, mut registry: Mut<EntityRegistry>| registry.commit(world));

    for record in &report.late_deaths {
        world.send_event(crate::combat::EntityDied {
            id: record.id,
            kind: record.kind,
            cause: record.cause,
        });
    }
    if !report.discarded.is_empty() {
        logger::log(&format!("commit: discarded same-tick spawns {:?}", report.discarded));
    }
}
