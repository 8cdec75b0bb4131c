//! Идентичность entity: EntityId, EntityKind, Capabilities, Dead

use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Стабильный идентификатор entity внутри сессии
///
/// Выдаётся `EntityRegistry` монотонно и никогда не переиспользуется.
/// Bevy `Entity` может переиспользовать index: поэтому все weak-ссылки
/// (AI target, projectile owner) хранят `EntityId`, а не `Entity`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Enemy,
    Projectile,
    Pickup,
    StaticObstacle,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Enemy => "enemy",
            EntityKind::Projectile => "projectile",
            EntityKind::Pickup => "pickup",
            EntityKind::StaticObstacle => "static_obstacle",
        }
    }
}

/// Компонент: entity зарегистрирован в `EntityRegistry`
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct SimEntity {
    pub id: EntityId,
    pub kind: EntityKind,
}

/// Capability table (вместо иерархии наследования)
///
/// - `dynamic`: интегрируется физикой (velocity × dt)
/// - `solid`: статичный блокер: dynamic тела выталкиваются из него
/// - `damageable`: принимает урон от снарядов
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Capabilities {
    pub has_weapon: bool,
    pub has_ai: bool,
    pub player_controlled: bool,
    pub dynamic: bool,
    pub solid: bool,
    pub damageable: bool,
    pub collects_pickups: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        has_weapon: false,
        has_ai: false,
        player_controlled: false,
        dynamic: false,
        solid: false,
        damageable: false,
        collects_pickups: false,
    };

    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Player => Self {
                has_weapon: true,
                player_controlled: true,
                dynamic: true,
                damageable: true,
                collects_pickups: true,
                ..Self::NONE
            },
            EntityKind::Enemy => Self {
                has_weapon: true,
                has_ai: true,
                dynamic: true,
                damageable: true,
                ..Self::NONE
            },
            EntityKind::Projectile => Self {
                dynamic: true,
                ..Self::NONE
            },
            // Pickup как trigger: не двигается и не блокирует, но даёт contacts
            EntityKind::Pickup => Self::NONE,
            EntityKind::StaticObstacle => Self {
                solid: true,
                ..Self::NONE
            },
        }
    }

    /// Участвует ли entity в dynamic-vs-dynamic contact events
    pub fn reports_contacts(&self) -> bool {
        self.dynamic || !self.solid
    }
}

/// Компонент-маркер: entity помечен мёртвым в этом тике
///
/// Вставляется в фазе Deaths, entity удаляется в `commit_removals`.
/// Системы обязаны фильтровать `Without<Dead>` (кроме death reaction).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Dead;
