//! Spawn attributes: набор компонентов, который registry вставит на commit
//!
//! Общие поля (health, collider, velocity, capabilities) + kind-специфичный
//! payload. Полиморфизм через enum + capability table, без иерархий.

use std::sync::Arc;

use bevy::prelude::*;

use crate::ai::{AIConfig, AIState, AgentMemory, AgentProfile};
use crate::combat::{Pickup, PickupKind, Projectile, WeaponDefinition, WeaponState};
use crate::components::{Capabilities, Collider, EntityId, EntityKind, Health, Owner, PhysicsBody, Player, SimEntity};
use crate::physics::{KinematicController, MovementInput, SweptBody};

/// Kind-специфичные компоненты
#[derive(Debug, Clone)]
pub enum KindAttributes {
    Player {
        controller: KinematicController,
        weapon: Option<Arc<WeaponDefinition>>,
    },
    Enemy {
        controller: KinematicController,
        weapon: Option<Arc<WeaponDefinition>>,
        ai: AIConfig,
        profile: AgentProfile,
    },
    Projectile {
        owner: EntityId,
        projectile: Projectile,
    },
    Pickup(PickupKind),
    Obstacle,
}

#[derive(Debug, Clone)]
pub struct EntityAttributes {
    pub health: Health,
    pub collider: Collider,
    pub velocity: Vec3,
    pub capabilities: Capabilities,
    pub extra: KindAttributes,
}

impl EntityAttributes {
    pub fn player(
        health: u32,
        collider: Collider,
        controller: KinematicController,
        weapon: Option<Arc<WeaponDefinition>>,
    ) -> Self {
        let mut capabilities = Capabilities::for_kind(EntityKind::Player);
        capabilities.has_weapon = weapon.is_some();
        Self {
            health: Health::new(health),
            collider,
            velocity: Vec3::ZERO,
            capabilities,
            extra: KindAttributes::Player { controller, weapon },
        }
    }

    pub fn enemy(
        health: u32,
        collider: Collider,
        controller: KinematicController,
        weapon: Option<Arc<WeaponDefinition>>,
        ai: AIConfig,
        profile: AgentProfile,
    ) -> Self {
        let mut capabilities = Capabilities::for_kind(EntityKind::Enemy);
        capabilities.has_weapon = weapon.is_some();
        Self {
            health: Health::new(health),
            collider,
            velocity: Vec3::ZERO,
            capabilities,
            extra: KindAttributes::Enemy {
                controller,
                weapon,
                ai,
                profile,
            },
        }
    }

    pub fn projectile(owner: EntityId, projectile: Projectile, radius: f32, velocity: Vec3) -> Self {
        Self {
            // Снаряд не damageable; Health: только для единообразия набора
            health: Health::new(1),
            collider: Collider::sphere(radius),
            velocity,
            capabilities: Capabilities::for_kind(EntityKind::Projectile),
            extra: KindAttributes::Projectile { owner, projectile },
        }
    }

    pub fn pickup(kind: PickupKind, radius: f32) -> Self {
        Self {
            health: Health::new(1),
            collider: Collider::sphere(radius),
            velocity: Vec3::ZERO,
            capabilities: Capabilities::for_kind(EntityKind::Pickup),
            extra: KindAttributes::Pickup(kind),
        }
    }

    /// `health = None`: неразрушимый
    pub fn obstacle(collider: Collider, health: Option<u32>) -> Self {
        let mut capabilities = Capabilities::for_kind(EntityKind::StaticObstacle);
        capabilities.damageable = health.is_some();
        Self {
            health: Health::new(health.unwrap_or(1)),
            collider,
            velocity: Vec3::ZERO,
            capabilities,
            extra: KindAttributes::Obstacle,
        }
    }

    /// Вставляет компоненты в уже созданный entity
    pub(crate) fn insert_into(self, id: EntityId, kind: EntityKind, transform: Transform, entity: &mut EntityWorldMut) {
        entity.insert((
            SimEntity { id, kind },
            transform,
            self.health,
            self.collider,
            PhysicsBody::new(self.velocity, transform.translation),
            self.capabilities,
        ));

        match self.extra {
            KindAttributes::Player { controller, weapon } => {
                entity.insert((Player, controller, MovementInput::default()));
                if let Some(definition) = weapon {
                    entity.insert(WeaponState::new(definition));
                }
            }
            KindAttributes::Enemy {
                controller,
                weapon,
                ai,
                profile,
            } => {
                entity.insert((
                    controller,
                    MovementInput::default(),
                    AIState::default(),
                    ai,
                    AgentMemory::default(),
                    profile,
                ));
                if let Some(definition) = weapon {
                    entity.insert(WeaponState::new(definition));
                }
            }
            KindAttributes::Projectile { owner, projectile } => {
                entity.insert((Owner(owner), projectile, SweptBody));
            }
            KindAttributes::Pickup(kind) => {
                entity.insert(Pickup { kind });
            }
            KindAttributes::Obstacle => {}
        }
    }
}
