//! ECS Components для игровых entity
//!
//! Организация по доменам:
//! - entity: идентичность (EntityId, EntityKind, Capabilities, Dead)
//! - actor: общие данные (Health, PhysicsBody, Collider, Owner)
//! - player: player control marker и углы обзора

pub mod actor;
pub mod entity;
pub mod player;

pub use actor::*;
pub use entity::*;
pub use player::*;
