//! Таксономия ошибок симуляции
//!
//! - `InvalidEntityReference`: recoverable, вызывающий деградирует (AI → Idle)
//! - `Fire`: ожидаемые отказы выстрела, состояние не портится
//! - `Configuration` / `CorruptLevel`: фатальны только для Loading
//! - `InvariantViolation`: дефект программы, логируется, не глотается молча
//! - `Persistence`: store сводок матча, на симуляцию не влияет

use thiserror::Error;

use crate::components::EntityId;
use crate::session::SessionState;

pub type SimulationResult<T> = Result<T, SimulationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("entity {0} does not exist or was removed")]
    InvalidEntityReference(EntityId),

    #[error("fire rejected: {0}")]
    Fire(#[from] FireError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("corrupt level geometry: {0}")]
    CorruptLevel(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("session store error: {0}")]
    Persistence(String),
}

impl From<serde_json::Error> for SimulationError {
    fn from(err: serde_json::Error) -> Self {
        SimulationError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for SimulationError {
    fn from(err: std::io::Error) -> Self {
        SimulationError::Persistence(err.to_string())
    }
}

/// Отказ `try_fire`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FireError {
    #[error("out of ammo")]
    OutOfAmmo,

    #[error("weapon on cooldown")]
    OnCooldown,

    #[error("weapon is reloading")]
    Reloading,

    #[error("entity has no weapon")]
    NoWeapon,
}
