//! Общие компоненты entity: Health, PhysicsBody, Collider, Owner

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::math::Capsule;

/// Здоровье
///
/// Инвариант: 0 ≤ current ≤ max. Урон насыщающий: отрицательного
/// здоровья не бывает.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Возвращает реально нанесённый урон
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.current);
        self.current -= dealt;
        dealt
    }

    /// Возвращает реально восстановленное здоровье
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.current;
        self.current = self.current.saturating_add(amount).min(self.max);
        self.current - before
    }

    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            return 0.0;
        }
        self.current as f32 / self.max as f32
    }
}

/// Физическое тело: velocity + позиция прошлого тика (для swept тестов)
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct PhysicsBody {
    pub velocity: Vec3,
    pub previous_position: Vec3,
}

impl PhysicsBody {
    pub fn new(velocity: Vec3, position: Vec3) -> Self {
        Self {
            velocity,
            previous_position: position,
        }
    }
}

/// Bounding volume в локальных координатах (центр = translation)
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub enum BoundingVolume {
    Sphere { radius: f32 },
    /// Вертикальная капсула, `half_height` = половина длины оси
    Capsule { radius: f32, half_height: f32 },
}

impl BoundingVolume {
    pub fn radius(&self) -> f32 {
        match *self {
            BoundingVolume::Sphere { radius } | BoundingVolume::Capsule { radius, .. } => radius,
        }
    }

    pub fn half_height(&self) -> f32 {
        match *self {
            BoundingVolume::Sphere { .. } => 0.0,
            BoundingVolume::Capsule { half_height, .. } => half_height,
        }
    }

    pub fn is_valid(&self) -> bool {
        let radius = self.radius();
        let half_height = self.half_height();
        radius.is_finite() && radius > 0.0 && half_height.is_finite() && half_height >= 0.0
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Collider {
    pub volume: BoundingVolume,
}

impl Collider {
    pub fn sphere(radius: f32) -> Self {
        Self {
            volume: BoundingVolume::Sphere { radius },
        }
    }

    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Self {
            volume: BoundingVolume::Capsule {
                radius,
                half_height,
            },
        }
    }

    /// Мировая форма (uniform scale из `transform.scale.x`)
    pub fn world_shape(&self, transform: &Transform) -> Capsule {
        let scale = transform.scale.x.abs().max(f32::EPSILON);
        let center = transform.translation;
        match self.volume {
            BoundingVolume::Sphere { radius } => Capsule::sphere(center, radius * scale),
            BoundingVolume::Capsule {
                radius,
                half_height,
            } => Capsule::upright(center, half_height * scale, radius * scale),
        }
    }
}

/// Weak-ссылка на создателя (для снарядов: стрелок)
///
/// Не держит owner живым: перед использованием проверяется в registry.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Owner(pub EntityId);
