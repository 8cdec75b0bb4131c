//! Weapon definitions + per-entity weapon state
//!
//! `WeaponDefinition`: неизменяемый конфиг (Arc, шарится между entity).
//! `WeaponState`: ammo, таймеры и фаза state machine:
//! Ready → Firing → Cooldown → Ready; Ready → Reloading → Ready.

use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::Dead;
use crate::error::{FireError, SimulationError, SimulationResult};

/// Конфиг оружия (все длительности в тиках)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponDefinition {
    pub fire_interval_ticks: u32,
    pub projectile_speed: f32,
    pub damage: u32,
    /// Полный угол конуса разброса (градусы)
    pub spread_degrees: f32,
    pub ammo_capacity: u32,
    pub reload_ticks: u32,
    pub projectile_lifetime_ticks: u32,
    pub projectile_radius: f32,
    /// Высота дула над центром стрелка
    pub muzzle_height: f32,
    /// Вынос дула вдоль направления выстрела
    pub muzzle_distance: f32,
    pub piercing: bool,
    pub splash_radius: Option<f32>,
    pub self_damage: bool,
    pub friendly_fire: bool,
}

impl Default for WeaponDefinition {
    fn default() -> Self {
        Self::rifle()
    }
}

impl WeaponDefinition {
    /// Оружие игрока по умолчанию
    pub fn rifle() -> Self {
        Self {
            fire_interval_ticks: 6,
            projectile_speed: 80.0,
            damage: 25,
            spread_degrees: 1.5,
            ammo_capacity: 30,
            reload_ticks: 90,
            projectile_lifetime_ticks: 90,
            projectile_radius: 0.05,
            muzzle_height: 0.6,
            muzzle_distance: 0.8,
            piercing: false,
            splash_radius: None,
            self_damage: false,
            friendly_fire: false,
        }
    }

    /// Медленный энергетический заряд врагов
    pub fn blaster() -> Self {
        Self {
            fire_interval_ticks: 30,
            projectile_speed: 30.0,
            damage: 10,
            spread_degrees: 4.0,
            ammo_capacity: 8,
            reload_ticks: 120,
            projectile_lifetime_ticks: 120,
            projectile_radius: 0.1,
            ..Self::rifle()
        }
    }

    /// Гранатомёт со splash (и самоповреждением)
    pub fn launcher() -> Self {
        Self {
            fire_interval_ticks: 60,
            projectile_speed: 25.0,
            damage: 60,
            spread_degrees: 0.0,
            ammo_capacity: 4,
            reload_ticks: 150,
            projectile_lifetime_ticks: 150,
            projectile_radius: 0.15,
            splash_radius: Some(3.0),
            self_damage: true,
            ..Self::rifle()
        }
    }

    pub fn validate(&self, name: &str) -> SimulationResult<()> {
        let fail = |what: &str| Err(SimulationError::Configuration(format!("weapon '{}': {}", name, what)));

        if self.fire_interval_ticks == 0 {
            return fail("fire_interval_ticks must be > 0");
        }
        if !(self.projectile_speed.is_finite() && self.projectile_speed > 0.0) {
            return fail("projectile_speed must be positive");
        }
        if self.ammo_capacity == 0 {
            return fail("ammo_capacity must be > 0");
        }
        if self.projectile_lifetime_ticks == 0 {
            return fail("projectile_lifetime_ticks must be > 0");
        }
        if !(self.spread_degrees.is_finite() && (0.0..180.0).contains(&self.spread_degrees)) {
            return fail("spread_degrees must be in [0, 180)");
        }
        if !(self.projectile_radius.is_finite() && self.projectile_radius > 0.0) {
            return fail("projectile_radius must be positive");
        }
        if !(self.muzzle_height.is_finite() && self.muzzle_distance.is_finite() && self.muzzle_distance >= 0.0) {
            return fail("muzzle offsets must be finite");
        }
        if let Some(radius) = self.splash_radius {
            if !(radius.is_finite() && radius > 0.0) {
                return fail("splash_radius must be positive");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum WeaponPhase {
    Ready,
    /// Выстрел в этом тике
    Firing,
    Cooldown,
    Reloading,
}

/// Состояние оружия entity
#[derive(Component, Debug, Clone)]
pub struct WeaponState {
    pub definition: Arc<WeaponDefinition>,
    pub ammo: u32,
    pub cooldown_remaining: u32,
    pub reload_remaining: u32,
    pub phase: WeaponPhase,
}

impl WeaponState {
    pub fn new(definition: Arc<WeaponDefinition>) -> Self {
        Self {
            ammo: definition.ammo_capacity,
            definition,
            cooldown_remaining: 0,
            reload_remaining: 0,
            phase: WeaponPhase::Ready,
        }
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_remaining > 0
    }

    /// Выстрел пройдёт прямо сейчас
    pub fn can_fire(&self) -> bool {
        self.ammo > 0 && self.cooldown_remaining == 0 && !self.is_reloading()
    }

    /// Пройдёт ли выстрел после ближайшего `tick()` (AI решает до таймеров оружия).
    /// Пустой магазин без перезарядки тоже `true`: отказ запустит reload.
    pub fn ready_after_tick(&self) -> bool {
        self.cooldown_remaining <= 1 && self.reload_remaining <= 1
    }

    /// Проверка + списание патрона. Спавн снаряда: у вызывающего.
    ///
    /// Порядок проверок: ammo → cooldown → reload. Пустой магазин запускает
    /// перезарядку (если она ещё не идёт).
    pub fn try_fire(&mut self) -> Result<(), FireError> {
        if self.ammo == 0 {
            self.start_reload();
            return Err(FireError::OutOfAmmo);
        }
        if self.cooldown_remaining > 0 {
            return Err(FireError::OnCooldown);
        }
        if self.is_reloading() {
            return Err(FireError::Reloading);
        }

        self.ammo -= 1;
        self.cooldown_remaining = self.definition.fire_interval_ticks;
        self.phase = WeaponPhase::Firing;
        Ok(())
    }

    /// Ручная/авто перезарядка. `false` если не нужна или уже идёт.
    pub fn start_reload(&mut self) -> bool {
        if self.is_reloading() || self.ammo >= self.definition.ammo_capacity {
            return false;
        }
        // Нулевая длительность: магазин сразу полный
        if self.definition.reload_ticks == 0 {
            self.ammo = self.definition.ammo_capacity;
            return true;
        }
        self.reload_remaining = self.definition.reload_ticks;
        self.phase = WeaponPhase::Reloading;
        true
    }

    /// Полный магазин (ammo pickup), отменяет перезарядку
    pub fn refill(&mut self) {
        self.ammo = self.definition.ammo_capacity;
        self.reload_remaining = 0;
        self.update_phase();
    }

    /// Один тик таймеров
    pub fn tick(&mut self) {
        if self.reload_remaining > 0 {
            self.reload_remaining -= 1;
            if self.reload_remaining == 0 {
                self.ammo = self.definition.ammo_capacity;
            }
        }
        self.cooldown_remaining = self.cooldown_remaining.saturating_sub(1);
        self.update_phase();
    }

    fn update_phase(&mut self) {
        self.phase = if self.is_reloading() {
            WeaponPhase::Reloading
        } else if self.cooldown_remaining > 0 {
            WeaponPhase::Cooldown
        } else {
            WeaponPhase::Ready
        };
    }
}

/// Система: таймеры оружия, раз в тик до обработки fire intents
pub fn tick_weapon_timers(mut weapons: Query<&mut WeaponState, Without<Dead>>) {
    for mut weapon in weapons.iter_mut() {
        weapon.tick();
    }
}
