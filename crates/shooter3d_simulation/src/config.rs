//! Конфигурация матча (serde + JSON)
//!
//! `SimulationConfig::default()`: играбельный матч на арене. Всё проверяется
//! в Loading до Playing: ошибки → `SimulationError::Configuration`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ai::{AIConfig, AgentProfile};
use crate::combat::{PickupKind, WeaponDefinition};
use crate::components::{Collider, EntityId, EntityKind};
use crate::error::{SimulationError, SimulationResult};
use crate::physics::KinematicController;
use crate::registry::{EntityAttributes, EntityRegistry};
use crate::world::{Level, LevelSource};

pub const DEFAULT_TICK_HZ: f32 = 60.0;
pub const DEFAULT_MAX_TICKS_PER_FRAME: u32 = 5;
pub const DEFAULT_SEED: u64 = 42;

fn configuration<T>(message: String) -> SimulationResult<T> {
    Err(SimulationError::Configuration(message))
}

fn check_finite(what: &str, position: [f32; 3]) -> SimulationResult<()> {
    if position.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        configuration(format!("{}: position {:?} is not finite", what, position))
    }
}

fn check_capsule(what: &str, radius: f32, half_height: f32) -> SimulationResult<()> {
    if !(radius.is_finite() && radius > 0.0 && half_height.is_finite() && half_height >= 0.0) {
        return configuration(format!("{}: radius must be > 0 and half_height >= 0", what));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerDefinition {
    pub health: u32,
    pub weapon: Option<String>,
    pub move_speed: f32,
    pub jump_speed: f32,
    pub gravity: f32,
    pub radius: f32,
    pub half_height: f32,
    pub max_pitch_degrees: f32,
    /// `None`: точка спавна уровня
    pub spawn: Option<[f32; 3]>,
}

impl Default for PlayerDefinition {
    fn default() -> Self {
        Self {
            health: 100,
            weapon: Some("rifle".to_string()),
            move_speed: 10.0,
            jump_speed: 15.0,
            gravity: -30.0,
            radius: 0.5,
            half_height: 0.5,
            max_pitch_degrees: 25.0,
            spawn: None,
        }
    }
}

impl PlayerDefinition {
    pub fn controller(&self) -> KinematicController {
        KinematicController {
            move_speed: self.move_speed,
            gravity: self.gravity,
            jump_speed: self.jump_speed,
            grounded: false,
        }
    }

    pub fn collider(&self) -> Collider {
        Collider::capsule(self.radius, self.half_height)
    }
}

/// Тип врага (по имени из `agents`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefinition {
    pub health: u32,
    pub weapon: Option<String>,
    pub move_speed: f32,
    pub gravity: f32,
    pub radius: f32,
    pub half_height: f32,
    pub ai: AIConfig,
    pub profile: AgentProfile,
}

impl Default for AgentDefinition {
    fn default() -> Self {
        Self::grunt()
    }
}

impl AgentDefinition {
    /// Медленный, без бегства
    pub fn grunt() -> Self {
        Self {
            health: 60,
            weapon: Some("blaster".to_string()),
            move_speed: 5.0,
            gravity: -30.0,
            radius: 0.5,
            half_height: 0.5,
            ai: AIConfig::default(),
            profile: AgentProfile::default(),
        }
    }

    /// Быстрый, убегает на низком здоровье и регенерирует
    pub fn scout() -> Self {
        Self {
            health: 40,
            move_speed: 8.0,
            ai: AIConfig {
                reaction_ticks: 10,
                attack_range: 12.0,
                flee_health_fraction: Some(0.3),
                ..AIConfig::default()
            },
            profile: AgentProfile {
                score_value: 150,
                regen_interval_ticks: 30,
                regen_amount: 2,
            },
            ..Self::grunt()
        }
    }

    pub fn controller(&self) -> KinematicController {
        KinematicController {
            move_speed: self.move_speed,
            gravity: self.gravity,
            ..KinematicController::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySpawn {
    pub agent: String,
    pub position: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupSpawn {
    pub position: [f32; 3],
    pub kind: PickupKind,
    #[serde(default = "default_pickup_radius")]
    pub radius: f32,
}

fn default_pickup_radius() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpawn {
    pub position: [f32; 3],
    pub radius: f32,
    /// `None`: неразрушимый
    #[serde(default)]
    pub health: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub tick_hz: f32,
    pub max_ticks_per_frame: u32,
    pub level: LevelSource,
    pub player: PlayerDefinition,
    pub weapons: BTreeMap<String, WeaponDefinition>,
    pub agents: BTreeMap<String, AgentDefinition>,
    pub enemies: Vec<EnemySpawn>,
    pub pickups: Vec<PickupSpawn>,
    pub obstacles: Vec<ObstacleSpawn>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let weapons = BTreeMap::from([
            ("rifle".to_string(), WeaponDefinition::rifle()),
            ("blaster".to_string(), WeaponDefinition::blaster()),
            ("launcher".to_string(), WeaponDefinition::launcher()),
        ]);
        let agents = BTreeMap::from([
            ("grunt".to_string(), AgentDefinition::grunt()),
            ("scout".to_string(), AgentDefinition::scout()),
        ]);
        let enemy = |agent: &str, position: [f32; 3]| EnemySpawn {
            agent: agent.to_string(),
            position,
        };

        Self {
            seed: DEFAULT_SEED,
            tick_hz: DEFAULT_TICK_HZ,
            max_ticks_per_frame: DEFAULT_MAX_TICKS_PER_FRAME,
            level: LevelSource::Arena,
            player: PlayerDefinition::default(),
            weapons,
            agents,
            enemies: vec![
                enemy("grunt", [-8.0, 1.0, -20.0]),
                enemy("grunt", [8.0, 1.0, 24.0]),
                enemy("scout", [24.0, 1.0, 0.0]),
                enemy("scout", [-24.0, 1.0, -2.0]),
            ],
            pickups: vec![
                PickupSpawn {
                    position: [10.0, 0.5, 0.0],
                    kind: PickupKind::Health { amount: 50 },
                    radius: default_pickup_radius(),
                },
                PickupSpawn {
                    position: [-10.0, 0.5, 0.0],
                    kind: PickupKind::Ammo,
                    radius: default_pickup_radius(),
                },
            ],
            obstacles: vec![ObstacleSpawn {
                position: [6.0, 0.75, 10.0],
                radius: 0.75,
                health: Some(50),
            }],
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> SimulationResult<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SimulationResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| SimulationError::Configuration(format!("{}: {}", path.display(), err)))?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> SimulationResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz
    }

    /// Проверка конфига без геометрии уровня
    pub fn validate(&self) -> SimulationResult<()> {
        if !(self.tick_hz.is_finite() && self.tick_hz > 0.0) {
            return configuration(format!("tick_hz must be positive, got {}", self.tick_hz));
        }
        if self.max_ticks_per_frame == 0 {
            return configuration("max_ticks_per_frame must be >= 1".to_string());
        }
        if let LevelSource::Flat { half_extent } = self.level {
            if !(half_extent.is_finite() && half_extent > 0.0) {
                return configuration(format!("flat level half_extent must be positive, got {}", half_extent));
            }
        }

        for (name, weapon) in &self.weapons {
            weapon.validate(name)?;
        }

        let player = &self.player;
        if player.health == 0 {
            return configuration("player health must be > 0".to_string());
        }
        self.check_weapon_ref("player", player.weapon.as_deref())?;
        check_capsule("player", player.radius, player.half_height)?;
        if !(player.move_speed.is_finite() && player.move_speed >= 0.0) {
            return configuration("player move_speed must be >= 0".to_string());
        }
        if !(player.max_pitch_degrees > 0.0 && player.max_pitch_degrees < 90.0) {
            return configuration(format!(
                "player max_pitch_degrees must be in (0, 90), got {}",
                player.max_pitch_degrees
            ));
        }
        if let Some(spawn) = player.spawn {
            check_finite("player spawn", spawn)?;
        }

        for (name, agent) in &self.agents {
            let what = format!("agent '{}'", name);
            if agent.health == 0 {
                return configuration(format!("{}: health must be > 0", what));
            }
            self.check_weapon_ref(&what, agent.weapon.as_deref())?;
            check_capsule(&what, agent.radius, agent.half_height)?;
            if !(agent.move_speed.is_finite() && agent.move_speed >= 0.0) {
                return configuration(format!("{}: move_speed must be >= 0", what));
            }
            let ai = &agent.ai;
            if !(ai.perception_radius > 0.0 && ai.attack_range > 0.0) {
                return configuration(format!("{}: perception_radius and attack_range must be > 0", what));
            }
            if let Some(fraction) = ai.flee_health_fraction {
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return configuration(format!("{}: flee_health_fraction must be in (0, 1]", what));
                }
            }
        }

        for (index, spawn) in self.enemies.iter().enumerate() {
            if !self.agents.contains_key(&spawn.agent) {
                return configuration(format!("enemy #{}: unknown agent '{}'", index, spawn.agent));
            }
            check_finite(&format!("enemy #{}", index), spawn.position)?;
        }
        for (index, spawn) in self.pickups.iter().enumerate() {
            check_finite(&format!("pickup #{}", index), spawn.position)?;
            if !(spawn.radius.is_finite() && spawn.radius > 0.0) {
                return configuration(format!("pickup #{}: radius must be > 0", index));
            }
            if let PickupKind::Health { amount: 0 } = spawn.kind {
                return configuration(format!("pickup #{}: heal amount must be > 0", index));
            }
        }
        for (index, spawn) in self.obstacles.iter().enumerate() {
            check_finite(&format!("obstacle #{}", index), spawn.position)?;
            if !(spawn.radius.is_finite() && spawn.radius > 0.0) {
                return configuration(format!("obstacle #{}: radius must be > 0", index));
            }
        }
        Ok(())
    }

    fn check_weapon_ref(&self, owner: &str, weapon: Option<&str>) -> SimulationResult<()> {
        match weapon {
            Some(name) if !self.weapons.contains_key(name) => {
                configuration(format!("{}: unknown weapon '{}'", owner, name))
            }
            _ => Ok(()),
        }
    }

    /// Все точки спавна внутри bounds уровня
    pub fn validate_against(&self, level: &Level) -> SimulationResult<()> {
        let inside = |what: String, position: [f32; 3]| {
            if level.contains(Vec3::from_array(position)) {
                Ok(())
            } else {
                configuration(format!("{}: position {:?} is outside level bounds", what, position))
            }
        };
        if let Some(spawn) = self.player.spawn {
            inside("player spawn".to_string(), spawn)?;
        }
        for (index, spawn) in self.enemies.iter().enumerate() {
            inside(format!("enemy #{}", index), spawn.position)?;
        }
        for (index, spawn) in self.pickups.iter().enumerate() {
            inside(format!("pickup #{}", index), spawn.position)?;
        }
        for (index, spawn) in self.obstacles.iter().enumerate() {
            inside(format!("obstacle #{}", index), spawn.position)?;
        }
        Ok(())
    }

    /// Оружие по именам, одно `Arc` на определение
    pub fn shared_weapons(&self) -> BTreeMap<String, Arc<WeaponDefinition>> {
        self.weapons
            .iter()
            .map(|(name, definition)| (name.clone(), Arc::new(definition.clone())))
            .collect()
    }

    /// Буферизует spawn всех entity матча. Возвращает (id игрока, число врагов).
    pub fn spawn_match(
        &self,
        registry: &mut EntityRegistry,
        level: &Level,
    ) -> SimulationResult<(EntityId, u32)> {
        let weapons = self.shared_weapons();
        let weapon = |name: &Option<String>| -> SimulationResult<Option<Arc<WeaponDefinition>>> {
            match name {
                Some(name) => weapons
                    .get(name)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| SimulationError::Configuration(format!("unknown weapon '{}'", name))),
                None => Ok(None),
            }
        };

        let player_position = self.player.spawn.map(Vec3::from_array).unwrap_or(level.player_spawn());
        let player = registry.spawn(
            EntityKind::Player,
            Transform::from_translation(player_position),
            EntityAttributes::player(
                self.player.health,
                self.player.collider(),
                self.player.controller(),
                weapon(&self.player.weapon)?,
            ),
        );

        let mut enemies = 0;
        for spawn in &self.enemies {
            let agent = self
                .agents
                .get(&spawn.agent)
                .ok_or_else(|| SimulationError::Configuration(format!("unknown agent '{}'", spawn.agent)))?;
            registry.spawn(
                EntityKind::Enemy,
                Transform::from_translation(Vec3::from_array(spawn.position)),
                EntityAttributes::enemy(
                    agent.health,
                    Collider::capsule(agent.radius, agent.half_height),
                    agent.controller(),
                    weapon(&agent.weapon)?,
                    agent.ai.clone(),
                    agent.profile,
                ),
            );
            enemies += 1;
        }

        for spawn in &self.pickups {
            registry.spawn(
                EntityKind::Pickup,
                Transform::from_translation(Vec3::from_array(spawn.position)),
                EntityAttributes::pickup(spawn.kind, spawn.radius),
            );
        }
        for spawn in &self.obstacles {
            registry.spawn(
                EntityKind::StaticObstacle,
                Transform::from_translation(Vec3::from_array(spawn.position)),
                EntityAttributes::obstacle(Collider::sphere(spawn.radius), spawn.health),
            );
        }

        Ok((player, enemies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        let level = config.level.build(config.seed).unwrap();
        config.validate_against(&level).unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimulationConfig::from_json_str(r#"{ "seed": 7, "enemies": [] }"#).unwrap();
        assert_eq!(config.seed, 7);
        assert!(config.enemies.is_empty());
        assert_eq!(config.tick_hz, DEFAULT_TICK_HZ);
        assert!(config.weapons.contains_key("rifle"));
    }

    #[test]
    fn test_unknown_weapon_rejected() {
        let mut config = SimulationConfig::default();
        config.player.weapon = Some("railgun".to_string());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SimulationError::Configuration(ref msg) if msg.contains("railgun")));
    }

    #[test]
    fn test_malformed_weapon_rejected() {
        let json = r#"{ "weapons": { "rifle": { "fire_interval_ticks": 0 } } }"#;
        assert!(matches!(
            SimulationConfig::from_json_str(json),
            Err(SimulationError::Configuration(_))
        ));
    }

    #[test]
    fn test_bad_json_is_configuration_error() {
        assert!(matches!(
            SimulationConfig::from_json_str("{ seed: "),
            Err(SimulationError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_agent_rejected() {
        let mut config = SimulationConfig::default();
        config.enemies.push(EnemySpawn {
            agent: "boss".to_string(),
            position: [0.0, 1.0, 0.0],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spawn_outside_bounds_rejected() {
        let mut config = SimulationConfig {
            level: LevelSource::Flat { half_extent: 10.0 },
            ..Default::default()
        };
        config.enemies = vec![EnemySpawn {
            agent: "grunt".to_string(),
            position: [500.0, 1.0, 0.0],
        }];
        config.validate().unwrap();
        let level = config.level.build(config.seed).unwrap();
        assert!(config.validate_against(&level).is_err());
    }

    #[test]
    fn test_spawn_match_buffers_entities() {
        let config = SimulationConfig::default();
        let level = config.level.build(config.seed).unwrap();
        let mut registry = EntityRegistry::new();
        let (player, enemies) = config.spawn_match(&mut registry, &level).unwrap();

        assert_eq!(registry.kind(player), Some(EntityKind::Player));
        assert_eq!(enemies, 4);
        assert_eq!(registry.count_alive(EntityKind::Enemy), 4);
        assert_eq!(registry.pending_count(), 1 + 4 + 2 + 1);
    }
}
