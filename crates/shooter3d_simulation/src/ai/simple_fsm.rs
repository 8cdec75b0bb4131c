//! Simple FSM AI для стрелковых агентов
//!
//! Конечный автомат:
//! Idle → Alert → Pursue → Attack → Flee → Pursue, любое → Dead
//!
//! Архитектура:
//! - FSM тикает раз в simulation tick (детерминированно, таймеры в тиках)
//! - Цель хранится как `EntityId` (weak), перепроверяется каждый тик
//! - Переходы: чистая функция `next_state`, системы только собирают view
//! - Attack state генерирует `FireIntent`, кадренс задаёт само оружие

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::perception::{nearest_perceived, view_target};
use crate::combat::{FireIntent, WeaponState};
use crate::components::{Capabilities, Dead, EntityId, EntityKind, Health, SimEntity};
use crate::logger;
use crate::math::flatten;
use crate::physics::{Contact, KinematicController, MovementInput};
use crate::registry::EntityRegistry;
use crate::world::Level;

/// Доля перекрытия, которую каждый из двух актёров отдаёт за тик
pub const SEPARATION_SHARE: f32 = 0.25;

/// AI FSM состояния
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub enum AIState {
    /// Ничего не делаем, ждём цель
    #[default]
    Idle,

    /// Заметили цель, реагируем с задержкой
    Alert { target: EntityId, reaction_remaining: u32 },

    /// Идём к last-known позиции цели
    Pursue { target: EntityId, lost_ticks: u32 },

    /// Стреляем
    Attack { target: EntityId },

    /// Убегаем от цели
    Flee { target: EntityId, remaining: u32 },

    /// Терминальное
    Dead,
}

impl AIState {
    pub fn target(&self) -> Option<EntityId> {
        match *self {
            AIState::Alert { target, .. }
            | AIState::Pursue { target, .. }
            | AIState::Attack { target }
            | AIState::Flee { target, .. } => Some(target),
            AIState::Idle | AIState::Dead => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AIState::Idle => "Idle",
            AIState::Alert { .. } => "Alert",
            AIState::Pursue { .. } => "Pursue",
            AIState::Attack { .. } => "Attack",
            AIState::Flee { .. } => "Flee",
            AIState::Dead => "Dead",
        }
    }
}

/// Параметры AI (perception, тайминги, flee)
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AIConfig {
    /// Радиус восприятия (метры)
    pub perception_radius: f32,
    pub requires_line_of_sight: bool,
    /// Высота глаз над центром (для line of sight)
    pub eye_height: f32,
    /// Задержка реакции Alert → Pursue (тики)
    pub reaction_ticks: u32,
    /// Дистанция стрельбы (метры)
    pub attack_range: f32,
    /// Сколько тиков помним потерянную цель
    pub memory_ticks: u32,
    /// Порог health fraction для бегства; `None`: никогда не бежит
    pub flee_health_fraction: Option<f32>,
    pub flee_duration_ticks: u32,
    pub flee_cooldown_ticks: u32,
    /// Внутри этого радиуса pursuit замедляется (arrive)
    pub arrive_radius: f32,
    /// Ближе этого pursuit останавливается
    pub stop_distance: f32,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            perception_radius: 25.0,
            requires_line_of_sight: true,
            eye_height: 0.6,
            reaction_ticks: 20,
            attack_range: 15.0,
            memory_ticks: 180,
            flee_health_fraction: None,
            flee_duration_ticks: 120,
            flee_cooldown_ticks: 300,
            arrive_radius: 3.0,
            stop_distance: 1.5,
        }
    }
}

/// Память агента между тиками
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct AgentMemory {
    pub last_known_target_position: Option<Vec3>,
    pub flee_cooldown_remaining: u32,
    pub regen_elapsed: u32,
}

/// Профиль агента: очки за убийство и регенерация
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentProfile {
    pub score_value: u32,
    /// 0: без регенерации
    pub regen_interval_ticks: u32,
    pub regen_amount: u32,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            score_value: 100,
            regen_interval_ticks: 0,
            regen_amount: 0,
        }
    }
}

/// Что агент знает о конкретной цели в этом тике
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    pub position: Vec3,
    /// В радиусе восприятия (+ line of sight если требуется)
    pub perceived: bool,
    /// Воспринимается и в attack range
    pub attackable: bool,
}

/// Переход FSM за один тик
///
/// `nearest`: ближайшая воспринимаемая цель (для Idle), `view`: view
/// текущей цели; `None` значит цель больше не жива.
pub fn next_state(
    state: AIState,
    config: &AIConfig,
    memory: &mut AgentMemory,
    health_fraction: f32,
    nearest: Option<(EntityId, TargetView)>,
    view: impl Fn(EntityId) -> Option<TargetView>,
) -> AIState {
    memory.flee_cooldown_remaining = memory.flee_cooldown_remaining.saturating_sub(1);

    if state == AIState::Dead {
        return AIState::Dead;
    }

    // Re-validation: dangling target → Idle безусловно
    let current = match state.target() {
        Some(target) => match view(target) {
            Some(current) => Some(current),
            None => {
                memory.last_known_target_position = None;
                return AIState::Idle;
            }
        },
        None => None,
    };
    if let Some(current) = current {
        if current.perceived {
            memory.last_known_target_position = Some(current.position);
        }
    }

    match (state, current) {
        (AIState::Idle, _) => match nearest {
            Some((target, seen)) => {
                memory.last_known_target_position = Some(seen.position);
                if config.reaction_ticks == 0 {
                    AIState::Pursue { target, lost_ticks: 0 }
                } else {
                    AIState::Alert {
                        target,
                        reaction_remaining: config.reaction_ticks,
                    }
                }
            }
            None => AIState::Idle,
        },

        (AIState::Alert { target, reaction_remaining }, Some(current)) => {
            if !current.perceived {
                memory.last_known_target_position = None;
                return AIState::Idle;
            }
            let reaction_remaining = reaction_remaining.saturating_sub(1);
            if reaction_remaining == 0 {
                AIState::Pursue { target, lost_ticks: 0 }
            } else {
                AIState::Alert { target, reaction_remaining }
            }
        }

        (AIState::Pursue { target, lost_ticks }, Some(current)) => {
            if current.attackable {
                return AIState::Attack { target };
            }
            if current.perceived {
                return AIState::Pursue { target, lost_ticks: 0 };
            }
            let lost_ticks = lost_ticks + 1;
            if lost_ticks > config.memory_ticks {
                memory.last_known_target_position = None;
                AIState::Idle
            } else {
                AIState::Pursue { target, lost_ticks }
            }
        }

        (AIState::Attack { target }, Some(current)) => {
            let wants_to_flee = config
                .flee_health_fraction
                .is_some_and(|threshold| health_fraction < threshold);
            if wants_to_flee && memory.flee_cooldown_remaining == 0 {
                return AIState::Flee {
                    target,
                    remaining: config.flee_duration_ticks,
                };
            }
            if current.attackable {
                AIState::Attack { target }
            } else {
                AIState::Pursue { target, lost_ticks: 0 }
            }
        }

        (AIState::Flee { target, remaining }, Some(_)) => {
            let recovered = config
                .flee_health_fraction
                .is_none_or(|threshold| health_fraction >= threshold);
            let remaining = remaining.saturating_sub(1);
            if recovered || remaining == 0 {
                memory.flee_cooldown_remaining = config.flee_cooldown_ticks;
                AIState::Pursue { target, lost_ticks: 0 }
            } else {
                AIState::Flee { target, remaining }
            }
        }

        // Состояния с целью без view уже обработаны re-validation
        (other, _) => other,
    }
}

/// Живые player-controlled цели, отсортированные по id
fn collect_targets(
    registry: &EntityRegistry,
    targets: &Query<(&SimEntity, &Capabilities, &Transform), Without<Dead>>,
) -> Vec<(EntityId, Vec3)> {
    let mut found: Vec<(EntityId, Vec3)> = targets
        .iter()
        .filter(|(sim, capabilities, _)| capabilities.player_controlled && !registry.is_dead(sim.id))
        .map(|(sim, _, transform)| (sim.id, transform.translation))
        .collect();
    found.sort_by_key(|(id, _)| *id);
    found
}

/// Система: AI FSM transitions
pub fn ai_fsm_transitions(
    level: Res<Level>,
    registry: Res<EntityRegistry>,
    mut agents: Query<
        (&SimEntity, &Transform, &Health, &AIConfig, &mut AIState, &mut AgentMemory),
        Without<Dead>,
    >,
    targets: Query<(&SimEntity, &Capabilities, &Transform), Without<Dead>>,
) {
    let candidates = collect_targets(&registry, &targets);

    for (sim, transform, health, config, mut state, mut memory) in agents.iter_mut() {
        if registry.is_dead(sim.id) {
            continue;
        }
        let position = transform.translation;

        let nearest = nearest_perceived(&level, config, position, &candidates).and_then(|target| {
            candidates
                .iter()
                .find(|(id, _)| *id == target)
                .map(|(id, target_position)| (*id, view_target(&level, config, position, *target_position)))
        });
        let view = |target: EntityId| {
            candidates
                .iter()
                .find(|(id, _)| *id == target)
                .map(|(_, target_position)| view_target(&level, config, position, *target_position))
        };

        let previous = *state;
        let new_state = next_state(previous, config, &mut memory, health.fraction(), nearest, view);
        if std::mem::discriminant(&new_state) != std::mem::discriminant(&previous) {
            logger::log(&format!("AI {}: {} → {}", sim.id, previous.name(), new_state.name()));
        }
        *state = new_state;
    }
}

/// Yaw-поворот, при котором -Z смотрит вдоль `direction` (горизонтально)
pub fn facing_rotation(direction: Vec3) -> Option<Quat> {
    let flat = flatten(direction);
    if flat.length_squared() <= 1e-8 {
        return None;
    }
    Some(Quat::from_rotation_y(f32::atan2(-flat.x, -flat.z)))
}

/// Steering из состояния: arrive к last-known позиции, бегство, разворот к цели
pub fn steering_direction(state: &AIState, config: &AIConfig, memory: &AgentMemory, position: Vec3) -> Vec3 {
    let Some(last_known) = memory.last_known_target_position else {
        return Vec3::ZERO;
    };
    let to_target = flatten(last_known - position);
    let distance = to_target.length();

    match state {
        AIState::Pursue { .. } => {
            if distance <= config.stop_distance {
                return Vec3::ZERO;
            }
            let scale = if config.arrive_radius > 0.0 {
                (distance / config.arrive_radius).min(1.0)
            } else {
                1.0
            };
            to_target / distance * scale
        }
        AIState::Flee { .. } => {
            if distance <= 1e-4 {
                // Цель в той же точке: бежим по любой оси
                Vec3::X
            } else {
                -to_target / distance
            }
        }
        _ => Vec3::ZERO,
    }
}

/// Система: AI state → MovementInput + facing
pub fn ai_movement_from_state(
    mut agents: Query<(&AIState, &AIConfig, &AgentMemory, &mut Transform, &mut MovementInput), (With<KinematicController>, Without<Dead>)>,
) {
    for (state, config, memory, mut transform, mut input) in agents.iter_mut() {
        let position = transform.translation;
        input.direction = steering_direction(state, config, memory, position);
        input.jump = false;

        let facing = match state {
            AIState::Alert { .. } | AIState::Attack { .. } | AIState::Pursue { .. } => memory
                .last_known_target_position
                .and_then(|target| facing_rotation(target - position)),
            AIState::Flee { .. } => facing_rotation(input.direction),
            AIState::Idle | AIState::Dead => None,
        };
        if let Some(rotation) = facing {
            transform.rotation = rotation;
        }
    }
}

/// Система: Attack state → FireIntent
///
/// Intent только когда оружие будет готово к фазе Weapons этого тика.
pub fn ai_attack_execution(
    agents: Query<(&SimEntity, &Transform, &AIState, &AgentMemory, &WeaponState), Without<Dead>>,
    mut intents: EventWriter<FireIntent>,
) {
    for (sim, transform, state, memory, weapon) in agents.iter() {
        let AIState::Attack { .. } = state else {
            continue;
        };
        let Some(target) = memory.last_known_target_position else {
            continue;
        };
        if !weapon.ready_after_tick() {
            continue;
        }
        let muzzle = transform.translation + Vec3::Y * weapon.definition.muzzle_height;
        let aim = target - muzzle;
        if aim.length_squared() <= 1e-8 {
            continue;
        }
        intents.write(FireIntent {
            shooter: sim.id,
            aim: aim.normalize(),
        });
    }
}

/// Система: регенерация здоровья агентов
pub fn ai_health_regen(mut agents: Query<(&AgentProfile, &mut AgentMemory, &mut Health), Without<Dead>>) {
    for (profile, mut memory, mut health) in agents.iter_mut() {
        if profile.regen_interval_ticks == 0 || profile.regen_amount == 0 || !health.is_alive() {
            continue;
        }
        memory.regen_elapsed += 1;
        if memory.regen_elapsed >= profile.regen_interval_ticks {
            memory.regen_elapsed = 0;
            health.heal(profile.regen_amount);
        }
    }
}

/// Система: actor–actor контакты → мягкое расталкивание
///
/// Каждый из пары сдвигается на `SEPARATION_SHARE` перекрытия по нормали.
pub fn ai_separation(
    mut contacts: EventReader<Contact>,
    registry: Res<EntityRegistry>,
    mut actors: Query<&mut Transform, (With<KinematicController>, Without<Dead>)>,
) {
    let is_actor = |id: EntityId| matches!(registry.kind(id), Some(EntityKind::Player | EntityKind::Enemy));

    for contact in contacts.read() {
        if !is_actor(contact.a) || !is_actor(contact.b) {
            continue;
        }
        let (Some(a), Some(b)) = (registry.resolve_alive(contact.a), registry.resolve_alive(contact.b)) else {
            continue;
        };
        let push = flatten(contact.normal) * contact.depth * SEPARATION_SHARE;
        if let Ok(mut transform) = actors.get_mut(a) {
            transform.translation += push;
        }
        if let Ok(mut transform) = actors.get_mut(b) {
            transform.translation -= push;
        }
    }
}

/// Система (фаза Deaths): мёртвым AIState::Dead и нулевое движение
pub fn ai_death_reaction(mut dead: Query<(Option<&mut AIState>, &mut MovementInput), Added<Dead>>) {
    for (state, mut input) in dead.iter_mut() {
        if let Some(mut state) = state {
            *state = AIState::Dead;
        }
        *input = MovementInput::default();
    }
}

