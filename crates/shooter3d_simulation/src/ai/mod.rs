//! AI module: FSM агентов-стрелков
//!
//! Perception (дистанция + line of sight), FSM переходы, steering,
//! стрельба через FireIntent, regen, separation, реакция на смерть.

use bevy::prelude::*;

pub mod perception;
pub mod simple_fsm;


pub use perception::{nearest_perceived, perceives, view_target};
pub use simple_fsm::{
    ai_attack_execution, ai_death_reaction, ai_fsm_transitions, ai_health_regen, ai_movement_from_state,
    ai_separation, facing_rotation, next_state, steering_direction, AIConfig, AIState, AgentMemory, AgentProfile,
    TargetView,
};

use crate::combat::{announce_deaths, tick_projectile_lifetimes};
use crate::{SimulationTick, TickSet};

/// AI Plugin
///
/// Порядок в фазе Ai: regen → transitions → steering → attack intents.
pub struct AIPlugin;

impl Plugin for AIPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            SimulationTick,
            (ai_health_regen, ai_fsm_transitions, ai_movement_from_state, ai_attack_execution)
                .chain()
                .in_set(TickSet::Ai),
        )
        .add_systems(
            SimulationTick,
            ai_separation.after(tick_projectile_lifetimes).in_set(TickSet::Contacts),
        )
        .add_systems(SimulationTick, ai_death_reaction.after(announce_deaths).in_set(TickSet::Deaths));
    }
}
