//! Pickups: health и ammo, подбираются при контакте
//!
//! Pickup: trigger (не dynamic, не solid), контакты с ним приходят из
//! physics. Подбирает первый collector по порядку contact events.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::weapon::WeaponState;
use super::PickupCollected;
use crate::components::{Capabilities, Dead, EntityKind, Health};
use crate::logger;
use crate::physics::Contact;
use crate::registry::{DeathCause, EntityRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupKind {
    /// Лечение (с clamp до max health)
    Health { amount: u32 },
    /// Полный магазин, отменяет перезарядку
    Ammo,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pickup {
    pub kind: PickupKind,
}

/// Применить pickup к collector'у. Возвращает восстановленное здоровье/патроны.
pub fn apply_pickup(kind: PickupKind, health: &mut Health, weapon: Option<&mut WeaponState>) -> u32 {
    match kind {
        PickupKind::Health { amount } => health.heal(amount),
        PickupKind::Ammo => match weapon {
            Some(weapon) => {
                let before = weapon.ammo;
                weapon.refill();
                weapon.ammo - before
            }
            None => 0,
        },
    }
}

/// Система: подбор pickups
pub fn collect_pickups(
    mut contacts: EventReader<Contact>,
    mut registry: ResMut<EntityRegistry>,
    pickups: Query<&Pickup, Without<Dead>>,
    mut collectors: Query<(&Capabilities, &mut Health, Option<&mut WeaponState>), Without<Dead>>,
    mut collected: EventWriter<PickupCollected>,
) {
    for contact in contacts.read() {
        let (pickup_id, collector_id) = match (registry.kind(contact.a), registry.kind(contact.b)) {
            (Some(EntityKind::Pickup), Some(_)) => (contact.a, contact.b),
            (Some(_), Some(EntityKind::Pickup)) => (contact.b, contact.a),
            _ => continue,
        };
        let (Some(pickup_entity), Some(collector_entity)) =
            (registry.resolve_alive(pickup_id), registry.resolve_alive(collector_id))
        else {
            continue;
        };
        let Ok(pickup) = pickups.get(pickup_entity) else {
            continue;
        };
        let Ok((capabilities, mut health, weapon)) = collectors.get_mut(collector_entity) else {
            continue;
        };
        if !capabilities.collects_pickups {
            continue;
        }

        let amount = apply_pickup(pickup.kind, &mut health, weapon.map(|weapon| weapon.into_inner()));
        match registry.mark_dead(pickup_id, DeathCause::Consumed) {
            Ok(_) => {
                logger::log(&format!("{} picked up {:?} (+{})", collector_id, pickup.kind, amount));
                collected.write(PickupCollected {
                    pickup: pickup_id,
                    collector: collector_id,
                    kind: pickup.kind,
                    amount,
                });
            }
            Err(err) => logger::log_error(&format!("collect_pickups: {}", err)),
        }
    }
}
