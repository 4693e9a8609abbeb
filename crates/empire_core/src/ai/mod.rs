//! Computer-controlled ships.
//!
//! AI runs during intent collection against the read-only snapshot. Each AI
//! ship gets a new state for its [`ControlMode`] plus course, fire and action
//! intents; nothing is applied until the orders phase. AI intents are queued
//! after player commands, so a player course order for the same ship wins.
//!
//! Two factions:
//! - [`cyborg`]: aggressive raiders that engage on sight and lay mines
//! - [`droid`]: methodical defenders that patrol a home point and self-repair

pub mod cyborg;
pub mod droid;

use crate::config::{AiConfig, CombatConfig};
use crate::entities::{ControlMode, EntityId, EntityRef, Ship, ShipClass, Subsystem, WeaponKind};
use crate::intent::{IntentOrigin, IntentQueue};
use crate::math::{bearing_deg, percent, Fixed, Vec2Fixed};
use crate::rng::TickRng;
use crate::snapshot::WorldSnapshot;

/// A hostile ship an AI can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    /// Ship id.
    pub id: EntityId,
    /// Distance from the observer.
    pub distance: Fixed,
    /// Heading from the observer to the contact.
    pub bearing: Fixed,
}

/// Everything an AI needs to decide for one ship.
pub struct AiView<'a> {
    /// The world as it was at the start of the tick.
    pub world: &'a WorldSnapshot,
    /// The ship being flown.
    pub ship: &'a Ship,
    /// Its class.
    pub class: &'a ShipClass,
    /// AI tuning.
    pub config: &'a AiConfig,
    /// Weapon tuning.
    pub combat: &'a CombatConfig,
}

impl AiView<'_> {
    /// Sensor range after tactical damage.
    #[must_use]
    pub fn scan_range(&self) -> Fixed {
        self.class.scan_range * self.ship.systems.efficiency(Subsystem::Tactical)
    }

    /// Visible hostile ships within `range`, nearest first (ties by id).
    ///
    /// Cloaked ships do not show up.
    #[must_use]
    pub fn hostiles_within(&self, range: Fixed) -> Vec<Contact> {
        self.hostiles_near(self.ship.position, range)
    }

    /// Visible hostile ships within `range` of an arbitrary point.
    #[must_use]
    pub fn hostiles_near(&self, point: Vec2Fixed, range: Fixed) -> Vec<Contact> {
        let galaxy = &self.world.galaxy;
        let mut contacts: Vec<Contact> = self
            .world
            .ships
            .values()
            .filter(|other| other.id != self.ship.id && other.is_alive() && other.cloak == 0)
            .filter(|other| !self.world.is_quarantined(EntityRef::Ship(other.id)))
            .filter(|other| self.world.are_hostile(self.ship.owner, other.owner))
            .filter_map(|other| {
                let distance = galaxy.distance(point, other.position);
                (distance <= range).then(|| Contact {
                    id: other.id,
                    distance: galaxy.distance(self.ship.position, other.position),
                    bearing: bearing_deg(galaxy.offset(self.ship.position, other.position)),
                })
            })
            .collect();
        contacts.sort_by_key(|c| (c.distance, c.id));
        contacts
    }

    /// Re-sight a held target. `None` once it is gone, cloaked or out of range.
    #[must_use]
    pub fn reacquire(&self, target: EntityId, range: Fixed) -> Option<Contact> {
        self.hostiles_within(range).into_iter().find(|c| c.id == target)
    }

    /// Threat score of a contact: armament weight x hull integrity x proximity.
    #[must_use]
    pub fn threat(&self, contact: &Contact, range: Fixed) -> Fixed {
        let Some(ship) = self.world.ships.get(&contact.id) else {
            return Fixed::ZERO;
        };
        let weight: u32 = self.world.classes.get(&ship.class).map_or(1, |c| {
            c.armament.iter().map(|w| weapon_weight(*w)).sum::<u32>().max(1)
        });
        let hull = Fixed::from_num(100);
        let integrity = (hull - ship.damage).max(Fixed::ZERO) / hull;
        let proximity = if range > Fixed::ZERO {
            ((range - contact.distance) / range).max(Fixed::ZERO)
        } else {
            Fixed::ZERO
        };
        Fixed::from_num(weight) * integrity * proximity
    }

    /// Pick the most threatening contact, ties to the lower id.
    #[must_use]
    pub fn most_threatening(&self, contacts: &[Contact], range: Fixed) -> Option<Contact> {
        let mut best: Option<(Fixed, Contact)> = None;
        for contact in contacts {
            let score = self.threat(contact, range);
            let better = match best {
                None => true,
                Some((top, ref held)) => score > top || (score == top && contact.id < held.id),
            };
            if better {
                best = Some((score, *contact));
            }
        }
        best.map(|(_, contact)| contact)
    }

    /// Approach speed for a target at `distance`.
    #[must_use]
    pub fn pursuit_speed(&self, distance: Fixed) -> Fixed {
        let max = self.class.max_speed;
        if distance < Fixed::from_num(self.config.close_range) {
            max / Fixed::from_num(4)
        } else if distance < Fixed::from_num(self.config.mid_range) {
            max / Fixed::from_num(2)
        } else {
            max
        }
    }

    /// Patrol speed.
    #[must_use]
    pub fn cruise_speed(&self) -> Fixed {
        self.class.max_speed * percent(i64::from(self.config.cruise_percent))
    }

    /// Best weapon that can fire at a target `distance` away right now.
    ///
    /// Energy decides the preference: beam weapons when flush, torpedoes when
    /// comfortable, missiles otherwise.
    #[must_use]
    pub fn best_weapon(&self, distance: Fixed) -> Option<WeaponKind> {
        let energy = self.ship.energy;
        let preference: &[WeaponKind] = if energy > Fixed::from_num(self.config.phaser_energy) {
            &[
                WeaponKind::HyperPhaser,
                WeaponKind::Phaser,
                WeaponKind::IonCannon,
                WeaponKind::Torpedo,
                WeaponKind::Missile,
            ]
        } else if energy > Fixed::from_num(self.config.torpedo_energy) {
            &[WeaponKind::Torpedo, WeaponKind::Missile, WeaponKind::Phaser]
        } else {
            &[WeaponKind::Missile]
        };
        preference.iter().copied().find(|&weapon| {
            let spec = self.combat.weapon(weapon);
            self.class.has_weapon(weapon)
                && self.ship.cooldown(weapon) == 0
                && energy >= Fixed::from_num(spec.energy_cost)
                && distance <= Fixed::from_num(spec.range)
                && weapon.ammo().map_or(true, |item| self.ship.cargo.count(item) > 0)
        })
    }

    /// Queue a shot at a contact if any weapon can make it.
    pub fn engage(&self, contact: &Contact, intents: &mut IntentQueue) -> Option<WeaponKind> {
        let weapon = self.best_weapon(contact.distance)?;
        intents.push_fire(IntentOrigin::Ai, self.ship.id, contact.id, weapon);
        Some(weapon)
    }
}

fn weapon_weight(weapon: WeaponKind) -> u32 {
    match weapon {
        WeaponKind::Phaser => 1,
        WeaponKind::Torpedo | WeaponKind::Missile | WeaponKind::IonCannon => 2,
        WeaponKind::HyperPhaser => 3,
    }
}

/// Evaluate every AI ship and queue its intents. Returns ships evaluated.
pub fn collect_ai_intents(
    world: &WorldSnapshot,
    config: &AiConfig,
    combat: &CombatConfig,
    rng: &mut TickRng,
    intents: &mut IntentQueue,
) -> usize {
    let mut evaluated = 0;
    for ship in world.ships.values() {
        if !ship.is_alive() || !ship.is_ai() || world.is_quarantined(EntityRef::Ship(ship.id)) {
            continue;
        }
        let Some(class) = world.classes.get(&ship.class) else {
            continue;
        };
        let view = AiView {
            world,
            ship,
            class,
            config,
            combat,
        };
        let next = match &ship.control {
            ControlMode::CyborgAi(state) => {
                ControlMode::CyborgAi(cyborg::evaluate(&view, state, rng, intents))
            }
            ControlMode::DroidAi(state) => {
                ControlMode::DroidAi(droid::evaluate(&view, state, intents))
            }
            ControlMode::Human => continue,
        };
        evaluated += 1;
        intents.set_ai_state(ship.id, next);
    }
    evaluated
}
