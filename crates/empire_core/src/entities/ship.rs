//! Ships and ship classes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Cargo, ClassId, ControlMode, EntityId, OwnerId};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Highest shield type a ship can mount.
pub const MAX_SHIELD_TYPE: u8 = 19;

/// Ship-mounted weapons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    /// Standard phaser bank.
    Phaser,
    /// Hyper-phaser: longer range, expensive, slow to recharge.
    HyperPhaser,
    /// Photon torpedo (guided, uses cargo).
    Torpedo,
    /// Missile (guided, uses cargo).
    Missile,
    /// Ion cannon: drains the target's shield charge on hit.
    IonCannon,
}

impl WeaponKind {
    /// Guided weapons can be jammed and spoofed by decoys.
    #[must_use]
    pub const fn is_guided(self) -> bool {
        matches!(self, Self::Torpedo | Self::Missile)
    }

    /// Whether phaser-bank damage scales this weapon.
    #[must_use]
    pub const fn is_beam(self) -> bool {
        matches!(self, Self::Phaser | Self::HyperPhaser)
    }

    /// Cargo item consumed per shot, if any.
    #[must_use]
    pub const fn ammo(self) -> Option<super::Item> {
        match self {
            Self::Torpedo => Some(super::Item::Torpedo),
            Self::Missile => Some(super::Item::Missile),
            _ => None,
        }
    }
}

/// Static stats shared by all ships of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipClass {
    /// Class name.
    pub name: String,
    /// Top speed (units per second).
    #[serde(with = "fixed_serde")]
    pub max_speed: Fixed,
    /// Acceleration (units per second squared).
    #[serde(with = "fixed_serde")]
    pub max_acceleration: Fixed,
    /// Turn rate (degrees per second).
    #[serde(with = "fixed_serde")]
    pub max_turn_rate: Fixed,
    /// Energy capacity.
    #[serde(with = "fixed_serde")]
    pub max_energy: Fixed,
    /// Energy regenerated per second.
    #[serde(with = "fixed_serde")]
    pub energy_regen: Fixed,
    /// Best shield type the class can mount (0-19).
    pub max_shield_type: u8,
    /// Mounted weapons.
    pub armament: BTreeSet<WeaponKind>,
    /// Outgoing damage modifier in percent.
    pub damage_factor: u8,
    /// Hull points repaired per tick while self-repairing.
    #[serde(with = "fixed_serde")]
    pub repair_rate: Fixed,
    /// Sensor range in galactic units.
    #[serde(with = "fixed_serde")]
    pub scan_range: Fixed,
    /// Sensor quality (0-100), helps avoid visible mines.
    pub sensor_rating: u8,
    /// Hull mass; widens self-destruct blasts.
    pub tonnage: u32,
    /// Score awarded for destroying a ship of this class.
    pub kill_points: u32,
    /// Highest cloak level available (0 = no cloak).
    pub max_cloak: u8,
    /// Whether the class has mine racks.
    pub can_lay_mines: bool,
}

impl ShipClass {
    /// Whether the class mounts the given weapon.
    #[must_use]
    pub fn has_weapon(&self, weapon: WeaponKind) -> bool {
        self.armament.contains(&weapon)
    }
}

/// Shield generator status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShieldStatus {
    /// Shields lowered.
    #[default]
    Down,
    /// Shields raised and absorbing.
    Up,
}

/// A ship's shield generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shield {
    /// Shield type (0-19). Higher types absorb more.
    pub kind: u8,
    /// Raised or lowered.
    pub status: ShieldStatus,
    /// Charge percentage (0-100).
    #[serde(with = "fixed_serde")]
    pub charge: Fixed,
}

impl Default for Shield {
    fn default() -> Self {
        Self {
            kind: 0,
            status: ShieldStatus::Down,
            charge: Fixed::from_num(100),
        }
    }
}

impl Shield {
    /// Whether the shield is raised.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.status == ShieldStatus::Up
    }
}

/// Ship subsystems that can be damaged independently of the hull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Subsystem {
    /// Steering.
    Helm,
    /// Impulse and warp engines.
    Engines,
    /// Targeting computer.
    FireControl,
    /// Phaser banks.
    Phasers,
    /// Shield generator.
    Shields,
    /// Tactical sensors.
    Tactical,
}

impl Subsystem {
    /// All subsystems, in roll order.
    pub const ALL: [Subsystem; 6] = [
        Subsystem::Helm,
        Subsystem::Engines,
        Subsystem::FireControl,
        Subsystem::Phasers,
        Subsystem::Shields,
        Subsystem::Tactical,
    ];
}

/// Damage (0-100) of each subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subsystems {
    /// Helm damage.
    #[serde(with = "fixed_serde")]
    pub helm: Fixed,
    /// Engine damage.
    #[serde(with = "fixed_serde")]
    pub engines: Fixed,
    /// Fire control damage.
    #[serde(with = "fixed_serde")]
    pub fire_control: Fixed,
    /// Phaser bank damage.
    #[serde(with = "fixed_serde")]
    pub phasers: Fixed,
    /// Shield generator damage.
    #[serde(with = "fixed_serde")]
    pub shields: Fixed,
    /// Tactical sensor damage.
    #[serde(with = "fixed_serde")]
    pub tactical: Fixed,
}

impl Subsystems {
    /// Damage of one subsystem.
    #[must_use]
    pub fn get(&self, system: Subsystem) -> Fixed {
        match system {
            Subsystem::Helm => self.helm,
            Subsystem::Engines => self.engines,
            Subsystem::FireControl => self.fire_control,
            Subsystem::Phasers => self.phasers,
            Subsystem::Shields => self.shields,
            Subsystem::Tactical => self.tactical,
        }
    }

    /// Mutable damage of one subsystem.
    pub fn get_mut(&mut self, system: Subsystem) -> &mut Fixed {
        match system {
            Subsystem::Helm => &mut self.helm,
            Subsystem::Engines => &mut self.engines,
            Subsystem::FireControl => &mut self.fire_control,
            Subsystem::Phasers => &mut self.phasers,
            Subsystem::Shields => &mut self.shields,
            Subsystem::Tactical => &mut self.tactical,
        }
    }

    /// Performance multiplier of a subsystem: 1.0 undamaged, 0.5 wrecked.
    #[must_use]
    pub fn efficiency(&self, system: Subsystem) -> Fixed {
        let damage = self.get(system).max(Fixed::ZERO).min(Fixed::from_num(100));
        Fixed::ONE - damage / Fixed::from_num(200)
    }
}

/// A ship in the galaxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    /// Unique ship id.
    pub id: EntityId,
    /// Owning player or AI faction.
    pub owner: OwnerId,
    /// Ship class.
    pub class: ClassId,
    /// Display name.
    pub name: String,
    /// Position in the galaxy.
    pub position: Vec2Fixed,
    /// Current heading in degrees.
    #[serde(with = "fixed_serde")]
    pub heading: Fixed,
    /// Heading the helm is turning towards.
    #[serde(with = "fixed_serde")]
    pub desired_heading: Fixed,
    /// Current speed.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Speed the engines are working towards.
    #[serde(with = "fixed_serde")]
    pub desired_speed: Fixed,
    /// Hull damage (0-100, destroyed at 100).
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Stored energy.
    #[serde(with = "fixed_serde")]
    pub energy: Fixed,
    /// Shield generator.
    pub shield: Shield,
    /// Cloak level (0 = uncloaked).
    pub cloak: u8,
    /// Ticks until each weapon may fire again.
    pub cooldowns: BTreeMap<WeaponKind, u32>,
    /// Who or what is flying the ship.
    pub control: ControlMode,
    /// Self-destruct countdown in combat passes, if armed.
    pub self_destruct: Option<u32>,
    /// Items aboard.
    pub cargo: Cargo,
    /// Subsystem damage.
    pub systems: Subsystems,
    /// Ticks of active jamming left.
    pub jammer_ticks: u32,
    /// Ticks the ship is held by a tractor lock.
    pub cant_exit: u32,
    /// Ships destroyed by this ship.
    pub kills: u32,
    /// Ship that most recently damaged this one.
    pub last_attacker: Option<EntityId>,
    /// Set once the hull reaches 100 damage.
    pub destroyed: bool,
}

impl Ship {
    /// A stationary, undamaged, human-flown ship with no energy.
    #[must_use]
    pub fn new(id: EntityId, owner: OwnerId, class: ClassId, position: Vec2Fixed) -> Self {
        Self {
            id,
            owner,
            class,
            name: format!("Ship {id}"),
            position,
            heading: Fixed::ZERO,
            desired_heading: Fixed::ZERO,
            speed: Fixed::ZERO,
            desired_speed: Fixed::ZERO,
            damage: Fixed::ZERO,
            energy: Fixed::ZERO,
            shield: Shield::default(),
            cloak: 0,
            cooldowns: BTreeMap::new(),
            control: ControlMode::Human,
            self_destruct: None,
            cargo: Cargo::new(),
            systems: Subsystems::default(),
            jammer_ticks: 0,
            cant_exit: 0,
            kills: 0,
            last_attacker: None,
            destroyed: false,
        }
    }

    /// Whether the ship still exists in the world.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.destroyed
    }

    /// Remaining cooldown of a weapon.
    #[must_use]
    pub fn cooldown(&self, weapon: WeaponKind) -> u32 {
        self.cooldowns.get(&weapon).copied().unwrap_or(0)
    }

    /// Whether the ship is flown by an AI.
    #[must_use]
    pub fn is_ai(&self) -> bool {
        !matches!(self.control, ControlMode::Human)
    }

    /// Whether the ship is actively jamming.
    #[must_use]
    pub fn is_jamming(&self) -> bool {
        self.jammer_ticks > 0
    }
}
