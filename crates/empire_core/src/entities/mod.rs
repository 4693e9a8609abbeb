//! World entity definitions.
//!
//! Pure data: every type here is plain state with serde support and a few
//! accessors. Behavior lives in the engine modules ([`crate::movement`],
//! [`crate::combat`], [`crate::ai`], [`crate::economy`], [`crate::hazards`]).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

mod control;
mod hazard;
mod planet;
mod ship;

pub use control::{AiMode, ControlMode, CyborgMode, CyborgState, DroidMode, DroidState};
pub use hazard::{Beacon, Mine, Wormhole, BEACON_MESSAGE_MAX};
pub use planet::{ItemStock, Planet};
pub use ship::{
    Shield, ShieldStatus, Ship, ShipClass, Subsystem, Subsystems, WeaponKind, MAX_SHIELD_TYPE,
};

/// Stable identifier of an entity within its kind.
pub type EntityId = u64;

/// Identifier of a player (or of an AI faction).
pub type OwnerId = u64;

/// Identifier of a team.
pub type TeamId = u32;

/// Identifier of a ship class.
pub type ClassId = u16;

/// Typed reference to any world entity.
///
/// Ordering is by kind first, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// A ship.
    Ship(EntityId),
    /// A planet.
    Planet(EntityId),
    /// A mine.
    Mine(EntityId),
    /// A wormhole.
    Wormhole(EntityId),
    /// A beacon.
    Beacon(EntityId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ship(id) => write!(f, "ship#{id}"),
            Self::Planet(id) => write!(f, "planet#{id}"),
            Self::Mine(id) => write!(f, "mine#{id}"),
            Self::Wormhole(id) => write!(f, "wormhole#{id}"),
            Self::Beacon(id) => write!(f, "beacon#{id}"),
        }
    }
}

/// The fourteen tradeable item types.
///
/// Planets stock and produce all of them; ships carry some as cargo
/// (torpedoes, missiles, mines, decoys, jammers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Item {
    /// Crew and workers available for recruitment.
    Men,
    /// Guided missiles.
    Missile,
    /// Photon torpedoes.
    Torpedo,
    /// Ion cannon batteries.
    IonCannon,
    /// Flux pods (energy reserves).
    FluxPod,
    /// Food.
    Food,
    /// Fighters.
    Fighter,
    /// Decoys that spoof guided weapons.
    Decoy,
    /// Garrison troops.
    Troops,
    /// Zippers.
    Zipper,
    /// Sensor jammers.
    Jammer,
    /// Space mines.
    Mine,
    /// Gold.
    Gold,
    /// Spies.
    Spy,
}

impl Item {
    /// Number of item types.
    pub const COUNT: usize = 14;

    /// All item types in index order.
    pub const ALL: [Item; Item::COUNT] = [
        Item::Men,
        Item::Missile,
        Item::Torpedo,
        Item::IonCannon,
        Item::FluxPod,
        Item::Food,
        Item::Fighter,
        Item::Decoy,
        Item::Troops,
        Item::Zipper,
        Item::Jammer,
        Item::Mine,
        Item::Gold,
        Item::Spy,
    ];

    /// Position of this item in [`Item::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Items carried aboard a ship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cargo {
    items: BTreeMap<Item, u32>,
}

impl Cargo {
    /// Create empty cargo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper to load items.
    #[must_use]
    pub fn with(mut self, item: Item, count: u32) -> Self {
        self.add(item, count);
        self
    }

    /// Count of an item aboard.
    #[must_use]
    pub fn count(&self, item: Item) -> u32 {
        self.items.get(&item).copied().unwrap_or(0)
    }

    /// Add items.
    pub fn add(&mut self, item: Item, count: u32) {
        if count == 0 {
            return;
        }
        let entry = self.items.entry(item).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Remove `count` items if that many are aboard.
    ///
    /// Returns `false` and leaves the cargo untouched otherwise.
    pub fn take(&mut self, item: Item, count: u32) -> bool {
        let have = self.count(item);
        if have < count {
            return false;
        }
        if have == count {
            self.items.remove(&item);
        } else {
            self.items.insert(item, have - count);
        }
        true
    }

    /// Empty the hold, returning what was aboard.
    pub fn drain(&mut self) -> BTreeMap<Item, u32> {
        std::mem::take(&mut self.items)
    }

    /// Whether nothing is aboard.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A team (alliance) of players.
///
/// Read-only during a tick; score changes are reported in the delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team id.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// Member player ids.
    pub members: BTreeSet<OwnerId>,
    /// Aggregate score.
    pub score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_index_matches_all() {
        for (i, item) in Item::ALL.iter().enumerate() {
            assert_eq!(item.index(), i);
        }
    }

    #[test]
    fn test_cargo_take_is_all_or_nothing() {
        let mut cargo = Cargo::new().with(Item::Torpedo, 2);
        assert!(!cargo.take(Item::Torpedo, 3));
        assert_eq!(cargo.count(Item::Torpedo), 2);
        assert!(cargo.take(Item::Torpedo, 2));
        assert!(cargo.is_empty());
    }

    #[test]
    fn test_entity_ref_ordering() {
        assert!(EntityRef::Ship(9) < EntityRef::Planet(1));
        assert!(EntityRef::Ship(1) < EntityRef::Ship(2));
    }
}
