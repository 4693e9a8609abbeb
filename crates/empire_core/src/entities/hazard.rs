//! Mines, wormholes and beacons.

use serde::{Deserialize, Serialize};

use super::{EntityId, OwnerId};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Longest beacon message, in characters.
pub const BEACON_MESSAGE_MAX: usize = 75;

/// A space mine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mine {
    /// Unique mine id.
    pub id: EntityId,
    /// Player who laid it.
    pub owner: OwnerId,
    /// Position in the galaxy.
    pub position: Vec2Fixed,
    /// Ticks until the mine arms.
    pub timer: u32,
    /// Hull damage dealt on detonation, before shields.
    #[serde(with = "fixed_serde")]
    pub damage_potential: Fixed,
    /// Stealth mines cannot be picked up by ship sensors.
    pub stealth: bool,
    /// Whether the mine is live.
    pub armed: bool,
}

/// A wormhole linking two points of the galaxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wormhole {
    /// Unique wormhole id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Mouth ships fly into.
    pub entry: Vec2Fixed,
    /// Where transiting ships emerge.
    pub exit: Vec2Fixed,
    /// Stability (0-100); unstable wormholes batter transiting hulls.
    pub stability: u8,
    /// Minimum approach speed, also paid in energy on transit.
    #[serde(with = "fixed_serde")]
    pub energy_required: Fixed,
    /// Completed transits.
    pub usage_count: u64,
    /// Wall-clock second of the latest transit.
    pub last_used: Option<u64>,
}

/// A navigation beacon broadcasting a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    /// Unique beacon id.
    pub id: EntityId,
    /// Player who deployed it.
    pub owner: OwnerId,
    /// Position in the galaxy.
    pub position: Vec2Fixed,
    /// Broadcast text.
    pub message: String,
    /// Wall-clock second after which the beacon is removed.
    pub expires_at: Option<u64>,
    /// Inactive beacons are removed on the next ship tick.
    pub active: bool,
}

impl Beacon {
    /// Whether the beacon has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        !self.active || self.expires_at.is_some_and(|at| at <= now)
    }
}
