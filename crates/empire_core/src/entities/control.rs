//! Who flies a ship, and the AI state carried with it.

use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::math::Vec2Fixed;

/// Control mode of a ship.
///
/// AI state travels inside the variant, so a human ship can never carry
/// stale AI bookkeeping and an AI ship always has exactly one state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ControlMode {
    /// Flown by a player through queued commands.
    #[default]
    Human,
    /// Flown by the aggressive Cyborg faction AI.
    CyborgAi(CyborgState),
    /// Flown by the methodical Droid faction AI.
    DroidAi(DroidState),
}

impl ControlMode {
    /// Current AI mode, if AI controlled.
    #[must_use]
    pub fn ai_mode(&self) -> Option<AiMode> {
        match self {
            Self::Human => None,
            Self::CyborgAi(state) => Some(AiMode::Cyborg(state.mode)),
            Self::DroidAi(state) => Some(AiMode::Droid(state.mode)),
        }
    }
}

/// Cyborg behavior states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CyborgMode {
    /// Cruise on random courses looking for prey.
    #[default]
    Patrol,
    /// Close on and fire at a target.
    Engage,
    /// Flee while damaged.
    Retreat,
    /// Lay mines while nothing is in sight.
    MineLay,
}

/// Cyborg state machine data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CyborgState {
    /// Current mode.
    pub mode: CyborgMode,
    /// Locked target.
    pub target: Option<EntityId>,
    /// Ticks left on the current patrol course, or until the next mine.
    pub hold_course: u32,
}

/// Droid behavior states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DroidMode {
    /// Fly square legs around home.
    #[default]
    Patrol,
    /// Guard home against an intruder.
    Defend,
    /// Pursue a hostile ship.
    Hunt,
    /// Hold still to recover energy.
    Rest,
    /// Spend energy to repair the hull.
    SelfRepair,
}

/// Droid state machine data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroidState {
    /// Current mode.
    pub mode: DroidMode,
    /// Held target.
    pub target: Option<EntityId>,
    /// Point the droid patrols and defends.
    pub home: Vec2Fixed,
    /// Ticks since the last scheduled re-evaluation.
    pub update_counter: u32,
    /// Current patrol leg (0-3).
    pub patrol_leg: u8,
}

impl DroidState {
    /// New droid state anchored at `home`.
    #[must_use]
    pub fn new(home: Vec2Fixed) -> Self {
        Self {
            mode: DroidMode::Patrol,
            target: None,
            home,
            update_counter: 0,
            patrol_leg: 0,
        }
    }
}

/// Faction-qualified AI mode, used in events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiMode {
    /// A cyborg mode.
    Cyborg(CyborgMode),
    /// A droid mode.
    Droid(DroidMode),
}
