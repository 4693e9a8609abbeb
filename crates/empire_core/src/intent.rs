//! Intents: what ships want to do this tick.
//!
//! Intents are gathered from the read-only snapshot (player commands first,
//! then AI decisions) and only then applied. Nothing here touches the world.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::{ControlMode, EntityId, EntityRef, WeaponKind};
use crate::math::{fixed_serde, Fixed};
use crate::snapshot::{CommandKind, WorldSnapshot};

/// Who produced an intent. Orders combat resolution: earlier variants go first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntentOrigin {
    /// A queued player command.
    Command,
    /// An AI decision.
    Ai,
    /// A mine going off.
    Mine,
}

/// Desired heading and speed for a ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseIntent {
    /// Producer.
    pub origin: IntentOrigin,
    /// Desired heading in degrees.
    #[serde(with = "fixed_serde")]
    pub heading: Fixed,
    /// Desired speed.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
}

/// Non-combat orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipAction {
    /// Raise shields.
    RaiseShields,
    /// Lower shields.
    LowerShields,
    /// Set cloak level.
    Cloak(u8),
    /// Start self-destruct.
    ArmSelfDestruct,
    /// Cancel self-destruct.
    AbortSelfDestruct,
    /// Drop a mine.
    LayMine,
    /// Run a jammer.
    Jam,
}

impl ShipAction {
    /// The action a player command asks for, if it is not a course or a shot.
    #[must_use]
    pub fn from_command(kind: &CommandKind) -> Option<Self> {
        match *kind {
            CommandKind::RaiseShields => Some(Self::RaiseShields),
            CommandKind::LowerShields => Some(Self::LowerShields),
            CommandKind::Cloak { level } => Some(Self::Cloak(level)),
            CommandKind::ArmSelfDestruct => Some(Self::ArmSelfDestruct),
            CommandKind::AbortSelfDestruct => Some(Self::AbortSelfDestruct),
            CommandKind::LayMine => Some(Self::LayMine),
            CommandKind::Jam => Some(Self::Jam),
            CommandKind::SetCourse { .. } | CommandKind::Fire { .. } => None,
        }
    }
}

/// An order for one ship, tagged with its place in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionIntent {
    /// Producer.
    pub origin: IntentOrigin,
    /// Global sequence number.
    pub seq: u32,
    /// Ship.
    pub ship: EntityId,
    /// Order.
    pub action: ShipAction,
}

/// Something combat must resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatIntent {
    /// A ship fires a weapon.
    Fire {
        /// Producer.
        origin: IntentOrigin,
        /// Global sequence number.
        seq: u32,
        /// Firing ship.
        attacker: EntityId,
        /// Target ship.
        target: EntityId,
        /// Weapon.
        weapon: WeaponKind,
    },
    /// A mine detonation reaching one ship.
    MineDetonation {
        /// Mine.
        mine: EntityId,
        /// Ship in the blast.
        target: EntityId,
        /// Hull damage before shields.
        #[serde(with = "fixed_serde")]
        damage: Fixed,
    },
}

impl CombatIntent {
    /// Resolution order key: origin, then sequence or mine id, then target.
    #[must_use]
    pub fn sort_key(&self) -> (IntentOrigin, u64, EntityId) {
        match *self {
            Self::Fire {
                origin,
                seq,
                target,
                ..
            } => (origin, u64::from(seq), target),
            Self::MineDetonation { mine, target, .. } => (IntentOrigin::Mine, mine, target),
        }
    }
}

/// All intents collected for a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentQueue {
    courses: BTreeMap<EntityId, CourseIntent>,
    actions: Vec<ActionIntent>,
    combat: Vec<CombatIntent>,
    ai_states: BTreeMap<EntityId, ControlMode>,
    consumed: Vec<(EntityId, u32)>,
    next_seq: u32,
}

impl IntentQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn take_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Queue every player command for ships that are not quarantined, in
    /// per-ship sequence order. Commands stay queued for quarantined ships.
    pub fn collect_commands(&mut self, world: &WorldSnapshot) {
        let mut commands: Vec<_> = world
            .commands
            .iter()
            .filter(|cmd| !world.is_quarantined(EntityRef::Ship(cmd.ship)))
            .collect();
        commands.sort_by_key(|cmd| (cmd.ship, cmd.seq));

        for cmd in commands {
            self.consumed.push((cmd.ship, cmd.seq));
            // Orders for ships that no longer exist are dropped.
            if !world.ships.contains_key(&cmd.ship) {
                continue;
            }
            let origin = IntentOrigin::Command;
            match cmd.kind {
                CommandKind::SetCourse { heading, speed } => {
                    self.push_course(cmd.ship, origin, heading, speed);
                }
                CommandKind::Fire { weapon, target } => {
                    self.push_fire(origin, cmd.ship, target, weapon);
                }
                ref other => {
                    if let Some(action) = ShipAction::from_command(other) {
                        self.push_action(origin, cmd.ship, action);
                    }
                }
            }
        }
    }

    /// Request a course. The first course queued for a ship wins, so player
    /// orders override the AI.
    pub fn push_course(
        &mut self,
        ship: EntityId,
        origin: IntentOrigin,
        heading: Fixed,
        speed: Fixed,
    ) {
        self.courses.entry(ship).or_insert(CourseIntent {
            origin,
            heading,
            speed,
        });
    }

    /// Request a shot.
    pub fn push_fire(
        &mut self,
        origin: IntentOrigin,
        attacker: EntityId,
        target: EntityId,
        weapon: WeaponKind,
    ) {
        let seq = self.take_seq();
        self.combat.push(CombatIntent::Fire {
            origin,
            seq,
            attacker,
            target,
            weapon,
        });
    }

    /// Request a non-combat action.
    pub fn push_action(&mut self, origin: IntentOrigin, ship: EntityId, action: ShipAction) {
        let seq = self.take_seq();
        self.actions.push(ActionIntent {
            origin,
            seq,
            ship,
            action,
        });
    }

    /// Record the AI state a ship will carry after this tick.
    pub fn set_ai_state(&mut self, ship: EntityId, state: ControlMode) {
        self.ai_states.insert(ship, state);
    }

    /// Queue a mine detonation.
    pub fn push_detonation(&mut self, mine: EntityId, target: EntityId, damage: Fixed) {
        self.combat.push(CombatIntent::MineDetonation {
            mine,
            target,
            damage,
        });
    }

    /// Course requests by ship.
    #[must_use]
    pub fn courses(&self) -> &BTreeMap<EntityId, CourseIntent> {
        &self.courses
    }

    /// Actions in queue order.
    #[must_use]
    pub fn actions(&self) -> &[ActionIntent] {
        &self.actions
    }

    /// New AI states by ship.
    #[must_use]
    pub fn ai_states(&self) -> &BTreeMap<EntityId, ControlMode> {
        &self.ai_states
    }

    /// Commands turned into intents, as (ship, seq).
    #[must_use]
    pub fn consumed(&self) -> &[(EntityId, u32)] {
        &self.consumed
    }

    /// Remove and return combat intents in resolution order.
    pub fn take_combat(&mut self) -> Vec<CombatIntent> {
        let mut combat = std::mem::take(&mut self.combat);
        combat.sort_by_key(CombatIntent::sort_key);
        combat
    }

    /// Remove and return only the queued mine detonations, in resolution
    /// order. Fire intents stay queued.
    pub fn take_detonations(&mut self) -> Vec<CombatIntent> {
        let (mut detonations, fire): (Vec<_>, Vec<_>) = std::mem::take(&mut self.combat)
            .into_iter()
            .partition(|intent| matches!(intent, CombatIntent::MineDetonation { .. }));
        self.combat = fire;
        detonations.sort_by_key(CombatIntent::sort_key);
        detonations
    }

    /// Number of intents queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.courses.len() + self.actions.len() + self.combat.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
