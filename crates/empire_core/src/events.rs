//! Events emitted while a tick runs.
//!
//! The event log is ordered exactly as things happened inside the tick and is
//! part of the deterministic output: same inputs, same log.

use serde::{Deserialize, Serialize};

use crate::entities::{AiMode, EntityId, Item, OwnerId, Subsystem, WeaponKind};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Why a fire intent was dropped before the shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbortReason {
    /// Attacker is destroyed, missing or quarantined.
    AttackerGone,
    /// Target is destroyed, missing or quarantined.
    TargetGone,
    /// The class does not mount the weapon.
    NotArmed,
    /// Weapon still cooling down.
    CoolingDown,
    /// Not enough energy for the shot.
    NoEnergy,
    /// No torpedoes or missiles aboard.
    NoAmmo,
    /// Target beyond weapon range.
    OutOfRange,
    /// One of the ships is in the neutral zone.
    NeutralZone,
    /// A ship cannot fire on itself.
    SelfTarget,
}

/// What dealt a given piece of damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageSource {
    /// A ship's weapon.
    Weapon {
        /// Firing ship.
        ship: EntityId,
        /// Weapon used.
        weapon: WeaponKind,
    },
    /// A mine detonation.
    Mine(EntityId),
    /// A self-destruct blast.
    Blast(EntityId),
    /// An unstable wormhole transit.
    Wormhole(EntityId),
    /// Being thrown back from the galaxy edge.
    Zipper,
}

/// Why a planet called for help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distress {
    /// Not enough food for the population.
    Starvation,
}

/// Everything observable that happens during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// A ship changed position.
    ShipMoved {
        /// Ship.
        ship: EntityId,
        /// Position before the move.
        from: Vec2Fixed,
        /// Position after the move.
        to: Vec2Fixed,
    },
    /// A ship hit the galaxy edge in zipper mode and was thrown back.
    ShipZipped {
        /// Ship.
        ship: EntityId,
        /// Where it landed.
        position: Vec2Fixed,
    },
    /// A ship's hull reached 100 damage.
    ShipDestroyed {
        /// Ship.
        ship: EntityId,
        /// Ship credited with the kill.
        by: Option<EntityId>,
    },
    /// A weapon was fired.
    WeaponFired {
        /// Firing ship.
        attacker: EntityId,
        /// Intended target.
        target: EntityId,
        /// Weapon.
        weapon: WeaponKind,
    },
    /// A fired weapon missed.
    WeaponMissed {
        /// Firing ship.
        attacker: EntityId,
        /// Intended target.
        target: EntityId,
        /// Weapon.
        weapon: WeaponKind,
        /// The shot was drawn off by a decoy.
        decoyed: bool,
    },
    /// A fire intent was dropped.
    FireAborted {
        /// Ship that wanted to fire.
        attacker: EntityId,
        /// Intended target.
        target: EntityId,
        /// Weapon.
        weapon: WeaponKind,
        /// Why.
        reason: AbortReason,
    },
    /// Damage landed on a ship.
    DamageDealt {
        /// Ship hit.
        target: EntityId,
        /// What hit it.
        source: DamageSource,
        /// Hull damage taken.
        #[serde(with = "fixed_serde")]
        hull: Fixed,
        /// Damage soaked by shields.
        #[serde(with = "fixed_serde")]
        absorbed: Fixed,
        /// Critical hit.
        critical: bool,
    },
    /// A subsystem was damaged by a heavy hit.
    SystemDamaged {
        /// Ship.
        ship: EntityId,
        /// Subsystem.
        system: Subsystem,
        /// Damage added.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A destroyed ship spilled its cargo.
    CargoDropped {
        /// Ship.
        ship: EntityId,
        /// Where the wreck is.
        position: Vec2Fixed,
        /// Items lost.
        items: Vec<(Item, u32)>,
    },
    /// A self-destruct countdown started.
    SelfDestructArmed {
        /// Ship.
        ship: EntityId,
        /// Combat passes until detonation.
        countdown: u32,
    },
    /// A self-destruct countdown was cancelled.
    SelfDestructAborted {
        /// Ship.
        ship: EntityId,
    },
    /// A ship blew itself up.
    SelfDestructDetonated {
        /// Ship.
        ship: EntityId,
        /// Blast radius.
        #[serde(with = "fixed_serde")]
        radius: Fixed,
    },
    /// A blast hit a planet's garrison.
    PlanetBombarded {
        /// Planet.
        planet: EntityId,
        /// Ship that exploded.
        ship: EntityId,
        /// Percentage of troops, men and fighters lost.
        #[serde(with = "fixed_serde")]
        percent: Fixed,
    },
    /// A mine's timer ran out.
    MineArmed {
        /// Mine.
        mine: EntityId,
    },
    /// A mine went off.
    MineDetonated {
        /// Mine.
        mine: EntityId,
        /// Ship that triggered it.
        trigger: EntityId,
    },
    /// A ship dropped a mine; the caller creates it.
    MineLaid {
        /// Ship.
        ship: EntityId,
        /// Drop point.
        position: Vec2Fixed,
    },
    /// A ship went through a wormhole.
    WormholeTransited {
        /// Wormhole.
        wormhole: EntityId,
        /// Ship.
        ship: EntityId,
    },
    /// A wormhole ran out of stability.
    WormholeCollapsed {
        /// Wormhole.
        wormhole: EntityId,
    },
    /// A ship picked up a beacon broadcast.
    BeaconMessage {
        /// Beacon.
        beacon: EntityId,
        /// Receiving ship.
        ship: EntityId,
        /// Text.
        message: String,
    },
    /// A beacon expired or was switched off.
    BeaconExpired {
        /// Beacon.
        beacon: EntityId,
    },
    /// An AI switched modes.
    AiStateChanged {
        /// Ship.
        ship: EntityId,
        /// Previous mode.
        from: AiMode,
        /// New mode.
        to: AiMode,
    },
    /// Shields fell because the ship ran out of energy.
    ShieldsDropped {
        /// Ship.
        ship: EntityId,
    },
    /// Cloak failed because the ship ran out of energy.
    CloakFailed {
        /// Ship.
        ship: EntityId,
    },
    /// A planet produced goods.
    ItemsProduced {
        /// Planet.
        planet: EntityId,
        /// Item.
        item: Item,
        /// Units added.
        amount: u64,
    },
    /// A planet collected taxes.
    PlanetTaxed {
        /// Planet.
        planet: EntityId,
        /// Tax collected.
        revenue: i64,
        /// Interest charged on debt.
        interest: i64,
        /// Treasury afterwards.
        cash: i64,
    },
    /// A planet's tax rate was cut after repeated debt.
    TaxRateReduced {
        /// Planet.
        planet: EntityId,
        /// Old rate.
        from: u8,
        /// New rate.
        to: u8,
    },
    /// A planet's population changed.
    PopulationChanged {
        /// Planet.
        planet: EntityId,
        /// Old population.
        from: u64,
        /// New population.
        to: u64,
    },
    /// A planet needs help.
    DistressRaised {
        /// Planet.
        planet: EntityId,
        /// Why.
        reason: Distress,
    },
    /// An overtaxed planet threw off its owner.
    PlanetRevolted {
        /// Planet.
        planet: EntityId,
        /// Owner that lost it.
        former_owner: OwnerId,
    },
}

impl WorldEvent {
    /// Short name of the event kind, for summaries.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShipMoved { .. } => "ShipMoved",
            Self::ShipZipped { .. } => "ShipZipped",
            Self::ShipDestroyed { .. } => "ShipDestroyed",
            Self::WeaponFired { .. } => "WeaponFired",
            Self::WeaponMissed { .. } => "WeaponMissed",
            Self::FireAborted { .. } => "FireAborted",
            Self::DamageDealt { .. } => "DamageDealt",
            Self::SystemDamaged { .. } => "SystemDamaged",
            Self::CargoDropped { .. } => "CargoDropped",
            Self::SelfDestructArmed { .. } => "SelfDestructArmed",
            Self::SelfDestructAborted { .. } => "SelfDestructAborted",
            Self::SelfDestructDetonated { .. } => "SelfDestructDetonated",
            Self::PlanetBombarded { .. } => "PlanetBombarded",
            Self::MineArmed { .. } => "MineArmed",
            Self::MineDetonated { .. } => "MineDetonated",
            Self::MineLaid { .. } => "MineLaid",
            Self::WormholeTransited { .. } => "WormholeTransited",
            Self::WormholeCollapsed { .. } => "WormholeCollapsed",
            Self::BeaconMessage { .. } => "BeaconMessage",
            Self::BeaconExpired { .. } => "BeaconExpired",
            Self::AiStateChanged { .. } => "AiStateChanged",
            Self::ShieldsDropped { .. } => "ShieldsDropped",
            Self::CloakFailed { .. } => "CloakFailed",
            Self::ItemsProduced { .. } => "ItemsProduced",
            Self::PlanetTaxed { .. } => "PlanetTaxed",
            Self::TaxRateReduced { .. } => "TaxRateReduced",
            Self::PopulationChanged { .. } => "PopulationChanged",
            Self::DistressRaised { .. } => "DistressRaised",
            Self::PlanetRevolted { .. } => "PlanetRevolted",
        }
    }
}

/// Ordered event log of one tick.
pub type EventLog = Vec<WorldEvent>;
