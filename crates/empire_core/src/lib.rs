//! # Empire Core
//!
//! Deterministic world tick engine for a persistent space-conquest game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (every tick takes a caller-supplied seed)
//! - No floating-point math (uses fixed-point)
//!
//! One call to [`tick::run_tick`] turns a [`snapshot::WorldSnapshot`] into a
//! [`snapshot::WorldDelta`], an ordered event log and a per-entity error
//! report. When ticks run, and what is done with the delta, is up to the
//! caller.
//!
//! ## Crate Structure
//!
//! - [`snapshot`] - World state in, world delta out
//! - [`tick`] - Phase orchestration and metrics
//! - [`validation`] - Repair or quarantine malformed entities
//! - [`intent`] - Commands and AI decisions collected before anything changes
//! - [`upkeep`] - Orders and per-tick ship housekeeping
//! - [`movement`] - Ship physics and galaxy edges
//! - [`combat`] - Weapons, shields, damage, self-destruct
//! - [`ai`] - Cyborg and Droid behavior
//! - [`economy`] - Planet production, taxation, population
//! - [`hazards`] - Mines, wormholes, beacons
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod combat;
pub mod config;
pub mod economy;
pub mod entities;
pub mod error;
pub mod events;
pub mod hazards;
pub mod intent;
pub mod math;
pub mod movement;
pub mod rng;
pub mod snapshot;
pub mod tick;
pub mod upkeep;
pub mod validation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        AiConfig, CombatConfig, EconomyConfig, EngineConfig, HazardConfig, MovementConfig,
        UpkeepConfig,
    };
    pub use crate::entities::*;
    pub use crate::error::{EntityError, ErrorReport, GameError, Result, Severity};
    pub use crate::events::{EventLog, WorldEvent};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::snapshot::{
        BoundaryMode, Command, CommandKind, Galaxy, WorldDelta, WorldSnapshot, Zone,
    };
    pub use crate::tick::{run_tick, run_tick_with, CancelToken, TickKind, TickOutcome};
}
