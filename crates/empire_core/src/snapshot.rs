//! World snapshot in, world delta out.
//!
//! A [`WorldSnapshot`] is everything one tick may read. The engine never
//! mutates it; instead it returns a [`WorldDelta`] describing what changed.
//! The persistence layer commits the delta atomically; [`WorldSnapshot::apply`]
//! folds a delta back into a snapshot for callers that keep state in memory
//! (the headless runner and tests).
//!
//! # Determinism
//!
//! Every collection is a `BTreeMap`, `BTreeSet` or `Vec`, so the `bincode`
//! encoding of a snapshot or delta depends only on its contents.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::entities::{
    Beacon, ClassId, EntityId, EntityRef, Mine, OwnerId, Planet, Ship, ShipClass, Team, TeamId,
    WeaponKind, Wormhole,
};
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Galactic units per sector.
pub const SECTOR_SIZE: u32 = 10_000;

/// What happens when a ship crosses the galaxy edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BoundaryMode {
    /// Toroidal: leaving one edge re-enters at the opposite edge.
    #[default]
    Wrap,
    /// Zipper: the ship is thrown back inside, stopped and damaged.
    Zipper,
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    /// Lower corner (inclusive).
    pub min: Vec2Fixed,
    /// Upper corner (exclusive).
    pub max: Vec2Fixed,
}

impl Zone {
    /// Whether `pos` lies inside the zone.
    #[must_use]
    pub fn contains(&self, pos: Vec2Fixed) -> bool {
        pos.x >= self.min.x && pos.x < self.max.x && pos.y >= self.min.y && pos.y < self.max.y
    }
}

/// Galaxy geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Galaxy {
    /// Width in galactic units.
    pub width: u32,
    /// Height in galactic units.
    pub height: u32,
    /// Edge behavior.
    pub boundary: BoundaryMode,
    /// Region where combat is forbidden and self-destructs are disarmed.
    pub neutral_zone: Option<Zone>,
}

impl Default for Galaxy {
    /// The classic 30 x 15 sector galaxy.
    fn default() -> Self {
        Self {
            width: 30 * SECTOR_SIZE,
            height: 15 * SECTOR_SIZE,
            boundary: BoundaryMode::Wrap,
            neutral_zone: None,
        }
    }
}

fn wrap_axis(value: Fixed, size: Fixed) -> Fixed {
    let r = value % size;
    if r < Fixed::ZERO {
        r + size
    } else {
        r
    }
}

fn shortest_axis(delta: Fixed, size: Fixed) -> Fixed {
    let half = size / Fixed::from_num(2);
    let d = wrap_axis(delta, size);
    if d > half {
        d - size
    } else {
        d
    }
}

impl Galaxy {
    /// Width as a fixed-point value.
    #[must_use]
    pub fn width_fixed(&self) -> Fixed {
        Fixed::saturating_from_num(self.width.max(1))
    }

    /// Height as a fixed-point value.
    #[must_use]
    pub fn height_fixed(&self) -> Fixed {
        Fixed::saturating_from_num(self.height.max(1))
    }

    /// Whether `pos` lies in `[0, W) x [0, H)`.
    #[must_use]
    pub fn contains(&self, pos: Vec2Fixed) -> bool {
        pos.x >= Fixed::ZERO
            && pos.y >= Fixed::ZERO
            && pos.x < self.width_fixed()
            && pos.y < self.height_fixed()
    }

    /// Wrap a position onto the torus.
    #[must_use]
    pub fn wrap(&self, pos: Vec2Fixed) -> Vec2Fixed {
        Vec2Fixed::new(
            wrap_axis(pos.x, self.width_fixed()),
            wrap_axis(pos.y, self.height_fixed()),
        )
    }

    /// Offset from `from` to `to`, taking the short way round a wrapping galaxy.
    #[must_use]
    pub fn offset(&self, from: Vec2Fixed, to: Vec2Fixed) -> Vec2Fixed {
        let raw = to - from;
        match self.boundary {
            BoundaryMode::Wrap => Vec2Fixed::new(
                shortest_axis(raw.x, self.width_fixed()),
                shortest_axis(raw.y, self.height_fixed()),
            ),
            BoundaryMode::Zipper => raw,
        }
    }

    /// Distance between two points.
    #[must_use]
    pub fn distance(&self, a: Vec2Fixed, b: Vec2Fixed) -> Fixed {
        self.offset(a, b).length()
    }

    /// Whether `pos` is inside the neutral zone.
    #[must_use]
    pub fn is_neutral(&self, pos: Vec2Fixed) -> bool {
        self.neutral_zone.is_some_and(|zone| zone.contains(pos))
    }
}

/// A player order queued for the next ship tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Ship receiving the order.
    pub ship: EntityId,
    /// Order of issue for this ship; lower runs first.
    pub seq: u32,
    /// The order itself.
    pub kind: CommandKind,
}

/// Player orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Set desired heading and speed.
    SetCourse {
        /// Desired heading in degrees.
        #[serde(with = "fixed_serde")]
        heading: Fixed,
        /// Desired speed.
        #[serde(with = "fixed_serde")]
        speed: Fixed,
    },
    /// Fire a weapon at a ship.
    Fire {
        /// Weapon to fire.
        weapon: WeaponKind,
        /// Target ship.
        target: EntityId,
    },
    /// Raise shields.
    RaiseShields,
    /// Lower shields.
    LowerShields,
    /// Set cloak level (0 decloaks).
    Cloak {
        /// Requested level.
        level: u8,
    },
    /// Start the self-destruct countdown.
    ArmSelfDestruct,
    /// Cancel the self-destruct countdown.
    AbortSelfDestruct,
    /// Drop a mine from cargo at the current position.
    LayMine,
    /// Burn a jammer from cargo.
    Jam,
}

/// Everything a tick may read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Tick number this snapshot will be advanced from.
    pub tick: u64,
    /// Wall-clock time in seconds, supplied by the caller.
    pub now: u64,
    /// Galaxy geometry.
    pub galaxy: Galaxy,
    /// Ship class table.
    pub classes: BTreeMap<ClassId, ShipClass>,
    /// Ships by id.
    pub ships: BTreeMap<EntityId, Ship>,
    /// Planets by id.
    pub planets: BTreeMap<EntityId, Planet>,
    /// Mines by id.
    pub mines: BTreeMap<EntityId, Mine>,
    /// Wormholes by id.
    pub wormholes: BTreeMap<EntityId, Wormhole>,
    /// Beacons by id.
    pub beacons: BTreeMap<EntityId, Beacon>,
    /// Teams by id.
    pub teams: BTreeMap<TeamId, Team>,
    /// Player orders for the next ship tick.
    pub commands: Vec<Command>,
    /// Entities excluded from processing until repaired.
    pub quarantine: BTreeSet<EntityRef>,
}

impl WorldSnapshot {
    /// Empty world with the given geometry.
    #[must_use]
    pub fn new(galaxy: Galaxy) -> Self {
        Self {
            galaxy,
            ..Self::default()
        }
    }

    /// Team of a player (lowest team id if listed twice).
    #[must_use]
    pub fn team_of(&self, owner: OwnerId) -> Option<TeamId> {
        self.teams
            .values()
            .find(|team| team.members.contains(&owner))
            .map(|team| team.id)
    }

    /// Whether two owners are enemies: different players on different teams.
    #[must_use]
    pub fn are_hostile(&self, a: OwnerId, b: OwnerId) -> bool {
        if a == b {
            return false;
        }
        match (self.team_of(a), self.team_of(b)) {
            (Some(ta), Some(tb)) => ta != tb,
            _ => true,
        }
    }

    /// Whether an entity is quarantined.
    #[must_use]
    pub fn is_quarantined(&self, entity: EntityRef) -> bool {
        self.quarantine.contains(&entity)
    }

    /// Fold a delta into this snapshot.
    pub fn apply(&mut self, delta: &WorldDelta) {
        for (id, ship) in &delta.ships {
            self.ships.insert(*id, ship.clone());
        }
        for id in &delta.destroyed_ships {
            self.ships.remove(id);
        }
        for (id, planet) in &delta.planets {
            self.planets.insert(*id, planet.clone());
        }
        for (id, mine) in &delta.mines {
            self.mines.insert(*id, mine.clone());
        }
        for id in &delta.removed_mines {
            self.mines.remove(id);
        }
        let mut next_mine = self.mines.keys().next_back().map_or(1, |id| id + 1);
        for spawn in &delta.spawned_mines {
            self.mines.insert(next_mine, spawn.to_mine(next_mine));
            next_mine += 1;
        }
        for (id, wormhole) in &delta.wormholes {
            self.wormholes.insert(*id, wormhole.clone());
        }
        for id in &delta.collapsed_wormholes {
            self.wormholes.remove(id);
        }
        for id in &delta.removed_beacons {
            self.beacons.remove(id);
        }
        for (team_id, points) in &delta.team_scores {
            if let Some(team) = self.teams.get_mut(team_id) {
                team.score += points;
            }
        }
        if !delta.consumed_commands.is_empty() {
            self.commands
                .retain(|cmd| !delta.consumed_commands.contains(&(cmd.ship, cmd.seq)));
        }
        self.quarantine.extend(delta.quarantined.iter().copied());
        self.tick = delta.next_tick;
        self.now = self.now.max(delta.now);
    }

    /// Canonical byte encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to encode snapshot: {e}")))
    }

    /// Decode from [`WorldSnapshot::to_bytes`] output.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::Serialization(format!("Failed to decode snapshot: {e}")))
    }

    /// Hash of the canonical encoding.
    pub fn state_hash(&self) -> Result<u64> {
        Ok(hash_bytes(&self.to_bytes()?))
    }
}

/// A mine the tick wants created; the caller assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineSpawn {
    /// Ship that laid it.
    pub laid_by: EntityId,
    /// Owner of the new mine.
    pub owner: OwnerId,
    /// Where it was dropped.
    pub position: Vec2Fixed,
    /// Ticks until it arms.
    pub timer: u32,
    /// Detonation damage.
    #[serde(with = "fixed_serde")]
    pub damage_potential: Fixed,
}

impl MineSpawn {
    /// Materialize the mine under `id`.
    #[must_use]
    pub fn to_mine(&self, id: EntityId) -> Mine {
        Mine {
            id,
            owner: self.owner,
            position: self.position,
            timer: self.timer,
            damage_potential: self.damage_potential,
            stealth: false,
            armed: self.timer == 0,
        }
    }
}

/// Side effects a tick hands to the caller instead of applying itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TickLedger {
    /// Mines to create.
    pub spawned_mines: Vec<MineSpawn>,
    /// Score per player.
    pub owner_scores: BTreeMap<OwnerId, i64>,
    /// Score per team.
    pub team_scores: BTreeMap<TeamId, i64>,
    /// Commands executed.
    pub consumed_commands: BTreeSet<(EntityId, u32)>,
}

impl TickLedger {
    /// Award `points` to a player and their team.
    pub fn credit(&mut self, world: &WorldSnapshot, owner: OwnerId, points: i64) {
        *self.owner_scores.entry(owner).or_default() += points;
        if let Some(team) = world.team_of(owner) {
            *self.team_scores.entry(team).or_default() += points;
        }
    }

    /// Move everything into `delta`.
    pub fn settle(self, delta: &mut WorldDelta) {
        delta.spawned_mines = self.spawned_mines;
        delta.owner_scores = self.owner_scores;
        delta.team_scores = self.team_scores;
        delta.consumed_commands = self.consumed_commands;
    }
}

/// Everything one tick changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldDelta {
    /// Tick the snapshot should carry after applying this delta.
    pub next_tick: u64,
    /// Wall-clock time the tick ran at.
    pub now: u64,
    /// Post-tick state of every ship that changed.
    pub ships: BTreeMap<EntityId, Ship>,
    /// Ships destroyed this tick.
    pub destroyed_ships: BTreeSet<EntityId>,
    /// Post-tick state of every planet that changed.
    pub planets: BTreeMap<EntityId, Planet>,
    /// Post-tick state of every mine that changed.
    pub mines: BTreeMap<EntityId, Mine>,
    /// Mines that detonated.
    pub removed_mines: BTreeSet<EntityId>,
    /// Mines laid this tick.
    pub spawned_mines: Vec<MineSpawn>,
    /// Post-tick state of every wormhole that changed.
    pub wormholes: BTreeMap<EntityId, Wormhole>,
    /// Wormholes that collapsed.
    pub collapsed_wormholes: BTreeSet<EntityId>,
    /// Beacons that expired.
    pub removed_beacons: BTreeSet<EntityId>,
    /// Commands executed (ship, seq).
    pub consumed_commands: BTreeSet<(EntityId, u32)>,
    /// Score awarded per player.
    pub owner_scores: BTreeMap<OwnerId, i64>,
    /// Score awarded per team.
    pub team_scores: BTreeMap<TeamId, i64>,
    /// Entities newly quarantined.
    pub quarantined: BTreeSet<EntityRef>,
}

impl WorldDelta {
    /// Whether the tick changed nothing but the tick counter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
            && self.destroyed_ships.is_empty()
            && self.planets.is_empty()
            && self.mines.is_empty()
            && self.removed_mines.is_empty()
            && self.spawned_mines.is_empty()
            && self.wormholes.is_empty()
            && self.collapsed_wormholes.is_empty()
            && self.removed_beacons.is_empty()
            && self.consumed_commands.is_empty()
            && self.owner_scores.is_empty()
            && self.team_scores.is_empty()
            && self.quarantined.is_empty()
    }

    /// Canonical byte encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to encode delta: {e}")))
    }

    /// Decode from [`WorldDelta::to_bytes`] output.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::Serialization(format!("Failed to decode delta: {e}")))
    }

    /// Hash of the canonical encoding.
    pub fn hash(&self) -> Result<u64> {
        Ok(hash_bytes(&self.to_bytes()?))
    }

    /// Build the delta between the snapshot a tick started from and the
    /// working state it ended with.
    pub(crate) fn between(before: &WorldSnapshot, after: &WorldSnapshot) -> Self {
        let mut delta = Self {
            next_tick: before.tick + 1,
            now: before.now,
            ..Self::default()
        };

        for (id, ship) in &after.ships {
            if before.ships.get(id) != Some(ship) {
                delta.ships.insert(*id, ship.clone());
            }
            if ship.destroyed && before.ships.get(id).map_or(true, |s| !s.destroyed) {
                delta.destroyed_ships.insert(*id);
            }
        }
        for (id, planet) in &after.planets {
            if before.planets.get(id) != Some(planet) {
                delta.planets.insert(*id, planet.clone());
            }
        }
        for (id, mine) in &after.mines {
            if before.mines.get(id) != Some(mine) {
                delta.mines.insert(*id, mine.clone());
            }
        }
        delta.removed_mines = removed_keys(&before.mines, &after.mines);
        for (id, wormhole) in &after.wormholes {
            if before.wormholes.get(id) != Some(wormhole) {
                delta.wormholes.insert(*id, wormhole.clone());
            }
        }
        delta.collapsed_wormholes = removed_keys(&before.wormholes, &after.wormholes);
        delta.removed_beacons = removed_keys(&before.beacons, &after.beacons);
        delta.quarantined = after
            .quarantine
            .difference(&before.quarantine)
            .copied()
            .collect();
        delta
    }
}

fn removed_keys<V>(
    before: &BTreeMap<EntityId, V>,
    after: &BTreeMap<EntityId, V>,
) -> BTreeSet<EntityId> {
    before
        .keys()
        .filter(|id| !after.contains_key(id))
        .copied()
        .collect()
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_wrap_east_edge() {
        let galaxy = Galaxy {
            width: 1000,
            height: 500,
            ..Galaxy::default()
        };
        let pos = Vec2Fixed::new(units(999 + 2), units(10));
        assert_eq!(galaxy.wrap(pos), Vec2Fixed::new(units(1), units(10)));
        let neg = Vec2Fixed::new(units(-3), units(-1));
        assert_eq!(galaxy.wrap(neg), Vec2Fixed::new(units(997), units(499)));
    }

    #[test]
    fn test_oversized_galaxy_saturates() {
        let galaxy = Galaxy {
            width: u32::MAX,
            height: u32::MAX,
            ..Galaxy::default()
        };
        assert_eq!(galaxy.width_fixed(), Fixed::MAX);
        let far = Vec2Fixed::new(units(i32::MAX - 1), units(10));
        assert!(galaxy.contains(far));
        assert_eq!(galaxy.wrap(far), far);
    }

    #[test]
    fn test_offset_takes_short_way_round() {
        let galaxy = Galaxy {
            width: 1000,
            height: 1000,
            ..Galaxy::default()
        };
        let a = Vec2Fixed::from_units(990, 500);
        let b = Vec2Fixed::from_units(10, 500);
        assert_eq!(galaxy.offset(a, b), Vec2Fixed::from_units(20, 0));
        assert_eq!(galaxy.distance(a, b), units(20));

        let walled = Galaxy {
            boundary: BoundaryMode::Zipper,
            ..galaxy
        };
        assert_eq!(walled.distance(a, b), units(980));
    }

    #[test]
    fn test_hostility_respects_teams() {
        let mut world = WorldSnapshot::default();
        world.teams.insert(
            1,
            Team {
                id: 1,
                name: "Blue".into(),
                members: [10, 11].into_iter().collect(),
                score: 0,
            },
        );
        assert!(!world.are_hostile(10, 10));
        assert!(!world.are_hostile(10, 11));
        assert!(world.are_hostile(10, 12));
        assert!(world.are_hostile(12, 13));
    }

    #[test]
    fn test_neutral_zone() {
        let galaxy = Galaxy {
            neutral_zone: Some(Zone {
                min: Vec2Fixed::from_units(100, 100),
                max: Vec2Fixed::from_units(200, 200),
            }),
            ..Galaxy::default()
        };
        assert!(galaxy.is_neutral(Vec2Fixed::from_units(150, 150)));
        assert!(!galaxy.is_neutral(Vec2Fixed::from_units(200, 150)));
    }

    #[test]
    fn test_ledger_credits_owner_and_team() {
        let mut world = WorldSnapshot::default();
        world.teams.insert(
            2,
            Team {
                id: 2,
                name: "Red".into(),
                members: [7].into_iter().collect(),
                score: 10,
            },
        );
        let mut ledger = TickLedger::default();
        ledger.credit(&world, 7, 150);
        ledger.credit(&world, 8, 40);
        let mut delta = WorldDelta::default();
        ledger.settle(&mut delta);
        assert_eq!(delta.owner_scores[&7], 150);
        assert_eq!(delta.owner_scores[&8], 40);
        assert_eq!(delta.team_scores[&2], 150);

        world.apply(&delta);
        assert_eq!(world.teams[&2].score, 160);
    }

    #[test]
    fn test_empty_delta_between_identical_snapshots() {
        let world = WorldSnapshot::default();
        let delta = WorldDelta::between(&world, &world);
        assert!(delta.is_empty());
        assert_eq!(delta.next_tick, 1);
    }

    #[test]
    fn test_apply_assigns_spawned_mine_ids_after_existing() {
        let mut world = WorldSnapshot::default();
        world.mines.insert(
            4,
            MineSpawn {
                laid_by: 1,
                owner: 1,
                position: Vec2Fixed::ZERO,
                timer: 0,
                damage_potential: units(100),
            }
            .to_mine(4),
        );
        let delta = WorldDelta {
            next_tick: 1,
            spawned_mines: vec![MineSpawn {
                laid_by: 2,
                owner: 2,
                position: Vec2Fixed::from_units(5, 5),
                timer: 3,
                damage_potential: units(100),
            }],
            ..WorldDelta::default()
        };
        world.apply(&delta);
        assert_eq!(world.mines.len(), 2);
        let spawned = &world.mines[&5];
        assert_eq!(spawned.owner, 2);
        assert!(!spawned.armed);
        assert_eq!(world.tick, 1);
    }
}
