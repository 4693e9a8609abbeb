//! Test fixtures and helpers.
//!
//! Pre-built ship classes, ships, planets and whole galaxies for
//! consistent testing.

use empire_core::entities::{
    Beacon, Cargo, ClassId, ControlMode, CyborgState, DroidState, EntityId, Item, ItemStock, Mine,
    OwnerId, Planet, Ship, ShipClass, Team, WeaponKind, Wormhole,
};
use empire_core::error::{GameError, Result};
use empire_core::math::Vec2Fixed;
use empire_core::snapshot::{Galaxy, WorldSnapshot};
use fixed::types::I32F32;

/// Class id of [`cruiser_class`] in fixture worlds.
pub const CRUISER: ClassId = 1;
/// Class id of [`raider_class`] in fixture worlds.
pub const RAIDER: ClassId = 2;
/// Class id of [`sentry_class`] in fixture worlds.
pub const SENTRY: ClassId = 3;

/// Owner id used for cyborg ships.
pub const CYBORG_OWNER: OwnerId = 900;
/// Owner id used for droid ships.
pub const DROID_OWNER: OwnerId = 901;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Position from whole galactic units.
#[must_use]
pub fn at(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_units(x, y)
}

/// General-purpose player warship.
#[must_use]
pub fn cruiser_class() -> ShipClass {
    ShipClass {
        name: "Heavy Cruiser".into(),
        max_speed: fixed(2000),
        max_acceleration: fixed(2),
        max_turn_rate: fixed(15),
        max_energy: fixed(5000),
        energy_regen: fixed(20),
        max_shield_type: 10,
        armament: [WeaponKind::Phaser, WeaponKind::Torpedo, WeaponKind::Missile]
            .into_iter()
            .collect(),
        damage_factor: 90,
        repair_rate: fixed(2),
        scan_range: fixed(100_000),
        sensor_rating: 50,
        tonnage: 1000,
        kill_points: 400,
        max_cloak: 2,
        can_lay_mines: true,
    }
}

/// Fast cyborg raider.
#[must_use]
pub fn raider_class() -> ShipClass {
    ShipClass {
        name: "Cyborg Raider".into(),
        max_speed: fixed(2500),
        max_acceleration: fixed(200),
        max_turn_rate: fixed(30),
        max_energy: fixed(4000),
        energy_regen: fixed(25),
        max_shield_type: 8,
        armament: [WeaponKind::Phaser, WeaponKind::Torpedo].into_iter().collect(),
        damage_factor: 90,
        repair_rate: fixed(1),
        scan_range: fixed(120_000),
        sensor_rating: 60,
        tonnage: 700,
        kill_points: 300,
        max_cloak: 0,
        can_lay_mines: true,
    }
}

/// Sturdy droid sentry.
#[must_use]
pub fn sentry_class() -> ShipClass {
    ShipClass {
        name: "Droid Sentry".into(),
        max_speed: fixed(1200),
        max_acceleration: fixed(100),
        max_turn_rate: fixed(20),
        max_energy: fixed(4000),
        energy_regen: fixed(30),
        max_shield_type: 12,
        armament: [WeaponKind::Phaser, WeaponKind::IonCannon].into_iter().collect(),
        damage_factor: 100,
        repair_rate: fixed(3),
        scan_range: fixed(80_000),
        sensor_rating: 70,
        tonnage: 900,
        kill_points: 350,
        max_cloak: 0,
        can_lay_mines: false,
    }
}

/// Human-flown ship with 2000 energy.
#[must_use]
pub fn ship(id: EntityId, owner: OwnerId, class: ClassId, pos: Vec2Fixed) -> Ship {
    let mut ship = Ship::new(id, owner, class, pos);
    ship.energy = fixed(2000);
    ship
}

/// Cyborg raider carrying a few mines and torpedoes.
#[must_use]
pub fn cyborg(id: EntityId, pos: Vec2Fixed) -> Ship {
    let mut ship = ship(id, CYBORG_OWNER, RAIDER, pos);
    ship.control = ControlMode::CyborgAi(CyborgState::default());
    ship.cargo = Cargo::new()
        .with(Item::Mine, 2)
        .with(Item::Torpedo, 10)
        .with(Item::Jammer, 1);
    ship
}

/// Droid sentry guarding its starting point.
#[must_use]
pub fn droid(id: EntityId, pos: Vec2Fixed) -> Ship {
    let mut ship = ship(id, DROID_OWNER, SENTRY, pos);
    ship.control = ControlMode::DroidAi(DroidState::new(pos));
    ship
}

/// Planet with average ratings and a food line running.
#[must_use]
pub fn planet(id: EntityId, owner: Option<OwnerId>, pos: Vec2Fixed) -> Planet {
    let mut stocks = [ItemStock::default(); Item::COUNT];
    stocks[Item::Food.index()] = ItemStock {
        quantity: 500,
        rate: 20,
    };
    stocks[Item::Troops.index()] = ItemStock {
        quantity: 200,
        rate: 2,
    };
    Planet {
        id,
        name: format!("Planet {id}"),
        owner,
        position: pos,
        environment: 3,
        resources: 3,
        technology: 1,
        stocks,
        max_quantity: 100_000,
        cash: 1000,
        tax_rate: 10,
        population: 10_000,
        warnings: 0,
        last_attacked: None,
    }
}

/// Armed mine.
#[must_use]
pub fn mine(id: EntityId, owner: OwnerId, pos: Vec2Fixed, damage: i32) -> Mine {
    Mine {
        id,
        owner,
        position: pos,
        timer: 0,
        damage_potential: fixed(damage),
        stealth: false,
        armed: true,
    }
}

/// Empty world holding the three fixture classes.
#[must_use]
pub fn empty_world() -> WorldSnapshot {
    let mut world = WorldSnapshot::new(Galaxy::default());
    world.classes.insert(CRUISER, cruiser_class());
    world.classes.insert(RAIDER, raider_class());
    world.classes.insert(SENTRY, sentry_class());
    world
}

/// A populated galaxy: two player teams, cyborg raiders, droid sentries,
/// planets, a minefield, a wormhole and a beacon.
///
/// Positions are spread on a grid so runs are repeatable; `ships_per_side`
/// scales the fleet for benchmarks.
#[must_use]
pub fn skirmish_world(ships_per_side: u32) -> WorldSnapshot {
    let mut world = empty_world();
    world.now = 1_000;
    let mut next_id: EntityId = 1;
    let galaxy = world.galaxy;
    let grid = |x: i32, y: i32, step: i32, i: u32| {
        let (row, col) = ((i / 10) as i32, (i % 10) as i32);
        galaxy.wrap(at(x + step * col, y + step * row))
    };

    for i in 0..ships_per_side {
        let mut red = ship(next_id, 1, CRUISER, grid(20_000, 20_000, 9_000, i));
        red.heading = fixed(90);
        red.desired_heading = fixed(90);
        red.desired_speed = fixed(800);
        red.cargo = Cargo::new().with(Item::Torpedo, 5).with(Item::Missile, 5);
        world.ships.insert(red.id, red);

        let mut blue = ship(next_id + 1, 2, CRUISER, grid(150_000, 20_000, 9_000, i));
        blue.heading = fixed(270);
        blue.desired_heading = fixed(270);
        blue.desired_speed = fixed(800);
        world.ships.insert(blue.id, blue);

        let raider = cyborg(next_id + 2, grid(90_000, 80_000, 6_000, i));
        world.ships.insert(raider.id, raider);
        let sentry = droid(next_id + 3, grid(230_000, 60_000, 6_000, i));
        world.ships.insert(sentry.id, sentry);
        next_id += 4;
    }

    world.teams.insert(
        1,
        Team {
            id: 1,
            name: "Federation".into(),
            members: [1].into_iter().collect(),
            score: 0,
        },
    );
    world.teams.insert(
        2,
        Team {
            id: 2,
            name: "Alliance".into(),
            members: [2].into_iter().collect(),
            score: 0,
        },
    );

    for (i, owner) in [Some(1), Some(2), None, Some(1)].into_iter().enumerate() {
        let id = i as EntityId + 1;
        let x = 40_000 + 60_000 * i as i32;
        world.planets.insert(id, planet(id, owner, at(x, 120_000)));
    }
    for i in 0..5 {
        let id = i + 1;
        let x = 110_000 + 3_000 * i as i32;
        world.mines.insert(id, mine(id, CYBORG_OWNER, at(x, 40_000), 60));
    }
    world.wormholes.insert(
        1,
        Wormhole {
            id: 1,
            name: "Serpent's Eye".into(),
            entry: at(60_000, 60_000),
            exit: at(250_000, 130_000),
            stability: 80,
            energy_required: fixed(500),
            usage_count: 0,
            last_used: None,
        },
    );
    world.beacons.insert(
        1,
        Beacon {
            id: 1,
            owner: 1,
            position: at(20_000, 20_000),
            message: "Federation space. Hostiles will be fired upon.".into(),
            expires_at: None,
            active: true,
        },
    );
    world
}

/// Parse a RON snapshot, as written by hand in test data.
pub fn snapshot_from_ron(text: &str) -> Result<WorldSnapshot> {
    ron::from_str(text).map_err(|e| GameError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skirmish_world_scales() {
        let world = skirmish_world(3);
        assert_eq!(world.ships.len(), 12);
        assert_eq!(world.planets.len(), 4);
        assert!(world.ships.values().all(|s| world.classes.contains_key(&s.class)));
        assert!(world.ships.values().all(|s| world.galaxy.contains(s.position)));
    }

    #[test]
    fn test_snapshot_ron_round_trip() {
        let world = skirmish_world(1);
        let text = ron::to_string(&world).unwrap();
        assert_eq!(snapshot_from_ron(&text).unwrap(), world);
    }
}
