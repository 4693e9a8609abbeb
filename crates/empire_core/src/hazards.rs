//! Mines, wormholes and beacons.
//!
//! Runs after movement, against post-move positions. Mine detonations are
//! not applied here: they are queued as combat intents so combat resolves
//! them after ship fire.

use crate::combat::inflict;
use crate::config::HazardConfig;
use crate::entities::{EntityId, EntityRef};
use crate::events::{DamageSource, EventLog, WorldEvent};
use crate::intent::IntentQueue;
use crate::math::{percent, Fixed};
use crate::rng::TickRng;
use crate::snapshot::{TickLedger, WorldSnapshot};

/// Chance (0-1) that a ship sets off a mine.
///
/// Cloak always helps; sensors only help against mines they can see.
#[must_use]
pub fn detonation_chance(
    cloak: u8,
    sensor_rating: u8,
    stealth: bool,
    config: &HazardConfig,
) -> Fixed {
    let mut evasion_bp = i64::from(cloak) * i64::from(config.cloak_evasion) * 100;
    if !stealth {
        evasion_bp += i64::from(sensor_rating) * i64::from(config.sensor_evasion_bp);
    }
    let chance = Fixed::ONE - Fixed::from_num(evasion_bp) / Fixed::from_num(10_000);
    chance
        .max(percent(i64::from(config.min_detonation_chance)))
        .min(Fixed::ONE)
}

fn live_ships(world: &WorldSnapshot) -> Vec<EntityId> {
    world
        .ships
        .values()
        .filter(|s| s.is_alive() && !world.is_quarantined(EntityRef::Ship(s.id)))
        .map(|s| s.id)
        .collect()
}

/// Count down, arm and trigger mines. Triggered mines are removed from the
/// world and their damage queued on `intents`. Returns mines processed.
pub fn run_mines(
    world: &mut WorldSnapshot,
    config: &HazardConfig,
    rng: &mut TickRng,
    intents: &mut IntentQueue,
    events: &mut EventLog,
) -> usize {
    let ids: Vec<EntityId> = world
        .mines
        .keys()
        .filter(|id| !world.is_quarantined(EntityRef::Mine(**id)))
        .copied()
        .collect();
    let radius = Fixed::from_num(config.mine_radius);
    let ships = live_ships(world);

    for &id in &ids {
        let Some(mine) = world.mines.get_mut(&id) else {
            continue;
        };
        if !mine.armed {
            mine.timer = mine.timer.saturating_sub(1);
            if mine.timer > 0 {
                continue;
            }
            mine.armed = true;
            events.push(WorldEvent::MineArmed { mine: id });
        }
        let mine = mine.clone();

        // Nearest first, ties by id.
        let mut in_range: Vec<(Fixed, EntityId)> = ships
            .iter()
            .filter_map(|sid| world.ships.get(sid))
            .filter(|s| s.is_alive())
            .map(|s| (world.galaxy.distance(mine.position, s.position), s.id))
            .filter(|(d, _)| *d <= radius)
            .collect();
        if in_range.is_empty() {
            continue;
        }
        in_range.sort();

        let mut trigger = None;
        for &(_, sid) in &in_range {
            let Some(ship) = world.ships.get(&sid) else {
                continue;
            };
            let sensors = world.classes.get(&ship.class).map_or(0, |c| c.sensor_rating);
            if rng.roll(detonation_chance(ship.cloak, sensors, mine.stealth, config)) {
                trigger = Some(sid);
                break;
            }
        }
        let Some(trigger) = trigger else {
            continue;
        };

        tracing::debug!(mine = id, trigger, victims = in_range.len(), "Mine detonated");
        events.push(WorldEvent::MineDetonated { mine: id, trigger });
        let mut victims: Vec<EntityId> = in_range.iter().map(|&(_, sid)| sid).collect();
        victims.sort_unstable();
        for victim in victims {
            intents.push_detonation(id, victim, mine.damage_potential);
        }
        world.mines.remove(&id);
    }
    ids.len()
}

/// Carry ships through wormholes. Returns wormholes processed.
pub fn run_wormholes(
    world: &mut WorldSnapshot,
    config: &HazardConfig,
    ledger: &mut TickLedger,
    events: &mut EventLog,
) -> usize {
    let ids: Vec<EntityId> = world
        .wormholes
        .keys()
        .filter(|id| !world.is_quarantined(EntityRef::Wormhole(**id)))
        .copied()
        .collect();
    let radius = Fixed::from_num(config.wormhole_radius);
    let now = world.now;
    let mut transited: Vec<EntityId> = Vec::new();

    for &wid in &ids {
        for sid in live_ships(world) {
            if transited.contains(&sid) {
                continue;
            }
            let Some(wormhole) = world.wormholes.get(&wid) else {
                break;
            };
            let Some(ship) = world.ships.get(&sid) else {
                continue;
            };
            if !ship.is_alive()
                || ship.speed < wormhole.energy_required
                || world.galaxy.distance(ship.position, wormhole.entry) > radius
            {
                continue;
            }
            let exit = world.galaxy.wrap(wormhole.exit);
            let cost = wormhole.energy_required;
            let damage =
                Fixed::from_num(100 - wormhole.stability.min(100)) * config.transit_damage_factor;

            if let Some(ship) = world.ships.get_mut(&sid) {
                let from = ship.position;
                ship.energy = (ship.energy - cost.min(ship.energy)).max(Fixed::ZERO);
                ship.position = exit;
                events.push(WorldEvent::ShipMoved {
                    ship: sid,
                    from,
                    to: exit,
                });
            }
            transited.push(sid);
            events.push(WorldEvent::WormholeTransited {
                wormhole: wid,
                ship: sid,
            });
            if damage > Fixed::ZERO {
                events.push(WorldEvent::DamageDealt {
                    target: sid,
                    source: DamageSource::Wormhole(wid),
                    hull: damage,
                    absorbed: Fixed::ZERO,
                    critical: false,
                });
                inflict(world, sid, damage, None, ledger, events);
            }

            let Some(wormhole) = world.wormholes.get_mut(&wid) else {
                break;
            };
            wormhole.usage_count += 1;
            wormhole.last_used = Some(now);
            wormhole.stability = wormhole.stability.saturating_sub(config.transit_wear);
            if wormhole.stability == 0 {
                tracing::info!(wormhole = wid, "Wormhole collapsed");
                world.wormholes.remove(&wid);
                events.push(WorldEvent::WormholeCollapsed { wormhole: wid });
                break;
            }
        }
    }
    ids.len()
}

/// Expire beacons and deliver broadcasts. Returns beacons processed.
pub fn run_beacons(
    world: &mut WorldSnapshot,
    config: &HazardConfig,
    events: &mut EventLog,
) -> usize {
    let now = world.now;
    let ids: Vec<EntityId> = world
        .beacons
        .keys()
        .filter(|id| !world.is_quarantined(EntityRef::Beacon(**id)))
        .copied()
        .collect();
    let range = Fixed::from_num(config.beacon_range);
    let ships = live_ships(world);

    for &id in &ids {
        let Some(beacon) = world.beacons.get(&id) else {
            continue;
        };
        if beacon.is_expired(now) {
            world.beacons.remove(&id);
            events.push(WorldEvent::BeaconExpired { beacon: id });
            continue;
        }
        for sid in &ships {
            let Some(ship) = world.ships.get(sid) else {
                continue;
            };
            if world.galaxy.distance(beacon.position, ship.position) <= range {
                events.push(WorldEvent::BeaconMessage {
                    beacon: id,
                    ship: *sid,
                    message: beacon.message.clone(),
                });
            }
        }
    }
    ids.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Beacon, Mine, Ship, Wormhole};
    use crate::intent::CombatIntent;
    use crate::math::Vec2Fixed;

    fn mine(id: EntityId, timer: u32, at: Vec2Fixed) -> Mine {
        Mine {
            id,
            owner: 9,
            position: at,
            timer,
            damage_potential: Fixed::from_num(40),
            stealth: true,
            armed: false,
        }
    }

    #[test]
    fn test_detonation_chance_floors() {
        let config = HazardConfig::default();
        assert_eq!(detonation_chance(0, 100, true, &config), Fixed::ONE);
        // 2 cloak levels and sensor 40: 1 - 0.30 - 0.20
        let visible = detonation_chance(2, 40, false, &config);
        assert!((visible - Fixed::from_num(0.5)).abs() < Fixed::from_num(0.0001));
        assert_eq!(
            detonation_chance(9, 100, false, &config),
            percent(i64::from(config.min_detonation_chance))
        );
    }

    #[test]
    fn test_mine_arms_then_triggers_same_tick() {
        let mut world = WorldSnapshot::default();
        world.mines.insert(1, mine(1, 1, Vec2Fixed::from_units(1000, 1000)));
        world
            .ships
            .insert(5, Ship::new(5, 1, 1, Vec2Fixed::from_units(1500, 1000)));
        world
            .ships
            .insert(6, Ship::new(6, 1, 1, Vec2Fixed::from_units(90_000, 1000)));

        let mut rng = TickRng::new(1, 0);
        let mut intents = IntentQueue::new();
        let mut events = EventLog::new();
        let config = HazardConfig::default();
        run_mines(&mut world, &config, &mut rng, &mut intents, &mut events);

        assert!(world.mines.is_empty());
        assert_eq!(
            events,
            vec![
                WorldEvent::MineArmed { mine: 1 },
                WorldEvent::MineDetonated { mine: 1, trigger: 5 },
            ]
        );
        assert_eq!(
            intents.take_combat(),
            vec![CombatIntent::MineDetonation {
                mine: 1,
                target: 5,
                damage: Fixed::from_num(40),
            }]
        );
    }

    #[test]
    fn test_wormhole_transit_and_collapse() {
        let mut world = WorldSnapshot::default();
        world.now = 777;
        world.wormholes.insert(
            3,
            Wormhole {
                id: 3,
                name: "Rift".into(),
                entry: Vec2Fixed::from_units(5000, 5000),
                exit: Vec2Fixed::from_units(200_000, 100_000),
                stability: 5,
                energy_required: Fixed::from_num(100),
                usage_count: 0,
                last_used: None,
            },
        );
        let mut ship = Ship::new(1, 1, 1, Vec2Fixed::from_units(5200, 5000));
        ship.speed = Fixed::from_num(150);
        ship.energy = Fixed::from_num(60);
        world.ships.insert(1, ship);

        let mut ledger = TickLedger::default();
        let mut events = EventLog::new();
        run_wormholes(&mut world, &HazardConfig::default(), &mut ledger, &mut events);

        let ship = &world.ships[&1];
        assert_eq!(ship.position, Vec2Fixed::from_units(200_000, 100_000));
        assert_eq!(ship.energy, Fixed::ZERO);
        // (100 - 5) * 0.25
        assert_eq!(ship.damage, Fixed::from_num(23.75));
        assert!(world.wormholes.is_empty());
        assert!(events.contains(&WorldEvent::WormholeCollapsed { wormhole: 3 }));
    }

    #[test]
    fn test_beacons_expire_and_broadcast() {
        let mut world = WorldSnapshot::default();
        world.now = 100;
        let beacon = |id, expires_at| Beacon {
            id,
            owner: 1,
            position: Vec2Fixed::from_units(1000, 1000),
            message: "Welcome".into(),
            expires_at,
            active: true,
        };
        world.beacons.insert(1, beacon(1, Some(100)));
        world.beacons.insert(2, beacon(2, None));
        world
            .ships
            .insert(4, Ship::new(4, 2, 1, Vec2Fixed::from_units(3000, 1000)));

        let mut events = EventLog::new();
        run_beacons(&mut world, &HazardConfig::default(), &mut events);
        assert_eq!(world.beacons.len(), 1);
        assert_eq!(
            events,
            vec![
                WorldEvent::BeaconExpired { beacon: 1 },
                WorldEvent::BeaconMessage {
                    beacon: 2,
                    ship: 4,
                    message: "Welcome".into(),
                },
            ]
        );
    }
}
