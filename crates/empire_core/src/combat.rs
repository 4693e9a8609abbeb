//! Combat resolution.
//!
//! Resolves fire intents and mine detonations in queue order, then runs
//! self-destruct countdowns. Damage math lives in small pure functions so
//! it can be tested without a world:
//!
//! - Range falloff: full damage inside optimal range, then `1/sqrt(d/opt)`
//!   down to a floor
//! - Shield absorption: table percentage scaled by charge and generator health
//! - Hull damage saturates at 100, which destroys the ship

use crate::config::CombatConfig;
use crate::entities::{
    EntityId, EntityRef, Item, Planet, Shield, Ship, Subsystem, Subsystems, WeaponKind,
};
use crate::events::{AbortReason, DamageSource, EventLog, WorldEvent};
use crate::intent::CombatIntent;
use crate::math::{fixed_sqrt, percent, Fixed};
use crate::rng::TickRng;
use crate::snapshot::{TickLedger, WorldSnapshot};

/// Hull damage that destroys a ship.
pub const HULL_LIMIT: Fixed = Fixed::from_bits(100 << 32);

/// Damage multiplier for a shot at `distance` with the given optimal range.
#[must_use]
pub fn range_factor(distance: Fixed, optimal: Fixed, floor: Fixed) -> Fixed {
    if optimal <= Fixed::ZERO || distance <= optimal {
        return Fixed::ONE;
    }
    let root = fixed_sqrt(distance / optimal);
    if root <= Fixed::ZERO {
        return Fixed::ONE;
    }
    (Fixed::ONE / root).max(floor).min(Fixed::ONE)
}

/// Fraction of incoming damage a shield soaks up.
///
/// Lowered shields absorb nothing.
#[must_use]
pub fn shield_absorption(shield: &Shield, systems: &Subsystems, config: &CombatConfig) -> Fixed {
    if !shield.is_up() {
        return Fixed::ZERO;
    }
    let charge = shield.charge.max(Fixed::ZERO).min(HULL_LIMIT) / HULL_LIMIT;
    config.absorption(shield.kind) * charge * systems.efficiency(Subsystem::Shields)
}

/// Split raw damage into (hull, absorbed).
#[must_use]
pub fn absorb(raw: Fixed, fraction: Fixed) -> (Fixed, Fixed) {
    let raw = raw.max(Fixed::ZERO);
    let absorbed = raw * fraction.max(Fixed::ZERO).min(Fixed::ONE);
    (raw - absorbed, absorbed)
}

/// Add hull damage, saturating at 100. Returns `true` if this destroyed the ship.
pub fn apply_hull_damage(ship: &mut Ship, hull: Fixed) -> bool {
    if ship.destroyed {
        return false;
    }
    ship.damage = (ship.damage + hull.max(Fixed::ZERO)).min(HULL_LIMIT);
    if ship.damage >= HULL_LIMIT {
        ship.destroyed = true;
        ship.speed = Fixed::ZERO;
        ship.desired_speed = Fixed::ZERO;
        ship.self_destruct = None;
        return true;
    }
    false
}

/// Land hull damage on a ship and handle its destruction.
///
/// `credit` names the ship that gets the kill. Returns `true` if the ship
/// was destroyed by this damage.
pub(crate) fn inflict(
    world: &mut WorldSnapshot,
    target: EntityId,
    hull: Fixed,
    credit: Option<EntityId>,
    ledger: &mut TickLedger,
    events: &mut EventLog,
) -> bool {
    let Some(ship) = world.ships.get_mut(&target) else {
        return false;
    };
    if credit.is_some() {
        ship.last_attacker = credit;
    }
    if !apply_hull_damage(ship, hull) {
        return false;
    }

    let position = ship.position;
    let class = ship.class;
    let items: Vec<(Item, u32)> = ship.cargo.drain().into_iter().collect();
    tracing::debug!(ship = target, by = ?credit, "Ship destroyed");
    events.push(WorldEvent::ShipDestroyed {
        ship: target,
        by: credit,
    });
    if !items.is_empty() {
        events.push(WorldEvent::CargoDropped {
            ship: target,
            position,
            items,
        });
    }

    if let Some(killer) = credit {
        let points = world.classes.get(&class).map_or(0, |c| i64::from(c.kill_points));
        if let Some(attacker) = world.ships.get_mut(&killer) {
            attacker.kills += 1;
            let owner = attacker.owner;
            ledger.credit(world, owner, points);
        }
    }
    true
}

/// Runs combat intents and countdowns against the working world.
pub struct CombatResolver<'a> {
    world: &'a mut WorldSnapshot,
    config: &'a CombatConfig,
    rng: &'a mut TickRng,
    ledger: &'a mut TickLedger,
    events: &'a mut EventLog,
}

impl<'a> CombatResolver<'a> {
    /// Bind a resolver to the working world.
    pub fn new(
        world: &'a mut WorldSnapshot,
        config: &'a CombatConfig,
        rng: &'a mut TickRng,
        ledger: &'a mut TickLedger,
        events: &'a mut EventLog,
    ) -> Self {
        Self {
            world,
            config,
            rng,
            ledger,
            events,
        }
    }

    /// Resolve intents, which must already be in resolution order.
    /// Returns how many were resolved (fired or detonated).
    pub fn resolve(&mut self, intents: &[CombatIntent]) -> usize {
        let mut resolved = 0;
        for intent in intents {
            match *intent {
                CombatIntent::Fire {
                    attacker,
                    target,
                    weapon,
                    ..
                } => {
                    if self.fire(attacker, target, weapon) {
                        resolved += 1;
                    }
                }
                CombatIntent::MineDetonation {
                    mine,
                    target,
                    damage,
                } => {
                    if self.detonation(mine, target, damage) {
                        resolved += 1;
                    }
                }
            }
        }
        resolved
    }

    fn usable(&self, id: EntityId) -> Option<&Ship> {
        self.world
            .ships
            .get(&id)
            .filter(|ship| ship.is_alive() && !self.world.is_quarantined(EntityRef::Ship(id)))
    }

    fn check_fire(
        &self,
        attacker: EntityId,
        target: EntityId,
        weapon: WeaponKind,
    ) -> Result<Fixed, AbortReason> {
        let shooter = self.usable(attacker).ok_or(AbortReason::AttackerGone)?;
        if attacker == target {
            return Err(AbortReason::SelfTarget);
        }
        let victim = self.usable(target).ok_or(AbortReason::TargetGone)?;
        let class = self
            .world
            .classes
            .get(&shooter.class)
            .ok_or(AbortReason::AttackerGone)?;
        if !class.has_weapon(weapon) {
            return Err(AbortReason::NotArmed);
        }
        if shooter.cooldown(weapon) > 0 {
            return Err(AbortReason::CoolingDown);
        }
        let spec = self.config.weapon(weapon);
        if shooter.energy < Fixed::from_num(spec.energy_cost) {
            return Err(AbortReason::NoEnergy);
        }
        if let Some(ammo) = weapon.ammo() {
            if shooter.cargo.count(ammo) == 0 {
                return Err(AbortReason::NoAmmo);
            }
        }
        let distance = self.world.galaxy.distance(shooter.position, victim.position);
        if distance > Fixed::from_num(spec.range) {
            return Err(AbortReason::OutOfRange);
        }
        let galaxy = &self.world.galaxy;
        if galaxy.is_neutral(shooter.position) || galaxy.is_neutral(victim.position) {
            return Err(AbortReason::NeutralZone);
        }
        Ok(distance)
    }

    fn fire(&mut self, attacker: EntityId, target: EntityId, weapon: WeaponKind) -> bool {
        let distance = match self.check_fire(attacker, target, weapon) {
            Ok(distance) => distance,
            Err(reason) => {
                tracing::trace!(attacker, target, ?weapon, ?reason, "Fire aborted");
                self.events.push(WorldEvent::FireAborted {
                    attacker,
                    target,
                    weapon,
                    reason,
                });
                return false;
            }
        };
        let spec = self.config.weapon(weapon).clone();

        // Pay for the shot.
        let (fire_control, phasers, damage_factor) = {
            let Some(shooter) = self.world.ships.get_mut(&attacker) else {
                return false;
            };
            shooter.energy -= Fixed::from_num(spec.energy_cost);
            if let Some(ammo) = weapon.ammo() {
                shooter.cargo.take(ammo, 1);
            }
            if spec.cooldown_ticks > 0 {
                shooter.cooldowns.insert(weapon, spec.cooldown_ticks);
            }
            let factor = self
                .world
                .classes
                .get(&shooter.class)
                .map_or(100, |c| c.damage_factor);
            (
                shooter.systems.efficiency(Subsystem::FireControl),
                shooter.systems.efficiency(Subsystem::Phasers),
                factor,
            )
        };
        self.events.push(WorldEvent::WeaponFired {
            attacker,
            target,
            weapon,
        });

        let Some(victim) = self.world.ships.get(&target) else {
            return true;
        };
        let falloff = range_factor(
            distance,
            Fixed::from_num(spec.optimal_range),
            self.config.min_range_factor,
        );
        let cloak_penalty =
            percent(i64::from(victim.cloak) * i64::from(self.config.cloak_accuracy_penalty));
        let mut hit_chance = percent(i64::from(spec.accuracy))
            * falloff
            * fire_control
            * (Fixed::ONE - cloak_penalty).max(Fixed::ZERO);
        if weapon.is_guided() && victim.is_jamming() {
            hit_chance *= Fixed::ONE - percent(i64::from(self.config.jammer_effectiveness));
        }
        let has_decoy = victim.cargo.count(Item::Decoy) > 0;

        if !self.rng.roll(hit_chance) {
            self.events.push(WorldEvent::WeaponMissed {
                attacker,
                target,
                weapon,
                decoyed: false,
            });
            return true;
        }
        if weapon.is_guided() && has_decoy && self.rng.one_in(self.config.decoy_odds) {
            if let Some(victim) = self.world.ships.get_mut(&target) {
                victim.cargo.take(Item::Decoy, 1);
            }
            self.events.push(WorldEvent::WeaponMissed {
                attacker,
                target,
                weapon,
                decoyed: true,
            });
            return true;
        }

        let mut raw = self.rng.uniform(
            Fixed::from_num(spec.min_damage),
            Fixed::from_num(spec.max_damage),
        ) * falloff
            * percent(i64::from(damage_factor));
        if weapon.is_beam() {
            raw *= phasers;
        }
        let critical = self.rng.chance(u32::from(self.config.crit_chance));
        if critical {
            raw = raw.saturating_mul(self.config.crit_multiplier);
        }

        let source = DamageSource::Weapon {
            ship: attacker,
            weapon,
        };
        let hull = self.hit(target, raw, source, critical);
        if weapon == WeaponKind::IonCannon {
            if let Some(victim) = self.world.ships.get_mut(&target) {
                let drain = Fixed::from_num(self.config.ion_shield_drain);
                victim.shield.charge = (victim.shield.charge - drain).max(Fixed::ZERO);
            }
        }
        inflict(self.world, target, hull, Some(attacker), self.ledger, self.events);
        self.system_damage(target, hull);
        true
    }

    /// Run raw damage through the target's shields. Returns the hull share.
    fn hit(
        &mut self,
        target: EntityId,
        raw: Fixed,
        source: DamageSource,
        critical: bool,
    ) -> Fixed {
        let Some(victim) = self.world.ships.get_mut(&target) else {
            return Fixed::ZERO;
        };
        let fraction = shield_absorption(&victim.shield, &victim.systems, self.config);
        let (hull, absorbed) = absorb(raw, fraction);
        if absorbed > Fixed::ZERO {
            let drain = absorbed * self.config.shield_charge_drain;
            victim.shield.charge = (victim.shield.charge - drain).max(Fixed::ZERO);
        }
        self.events.push(WorldEvent::DamageDealt {
            target,
            source,
            hull,
            absorbed,
            critical,
        });
        hull
    }

    fn system_damage(&mut self, target: EntityId, hull: Fixed) {
        if hull < Fixed::from_num(self.config.system_damage_threshold) {
            return;
        }
        if self.world.ships.get(&target).map_or(true, |s| !s.is_alive()) {
            return;
        }
        let chance = percent(i64::from(self.config.system_damage_chance)) * hull.min(HULL_LIMIT)
            / HULL_LIMIT;
        if !self.rng.roll(chance) {
            return;
        }
        let system = Subsystem::ALL[self.rng.index(Subsystem::ALL.len())];
        let amount = Fixed::from_num(
            self.rng
                .range_u32(self.config.system_damage_min, self.config.system_damage_max),
        );
        if let Some(victim) = self.world.ships.get_mut(&target) {
            let value = victim.systems.get_mut(system);
            *value = (*value + amount).min(HULL_LIMIT);
            self.events.push(WorldEvent::SystemDamaged {
                ship: target,
                system,
                amount,
            });
        }
    }

    fn detonation(&mut self, mine: EntityId, target: EntityId, damage: Fixed) -> bool {
        if self.usable(target).is_none() {
            return false;
        }
        let hull = self.hit(target, damage, DamageSource::Mine(mine), false);
        inflict(self.world, target, hull, None, self.ledger, self.events);
        true
    }

    /// Advance self-destruct countdowns and detonate the ones that reach zero.
    /// Returns the number of ships that blew up.
    pub fn run_countdowns(&mut self) -> usize {
        let armed: Vec<EntityId> = self
            .world
            .ships
            .values()
            .filter(|s| s.is_alive() && s.self_destruct.is_some())
            .filter(|s| !self.world.is_quarantined(EntityRef::Ship(s.id)))
            .map(|s| s.id)
            .collect();

        let mut detonated = 0;
        for id in armed {
            let Some(ship) = self.world.ships.get_mut(&id) else {
                continue;
            };
            // A ship killed earlier in this pass no longer counts down.
            if !ship.is_alive() {
                continue;
            }
            if self.world.galaxy.is_neutral(ship.position) {
                ship.self_destruct = None;
                self.events.push(WorldEvent::SelfDestructAborted { ship: id });
                continue;
            }
            let remaining = ship.self_destruct.unwrap_or(0).saturating_sub(1);
            if remaining > 0 {
                ship.self_destruct = Some(remaining);
                continue;
            }
            ship.self_destruct = None;
            self.blast(id);
            detonated += 1;
        }
        detonated
    }

    fn blast(&mut self, id: EntityId) {
        let Some(ship) = self.world.ships.get(&id) else {
            return;
        };
        let center = ship.position;
        let (tonnage, kill_points) = self
            .world
            .classes
            .get(&ship.class)
            .map_or((0, 0), |c| (c.tonnage, c.kill_points));
        let radius = Fixed::from_num(self.config.blast_radius)
            + Fixed::from_num(tonnage).saturating_mul(Fixed::from_num(2));
        let peak = Fixed::from_num(self.config.blast_base) + Fixed::from_num(kill_points / 10);

        tracing::debug!(ship = id, %radius, "Self-destruct");
        self.events.push(WorldEvent::SelfDestructDetonated { ship: id, radius });

        let galaxy = self.world.galaxy;
        let falloff = |d: Fixed| {
            let edge = (Fixed::ONE - d / radius).max(Fixed::ZERO);
            edge * edge * edge
        };

        let victims: Vec<(EntityId, Fixed)> = self
            .world
            .ships
            .values()
            .filter(|s| s.id != id && s.is_alive())
            .filter(|s| !self.world.is_quarantined(EntityRef::Ship(s.id)))
            .filter_map(|s| {
                let d = galaxy.distance(center, s.position);
                (d < radius).then(|| (s.id, falloff(d) * peak))
            })
            .collect();
        for (victim, damage) in victims {
            self.events.push(WorldEvent::DamageDealt {
                target: victim,
                source: DamageSource::Blast(id),
                hull: damage.min(HULL_LIMIT),
                absorbed: Fixed::ZERO,
                critical: false,
            });
            inflict(self.world, victim, damage, Some(id), self.ledger, self.events);
        }

        let now = self.world.now;
        let planets: Vec<EntityId> = self
            .world
            .planets
            .values()
            .filter(|p| !self.world.is_quarantined(EntityRef::Planet(p.id)))
            .filter(|p| galaxy.distance(center, p.position) < radius)
            .map(|p| p.id)
            .collect();
        for planet_id in planets {
            let Some(planet) = self.world.planets.get_mut(&planet_id) else {
                continue;
            };
            let loss = (falloff(galaxy.distance(center, planet.position)) * peak).min(HULL_LIMIT);
            bombard(planet, loss);
            planet.last_attacked = Some(now);
            self.events.push(WorldEvent::PlanetBombarded {
                planet: planet_id,
                ship: id,
                percent: loss,
            });
        }

        // The exploding ship takes itself out last.
        let remaining = self
            .world
            .ships
            .get(&id)
            .map_or(Fixed::ZERO, |s| HULL_LIMIT - s.damage);
        inflict(self.world, id, remaining, None, self.ledger, self.events);
    }
}

/// Kill `loss` percent of a planet's troops, men and fighters.
fn bombard(planet: &mut Planet, loss: Fixed) {
    for item in [Item::Troops, Item::Men, Item::Fighter] {
        let stock = planet.stock_mut(item);
        let killed = (Fixed::saturating_from_num(stock.quantity) * loss / HULL_LIMIT)
            .to_num::<u64>()
            .min(stock.quantity);
        stock.quantity -= killed;
    }
}
