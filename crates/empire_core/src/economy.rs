//! Planetary economy: production, taxation and population.
//!
//! Each pass is a pure function from a planet to its next state, reporting
//! what happened as events. The `run_*` drivers walk every planet in id
//! order and skip quarantined ones.
//!
//! All calculations use integer math. Modifiers are percentages, growth and
//! interest rates are basis points.

use crate::config::EconomyConfig;
use crate::entities::{EntityId, EntityRef, Item, Planet};
use crate::events::{Distress, EventLog, WorldEvent};
use crate::rng::TickRng;
use crate::snapshot::WorldSnapshot;

/// Environment modifier (percent) of a 1..=5 rating.
#[must_use]
pub fn environment_modifier(config: &EconomyConfig, rating: u8) -> u64 {
    u64::from(config.environment_modifiers[rating_index(rating)])
}

/// Resource modifier (percent) of a 1..=5 rating.
#[must_use]
pub fn resource_modifier(config: &EconomyConfig, rating: u8) -> u64 {
    u64::from(config.resource_modifiers[rating_index(rating)])
}

/// Technology modifier (percent): 100 plus one step per level.
#[must_use]
pub fn technology_modifier(config: &EconomyConfig, level: u8) -> u64 {
    100 + u64::from(config.technology_step) * u64::from(level)
}

fn rating_index(rating: u8) -> usize {
    usize::from(rating.clamp(1, 5) - 1)
}

/// Units of an item produced by one pass at `rate`, before the storage cap.
#[must_use]
pub fn production_amount(planet: &Planet, rate: u32, config: &EconomyConfig) -> u64 {
    let scaled = u128::from(rate)
        * u128::from(environment_modifier(config, planet.environment))
        * u128::from(resource_modifier(config, planet.resources))
        * u128::from(technology_modifier(config, planet.technology));
    u64::try_from(scaled / 1_000_000).unwrap_or(u64::MAX)
}

/// One production pass over every item.
#[must_use]
pub fn produce(planet: &Planet, config: &EconomyConfig, events: &mut EventLog) -> Planet {
    let mut next = planet.clone();
    for item in Item::ALL {
        let stock = *planet.stock(item);
        if stock.rate == 0 {
            continue;
        }
        let produced = production_amount(planet, stock.rate, config);
        let quantity = stock
            .quantity
            .saturating_add(produced)
            .min(planet.max_quantity);
        let added = quantity.saturating_sub(stock.quantity);
        next.stock_mut(item).quantity = quantity;
        if added > 0 {
            events.push(WorldEvent::ItemsProduced {
                planet: planet.id,
                item,
                amount: added,
            });
        }
    }
    next
}

/// Tax revenue of one pass: population x rate, rounded down.
#[must_use]
pub fn tax_revenue(population: u64, tax_rate: u8) -> i64 {
    let revenue = u128::from(population) * u128::from(tax_rate) / 100;
    i64::try_from(revenue).unwrap_or(i64::MAX)
}

/// Interest on a debt, rounded up. Zero when not in debt.
#[must_use]
pub fn debt_interest(cash: i64, interest_bp: u32) -> i64 {
    if cash >= 0 {
        return 0;
    }
    let debt = i128::from(cash).unsigned_abs();
    let interest = (debt * u128::from(interest_bp)).div_ceil(10_000);
    i64::try_from(interest).unwrap_or(i64::MAX)
}

/// One taxation pass.
///
/// Collects taxes, charges interest on whatever debt remains and tracks how
/// many passes in a row ended in debt. At the warning threshold the tax rate
/// is cut and the counter starts over.
#[must_use]
pub fn collect_taxes(planet: &Planet, config: &EconomyConfig, events: &mut EventLog) -> Planet {
    let mut next = planet.clone();
    next.tax_rate = next.tax_rate.min(config.max_tax_rate.min(100));

    let revenue = tax_revenue(next.population, next.tax_rate);
    next.cash = next.cash.saturating_add(revenue);
    let interest = debt_interest(next.cash, config.debt_interest_bp);
    next.cash = next.cash.saturating_sub(interest);
    events.push(WorldEvent::PlanetTaxed {
        planet: planet.id,
        revenue,
        interest,
        cash: next.cash,
    });

    if next.cash < 0 {
        next.warnings += 1;
    } else {
        next.warnings = 0;
    }
    if next.warnings >= config.warning_threshold.max(1) {
        let from = next.tax_rate;
        next.tax_rate = from.saturating_sub(config.tax_cut_step);
        next.warnings = 0;
        tracing::debug!(planet = planet.id, from, to = next.tax_rate, "Tax rate cut");
        events.push(WorldEvent::TaxRateReduced {
            planet: planet.id,
            from,
            to: next.tax_rate,
        });
    }
    next
}

/// Population the planet's environment can support.
#[must_use]
pub fn capacity(planet: &Planet, config: &EconomyConfig) -> u64 {
    config
        .capacity_per_environment
        .saturating_mul(u64::from(planet.environment.clamp(1, 5)))
}

/// Growth rate of one pass, in basis points.
#[must_use]
pub fn growth_rate_bp(planet: &Planet, config: &EconomyConfig, now: u64) -> u64 {
    let untaxed = 100 - u64::from(planet.tax_rate.min(100));
    let mut rate = u64::from(config.base_growth_bp)
        * environment_modifier(config, planet.environment)
        * untaxed
        / 10_000;
    let penalty = u64::from(planet.warnings) * u64::from(config.warning_growth_penalty);
    rate = rate * 100u64.saturating_sub(penalty) / 100;
    let recently_attacked = planet
        .last_attacked
        .is_some_and(|at| now.saturating_sub(at) < config.attack_recovery_seconds);
    if recently_attacked {
        rate /= 2;
    }
    rate
}

/// Logistic change `r p (1 - p / K)`. Negative above capacity.
#[must_use]
pub fn logistic_change(population: u64, rate_bp: u64, capacity: u64) -> i64 {
    if population == 0 || capacity == 0 {
        return 0;
    }
    let p = i128::from(population);
    let k = i128::from(capacity);
    let change = p * i128::from(rate_bp) * (k - p) / (10_000 * k);
    i64::try_from(change).unwrap_or(if change > 0 { i64::MAX } else { i64::MIN })
}

/// One population pass: feeding, growth and unrest.
///
/// Everyone eats first. A food shortage empties the granary, starves an
/// eighth of the population, men and troops, and suppresses growth. An owned
/// planet whose tax burden outweighs its garrison may revolt.
#[must_use]
pub fn grow_population(
    planet: &Planet,
    config: &EconomyConfig,
    now: u64,
    rng: &mut TickRng,
    events: &mut EventLog,
) -> Planet {
    let mut next = planet.clone();
    let from = planet.population;

    let mouths = next
        .population
        .saturating_add(next.quantity(Item::Men))
        .saturating_add(next.quantity(Item::Troops));
    let needed = mouths.div_ceil(config.mouths_per_food.max(1));
    let food = next.quantity(Item::Food);
    if food >= needed {
        next.stock_mut(Item::Food).quantity = food - needed;
        let change = logistic_change(
            next.population,
            growth_rate_bp(&next, config, now),
            capacity(&next, config),
        );
        next.population = next.population.saturating_add_signed(change);
    } else {
        next.stock_mut(Item::Food).quantity = 0;
        let divisor = config.starvation_divisor.max(1);
        next.population -= next.population / divisor;
        for group in [Item::Men, Item::Troops] {
            let stock = next.stock_mut(group);
            stock.quantity -= stock.quantity / divisor;
        }
        tracing::debug!(planet = planet.id, needed, food, "Planet starving");
        events.push(WorldEvent::DistressRaised {
            planet: planet.id,
            reason: Distress::Starvation,
        });
    }

    if next.population != from {
        events.push(WorldEvent::PopulationChanged {
            planet: planet.id,
            from,
            to: next.population,
        });
    }

    if let Some(owner) = next.owner {
        if is_restless(&next) && rng.one_in(config.revolt_odds) {
            tracing::info!(planet = planet.id, owner, "Planet revolted");
            next.owner = None;
            next.warnings = 0;
            events.push(WorldEvent::PlanetRevolted {
                planet: planet.id,
                former_owner: owner,
            });
        }
    }
    next
}

/// Whether the tax burden (population x rate / 120 x 0.35) outweighs the troops.
#[must_use]
pub fn is_restless(planet: &Planet) -> bool {
    let unrest = u128::from(planet.population) * u128::from(planet.tax_rate) * 35 / 12_000;
    unrest > u128::from(planet.quantity(Item::Troops))
}

fn planet_ids(world: &WorldSnapshot) -> Vec<EntityId> {
    world
        .planets
        .keys()
        .filter(|id| !world.is_quarantined(EntityRef::Planet(**id)))
        .copied()
        .collect()
}

/// Run a production pass on every planet. Returns planets processed.
pub fn run_production(
    world: &mut WorldSnapshot,
    config: &EconomyConfig,
    events: &mut EventLog,
) -> usize {
    let ids = planet_ids(world);
    for id in &ids {
        if let Some(planet) = world.planets.get_mut(id) {
            *planet = produce(planet, config, events);
        }
    }
    ids.len()
}

/// Run a taxation pass on every planet. Returns planets processed.
pub fn run_taxation(
    world: &mut WorldSnapshot,
    config: &EconomyConfig,
    events: &mut EventLog,
) -> usize {
    let ids = planet_ids(world);
    for id in &ids {
        if let Some(planet) = world.planets.get_mut(id) {
            *planet = collect_taxes(planet, config, events);
        }
    }
    ids.len()
}

/// Run a population pass on every planet. Returns planets processed.
pub fn run_population(
    world: &mut WorldSnapshot,
    config: &EconomyConfig,
    rng: &mut TickRng,
    events: &mut EventLog,
) -> usize {
    let now = world.now;
    let ids = planet_ids(world);
    for id in &ids {
        if let Some(planet) = world.planets.get_mut(id) {
            *planet = grow_population(planet, config, now, rng, events);
        }
    }
    ids.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ItemStock;
    use crate::math::Vec2Fixed;
    use proptest::prelude::*;

    fn planet() -> Planet {
        Planet {
            id: 7,
            name: "Terra Nova".into(),
            owner: Some(1),
            position: Vec2Fixed::from_units(50_000, 50_000),
            environment: 3,
            resources: 5,
            technology: 0,
            stocks: [ItemStock::default(); Item::COUNT],
            max_quantity: 10_000,
            cash: 0,
            tax_rate: 10,
            population: 1000,
            warnings: 0,
            last_attacked: None,
        }
    }

    #[test]
    fn test_production_applies_modifiers() {
        let mut planet = planet();
        planet.stock_mut(Item::Food).rate = 10;
        let mut events = EventLog::new();
        let next = produce(&planet, &EconomyConfig::default(), &mut events);
        // 10 x 1.0 (env 3) x 1.8 (res 5) x 1.0 (tech 0)
        assert_eq!(next.quantity(Item::Food), 18);
        assert_eq!(
            events,
            vec![WorldEvent::ItemsProduced {
                planet: 7,
                item: Item::Food,
                amount: 18,
            }]
        );
    }

    #[test]
    fn test_production_caps_and_counts_technology() {
        let mut planet = planet();
        planet.technology = 5;
        planet.stock_mut(Item::Gold).rate = 100;
        planet.stock_mut(Item::Gold).quantity = 9_900;
        let mut events = EventLog::new();
        let next = produce(&planet, &EconomyConfig::default(), &mut events);
        assert_eq!(next.quantity(Item::Gold), 10_000);
        assert_eq!(production_amount(&planet, 100, &EconomyConfig::default()), 270);
    }

    #[test]
    fn test_taxation_adds_revenue_once() {
        let planet = planet();
        let mut events = EventLog::new();
        let next = collect_taxes(&planet, &EconomyConfig::default(), &mut events);
        assert_eq!(next.cash, 100);
        assert_eq!(next.warnings, 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_debt_accrues_interest_and_cuts_rate() {
        let mut planet = planet();
        planet.cash = -10_050;
        planet.warnings = 2;
        let mut events = EventLog::new();
        let next = collect_taxes(&planet, &EconomyConfig::default(), &mut events);
        // -10050 + 100 = -9950, 1% interest rounds up to 100.
        assert_eq!(next.cash, -10_050);
        assert_eq!(next.tax_rate, 5);
        assert_eq!(next.warnings, 0);
        assert!(events.contains(&WorldEvent::TaxRateReduced {
            planet: 7,
            from: 10,
            to: 5,
        }));
    }

    #[test]
    fn test_high_tax_rate_is_collected_in_full() {
        let mut planet = planet();
        planet.tax_rate = 90;
        let next = collect_taxes(&planet, &EconomyConfig::default(), &mut EventLog::new());
        assert_eq!(next.tax_rate, 90);
        assert_eq!(next.cash, 900);
    }

    #[test]
    fn test_tax_rate_is_capped_by_configured_ceiling() {
        let mut planet = planet();
        planet.tax_rate = 90;
        let config = EconomyConfig {
            max_tax_rate: 50,
            ..EconomyConfig::default()
        };
        let next = collect_taxes(&planet, &config, &mut EventLog::new());
        assert_eq!(next.tax_rate, 50);
        assert_eq!(next.cash, 500);
    }

    #[test]
    fn test_population_grows_when_fed() {
        let mut planet = planet();
        planet.stock_mut(Item::Food).quantity = 100;
        let mut rng = TickRng::new(1, 6);
        let mut events = EventLog::new();
        let next = grow_population(&planet, &EconomyConfig::default(), 0, &mut rng, &mut events);
        // 200bp x 100% env x 90% untaxed = 180bp, near-empty planet.
        assert_eq!(next.population, 1017);
        assert_eq!(next.quantity(Item::Food), 90);
    }

    #[test]
    fn test_recent_attack_halves_growth() {
        let mut planet = planet();
        planet.last_attacked = Some(1000);
        let config = EconomyConfig::default();
        assert_eq!(growth_rate_bp(&planet, &config, 1200), 90);
        assert_eq!(growth_rate_bp(&planet, &config, 1600), 180);
    }

    #[test]
    fn test_starvation_raises_distress() {
        let mut planet = planet();
        planet.stock_mut(Item::Troops).quantity = 80;
        let mut rng = TickRng::new(1, 6);
        let mut events = EventLog::new();
        let next = grow_population(&planet, &EconomyConfig::default(), 0, &mut rng, &mut events);
        assert_eq!(next.population, 875);
        assert_eq!(next.quantity(Item::Troops), 70);
        assert!(events.contains(&WorldEvent::DistressRaised {
            planet: 7,
            reason: Distress::Starvation,
        }));
    }

    #[test]
    fn test_overtaxed_planet_revolts() {
        let mut planet = planet();
        planet.tax_rate = 50;
        planet.population = 100_000;
        planet.stock_mut(Item::Food).quantity = 10_000;
        assert!(is_restless(&planet));
        let mut config = EconomyConfig::default();
        config.revolt_odds = 1;
        let mut rng = TickRng::new(1, 6);
        let mut events = EventLog::new();
        let next = grow_population(&planet, &config, 0, &mut rng, &mut events);
        assert_eq!(next.owner, None);
        assert!(events.contains(&WorldEvent::PlanetRevolted {
            planet: 7,
            former_owner: 1,
        }));
    }

    proptest! {
        #[test]
        fn test_tax_changes_cash_by_revenue_plus_interest(
            population in 0u64..10_000_000,
            rate in 0u8..=100,
            cash in -1_000_000i64..1_000_000,
        ) {
            let mut planet = planet();
            planet.population = population;
            planet.tax_rate = rate;
            planet.cash = cash;
            let config = EconomyConfig::default();
            let next = collect_taxes(&planet, &config, &mut EventLog::new());
            let revenue = tax_revenue(population, rate);
            let interest = debt_interest(cash + revenue, config.debt_interest_bp);
            prop_assert_eq!(next.cash, cash + revenue - interest);
        }
    }
}
