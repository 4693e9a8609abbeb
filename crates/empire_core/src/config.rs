//! Engine tuning.
//!
//! Every constant the engines use lives here so the external scheduler can
//! load a balance file instead of recompiling. [`EngineConfig::default`]
//! reproduces the classic game's numbers. Configs are RON documents; any
//! section or field left out falls back to its default.
//!
//! Distances are whole galactic units, chances are percentages unless the
//! field name says otherwise, fractional values use [`Fixed`] raw bits like
//! the rest of the snapshot format.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entities::WeaponKind;
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed};

/// All engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Ship physics.
    pub movement: MovementConfig,
    /// Per-tick ship housekeeping.
    pub upkeep: UpkeepConfig,
    /// Weapons and damage.
    pub combat: CombatConfig,
    /// Cyborg and Droid behavior.
    pub ai: AiConfig,
    /// Planet production, taxes, population.
    pub economy: EconomyConfig,
    /// Mines, wormholes and beacons.
    pub hazards: HazardConfig,
}

impl EngineConfig {
    /// Parse a config from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron).map_err(|e| GameError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| GameError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_ron_str(&contents)
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::Config(e.to_string()))
    }

    /// Reject values that would make the engines misbehave.
    pub fn validate(&self) -> Result<()> {
        let table = &self.combat.shield_absorption;
        if table.windows(2).any(|w| w[0] > w[1]) {
            return Err(GameError::Config(
                "shield absorption must not decrease with shield type".into(),
            ));
        }
        if table.iter().any(|&p| p > 100) {
            return Err(GameError::Config("shield absorption above 100%".into()));
        }
        for weapon in [
            WeaponKind::Phaser,
            WeaponKind::HyperPhaser,
            WeaponKind::Torpedo,
            WeaponKind::Missile,
            WeaponKind::IonCannon,
        ] {
            let spec = self.combat.weapon(weapon);
            if spec.min_damage > spec.max_damage {
                return Err(GameError::Config(format!(
                    "{weapon:?}: min damage exceeds max damage"
                )));
            }
            if spec.optimal_range == 0 {
                return Err(GameError::Config(format!("{weapon:?}: zero optimal range")));
            }
        }
        let odds = [
            self.combat.decoy_odds,
            self.economy.revolt_odds,
        ];
        if odds.contains(&0) {
            return Err(GameError::Config("odds must be at least 1".into()));
        }
        if self.ai.droid_update_interval == 0 {
            return Err(GameError::Config("droid update interval must be at least 1".into()));
        }
        if self.economy.max_tax_rate > 100 {
            return Err(GameError::Config("tax rate ceiling above 100%".into()));
        }
        if self.economy.starvation_divisor == 0 {
            return Err(GameError::Config("starvation divisor must be at least 1".into()));
        }
        Ok(())
    }
}

/// Ship physics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Braking is this many times stronger than acceleration.
    pub decel_factor: u32,
    /// Energy per degree turned.
    #[serde(with = "fixed_serde")]
    pub turn_cost: Fixed,
    /// Energy per unit of speed change.
    #[serde(with = "fixed_serde")]
    pub accel_cost: Fixed,
    /// Speeds above this drain energy while cruising.
    pub cruise_speed: u32,
    /// Energy drained per second above cruise speed.
    #[serde(with = "fixed_serde")]
    pub cruise_drain: Fixed,
    /// How far inside the edge a zipped ship lands.
    pub zipper_margin: u32,
    /// Landing spot must be this far from mines and ships.
    pub zipper_clearance: u32,
    /// Inward steps tried before falling back to wraparound.
    pub zipper_attempts: u32,
    /// Hull damage taken when zipped.
    pub zipper_damage: u32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            decel_factor: 2,
            turn_cost: Fixed::from_num(0.5),
            accel_cost: Fixed::from_num(0.05),
            cruise_speed: 1000,
            cruise_drain: Fixed::from_num(5),
            zipper_margin: 2000,
            zipper_clearance: 1000,
            zipper_attempts: 5,
            zipper_damage: 10,
        }
    }
}

/// Per-tick ship housekeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpkeepConfig {
    /// Energy per second to keep shields raised.
    #[serde(with = "fixed_serde")]
    pub shield_drain: Fixed,
    /// Shields drop when energy falls below this.
    pub shield_min_energy: u32,
    /// Shield charge regained per second while raised.
    #[serde(with = "fixed_serde")]
    pub shield_recharge: Fixed,
    /// Energy per second per cloak level.
    #[serde(with = "fixed_serde")]
    pub cloak_drain: Fixed,
}

impl Default for UpkeepConfig {
    fn default() -> Self {
        Self {
            shield_drain: Fixed::from_num(2),
            shield_min_energy: 50,
            shield_recharge: Fixed::from_num(5),
            cloak_drain: Fixed::from_num(3),
        }
    }
}

/// Stats of one weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Lowest raw damage roll.
    pub min_damage: u32,
    /// Highest raw damage roll.
    pub max_damage: u32,
    /// Maximum range.
    pub range: u32,
    /// Full damage inside this range.
    pub optimal_range: u32,
    /// Energy per shot.
    pub energy_cost: u32,
    /// Base hit chance in percent.
    pub accuracy: u8,
    /// Ticks before the weapon may fire again.
    pub cooldown_ticks: u32,
}

impl WeaponSpec {
    const fn new(
        min_damage: u32,
        max_damage: u32,
        range: u32,
        optimal_range: u32,
        energy_cost: u32,
        accuracy: u8,
        cooldown_ticks: u32,
    ) -> Self {
        Self {
            min_damage,
            max_damage,
            range,
            optimal_range,
            energy_cost,
            accuracy,
            cooldown_ticks,
        }
    }
}

/// Weapons and damage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Phaser stats.
    pub phaser: WeaponSpec,
    /// Hyper-phaser stats.
    pub hyper_phaser: WeaponSpec,
    /// Torpedo stats.
    pub torpedo: WeaponSpec,
    /// Missile stats.
    pub missile: WeaponSpec,
    /// Ion cannon stats.
    pub ion_cannon: WeaponSpec,
    /// Absorption percent for shield types 0..=19. Must not decrease.
    pub shield_absorption: [u8; 20],
    /// Shield charge lost per point of damage absorbed.
    #[serde(with = "fixed_serde")]
    pub shield_charge_drain: Fixed,
    /// Shield charge an ion cannon hit strips.
    pub ion_shield_drain: u32,
    /// Chance of a critical hit.
    pub crit_chance: u8,
    /// Critical damage multiplier.
    #[serde(with = "fixed_serde")]
    pub crit_multiplier: Fixed,
    /// Range falloff never reduces damage below this fraction.
    #[serde(with = "fixed_serde")]
    pub min_range_factor: Fixed,
    /// Guided weapon accuracy lost against a jamming target.
    pub jammer_effectiveness: u8,
    /// One in this many guided shots is spoofed by a decoy.
    pub decoy_odds: u32,
    /// Accuracy lost per cloak level of the target.
    pub cloak_accuracy_penalty: u8,
    /// Hull damage a single hit must deal to risk subsystem damage.
    pub system_damage_threshold: u32,
    /// Chance of subsystem damage for a 100-point hit (scaled by damage).
    pub system_damage_chance: u8,
    /// Smallest subsystem damage roll.
    pub system_damage_min: u32,
    /// Largest subsystem damage roll.
    pub system_damage_max: u32,
    /// Combat passes between arming and detonation.
    pub self_destruct_countdown: u32,
    /// Base blast damage at ground zero.
    pub blast_base: u32,
    /// Base blast radius.
    pub blast_radius: u32,
    /// Ticks a jammer runs once activated.
    pub jammer_duration: u32,
    /// Ticks before a freshly laid mine arms.
    pub mine_arm_ticks: u32,
    /// Damage potential of a laid mine.
    pub mine_damage: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            phaser: WeaponSpec::new(8, 14, 100_000, 30_000, 100, 85, 1),
            hyper_phaser: WeaponSpec::new(20, 35, 150_000, 50_000, 500, 80, 10),
            torpedo: WeaponSpec::new(20, 30, 200_000, 80_000, 200, 75, 2),
            missile: WeaponSpec::new(15, 25, 150_000, 60_000, 150, 80, 2),
            ion_cannon: WeaponSpec::new(10, 18, 120_000, 40_000, 300, 70, 5),
            shield_absorption: [
                0, 10, 20, 30, 40, 50, 55, 60, 65, 70, 75, 78, 81, 84, 87, 90, 91, 92, 93, 95,
            ],
            shield_charge_drain: Fixed::from_num(0.5),
            ion_shield_drain: 50,
            crit_chance: 10,
            crit_multiplier: Fixed::from_num(2.5),
            min_range_factor: Fixed::from_num(0.1),
            jammer_effectiveness: 70,
            decoy_odds: 3,
            cloak_accuracy_penalty: 15,
            system_damage_threshold: 10,
            system_damage_chance: 15,
            system_damage_min: 5,
            system_damage_max: 25,
            self_destruct_countdown: 10,
            blast_base: 200,
            blast_radius: 30_000,
            jammer_duration: 10,
            mine_arm_ticks: 3,
            mine_damage: 100,
        }
    }
}

impl CombatConfig {
    /// Stats of a weapon.
    #[must_use]
    pub fn weapon(&self, kind: WeaponKind) -> &WeaponSpec {
        match kind {
            WeaponKind::Phaser => &self.phaser,
            WeaponKind::HyperPhaser => &self.hyper_phaser,
            WeaponKind::Torpedo => &self.torpedo,
            WeaponKind::Missile => &self.missile,
            WeaponKind::IonCannon => &self.ion_cannon,
        }
    }

    /// Absorption fraction of a shield type at full charge.
    #[must_use]
    pub fn absorption(&self, shield_type: u8) -> Fixed {
        let idx = usize::from(shield_type).min(self.shield_absorption.len() - 1);
        crate::math::percent(i64::from(self.shield_absorption[idx]))
    }
}

/// Cyborg and Droid behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Cyborgs retreat above this hull damage.
    pub cyborg_flee_damage: u32,
    /// Retreating cyborgs resume below this hull damage.
    pub cyborg_recover_damage: u32,
    /// Ticks a mine-laying cyborg waits between mines.
    pub mine_lay_interval: u32,
    /// Shortest patrol leg in ticks.
    pub patrol_hold_min: u32,
    /// Longest patrol leg in ticks.
    pub patrol_hold_max: u32,
    /// Patrol speed as a percentage of max speed.
    pub cruise_percent: u8,
    /// Targets closer than this are approached at quarter speed.
    pub close_range: u32,
    /// Targets closer than this are approached at half speed.
    pub mid_range: u32,
    /// Phasers are preferred above this energy.
    pub phaser_energy: u32,
    /// Torpedoes are preferred above this energy.
    pub torpedo_energy: u32,
    /// Droids switch to self-repair above this hull damage.
    pub droid_repair_damage: u32,
    /// Droids stop repairing below this hull damage.
    pub droid_repaired_damage: u32,
    /// Energy spent per hull point repaired.
    pub repair_energy_per_point: u32,
    /// Ticks between scheduled droid re-evaluations.
    pub droid_update_interval: u32,
    /// Intruders this close to home make a droid defend.
    pub defend_radius: u32,
    /// Droids rest below this percentage of max energy.
    pub rest_energy_percent: u8,
    /// Resting droids resume above this percentage of max energy.
    pub resume_energy_percent: u8,
    /// Length of one droid patrol leg.
    pub patrol_leg_length: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            cyborg_flee_damage: 50,
            cyborg_recover_damage: 25,
            mine_lay_interval: 5,
            patrol_hold_min: 10,
            patrol_hold_max: 30,
            cruise_percent: 50,
            close_range: 30_000,
            mid_range: 80_000,
            phaser_energy: 500,
            torpedo_energy: 200,
            droid_repair_damage: 60,
            droid_repaired_damage: 20,
            repair_energy_per_point: 10,
            droid_update_interval: 5,
            defend_radius: 50_000,
            rest_energy_percent: 25,
            resume_energy_percent: 75,
            patrol_leg_length: 40_000,
        }
    }
}

/// Planet production, taxes, population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Production modifier (percent) for environment ratings 1..=5.
    pub environment_modifiers: [u16; 5],
    /// Production modifier (percent) for resource ratings 1..=5.
    pub resource_modifiers: [u16; 5],
    /// Production bonus per technology level, in percent.
    pub technology_step: u16,
    /// Tax rate ceiling, in percent. At most 100.
    pub max_tax_rate: u8,
    /// Interest on debt per taxation pass, in basis points.
    pub debt_interest_bp: u32,
    /// Consecutive indebted passes before the tax rate is cut.
    pub warning_threshold: u32,
    /// Tax rate reduction applied at the threshold.
    pub tax_cut_step: u8,
    /// Base population growth per pass, in basis points.
    pub base_growth_bp: u32,
    /// Population capacity per environment point.
    pub capacity_per_environment: u64,
    /// Growth lost per outstanding warning, in percent.
    pub warning_growth_penalty: u8,
    /// Growth is halved for this many seconds after an attack.
    pub attack_recovery_seconds: u64,
    /// Mouths fed by one unit of food.
    pub mouths_per_food: u64,
    /// Starvation kills one in this many of each group.
    pub starvation_divisor: u64,
    /// One in this many eligible passes an overtaxed planet revolts.
    pub revolt_odds: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            environment_modifiers: [50, 70, 100, 130, 160],
            resource_modifiers: [60, 80, 100, 140, 180],
            technology_step: 10,
            max_tax_rate: 100,
            debt_interest_bp: 100,
            warning_threshold: 3,
            tax_cut_step: 5,
            base_growth_bp: 200,
            capacity_per_environment: 50_000,
            warning_growth_penalty: 25,
            attack_recovery_seconds: 600,
            mouths_per_food: 100,
            starvation_divisor: 8,
            revolt_odds: 10,
        }
    }
}

/// Mines, wormholes and beacons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Detonation radius of a mine.
    pub mine_radius: u32,
    /// Detonation chance lost per cloak level of the ship.
    pub cloak_evasion: u8,
    /// Detonation chance lost per sensor point, in basis points (visible mines only).
    pub sensor_evasion_bp: u32,
    /// Detonation chance never drops below this.
    pub min_detonation_chance: u8,
    /// Distance from a wormhole entry that counts as "at" the entry.
    pub wormhole_radius: u32,
    /// Hull damage per point of missing stability.
    #[serde(with = "fixed_serde")]
    pub transit_damage_factor: Fixed,
    /// Stability lost per transit.
    pub transit_wear: u8,
    /// Beacon broadcast range.
    pub beacon_range: u32,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            mine_radius: 10_000,
            cloak_evasion: 15,
            sensor_evasion_bp: 50,
            min_detonation_chance: 5,
            wormhole_radius: 1000,
            transit_damage_factor: Fixed::from_num(0.25),
            transit_wear: 5,
            beacon_range: 10_000,
        }
    }
}
