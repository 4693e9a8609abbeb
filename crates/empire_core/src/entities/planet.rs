//! Planets.

use serde::{Deserialize, Serialize};

use super::{EntityId, Item, OwnerId};
use crate::math::Vec2Fixed;

/// Stock and production setting of one item on a planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemStock {
    /// Units in storage.
    pub quantity: u64,
    /// Production allocation per production pass, before modifiers.
    pub rate: u32,
}

/// A planet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planet {
    /// Unique planet id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Owning player; `None` for free planets.
    pub owner: Option<OwnerId>,
    /// Position in the galaxy.
    pub position: Vec2Fixed,
    /// Environment rating (1 hostile .. 5 excellent).
    pub environment: u8,
    /// Resource rating (1 poor .. 5 superior).
    pub resources: u8,
    /// Technology level; each level adds 10% production.
    pub technology: u8,
    /// Stock of every item, indexed by [`Item::index`].
    pub stocks: [ItemStock; Item::COUNT],
    /// Storage cap per item.
    pub max_quantity: u64,
    /// Treasury; negative means debt.
    pub cash: i64,
    /// Tax rate in percent.
    pub tax_rate: u8,
    /// Civilian population.
    pub population: u64,
    /// Consecutive taxation passes that ended in debt.
    pub warnings: u32,
    /// Wall-clock second of the most recent attack on the planet.
    pub last_attacked: Option<u64>,
}

impl Planet {
    /// Stock of an item.
    #[must_use]
    pub fn stock(&self, item: Item) -> &ItemStock {
        &self.stocks[item.index()]
    }

    /// Mutable stock of an item.
    pub fn stock_mut(&mut self, item: Item) -> &mut ItemStock {
        &mut self.stocks[item.index()]
    }

    /// Quantity of an item.
    #[must_use]
    pub fn quantity(&self, item: Item) -> u64 {
        self.stock(item).quantity
    }

    /// Outstanding debt (zero when cash is positive).
    #[must_use]
    pub fn debt(&self) -> i64 {
        (-self.cash).max(0)
    }
}
