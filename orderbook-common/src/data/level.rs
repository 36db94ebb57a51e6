//! A single aggregated price level.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pairs;

/// Side of the order book a level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    /// Bid side (buyers)
    Bid,
    /// Ask side (sellers)
    Ask,
    /// Unrecognized side from the provider; such levels are skipped
    Undefined,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "BID"),
            Side::Ask => write!(f, "ASK"),
            Side::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

/// One aggregated price level of the order book.
///
/// Price, amount and count are stored as absolute values regardless of the
/// sign used by the source payload; the pair is normalized on construction.
/// Levels are immutable - an update produces a new instance via
/// [`Level::merged_with`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Unique identification of this level (per side and pair)
    pub id: String,

    /// Side of the book
    pub side: Side,

    /// Price of this level, if provided
    pub price: Option<f64>,

    /// Total amount available at this level, if provided
    pub amount: Option<f64>,

    /// Number of orders at this level, if provided
    pub count: Option<u32>,

    /// Normalized pair this level belongs to
    pub pair: Option<String>,
}

impl Level {
    /// Create a new level, normalizing price/amount/count to absolute values
    /// and cleaning the pair. A negative input is a source-side defect that is
    /// corrected silently, not rejected.
    pub fn new(
        id: impl Into<String>,
        side: Side,
        price: Option<f64>,
        amount: Option<f64>,
        count: Option<i32>,
        pair: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            side,
            price: price.map(f64::abs),
            amount: amount.map(f64::abs),
            count: count.map(i32::unsigned_abs),
            pair: pair.map(pairs::normalize),
        }
    }

    /// Check whether the level carries enough data to be stored in a book:
    /// a non-empty id plus both price and amount.
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && self.price.is_some() && self.amount.is_some()
    }

    /// Check whether this level belongs to the given normalized pair.
    pub fn is_for_pair(&self, pair: &str) -> bool {
        self.pair.as_deref() == Some(pair)
    }

    /// Produce the level that results from applying `self` as an update on top
    /// of `existing`: fields unset on the update are carried over from the
    /// existing value. Zero is an explicit value - only absence merges.
    pub fn merged_with(&self, existing: &Level) -> Level {
        Level {
            id: existing.id.clone(),
            side: existing.side,
            price: self.price.or(existing.price),
            amount: self.amount.or(existing.amount),
            count: self.count.or(existing.count),
            pair: self.pair.clone().or_else(|| existing.pair.clone()),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {:?}@{:?}",
            self.pair.as_deref().unwrap_or("?"),
            self.side,
            self.amount,
            self.price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_normalizes_to_absolute_values() {
        let level = Level::new(
            "1",
            Side::Bid,
            Some(-100.5),
            Some(-3.25),
            Some(-7),
            Some("BTC/USD"),
        );

        assert_eq!(level.price, Some(100.5));
        assert_eq!(level.amount, Some(3.25));
        assert_eq!(level.count, Some(7));
        assert_eq!(level.pair.as_deref(), Some("btcusd"));
    }

    #[test]
    fn merge_carries_unset_fields_from_existing() {
        let existing = Level::new("1", Side::Bid, Some(100.0), Some(5.0), Some(3), Some("btcusd"));
        let update = Level::new("1", Side::Bid, None, Some(9.0), None, None);

        let merged = update.merged_with(&existing);

        assert_eq!(merged.price, Some(100.0));
        assert_eq!(merged.amount, Some(9.0));
        assert_eq!(merged.count, Some(3));
        assert_eq!(merged.pair.as_deref(), Some("btcusd"));
    }

    #[test]
    fn merge_treats_zero_as_explicit_value() {
        let existing = Level::new("1", Side::Ask, Some(100.0), Some(5.0), None, Some("btcusd"));
        let update = Level::new("1", Side::Ask, None, Some(0.0), None, None);

        let merged = update.merged_with(&existing);
        assert_eq!(merged.amount, Some(0.0));
    }

    #[test]
    fn well_formed_requires_id_price_and_amount() {
        let ok = Level::new("1", Side::Bid, Some(1.0), Some(1.0), None, Some("btcusd"));
        assert!(ok.is_well_formed());

        let no_id = Level::new("  ", Side::Bid, Some(1.0), Some(1.0), None, Some("btcusd"));
        assert!(!no_id.is_well_formed());

        let no_price = Level::new("1", Side::Bid, None, Some(1.0), None, Some("btcusd"));
        assert!(!no_price.is_well_formed());

        let no_amount = Level::new("1", Side::Bid, Some(1.0), None, None, Some("btcusd"));
        assert!(!no_amount.is_well_formed());
    }
}
