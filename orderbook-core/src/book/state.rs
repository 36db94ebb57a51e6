//! In-memory order book state and batch application.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::trace;

use orderbook_common::data::{BulkAction, Level, Quotes, Side};
use orderbook_common::tolerance;

/// Mutable per-pair book state. All mutation goes through one instance
/// guarded by the engine's lock; keyed by level id so equal-price levels
/// from different ids coexist. A `BTreeMap` keeps iteration (and therefore
/// equal-price tie ordering in the derived views) stable within a process
/// run.
#[derive(Debug, Default)]
pub struct BookState {
    bids: BTreeMap<String, Level>,
    asks: BTreeMap<String, Level>,

    /// Derived view, strictly price-descending, recomputed once per batch
    bid_levels: Vec<Level>,
    /// Derived view, strictly price-ascending, recomputed once per batch
    ask_levels: Vec<Level>,

    snapshot_loaded: bool,
}

impl BookState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a snapshot has been applied; diffs are dropped until then.
    pub fn snapshot_loaded(&self) -> bool {
        self.snapshot_loaded
    }

    /// Wholesale-replace both sides with the given snapshot levels and
    /// transition to live.
    pub fn apply_snapshot(&mut self, levels: Vec<Level>) {
        self.bids.clear();
        self.asks.clear();

        for level in levels {
            match level.side {
                Side::Bid => {
                    self.bids.insert(level.id.clone(), level);
                }
                Side::Ask => {
                    self.asks.insert(level.id.clone(), level);
                }
                Side::Undefined => {}
            }
        }

        self.recompute();
        self.snapshot_loaded = true;
    }

    /// Apply one bulk's levels (already filtered to the target pair).
    /// Returns whether any entry actually changed; the caller recomputes the
    /// derived views once per batch, not per bulk.
    pub fn apply_bulk(&mut self, action: BulkAction, levels: Vec<Level>) -> bool {
        match action {
            BulkAction::Insert => self.insert_levels(levels),
            BulkAction::Update => self.update_levels(levels),
            BulkAction::Delete => self.delete_levels(levels),
        }
    }

    /// Recompute the sorted derived views from the level maps.
    pub fn recompute(&mut self) {
        self.bid_levels = self.bids.values().cloned().collect();
        self.bid_levels.sort_by(|a, b| cmp_price(b, a));

        self.ask_levels = self.asks.values().cloned().collect();
        self.ask_levels.sort_by(cmp_price);
    }

    pub fn bid_levels(&self) -> &[Level] {
        &self.bid_levels
    }

    pub fn ask_levels(&self) -> &[Level] {
        &self.ask_levels
    }

    pub fn bid_price(&self) -> f64 {
        self.bid_levels.first().and_then(|l| l.price).unwrap_or(0.0)
    }

    pub fn ask_price(&self) -> f64 {
        self.ask_levels.first().and_then(|l| l.price).unwrap_or(0.0)
    }

    pub fn bid_amount(&self) -> f64 {
        self.bid_levels
            .first()
            .and_then(|l| l.amount)
            .unwrap_or(0.0)
    }

    pub fn ask_amount(&self) -> f64 {
        self.ask_levels
            .first()
            .and_then(|l| l.amount)
            .unwrap_or(0.0)
    }

    /// Current top-of-book snapshot; zeros when the book is empty.
    pub fn quotes(&self) -> Quotes {
        Quotes::new(
            self.bid_price(),
            self.ask_price(),
            self.bid_amount(),
            self.ask_amount(),
        )
    }

    /// Find a level by price on one side with tolerance equality.
    pub fn find_by_price(&self, side: Side, price: f64) -> Option<&Level> {
        self.side_map(side)?
            .values()
            .find(|l| tolerance::is_same(l.price.unwrap_or(0.0), price))
    }

    /// Find a level by id on one side.
    pub fn find_by_id(&self, side: Side, id: &str) -> Option<&Level> {
        self.side_map(side)?.get(id)
    }

    fn side_map(&self, side: Side) -> Option<&BTreeMap<String, Level>> {
        match side {
            Side::Bid => Some(&self.bids),
            Side::Ask => Some(&self.asks),
            Side::Undefined => None,
        }
    }

    fn insert_levels(&mut self, levels: Vec<Level>) -> bool {
        let mut changed = false;
        for level in levels {
            if level.side == Side::Undefined {
                continue;
            }
            changed |= self.insert_validated(level);
        }
        changed
    }

    fn update_levels(&mut self, levels: Vec<Level>) -> bool {
        let mut changed = false;
        for level in levels {
            if level.side == Side::Undefined {
                continue;
            }
            // merge unset incoming fields from the existing entry, if any
            let merged = match self.find_by_id(level.side, &level.id) {
                Some(existing) => level.merged_with(existing),
                None => level,
            };
            changed |= self.insert_validated(merged);
        }
        changed
    }

    fn delete_levels(&mut self, levels: Vec<Level>) -> bool {
        let mut changed = false;
        for level in levels {
            let removed = match level.side {
                Side::Bid => self.bids.remove(&level.id),
                Side::Ask => self.asks.remove(&level.id),
                Side::Undefined => None,
            };
            changed |= removed.is_some();
        }
        changed
    }

    fn insert_validated(&mut self, level: Level) -> bool {
        if !level.is_well_formed() {
            trace!(
                id = %level.id,
                price = ?level.price,
                amount = ?level.amount,
                "received malformed level, ignoring"
            );
            return false;
        }
        match level.side {
            Side::Bid => self.bids.insert(level.id.clone(), level),
            Side::Ask => self.asks.insert(level.id.clone(), level),
            Side::Undefined => return false,
        };
        true
    }
}

/// Order two levels by price ascending; levels without a price sort as 0.
fn cmp_price(a: &Level, b: &Level) -> Ordering {
    a.price
        .unwrap_or(0.0)
        .partial_cmp(&b.price.unwrap_or(0.0))
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(id: &str, side: Side, price: f64, amount: f64) -> Level {
        Level::new(id, side, Some(price), Some(amount), Some(3), Some("btcusd"))
    }

    #[test]
    fn snapshot_replaces_both_sides_and_goes_live() {
        let mut state = BookState::new();
        assert!(!state.snapshot_loaded());

        state.apply_snapshot(vec![
            level("b1", Side::Bid, 100.0, 1.0),
            level("a1", Side::Ask, 101.0, 2.0),
        ]);
        assert!(state.snapshot_loaded());
        assert_eq!(state.bid_levels().len(), 1);
        assert_eq!(state.ask_levels().len(), 1);

        state.apply_snapshot(vec![level("b2", Side::Bid, 99.0, 1.0)]);
        assert_eq!(state.bid_levels().len(), 1);
        assert!(state.ask_levels().is_empty());
        assert_eq!(state.bid_price(), 99.0);
    }

    #[test]
    fn derived_views_are_sorted_without_duplicate_ids() {
        let mut state = BookState::new();
        state.apply_snapshot(vec![
            level("b1", Side::Bid, 100.0, 1.0),
            level("b2", Side::Bid, 103.0, 1.0),
            level("b3", Side::Bid, 101.0, 1.0),
            level("a1", Side::Ask, 106.0, 1.0),
            level("a2", Side::Ask, 104.0, 1.0),
            level("a3", Side::Ask, 105.0, 1.0),
        ]);

        let bid_prices: Vec<f64> = state.bid_levels().iter().filter_map(|l| l.price).collect();
        assert_eq!(bid_prices, [103.0, 101.0, 100.0]);

        let ask_prices: Vec<f64> = state.ask_levels().iter().filter_map(|l| l.price).collect();
        assert_eq!(ask_prices, [104.0, 105.0, 106.0]);
    }

    #[test]
    fn equal_price_tie_order_is_stable_across_recomputes() {
        let mut state = BookState::new();
        state.apply_snapshot(vec![
            level("x", Side::Bid, 100.0, 1.0),
            level("y", Side::Bid, 100.0, 2.0),
            level("z", Side::Bid, 100.0, 3.0),
        ]);

        let first: Vec<String> = state.bid_levels().iter().map(|l| l.id.clone()).collect();
        state.recompute();
        let second: Vec<String> = state.bid_levels().iter().map(|l| l.id.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn update_of_unknown_id_behaves_as_insert() {
        let mut state = BookState::new();
        state.apply_snapshot(vec![level("b1", Side::Bid, 100.0, 1.0)]);

        let changed = state.apply_bulk(
            BulkAction::Update,
            vec![level("b2", Side::Bid, 99.0, 5.0)],
        );
        assert!(changed);
        assert_eq!(state.find_by_id(Side::Bid, "b2").unwrap().amount, Some(5.0));
    }

    #[test]
    fn malformed_levels_are_rejected_silently() {
        let mut state = BookState::new();
        state.apply_snapshot(vec![level("b1", Side::Bid, 100.0, 1.0)]);

        let changed = state.apply_bulk(
            BulkAction::Insert,
            vec![
                Level::new("", Side::Bid, Some(99.0), Some(1.0), None, Some("btcusd")),
                Level::new("b2", Side::Bid, None, Some(1.0), None, Some("btcusd")),
                Level::new("b3", Side::Bid, Some(98.0), None, None, Some("btcusd")),
            ],
        );
        assert!(!changed);
        state.recompute();
        assert_eq!(state.bid_levels().len(), 1);
    }

    #[test]
    fn undefined_side_levels_are_skipped_everywhere() {
        let mut state = BookState::new();
        state.apply_snapshot(vec![
            level("b1", Side::Bid, 100.0, 1.0),
            level("u1", Side::Undefined, 101.0, 1.0),
        ]);
        assert_eq!(state.bid_levels().len(), 1);
        assert!(state.ask_levels().is_empty());
        assert!(state.find_by_id(Side::Undefined, "u1").is_none());

        let changed = state.apply_bulk(
            BulkAction::Insert,
            vec![level("u2", Side::Undefined, 99.0, 1.0)],
        );
        assert!(!changed);

        let changed = state.apply_bulk(
            BulkAction::Update,
            vec![level("b1", Side::Undefined, 100.0, 9.0)],
        );
        assert!(!changed);

        let changed = state.apply_bulk(
            BulkAction::Delete,
            vec![Level::new("b1", Side::Undefined, None, None, None, Some("btcusd"))],
        );
        assert!(!changed);

        state.recompute();
        assert_eq!(state.bid_levels().len(), 1);
        assert_eq!(state.find_by_id(Side::Bid, "b1").unwrap().amount, Some(1.0));
    }

    #[test]
    fn delete_of_unknown_id_is_a_noop() {
        let mut state = BookState::new();
        state.apply_snapshot(vec![level("b1", Side::Bid, 100.0, 1.0)]);

        let changed = state.apply_bulk(
            BulkAction::Delete,
            vec![Level::new("nope", Side::Bid, None, None, None, Some("btcusd"))],
        );
        assert!(!changed);
        assert_eq!(state.bid_levels().len(), 1);
    }
}
