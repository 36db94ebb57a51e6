//! Top-of-book quote snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable top-of-book snapshot. Prices and amounts default to 0 when the
/// corresponding side of the book is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quotes {
    /// Top level bid price
    pub bid: f64,

    /// Top level ask price
    pub ask: f64,

    /// Mid price, computed at construction
    pub mid: f64,

    /// Top level bid amount
    pub bid_amount: f64,

    /// Top level ask amount
    pub ask_amount: f64,
}

impl Quotes {
    /// Create quotes; the mid price is derived from bid and ask.
    pub fn new(bid: f64, ask: f64, bid_amount: f64, ask_amount: f64) -> Self {
        Self {
            bid,
            ask,
            mid: (bid + ask) / 2.0,
            bid_amount,
            ask_amount,
        }
    }

    /// Quotes are valid iff the book is not crossed.
    pub fn is_valid(&self) -> bool {
        self.bid <= self.ask
    }
}

impl fmt::Display for Quotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bid: {}/{}, ask: {}/{}",
            self.bid, self.bid_amount, self.ask, self.ask_amount
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_is_computed_at_construction() {
        let quotes = Quotes::new(100.0, 102.0, 1.0, 2.0);
        assert_eq!(quotes.mid, 101.0);
    }

    #[test]
    fn crossed_quotes_are_invalid() {
        assert!(Quotes::new(100.0, 102.0, 1.0, 2.0).is_valid());
        assert!(Quotes::new(100.0, 100.0, 1.0, 2.0).is_valid());
        assert!(!Quotes::new(103.0, 102.0, 1.0, 2.0).is_valid());
    }
}
