//! Atomic batches of level changes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::level::Level;

/// Action shared by all levels of one bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkAction {
    /// Add new levels
    Insert,
    /// Update existing levels (falls back to insert for unknown ids)
    Update,
    /// Remove levels by id
    Delete,
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkAction::Insert => write!(f, "INSERT"),
            BulkAction::Update => write!(f, "UPDATE"),
            BulkAction::Delete => write!(f, "DELETE"),
        }
    }
}

/// Granularity of the book a bulk describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BookType {
    /// Top of book only
    L1,
    /// Aggregated price levels
    #[default]
    L2,
    /// Order-level book
    L3,
}

/// An ordered batch of levels sharing one action. One atomic
/// state-transition unit for the order book engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelBulk {
    /// Action applied to every level in this bulk
    pub action: BulkAction,

    /// Levels in source emission order
    pub levels: Vec<Level>,

    /// Origin exchange, stamped by the source
    #[serde(default)]
    pub exchange: String,

    /// Book granularity
    #[serde(default)]
    pub book_type: BookType,
}

impl LevelBulk {
    /// Create a new L2 bulk.
    pub fn new(action: BulkAction, levels: Vec<Level>) -> Self {
        Self {
            action,
            levels,
            exchange: String::new(),
            book_type: BookType::L2,
        }
    }

    /// Whether any level of this bulk belongs to the given normalized pair.
    pub fn has_pair(&self, pair: &str) -> bool {
        self.levels.iter().any(|level| level.is_for_pair(pair))
    }
}
