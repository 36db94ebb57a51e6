//! Notification payload emitted by the order book engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::level::Level;
use super::quotes::Quotes;

/// Payload shared by all three change-notification streams for one applied
/// batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeInfo {
    /// Origin exchange name
    pub exchange: String,

    /// Normalized target pair
    pub pair: String,

    /// Top-of-book state after the batch was applied
    pub quotes: Quotes,

    /// Levels touched by the triggering batch. Populated only when the
    /// engine's debug mode is enabled; empty otherwise to keep the hot
    /// path allocation-free.
    pub levels: Vec<Level>,

    /// When the batch was applied
    pub ts: DateTime<Utc>,
}

impl ChangeInfo {
    pub fn new(
        exchange: impl Into<String>,
        pair: impl Into<String>,
        quotes: Quotes,
        levels: Vec<Level>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            pair: pair.into(),
            quotes,
            levels,
            ts: Utc::now(),
        }
    }
}
