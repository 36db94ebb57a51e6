//! Source abstraction for order book data.
//!
//! An [`OrderBookSource`] decouples a provider's raw cadence from the engine:
//! it emits full-book snapshots on one stream and batches of incremental diff
//! bulks on another. Concrete sources embed a [`SourceBuffer`] to queue raw
//! payloads and convert them on a configurable interval.

pub mod buffer;
pub mod errors;

// Re-export main interfaces
pub use buffer::SourceBuffer;
pub use errors::{SourceError, SourceResult};

use async_trait::async_trait;
use tokio::sync::broadcast;

use orderbook_common::data::LevelBulk;

/// A normalized level 2 order book source, shared by any number of
/// [`CryptoOrderBook`](crate::book::CryptoOrderBook) instances bound to
/// different pairs.
///
/// Both streams are future-only: a new subscriber sees nothing emitted
/// before it subscribed.
#[async_trait]
pub trait OrderBookSource: Send + Sync {
    /// Origin exchange name.
    fn exchange_name(&self) -> &str;

    /// Stream of full-book snapshot bulks. One bulk is emitted whenever a
    /// fresh snapshot is available: initial subscribe, reconnect, or an
    /// explicit [`load_snapshot`](OrderBookSource::load_snapshot).
    fn snapshot_stream(&self) -> broadcast::Receiver<LevelBulk>;

    /// Stream of incremental diff batches, in source emission order.
    fn diff_stream(&self) -> broadcast::Receiver<Vec<LevelBulk>>;

    /// Whether this source supports on-demand snapshot reload. Sources that
    /// cannot support it report the capability as disabled rather than
    /// failing the reload call.
    fn load_snapshot_enabled(&self) -> bool {
        false
    }

    /// Request a fresh snapshot for the given pair, fire-and-forget: the
    /// result is surfaced only via the snapshot stream.
    async fn load_snapshot(&self, pair: &str, depth: usize) -> SourceResult<()>;
}
