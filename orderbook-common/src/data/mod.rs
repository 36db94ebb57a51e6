//! Normalized order book data model.
//!
//! Immutable value types shared by every source and engine instance:
//! - [`Level`] - one aggregated price point on one side of the book
//! - [`LevelBulk`] - a batch of levels sharing one action, applied atomically
//! - [`Quotes`] - top-of-book bid/ask snapshot
//! - [`ChangeInfo`] - payload carried by the engine's notification streams

pub mod bulk;
pub mod change;
pub mod level;
pub mod quotes;

// Re-export the model types
pub use bulk::{BookType, BulkAction, LevelBulk};
pub use change::ChangeInfo;
pub use level::{Level, Side};
pub use quotes::Quotes;
