// orderbook-core: L2 order book reconstruction and live-notification engine
// Consumes snapshot/diff streams from a source and maintains per-pair books

pub mod book;
pub mod config;
pub mod source;

// Re-export main interfaces for easy access
pub use book::CryptoOrderBook;
pub use config::OrderBookConfig;
pub use source::{OrderBookSource, SourceBuffer, SourceError, SourceResult};
