// orderbook-common: Shared order book model and utilities
// Used by orderbook-core (reconstruction engine) and exchange adapters

pub mod data;
pub mod logging;
pub mod pairs;
pub mod tolerance;
