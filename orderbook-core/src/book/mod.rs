//! Per-pair order book reconstruction engine.

pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use orderbook_common::data::{ChangeInfo, Level, LevelBulk, Quotes, Side};
use orderbook_common::{pairs, tolerance};

use crate::config::OrderBookConfig;
use crate::source::OrderBookSource;
use state::BookState;

const NOTIFY_CAPACITY: usize = 1024;

/// Depth requested on supervised snapshot reloads.
const RELOAD_DEPTH: usize = 10_000;

/// Default interval for the snapshot reload supervisor.
const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Order book engine for one (source, target pair) binding.
///
/// Construction subscribes to the source's snapshot and diff streams
/// immediately; both are consumed by background tasks that serialize all
/// mutation through one lock, closing the race between concurrent snapshot
/// and diff delivery. Multiple engines bound to different pairs can share
/// one source - each filters independently.
///
/// Dropping the engine releases both subscriptions and the reload timer.
pub struct CryptoOrderBook {
    inner: Arc<BookInner>,
    consumer_tasks: Vec<JoinHandle<()>>,
}

struct BookInner {
    source: Arc<dyn OrderBookSource>,
    /// Normalized pair this book is bound to
    target_pair: String,
    /// Pair exactly as provided by the caller, used for reload requests
    target_pair_original: String,

    state: Mutex<BookState>,

    debug_enabled: AtomicBool,
    reload_enabled: AtomicBool,
    reload_interval: Mutex<Duration>,
    reload_task: Mutex<Option<JoinHandle<()>>>,

    book_updated_tx: broadcast::Sender<ChangeInfo>,
    bid_ask_tx: broadcast::Sender<ChangeInfo>,
    top_level_tx: broadcast::Sender<ChangeInfo>,
}

impl CryptoOrderBook {
    /// Bind a new engine to `target_pair` on the given source and start
    /// consuming both streams. Snapshot reloading is disabled by default.
    pub fn new(target_pair: &str, source: Arc<dyn OrderBookSource>) -> Self {
        let (book_updated_tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        let (bid_ask_tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        let (top_level_tx, _) = broadcast::channel(NOTIFY_CAPACITY);

        // subscribe before returning so nothing emitted after construction
        // is missed
        let snapshot_rx = source.snapshot_stream();
        let diff_rx = source.diff_stream();

        let inner = Arc::new(BookInner {
            source,
            target_pair: pairs::normalize(target_pair),
            target_pair_original: target_pair.to_string(),
            state: Mutex::new(BookState::new()),
            debug_enabled: AtomicBool::new(false),
            reload_enabled: AtomicBool::new(false),
            reload_interval: Mutex::new(DEFAULT_RELOAD_INTERVAL),
            reload_task: Mutex::new(None),
            book_updated_tx,
            bid_ask_tx,
            top_level_tx,
        });

        let consumer_tasks = vec![
            Self::spawn_snapshot_consumer(Arc::clone(&inner), snapshot_rx),
            Self::spawn_diff_consumer(Arc::clone(&inner), diff_rx),
        ];

        Self {
            inner,
            consumer_tasks,
        }
    }

    /// Origin exchange name.
    pub fn exchange_name(&self) -> &str {
        self.inner.source.exchange_name()
    }

    /// Normalized target pair for this book.
    pub fn target_pair(&self) -> &str {
        &self.inner.target_pair
    }

    /// Target pair exactly as provided by the caller.
    pub fn target_pair_original(&self) -> &str {
        &self.inner.target_pair_original
    }

    /// Whether a snapshot has been applied yet.
    pub fn is_snapshot_loaded(&self) -> bool {
        self.inner.state.lock().snapshot_loaded()
    }

    /// Current bid side, ordered from higher to lower price.
    pub fn bid_levels(&self) -> Vec<Level> {
        self.inner.state.lock().bid_levels().to_vec()
    }

    /// Current ask side, ordered from lower to higher price.
    pub fn ask_levels(&self) -> Vec<Level> {
        self.inner.state.lock().ask_levels().to_vec()
    }

    /// All current levels together, bids first.
    pub fn levels(&self) -> Vec<Level> {
        let state = self.inner.state.lock();
        let mut all = state.bid_levels().to_vec();
        all.extend_from_slice(state.ask_levels());
        all
    }

    /// Current top level bid price (0 when empty).
    pub fn bid_price(&self) -> f64 {
        self.inner.state.lock().bid_price()
    }

    /// Current top level ask price (0 when empty).
    pub fn ask_price(&self) -> f64 {
        self.inner.state.lock().ask_price()
    }

    /// Current top level bid amount (0 when empty).
    pub fn bid_amount(&self) -> f64 {
        self.inner.state.lock().bid_amount()
    }

    /// Current top level ask amount (0 when empty).
    pub fn ask_amount(&self) -> f64 {
        self.inner.state.lock().ask_amount()
    }

    /// Current mid price.
    pub fn mid_price(&self) -> f64 {
        self.quotes().mid
    }

    /// Current top-of-book snapshot.
    pub fn quotes(&self) -> Quotes {
        self.inner.state.lock().quotes()
    }

    /// Find a bid level by price (tolerance equality).
    pub fn find_bid_level_by_price(&self, price: f64) -> Option<Level> {
        self.inner
            .state
            .lock()
            .find_by_price(Side::Bid, price)
            .cloned()
    }

    /// Find an ask level by price (tolerance equality).
    pub fn find_ask_level_by_price(&self, price: f64) -> Option<Level> {
        self.inner
            .state
            .lock()
            .find_by_price(Side::Ask, price)
            .cloned()
    }

    /// Find a bid level by id.
    pub fn find_bid_level_by_id(&self, id: &str) -> Option<Level> {
        self.inner.state.lock().find_by_id(Side::Bid, id).cloned()
    }

    /// Find an ask level by id.
    pub fn find_ask_level_by_id(&self, id: &str) -> Option<Level> {
        self.inner.state.lock().find_by_id(Side::Ask, id).cloned()
    }

    /// Find a level by id; the caller must supply the side
    /// ([`Side::Undefined`] finds nothing).
    pub fn find_level_by_id(&self, id: &str, side: Side) -> Option<Level> {
        self.inner.state.lock().find_by_id(side, id).cloned()
    }

    /// Stream fired on every applied batch (snapshot or diff) that changed
    /// this book. Future-only, no replay.
    pub fn book_updated_stream(&self) -> broadcast::Receiver<ChangeInfo> {
        self.inner.book_updated_tx.subscribe()
    }

    /// Stream fired only when the top bid or ask price moved beyond
    /// tolerance.
    pub fn bid_ask_stream(&self) -> broadcast::Receiver<ChangeInfo> {
        self.inner.bid_ask_tx.subscribe()
    }

    /// Stream fired when the top bid/ask price or amount moved beyond
    /// tolerance.
    pub fn top_level_stream(&self) -> broadcast::Receiver<ChangeInfo> {
        self.inner.top_level_tx.subscribe()
    }

    /// Enable population of [`ChangeInfo::levels`] with the levels touched
    /// by each batch. Disabled by default to keep the hot path
    /// allocation-free.
    pub fn set_debug_enabled(&self, enabled: bool) {
        self.inner.debug_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Enable or disable the snapshot reload supervisor. Restarts the timer.
    pub fn set_snapshot_reload_enabled(&self, enabled: bool) {
        self.inner.reload_enabled.store(enabled, Ordering::Relaxed);
        self.restart_snapshot_reloading();
    }

    /// Change the reload supervisor interval. Restarts the timer.
    pub fn set_snapshot_reload_interval(&self, interval: Duration) {
        *self.inner.reload_interval.lock() = interval;
        self.restart_snapshot_reloading();
    }

    /// Apply a loaded configuration onto the mutable engine settings.
    pub fn apply_config(&self, config: &OrderBookConfig) {
        self.set_debug_enabled(config.debug);
        self.inner
            .reload_enabled
            .store(config.snapshot_reload_enabled, Ordering::Relaxed);
        *self.inner.reload_interval.lock() = config.snapshot_reload_interval();
        self.restart_snapshot_reloading();
    }

    /// Stop the consumer tasks and the reload supervisor. Called
    /// automatically on drop; safe to call more than once.
    pub fn close(&mut self) {
        for task in self.consumer_tasks.drain(..) {
            task.abort();
        }
        if let Some(task) = self.inner.reload_task.lock().take() {
            task.abort();
        }
    }

    fn spawn_snapshot_consumer(
        inner: Arc<BookInner>,
        mut rx: broadcast::Receiver<LevelBulk>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(bulk) => inner.handle_snapshot(bulk),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(
                            exchange = %inner.source.exchange_name(),
                            pair = %inner.target_pair,
                            missed,
                            "snapshot consumer lagged behind the source"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn spawn_diff_consumer(
        inner: Arc<BookInner>,
        mut rx: broadcast::Receiver<Vec<LevelBulk>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(bulks) => inner.handle_diff(bulks),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(
                            exchange = %inner.source.exchange_name(),
                            pair = %inner.target_pair,
                            missed,
                            "diff consumer lagged behind the source"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Stop and (when enabled) restart the reload supervisor task. At most
    /// one reload is in flight per engine: the task awaits the fetch before
    /// sleeping again, and re-arms unconditionally after a failure.
    fn restart_snapshot_reloading(&self) {
        let mut slot = self.inner.reload_task.lock();
        if let Some(task) = slot.take() {
            task.abort();
        }

        if !self.inner.reload_enabled.load(Ordering::Relaxed) {
            return;
        }

        let interval = *self.inner.reload_interval.lock();
        let inner = Arc::clone(&self.inner);
        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                if !inner.source.load_snapshot_enabled() {
                    continue;
                }

                if let Err(e) = inner
                    .source
                    .load_snapshot(&inner.target_pair_original, RELOAD_DEPTH)
                    .await
                {
                    debug!(
                        exchange = %inner.source.exchange_name(),
                        pair = %inner.target_pair,
                        error = %e,
                        "snapshot reload failed, will retry on next tick"
                    );
                }
            }
        }));
    }
}

impl Drop for CryptoOrderBook {
    fn drop(&mut self) {
        self.close();
    }
}

impl BookInner {
    fn handle_snapshot(&self, bulk: LevelBulk) {
        let levels: Vec<Level> = bulk
            .levels
            .into_iter()
            .filter(|l| l.is_for_pair(&self.target_pair))
            .collect();
        if levels.is_empty() {
            // snapshot for a different pair
            return;
        }

        let debug_enabled = self.debug_enabled.load(Ordering::Relaxed);
        let touched = if debug_enabled {
            levels.clone()
        } else {
            Vec::new()
        };

        let mut state = self.state.lock();
        let old = state.quotes();
        state.apply_snapshot(levels);
        self.notify(&state, old, touched);
    }

    fn handle_diff(&self, bulks: Vec<LevelBulk>) {
        let matching: Vec<LevelBulk> = bulks
            .into_iter()
            .filter(|bulk| bulk.has_pair(&self.target_pair))
            .collect();
        if matching.is_empty() {
            // diff for a different pair
            return;
        }

        let debug_enabled = self.debug_enabled.load(Ordering::Relaxed);

        let mut state = self.state.lock();
        if !state.snapshot_loaded() {
            trace!(
                exchange = %self.source.exchange_name(),
                pair = %self.target_pair,
                "diff received before snapshot, dropping"
            );
            return;
        }

        let old = state.quotes();
        let mut touched = Vec::new();
        let mut changed = false;

        for bulk in matching {
            let levels: Vec<Level> = bulk
                .levels
                .into_iter()
                .filter(|l| l.is_for_pair(&self.target_pair))
                .collect();
            if debug_enabled {
                touched.extend(levels.iter().cloned());
            }
            changed |= state.apply_bulk(bulk.action, levels);
        }

        if !changed {
            // nothing actually applied (unknown deletes, malformed levels)
            return;
        }

        state.recompute();
        self.notify(&state, old, touched);
    }

    /// Emit notifications for one applied batch. All three streams share a
    /// single payload instance.
    fn notify(&self, state: &BookState, old: Quotes, touched: Vec<Level>) {
        let quotes = state.quotes();
        let info = ChangeInfo::new(
            self.source.exchange_name(),
            self.target_pair.clone(),
            quotes,
            touched,
        );

        let price_moved = !tolerance::is_same(old.bid, quotes.bid)
            || !tolerance::is_same(old.ask, quotes.ask);
        let amount_moved = !tolerance::is_same(old.bid_amount, quotes.bid_amount)
            || !tolerance::is_same(old.ask_amount, quotes.ask_amount);

        let _ = self.book_updated_tx.send(info.clone());
        if price_moved {
            let _ = self.bid_ask_tx.send(info.clone());
        }
        if price_moved || amount_moved {
            let _ = self.top_level_tx.send(info);
        }
    }
}
