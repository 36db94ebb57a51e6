//! Buffering layer between a raw provider and the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, trace};

use orderbook_common::data::LevelBulk;

use super::errors::SourceResult;

const CHANNEL_CAPACITY: usize = 1024;

/// Converts a drained batch of raw provider payloads into normalized bulks.
pub type Converter<R> = dyn Fn(Vec<R>) -> SourceResult<Vec<LevelBulk>> + Send + Sync;

/// Buffers raw provider payloads and emits them as normalized diff batches.
///
/// A concrete source embeds one buffer per connection and calls
/// [`buffer`](SourceBuffer::buffer) for every raw diff payload:
///
/// - with a zero interval each payload is converted and emitted
///   synchronously;
/// - with a non-zero interval payloads are queued and drained by a timer
///   task once per interval, converted in one call and emitted as a single
///   batch. FIFO order is preserved across the buffering step.
///
/// A converter failure is logged and the batch dropped; the streams keep
/// running, so one malformed payload cannot poison the pipeline.
pub struct SourceBuffer<R> {
    exchange: String,
    snapshot_tx: broadcast::Sender<LevelBulk>,
    diff_tx: broadcast::Sender<Vec<LevelBulk>>,
    raw_tx: Option<mpsc::UnboundedSender<R>>,
    converter: Arc<Converter<R>>,
    drain_task: Option<JoinHandle<()>>,
}

impl<R: Send + 'static> SourceBuffer<R> {
    /// Create a buffer for the given exchange. `buffer_interval` of zero
    /// means synchronous per-payload emission.
    pub fn new<C>(exchange: impl Into<String>, buffer_interval: Duration, converter: C) -> Self
    where
        C: Fn(Vec<R>) -> SourceResult<Vec<LevelBulk>> + Send + Sync + 'static,
    {
        let exchange = exchange.into();
        let (snapshot_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (diff_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let converter: Arc<Converter<R>> = Arc::new(converter);

        let (raw_tx, drain_task) = if buffer_interval.is_zero() {
            (None, None)
        } else {
            let (raw_tx, raw_rx) = mpsc::unbounded_channel();
            let task = Self::spawn_drain_task(
                exchange.clone(),
                buffer_interval,
                raw_rx,
                Arc::clone(&converter),
                diff_tx.clone(),
            );
            (Some(raw_tx), Some(task))
        };

        Self {
            exchange,
            snapshot_tx,
            diff_tx,
            raw_tx,
            converter,
            drain_task,
        }
    }

    /// Origin exchange name this buffer stamps on emitted bulks.
    pub fn exchange_name(&self) -> &str {
        &self.exchange
    }

    /// Queue one raw diff payload (or emit it synchronously when the buffer
    /// interval is zero).
    pub fn buffer(&self, raw: R) {
        match &self.raw_tx {
            Some(tx) => {
                // receiver only goes away when the drain task is gone
                let _ = tx.send(raw);
            }
            None => {
                Self::convert_and_emit(&self.exchange, &*self.converter, &self.diff_tx, vec![raw]);
            }
        }
    }

    /// Emit one complete snapshot bulk, bypassing the diff buffer.
    pub fn stream_snapshot(&self, mut bulk: LevelBulk) {
        bulk.exchange = self.exchange.clone();
        let _ = self.snapshot_tx.send(bulk);
    }

    /// Subscribe to snapshot bulks. Future-only, no replay.
    pub fn snapshot_stream(&self) -> broadcast::Receiver<LevelBulk> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribe to diff batches. Future-only, no replay.
    pub fn diff_stream(&self) -> broadcast::Receiver<Vec<LevelBulk>> {
        self.diff_tx.subscribe()
    }

    fn spawn_drain_task(
        exchange: String,
        buffer_interval: Duration,
        mut raw_rx: mpsc::UnboundedReceiver<R>,
        converter: Arc<Converter<R>>,
        diff_tx: broadcast::Sender<Vec<LevelBulk>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(buffer_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let mut batch = Vec::new();
                let disconnected = loop {
                    match raw_rx.try_recv() {
                        Ok(raw) => batch.push(raw),
                        Err(mpsc::error::TryRecvError::Empty) => break false,
                        Err(mpsc::error::TryRecvError::Disconnected) => break true,
                    }
                };

                if !batch.is_empty() {
                    trace!(
                        exchange = %exchange,
                        payloads = batch.len(),
                        "draining buffered diff payloads"
                    );
                    Self::convert_and_emit(&exchange, &*converter, &diff_tx, batch);
                }

                if disconnected {
                    break;
                }
            }
        })
    }

    fn convert_and_emit(
        exchange: &str,
        converter: &Converter<R>,
        diff_tx: &broadcast::Sender<Vec<LevelBulk>>,
        raw: Vec<R>,
    ) {
        match converter(raw) {
            Ok(bulks) => {
                if bulks.is_empty() {
                    return;
                }
                let stamped = bulks
                    .into_iter()
                    .map(|mut bulk| {
                        bulk.exchange = exchange.to_string();
                        bulk
                    })
                    .collect();
                let _ = diff_tx.send(stamped);
            }
            Err(e) => {
                error!(
                    exchange = %exchange,
                    error = %e,
                    "failed to convert buffered payloads, dropping batch"
                );
            }
        }
    }
}

impl<R> Drop for SourceBuffer<R> {
    fn drop(&mut self) {
        // the drain task is aborted outright; payloads still queued at
        // drop time are discarded, not flushed
        self.raw_tx = None;
        if let Some(task) = self.drain_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderbook_common::data::{BulkAction, Level, LevelBulk, Side};

    use crate::source::errors::SourceError;

    fn insert_bulk(id: &str, price: f64) -> LevelBulk {
        LevelBulk::new(
            BulkAction::Insert,
            vec![Level::new(
                id,
                Side::Bid,
                Some(price),
                Some(1.0),
                None,
                Some("btcusd"),
            )],
        )
    }

    #[test]
    fn zero_interval_emits_synchronously() {
        let buffer: SourceBuffer<LevelBulk> =
            SourceBuffer::new("mock", Duration::ZERO, |raw| Ok(raw));
        let mut diffs = buffer.diff_stream();

        buffer.buffer(insert_bulk("1", 100.0));

        let batch = diffs.try_recv().expect("batch emitted synchronously");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].exchange, "mock");
    }

    #[tokio::test(start_paused = true)]
    async fn buffered_payloads_drain_as_one_fifo_batch() {
        let buffer: SourceBuffer<LevelBulk> =
            SourceBuffer::new("mock", Duration::from_millis(10), |raw| Ok(raw));
        let mut diffs = buffer.diff_stream();

        buffer.buffer(insert_bulk("1", 100.0));
        buffer.buffer(insert_bulk("2", 101.0));
        buffer.buffer(insert_bulk("3", 102.0));

        tokio::time::sleep(Duration::from_millis(50)).await;

        let batch = diffs.recv().await.expect("drained batch");
        let ids: Vec<&str> = batch
            .iter()
            .map(|bulk| bulk.levels[0].id.as_str())
            .collect();
        assert_eq!(ids, ["1", "2", "3"]);

        // nothing else queued, no further emission
        assert!(diffs.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn converter_failure_drops_batch_but_stream_survives() {
        let buffer: SourceBuffer<u32> =
            SourceBuffer::new("mock", Duration::from_millis(10), |raw: Vec<u32>| {
                if raw.contains(&0) {
                    return Err(SourceError::Conversion("zero payload".to_string()));
                }
                Ok(vec![LevelBulk::new(
                    BulkAction::Insert,
                    raw.iter()
                        .map(|n| {
                            Level::new(
                                n.to_string(),
                                Side::Bid,
                                Some(f64::from(*n)),
                                Some(1.0),
                                None,
                                Some("btcusd"),
                            )
                        })
                        .collect(),
                )])
            });
        let mut diffs = buffer.diff_stream();

        buffer.buffer(0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(diffs.try_recv().is_err());

        buffer.buffer(7);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let batch = diffs.recv().await.expect("stream still alive");
        assert_eq!(batch[0].levels[0].id, "7");
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_bypasses_the_diff_buffer() {
        let buffer: SourceBuffer<LevelBulk> =
            SourceBuffer::new("mock", Duration::from_millis(10), |raw| Ok(raw));
        let mut snapshots = buffer.snapshot_stream();

        buffer.stream_snapshot(insert_bulk("1", 100.0));

        let bulk = snapshots.try_recv().expect("snapshot emitted immediately");
        assert_eq!(bulk.exchange, "mock");
    }
}
