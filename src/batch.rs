//! # Batching publisher.
//!
//! [`BatchPublisher`] buffers messages and hands them to the wrapped bus in one
//! go, either when the buffer reaches `max_size` or when `max_wait` elapses
//! since the last flush.
//!
//! ```text
//! publish(topic, payload) ─► buffer ──┬─ len >= max_size ─► flush
//!                                     └─ ticker(max_wait) ─► flush
//! flush: drain buffer ─► bus.publish_message(msg) for each ─► on_flush(ids)
//! close: stop ticker ─► final flush
//! ```
//!
//! A flush stops at the first publish error; the rest of that batch is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::MessageBus;
use crate::error::BusError;
use crate::message::{Message, MessageId, MessageRef, Payload};

/// Default number of buffered messages that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default time between periodic flushes.
pub const DEFAULT_BATCH_WAIT: Duration = Duration::from_secs(1);

/// Callback receiving the ids of each successfully flushed batch.
pub type FlushCallback = Arc<dyn Fn(&[MessageId]) + Send + Sync>;

/// Batching thresholds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Buffer length that triggers an immediate flush (`0` → default).
    pub max_size: usize,
    /// Period of the background flush (`0` → default).
    pub max_wait: Duration,
}

impl BatchConfig {
    fn max_size_or_default(&self) -> usize {
        if self.max_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.max_size
        }
    }

    fn max_wait_or_default(&self) -> Duration {
        if self.max_wait.is_zero() {
            DEFAULT_BATCH_WAIT
        } else {
            self.max_wait
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_BATCH_SIZE,
            max_wait: DEFAULT_BATCH_WAIT,
        }
    }
}

struct Shared<B, P: Payload> {
    bus: B,
    max_size: usize,
    buffer: Mutex<Vec<MessageRef<P>>>,
    on_flush: Option<FlushCallback>,
    flushed: Notify,
}

impl<B, P> Shared<B, P>
where
    P: Payload,
    B: MessageBus<P>,
{
    async fn flush(&self, ctx: &CancellationToken) -> Result<(), BusError> {
        let mut buffer = self.buffer.lock().await;
        self.flush_locked(ctx, &mut buffer).await
    }

    async fn flush_locked(&self, ctx: &CancellationToken, buffer: &mut Vec<MessageRef<P>>) -> Result<(), BusError> {
        if buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(buffer);
        self.flushed.notify_one();

        let mut ids = Vec::with_capacity(batch.len());
        for msg in batch {
            ids.push(msg.id());
            self.bus.publish_message(ctx, msg).await?;
        }
        debug!(count = ids.len(), "batch flushed");
        if let Some(cb) = &self.on_flush {
            cb(&ids);
        }
        Ok(())
    }
}

/// Buffers publishes and forwards them to a bus in batches.
pub struct BatchPublisher<B, P: Payload> {
    shared: Arc<Shared<B, P>>,
    closed: AtomicBool,
    stop: CancellationToken,
    ticker: StdMutex<Option<JoinHandle<()>>>,
}

impl<B, P> BatchPublisher<B, P>
where
    P: Payload,
    B: MessageBus<P> + 'static,
{
    /// Creates a publisher and starts its flush ticker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(bus: B, cfg: BatchConfig) -> Self {
        Self::build(bus, cfg, None)
    }

    /// Like [`new`](Self::new), with a callback invoked after each successful flush.
    pub fn with_on_flush<F>(bus: B, cfg: BatchConfig, on_flush: F) -> Self
    where
        F: Fn(&[MessageId]) + Send + Sync + 'static,
    {
        Self::build(bus, cfg, Some(Arc::new(on_flush)))
    }

    fn build(bus: B, cfg: BatchConfig, on_flush: Option<FlushCallback>) -> Self {
        let shared = Arc::new(Shared {
            bus,
            max_size: cfg.max_size_or_default(),
            buffer: Mutex::new(Vec::new()),
            on_flush,
            flushed: Notify::new(),
        });
        let stop = CancellationToken::new();
        let ticker = spawn_ticker(Arc::clone(&shared), cfg.max_wait_or_default(), stop.clone());
        Self {
            shared,
            closed: AtomicBool::new(false),
            stop,
            ticker: StdMutex::new(Some(ticker)),
        }
    }

    /// Buffers a message, flushing if the buffer is full.
    ///
    /// A failed size-triggered flush is logged, not returned.
    ///
    /// # Errors
    /// [`BusError::Closed`] after [`close`](Self::close).
    pub async fn publish(&self, ctx: &CancellationToken, topic: &str, payload: P) -> Result<(), BusError> {
        let mut buffer = self.shared.buffer.lock().await;
        // checked under the buffer lock so close's final flush sees every push
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        buffer.push(Arc::new(Message::new(topic, payload)));
        if buffer.len() >= self.shared.max_size {
            if let Err(e) = self.shared.flush_locked(ctx, &mut buffer).await {
                warn!(error = %e, "batch flush failed");
            }
        }
        Ok(())
    }

    /// Publishes everything buffered now.
    pub async fn flush(&self, ctx: &CancellationToken) -> Result<(), BusError> {
        self.shared.flush(ctx).await
    }

    /// Number of buffered messages.
    pub async fn pending(&self) -> usize {
        self.shared.buffer.lock().await.len()
    }

    /// The wrapped bus.
    pub fn inner(&self) -> &B {
        &self.shared.bus
    }

    /// Stops the ticker and flushes what is left.
    ///
    /// The wrapped bus stays open.
    ///
    /// # Errors
    /// [`BusError::AlreadyClosed`] on a second call, or the final flush error.
    pub async fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(BusError::AlreadyClosed);
        }
        self.stop.cancel();
        let ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = ticker {
            if let Err(e) = handle.await {
                warn!(error = %e, "batch ticker ended abnormally");
            }
        }
        self.shared.flush(&CancellationToken::new()).await
    }
}

impl<B, P: Payload> Drop for BatchPublisher<B, P> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

fn spawn_ticker<B, P>(shared: Arc<Shared<B, P>>, period: Duration, stop: CancellationToken) -> JoinHandle<()>
where
    P: Payload,
    B: MessageBus<P> + 'static,
{
    tokio::spawn(async move {
        let mut tick = time::interval_at(time::Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = shared.flushed.notified() => tick.reset(),
                _ = tick.tick() => {
                    if let Err(e) = shared.flush(&CancellationToken::new()).await {
                        warn!(error = %e, "periodic batch flush failed");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;
    use crate::core::Bus;
    use crate::error::HandlerError;
    use crate::handlers::HandlerFn;
    use std::sync::atomic::AtomicUsize;

    fn counting_bus(hits: &Arc<AtomicUsize>) -> Arc<Bus<u32>> {
        let bus = Arc::new(Bus::new(BusConfig::default()));
        let hits = Arc::clone(hits);
        bus.subscribe(
            "b.*",
            HandlerFn::arc(move |_ctx: CancellationToken, _msg: MessageRef<u32>| {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), HandlerError>(())
                }
            }),
        )
        .unwrap();
        bus
    }

    #[tokio::test]
    async fn flushes_when_full() {
        let hits = Arc::new(AtomicUsize::new(0));
        let bus = counting_bus(&hits);
        let flushed = Arc::new(StdMutex::new(Vec::new()));
        let f = Arc::clone(&flushed);
        let batcher = BatchPublisher::with_on_flush(
            Arc::clone(&bus),
            BatchConfig {
                max_size: 3,
                max_wait: Duration::from_secs(3600),
            },
            move |ids: &[MessageId]| f.lock().unwrap().push(ids.len()),
        );

        let ctx = CancellationToken::new();
        for n in 0..7 {
            batcher.publish(&ctx, "b.x", n).await.unwrap();
        }
        assert_eq!(*flushed.lock().unwrap(), vec![3, 3]);
        assert_eq!(batcher.pending().await, 1);

        batcher.close().await.unwrap();
        assert_eq!(*flushed.lock().unwrap(), vec![3, 3, 1]);
        assert!(matches!(batcher.publish(&ctx, "b.x", 0).await, Err(BusError::Closed)));
        assert!(matches!(batcher.close().await, Err(BusError::AlreadyClosed)));

        bus.close().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_on_timer() {
        let hits = Arc::new(AtomicUsize::new(0));
        let bus = counting_bus(&hits);
        let batcher = BatchPublisher::new(
            Arc::clone(&bus),
            BatchConfig {
                max_size: 100,
                max_wait: Duration::from_millis(50),
            },
        );

        batcher.publish(&CancellationToken::new(), "b.y", 1).await.unwrap();
        assert_eq!(batcher.pending().await, 1);
        time::sleep(Duration::from_millis(120)).await;
        assert_eq!(batcher.pending().await, 0);

        batcher.close().await.unwrap();
        bus.close().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn publish_racing_close_is_rejected_not_lost() {
        let hits = Arc::new(AtomicUsize::new(0));
        let bus = counting_bus(&hits);
        let batcher = Arc::new(BatchPublisher::new(Arc::clone(&bus), BatchConfig::default()));
        let ctx = CancellationToken::new();
        batcher.publish(&ctx, "b.a", 1).await.unwrap();

        let guard = batcher.shared.buffer.lock().await;
        let b = Arc::clone(&batcher);
        let late = tokio::spawn(async move { b.publish(&CancellationToken::new(), "b.a", 2).await });
        time::sleep(Duration::from_millis(20)).await;
        let b = Arc::clone(&batcher);
        let closing = tokio::spawn(async move { b.close().await });
        time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        assert!(matches!(late.await.unwrap(), Err(BusError::Closed)));
        closing.await.unwrap().unwrap();
        assert_eq!(batcher.pending().await, 0);

        bus.close().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn explicit_flush_surfaces_bus_errors() {
        let hits = Arc::new(AtomicUsize::new(0));
        let bus = counting_bus(&hits);
        let batcher = BatchPublisher::new(Arc::clone(&bus), BatchConfig::default());

        let ctx = CancellationToken::new();
        batcher.publish(&ctx, "b.z", 1).await.unwrap();
        bus.close().await.unwrap();
        assert!(matches!(batcher.flush(&ctx).await, Err(BusError::Closed)));
        assert_eq!(batcher.pending().await, 0);
        batcher.close().await.unwrap();
    }
}
