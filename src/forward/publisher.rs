use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::sink::{EventEncoder, JsonEncoder, QueueSink};
use crate::event::ChatEvent;
use crate::shutdown::Shutdown;

/// Default number of events buffered before a capacity flush
pub const DEFAULT_BATCH_CAPACITY: usize = 255;

/// Default period of the timer flush
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("Publisher is no longer accepting events")]
    Closed,
}

/// Configuration for the batch publisher
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// A flush happens as soon as the buffer holds more than this many events
    pub capacity: usize,
    /// How often buffered events are flushed regardless of size
    pub flush_interval: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BATCH_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Capacity,
    Timer,
    Shutdown,
}

/// Buffers accepted events and publishes them to a queue sink in batches
///
/// Nothing is accepted until [`BatchPublisher::start`] has spawned the
/// consuming task. The ingress holds a single slot, so producers wait while
/// a flush is in progress rather than growing memory.
pub struct BatchPublisher {
    sink: Arc<dyn QueueSink>,
    encoder: Arc<dyn EventEncoder>,
    config: PublisherConfig,
    shutdown: Shutdown,
}

impl BatchPublisher {
    pub fn new(sink: Arc<dyn QueueSink>, config: PublisherConfig, shutdown: Shutdown) -> Self {
        Self {
            sink,
            encoder: Arc::new(JsonEncoder),
            config,
            shutdown,
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn EventEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Spawn the consuming task and return the ingress handle
    ///
    /// The task ends after a final flush once shutdown is triggered or every
    /// handle has been dropped.
    pub fn start(self) -> (PublisherHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(1);

        info!(
            capacity = self.config.capacity,
            flush_interval_ms = self.config.flush_interval.as_millis() as u64,
            "Starting batch publisher"
        );

        let batch = Batch {
            buffer: Vec::with_capacity(self.config.capacity + 1),
            payloads: Vec::with_capacity(self.config.capacity + 1),
            sink: self.sink,
            encoder: self.encoder,
        };
        let task = tokio::spawn(run_loop(batch, receiver, self.config, self.shutdown));

        (PublisherHandle { sender }, task)
    }
}

/// Ingress side of a running [`BatchPublisher`]
#[derive(Clone)]
pub struct PublisherHandle {
    sender: mpsc::Sender<ChatEvent>,
}

impl PublisherHandle {
    /// Hand an event to the publisher, waiting until it has room
    pub async fn submit(&self, event: ChatEvent) -> Result<(), PublishError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| PublishError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

async fn run_loop(
    mut batch: Batch,
    mut receiver: mpsc::Receiver<ChatEvent>,
    config: PublisherConfig,
    shutdown: Shutdown,
) {
    let period = config.flush_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.wait() => {
                info!(buffered = batch.len(), "Batch publisher stopping on shutdown");
                break;
            }
            event = receiver.recv() => match event {
                Some(event) => {
                    batch.push(event);
                    if batch.len() > config.capacity {
                        batch.flush(FlushTrigger::Capacity).await;
                    }
                }
                None => {
                    info!(buffered = batch.len(), "Batch publisher ingress closed");
                    break;
                }
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    batch.flush(FlushTrigger::Timer).await;
                }
            }
        }
    }

    receiver.close();
    // Events already handed over before the close are still ours to flush
    while let Ok(event) = receiver.try_recv() {
        batch.push(event);
    }
    if !batch.is_empty() {
        batch.flush(FlushTrigger::Shutdown).await;
    }
    info!("Batch publisher stopped");
}

/// Buffer state owned by the publisher task
struct Batch {
    buffer: Vec<ChatEvent>,
    payloads: Vec<Vec<u8>>,
    sink: Arc<dyn QueueSink>,
    encoder: Arc<dyn EventEncoder>,
}

impl Batch {
    fn push(&mut self, event: ChatEvent) {
        self.buffer.push(event);
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Encode and publish everything buffered, then clear both lists.
    /// Failures are logged and the batch is dropped.
    async fn flush(&mut self, trigger: FlushTrigger) {
        let buffered = self.buffer.len();

        for event in self.buffer.drain(..) {
            match self.encoder.encode(&event) {
                Ok(payload) => {
                    debug!(event_type = event.wire_type(), "Forwarding event");
                    self.payloads.push(payload);
                }
                Err(e) => {
                    warn!(error = %e, "Dropping event that failed to encode");
                }
            }
        }

        let payloads = std::mem::take(&mut self.payloads);
        let count = payloads.len();

        if count == 0 {
            warn!(trigger = ?trigger, buffered, "Nothing left to publish after encoding");
            return;
        }

        match self.sink.publish(payloads).await {
            Ok(()) => {
                info!(trigger = ?trigger, buffered, published = count, "Batch published");
            }
            Err(e) => {
                error!(
                    trigger = ?trigger,
                    buffered,
                    error = %e,
                    "Batch publish failed, discarding batch"
                );
            }
        }
    }
}
