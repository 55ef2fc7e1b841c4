use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::message::{OutgoingMessage, PostParams, PostReceipt};
use super::pool::MessagePool;
use crate::shutdown::Shutdown;

/// Default capacity of the inbound post queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 255;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Chat API error: {0}")]
    Api(String),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("server is not connected or is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Post(#[from] PostError),
}

/// Synchronous chat-post API behind the bridge
#[async_trait]
pub trait ChatPostSink: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        params: &PostParams,
    ) -> Result<PostReceipt, PostError>;
}

/// Serializes chat posts from many callers onto a single consumer
///
/// Callers wait on their own response slot while the consumer task posts
/// messages one at a time, so at most one post is ever in flight.
#[derive(Clone)]
pub struct MessageBridge {
    sender: mpsc::Sender<Box<OutgoingMessage>>,
    pool: Arc<MessagePool>,
    shutdown: Shutdown,
}

impl MessageBridge {
    /// Spawn the consumer task and return the bridge handle
    pub fn start(
        sink: Arc<dyn ChatPostSink>,
        pool: Arc<MessagePool>,
        queue_capacity: usize,
        shutdown: Shutdown,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue_capacity);

        info!(queue_capacity, "Starting outgoing message bridge");
        let task = tokio::spawn(consume(receiver, sink, pool.clone(), shutdown.clone()));

        (
            Self {
                sender,
                pool,
                shutdown,
            },
            task,
        )
    }

    pub fn pool(&self) -> &Arc<MessagePool> {
        &self.pool
    }

    /// Check a cleared message out of the pool
    pub fn acquire(&self) -> Box<OutgoingMessage> {
        self.pool.acquire()
    }

    /// Post a message and wait for the chat platform's answer
    pub async fn post(
        &self,
        channel: &str,
        text: &str,
        params: Option<PostParams>,
    ) -> Result<PostReceipt, BridgeError> {
        let mut message = self.acquire();
        message.channel.push_str(channel);
        message.text.push_str(text);
        if let Some(params) = params {
            message.params.merge_from(params);
        }
        self.submit(message).await
    }

    /// Enqueue a populated message and wait for its result
    ///
    /// Waits for room when the queue is full. Fails immediately once the
    /// bridge is shutting down.
    #[instrument(
        skip(self, message),
        fields(ticket = ?message.ticket(), channel = %message.channel)
    )]
    pub async fn submit(
        &self,
        mut message: Box<OutgoingMessage>,
    ) -> Result<PostReceipt, BridgeError> {
        if self.shutdown.is_triggered() {
            self.pool.release(message);
            return Err(BridgeError::ShuttingDown);
        }

        let (slot, response) = oneshot::channel();
        message.attach_response(slot);

        if let Err(mpsc::error::SendError(message)) = self.sender.send(message).await {
            self.pool.release(message);
            return Err(BridgeError::ShuttingDown);
        }

        // A dropped slot means the consumer went away before answering
        response.await.unwrap_or(Err(BridgeError::ShuttingDown))
    }
}

async fn consume(
    mut receiver: mpsc::Receiver<Box<OutgoingMessage>>,
    sink: Arc<dyn ChatPostSink>,
    pool: Arc<MessagePool>,
    shutdown: Shutdown,
) {
    loop {
        let mut message = tokio::select! {
            biased;

            _ = shutdown.wait() => break,
            message = receiver.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        debug!(
            ticket = ?message.ticket(),
            channel = %message.channel,
            "New outgoing message"
        );

        let result = sink
            .post_message(&message.channel, &message.text, &message.params)
            .await
            .map_err(BridgeError::from);

        if let Err(e) = &result {
            warn!(
                ticket = ?message.ticket(),
                channel = %message.channel,
                error = %e,
                "Post failed"
            );
        }

        let slot = message.take_response();
        pool.release(message);
        if let Some(slot) = slot {
            let _ = slot.send(result);
        }
    }

    // Answer everyone still queued so no caller waits forever
    receiver.close();
    let mut abandoned = 0usize;
    while let Ok(mut message) = receiver.try_recv() {
        if let Some(slot) = message.take_response() {
            let _ = slot.send(Err(BridgeError::ShuttingDown));
        }
        pool.release(message);
        abandoned += 1;
    }

    info!(abandoned, "Outgoing message bridge stopped");
}
