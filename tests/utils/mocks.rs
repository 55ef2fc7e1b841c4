use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};

use slackgw::{
    event::{ChatEvent, EventSource},
    forward::{QueueSink, SinkError},
    outgoing::{ChatPostSink, PostError, PostParams, PostReceipt},
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Chat platform stand-in that records every post
#[derive(Clone, Default)]
pub struct MockChatSink {
    posts: Arc<Mutex<Vec<(String, String, PostParams)>>>,
}

impl MockChatSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn posts(&self) -> Vec<(String, String, PostParams)> {
        self.posts.lock().await.clone()
    }
}

#[async_trait]
impl ChatPostSink for MockChatSink {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        params: &PostParams,
    ) -> Result<PostReceipt, PostError> {
        if channel == "#missing" {
            return Err(PostError::Api("channel_not_found".to_string()));
        }

        self.posts
            .lock()
            .await
            .push((channel.to_string(), text.to_string(), params.clone()));

        Ok(PostReceipt {
            channel: channel.to_string(),
            ts: "1700000000.000100".to_string(),
        })
    }
}

/// Message queue stand-in that keeps every published batch
#[derive(Clone, Default)]
pub struct MockQueueSink {
    batches: Arc<Mutex<Vec<Vec<serde_json::Value>>>>,
    published: Arc<Notify>,
}

impl MockQueueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn batches(&self) -> Vec<Vec<serde_json::Value>> {
        self.batches.lock().await.clone()
    }

    pub async fn wait_for_publish(&self) {
        self.published.notified().await
    }
}

#[async_trait]
impl QueueSink for MockQueueSink {
    async fn publish(&self, payloads: Vec<Vec<u8>>) -> Result<(), SinkError> {
        let batch = payloads
            .iter()
            .map(|payload| serde_json::from_slice(payload))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SinkError::Request(e.to_string()))?;

        self.batches.lock().await.push(batch);
        self.published.notify_one();
        Ok(())
    }
}

/// Event source fed by the test through a channel
pub struct ChannelEventSource {
    events: mpsc::UnboundedReceiver<ChatEvent>,
}

impl ChannelEventSource {
    pub fn new() -> (mpsc::UnboundedSender<ChatEvent>, Self) {
        let (sender, events) = mpsc::unbounded_channel();
        (sender, Self { events })
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<ChatEvent> {
        self.events.recv().await
    }
}
