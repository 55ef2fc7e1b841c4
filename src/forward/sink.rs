use async_trait::async_trait;
use thiserror::Error;

use crate::event::ChatEvent;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink request failed: {0}")]
    Request(String),

    #[error("Sink rejected publish ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
#[error("Failed to encode {wire_type} event: {reason}")]
pub struct EncodeError {
    pub wire_type: String,
    pub reason: String,
}

/// External message queue that accepts batches of serialized events
#[async_trait]
pub trait QueueSink: Send + Sync {
    /// Publish all payloads in a single call, preserving their order
    async fn publish(&self, payloads: Vec<Vec<u8>>) -> Result<(), SinkError>;
}

/// Turns one event into a self-describing payload
pub trait EventEncoder: Send + Sync {
    fn encode(&self, event: &ChatEvent) -> Result<Vec<u8>, EncodeError>;
}

/// Encodes events as JSON, keeping field names
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl EventEncoder for JsonEncoder {
    fn encode(&self, event: &ChatEvent) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(event).map_err(|e| EncodeError {
            wire_type: event.wire_type().to_string(),
            reason: e.to_string(),
        })
    }
}
