use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::events::ChatEvent;

/// Errors that can occur when handling events
///
/// Any error returned from [`EventHandler::handle`] stops the dispatch loop
/// for that connection, so handlers only return one for structural failures.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Downstream closed: {0}")]
    Closed(String),

    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Reply failed: {0}")]
    ReplyFailed(String),

    #[error("Event is not a message")]
    NotAMessage,
}

impl EventError {
    pub fn closed(msg: impl Into<String>) -> Self {
        EventError::Closed(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        EventError::Failed(msg.into())
    }
}

/// Handle to the live connection an event arrived on
#[async_trait]
pub trait ChatConnection: Send + Sync {
    /// Send a plain text message to a channel over the live connection
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), EventError>;
}

/// Per-event metadata handed to an [`EventHandler`]
pub struct DispatchContext {
    self_user_id: Arc<str>,
    connection: Option<Arc<dyn ChatConnection>>,
    event: ChatEvent,
}

impl DispatchContext {
    pub fn new(
        self_user_id: Arc<str>,
        connection: Option<Arc<dyn ChatConnection>>,
        event: ChatEvent,
    ) -> Self {
        Self {
            self_user_id,
            connection,
            event,
        }
    }

    /// Identity id of the gateway's own chat account
    pub fn self_user_id(&self) -> &str {
        &self.self_user_id
    }

    pub fn event(&self) -> &ChatEvent {
        &self.event
    }

    /// Replies to the channel the current message came from
    pub async fn reply(&self, text: &str) -> Result<(), EventError> {
        let message = self.event.as_message().ok_or(EventError::NotAMessage)?;
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| EventError::ReplyFailed("no live connection".to_string()))?;

        connection.send_message(&message.channel, text).await
    }
}

/// Trait for components that consume events from the dispatch loop
///
/// Deciding not to act on an event is not an error; handlers simply
/// return `Ok(())` for events they filter out.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event from the stream
    async fn handle(&self, ctx: &DispatchContext) -> Result<(), EventError>;

    /// Get a human-readable name for this handler (for logging/debugging)
    fn name(&self) -> &'static str;
}
