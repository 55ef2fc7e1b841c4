use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{
    events::ChatEvent,
    handler::{ChatConnection, DispatchContext, EventError, EventHandler},
};
use crate::shutdown::Shutdown;

/// A live stream of chat events
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event. `None` means the stream has ended.
    async fn next_event(&mut self) -> Option<ChatEvent>;

    /// Handle used to reply over the same connection, if the source has one
    fn connection(&self) -> Option<Arc<dyn ChatConnection>> {
        None
    }
}

/// Why a dispatch loop stopped without a handler error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    Shutdown,
    StreamEnded,
}

/// Single consumer of a live event stream
///
/// Every event is wrapped in a [`DispatchContext`] and handed to the handler,
/// one at a time and in stream order. The loop ends on shutdown, when the
/// stream ends, or on the first handler error.
pub struct EventDispatcher {
    source: Box<dyn EventSource>,
    handler: Arc<dyn EventHandler>,
    self_user_id: Arc<str>,
    shutdown: Shutdown,
}

impl EventDispatcher {
    pub fn new(
        source: Box<dyn EventSource>,
        handler: Arc<dyn EventHandler>,
        self_user_id: impl Into<Arc<str>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            handler,
            self_user_id: self_user_id.into(),
            shutdown,
        }
    }

    /// Spawn the loop as a background task
    pub fn start(self) -> JoinHandle<Result<DispatchExit, EventError>> {
        tokio::spawn(self.run())
    }

    /// Run the loop on the current task until it stops
    pub async fn run(self) -> Result<DispatchExit, EventError> {
        let Self {
            mut source,
            handler,
            self_user_id,
            shutdown,
        } = self;
        let handler_name = handler.name();
        let connection = source.connection();

        info!(
            handler = handler_name,
            self_user_id = %self_user_id,
            "Starting event dispatch loop"
        );

        loop {
            let event = tokio::select! {
                biased;

                _ = shutdown.wait() => {
                    info!(handler = handler_name, "Dispatch loop stopping on shutdown");
                    return Ok(DispatchExit::Shutdown);
                }
                event = source.next_event() => event,
            };

            let Some(event) = event else {
                warn!(handler = handler_name, "Event stream ended");
                return Ok(DispatchExit::StreamEnded);
            };

            debug!(
                handler = handler_name,
                event_type = event.wire_type(),
                "Dispatching event"
            );

            let ctx = DispatchContext::new(self_user_id.clone(), connection.clone(), event);
            if let Err(e) = handler.handle(&ctx).await {
                error!(
                    handler = handler_name,
                    error = %e,
                    "Event handler failed, stopping dispatch loop"
                );
                return Err(e);
            }
        }
    }
}
