use async_trait::async_trait;
use tracing::debug;

use super::classifier::{EventClassifier, Verdict};
use super::publisher::PublisherHandle;
use crate::event::{DispatchContext, EventError, EventHandler};

/// Event handler that forwards selected events to a batch publisher
pub struct QueueForwarder {
    classifier: EventClassifier,
    publisher: PublisherHandle,
}

impl QueueForwarder {
    /// The publisher must already be started; the forwarder only submits
    pub fn new(classifier: EventClassifier, publisher: PublisherHandle) -> Self {
        Self {
            classifier,
            publisher,
        }
    }
}

#[async_trait]
impl EventHandler for QueueForwarder {
    async fn handle(&self, ctx: &DispatchContext) -> Result<(), EventError> {
        match self.classifier.classify(ctx) {
            Verdict::Accept(kind) => {
                debug!(kind = kind.name(), "Event accepted for forwarding");
                self.publisher
                    .submit(ctx.event().clone())
                    .await
                    .map_err(|e| EventError::closed(e.to_string()))
            }
            Verdict::Reject(reason) => {
                debug!(
                    event_type = ctx.event().wire_type(),
                    reason = ?reason,
                    "Event filtered out"
                );
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "QueueForwarder"
    }
}
