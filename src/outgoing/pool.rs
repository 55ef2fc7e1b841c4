use std::sync::{Mutex, PoisonError};

use super::message::{OutgoingMessage, PostParams};

/// Default number of idle messages kept for reuse
pub const DEFAULT_MAX_IDLE: usize = 255;

/// Free list of [`OutgoingMessage`] allocations
///
/// `acquire` hands out a cleared message (reusing an idle one when possible);
/// `release` resets it and keeps it for the next caller, up to `max_idle`.
#[derive(Debug)]
pub struct MessagePool {
    free: Mutex<Vec<Box<OutgoingMessage>>>,
    max_idle: usize,
    defaults: PostParams,
}

impl MessagePool {
    pub fn new(defaults: PostParams) -> Self {
        Self::with_max_idle(defaults, DEFAULT_MAX_IDLE)
    }

    pub fn with_max_idle(defaults: PostParams, max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
            defaults,
        }
    }

    /// Post options every fresh message starts with
    pub fn defaults(&self) -> &PostParams {
        &self.defaults
    }

    pub fn acquire(&self) -> Box<OutgoingMessage> {
        let reused = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let mut message =
            reused.unwrap_or_else(|| Box::new(OutgoingMessage::new(self.defaults.clone())));
        message.issue_ticket();
        message
    }

    pub fn release(&self, mut message: Box<OutgoingMessage>) {
        message.reset(&self.defaults);

        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(message);
        }
    }

    /// Number of messages currently waiting for reuse
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
