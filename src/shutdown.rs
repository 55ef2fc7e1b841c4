use tokio_util::sync::CancellationToken;
use tracing::info;

/// Broadcast "done" signal shared by every long-running task
///
/// Clones observe the same signal. Triggering is idempotent: the first call
/// wakes every waiter, later calls do nothing.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Signal every observer to unwind
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`Shutdown::trigger`] has been called on any clone
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}
