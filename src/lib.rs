// Library crate for the Slack gateway
// This file exposes the public API for integration tests

pub mod config;
pub mod event;
pub mod forward;
pub mod gateway;
pub mod http;
pub mod outgoing;
pub mod pubsub;
pub mod shared;
pub mod shutdown;
pub mod slack;

// Re-export commonly used types for easier access in tests
pub use config::{Cli, GatewayConfig, RtmMode};
pub use event::{ChatEvent, EventDispatcher, EventKind, EventMask, EventSource, MessageEvent};
pub use forward::{BatchPublisher, EventClassifier, QueueForwarder, QueueSink};
pub use gateway::{Gateway, GatewayError};
pub use outgoing::{MessageBridge, MessagePool, PostParams};
pub use shared::{AppError, AppState};
pub use shutdown::Shutdown;
