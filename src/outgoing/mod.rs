// Outgoing message bridge
//
// Lets blocking HTTP callers post into the chat through a single,
// serialized consumer of a bounded queue.

// Public API - what other modules can use
pub use bridge::{BridgeError, ChatPostSink, MessageBridge, PostError, DEFAULT_QUEUE_CAPACITY};
pub use message::{OutgoingMessage, PostParams, PostReceipt};
pub use pool::{MessagePool, DEFAULT_MAX_IDLE};

// Internal modules
mod bridge;
mod message;
mod pool;
