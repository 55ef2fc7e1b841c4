// Real-time event stream components
//
// This module provides the event model and the dispatch loop that feeds
// every event from a live chat connection to a handler.

// Public API - what other modules can use
pub use dispatcher::{DispatchExit, EventDispatcher, EventSource};
pub use events::{ChatEvent, EventData, MessageEvent};
pub use handler::{ChatConnection, DispatchContext, EventError, EventHandler};
pub use kind::{EventKind, EventMask, EVENT_BIT_TABLE_VERSION};

// Internal modules
mod dispatcher;
mod events;
mod handler;
mod kind;
