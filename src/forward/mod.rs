// Queue forwarding pipeline
//
// Classifies events coming off the dispatch loop and publishes the accepted
// ones to an external message queue in batches.

// Public API - what other modules can use
pub use classifier::{EventClassifier, RejectReason, Verdict};
pub use forwarder::QueueForwarder;
pub use link::{parse_link, Link, LinkError};
pub use publisher::{
    BatchPublisher, PublishError, PublisherConfig, PublisherHandle, DEFAULT_BATCH_CAPACITY,
    DEFAULT_FLUSH_INTERVAL,
};
pub use sink::{EncodeError, EventEncoder, JsonEncoder, QueueSink, SinkError};

// Internal modules
mod classifier;
mod forwarder;
mod link;
mod publisher;
mod sink;
