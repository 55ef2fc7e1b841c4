use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::outgoing::MessageBridge;

/// Header name and value every request must carry when the check is enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSecret {
    pub header: String,
    pub value: String,
}

impl SharedSecret {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }
}

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub bridge: MessageBridge,
    pub shared_secret: Option<SharedSecret>,
}

impl AppState {
    pub fn new(bridge: MessageBridge) -> Self {
        Self {
            bridge,
            shared_secret: None,
        }
    }

    pub fn with_shared_secret(mut self, shared_secret: Option<SharedSecret>) -> Self {
        self.shared_secret = shared_secret;
        self
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to parse request: {0}")]
    BadRequest(String),

    #[error("Failed to post message: {0}")]
    PostFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Request and post failures both answer 500, matching what existing
        // callers of /post expect.
        let status = match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::PostFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::outgoing::{
        ChatPostSink, MessagePool, PostError, PostParams, PostReceipt, DEFAULT_QUEUE_CAPACITY,
    };
    use crate::shutdown::Shutdown;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Chat-post sink that records every post and answers from a script
    #[derive(Default)]
    pub struct RecordingPostSink {
        pub posts: Mutex<Vec<(String, String, PostParams)>>,
        pub fail_with: Option<String>,
    }

    impl RecordingPostSink {
        pub fn failing(error: &str) -> Self {
            Self {
                fail_with: Some(error.to_string()),
                ..Default::default()
            }
        }

        pub fn posts(&self) -> Vec<(String, String, PostParams)> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatPostSink for RecordingPostSink {
        async fn post_message(
            &self,
            channel: &str,
            text: &str,
            params: &PostParams,
        ) -> Result<PostReceipt, PostError> {
            self.posts
                .lock()
                .unwrap()
                .push((channel.to_string(), text.to_string(), params.clone()));

            match &self.fail_with {
                Some(error) => Err(PostError::Api(error.clone())),
                None => Ok(PostReceipt {
                    channel: channel.to_string(),
                    ts: "1700000000.000100".to_string(),
                }),
            }
        }
    }

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        sink: Arc<dyn ChatPostSink>,
        defaults: PostParams,
        shared_secret: Option<SharedSecret>,
        shutdown: Shutdown,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                sink: Arc::new(RecordingPostSink::default()),
                defaults: PostParams::default(),
                shared_secret: None,
                shutdown: Shutdown::new(),
            }
        }

        pub fn with_sink(mut self, sink: Arc<dyn ChatPostSink>) -> Self {
            self.sink = sink;
            self
        }

        pub fn with_defaults(mut self, defaults: PostParams) -> Self {
            self.defaults = defaults;
            self
        }

        pub fn with_shared_secret(mut self, header: &str, value: &str) -> Self {
            self.shared_secret = Some(SharedSecret {
                header: header.to_string(),
                value: value.to_string(),
            });
            self
        }

        pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
            self.shutdown = shutdown;
            self
        }

        pub fn build(self) -> AppState {
            let (bridge, _task) = MessageBridge::start(
                self.sink,
                Arc::new(MessagePool::new(self.defaults)),
                DEFAULT_QUEUE_CAPACITY,
                self.shutdown,
            );
            AppState::new(bridge).with_shared_secret(self.shared_secret)
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
