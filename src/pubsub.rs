use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::forward::{QueueSink, SinkError};

pub const DEFAULT_PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<PubsubMessage>,
}

#[derive(Debug, Serialize)]
struct PubsubMessage {
    data: String,
}

/// Publishes event batches to a Google Cloud Pub/Sub topic over REST
#[derive(Clone)]
pub struct PubsubSink {
    http: reqwest::Client,
    endpoint: String,
    topic: String,
    access_token: Option<String>,
}

impl PubsubSink {
    pub fn new(
        endpoint: impl Into<String>,
        topic: impl Into<String>,
        access_token: Option<String>,
    ) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SinkError::Request(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            topic: topic.into(),
            access_token,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn publish_url(&self) -> String {
        format!("{}/v1/{}:publish", self.endpoint, self.topic)
    }
}

fn publish_body(payloads: &[Vec<u8>]) -> PublishRequest {
    PublishRequest {
        messages: payloads
            .iter()
            .map(|payload| PubsubMessage {
                data: STANDARD.encode(payload),
            })
            .collect(),
    }
}

#[async_trait]
impl QueueSink for PubsubSink {
    #[instrument(skip(self, payloads), fields(topic = %self.topic, count = payloads.len()))]
    async fn publish(&self, payloads: Vec<Vec<u8>>) -> Result<(), SinkError> {
        let mut request = self
            .http
            .post(self.publish_url())
            .json(&publish_body(&payloads));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Batch published");
        Ok(())
    }
}
