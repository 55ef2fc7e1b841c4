use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::outgoing::{ChatPostSink, PostError, PostParams, PostReceipt};

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

/// Identity of the token's own account, as reported by `auth.test`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub team: String,
}

/// Where to open the real-time connection, from `rtm.connect`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RtmConnectInfo {
    pub url: String,
    #[serde(rename = "self")]
    pub self_info: RtmSelf,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RtmSelf {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    channel: String,
    ts: String,
}

/// Minimal Slack Web API client
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    api_url: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>, api_url: impl Into<String>) -> Result<Self, SlackError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            token: token.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Checks the token and learns who we are
    #[instrument(skip(self))]
    pub async fn auth_test(&self) -> Result<AuthIdentity, SlackError> {
        self.call("auth.test", &json!({})).await
    }

    /// Asks for a real-time websocket URL
    #[instrument(skip(self))]
    pub async fn rtm_connect(&self) -> Result<RtmConnectInfo, SlackError> {
        self.call("rtm.connect", &json!({})).await
    }

    #[instrument(skip(self, text, params))]
    pub async fn chat_post_message(
        &self,
        channel: &str,
        text: &str,
        params: &PostParams,
    ) -> Result<PostReceipt, SlackError> {
        let response: PostMessageResponse = self
            .call("chat.postMessage", &post_message_body(channel, text, params))
            .await?;

        Ok(PostReceipt {
            channel: response.channel,
            ts: response.ts,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, SlackError> {
        debug!(method, "Calling Slack API");

        let response: Value = self
            .http
            .post(format!("{}/{}", self.api_url, method))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        decode_response(response)
    }
}

/// Unwraps the `{"ok": ..., "error": ...}` envelope every method returns
fn decode_response<T: DeserializeOwned>(response: Value) -> Result<T, SlackError> {
    if response.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        return Err(SlackError::Api(error.to_string()));
    }

    serde_json::from_value(response).map_err(|e| SlackError::Decode(e.to_string()))
}

fn post_message_body(channel: &str, text: &str, params: &PostParams) -> Value {
    let mut body = match serde_json::to_value(params) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    body.insert("channel".to_string(), Value::from(channel));
    body.insert("text".to_string(), Value::from(text));
    Value::Object(body)
}

#[async_trait]
impl ChatPostSink for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        params: &PostParams,
    ) -> Result<PostReceipt, PostError> {
        self.chat_post_message(channel, text, params)
            .await
            .map_err(|e| match e {
                SlackError::Api(error) => PostError::Api(error),
                other => PostError::Request(other.to_string()),
            })
    }
}
