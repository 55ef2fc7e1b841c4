use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use slackgw::{
    config::Cli,
    event::{ChatEvent, EventKind, EventMask, MessageEvent},
    outgoing::MessageBridge,
    Gateway, GatewayError, Shutdown,
};

use super::mocks::{ChannelEventSource, MockChatSink, MockQueueSink};

pub const SELF_USER_ID: &str = "U1";

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// A running gateway wired to mocks instead of Slack and Pub/Sub
pub struct TestSetup {
    pub base_url: String,
    pub http: reqwest::Client,
    pub chat: MockChatSink,
    pub queue: MockQueueSink,
    pub bridge: MessageBridge,
    pub shutdown: Shutdown,
    events: Option<mpsc::UnboundedSender<ChatEvent>>,
    run: JoinHandle<Result<(), GatewayError>>,
}

pub struct TestSetupBuilder {
    args: Vec<String>,
    events: Vec<EventKind>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            args: vec![
                "slackgw".to_string(),
                "--token".to_string(),
                "xoxb-test".to_string(),
                "--listen".to_string(),
                "127.0.0.1:0".to_string(),
                "--name".to_string(),
                "slackgw".to_string(),
                "--icon".to_string(),
                "https://example.com/icon.png".to_string(),
            ],
            events: vec![],
        }
    }

    pub fn with_arg(mut self, name: &str, value: &str) -> Self {
        self.args.push(name.to_string());
        self.args.push(value.to_string());
        self
    }

    pub fn with_events(mut self, events: &[EventKind]) -> Self {
        self.events = events.to_vec();
        self
    }

    pub fn with_flush_interval(self, interval: Duration) -> Self {
        let millis = interval.as_millis().to_string();
        self.with_arg("--flush-interval-ms", &millis)
    }

    pub async fn build(self) -> TestSetup {
        let mut config = Cli::try_parse_from(self.args)
            .unwrap()
            .into_config()
            .unwrap();
        if !self.events.is_empty() {
            config.events = EventMask::from_kinds(self.events);
        }

        let chat = MockChatSink::new();
        let queue = MockQueueSink::new();
        let (events, source) = ChannelEventSource::new();

        let mut gateway = Gateway::new(config);
        let bridge = gateway.start_bridge(Arc::new(chat.clone()));
        let addr = gateway.start_http().await.unwrap();
        gateway.start_forwarding(
            Box::new(source),
            SELF_USER_ID.to_string(),
            Arc::new(queue.clone()),
        );

        let shutdown = gateway.shutdown().clone();
        let run = tokio::spawn(gateway.run());

        TestSetup {
            base_url: format!("http://{}", addr),
            http: reqwest::Client::new(),
            chat,
            queue,
            bridge,
            shutdown,
            events: Some(events),
            run,
        }
    }
}

impl TestSetup {
    pub async fn post_form(&self, body: &'static str) -> (u16, String) {
        let response = self
            .http
            .post(format!("{}/post", self.base_url))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    pub async fn post_json(&self, body: serde_json::Value) -> (u16, String) {
        let response = self
            .http
            .post(format!("{}/post", self.base_url))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    pub fn send_event(&self, event: ChatEvent) {
        self.events.as_ref().unwrap().send(event).unwrap();
    }

    /// Ends the event stream as if the real-time connection went away
    pub fn end_event_stream(&mut self) {
        self.events = None;
    }

    pub fn send_message(&self, channel: &str, user: &str, text: &str) {
        let mut message = MessageEvent::new(channel, text);
        message.user = Some(user.to_string());
        self.send_event(ChatEvent::message(message));
    }

    /// Triggers shutdown and waits for the gateway to finish draining
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
