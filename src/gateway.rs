use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::{GatewayConfig, RtmMode};
use crate::event::{DispatchExit, EventDispatcher, EventSource};
use crate::forward::{BatchPublisher, EventClassifier, QueueForwarder, QueueSink, SinkError};
use crate::outgoing::{ChatPostSink, MessageBridge, MessagePool};
use crate::pubsub::PubsubSink;
use crate::shared::AppState;
use crate::shutdown::Shutdown;
use crate::slack::{RtmConnection, SlackClient, SlackError};

/// How long `run` waits for background tasks to finish after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Failed to start slack client: {0}")]
    Slack(#[from] SlackError),

    #[error("Failed to start HTTP server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to create queue sink: {0}")]
    Sink(#[from] SinkError),

    #[error("Failed to install signal handler: {0}")]
    Signal(std::io::Error),

    #[error("{0} must be started first")]
    NotStarted(&'static str),
}

/// Owns every long-running piece of the gateway and their shared shutdown
///
/// Typical use is `start_slack`, then `start_http` and `start_rtm` as
/// configured, then `run` until a signal arrives or `close` is called.
pub struct Gateway {
    config: GatewayConfig,
    shutdown: Shutdown,
    slack: Option<SlackClient>,
    self_user_id: Option<String>,
    bridge: Option<MessageBridge>,
    tasks: Vec<JoinHandle<()>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            shutdown: Shutdown::new(),
            slack: None,
            self_user_id: None,
            bridge: None,
            tasks: Vec::new(),
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Authenticates against Slack and starts the outgoing message bridge
    #[instrument(skip(self))]
    pub async fn start_slack(&mut self) -> Result<(), GatewayError> {
        let client = SlackClient::new(&self.config.token, &self.config.slack_api_url)?;
        let identity = client.auth_test().await?;
        info!(user_id = %identity.user_id, team = %identity.team, "Authenticated with Slack");

        self.self_user_id = Some(identity.user_id);
        self.start_bridge(Arc::new(client.clone()));
        self.slack = Some(client);
        Ok(())
    }

    /// Starts the outgoing message bridge over any chat-post sink
    pub fn start_bridge(&mut self, sink: Arc<dyn ChatPostSink>) -> MessageBridge {
        let pool = Arc::new(MessagePool::new(self.config.post_defaults.clone()));
        let (bridge, task) = MessageBridge::start(
            sink,
            pool,
            self.config.bridge_capacity,
            self.shutdown.clone(),
        );
        self.tasks.push(task);
        self.bridge = Some(bridge.clone());
        bridge
    }

    /// Binds the listen address and serves the HTTP interface in the background
    #[instrument(skip(self), fields(listen = %self.config.listen))]
    pub async fn start_http(&mut self) -> Result<SocketAddr, GatewayError> {
        let bridge = self
            .bridge
            .clone()
            .ok_or(GatewayError::NotStarted("slack client"))?;

        let listener = TcpListener::bind(self.config.listen)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: self.config.listen,
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| GatewayError::Bind {
            addr: self.config.listen,
            source,
        })?;

        let state = AppState::new(bridge).with_shared_secret(self.config.shared_secret.clone());
        let app = crate::http::router(state);
        let shutdown = self.shutdown.clone();

        info!(%addr, "HTTP server listening");
        self.tasks.push(tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.wait().await });
            if let Err(e) = server.await {
                error!(error = %e, "HTTP server failed");
            }
        }));

        Ok(addr)
    }

    /// Opens the real-time connection and runs the configured handler on it
    #[instrument(skip(self), fields(rtm = ?self.config.rtm))]
    pub async fn start_rtm(&mut self) -> Result<(), GatewayError> {
        match self.config.rtm {
            RtmMode::None => Ok(()),
            RtmMode::GpubsubForward => {
                let client = self
                    .slack
                    .as_ref()
                    .ok_or(GatewayError::NotStarted("slack client"))?;

                let info = client.rtm_connect().await?;
                let sink = PubsubSink::new(
                    &self.config.pubsub_endpoint,
                    &self.config.topic,
                    self.config.pubsub_token.clone(),
                )?;
                let mut connection =
                    RtmConnection::connect(&info.url, self.shutdown.clone()).await?;
                self.tasks.extend(connection.take_writer_task());

                // auth.test is the identity messages are addressed to
                let self_user_id = self.self_user_id.clone().unwrap_or(info.self_info.id);

                info!(topic = %sink.topic(), "Forwarding events to Pub/Sub");
                self.start_forwarding(Box::new(connection), self_user_id, Arc::new(sink));
                Ok(())
            }
        }
    }

    /// Runs the forwarding pipeline from `source` into `sink`
    ///
    /// The publisher is running before the first event is dispatched. When
    /// the dispatch loop stops, for whatever reason, only this pipeline ends;
    /// HTTP posting keeps working.
    pub fn start_forwarding(
        &mut self,
        source: Box<dyn EventSource>,
        self_user_id: String,
        sink: Arc<dyn QueueSink>,
    ) {
        let config = self.config.publisher.clone();
        let (publisher, publisher_task) =
            BatchPublisher::new(sink, config, self.shutdown.clone()).start();
        self.tasks.push(publisher_task);

        let classifier = EventClassifier::new(self.config.events, self.config.self_addressed_only);
        info!(
            events = %classifier.mask(),
            self_addressed_only = classifier.self_addressed_only(),
            "Starting event forwarding"
        );
        let forwarder = QueueForwarder::new(classifier, publisher);
        let dispatcher = EventDispatcher::new(
            source,
            Arc::new(forwarder),
            self_user_id,
            self.shutdown.clone(),
        );

        let loop_task = dispatcher.start();
        self.tasks.push(tokio::spawn(async move {
            match loop_task.await {
                Ok(Ok(DispatchExit::Shutdown)) => info!("Dispatch loop stopped"),
                Ok(Ok(DispatchExit::StreamEnded)) => {
                    warn!("Real-time stream ended, event forwarding stopped")
                }
                Ok(Err(e)) => error!(error = %e, "Event handler failed, event forwarding stopped"),
                Err(e) => error!(error = %e, "Dispatch loop panicked"),
            }
        }));
    }

    /// Waits for a termination signal or an internal shutdown, then stops
    /// every task
    pub async fn run(mut self) -> Result<(), GatewayError> {
        info!("Gateway running");

        tokio::select! {
            _ = self.shutdown.wait() => info!("Shutdown detected"),
            signal = wait_for_signal() => {
                let name = signal.map_err(GatewayError::Signal)?;
                info!(signal = name, "Received signal");
            }
        }
        self.close();

        let tasks = std::mem::take(&mut self.tasks);
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Background task failed");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("Timed out waiting for background tasks");
        }

        info!("Gateway stopped");
        Ok(())
    }

    /// Signals every task to stop; safe to call more than once
    pub fn close(&self) {
        self.shutdown.trigger();
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = quit.recv() => Ok("SIGQUIT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
}
