use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream, StreamExt};
use futures::SinkExt;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::client::SlackError;
use crate::event::{ChatConnection, ChatEvent, EventError, EventKind, EventSource};
use crate::shutdown::Shutdown;

/// Longest message text the real-time API accepts
pub const MAX_MESSAGE_LEN: usize = 4000;

const PING_INTERVAL: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reply side of a real-time connection
#[derive(Clone)]
pub struct RtmReplyHandle {
    frames: mpsc::UnboundedSender<String>,
    next_id: Arc<AtomicU64>,
}

fn next_frame_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl RtmReplyHandle {
    fn next_id(&self) -> u64 {
        next_frame_id(&self.next_id)
    }

    fn send_frame(&self, frame: Value) -> Result<(), EventError> {
        self.frames
            .send(frame.to_string())
            .map_err(|_| EventError::ReplyFailed("connection closed".to_string()))
    }
}

#[async_trait]
impl ChatConnection for RtmReplyHandle {
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), EventError> {
        if text.chars().count() > MAX_MESSAGE_LEN {
            return Err(EventError::ReplyFailed(format!(
                "message too long ({} > {} characters)",
                text.chars().count(),
                MAX_MESSAGE_LEN
            )));
        }

        self.send_frame(json!({
            "id": self.next_id(),
            "type": "message",
            "channel": channel,
            "text": text,
        }))
    }
}

/// Live real-time websocket, read as a stream of [`ChatEvent`]s
///
/// Besides the frames the server sends, the connection raises its own
/// `connected`, `disconnected`, `connection_error`, `unmarshalling_error`
/// and `ack_error` events so handlers can observe the connection itself.
///
/// The websocket is closed once the shutdown signal fires or the connection
/// and every reply handle taken from it are dropped.
pub struct RtmConnection {
    reader: SplitStream<WsStream>,
    replies: RtmReplyHandle,
    writer: Option<JoinHandle<()>>,
    pending: VecDeque<ChatEvent>,
    finished: bool,
}

impl RtmConnection {
    pub async fn connect(url: &str, shutdown: Shutdown) -> Result<Self, SlackError> {
        info!("Opening real-time connection");

        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| SlackError::WebSocket(e.to_string()))?;
        let (writer, reader) = stream.split();

        let (frames, outbound) = mpsc::unbounded_channel();
        let next_id = Arc::new(AtomicU64::new(0));
        let replies = RtmReplyHandle {
            frames,
            next_id: next_id.clone(),
        };
        let writer = tokio::spawn(write_frames(writer, outbound, next_id, shutdown));

        let mut pending = VecDeque::new();
        pending.push_back(ChatEvent::synthetic(EventKind::Connected, json!({})));

        Ok(Self {
            reader,
            replies,
            writer: Some(writer),
            pending,
            finished: false,
        })
    }

    pub fn reply_handle(&self) -> RtmReplyHandle {
        self.replies.clone()
    }

    /// Hands out the writer task so the owner can wait for the close
    pub fn take_writer_task(&mut self) -> Option<JoinHandle<()>> {
        self.writer.take()
    }

    fn finish(&mut self, event: Option<ChatEvent>) -> Option<ChatEvent> {
        self.finished = true;
        self.pending.extend(event);
        self.pending
            .push_back(ChatEvent::synthetic(EventKind::Disconnected, json!({})));
        self.pending.pop_front()
    }
}

#[async_trait]
impl EventSource for RtmConnection {
    async fn next_event(&mut self) -> Option<ChatEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        if self.finished {
            return None;
        }

        loop {
            match self.reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = decode_frame(text.as_str()) {
                        return Some(event);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Real-time connection closed by server");
                    return self.finish(None);
                }
                Some(Ok(_)) => continue, // binary/ping/pong
                Some(Err(e)) => {
                    warn!(error = %e, "Real-time connection failed");
                    let error = ChatEvent::synthetic(
                        EventKind::ConnectionError,
                        json!({ "error": e.to_string() }),
                    );
                    return self.finish(Some(error));
                }
                None => return self.finish(None),
            }
        }
    }

    fn connection(&self) -> Option<Arc<dyn ChatConnection>> {
        Some(Arc::new(self.reply_handle()))
    }
}

async fn write_frames(
    mut writer: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    next_id: Arc<AtomicU64>,
    shutdown: Shutdown,
) {
    let mut ping = interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await;

    loop {
        let frame = tokio::select! {
            biased;

            _ = shutdown.wait() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = ping.tick() => {
                json!({ "id": next_frame_id(&next_id), "type": "ping" }).to_string()
            }
        };

        debug!(bytes = frame.len(), "Sending real-time frame");
        if let Err(e) = writer.send(Message::Text(frame.into())).await {
            warn!(error = %e, "Failed to write real-time frame");
            break;
        }
    }

    info!("Closing real-time connection");
    if let Err(e) = writer.send(Message::Close(None)).await {
        debug!(error = %e, "Close frame not sent");
    }
}

/// Turns one text frame into an event
///
/// Returns `None` for frames that only acknowledge something we sent.
pub(crate) fn decode_frame(text: &str) -> Option<ChatEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return Some(ChatEvent::synthetic(
                EventKind::UnmarshallingError,
                json!({ "error": e.to_string(), "raw": text }),
            ))
        }
    };

    if value.get("reply_to").is_some() {
        if value.get("ok").and_then(Value::as_bool) == Some(false) {
            return Some(ChatEvent::synthetic(EventKind::AckError, value));
        }
        return None;
    }

    match value.get("type").and_then(Value::as_str) {
        Some("pong") => None,
        Some(wire_type) => {
            let wire_type = wire_type.to_string();
            Some(ChatEvent::from_wire(wire_type, value))
        }
        None => Some(ChatEvent::synthetic(
            EventKind::UnmarshallingError,
            json!({ "error": "frame has no type", "raw": value }),
        )),
    }
}
