use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::EventKind;

/// A chat message as delivered on the real-time stream
///
/// Only the fields the gateway looks at are typed. Everything else the
/// platform sends is kept in `extra` so nothing is lost when the event is
/// forwarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MessageEvent {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Kind-specific payload of a [`ChatEvent`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    Message(MessageEvent),
    Raw(serde_json::Value),
}

/// One occurrence reported by the real-time stream
///
/// Events are facts about things that already happened. The `kind` tag is
/// what the rest of the pipeline matches on; `data` is carried along
/// untouched so it can be forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEvent {
    #[serde(skip)]
    kind: EventKind,
    /// The `type` as it appeared on the wire (several may share a kind)
    #[serde(rename = "type")]
    wire_type: String,
    received_at: DateTime<Utc>,
    data: EventData,
}

impl ChatEvent {
    /// Builds an event from a decoded frame, looking the kind up by its wire type
    pub fn from_wire(wire_type: impl Into<String>, data: serde_json::Value) -> Self {
        let wire_type = wire_type.into();
        let kind = EventKind::from_wire_type(&wire_type);
        Self::with_kind(kind, wire_type, data)
    }

    /// Builds an event of a known kind (used for events the client itself raises)
    pub fn synthetic(kind: EventKind, data: serde_json::Value) -> Self {
        Self::with_kind(kind, kind.name(), data)
    }

    pub fn message(message: MessageEvent) -> Self {
        Self {
            kind: EventKind::Message,
            wire_type: EventKind::Message.name().to_string(),
            received_at: Utc::now(),
            data: EventData::Message(message),
        }
    }

    fn with_kind(kind: EventKind, wire_type: impl Into<String>, data: serde_json::Value) -> Self {
        let data = match kind {
            // Messages get typed so the classifier can look at the text.
            // A message frame we cannot read is still forwarded raw.
            EventKind::Message => match serde_json::from_value::<MessageEvent>(data.clone()) {
                Ok(message) => EventData::Message(message),
                Err(_) => EventData::Raw(data),
            },
            _ => EventData::Raw(data),
        };

        Self {
            kind,
            wire_type: wire_type.into(),
            received_at: Utc::now(),
            data,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn wire_type(&self) -> &str {
        &self.wire_type
    }

    /// The message payload, if this is a readable message event
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match &self.data {
            EventData::Message(message) => Some(message),
            EventData::Raw(_) => None,
        }
    }
}
