use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::bridge::BridgeError;

/// Optional settings for a chat post
///
/// Every field is optional; unset fields fall back to whatever the chat
/// platform does by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_names: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfurl_links: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfurl_media: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_broadcast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<serde_json::Value>,
}

impl PostParams {
    /// Defaults carrying the bot's display identity
    pub fn with_identity(username: Option<String>, icon_url: Option<String>) -> Self {
        Self {
            username,
            icon_url,
            ..Default::default()
        }
    }

    /// Overrides every field that is set in `other`
    pub fn merge_from(&mut self, other: PostParams) {
        macro_rules! take_set {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take_set!(
            username,
            as_user,
            icon_url,
            icon_emoji,
            parse,
            link_names,
            unfurl_links,
            unfurl_media,
            thread_ts,
            reply_broadcast,
            attachments
        );
    }
}

/// What the chat platform reports back for a successful post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub channel: String,
    pub ts: String,
}

pub(crate) type ResponseSlot = oneshot::Sender<Result<PostReceipt, BridgeError>>;

/// A pending chat post travelling through the bridge
///
/// Instances come from a [`super::MessagePool`] and go back to it after the
/// post has been attempted. The response slot is written exactly once.
#[derive(Debug)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
    pub params: PostParams,
    ticket: Option<Uuid>,
    respond_to: Option<ResponseSlot>,
}

impl OutgoingMessage {
    pub(crate) fn new(params: PostParams) -> Self {
        Self {
            channel: String::new(),
            text: String::new(),
            params,
            ticket: None,
            respond_to: None,
        }
    }

    /// Correlation id assigned when the message was checked out
    pub fn ticket(&self) -> Option<Uuid> {
        self.ticket
    }

    pub(crate) fn issue_ticket(&mut self) {
        self.ticket = Some(Uuid::new_v4());
    }

    pub(crate) fn attach_response(&mut self, slot: ResponseSlot) {
        self.respond_to = Some(slot);
    }

    pub(crate) fn take_response(&mut self) -> Option<ResponseSlot> {
        self.respond_to.take()
    }

    /// Clears everything a previous use left behind
    pub(crate) fn reset(&mut self, defaults: &PostParams) {
        self.channel.clear();
        self.text.clear();
        self.params.clone_from(defaults);
        self.ticket = None;
        self.respond_to = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_defaults_for_unset_fields() {
        let mut params = PostParams::with_identity(
            Some("slackgw".to_string()),
            Some("https://example.com/icon.png".to_string()),
        );

        params.merge_from(PostParams {
            icon_emoji: Some(":robot_face:".to_string()),
            username: Some("deploybot".to_string()),
            ..Default::default()
        });

        assert_eq!(params.username.as_deref(), Some("deploybot"));
        assert_eq!(
            params.icon_url.as_deref(),
            Some("https://example.com/icon.png")
        );
        assert_eq!(params.icon_emoji.as_deref(), Some(":robot_face:"));
    }

    #[test]
    fn test_reset_clears_previous_use() {
        let defaults = PostParams::with_identity(Some("slackgw".to_string()), None);
        let mut message = OutgoingMessage::new(defaults.clone());
        message.channel.push_str("#ops");
        message.text.push_str("deploy done");
        message.params.as_user = Some(true);
        message.issue_ticket();
        let (slot, _rx) = oneshot::channel();
        message.attach_response(slot);

        message.reset(&defaults);

        assert!(message.channel.is_empty());
        assert!(message.text.is_empty());
        assert_eq!(message.params, defaults);
        assert!(message.ticket().is_none());
        assert!(message.take_response().is_none());
    }

    #[test]
    fn test_params_deserialize_from_partial_json() {
        let params: PostParams =
            serde_json::from_str(r#"{"username": "bot", "unfurl_links": false}"#).unwrap();
        assert_eq!(params.username.as_deref(), Some("bot"));
        assert_eq!(params.unfurl_links, Some(false));
        assert!(params.icon_url.is_none());
    }
}
