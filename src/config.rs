use clap::{ArgAction, Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::event::{EventKind, EventMask};
use crate::forward::{PublisherConfig, DEFAULT_BATCH_CAPACITY};
use crate::outgoing::{PostParams, DEFAULT_QUEUE_CAPACITY};
use crate::pubsub::DEFAULT_PUBSUB_ENDPOINT;
use crate::shared::SharedSecret;
use crate::slack::DEFAULT_API_URL;

pub const TOKEN_ENV: &str = "SLACK_API_TOKEN";
pub const DEFAULT_NAME: &str = "slackgw";
pub const DEFAULT_ICON: &str =
    "https://raw.githubusercontent.com/kentaro/slackgw/master/slackgw.jpg";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("You must provide a Slack bot token")]
    MissingToken,

    #[error("Failed to read from file {path}: {source}")]
    TokenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unknown event name: {0}")]
    UnknownEvent(String),

    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Which real-time handler to run once connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RtmMode {
    /// Do not open a real-time connection
    #[default]
    None,
    /// Forward selected events to Google Cloud Pub/Sub
    GpubsubForward,
}

#[derive(Debug, Parser)]
#[command(name = "slackgw", version, about = "Slack gateway: HTTP posting and event forwarding")]
pub struct Cli {
    /// Listen address for the HTTP interface
    #[arg(long, default_value = "127.0.0.1:4979")]
    pub listen: SocketAddr,

    /// Slack bot token
    #[arg(long)]
    pub token: Option<String>,

    /// File holding the Slack bot token
    #[arg(long)]
    pub tokenfile: Option<PathBuf>,

    /// Topic to forward events to
    #[arg(long, default_value = "projects/:project_id:/topics/slackgw-forward")]
    pub topic: String,

    /// Bot name used when posting
    #[arg(long, default_value = DEFAULT_NAME)]
    pub name: String,

    /// Bot icon used when posting
    #[arg(long, default_value = DEFAULT_ICON)]
    pub icon: String,

    /// Real-time handler to enable
    #[arg(long, value_enum, default_value_t = RtmMode::None)]
    pub rtm: RtmMode,

    /// Turn the HTTP server on or off
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub server: bool,

    /// Event(s) to forward, by name (repeatable)
    #[arg(long = "event")]
    pub events: Vec<String>,

    /// Only forward messages that start by mentioning the bot
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub self_addressed_only: bool,

    #[arg(long, default_value_t = 2000)]
    pub flush_interval_ms: u64,

    #[arg(long, default_value_t = DEFAULT_BATCH_CAPACITY)]
    pub batch_capacity: usize,

    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub bridge_capacity: usize,

    /// Header that must carry the shared secret on POST /post
    #[arg(long, requires = "secret_header_value")]
    pub secret_header_name: Option<String>,

    #[arg(long, requires = "secret_header_name")]
    pub secret_header_value: Option<String>,

    /// OAuth access token for Pub/Sub
    #[arg(long, env = "PUBSUB_ACCESS_TOKEN", hide_env_values = true)]
    pub pubsub_token: Option<String>,

    #[arg(long, default_value = DEFAULT_PUBSUB_ENDPOINT)]
    pub pubsub_endpoint: String,

    #[arg(long, default_value = DEFAULT_API_URL)]
    pub slack_api_url: String,
}

/// Everything the gateway needs to start, after validation
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    pub token: String,
    pub topic: String,
    pub post_defaults: PostParams,
    pub rtm: RtmMode,
    pub server: bool,
    pub events: EventMask,
    pub self_addressed_only: bool,
    pub publisher: PublisherConfig,
    pub bridge_capacity: usize,
    pub shared_secret: Option<SharedSecret>,
    pub pubsub_token: Option<String>,
    pub pubsub_endpoint: String,
    pub slack_api_url: String,
}

impl Cli {
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let token = resolve_token(
            self.token.as_deref(),
            self.tokenfile.as_deref(),
            std::env::var(TOKEN_ENV).ok().as_deref(),
        )?;

        if self.batch_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "batch-capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.bridge_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "bridge-capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "flush-interval-ms",
                reason: "must be positive".to_string(),
            });
        }

        let shared_secret = match (self.secret_header_name, self.secret_header_value) {
            (Some(header), Some(value)) => Some(SharedSecret::new(header, value)),
            _ => None,
        };

        Ok(GatewayConfig {
            listen: self.listen,
            token,
            topic: self.topic,
            post_defaults: PostParams::with_identity(non_empty(self.name), non_empty(self.icon)),
            rtm: self.rtm,
            server: self.server,
            events: parse_events(&self.events)?,
            self_addressed_only: self.self_addressed_only,
            publisher: PublisherConfig {
                capacity: self.batch_capacity,
                flush_interval: Duration::from_millis(self.flush_interval_ms),
            },
            bridge_capacity: self.bridge_capacity,
            shared_secret,
            pubsub_token: self.pubsub_token,
            pubsub_endpoint: self.pubsub_endpoint,
            slack_api_url: self.slack_api_url,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Picks the token from the flag, then the file, then the environment
pub fn resolve_token(
    inline: Option<&str>,
    file: Option<&Path>,
    env: Option<&str>,
) -> Result<String, ConfigError> {
    let token = match (inline.filter(|t| !t.is_empty()), file) {
        (Some(token), _) => token.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|source| ConfigError::TokenFile {
                path: path.to_path_buf(),
                source,
            })?
            .trim()
            .to_string(),
        (None, None) => env.unwrap_or_default().to_string(),
    };

    if token.is_empty() {
        return Err(ConfigError::MissingToken);
    }
    Ok(token)
}

/// Builds the forwarding mask; with no names given only messages are forwarded
pub fn parse_events(names: &[String]) -> Result<EventMask, ConfigError> {
    if names.is_empty() {
        return Ok(EventMask::from_kinds([EventKind::Message]));
    }

    names
        .iter()
        .flat_map(|name| name.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            EventKind::from_name(name).ok_or_else(|| ConfigError::UnknownEvent(name.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn temp_token_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("slackgw-token-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_inline_token_wins() {
        let path = temp_token_file("from-file");
        let token = resolve_token(Some("inline"), Some(&path), Some("from-env")).unwrap();
        assert_eq!(token, "inline");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_file_token_beats_env_and_is_trimmed() {
        let path = temp_token_file("xoxb-file\n");
        let token = resolve_token(None, Some(&path), Some("from-env")).unwrap();
        assert_eq!(token, "xoxb-file");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_env_token_is_last_resort() {
        assert_eq!(resolve_token(None, None, Some("from-env")).unwrap(), "from-env");
    }

    #[test]
    fn test_missing_token() {
        assert!(matches!(
            resolve_token(None, None, None),
            Err(ConfigError::MissingToken)
        ));
        assert!(matches!(
            resolve_token(Some(""), None, Some("")),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn test_unreadable_token_file() {
        let path = std::env::temp_dir().join(format!("slackgw-missing-{}", uuid::Uuid::new_v4()));
        assert!(matches!(
            resolve_token(None, Some(&path), Some("from-env")),
            Err(ConfigError::TokenFile { .. })
        ));
    }

    #[rstest]
    #[case(&[], &[EventKind::Message])]
    #[case(&["message"], &[EventKind::Message])]
    #[case(&["MessageEvent", "user_typing"], &[EventKind::Message, EventKind::UserTyping])]
    #[case(&["hello,presence_change"], &[EventKind::Hello, EventKind::PresenceChange])]
    fn test_parse_events(#[case] names: &[&str], #[case] expected: &[EventKind]) {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let mask = parse_events(&names).unwrap();
        assert_eq!(mask, EventMask::from_kinds(expected.iter().copied()));
    }

    #[test]
    fn test_unknown_event_name() {
        let result = parse_events(&["not_an_event".to_string()]);
        assert!(matches!(result, Err(ConfigError::UnknownEvent(name)) if name == "not_an_event"));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["slackgw", "--token", "xoxb-1"]).unwrap();
        let config = cli.into_config().unwrap();

        assert_eq!(config.listen.to_string(), "127.0.0.1:4979");
        assert_eq!(config.token, "xoxb-1");
        assert!(config.server);
        assert!(config.self_addressed_only);
        assert_eq!(config.rtm, RtmMode::None);
        assert_eq!(config.publisher.capacity, 255);
        assert_eq!(config.publisher.flush_interval, Duration::from_secs(2));
        assert_eq!(config.post_defaults.username.as_deref(), Some("slackgw"));
        assert!(config.shared_secret.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "slackgw",
            "--token",
            "xoxb-1",
            "--server",
            "false",
            "--rtm",
            "gpubsub-forward",
            "--event",
            "message",
            "--event",
            "reaction_added",
            "--secret-header-name",
            "X-Gateway-Secret",
            "--secret-header-value",
            "s3cret",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();

        assert!(!config.server);
        assert_eq!(config.rtm, RtmMode::GpubsubForward);
        assert!(config.events.contains(EventKind::ReactionAdded));
        assert_eq!(
            config.shared_secret,
            Some(SharedSecret::new("X-Gateway-Secret", "s3cret"))
        );
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let cli =
            Cli::try_parse_from(["slackgw", "--token", "t", "--batch-capacity", "0"]).unwrap();
        assert!(matches!(
            cli.into_config(),
            Err(ConfigError::Invalid { name: "batch-capacity", .. })
        ));
    }
}
