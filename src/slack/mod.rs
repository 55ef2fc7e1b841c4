// Slack platform client
//
// Web API calls plus the real-time websocket that feeds the dispatch loop.

// Public API - what other modules can use
pub use client::{
    AuthIdentity, RtmConnectInfo, RtmSelf, SlackClient, SlackError, DEFAULT_API_URL,
};
pub use rtm::{RtmConnection, RtmReplyHandle, MAX_MESSAGE_LEN};

// Internal modules
mod client;
mod rtm;
