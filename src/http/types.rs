use serde::{Deserialize, Serialize};

use crate::outgoing::PostParams;

/// Body of `POST /post`, either JSON or form encoded
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostMessageRequest {
    pub channel: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<PostParams>,
}
