use crate::event::{DispatchContext, EventKind, EventMask};

use super::link::parse_link;

/// Outcome of classifying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept(EventKind),
    Reject(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The event could not be mapped to a known kind
    UnknownKind,
    /// The kind is not enabled in the mask
    NotEnabled,
    /// A message that does not start with a mention of the gateway
    NotAddressedToSelf,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }
}

/// Decides which events get forwarded
#[derive(Debug, Clone, Copy)]
pub struct EventClassifier {
    mask: EventMask,
    self_addressed_only: bool,
}

impl EventClassifier {
    pub fn new(mask: EventMask, self_addressed_only: bool) -> Self {
        Self {
            mask,
            self_addressed_only,
        }
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    pub fn self_addressed_only(&self) -> bool {
        self.self_addressed_only
    }

    pub fn classify(&self, ctx: &DispatchContext) -> Verdict {
        let event = ctx.event();
        let kind = event.kind();

        if kind == EventKind::Invalid {
            return Verdict::Reject(RejectReason::UnknownKind);
        }
        if !self.mask.contains(kind) {
            return Verdict::Reject(RejectReason::NotEnabled);
        }

        if kind == EventKind::Message && self.self_addressed_only {
            let addressed = event
                .as_message()
                .is_some_and(|message| is_addressed_to(&message.text, ctx.self_user_id()));
            if !addressed {
                return Verdict::Reject(RejectReason::NotAddressedToSelf);
            }
        }

        Verdict::Accept(kind)
    }
}

/// True when the first word of `text` is a mention link for `user_id`
fn is_addressed_to(text: &str, user_id: &str) -> bool {
    let first_word = text.split_whitespace().next().unwrap_or("");

    match parse_link(first_word) {
        Ok(link) => link
            .text
            .strip_prefix('@')
            .is_some_and(|mentioned| mentioned == user_id),
        Err(_) => false,
    }
}
