use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Version of the kind -> bit position table below.
///
/// Bump this whenever a position changes, since masks built by older
/// configurations would silently select different events.
pub const EVENT_BIT_TABLE_VERSION: u32 = 1;

/// Closed set of real-time event categories the gateway knows about
///
/// `Invalid` is reserved for frames we could not map to a known category.
/// It owns bit 0 of the mask space and is never matched by any mask.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Invalid,
    AccountsChanged,
    AckError,
    BotAdded,
    BotChanged,
    ChannelCreated,
    ChannelHistoryChanged,
    ChannelInfo,
    ChannelJoined,
    ChannelRename,
    CommandsChanged,
    Connected,
    Connecting,
    ConnectionError,
    DndUpdated,
    Disconnected,
    EmailDomainChanged,
    EmojiChanged,
    FileCommentAdded,
    FileCommentDeleted,
    FileCommentEdited,
    GroupCreated,
    GroupRename,
    Hello,
    ImCreated,
    InvalidAuth,
    ManualPresenceChange,
    Message,
    MessageTooLong,
    OutgoingError,
    PinAdded,
    PinRemoved,
    PrefChange,
    PresenceChange,
    ReactionAdded,
    ReactionRemoved,
    ReconnectUrl,
    StarAdded,
    StarRemoved,
    TeamDomainChange,
    TeamJoin,
    TeamMigrationStarted,
    TeamPrefChange,
    TeamRename,
    UnmarshallingError,
    UserChange,
    UserTyping,
}

impl EventKind {
    /// Bit position of this kind inside an [`EventMask`]
    pub const fn bit_position(self) -> u32 {
        match self {
            EventKind::Invalid => 0,
            EventKind::AccountsChanged => 1,
            EventKind::AckError => 2,
            EventKind::BotAdded => 3,
            EventKind::BotChanged => 4,
            EventKind::ChannelCreated => 5,
            EventKind::ChannelHistoryChanged => 6,
            EventKind::ChannelInfo => 7,
            EventKind::ChannelJoined => 8,
            EventKind::ChannelRename => 9,
            EventKind::CommandsChanged => 10,
            EventKind::Connected => 11,
            EventKind::Connecting => 12,
            EventKind::ConnectionError => 13,
            EventKind::DndUpdated => 14,
            EventKind::Disconnected => 15,
            EventKind::EmailDomainChanged => 16,
            EventKind::EmojiChanged => 17,
            EventKind::FileCommentAdded => 18,
            EventKind::FileCommentDeleted => 19,
            EventKind::FileCommentEdited => 20,
            EventKind::GroupCreated => 21,
            EventKind::GroupRename => 22,
            EventKind::Hello => 23,
            EventKind::ImCreated => 24,
            EventKind::InvalidAuth => 25,
            EventKind::ManualPresenceChange => 26,
            EventKind::Message => 27,
            EventKind::MessageTooLong => 28,
            EventKind::OutgoingError => 29,
            EventKind::PinAdded => 30,
            EventKind::PinRemoved => 31,
            EventKind::PrefChange => 32,
            EventKind::PresenceChange => 33,
            EventKind::ReactionAdded => 34,
            EventKind::ReactionRemoved => 35,
            EventKind::ReconnectUrl => 36,
            EventKind::StarAdded => 37,
            EventKind::StarRemoved => 38,
            EventKind::TeamDomainChange => 39,
            EventKind::TeamJoin => 40,
            EventKind::TeamMigrationStarted => 41,
            EventKind::TeamPrefChange => 42,
            EventKind::TeamRename => 43,
            EventKind::UnmarshallingError => 44,
            EventKind::UserChange => 45,
            EventKind::UserTyping => 46,
        }
    }

    /// Mask bit for this kind. `Invalid` has no bit.
    pub const fn bit(self) -> u64 {
        match self {
            EventKind::Invalid => 0,
            kind => 1 << kind.bit_position(),
        }
    }

    /// Maps a single-bit mask back to its kind, `Invalid` when no kind owns it
    pub fn from_bit(bit: u64) -> EventKind {
        EventKind::iter()
            .find(|kind| *kind != EventKind::Invalid && kind.bit() == bit)
            .unwrap_or(EventKind::Invalid)
    }

    /// Canonical name, e.g. `reaction_added`
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Looks a kind up by name
    ///
    /// Accepts the canonical snake_case name (`message`) as well as the
    /// legacy flag form (`MessageEvent`). `Invalid` is never returned.
    pub fn from_name(name: &str) -> Option<EventKind> {
        let kind = EventKind::from_str(name).ok().or_else(|| {
            let stem = name.strip_suffix("Event")?;
            EventKind::iter().find(|kind| format!("{:?}", kind).eq_ignore_ascii_case(stem))
        })?;

        (kind != EventKind::Invalid).then_some(kind)
    }

    /// Maps the `type` field of a real-time frame to its kind
    ///
    /// Several wire types collapse onto the same kind (all the channel
    /// bookkeeping notifications are `ChannelInfo`, for instance).
    /// Unknown types map to `Invalid`.
    pub fn from_wire_type(wire_type: &str) -> EventKind {
        match wire_type {
            "channel_marked" | "channel_left" | "channel_deleted" | "channel_archive"
            | "channel_unarchive" => EventKind::ChannelInfo,
            "group_joined" | "group_left" | "group_open" | "group_close" | "group_archive"
            | "group_unarchive" | "group_marked" => EventKind::GroupCreated,
            "dnd_updated_user" => EventKind::DndUpdated,
            "im_open" | "im_close" | "im_marked" | "im_history_changed" => EventKind::ImCreated,
            "bot_added" | "bot_changed" | "message" | "hello" | "accounts_changed"
            | "channel_created" | "channel_history_changed" | "channel_joined"
            | "channel_rename" | "commands_changed" | "dnd_updated" | "email_domain_changed"
            | "emoji_changed" | "file_comment_added" | "file_comment_deleted"
            | "file_comment_edited" | "group_created" | "group_rename" | "im_created"
            | "manual_presence_change" | "pin_added" | "pin_removed" | "pref_change"
            | "presence_change" | "reaction_added" | "reaction_removed" | "reconnect_url"
            | "star_added" | "star_removed" | "team_domain_change" | "team_join"
            | "team_migration_started" | "team_pref_change" | "team_rename" | "user_change"
            | "user_typing" => EventKind::from_str(wire_type).unwrap_or(EventKind::Invalid),
            _ => EventKind::Invalid,
        }
    }
}

/// Immutable set of event kinds selected for forwarding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventMask(u64);

impl EventMask {
    /// OR-reduces the given kinds into a mask
    pub fn from_kinds<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = EventKind>,
    {
        Self(kinds.into_iter().fold(0, |mask, kind| mask | kind.bit()))
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        (self.0 & kind.bit()) != 0
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Kinds selected by this mask, in bit order
    pub fn kinds(&self) -> Vec<EventKind> {
        (1..u64::BITS)
            .map(|position| 1u64 << position)
            .filter(|bit| self.0 & bit != 0)
            .map(EventKind::from_bit)
            .filter(|kind| *kind != EventKind::Invalid)
            .collect()
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.kinds().into_iter().map(EventKind::name).collect();
        f.write_str(&names.join(","))
    }
}

impl FromIterator<EventKind> for EventMask {
    fn from_iter<T: IntoIterator<Item = EventKind>>(iter: T) -> Self {
        Self::from_kinds(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn test_every_kind_round_trips_through_its_own_mask() {
        for kind in EventKind::iter().filter(|k| *k != EventKind::Invalid) {
            let mask = EventMask::from_kinds([kind]);
            assert!(mask.contains(kind), "{:?} should match its own mask", kind);

            for other in EventKind::iter().filter(|k| *k != kind) {
                assert!(
                    !mask.contains(other),
                    "{:?} mask should not match {:?}",
                    kind,
                    other
                );
            }
        }
    }

    #[test]
    fn test_bit_positions_are_unique_and_fit_in_mask() {
        let positions: HashSet<u32> = EventKind::iter().map(|k| k.bit_position()).collect();
        assert_eq!(positions.len(), EventKind::iter().count());
        assert!(positions.iter().all(|p| *p < 64));
        assert_eq!(EventKind::Invalid.bit_position(), 0);
    }

    #[test]
    fn test_invalid_is_never_matched() {
        let everything = EventMask::from_kinds(EventKind::iter());
        assert!(!everything.is_empty());
        assert!(!everything.contains(EventKind::Invalid));
        assert_eq!(everything.bits() & 1, 0);
    }

    #[test]
    fn test_from_bit_maps_back_to_kind() {
        for kind in EventKind::iter().filter(|k| *k != EventKind::Invalid) {
            assert_eq!(EventKind::from_bit(kind.bit()), kind);
        }
        assert_eq!(EventKind::from_bit(0), EventKind::Invalid);
        assert_eq!(EventKind::from_bit(1), EventKind::Invalid);
        assert_eq!(EventKind::from_bit(1 << 63), EventKind::Invalid);
    }

    #[test]
    fn test_mask_kinds_lists_selected_kinds_in_bit_order() {
        let mask = EventMask::from_kinds([EventKind::UserTyping, EventKind::Message]);
        assert_eq!(mask.kinds(), vec![EventKind::Message, EventKind::UserTyping]);
    }

    #[test]
    fn test_mask_display_names_selected_kinds() {
        let mask = EventMask::from_kinds([EventKind::UserTyping, EventKind::Message]);
        assert_eq!(mask.to_string(), "message,user_typing");
        assert_eq!(EventMask::default().to_string(), "");
    }

    #[rstest]
    #[case("message", Some(EventKind::Message))]
    #[case("MessageEvent", Some(EventKind::Message))]
    #[case("reaction_added", Some(EventKind::ReactionAdded))]
    #[case("ReactionAddedEvent", Some(EventKind::ReactionAdded))]
    #[case("DNDUpdatedEvent", Some(EventKind::DndUpdated))]
    #[case("IMCreatedEvent", Some(EventKind::ImCreated))]
    #[case("invalid", None)]
    #[case("Invalid", None)]
    #[case("no_such_event", None)]
    fn test_from_name(#[case] name: &str, #[case] expected: Option<EventKind>) {
        assert_eq!(EventKind::from_name(name), expected);
    }

    #[rstest]
    #[case("message", EventKind::Message)]
    #[case("hello", EventKind::Hello)]
    #[case("channel_marked", EventKind::ChannelInfo)]
    #[case("dnd_updated_user", EventKind::DndUpdated)]
    #[case("connected", EventKind::Invalid)]
    #[case("something_new", EventKind::Invalid)]
    fn test_from_wire_type(#[case] wire_type: &str, #[case] expected: EventKind) {
        assert_eq!(EventKind::from_wire_type(wire_type), expected);
    }
}
