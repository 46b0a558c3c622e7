use indexmap::IndexMap;
use serde::Serialize;

/// The sender of an event-kind timeline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub user_id: String,
    /// Sender display name (could be none if not resolved yet)
    pub display_name: Option<String>,
    /// Whether another member of the room uses the same display name.
    pub display_name_ambiguous: bool,
    pub avatar_url: Option<String>,
}

impl Sender {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            display_name_ambiguous: false,
            avatar_url: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// The name to render: the display name, suffixed with the user ID when ambiguous,
    /// or the bare user ID when no display name is known.
    pub fn disambiguated_name(&self) -> String {
        match &self.display_name {
            Some(name) if self.display_name_ambiguous => format!("{name} ({})", self.user_id),
            Some(name) => name.clone(),
            None => self.user_id.clone(),
        }
    }
}

/// The content of an event-kind timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "kind",
    content = "data"
)]
pub enum ContentVariant {
    Message(MessageContent),
    MembershipChange {
        user_id: String,
        change: MembershipChangeKind,
    },
    /// A redacted message.
    Redaction,
    /// A reaction that couldn't be aggregated onto its target.
    Reaction { key: String, relates_to: String },
    /// An `m.poll.start` event.
    Poll { question: String, has_ended: bool },
    /// An `m.sticker` event.
    Sticker { body: String },
    Location { body: String, geo_uri: String },
    StateChange { event_type: String, state_key: String },
    /// An event that could not be parsed or decrypted.
    Unsupported { event_type: String, reason: String },
    Other { event_type: String },
}

impl ContentVariant {
    pub fn is_membership_change(&self) -> bool {
        matches!(self, Self::MembershipChange { .. })
    }

    /// State-like content is rendered as a notice rather than a message bubble.
    pub fn is_state_like(&self) -> bool {
        matches!(self, Self::MembershipChange { .. } | Self::StateChange { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    pub msgtype: MessageKind,
    pub body: String,
    /// Wether the event has been edited at least once
    pub edited: bool,
    /// Event ID of the thread root, if this is a threaded message.
    pub thread_root: Option<String>,
    /// The event's id this message is replying to, if any.
    pub in_reply_to: Option<String>,
}

impl MessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            msgtype: MessageKind::Text,
            body: body.into(),
            edited: false,
            thread_root: None,
            in_reply_to: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Text,
    Emote,
    Notice,
    ServerNotice,
    Image,
    Video,
    Audio,
    File,
    VerificationRequest,
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MembershipChangeKind {
    Joined,
    Left,
    Invited,
    InvitationRejected,
    Kicked,
    Banned,
    Unbanned,
    Knocked,
}

/// One reaction as reported by the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub key: String,
    pub sender: String,
    pub timestamp_ms: u64,
}

/// Reactions grouped by key, then by sender, preserving the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReactionsByKeyBySender(IndexMap<String, IndexMap<String, u64>>);

impl ReactionsByKeyBySender {
    pub(crate) fn collect(reactions: &[Reaction]) -> Self {
        let mut by_key: IndexMap<String, IndexMap<String, u64>> = IndexMap::new();
        for reaction in reactions {
            by_key
                .entry(reaction.key.clone())
                .or_default()
                .entry(reaction.sender.clone())
                .or_insert(reaction.timestamp_ms);
        }
        Self(by_key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct senders for the given reaction key.
    pub fn count(&self, key: &str) -> usize {
        self.0.get(key).map_or(0, IndexMap::len)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Send state reported by the source for local echoes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSendState {
    NotSentYet,
    Sent,
    SendingFailed(SendFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "reason"
)]
pub enum SendFailure {
    Unknown,
    /// Sending was blocked because a verified user has a device that isn't signed.
    VerifiedUserHasUnsignedDevice { users: Vec<String> },
    /// Sending was blocked because a verified user's identity changed.
    VerifiedUserChangedIdentity { users: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "status"
)]
pub enum DeliveryStatus {
    Sending,
    Sent,
    SendingFailed { failure: SendFailure },
}
