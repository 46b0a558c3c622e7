//! Normalized wrappers around raw timeline entries.

use std::{
    fmt,
    sync::{Arc, OnceLock},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Serialize, Serializer, ser::SerializeStruct};
use thiserror::Error;

pub mod content;
pub mod item_id;
pub mod virtual_item;

use content::{
    ContentVariant, DeliveryStatus, RawSendState, Reaction, ReactionsByKeyBySender, Sender,
};
use item_id::{EventOrTransactionId, UniqueId};
use virtual_item::VirtualItem;

/// Accessor over an opaque timeline entry delivered by the event source.
///
/// Implementations must be pure: every call returns the same data for the same entry.
pub trait RawTimelineItem: fmt::Debug + Send + Sync {
    fn unique_id(&self) -> UniqueId;

    fn event_or_transaction_id(&self) -> Option<EventOrTransactionId>;

    fn kind(&self) -> RawItemKind;

    /// Explicit send state for local echoes, if the source tracks one.
    fn send_state(&self) -> Option<RawSendState> {
        None
    }

    fn reactions(&self) -> Vec<Reaction> {
        Vec::new()
    }
}

/// What a raw entry is, as reported by the source.
#[derive(Debug, Clone)]
pub enum RawItemKind {
    Event {
        timestamp_ms: u64,
        sender: Sender,
        content: ContentVariant,
    },
    Virtual(VirtualItem),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("event item {0} has neither an event ID nor a transaction ID")]
    MissingIdentity(UniqueId),
    #[error("virtual item {unique_id} carries {id}")]
    VirtualWithIdentity {
        unique_id: UniqueId,
        id: EventOrTransactionId,
    },
}

/// A read-only snapshot of one timeline entry.
///
/// Identity fields are extracted eagerly; delivery status, reactions and the debug
/// description are derived from the raw entry on first access and cached.
pub struct TimelineEnvelope {
    unique_id: UniqueId,
    kind: EnvelopeKind,
    raw: Arc<dyn RawTimelineItem>,
    delivery_status: OnceLock<Option<DeliveryStatus>>,
    reactions: OnceLock<ReactionsByKeyBySender>,
    debug_info: OnceLock<String>,
}

#[derive(Debug, Clone)]
pub enum EnvelopeKind {
    Event(EventEnvelope),
    Virtual(VirtualItem),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    id: EventOrTransactionId,
    #[serde(serialize_with = "serialize_millis")]
    timestamp: SystemTime,
    sender: Sender,
    content: ContentVariant,
}

impl EventEnvelope {
    pub fn id(&self) -> &EventOrTransactionId {
        &self.id
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn content(&self) -> &ContentVariant {
        &self.content
    }
}

impl TimelineEnvelope {
    /// Wraps a raw entry, validating that event items carry exactly one identity
    /// and virtual items carry none.
    pub fn new(raw: Arc<dyn RawTimelineItem>) -> Result<Self, EnvelopeError> {
        let unique_id = raw.unique_id();
        let id = raw.event_or_transaction_id();
        let kind = match (raw.kind(), id) {
            (
                RawItemKind::Event {
                    timestamp_ms,
                    sender,
                    content,
                },
                Some(id),
            ) => EnvelopeKind::Event(EventEnvelope {
                id,
                timestamp: UNIX_EPOCH + Duration::from_millis(timestamp_ms),
                sender,
                content,
            }),
            (RawItemKind::Event { .. }, None) => {
                return Err(EnvelopeError::MissingIdentity(unique_id));
            }
            (RawItemKind::Virtual(item), None) => EnvelopeKind::Virtual(item),
            (RawItemKind::Virtual(_), Some(id)) => {
                return Err(EnvelopeError::VirtualWithIdentity { unique_id, id });
            }
        };

        Ok(Self {
            unique_id,
            kind,
            raw,
            delivery_status: OnceLock::new(),
            reactions: OnceLock::new(),
            debug_info: OnceLock::new(),
        })
    }

    /// Builds a virtual entry that exists only in the rendered sequence.
    pub(crate) fn synthesized(unique_id: UniqueId, item: VirtualItem) -> Self {
        let raw = Arc::new(SynthesizedItem {
            unique_id: unique_id.clone(),
            item: item.clone(),
        });
        Self {
            unique_id,
            kind: EnvelopeKind::Virtual(item),
            raw,
            delivery_status: OnceLock::new(),
            reactions: OnceLock::new(),
            debug_info: OnceLock::new(),
        }
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn kind(&self) -> &EnvelopeKind {
        &self.kind
    }

    pub fn as_event(&self) -> Option<&EventEnvelope> {
        match &self.kind {
            EnvelopeKind::Event(event) => Some(event),
            EnvelopeKind::Virtual(_) => None,
        }
    }

    pub fn as_virtual(&self) -> Option<&VirtualItem> {
        match &self.kind {
            EnvelopeKind::Event(_) => None,
            EnvelopeKind::Virtual(item) => Some(item),
        }
    }

    pub fn event_or_transaction_id(&self) -> Option<&EventOrTransactionId> {
        self.as_event().map(EventEnvelope::id)
    }

    pub fn is_membership_change(&self) -> bool {
        self.as_event()
            .is_some_and(|event| event.content.is_membership_change())
    }

    /// Membership and state changes, which the render pass may fold together.
    pub fn is_collapsible(&self) -> bool {
        self.as_event()
            .is_some_and(|event| event.content.is_state_like())
    }

    /// `None` for virtual items.
    pub fn delivery_status(&self) -> Option<&DeliveryStatus> {
        self.delivery_status
            .get_or_init(|| {
                let event = self.as_event()?;
                let status = match self.raw.send_state() {
                    Some(RawSendState::NotSentYet) => DeliveryStatus::Sending,
                    Some(RawSendState::Sent) => DeliveryStatus::Sent,
                    Some(RawSendState::SendingFailed(failure)) => {
                        DeliveryStatus::SendingFailed { failure }
                    }
                    None if event.id.is_local() => DeliveryStatus::Sending,
                    None => DeliveryStatus::Sent,
                };
                Some(status)
            })
            .as_ref()
    }

    pub fn reactions(&self) -> &ReactionsByKeyBySender {
        self.reactions
            .get_or_init(|| ReactionsByKeyBySender::collect(&self.raw.reactions()))
    }

    pub fn debug_info(&self) -> &str {
        self.debug_info.get_or_init(|| format!("{:#?}", self.raw))
    }
}

impl fmt::Debug for TimelineEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineEnvelope")
            .field("unique_id", &self.unique_id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Envelopes are equal when their identities are, regardless of content.
impl PartialEq for TimelineEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
            && self.event_or_transaction_id() == other.event_or_transaction_id()
    }
}

impl Eq for TimelineEnvelope {}

impl Serialize for TimelineEnvelope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TimelineEnvelope", 4)?;
        state.serialize_field("uniqueId", &self.unique_id)?;
        match &self.kind {
            EnvelopeKind::Event(event) => {
                state.serialize_field("event", event)?;
                state.serialize_field("deliveryStatus", &self.delivery_status())?;
                state.serialize_field("reactions", self.reactions())?;
            }
            EnvelopeKind::Virtual(item) => {
                state.serialize_field("virtual", item)?;
                state.skip_field("deliveryStatus")?;
                state.skip_field("reactions")?;
            }
        }
        state.end()
    }
}

fn serialize_millis<S>(timestamp: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let millis = timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    serializer.serialize_u64(millis)
}

#[derive(Debug)]
struct SynthesizedItem {
    unique_id: UniqueId,
    item: VirtualItem,
}

impl RawTimelineItem for SynthesizedItem {
    fn unique_id(&self) -> UniqueId {
        self.unique_id.clone()
    }

    fn event_or_transaction_id(&self) -> Option<EventOrTransactionId> {
        None
    }

    fn kind(&self) -> RawItemKind {
        RawItemKind::Virtual(self.item.clone())
    }
}
