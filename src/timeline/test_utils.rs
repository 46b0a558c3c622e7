//! Fixture raw items for unit tests.

use std::sync::Arc;

use eyeball_im::Vector;

use super::envelope::{
    RawItemKind, RawTimelineItem, TimelineEnvelope,
    content::{
        ContentVariant, MembershipChangeKind, MessageContent, RawSendState, Reaction, Sender,
    },
    item_id::{EventOrTransactionId, UniqueId},
    virtual_item::VirtualItem,
};

#[derive(Debug, Clone)]
pub(crate) struct TestItem {
    unique_id: UniqueId,
    id: Option<EventOrTransactionId>,
    kind: RawItemKind,
    send_state: Option<RawSendState>,
    reactions: Vec<Reaction>,
}

impl TestItem {
    pub(crate) fn message(unique_id: &str, sender: &str, body: &str) -> Self {
        Self {
            unique_id: UniqueId::from(unique_id),
            id: Some(EventOrTransactionId::EventId(format!("${unique_id}"))),
            kind: RawItemKind::Event {
                timestamp_ms: 1_731_000_000_000,
                sender: Sender::new(sender),
                content: ContentVariant::Message(MessageContent::text(body)),
            },
            send_state: None,
            reactions: Vec::new(),
        }
    }

    pub(crate) fn local_message(unique_id: &str, sender: &str, transaction_id: &str) -> Self {
        Self::message(unique_id, sender, "local echo").with_identity(
            EventOrTransactionId::TransactionId(transaction_id.to_owned()),
        )
    }

    pub(crate) fn membership(unique_id: &str, user_id: &str) -> Self {
        let mut item = Self::message(unique_id, user_id, "");
        item.kind = RawItemKind::Event {
            timestamp_ms: 1_731_000_000_000,
            sender: Sender::new(user_id),
            content: ContentVariant::MembershipChange {
                user_id: user_id.to_owned(),
                change: MembershipChangeKind::Joined,
            },
        };
        item
    }

    pub(crate) fn date_divider(unique_id: &str, timestamp: u64) -> Self {
        Self::virtual_item(unique_id, VirtualItem::DateDivider { timestamp })
    }

    pub(crate) fn virtual_item(unique_id: &str, item: VirtualItem) -> Self {
        Self {
            unique_id: UniqueId::from(unique_id),
            id: None,
            kind: RawItemKind::Virtual(item),
            send_state: None,
            reactions: Vec::new(),
        }
    }

    pub(crate) fn with_identity(mut self, id: EventOrTransactionId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn without_identity(mut self) -> Self {
        self.id = None;
        self
    }

    pub(crate) fn with_send_state(mut self, send_state: RawSendState) -> Self {
        self.send_state = Some(send_state);
        self
    }

    pub(crate) fn with_reaction(mut self, key: &str, sender: &str) -> Self {
        self.reactions.push(Reaction {
            key: key.to_owned(),
            sender: sender.to_owned(),
            timestamp_ms: 0,
        });
        self
    }

    pub(crate) fn at(mut self, timestamp: u64) -> Self {
        if let RawItemKind::Event { timestamp_ms, .. } = &mut self.kind {
            *timestamp_ms = timestamp;
        }
        self
    }

    pub(crate) fn into_raw(self) -> Arc<dyn RawTimelineItem> {
        Arc::new(self)
    }

    pub(crate) fn into_envelope(self) -> Arc<TimelineEnvelope> {
        Arc::new(TimelineEnvelope::new(self.into_raw()).expect("valid test item"))
    }
}

impl RawTimelineItem for TestItem {
    fn unique_id(&self) -> UniqueId {
        self.unique_id.clone()
    }

    fn event_or_transaction_id(&self) -> Option<EventOrTransactionId> {
        self.id.clone()
    }

    fn kind(&self) -> RawItemKind {
        self.kind.clone()
    }

    fn send_state(&self) -> Option<RawSendState> {
        self.send_state.clone()
    }

    fn reactions(&self) -> Vec<Reaction> {
        self.reactions.clone()
    }
}

pub(crate) fn message(unique_id: &str, sender: &str) -> Arc<TimelineEnvelope> {
    TestItem::message(unique_id, sender, unique_id).into_envelope()
}

pub(crate) fn local_message(
    unique_id: &str,
    sender: &str,
    transaction_id: &str,
) -> Arc<TimelineEnvelope> {
    TestItem::local_message(unique_id, sender, transaction_id).into_envelope()
}

pub(crate) fn date_divider(unique_id: &str) -> Arc<TimelineEnvelope> {
    TestItem::date_divider(unique_id, 0).into_envelope()
}

pub(crate) fn raw_message(unique_id: &str, sender: &str) -> Arc<dyn RawTimelineItem> {
    TestItem::message(unique_id, sender, unique_id).into_raw()
}

pub(crate) fn unique_ids(items: &Vector<Arc<TimelineEnvelope>>) -> Vec<String> {
    items.iter().map(|item| item.unique_id().to_string()).collect()
}
