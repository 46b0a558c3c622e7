//! What the controller publishes to readers.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use eyeball_im::Vector;
use serde::{Serialize, Serializer, ser::SerializeStruct};

use super::{
    envelope::{TimelineEnvelope, item_id::UniqueId},
    grouping::GroupPosition,
    pagination::{PaginationDirection, PaginationState},
};

/// One rendered entry: an envelope and where it sits in its group.
#[derive(Debug, Clone)]
pub struct TimelineItem {
    envelope: Arc<TimelineEnvelope>,
    group: GroupPosition,
}

impl TimelineItem {
    pub(crate) fn new(envelope: Arc<TimelineEnvelope>, group: GroupPosition) -> Self {
        Self { envelope, group }
    }

    pub fn envelope(&self) -> &Arc<TimelineEnvelope> {
        &self.envelope
    }

    pub fn unique_id(&self) -> &UniqueId {
        self.envelope.unique_id()
    }

    pub fn group(&self) -> GroupPosition {
        self.group
    }
}

impl Serialize for TimelineItem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TimelineItem", 2)?;
        state.serialize_field("item", self.envelope.as_ref())?;
        state.serialize_field("group", &self.group)?;
        state.end()
    }
}

/// Items and pagination state captured at the same point in time.
#[derive(Debug, Clone, Default)]
pub struct TimelineSnapshot {
    pub items: Vector<TimelineItem>,
    pub pagination: PaginationState,
}

impl TimelineSnapshot {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, unique_id: &UniqueId) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.unique_id() == unique_id)
    }

    pub fn unique_ids(&self) -> Vec<UniqueId> {
        self.items
            .iter()
            .map(|item| item.unique_id().clone())
            .collect()
    }
}

impl Serialize for TimelineSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct Items<'a>(&'a Vector<TimelineItem>);

        impl Serialize for Items<'_> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.collect_seq(self.0.iter())
            }
        }

        let mut state = serializer.serialize_struct("TimelineSnapshot", 2)?;
        state.serialize_field("items", &Items(&self.items))?;
        state.serialize_field("pagination", &self.pagination)?;
        state.end()
    }
}

/// Fine-grained notifications for the render layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineUpdate {
    ItemInserted { index: usize, unique_id: UniqueId },
    ItemRemoved { unique_id: UniqueId },
    /// Same identity, new content or group position.
    ItemChanged { index: usize, unique_id: UniqueId },
    /// The whole sequence was republished; sent after the per-item updates.
    ItemsUpdated { len: usize },
    PaginationChanged(PaginationState),
    PaginationError {
        direction: PaginationDirection,
        error: String,
    },
}

/// Per-item updates between two renders, matched by unique ID.
pub(crate) fn item_updates(
    previous: &Vector<TimelineItem>,
    next: &Vector<TimelineItem>,
) -> Vec<TimelineUpdate> {
    let before: HashMap<&UniqueId, &TimelineItem> = previous
        .iter()
        .map(|item| (item.unique_id(), item))
        .collect();
    let after: HashSet<&UniqueId> = next.iter().map(TimelineItem::unique_id).collect();

    let mut updates: Vec<TimelineUpdate> = previous
        .iter()
        .filter(|item| !after.contains(item.unique_id()))
        .map(|item| TimelineUpdate::ItemRemoved {
            unique_id: item.unique_id().clone(),
        })
        .collect();

    for (index, item) in next.iter().enumerate() {
        let unique_id = item.unique_id().clone();
        match before.get(item.unique_id()) {
            None => updates.push(TimelineUpdate::ItemInserted { index, unique_id }),
            Some(old)
                if !Arc::ptr_eq(&old.envelope, &item.envelope) || old.group != item.group =>
            {
                updates.push(TimelineUpdate::ItemChanged { index, unique_id })
            }
            Some(_) => {}
        }
    }

    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::test_utils::message;

    const ALICE: &str = "@alice:example.org";

    fn rendered(items: &[(&Arc<TimelineEnvelope>, GroupPosition)]) -> Vector<TimelineItem> {
        items
            .iter()
            .map(|(envelope, group)| TimelineItem::new(Arc::clone(envelope), *group))
            .collect()
    }

    #[test]
    fn unchanged_items_produce_no_updates() {
        let a = message("a", ALICE);
        let items = rendered(&[(&a, GroupPosition::Single)]);
        assert!(item_updates(&items, &items.clone()).is_empty());
    }

    #[test]
    fn replacement_with_same_identity_is_a_change() {
        let a = message("a", ALICE);
        let b = message("b", ALICE);
        let b_edited = message("b", ALICE);

        let updates = item_updates(
            &rendered(&[(&a, GroupPosition::Single), (&b, GroupPosition::Single)]),
            &rendered(&[
                (&a, GroupPosition::Single),
                (&b_edited, GroupPosition::Single),
            ]),
        );
        assert_eq!(
            updates,
            vec![TimelineUpdate::ItemChanged {
                index: 1,
                unique_id: UniqueId::from("b")
            }]
        );
    }

    #[test]
    fn inserts_removes_and_regroups() {
        let a = message("a", ALICE);
        let b = message("b", ALICE);
        let c = message("c", ALICE);

        let updates = item_updates(
            &rendered(&[(&a, GroupPosition::Single), (&b, GroupPosition::Single)]),
            &rendered(&[(&a, GroupPosition::Beginning), (&c, GroupPosition::End)]),
        );
        assert_eq!(
            updates,
            vec![
                TimelineUpdate::ItemRemoved {
                    unique_id: UniqueId::from("b")
                },
                TimelineUpdate::ItemChanged {
                    index: 0,
                    unique_id: UniqueId::from("a")
                },
                TimelineUpdate::ItemInserted {
                    index: 1,
                    unique_id: UniqueId::from("c")
                },
            ]
        );
    }

    #[test]
    fn serializes_items_with_their_group() {
        let snapshot = TimelineSnapshot {
            items: rendered(&[(&message("a", ALICE), GroupPosition::Beginning)]),
            pagination: PaginationState::default(),
        };
        let json = serde_json::to_value(&snapshot).expect("serializable");
        assert_eq!(json["items"][0]["item"]["uniqueId"], "a");
        assert_eq!(json["items"][0]["group"], "beginning");
        assert_eq!(json["pagination"]["backward"], "idle");
    }
}
