use serde::Serialize;

use crate::timeline::envelope::item_id::UniqueId;

// Emit events

/// Timeline-wide events broadcast to the adapter through the `EventBridge`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "type"
)]
pub enum TimelineEvent {
    /// A membership change arrived through sync, so the room's member list may be stale.
    MembershipChanged { unique_id: UniqueId },
}
