use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::TimelineEnvelope;

/// A timeline entry synthesized locally rather than received as an event.
///
/// Virtual items never carry an event or transaction ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "kind"
)]
pub enum VirtualItem {
    /// A divider between messages of two days or months depending on the
    /// timeline configuration.
    DateDivider {
        /// Milliseconds since the Unix epoch, on the day being introduced.
        timestamp: u64,
    },

    /// The user's own read marker.
    ReadMarker,

    /// The timeline start, that is, an indication that we've seen all the
    /// events for that timeline.
    TimelineStart,

    /// A spinner shown while a pagination request runs in the given direction.
    /// Only ever inserted by the render pass, never by the event source.
    PaginationIndicator { position: IndicatorPosition },

    /// A run of consecutive membership and state changes folded into one entry,
    /// oldest first. Built by the render pass.
    Collapsed {
        #[serde(serialize_with = "serialize_members")]
        items: Vec<Arc<TimelineEnvelope>>,
    },
}

fn serialize_members<S>(
    items: &[Arc<TimelineEnvelope>],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(items.iter().map(|item| &**item))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IndicatorPosition {
    Start,
    End,
}
