//! The reconciliation engine: envelopes, diff interpretation, grouping, pagination
//! and the controller tying them together.

mod collapse;
pub mod controller;
pub mod diff;
pub mod envelope;
mod gate;
pub mod grouping;
pub mod pagination;
pub mod snapshot;
pub mod source;

#[cfg(test)]
pub(crate) mod test_utils;

pub use controller::{TimelineController, TimelineControllerBuilder};
pub use diff::{DiffError, TimelineDiff, TimelineItems};
pub use envelope::{
    EnvelopeError, EventEnvelope, RawItemKind, RawTimelineItem, TimelineEnvelope,
    item_id::{EventOrTransactionId, UniqueId},
    virtual_item::VirtualItem,
};
pub use grouping::{DefaultGroupingPolicy, GroupPosition, GroupingPolicy, NeverGroup};
pub use pagination::{
    LiveBackPaginationStatus, MediaPresentation, PaginationDirection, PaginationError,
    PaginationState, PaginationStatus, TimelineKind,
};
pub use snapshot::{TimelineItem, TimelineSnapshot, TimelineUpdate};
pub use source::{DiffBatchStream, TimelineEventSource};
