//! The seam between the engine and whatever produces timeline diffs.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::{diff::TimelineDiff, pagination::LiveBackPaginationStatus};

/// Ordered diff batches, oldest first.
pub type DiffBatchStream = BoxStream<'static, Vec<TimelineDiff>>;

/// Produces timeline diffs and serves pagination requests, typically by wrapping a
/// `matrix_sdk_ui::Timeline`.
#[async_trait]
pub trait TimelineEventSource: Send + Sync + 'static {
    /// Starts listening to diffs. The first batch should describe the current items,
    /// usually as a single `Reset`, and may be empty.
    async fn subscribe_to_diffs(&self) -> DiffBatchStream;

    /// Push-driven back-pagination status, for sources that report one.
    fn back_pagination_status(&self) -> Option<BoxStream<'static, LiveBackPaginationStatus>> {
        None
    }

    /// Loads up to `num_events` older events. Returns whether the start of the timeline was hit.
    async fn paginate_backwards(&self, num_events: u16) -> anyhow::Result<bool>;

    /// Loads up to `num_events` newer events. Returns whether the end of the timeline was hit.
    async fn paginate_forwards(&self, num_events: u16) -> anyhow::Result<bool>;
}
