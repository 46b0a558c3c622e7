use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{models::event_bridge::DEFAULT_BRIDGE_CAPACITY, timeline::pagination::TimelineKind};

/// Settings for one timeline controller.
///
/// Usually built in code with [`TimelineConfig::new`], but can also be loaded from the
/// adapter's JSON settings, where every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineConfig {
    /// The presentation context, which fixes pagination capabilities.
    pub kind: TimelineKind,
    /// Insert a spinner item at the edge being paginated.
    pub show_pagination_indicators: bool,
    /// Don't render a read marker when it's the newest item.
    pub hide_trailing_read_marker: bool,
    /// Fold each run of consecutive membership and state changes into one entry.
    pub collapse_state_events: bool,
    /// Stop grouping messages further apart than this many milliseconds.
    pub grouping_max_gap_ms: Option<u64>,
    /// Log every received diff batch at debug level.
    pub log_diffs: bool,
    /// Capacity of the timeline event broadcast channel.
    pub bridge_capacity: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            kind: TimelineKind::Live,
            show_pagination_indicators: true,
            hide_trailing_read_marker: true,
            collapse_state_events: true,
            grouping_max_gap_ms: None,
            log_diffs: false,
            bridge_capacity: DEFAULT_BRIDGE_CAPACITY,
        }
    }
}

impl TimelineConfig {
    pub fn new(kind: TimelineKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_pagination_indicators(mut self, show: bool) -> Self {
        self.show_pagination_indicators = show;
        self
    }

    pub fn with_trailing_read_marker_hidden(mut self, hide: bool) -> Self {
        self.hide_trailing_read_marker = hide;
        self
    }

    pub fn with_state_events_collapsed(mut self, collapse: bool) -> Self {
        self.collapse_state_events = collapse;
        self
    }

    pub fn with_grouping_max_gap(mut self, max_gap: Duration) -> Self {
        self.grouping_max_gap_ms = Some(u64::try_from(max_gap.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_diff_logging(mut self, log_diffs: bool) -> Self {
        self.log_diffs = log_diffs;
        self
    }

    pub(crate) fn grouping_max_gap(&self) -> Option<Duration> {
        self.grouping_max_gap_ms.map(Duration::from_millis)
    }
}
