//! Reconciles a Matrix room timeline's diff stream into an ordered, grouped and
//! paginatable sequence of view-model items.
//!
//! An adapter implements [`TimelineEventSource`] on top of its timeline (typically a
//! `matrix_sdk_ui::Timeline`), hands it to a [`TimelineController`], and renders the
//! published [`TimelineSnapshot`]s.

use serde::{Serialize, ser::Serializer};

pub mod models;
pub mod timeline;

pub use models::{
    config::TimelineConfig, event_bridge::EventBridge, events::TimelineEvent,
    state_updater::TimelineStateUpdater,
};
pub use timeline::*;

pub type Result<T> = std::result::Result<T, Error>;

/// matrix-timeline-reconciler Error enum
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
