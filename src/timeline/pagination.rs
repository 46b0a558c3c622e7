//! Per-direction pagination status and the rules for moving between states.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The most events a single pagination request may ask for.
pub const MAX_PAGINATION_REQUEST_SIZE: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaginationDirection {
    Backwards,
    Forwards,
}

impl fmt::Display for PaginationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backwards => write!(f, "backwards"),
            Self::Forwards => write!(f, "forwards"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PaginationStatus {
    #[default]
    Idle,
    Paginating,
    EndReached,
}

/// The `(backward, forward)` status pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub backward: PaginationStatus,
    pub forward: PaginationStatus,
}

impl PaginationState {
    pub fn get(&self, direction: PaginationDirection) -> PaginationStatus {
        match direction {
            PaginationDirection::Backwards => self.backward,
            PaginationDirection::Forwards => self.forward,
        }
    }
}

/// Back-pagination status pushed by the source for live timelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveBackPaginationStatus {
    Idle { hit_timeline_start: bool },
    Paginating,
}

/// The presentation a media (attachment gallery) timeline was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaPresentation {
    /// Opened from the live room screen.
    RoomScreenLive,
    /// Opened from a room screen focused on an event.
    RoomScreenDetached,
    PinnedEventsScreen,
    /// The room's media browser.
    MediaFilesScreen,
}

/// The presentation context of a timeline, which fixes its pagination capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "type",
    content = "data"
)]
pub enum TimelineKind {
    #[default]
    Live,
    Detached { focused_event_id: String },
    Thread { root_event_id: String },
    Pinned,
    Media(MediaPresentation),
}

impl fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Detached { focused_event_id } => write!(f, "detached({focused_event_id})"),
            Self::Thread { root_event_id } => write!(f, "thread({root_event_id})"),
            Self::Pinned => write!(f, "pinned"),
            Self::Media(presentation) => write!(f, "media({presentation:?})"),
        }
    }
}

bitflags! {
    /// What a timeline kind can do in terms of pagination.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct PaginationCapabilities: u8 {
        /// More history can be requested.
        const CanPaginateBackwards = 1 << 0;
        /// Newer events can be requested.
        const CanPaginateForwards = 1 << 1;
        /// The source pushes the back-pagination status.
        const HasLiveBackPaginationStatus = 1 << 2;
    }
}

impl TimelineKind {
    pub fn capabilities(&self) -> PaginationCapabilities {
        type Caps = PaginationCapabilities;
        match self {
            Self::Live | Self::Media(MediaPresentation::RoomScreenLive) => {
                Caps::CanPaginateBackwards | Caps::HasLiveBackPaginationStatus
            }
            Self::Detached { .. }
            | Self::Thread { .. }
            | Self::Media(MediaPresentation::RoomScreenDetached) => {
                Caps::CanPaginateBackwards | Caps::CanPaginateForwards
            }
            Self::Media(MediaPresentation::MediaFilesScreen) => Caps::CanPaginateBackwards,
            Self::Pinned | Self::Media(MediaPresentation::PinnedEventsScreen) => Caps::empty(),
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(
            self,
            Self::Pinned | Self::Media(MediaPresentation::PinnedEventsScreen)
        )
    }
}

/// How a direction's status is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionMode {
    /// Status comes from the source's push stream; requests are still accepted.
    PushDriven,
    /// Status only changes in response to our own requests.
    RequestDriven,
    /// Permanently `EndReached`.
    Fixed,
}

/// The result of asking to start a request in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The direction moved to `Paginating`; the caller must issue the fetch.
    Started,
    /// A request is already running.
    InFlight,
    /// Nothing left to load.
    EndReached,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("failed paginating {direction}: {reason}")]
    Transport {
        direction: PaginationDirection,
        reason: String,
    },
    #[error("the timeline was dropped while paginating")]
    Aborted,
}

#[derive(Debug, Clone, Copy)]
struct DirectionState {
    mode: DirectionMode,
    status: PaginationStatus,
}

impl DirectionState {
    fn new(mode: DirectionMode) -> Self {
        let status = match mode {
            DirectionMode::Fixed => PaginationStatus::EndReached,
            DirectionMode::PushDriven | DirectionMode::RequestDriven => PaginationStatus::Idle,
        };
        Self { mode, status }
    }

    fn set(&mut self, status: PaginationStatus) -> bool {
        if self.mode == DirectionMode::Fixed || self.status == status {
            return false;
        }
        self.status = status;
        true
    }
}

/// Status of both directions for one timeline. Modes are fixed at construction.
#[derive(Debug, Clone)]
pub struct PaginationMachine {
    backward: DirectionState,
    forward: DirectionState,
}

impl PaginationMachine {
    pub fn new(kind: &TimelineKind) -> Self {
        let caps = kind.capabilities();
        let backward = if !caps.contains(PaginationCapabilities::CanPaginateBackwards) {
            DirectionMode::Fixed
        } else if caps.contains(PaginationCapabilities::HasLiveBackPaginationStatus) {
            DirectionMode::PushDriven
        } else {
            DirectionMode::RequestDriven
        };
        let forward = if caps.contains(PaginationCapabilities::CanPaginateForwards) {
            DirectionMode::RequestDriven
        } else {
            DirectionMode::Fixed
        };

        Self {
            backward: DirectionState::new(backward),
            forward: DirectionState::new(forward),
        }
    }

    pub fn state(&self) -> PaginationState {
        PaginationState {
            backward: self.backward.status,
            forward: self.forward.status,
        }
    }

    pub fn mode(&self, direction: PaginationDirection) -> DirectionMode {
        self.direction(direction).mode
    }

    fn direction(&self, direction: PaginationDirection) -> &DirectionState {
        match direction {
            PaginationDirection::Backwards => &self.backward,
            PaginationDirection::Forwards => &self.forward,
        }
    }

    fn direction_mut(&mut self, direction: PaginationDirection) -> &mut DirectionState {
        match direction {
            PaginationDirection::Backwards => &mut self.backward,
            PaginationDirection::Forwards => &mut self.forward,
        }
    }

    /// Moves `direction` to `Paginating` if it's idle.
    pub fn begin(&mut self, direction: PaginationDirection) -> BeginOutcome {
        let state = self.direction_mut(direction);
        match state.status {
            PaginationStatus::Idle => {
                state.status = PaginationStatus::Paginating;
                BeginOutcome::Started
            }
            PaginationStatus::Paginating => BeginOutcome::InFlight,
            PaginationStatus::EndReached => BeginOutcome::EndReached,
        }
    }

    /// Records the result of a fetch, where `Ok(true)` means the end was hit.
    ///
    /// Failures return to `Idle` so the request can be retried.
    /// Returns whether the status changed.
    pub fn finish(
        &mut self,
        direction: PaginationDirection,
        result: &Result<bool, PaginationError>,
    ) -> bool {
        let status = match result {
            Ok(true) => PaginationStatus::EndReached,
            Ok(false) | Err(_) => PaginationStatus::Idle,
        };
        self.direction_mut(direction).set(status)
    }

    /// Applies a status pushed by the source. Ignored unless backwards is push-driven.
    pub fn apply_live_status(&mut self, status: LiveBackPaginationStatus) -> bool {
        if self.backward.mode != DirectionMode::PushDriven {
            return false;
        }
        let status = match status {
            LiveBackPaginationStatus::Idle {
                hit_timeline_start: true,
            } => PaginationStatus::EndReached,
            LiveBackPaginationStatus::Idle {
                hit_timeline_start: false,
            } => PaginationStatus::Idle,
            LiveBackPaginationStatus::Paginating => PaginationStatus::Paginating,
        };
        self.backward.set(status)
    }

    /// A timeline reset makes exhausted directions loadable again. Fixed directions
    /// never move.
    pub fn reset(&mut self) -> bool {
        let mut changed = false;
        for state in [&mut self.backward, &mut self.forward] {
            if state.status == PaginationStatus::EndReached {
                changed |= state.set(PaginationStatus::Idle);
            }
        }
        changed
    }
}

/// Clamps a requested page size to `1..=MAX_PAGINATION_REQUEST_SIZE`.
pub fn bounded_request_size(requested: u16) -> u16 {
    requested.clamp(1, MAX_PAGINATION_REQUEST_SIZE)
}
