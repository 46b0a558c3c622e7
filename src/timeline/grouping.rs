//! Visual grouping of consecutive same-sender items.

use std::{sync::Arc, time::Duration};

use serde::Serialize;

use super::envelope::TimelineEnvelope;

/// Where an item sits within a run of grouped items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupPosition {
    #[default]
    Single,
    Beginning,
    Middle,
    End,
}

/// Decides whether two adjacent items may be rendered as one block.
///
/// Only consulted for two event items from the same sender; every other pair
/// never groups.
pub trait GroupingPolicy: Send + Sync {
    fn can_group(&self, earlier: &TimelineEnvelope, later: &TimelineEnvelope) -> bool;
}

/// Groups messages unless one of them renders as a notice, the earlier one carries
/// reactions, or they are further apart than `max_gap`.
#[derive(Debug, Clone, Default)]
pub struct DefaultGroupingPolicy {
    pub max_gap: Option<Duration>,
}

impl DefaultGroupingPolicy {
    pub fn new(max_gap: Option<Duration>) -> Self {
        Self { max_gap }
    }
}

impl GroupingPolicy for DefaultGroupingPolicy {
    fn can_group(&self, earlier: &TimelineEnvelope, later: &TimelineEnvelope) -> bool {
        let (Some(first), Some(second)) = (earlier.as_event(), later.as_event()) else {
            return false;
        };
        if first.content().is_state_like() || second.content().is_state_like() {
            return false;
        }
        // Reactions are drawn under the bubble, which closes the group.
        if !earlier.reactions().is_empty() {
            return false;
        }
        match self.max_gap {
            Some(max_gap) => {
                let gap = second
                    .timestamp()
                    .duration_since(first.timestamp())
                    .unwrap_or_else(|err| err.duration());
                gap <= max_gap
            }
            None => true,
        }
    }
}

/// Every item renders standalone. Used by pinned-events views.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverGroup;

impl GroupingPolicy for NeverGroup {
    fn can_group(&self, _earlier: &TimelineEnvelope, _later: &TimelineEnvelope) -> bool {
        false
    }
}

/// Whether `earlier` and `later` may group: both must be events from the same sender,
/// and the policy must agree.
pub fn can_group(
    policy: &dyn GroupingPolicy,
    earlier: &TimelineEnvelope,
    later: &TimelineEnvelope,
) -> bool {
    match (earlier.as_event(), later.as_event()) {
        (Some(first), Some(second)) if first.sender().user_id == second.sender().user_id => {
            policy.can_group(earlier, later)
        }
        _ => false,
    }
}

/// Position of an item given whether it groups with its previous and next neighbors.
///
/// `None` means that neighbor doesn't exist.
pub fn classify(prev_groups: Option<bool>, next_groups: Option<bool>) -> GroupPosition {
    match (prev_groups, next_groups) {
        (Some(true), Some(true)) => GroupPosition::Middle,
        (Some(true), _) => GroupPosition::End,
        (_, Some(true)) => GroupPosition::Beginning,
        _ => GroupPosition::Single,
    }
}

/// Classifies every item of a fully materialized sequence.
pub fn classify_all(
    items: &[Arc<TimelineEnvelope>],
    policy: &dyn GroupingPolicy,
) -> Vec<GroupPosition> {
    let links: Vec<bool> = items
        .windows(2)
        .map(|pair| can_group(policy, &pair[0], &pair[1]))
        .collect();

    (0..items.len())
        .map(|index| {
            let prev = index.checked_sub(1).map(|link| links[link]);
            let next = links.get(index).copied();
            classify(prev, next)
        })
        .collect()
}
