//! Translation of `VectorDiff` batches into edit scripts over the item collection.
//!
//! Each operation of a batch is interpreted against the collection produced by the
//! operations before it, turned into primitive removals and insertions, and applied.
//! Any failure rejects the whole batch: callers keep their previous collection.

use std::{collections::HashSet, sync::Arc};

use eyeball_im::{Vector, VectorDiff};
use thiserror::Error;
use tracing::{debug, trace};

use super::envelope::{EnvelopeError, RawTimelineItem, TimelineEnvelope, item_id::UniqueId};

/// One structural operation as delivered by the event source.
pub type TimelineDiff = VectorDiff<Arc<dyn RawTimelineItem>>;

/// The reconciled collection, oldest entry first.
pub type TimelineItems = Vector<Arc<TimelineEnvelope>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("{operation} index {index} is out of bounds for a timeline of {len} items")]
    IndexOutOfBounds {
        operation: &'static str,
        index: usize,
        len: usize,
    },
    #[error("{operation} on an empty timeline")]
    EmptyTimeline { operation: &'static str },
    #[error("edit script diverged from the timeline: {0}")]
    Diverged(String),
    #[error("unique ID {0} appears twice in the timeline")]
    DuplicateUniqueId(UniqueId),
    #[error(transparent)]
    InvalidItem(#[from] EnvelopeError),
}

#[derive(Debug, Clone)]
pub enum Change {
    /// Removal at an offset into the collection *before* the edit.
    Remove { offset: usize },
    /// Insertion at an offset into the collection *after* the edit.
    Insert {
        offset: usize,
        element: Arc<TimelineEnvelope>,
    },
}

/// The primitive changes one operation makes to the collection.
#[derive(Debug, Clone, Default)]
pub struct EditScript {
    changes: Vec<Change>,
    membership_changes: Vec<UniqueId>,
}

impl EditScript {
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Membership-change items this operation introduces.
    pub fn membership_changes(&self) -> &[UniqueId] {
        &self.membership_changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn remove(&mut self, offset: usize) {
        self.changes.push(Change::Remove { offset });
    }

    fn insert(&mut self, offset: usize, element: Arc<TimelineEnvelope>, notify_membership: bool) {
        if notify_membership && element.is_membership_change() {
            self.membership_changes.push(element.unique_id().clone());
        }
        self.changes.push(Change::Insert { offset, element });
    }

    /// Applies this script to `items`, returning the edited collection.
    ///
    /// Removals are applied from the highest offset down, then insertions from the
    /// lowest offset up. Fails without touching `items` if an offset can't exist.
    pub fn apply(&self, items: &TimelineItems) -> Result<TimelineItems, DiffError> {
        let mut removals: Vec<usize> = self
            .changes
            .iter()
            .filter_map(|change| match change {
                Change::Remove { offset } => Some(*offset),
                Change::Insert { .. } => None,
            })
            .collect();
        removals.sort_unstable();
        if removals.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(DiffError::Diverged("the same offset is removed twice".to_owned()));
        }

        let mut insertions: Vec<(usize, &Arc<TimelineEnvelope>)> = self
            .changes
            .iter()
            .filter_map(|change| match change {
                Change::Insert { offset, element } => Some((*offset, element)),
                Change::Remove { .. } => None,
            })
            .collect();
        insertions.sort_by_key(|(offset, _)| *offset);
        if insertions.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Err(DiffError::Diverged("the same offset is inserted twice".to_owned()));
        }

        let mut edited = items.clone();
        for offset in removals.into_iter().rev() {
            if offset >= edited.len() {
                return Err(DiffError::Diverged(format!(
                    "removal at {offset} in a timeline of {} items",
                    edited.len()
                )));
            }
            edited.remove(offset);
        }
        for (offset, element) in insertions {
            if offset > edited.len() {
                return Err(DiffError::Diverged(format!(
                    "insertion at {offset} in a timeline of {} items",
                    edited.len()
                )));
            }
            edited.insert(offset, element.clone());
        }
        Ok(edited)
    }
}

/// Builds the edit script for a single operation against the current `items`.
pub fn build_edit_script(
    diff: TimelineDiff,
    items: &TimelineItems,
) -> Result<EditScript, DiffError> {
    let len = items.len();
    let mut script = EditScript::default();

    match diff {
        VectorDiff::Append { values } => {
            for (index, raw) in values.into_iter().enumerate() {
                script.insert(len + index, wrap(raw)?, true);
            }
        }
        VectorDiff::Clear => {
            for offset in 0..len {
                script.remove(offset);
            }
        }
        VectorDiff::PushFront { value } => {
            script.insert(0, wrap(value)?, false);
        }
        VectorDiff::PushBack { value } => {
            script.insert(len, wrap(value)?, true);
        }
        VectorDiff::PopFront => {
            if len == 0 {
                return Err(DiffError::EmptyTimeline {
                    operation: "PopFront",
                });
            }
            script.remove(0);
        }
        VectorDiff::PopBack => {
            if len == 0 {
                return Err(DiffError::EmptyTimeline {
                    operation: "PopBack",
                });
            }
            script.remove(len - 1);
        }
        VectorDiff::Insert { index, value } => {
            if index > len {
                return Err(DiffError::IndexOutOfBounds {
                    operation: "Insert",
                    index,
                    len,
                });
            }
            script.insert(index, wrap(value)?, true);
        }
        VectorDiff::Set { index, value } => {
            if index >= len {
                return Err(DiffError::IndexOutOfBounds {
                    operation: "Set",
                    index,
                    len,
                });
            }
            script.remove(index);
            script.insert(index, wrap(value)?, true);
        }
        VectorDiff::Remove { index } => {
            if index >= len {
                return Err(DiffError::IndexOutOfBounds {
                    operation: "Remove",
                    index,
                    len,
                });
            }
            script.remove(index);
        }
        VectorDiff::Truncate { length } => {
            // Advisory only: the source prunes its own retained history.
            debug!("Ignoring advisory truncate to {length} items ({len} held)");
        }
        VectorDiff::Reset { values } => {
            for offset in 0..len {
                script.remove(offset);
            }
            for (index, raw) in values.into_iter().enumerate() {
                script.insert(index, wrap(raw)?, false);
            }
        }
    }

    Ok(script)
}

/// The result of applying one whole batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub items: TimelineItems,
    /// Membership-change items introduced by the batch, in operation order.
    pub membership_changes: Vec<UniqueId>,
    /// Whether the batch contained a `Reset`.
    pub did_reset: bool,
}

/// Applies a batch strictly in order, each operation seeing the result of the previous one.
pub fn apply_batch(
    current: &TimelineItems,
    batch: Vec<TimelineDiff>,
) -> Result<BatchOutcome, DiffError> {
    let mut items = current.clone();
    let mut membership_changes = Vec::new();
    let mut did_reset = false;

    for diff in batch {
        did_reset |= matches!(diff, VectorDiff::Reset { .. });
        let script = build_edit_script(diff, &items)?;
        items = script.apply(&items)?;
        membership_changes.extend(script.membership_changes);
    }

    ensure_unique(&items)?;
    trace!("Batch produced {} items", items.len());

    Ok(BatchOutcome {
        items,
        membership_changes,
        did_reset,
    })
}

fn wrap(raw: Arc<dyn RawTimelineItem>) -> Result<Arc<TimelineEnvelope>, DiffError> {
    Ok(Arc::new(TimelineEnvelope::new(raw)?))
}

fn ensure_unique(items: &TimelineItems) -> Result<(), DiffError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.unique_id()) {
            return Err(DiffError::DuplicateUniqueId(item.unique_id().clone()));
        }
    }
    Ok(())
}

/// A compact description of a batch for logs, e.g. `[Append(3),Set(4)]`.
pub fn describe_batch(batch: &[TimelineDiff]) -> String {
    let parts: Vec<String> = batch
        .iter()
        .map(|diff| match diff {
            VectorDiff::Append { values } => format!("Append({})", values.len()),
            VectorDiff::Clear => "Clear".to_owned(),
            VectorDiff::PushFront { .. } => "PushFront".to_owned(),
            VectorDiff::PushBack { .. } => "PushBack".to_owned(),
            VectorDiff::PopFront => "PopFront".to_owned(),
            VectorDiff::PopBack => "PopBack".to_owned(),
            VectorDiff::Insert { index, .. } => format!("Insert({index})"),
            VectorDiff::Set { index, .. } => format!("Set({index})"),
            VectorDiff::Remove { index } => format!("Remove({index})"),
            VectorDiff::Truncate { length } => format!("Truncate({length})"),
            VectorDiff::Reset { values } => format!("Reset({})", values.len()),
        })
        .collect();
    format!("[{}]", parts.join(","))
}
