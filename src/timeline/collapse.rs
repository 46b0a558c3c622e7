//! Folding of consecutive membership and state changes into one rendered entry.

use std::{collections::HashMap, mem, sync::Arc};

use super::envelope::{TimelineEnvelope, item_id::UniqueId, virtual_item::VirtualItem};

/// Builds [`VirtualItem::Collapsed`] entries, reusing the previous pass's entry for a run
/// whose members didn't change so it keeps the same identity.
#[derive(Debug, Default)]
pub(crate) struct StateEventCollapser {
    runs: HashMap<UniqueId, Arc<TimelineEnvelope>>,
}

impl StateEventCollapser {
    /// Replaces every run of two or more collapsible items with one entry. A lone
    /// collapsible item is kept as is.
    pub(crate) fn collapse(
        &mut self,
        items: impl IntoIterator<Item = Arc<TimelineEnvelope>>,
    ) -> Vec<Arc<TimelineEnvelope>> {
        let mut previous = mem::take(&mut self.runs);
        let mut entries = Vec::new();
        let mut run = Vec::new();

        for item in items {
            if item.is_collapsible() {
                run.push(item);
            } else {
                self.flush(&mut run, &mut previous, &mut entries);
                entries.push(item);
            }
        }
        self.flush(&mut run, &mut previous, &mut entries);

        entries
    }

    fn flush(
        &mut self,
        run: &mut Vec<Arc<TimelineEnvelope>>,
        previous: &mut HashMap<UniqueId, Arc<TimelineEnvelope>>,
        entries: &mut Vec<Arc<TimelineEnvelope>>,
    ) {
        let members = mem::take(run);
        let Some(first) = members.first() else {
            return;
        };
        if members.len() == 1 {
            entries.extend(members);
            return;
        }

        let unique_id = UniqueId::from(format!("collapsed-{}", first.unique_id()));
        let entry = match previous.remove(&unique_id) {
            Some(entry) if has_members(&entry, &members) => entry,
            _ => Arc::new(TimelineEnvelope::synthesized(
                unique_id.clone(),
                VirtualItem::Collapsed { items: members },
            )),
        };
        self.runs.insert(unique_id, entry.clone());
        entries.push(entry);
    }
}

fn has_members(entry: &TimelineEnvelope, members: &[Arc<TimelineEnvelope>]) -> bool {
    match entry.as_virtual() {
        Some(VirtualItem::Collapsed { items }) => {
            items.len() == members.len()
                && items.iter().zip(members).all(|(a, b)| Arc::ptr_eq(a, b))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::test_utils::{TestItem, message};

    const ALICE: &str = "@alice:example.org";

    fn membership(unique_id: &str) -> Arc<TimelineEnvelope> {
        TestItem::membership(unique_id, ALICE).into_envelope()
    }

    fn ids(entries: &[Arc<TimelineEnvelope>]) -> Vec<String> {
        entries.iter().map(|entry| entry.unique_id().to_string()).collect()
    }

    #[test]
    fn runs_of_state_changes_fold_into_one_entry() {
        let (m1, m2) = (membership("m1"), membership("m2"));
        let items = vec![message("a", ALICE), m1.clone(), m2.clone(), message("b", ALICE)];

        let entries = StateEventCollapser::default().collapse(items);

        assert_eq!(ids(&entries), ["a", "collapsed-m1", "b"]);
        assert_eq!(
            entries[1].as_virtual(),
            Some(&VirtualItem::Collapsed {
                items: vec![m1, m2]
            })
        );
        assert!(entries[1].as_event().is_none());
    }

    #[test]
    fn a_lone_state_change_is_kept() {
        let items = vec![message("a", ALICE), membership("m1"), message("b", ALICE)];
        let entries = StateEventCollapser::default().collapse(items);
        assert_eq!(ids(&entries), ["a", "m1", "b"]);
    }

    #[test]
    fn unchanged_runs_keep_their_entry() {
        let mut collapser = StateEventCollapser::default();
        let (m1, m2) = (membership("m1"), membership("m2"));

        let first = collapser.collapse(vec![m1.clone(), m2.clone()]);
        let second = collapser.collapse(vec![m1.clone(), m2.clone(), message("a", ALICE)]);
        assert!(Arc::ptr_eq(&first[0], &second[0]));

        let third = collapser.collapse(vec![m1, m2, membership("m3")]);
        assert_eq!(ids(&third), ["collapsed-m1"]);
        assert!(!Arc::ptr_eq(&first[0], &third[0]));
    }
}
