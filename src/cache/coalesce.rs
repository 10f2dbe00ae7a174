//! Dispatch plan generation.
//!
//! Dedupes a drained batch by event id and merges type "Changed" events per
//! sender, so a bulk type operation triggers one cascade instead of hundreds.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::events::{EventArgs, EventDefinition, EventTag, SenderTag};
use crate::domain::changes::ContentTypeChange;
use crate::domain::entities::ContentTypeRecord;

/// Senders whose `Changed` events are merged.
const COALESCED_SENDERS: [SenderTag; 3] = [
    SenderTag::ContentTypeService,
    SenderTag::MediaTypeService,
    SenderTag::MemberTypeService,
];

#[derive(Debug, Default)]
pub struct DispatchPlan {
    /// Events to dispatch, in the order they were raised.
    pub events: Vec<EventDefinition>,
    /// Events dropped because their id was already seen.
    pub duplicates: usize,
    /// Events folded into an earlier event of the same sender.
    pub coalesced: usize,
}

impl fmt::Display for DispatchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DispatchPlan {{ events: {}, duplicates: {}, coalesced: {} }}",
            self.events.len(),
            self.duplicates,
            self.coalesced,
        )
    }
}

fn is_coalescable(event: &EventDefinition) -> bool {
    event.event == EventTag::Changed
        && COALESCED_SENDERS.contains(&event.sender)
        && matches!(event.args, EventArgs::ContentTypes(_))
}

/// Folds `later` into `earlier`. Structural flags never weaken: a type
/// renamed and then saved again is still renamed.
fn merge_change(earlier: &mut ContentTypeChange, later: ContentTypeChange) {
    earlier.deleted |= later.deleted;
    merge_record(&mut earlier.item, later.item);
}

fn merge_record(earlier: &mut ContentTypeRecord, later: ContentTypeRecord) {
    earlier.alias_changed |= later.alias_changed || earlier.alias != later.alias;
    earlier.property_removed |= later.property_removed;
    earlier.is_new &= later.is_new;
    earlier.alias = later.alias;
    earlier.kind = later.kind;

    for id in later.property_type_ids {
        if !earlier.property_type_ids.contains(&id) {
            earlier.property_type_ids.push(id);
        }
    }
    for descendant in later.descendants {
        match earlier
            .descendants
            .iter_mut()
            .find(|existing| existing.id == descendant.id)
        {
            Some(existing) => merge_record(existing, descendant),
            None => earlier.descendants.push(descendant),
        }
    }
}

impl DispatchPlan {
    /// Builds the plan for one batch.
    ///
    /// - Dedupes by event id
    /// - With `coalesce`, merges type `Changed` events into the first one per
    ///   sender; two changes to the same type id fold into one that keeps
    ///   every structural flag either of them carried
    pub fn from_events(events: Vec<EventDefinition>, coalesce: bool) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();
        let mut merged_into: HashMap<SenderTag, usize> = HashMap::new();

        for event in events {
            if !seen_ids.insert(event.id) {
                plan.duplicates += 1;
                continue;
            }

            if !coalesce || !is_coalescable(&event) {
                plan.events.push(event);
                continue;
            }

            match merged_into.get(&event.sender) {
                Some(&index) => {
                    if let (EventArgs::ContentTypes(target), EventArgs::ContentTypes(changes)) =
                        (&mut plan.events[index].args, event.args)
                    {
                        for change in changes {
                            match target.iter_mut().find(|c| c.item.id == change.item.id) {
                                Some(existing) => merge_change(existing, change),
                                None => target.push(change),
                            }
                        }
                    }
                    plan.coalesced += 1;
                }
                None => {
                    merged_into.insert(event.sender, plan.events.len());
                    plan.events.push(event);
                }
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
