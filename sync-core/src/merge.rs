//! Collection merge for Hearth Sync.
//!
//! Merging is remote-wins by id: every remote entity is kept as-is, and a
//! local entity survives only when the remote has nothing with its id
//! (a local creation that has not been pushed yet). There is no per-field
//! reconciliation and no causal ordering; a newer unsynced local edit to
//! an id the remote also holds is overridden.
//!
//! Output is sorted by [`Entity::sort_key`] descending, ties broken by id
//! ascending, so the result does not depend on input order.

use std::cmp::Ordering;
use std::collections::HashMap;

use hearth_sync_types::Entity;

/// What a merge did, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Number of distinct ids taken from the remote side.
    pub remote: usize,
    /// Number of local-only entities kept.
    pub local_only: usize,
    /// Ids where a differing local value was replaced by the remote one.
    pub overridden: Vec<String>,
}

/// Merge `local` and `remote` into one collection.
pub fn merge_collection<E: Entity>(local: Vec<E>, remote: Vec<E>) -> Vec<E> {
    merge_with_report(local, remote).0
}

/// Merge `local` and `remote`, also reporting what was kept and overridden.
///
/// Within one side, a repeated id keeps the last occurrence.
pub fn merge_with_report<E: Entity>(local: Vec<E>, remote: Vec<E>) -> (Vec<E>, MergeReport) {
    let mut by_id: HashMap<String, E> = HashMap::with_capacity(local.len() + remote.len());
    for entity in remote {
        by_id.insert(entity.id().to_string(), entity);
    }

    let mut report = MergeReport {
        remote: by_id.len(),
        ..MergeReport::default()
    };

    let mut local_only: HashMap<String, E> = HashMap::new();
    for entity in local {
        match by_id.get(entity.id()) {
            Some(winner) => {
                if *winner != entity && !report.overridden.iter().any(|id| id == entity.id()) {
                    report.overridden.push(entity.id().to_string());
                }
            }
            None => {
                local_only.insert(entity.id().to_string(), entity);
            }
        }
    }
    report.local_only = local_only.len();
    by_id.extend(local_only);

    let mut merged: Vec<E> = by_id.into_values().collect();
    sort_newest_first(&mut merged);
    report.overridden.sort();

    (merged, report)
}

/// Sort a collection the way merged output is sorted: newest first, ties by id.
pub fn sort_newest_first<E: Entity>(items: &mut [E]) {
    items.sort_by(|a, b| newest_first(a, b));
}

fn newest_first<E: Entity>(a: &E, b: &E) -> Ordering {
    b.sort_key()
        .cmp(&a.sort_key())
        .then_with(|| a.id().cmp(b.id()))
}
