//! Reconciliation — merge fetched batches into the persistent registry.
//!
//! A run is bracketed by [`begin_run`] (clear all `current` markers) and
//! [`sweep`] (delete everything not re-observed). In between, [`apply`]
//! merges one batch at a time. Membership is commutative in merge order;
//! only the `permanently_closed` scalar is last-write-wins when sources
//! disagree within a run.

use tracing::{debug, info};

use midway_common::{Place, Registry, SourceBatch};

/// Reset every place's `current` marker ahead of a new run.
pub fn begin_run(registry: &mut Registry) {
    for (_, place) in registry.iter_mut() {
        place.current = false;
    }
}

/// Merge one batch into the registry in place. Known names are updated,
/// unknown names created; a place is never replaced wholesale, so
/// addresses and coordinates survive across runs.
pub fn apply(registry: &mut Registry, batch: &SourceBatch) {
    let mut created = 0usize;
    let mut updated = 0usize;

    for observed in &batch.entries {
        match registry.get_mut(&observed.name) {
            Some(place) => {
                place.current = true;
                place.permanently_closed = observed.permanently_closed;
                place.add_category(&batch.list_label);
                updated += 1;
            }
            None => {
                registry.insert(
                    observed.name.clone(),
                    Place::observed(&batch.list_label, observed.permanently_closed),
                );
                created += 1;
            }
        }
    }

    debug!(
        label = batch.list_label.as_str(),
        created, updated, "Batch merged"
    );
}

/// Delete every place not observed in this run. Returns the count removed.
pub fn sweep(registry: &mut Registry) -> usize {
    let before = registry.len();
    registry.retain(|_, place| place.current);
    let removed = before - registry.len();
    if removed > 0 {
        info!(removed, "Swept stale places");
    }
    removed
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use midway_common::ObservedPlace;

    use super::*;

    fn batch(label: &str, entries: &[(&str, bool)]) -> SourceBatch {
        SourceBatch {
            list_label: label.to_string(),
            entries: entries
                .iter()
                .map(|(name, closed)| ObservedPlace {
                    name: name.to_string(),
                    permanently_closed: *closed,
                })
                .collect(),
        }
    }

    #[test]
    fn merges_two_sources_with_shared_places() {
        let mut registry = Registry::new();
        begin_run(&mut registry);
        apply(&mut registry, &batch("S1", &[("Cafe X", false)]));
        apply(&mut registry, &batch("S2", &[("Cafe X", false), ("Bar Y", true)]));
        sweep(&mut registry);

        assert_eq!(registry.len(), 2);
        let cafe = registry.get("Cafe X").unwrap();
        assert_eq!(cafe.categories, vec!["S1", "S2"]);
        assert!(!cafe.permanently_closed);
        let bar = registry.get("Bar Y").unwrap();
        assert_eq!(bar.categories, vec!["S2"]);
        assert!(bar.permanently_closed);
    }

    #[test]
    fn applying_the_same_batch_twice_is_idempotent() {
        let mut registry = Registry::new();
        begin_run(&mut registry);
        let b = batch("S1", &[("Cafe X", false), ("Bar Y", true)]);
        apply(&mut registry, &b);
        let snapshot: Vec<_> = registry
            .iter()
            .map(|(name, place)| (name.clone(), place.categories.clone(), place.current))
            .collect();

        apply(&mut registry, &b);
        let again: Vec<_> = registry
            .iter()
            .map(|(name, place)| (name.clone(), place.categories.clone(), place.current))
            .collect();

        assert_eq!(snapshot, again);
        assert_eq!(registry.get("Cafe X").unwrap().categories, vec!["S1"]);
    }

    #[test]
    fn sweep_removes_places_not_observed_this_run() {
        let mut registry = Registry::new();
        for name in ["A", "B", "C"] {
            registry.insert(name.to_string(), Place::observed("old", false));
        }

        begin_run(&mut registry);
        apply(&mut registry, &batch("S1", &[("A", false), ("C", false)]));
        let removed = sweep(&mut registry);

        assert_eq!(removed, 1);
        assert!(registry.get("B").is_none());
        assert!(registry.get("A").unwrap().current);
        assert!(registry.get("C").unwrap().current);
    }

    #[test]
    fn membership_is_independent_of_merge_order() {
        let b1 = batch("S1", &[("Cafe X", false), ("Deli Z", false)]);
        let b2 = batch("S2", &[("Cafe X", false), ("Bar Y", true)]);

        let mut forward = Registry::new();
        begin_run(&mut forward);
        apply(&mut forward, &b1);
        apply(&mut forward, &b2);
        sweep(&mut forward);

        let mut reverse = Registry::new();
        begin_run(&mut reverse);
        apply(&mut reverse, &b2);
        apply(&mut reverse, &b1);
        sweep(&mut reverse);

        let names = |r: &Registry| -> Vec<String> { r.iter().map(|(n, _)| n.clone()).collect() };
        assert_eq!(names(&forward), names(&reverse));

        for (name, place) in forward.iter() {
            let other = reverse.get(name).unwrap();
            let lhs: BTreeSet<_> = place.categories.iter().collect();
            let rhs: BTreeSet<_> = other.categories.iter().collect();
            assert_eq!(lhs, rhs);
            assert_eq!(place.permanently_closed, other.permanently_closed);
        }
    }

    #[test]
    fn closed_flag_is_last_write_wins() {
        let mut registry = Registry::new();
        begin_run(&mut registry);
        apply(&mut registry, &batch("S1", &[("Cafe X", true)]));
        apply(&mut registry, &batch("S2", &[("Cafe X", false)]));
        assert!(!registry.get("Cafe X").unwrap().permanently_closed);
    }
}
