//! Property-based tests for id assignment and the incremental cache
//!
//! These tests use proptest to verify invariants across many randomly
//! generated inputs, catching edge cases that hand-written tests might miss.

use std::collections::{BTreeMap, BTreeSet};

use derivgen::analysis::cache::{CacheGate, Fingerprint};
use derivgen::analysis::ids::{IdCandidate, IdError, MAX_ID, assign_ids};
use proptest::prelude::*;

/// Distinct variant names with an optional forced id each (forced ids are distinct and non-zero).
fn family() -> impl Strategy<Value = Vec<(String, Option<u8>)>> {
    prop::collection::btree_set("[A-Z][a-z]{0,6}", 1..40).prop_flat_map(|names| {
        let names: Vec<String> = names.into_iter().collect();
        let len = names.len();
        (
            Just(names),
            prop::collection::btree_set(1..=MAX_ID, 0..=len.min(8)),
            prop::collection::vec(any::<prop::sample::Index>(), 0..=8),
        )
            .prop_map(|(names, forced_ids, slots)| {
                let mut family: Vec<(String, Option<u8>)> = names.into_iter().map(|n| (n, None)).collect();
                let len = family.len();
                for (id, slot) in forced_ids.into_iter().zip(slots) {
                    let i = slot.index(len);
                    if family[i].1.is_none() {
                        family[i].1 = Some(id);
                    }
                }
                family
            })
    })
}

fn assign(family: &[(String, Option<u8>)]) -> Result<BTreeMap<String, u8>, IdError> {
    let candidates: Vec<IdCandidate<'_>> = family.iter().map(|(n, f)| IdCandidate::new(n, *f)).collect();
    let ids = assign_ids(&candidates)?;
    Ok(family.iter().map(|(n, _)| n.clone()).zip(ids).collect())
}

// =============================================================================
// Id assignment
// =============================================================================

proptest! {
    /// Property: ids are unique, non-zero, and forced ids are honoured.
    #[test]
    fn ids_are_unique_and_respect_forced(family in family()) {
        let ids = assign(&family).unwrap();
        let distinct: BTreeSet<u8> = ids.values().copied().collect();
        prop_assert_eq!(distinct.len(), family.len());
        prop_assert!(!distinct.contains(&0));
        for (name, forced) in &family {
            if let Some(id) = forced {
                prop_assert_eq!(ids[name], *id);
            }
        }
    }

    /// Property: the mapping does not depend on discovery order.
    #[test]
    fn ids_ignore_discovery_order(family in family(), seed in any::<u64>()) {
        let mut shuffled = family.clone();
        let len = shuffled.len();
        // Deterministic rotation plus reversal driven by the seed.
        shuffled.rotate_left((seed as usize) % len);
        if seed % 2 == 0 {
            shuffled.reverse();
        }
        prop_assert_eq!(assign(&family).unwrap(), assign(&shuffled).unwrap());
    }

    /// Property: unforced variants take the lowest free ids in name order.
    #[test]
    fn unforced_ids_are_dense_in_name_order(family in family()) {
        let ids = assign(&family).unwrap();
        let forced: BTreeSet<u8> = family.iter().filter_map(|(_, f)| *f).collect();
        let mut unforced: Vec<&String> = family.iter().filter(|(_, f)| f.is_none()).map(|(n, _)| n).collect();
        unforced.sort();
        let expected: Vec<u8> = (1..=MAX_ID).filter(|id| !forced.contains(id)).take(unforced.len()).collect();
        let actual: Vec<u8> = unforced.iter().map(|n| ids[*n]).collect();
        prop_assert_eq!(actual, expected);
    }

    /// Property: an unforced newcomer that sorts after every existing name leaves earlier ids alone.
    #[test]
    fn trailing_newcomer_keeps_existing_ids(family in family()) {
        let before = assign(&family).unwrap();
        let mut grown = family.clone();
        // Sorts after any `[A-Z][a-z]{0,6}` name.
        grown.push(("Zzzzzzzz".to_string(), None));
        let after = assign(&grown).unwrap();
        for (name, id) in &before {
            prop_assert_eq!(after[name], *id);
        }
    }

    /// Property: a newcomer forcing an unused id leaves earlier ids alone, whatever its name.
    #[test]
    fn forced_newcomer_on_free_id_keeps_existing_ids(
        family in family(),
        name in "[A-Z][a-z]{0,6}",
        pick in any::<prop::sample::Index>(),
    ) {
        prop_assume!(family.iter().all(|(n, _)| *n != name));
        let before = assign(&family).unwrap();
        let taken: BTreeSet<u8> = before.values().copied().collect();
        let free: Vec<u8> = (1..=MAX_ID).filter(|id| !taken.contains(id)).collect();
        let forced = free[pick.index(free.len())];

        let mut grown = family.clone();
        grown.push((name.clone(), Some(forced)));
        let after = assign(&grown).unwrap();
        prop_assert_eq!(after[&name], forced);
        for (n, id) in &before {
            prop_assert_eq!(after[n], *id);
        }
    }
}

// =============================================================================
// Cache
// =============================================================================

proptest! {
    /// Property: equal values fingerprint equally; the gate serves them without recomputing.
    #[test]
    fn unchanged_inputs_are_cache_hits(entries in prop::collection::btree_map("[a-z]{1,8}", any::<u32>(), 1..20)) {
        let mut gate: CacheGate<String, u32> = CacheGate::new();
        let first: Vec<_> = entries
            .iter()
            .map(|(k, v)| gate.get_or_materialize::<()>(k.clone(), Fingerprint::of(v), || Ok(*v)).unwrap())
            .collect();
        gate.commit(first);

        let second: Vec<_> = entries
            .iter()
            .map(|(k, v)| {
                gate.get_or_materialize::<()>(k.clone(), Fingerprint::of(v), || panic!("recomputed {k}")).unwrap()
            })
            .collect();
        prop_assert!(second.iter().all(|c| c.hit));
        let stats = gate.commit(second);
        prop_assert_eq!(stats.hits, entries.len());
        prop_assert_eq!(stats.swept, 0);
    }

    /// Property: a changed value misses exactly once and is swept from the old generation.
    #[test]
    fn changed_input_misses(entries in prop::collection::btree_map("[a-z]{1,8}", any::<u32>(), 1..20), pick in any::<prop::sample::Index>()) {
        let mut gate: CacheGate<String, u32> = CacheGate::new();
        let first: Vec<_> = entries
            .iter()
            .map(|(k, v)| gate.get_or_materialize::<()>(k.clone(), Fingerprint::of(v), || Ok(*v)).unwrap())
            .collect();
        gate.commit(first);

        let changed = pick.index(entries.len());
        let second: Vec<_> = entries
            .iter()
            .enumerate()
            .map(|(i, (k, v))| {
                let v = if i == changed { v.wrapping_add(1) } else { *v };
                gate.get_or_materialize::<()>(k.clone(), Fingerprint::of(&v), || Ok(v)).unwrap()
            })
            .collect();
        let stats = gate.commit(second);
        prop_assert_eq!(stats.misses, 1);
        prop_assert_eq!(stats.swept, 1);
    }
}
