//! Structural invariant tests for the generation-indexed tree.
//!
//! Covers:
//! 1. Sorted order, balance, and aggregate consistency after random
//!    insert/delete sequences, cross-checked against a model map
//! 2. `find_next` agreement with a brute-force scan over the in-order
//!    sequence, including wrap-around
//! 3. Aggregate consistency after generation rewrites

use std::collections::BTreeMap;

use proptest::prelude::*;

use crate::GenTree;

#[derive(Debug, Clone)]
enum Op {
    Insert(String, i64),
    Delete(String),
    SetGeneration(String, i64),
}

fn key_strategy() -> impl Strategy<Value = String> {
    // A small alphabet forces key collisions, exercising the duplicate and
    // delete paths instead of only growing the tree.
    "[a-f]{1,3}"
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (key_strategy(), -1000i64..1000).prop_map(|(k, g)| Op::Insert(k, g)),
        2 => key_strategy().prop_map(Op::Delete),
        1 => (key_strategy(), -1000i64..1000).prop_map(|(k, g)| Op::SetGeneration(k, g)),
    ]
}

/// First in-order position at or after `index` whose generation is at most
/// `threshold`, wrapping to position zero, computed the slow way.
fn brute_force_find_next(pairs: &[(String, i64)], index: usize, threshold: i64) -> Option<String> {
    pairs
        .iter()
        .skip(index)
        .chain(pairs.iter().take(index))
        .find(|(_, g)| *g <= threshold)
        .map(|(k, _)| k.clone())
}

proptest! {
    #[test]
    fn invariants_hold_after_every_operation(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let mut tree = GenTree::new();
        let mut model: BTreeMap<String, i64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, generation) => {
                    let inserted = tree.insert(key.clone(), generation);
                    let expected = !model.contains_key(&key);
                    prop_assert_eq!(inserted, expected, "insert disagreement for {}", key);
                    model.entry(key).or_insert(generation);
                }
                Op::Delete(key) => {
                    let deleted = tree.delete(&key);
                    prop_assert_eq!(deleted, model.remove(&key).is_some());
                }
                Op::SetGeneration(key, generation) => {
                    if let Some(id) = tree.find(&key) {
                        tree.set_generation(id, generation);
                        model.insert(key, generation);
                    }
                }
            }

            tree.assert_invariants();
            prop_assert_eq!(tree.len(), model.len());
        }

        let keys: Vec<String> = model.keys().cloned().collect();
        prop_assert_eq!(tree.values(), keys);
    }

    #[test]
    fn find_next_matches_brute_force(
        entries in prop::collection::btree_map(key_strategy(), -50i64..50, 1..40),
        index_seed in 0usize..64,
        offset in 0i64..120,
    ) {
        let mut tree = GenTree::new();
        for (key, generation) in &entries {
            tree.insert(key.clone(), *generation);
        }

        let pairs: Vec<(String, i64)> = entries.into_iter().collect();
        let index = index_seed % pairs.len();
        let min = pairs.iter().map(|(_, g)| *g).min().unwrap_or(0);
        let threshold = min + offset;

        let id = tree.find_next(index, threshold).unwrap();
        let expected = brute_force_find_next(&pairs, index, threshold)
            .expect("a candidate always exists for threshold >= min");
        prop_assert_eq!(tree.key_of(id), expected);
    }

    #[test]
    fn generations_match_model_extremes(
        entries in prop::collection::btree_map(key_strategy(), -1000i64..1000, 1..40),
    ) {
        let mut tree = GenTree::new();
        for (key, generation) in &entries {
            tree.insert(key.clone(), *generation);
        }

        let min = entries.values().copied().min().unwrap();
        let max = entries.values().copied().max().unwrap();
        prop_assert_eq!(tree.generations(), (min, max));
    }
}

#[test]
fn ascending_and_descending_churn() {
    let mut tree = GenTree::new();
    for i in 0..512 {
        assert!(tree.insert(format!("k{i:04}"), i));
        tree.assert_invariants();
    }
    for i in (0..512).rev() {
        assert!(tree.delete(&format!("k{i:04}")));
        tree.assert_invariants();
    }
    assert!(tree.is_empty());
}

#[test]
fn interleaved_insert_delete_keeps_balance() {
    let mut tree = GenTree::new();
    // Deterministic but irregular order via a multiplicative stride.
    for i in 0..256u32 {
        let k = (i.wrapping_mul(167)) % 256;
        tree.insert(format!("k{k:03}"), i64::from(k));
    }
    for i in 0..256u32 {
        let k = (i.wrapping_mul(89)) % 256;
        if k % 3 == 0 {
            tree.delete(&format!("k{k:03}"));
        }
        tree.assert_invariants();
    }
}
