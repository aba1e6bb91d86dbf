#![cfg(test)]

// Property tests for StrIndex kept inside the crate so they can call the
// test-only invariant walker.

use crate::hash::{ElfHasher, StrHasher};
use crate::record::{Link, Record};
use crate::str_index::StrIndex;
use proptest::prelude::*;
use slotmap::{DefaultKey, SlotMap};
use std::collections::HashMap;

#[derive(Debug)]
struct Rec {
    key: String,
    link: Link<DefaultKey>,
}

impl Record<DefaultKey> for Rec {
    fn key(&self) -> &str {
        &self.key
    }
    fn link(&self) -> &Link<DefaultKey> {
        &self.link
    }
    fn link_mut(&mut self) -> &mut Link<DefaultKey> {
        &mut self.link
    }
}

// Operations index into a small key pool so shrinking converges on short
// pools and early keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize),
    Remove(usize, usize),
    Reinsert(usize),
    Lookup(usize),
    Count(String),
    Walk(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=10).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let count_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            3 => idx.clone().prop_map(Op::Insert),
            2 => (idx.clone(), any::<usize>()).prop_map(|(i, w)| Op::Remove(i, w)),
            1 => any::<usize>().prop_map(Op::Reinsert),
            1 => idx.clone().prop_map(Op::Lookup),
            1 => prop_oneof![count_pool, "[a-z]{0,4}"].prop_map(Op::Count),
            1 => idx.clone().prop_map(Op::Walk),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Model: per key, the live handles in insertion order (newest last).
fn run<S: StrHasher>(
    mut sut: StrIndex<DefaultKey, S>,
    pool: Vec<String>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut store: SlotMap<DefaultKey, Rec> = SlotMap::new();
    let mut model: HashMap<String, Vec<DefaultKey>> = HashMap::new();
    let mut detached: Vec<DefaultKey> = Vec::new();

    for op in ops {
        match op {
            Op::Insert(i) => {
                let key = pool[i].clone();
                let h = store.insert(Rec {
                    key: key.clone(),
                    link: Link::Unlinked,
                });
                sut.insert(&mut store, h).expect("insert");
                model.entry(key).or_default().push(h);
            }
            Op::Remove(i, which) => {
                let key = &pool[i];
                match model.get_mut(key) {
                    Some(live) if !live.is_empty() => {
                        let h = live.remove(which % live.len());
                        if live.is_empty() {
                            model.remove(key);
                        }
                        sut.remove(&mut store, h);
                        prop_assert!(!store[h].link.is_linked());
                        detached.push(h);
                    }
                    _ => {
                        prop_assert!(sut.lookup(&store, key).is_none());
                    }
                }
            }
            Op::Reinsert(which) => {
                if !detached.is_empty() {
                    let h = detached.swap_remove(which % detached.len());
                    sut.insert(&mut store, h).expect("reinsert");
                    model.entry(store[h].key.clone()).or_default().push(h);
                }
            }
            Op::Lookup(i) => {
                let key = &pool[i];
                let got = sut.lookup(&store, key);
                let want = model.get(key).and_then(|v| v.last().copied());
                prop_assert_eq!(got, want);
                if let Some(h) = got {
                    prop_assert_eq!(store[h].key.as_str(), key.as_str());
                }
            }
            Op::Count(key) => {
                let want = model.get(&key).map_or(0, Vec::len);
                prop_assert_eq!(sut.collision_count(&store, &key), want);
                prop_assert_eq!(sut.contains_key(&store, &key), want > 0);
            }
            Op::Walk(i) => {
                let key = &pool[i];
                let got: Vec<_> = sut.records(&store, key).collect();
                let want: Vec<_> = model
                    .get(key)
                    .map(|v| v.iter().rev().copied().collect())
                    .unwrap_or_default();
                prop_assert_eq!(got, want);
            }
        }

        // Post-conditions after each op
        sut.check_invariants(&store);
        prop_assert_eq!(sut.bucket_count(), model.len());
        prop_assert_eq!(sut.len(), model.values().map(Vec::len).sum::<usize>());
        prop_assert!(sut.slot_count().is_power_of_two());
        prop_assert_eq!(sut.mask(), sut.slot_count() - 1);
        for &h in &detached {
            prop_assert!(!store[h].link.is_linked());
        }
    }

    // Emptying every key reclaims every bucket.
    for (_, live) in model.drain() {
        for h in live {
            sut.remove(&mut store, h);
        }
    }
    prop_assert_eq!(sut.bucket_count(), 0);
    prop_assert!(sut.is_empty());
    sut.check_invariants(&store);
    Ok(())
}

#[derive(Clone, Copy, Default)]
struct ConstHasher;
impl StrHasher for ConstHasher {
    fn hash_str(&self, _key: &str) -> u32 {
        0
    }
}

/// Keeps only the low bit, so keys split across at most two slots.
#[derive(Clone, Copy, Default)]
struct LowBitHasher;
impl StrHasher for LowBitHasher {
    fn hash_str(&self, key: &str) -> u32 {
        ElfHasher.hash_str(key) & 1
    }
}

// Property: state-machine equivalence against a per-key list model.
// - lookup returns the newest live record for the key.
// - collision_count equals the number of live records for the key.
// - records() walks newest to oldest.
// - Removal in any order reclaims buckets; removed records are unlinked
//   and may be reinserted.
// - Both chain levels stay consistent after every step.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run(StrIndex::new(), pool, ops)?;
    }

    #[test]
    fn prop_state_machine_presized((pool, ops) in arb_scenario()) {
        run(StrIndex::with_slots_and_hasher(8, ElfHasher), pool, ops)?;
    }
}

// Same properties under worst-case hashing: every bucket shares one slot
// chain (or two), stressing string equality and predecessor scans.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run(StrIndex::with_hasher(ConstHasher), pool, ops)?;
    }

    #[test]
    fn prop_state_machine_two_slot_chains((pool, ops) in arb_scenario()) {
        run(StrIndex::with_hasher(LowBitHasher), pool, ops)?;
    }
}

// Property: growth keeps every distinct key reachable and the slot count
// tracks the distinct-key count.
proptest! {
    #[test]
    fn prop_growth_preserves_lookups(keys in proptest::collection::hash_set("[a-z0-9_]{1,12}", 1..300)) {
        let mut store: SlotMap<DefaultKey, Rec> = SlotMap::new();
        let mut sut = StrIndex::new();
        let mut placed = Vec::new();
        for k in keys {
            let h = store.insert(Rec { key: k.clone(), link: Link::Unlinked });
            let slots_before = sut.slot_count();
            let must_grow = (sut.bucket_count() >> 1) > slots_before;
            sut.insert(&mut store, h).expect("insert");
            if must_grow {
                prop_assert_eq!(sut.slot_count(), slots_before * 2);
            } else {
                prop_assert_eq!(sut.slot_count(), slots_before);
            }
            placed.push((k, h));
        }
        for (k, h) in &placed {
            prop_assert_eq!(sut.lookup(&store, k), Some(*h));
            prop_assert_eq!(sut.collision_count(&store, k), 1);
        }
        sut.check_invariants(&store);
    }
}
