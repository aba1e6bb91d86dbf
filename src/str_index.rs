//! StrIndex: string-keyed multi-index over caller-owned records.
//!
//! Two chain levels hang off every slot. Buckets with different keys that
//! land in the same slot form a singly linked list; records sharing one key
//! form a doubly linked list threaded through their own `Link` fields, with
//! the bucket holding its head. The index owns slots and buckets only.

use crate::error::InsertError;
use crate::guard::ReentryCheck;
use crate::hash::{ElfHasher, StrHasher};
use crate::record::{Link, Record, RecordStore};
use core::fmt::Debug;
use slotmap::{new_key_type, SlotMap};
use std::collections::TryReserveError;

new_key_type! {
    struct BucketKey;
}

/// One distinct key value. Never empty: the bucket is freed together with
/// its last record.
#[derive(Debug)]
struct Bucket<H> {
    next: Option<BucketKey>,
    head: H,
    len: usize,
    // Hash of the key, so re-threading on growth never calls record code.
    hash: u32,
}

#[derive(Debug)]
struct Table<H> {
    slots: Vec<Option<BucketKey>>,
    mask: usize,
    buckets: SlotMap<BucketKey, Bucket<H>>,
    records: usize,
}

fn resolve<St: RecordStore>(store: &St, h: St::Handle) -> &St::Record {
    store
        .record(h)
        .unwrap_or_else(|| panic!("record handle {h:?} does not resolve in its store"))
}

fn resolve_mut<St: RecordStore>(store: &mut St, h: St::Handle) -> &mut St::Record {
    store
        .record_mut(h)
        .unwrap_or_else(|| panic!("record handle {h:?} does not resolve in its store"))
}

fn set_prev<St: RecordStore>(store: &mut St, h: St::Handle, to: Option<St::Handle>) {
    match resolve_mut(store, h).link_mut() {
        Link::Linked { prev, .. } => *prev = to,
        Link::Unlinked => panic!("record {h:?} sits in a chain but is marked unlinked"),
    }
}

fn set_next<St: RecordStore>(store: &mut St, h: St::Handle, to: Option<St::Handle>) {
    match resolve_mut(store, h).link_mut() {
        Link::Linked { next, .. } => *next = to,
        Link::Unlinked => panic!("record {h:?} sits in a chain but is marked unlinked"),
    }
}

impl<H: Copy + Eq + Debug> Table<H> {
    fn with_slots(n: usize) -> Self {
        let len = n.max(1).next_power_of_two();
        Self {
            slots: vec![None; len],
            mask: len - 1,
            buckets: SlotMap::with_key(),
            records: 0,
        }
    }

    #[inline]
    fn slot_of(&self, hash: u32) -> usize {
        hash as usize & self.mask
    }

    fn find_bucket<St>(&self, store: &St, hash: u32, key: &str) -> Option<BucketKey>
    where
        St: RecordStore<Handle = H>,
    {
        let mut cur = self.slots[self.slot_of(hash)];
        while let Some(bk) = cur {
            let bucket = &self.buckets[bk];
            if bucket.hash == hash && resolve(store, bucket.head).key() == key {
                return Some(bk);
            }
            cur = bucket.next;
        }
        None
    }

    #[inline]
    fn needs_growth(&self) -> bool {
        (self.buckets.len() >> 1) > self.slots.len()
    }

    /// Doubles the slot array and re-threads every bucket under the new
    /// mask. On allocation failure nothing has been touched.
    fn grow(&mut self) -> Result<(), TryReserveError> {
        let old_len = self.slots.len();
        let new_len = old_len << 1;
        let new_mask = new_len - 1;
        assert!(
            new_len & new_mask == 0,
            "slot count {new_len} is not a power of two"
        );

        let mut new_slots: Vec<Option<BucketKey>> = Vec::new();
        new_slots.try_reserve_exact(new_len)?;
        new_slots.resize(new_len, None);

        for head in self.slots.iter().copied() {
            let mut cur = head;
            while let Some(bk) = cur {
                let bucket = &mut self.buckets[bk];
                cur = bucket.next;
                let ndx = bucket.hash as usize & new_mask;
                bucket.next = new_slots[ndx];
                new_slots[ndx] = Some(bk);
            }
        }

        self.slots = new_slots;
        self.mask = new_mask;
        log::trace!(
            "grew string index from {old_len} to {new_len} slots ({} buckets)",
            self.buckets.len()
        );
        Ok(())
    }

    /// Detaches `bk` from its slot chain and frees it.
    fn unlink_bucket(&mut self, bk: BucketKey) -> Bucket<H> {
        let slot = self.slot_of(self.buckets[bk].hash);
        let next = self.buckets[bk].next;
        match self.slots[slot] {
            Some(first) if first == bk => self.slots[slot] = next,
            Some(first) => {
                let mut pred = first;
                loop {
                    match self.buckets[pred].next {
                        Some(n) if n == bk => break,
                        Some(n) => pred = n,
                        None => panic!("bucket missing from the chain of slot {slot}"),
                    }
                }
                self.buckets[pred].next = next;
            }
            None => panic!("slot {slot} is empty but a bucket hashes to it"),
        }
        self.buckets
            .remove(bk)
            .expect("bucket must exist while it is being unlinked")
    }
}

/// Shape of an index at one point in time.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IndexStats {
    pub slots: usize,
    pub occupied_slots: usize,
    pub buckets: usize,
    pub records: usize,
    /// Most buckets chained at a single slot.
    pub longest_slot_chain: usize,
    /// Most records sharing a single key.
    pub longest_record_chain: usize,
}

/// Intrusive index from string keys to records, allowing duplicate keys.
///
/// Records live in a caller-owned `RecordStore` and are referred to by
/// handle `H`; every operation takes the store alongside the index. The
/// index must always be used with the same store it was populated from.
///
/// Dropping the index frees its buckets and leaves records untouched, so
/// any record still linked keeps a stale `Link::Linked` value.
#[derive(Debug)]
pub struct StrIndex<H, S = ElfHasher> {
    table: Table<H>,
    hasher: S,
    reentry: ReentryCheck,
}

impl<H: Copy + Eq + Debug> StrIndex<H> {
    pub fn new() -> Self {
        Self::with_hasher(ElfHasher)
    }
}

impl<H: Copy + Eq + Debug> Default for StrIndex<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the records sharing one key, most recently inserted first.
pub struct Records<'a, St: RecordStore> {
    store: &'a St,
    cur: Option<St::Handle>,
    remaining: usize,
}

impl<St: RecordStore> Iterator for Records<'_, St> {
    type Item = St::Handle;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let h = self.cur?;
        self.cur = resolve(self.store, h).link().next();
        self.remaining = self.remaining.saturating_sub(1);
        Some(h)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<St: RecordStore> ExactSizeIterator for Records<'_, St> {}

impl<H, S> StrIndex<H, S>
where
    H: Copy + Eq + Debug,
    S: StrHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_slots_and_hasher(1, hasher)
    }

    /// Starts with `slots` rounded up to a power of two (at least one).
    pub fn with_slots_and_hasher(slots: usize, hasher: S) -> Self {
        let table = Table::with_slots(slots);
        if table.slots.len() > 1 {
            log::debug!("pre-sized string index to {} slots", table.slots.len());
        }
        Self {
            table,
            hasher,
            reentry: ReentryCheck::new(),
        }
    }

    /// Number of linked records.
    pub fn len(&self) -> usize {
        self.table.records
    }
    pub fn is_empty(&self) -> bool {
        self.table.records == 0
    }

    /// Number of distinct keys currently indexed.
    pub fn bucket_count(&self) -> usize {
        self.table.buckets.len()
    }
    pub fn slot_count(&self) -> usize {
        self.table.slots.len()
    }
    pub fn mask(&self) -> usize {
        self.table.mask
    }
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Links `handle` at the head of its key's record list, creating the
    /// bucket if the key is new. Duplicate keys are accepted.
    ///
    /// # Panics
    /// If the record is already linked or `handle` does not resolve.
    pub fn insert<St>(&mut self, store: &mut St, handle: H) -> Result<(), InsertError>
    where
        St: RecordStore<Handle = H>,
    {
        let _g = self.reentry.enter();
        let (hash, found) = {
            let record = resolve(&*store, handle);
            assert!(
                !record.link().is_linked(),
                "record {handle:?} is already linked into an index"
            );
            let key = record.key();
            let hash = self.hasher.hash_str(key);
            loop {
                if let Some(bk) = self.table.find_bucket(&*store, hash, key) {
                    break (hash, Some(bk));
                }
                if !self.table.needs_growth() {
                    break (hash, None);
                }
                self.table.grow()?;
            }
        };

        match found {
            Some(bk) => {
                let bucket = &mut self.table.buckets[bk];
                let old_head = bucket.head;
                bucket.head = handle;
                bucket.len += 1;
                *resolve_mut(store, handle).link_mut() = Link::Linked {
                    prev: None,
                    next: Some(old_head),
                };
                match resolve_mut(store, old_head).link_mut() {
                    Link::Linked { prev, .. } => {
                        assert!(prev.is_none(), "chain head {old_head:?} has a predecessor");
                        *prev = Some(handle);
                    }
                    Link::Unlinked => panic!("chain head {old_head:?} is marked unlinked"),
                }
            }
            None => {
                let slot = self.table.slot_of(hash);
                let bk = self.table.buckets.insert(Bucket {
                    next: self.table.slots[slot],
                    head: handle,
                    len: 1,
                    hash,
                });
                self.table.slots[slot] = Some(bk);
                *resolve_mut(store, handle).link_mut() = Link::Linked {
                    prev: None,
                    next: None,
                };
            }
        }
        self.table.records += 1;
        Ok(())
    }

    /// Most recently inserted record with this key.
    pub fn lookup<St>(&self, store: &St, key: &str) -> Option<H>
    where
        St: RecordStore<Handle = H>,
    {
        let _g = self.reentry.enter();
        let hash = self.hasher.hash_str(key);
        self.table
            .find_bucket(store, hash, key)
            .map(|bk| self.table.buckets[bk].head)
    }

    pub fn contains_key<St>(&self, store: &St, key: &str) -> bool
    where
        St: RecordStore<Handle = H>,
    {
        self.lookup(store, key).is_some()
    }

    /// How many records currently share `key`; zero if none.
    pub fn collision_count<St>(&self, store: &St, key: &str) -> usize
    where
        St: RecordStore<Handle = H>,
    {
        let _g = self.reentry.enter();
        let hash = self.hasher.hash_str(key);
        self.table
            .find_bucket(store, hash, key)
            .map_or(0, |bk| self.table.buckets[bk].len)
    }

    /// All records sharing `key`, newest first.
    pub fn records<'a, St>(&self, store: &'a St, key: &str) -> Records<'a, St>
    where
        St: RecordStore<Handle = H>,
    {
        let _g = self.reentry.enter();
        let hash = self.hasher.hash_str(key);
        match self.table.find_bucket(store, hash, key) {
            Some(bk) => {
                let bucket = &self.table.buckets[bk];
                Records {
                    store,
                    cur: Some(bucket.head),
                    remaining: bucket.len,
                }
            }
            None => Records {
                store,
                cur: None,
                remaining: 0,
            },
        }
    }

    /// Unlinks `handle` and resets its link to `Link::Unlinked`, so it may
    /// be inserted again. The record itself stays in the store.
    ///
    /// # Panics
    /// If the record is not linked, or its key has no bucket in this index.
    pub fn remove<St>(&mut self, store: &mut St, handle: H)
    where
        St: RecordStore<Handle = H>,
    {
        let _g = self.reentry.enter();
        let (bk, prev, next) = {
            let record = resolve(&*store, handle);
            let (prev, next) = match *record.link() {
                Link::Linked { prev, next } => (prev, next),
                Link::Unlinked => panic!("record {handle:?} is not linked into an index"),
            };
            let key = record.key();
            let hash = self.hasher.hash_str(key);
            let bk = self
                .table
                .find_bucket(&*store, hash, key)
                .unwrap_or_else(|| panic!("no bucket for key {key:?} of linked record {handle:?}"));
            (bk, prev, next)
        };
        *resolve_mut(store, handle).link_mut() = Link::Unlinked;
        self.table.records -= 1;

        match prev {
            None => {
                let bucket = &mut self.table.buckets[bk];
                assert_eq!(
                    bucket.head, handle,
                    "record without predecessor is not its chain head"
                );
                match next {
                    None => {
                        let freed = self.table.unlink_bucket(bk);
                        debug_assert_eq!(freed.len, 1);
                        return;
                    }
                    Some(n) => {
                        bucket.head = n;
                        bucket.len -= 1;
                    }
                }
            }
            Some(p) => {
                set_next(store, p, next);
                self.table.buckets[bk].len -= 1;
            }
        }

        if let Some(n) = next {
            set_prev(store, n, prev);
        }
    }

    /// Unlinks every record and drops back to a single empty slot.
    pub fn clear<St>(&mut self, store: &mut St)
    where
        St: RecordStore<Handle = H>,
    {
        let _g = self.reentry.enter();
        log::trace!(
            "clearing string index: {} records in {} buckets",
            self.table.records,
            self.table.buckets.len()
        );
        for (_, bucket) in self.table.buckets.drain() {
            let mut cur = Some(bucket.head);
            while let Some(h) = cur {
                let link = resolve_mut(store, h).link_mut();
                cur = link.next();
                *link = Link::Unlinked;
            }
        }
        self.table.slots.clear();
        self.table.slots.push(None);
        self.table.mask = 0;
        self.table.records = 0;
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            slots: self.table.slots.len(),
            buckets: self.table.buckets.len(),
            records: self.table.records,
            ..IndexStats::default()
        };
        for head in self.table.slots.iter().copied() {
            let mut chain = 0;
            let mut cur = head;
            while let Some(bk) = cur {
                let bucket = &self.table.buckets[bk];
                chain += 1;
                stats.longest_record_chain = stats.longest_record_chain.max(bucket.len);
                cur = bucket.next;
            }
            if chain > 0 {
                stats.occupied_slots += 1;
            }
            stats.longest_slot_chain = stats.longest_slot_chain.max(chain);
        }
        stats
    }

    /// Walks both chain levels and panics on the first broken invariant.
    #[cfg(test)]
    pub(crate) fn check_invariants<St>(&self, store: &St)
    where
        St: RecordStore<Handle = H>,
    {
        let t = &self.table;
        assert!(t.slots.len().is_power_of_two());
        assert_eq!(t.mask, t.slots.len() - 1);

        let mut buckets_seen = 0;
        let mut records_seen = 0;
        for (slot, head) in t.slots.iter().copied().enumerate() {
            let mut cur = head;
            while let Some(bk) = cur {
                let bucket = &t.buckets[bk];
                buckets_seen += 1;
                assert_eq!(t.slot_of(bucket.hash), slot, "bucket chained at wrong slot");

                let key = resolve(store, bucket.head).key();
                assert_eq!(self.hasher.hash_str(key), bucket.hash);

                let mut prev = None;
                let mut rec = Some(bucket.head);
                let mut n = 0;
                while let Some(h) = rec {
                    let r = resolve(store, h);
                    assert_eq!(r.key(), key, "record under the wrong bucket");
                    assert!(r.link().is_linked());
                    assert_eq!(r.link().prev(), prev, "broken prev link at {h:?}");
                    prev = Some(h);
                    rec = r.link().next();
                    n += 1;
                }
                assert_eq!(n, bucket.len, "bucket length out of sync");
                records_seen += n;
                cur = bucket.next;
            }
        }
        assert_eq!(buckets_seen, t.buckets.len());
        assert_eq!(records_seen, t.records);
    }
}
