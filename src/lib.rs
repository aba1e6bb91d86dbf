//! strand-index: an intrusive, string-keyed multi-index over records the
//! caller owns.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: register and look up a large, changing population of records by
//!   a string key embedded in each record, where many records may share a
//!   key, without allocating a node per record.
//! - Pieces:
//!   - `Record` / `Link`: the capability a record type implements. The
//!     index only reads `key()` and rewrites the embedded `Link`.
//!   - `RecordStore`: the caller's arena (`SlotMap`, `DenseSlotMap`
//!     or `Vec`) resolving copyable handles to records.
//!   - `StrIndex<H, S>`: power-of-two slot array; each slot chains buckets
//!     (one per distinct key); each bucket heads a doubly linked list of
//!     records threaded through their `Link`s.
//!
//! Constraints
//! - The index owns slots and buckets only. It never owns, frees or
//!   moves a record; removal merely unlinks.
//! - Duplicate keys are normal: they chain under one bucket and
//!   `collision_count` reports how many share it.
//! - Growth doubles the slot array when `buckets >> 1 > slots`. It reacts
//!   to distinct keys, never to records per key, and never shrinks.
//! - Not internally synchronized. Mutation takes `&mut self`; lookups take
//!   `&self`.
//!
//! Failure model
//! - Misuse is fatal: inserting a linked record, removing one the index
//!   cannot find, or a handle that no longer resolves all panic.
//! - Failing to allocate a larger slot array is recoverable and reported
//!   as `InsertError::AllocFailed`; the index is left unchanged.
//!
//! Reentrancy
//! - Chain walks call `Record::key` on caller code. A debug-only guard
//!   panics if that code re-enters the same index mid-walk.
//!
//! Hashing
//! - The default `ElfHasher` is the unseeded ELF/PJW string hash. Each
//!   bucket caches its key's hash, so growth re-threads buckets without
//!   calling back into records. Key equality is always a full compare.
//!
//! Notes and non-goals
//! - No key ordering, no range queries, no shrinking.
//! - A removed record has its link reset to `Link::Unlinked` and may be
//!   inserted again.

mod error;
mod guard;
pub mod hash;
pub mod record;
pub mod str_index;
mod str_index_proptest;

// Public surface
pub use error::InsertError;
pub use hash::{ElfHasher, StrHasher};
pub use record::{Link, Record, RecordStore};
pub use str_index::{IndexStats, Records, StrIndex};
