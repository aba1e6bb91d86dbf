//! Record-side linkage: the link field every indexed record embeds, the
//! trait exposing it, and the arenas that hand out record handles.

use slotmap::{DenseSlotMap, SlotMap};

/// Intra-bucket link embedded in each record.
///
/// Records sharing one key form a doubly linked list threaded through
/// these fields. `prev == None` marks the list head.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Link<H> {
    Unlinked,
    Linked {
        prev: Option<H>,
        next: Option<H>,
    },
}

impl<H> Default for Link<H> {
    fn default() -> Self {
        Link::Unlinked
    }
}

impl<H: Copy> Link<H> {
    #[inline]
    pub fn is_linked(&self) -> bool {
        matches!(self, Link::Linked { .. })
    }

    /// Previous record under the same key, if linked and not the head.
    #[inline]
    pub fn prev(&self) -> Option<H> {
        match *self {
            Link::Linked { prev, .. } => prev,
            Link::Unlinked => None,
        }
    }

    /// Next record under the same key, if linked and not the tail.
    #[inline]
    pub fn next(&self) -> Option<H> {
        match *self {
            Link::Linked { next, .. } => next,
            Link::Unlinked => None,
        }
    }
}

/// A record that can be indexed by a `StrIndex`.
///
/// The index reads `key()` and rewrites the link through `link_mut()`;
/// it never touches anything else in the record. The key must not change
/// while the record is linked.
pub trait Record<H> {
    fn key(&self) -> &str;
    fn link(&self) -> &Link<H>;
    fn link_mut(&mut self) -> &mut Link<H>;
}

/// Caller-owned storage resolving handles to records.
///
/// The index stores only handles, never records, so it cannot keep a
/// record alive or free one. Removing a record from the store while it is
/// still linked leaves a dangling handle in the index; the next operation
/// that reaches it panics.
pub trait RecordStore {
    type Handle: Copy + Eq + core::fmt::Debug;
    type Record: Record<Self::Handle>;

    fn record(&self, h: Self::Handle) -> Option<&Self::Record>;
    fn record_mut(&mut self, h: Self::Handle) -> Option<&mut Self::Record>;
}

impl<K, R> RecordStore for SlotMap<K, R>
where
    K: slotmap::Key,
    R: Record<K>,
{
    type Handle = K;
    type Record = R;

    #[inline]
    fn record(&self, h: K) -> Option<&R> {
        self.get(h)
    }
    #[inline]
    fn record_mut(&mut self, h: K) -> Option<&mut R> {
        self.get_mut(h)
    }
}

impl<K, R> RecordStore for DenseSlotMap<K, R>
where
    K: slotmap::Key,
    R: Record<K>,
{
    type Handle = K;
    type Record = R;

    #[inline]
    fn record(&self, h: K) -> Option<&R> {
        self.get(h)
    }
    #[inline]
    fn record_mut(&mut self, h: K) -> Option<&mut R> {
        self.get_mut(h)
    }
}

// Plain vectors index by position. Handles stay valid only as long as the
// caller never removes or reorders elements.
impl<R: Record<usize>> RecordStore for Vec<R> {
    type Handle = usize;
    type Record = R;

    #[inline]
    fn record(&self, h: usize) -> Option<&R> {
        self.get(h)
    }
    #[inline]
    fn record_mut(&mut self, h: usize) -> Option<&mut R> {
        self.get_mut(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::DefaultKey;

    struct Named {
        name: &'static str,
        link: Link<DefaultKey>,
    }

    impl Record<DefaultKey> for Named {
        fn key(&self) -> &str {
            self.name
        }
        fn link(&self) -> &Link<DefaultKey> {
            &self.link
        }
        fn link_mut(&mut self) -> &mut Link<DefaultKey> {
            &mut self.link
        }
    }

    #[test]
    fn default_link_is_unlinked() {
        let l: Link<usize> = Link::default();
        assert!(!l.is_linked());
        assert_eq!(l.prev(), None);
        assert_eq!(l.next(), None);
    }

    #[test]
    fn linked_accessors() {
        let l = Link::Linked {
            prev: Some(1usize),
            next: None,
        };
        assert!(l.is_linked());
        assert_eq!(l.prev(), Some(1));
        assert_eq!(l.next(), None);

        // A lone record is linked even though both neighbours are absent.
        let solo: Link<usize> = Link::Linked {
            prev: None,
            next: None,
        };
        assert!(solo.is_linked());
    }

    #[test]
    fn slotmap_store_resolves_and_forgets_handles() {
        let mut sm: SlotMap<DefaultKey, Named> = SlotMap::new();
        let h = sm.insert(Named {
            name: "a",
            link: Link::Unlinked,
        });
        assert_eq!(RecordStore::record(&sm, h).map(|r| r.key()), Some("a"));

        *RecordStore::record_mut(&mut sm, h).unwrap().link_mut() = Link::Linked {
            prev: None,
            next: None,
        };
        assert!(sm[h].link.is_linked());

        sm.remove(h);
        assert!(RecordStore::record(&sm, h).is_none());
    }
}
