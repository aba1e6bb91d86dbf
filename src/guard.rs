//! Debug-only detection of nested entry into an index.
//!
//! Chain walks call `Record::key` on caller records. If that code reaches
//! back into the same index, the walk would observe a half-updated table.
//! Debug builds panic on such nesting; release builds carry no state.

#[cfg(debug_assertions)]
use core::cell::Cell;
#[cfg(not(debug_assertions))]
use core::marker::PhantomData;

#[derive(Debug, Default)]
pub(crate) struct ReentryCheck {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
}

impl ReentryCheck {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
        }
    }

    /// Marks the index busy until the returned guard drops.
    #[inline]
    pub(crate) fn enter(&self) -> Entered<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "reentrant call into StrIndex while a chain walk is in progress"
            );
            Entered { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            Entered { _owner: PhantomData }
        }
    }
}

pub(crate) struct Entered<'a> {
    #[cfg(debug_assertions)]
    owner: &'a ReentryCheck,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ReentryCheck>,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.busy.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::ReentryCheck;

    #[test]
    fn sequential_entries_are_fine() {
        let r = ReentryCheck::new();
        drop(r.enter());
        drop(r.enter());
        let _g = r.enter();
    }

    #[cfg(debug_assertions)]
    #[test]
    fn nested_entry_panics_in_debug() {
        let r = ReentryCheck::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _outer = r.enter();
            let _inner = r.enter();
        }));
        assert!(res.is_err(), "expected nested entry to panic in debug builds");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn nested_entry_is_noop_in_release() {
        let r = ReentryCheck::new();
        let _outer = r.enter();
        let _inner = r.enter();
    }
}
