//! Read Tracking
//!
//! A host learns what a render depends on by opening a [`ReadScope`] around
//! it. Every keyed read of an observed view made on this thread while the
//! scope is innermost lands in the scope's [`ReadSet`], once per view and
//! key, in first-read order.
//!
//! Scopes nest. An inner scope shadows the outer one until it is finished,
//! and its reads are not added to the outer scope. Finishing or dropping an
//! outer scope closes any inner scope still open.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

thread_local! {
    static OPEN_SCOPES: RefCell<Vec<OpenScope>> = const { RefCell::new(Vec::new()) };
}

struct OpenScope {
    tag: u64,
    reads: IndexSet<Read>,
}

/// Identity of one observed view of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    /// Allocate a fresh view identity.
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::new()
    }
}

/// A keyed read of one view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Read {
    pub view: ViewId,
    pub key: String,
}

/// Deduplicated reads collected by a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSet {
    reads: IndexSet<Read>,
}

impl ReadSet {
    /// Check whether `key` of `view` was read.
    pub fn contains(&self, view: ViewId, key: &str) -> bool {
        self.reads.contains(&Read {
            view,
            key: key.to_string(),
        })
    }

    /// Keys read, in first-read order. A key read through two views
    /// appears twice.
    pub fn keys(&self) -> Vec<&str> {
        self.reads.iter().map(|read| read.key.as_str()).collect()
    }

    /// Views read from, in first-read order.
    pub fn views(&self) -> Vec<ViewId> {
        self.reads
            .iter()
            .map(|read| read.view)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Read> {
        self.reads.iter()
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}

/// An open read scope on the current thread.
///
/// Call [`ReadScope::finish`] to collect its reads; dropping it discards
/// them.
pub struct ReadScope {
    tag: u64,
    closed: bool,
    /// Scopes live in thread-local storage and must close on their thread.
    _thread: PhantomData<*const ()>,
}

impl ReadScope {
    /// Open a scope that shadows any scope already open on this thread.
    pub fn open() -> Self {
        static NEXT_TAG: AtomicU64 = AtomicU64::new(0);
        let tag = NEXT_TAG.fetch_add(1, Ordering::Relaxed);

        OPEN_SCOPES.with(|scopes| {
            scopes.borrow_mut().push(OpenScope {
                tag,
                reads: IndexSet::new(),
            });
        });

        Self {
            tag,
            closed: false,
            _thread: PhantomData,
        }
    }

    /// Record a read of `key` through `view` into the innermost scope.
    /// Reads with no open scope are ignored.
    pub fn record(view: ViewId, key: &str) {
        OPEN_SCOPES.with(|scopes| {
            if let Some(scope) = scopes.borrow_mut().last_mut() {
                scope.reads.insert(Read {
                    view,
                    key: key.to_string(),
                });
            }
        });
    }

    /// Close the scope and return what it read.
    pub fn finish(mut self) -> ReadSet {
        self.close()
    }

    fn close(&mut self) -> ReadSet {
        if self.closed {
            return ReadSet::default();
        }
        self.closed = true;

        OPEN_SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            let Some(position) = scopes.iter().position(|scope| scope.tag == self.tag) else {
                return ReadSet::default();
            };
            let reads = scopes
                .drain(position..)
                .next()
                .map(|scope| scope.reads)
                .unwrap_or_default();
            ReadSet { reads }
        })
    }
}

impl Drop for ReadScope {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_reads_count_once() {
        let view = ViewId::new();
        let scope = ReadScope::open();

        ReadScope::record(view, "num");
        ReadScope::record(view, "label");
        ReadScope::record(view, "num");

        let reads = scope.finish();
        assert_eq!(reads.keys(), vec!["num", "label"]);
        assert!(reads.contains(view, "label"));
    }

    #[test]
    fn same_key_through_two_views_is_two_reads() {
        let (state, derived) = (ViewId::new(), ViewId::new());
        let scope = ReadScope::open();

        ReadScope::record(derived, "total");
        ReadScope::record(state, "total");

        let reads = scope.finish();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads.views(), vec![derived, state]);
        assert!(!reads.contains(ViewId::new(), "total"));
    }

    #[test]
    fn reads_without_a_scope_go_nowhere() {
        ReadScope::record(ViewId::new(), "num");

        assert!(ReadScope::open().finish().is_empty());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let view = ViewId::new();
        let outer = ReadScope::open();
        ReadScope::record(view, "a");

        let inner = ReadScope::open();
        ReadScope::record(view, "b");
        assert_eq!(inner.finish().keys(), vec!["b"]);

        ReadScope::record(view, "c");
        assert_eq!(outer.finish().keys(), vec!["a", "c"]);
    }

    #[test]
    fn finishing_outer_closes_inner() {
        let view = ViewId::new();
        let outer = ReadScope::open();
        let inner = ReadScope::open();
        ReadScope::record(view, "x");

        assert!(outer.finish().is_empty());
        assert!(inner.finish().is_empty());

        // Nothing is left open on this thread.
        ReadScope::record(view, "y");
        assert!(ReadScope::open().finish().is_empty());
    }

    #[test]
    fn stale_guard_leaves_newer_scopes_alone() {
        let view = ViewId::new();
        let outer = ReadScope::open();
        let stale = ReadScope::open();
        drop(outer);

        let fresh = ReadScope::open();
        ReadScope::record(view, "z");
        drop(stale);

        assert_eq!(fresh.finish().keys(), vec!["z"]);
    }
}
