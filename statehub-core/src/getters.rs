//! Derived Getters
//!
//! Getters are named derivations over the raw state and sibling getters.
//! Each definition runs at most once for the life of the store.
//!
//! # How Resolution Works
//!
//! 1. Reading a getter looks it up in a memo table.
//!
//! 2. On a miss, the slot is marked as resolving and the definition runs
//!    with the state and this same facade, so it can read siblings.
//!
//! 3. The result is cached; every later read, from any caller, returns it
//!    without running the definition again.
//!
//! Order is driven by access, not declaration: a getter may read a sibling
//! declared after it, and that read triggers the sibling's single run.
//!
//! A read that lands on a slot the same thread is still resolving is a
//! dependency cycle and fails with [`StoreError::CyclicGetter`]. A read that
//! lands on a slot another thread is resolving waits for that thread to
//! finish. A cycle spanning threads is not detected and deadlocks.
//!
//! # Reactivity
//!
//! The memo is for the definition, not its value. A getter that returns a
//! subscribable keeps updating through that subscribable; the definition is
//! never re-run.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{Result, StoreError};
use crate::state::{StateNode, StateTree};

/// A getter definition: `(state, getters) -> value or source`.
pub type GetterFn = Arc<dyn Fn(&StateTree, &Getters) -> Result<StateNode> + Send + Sync>;

/// Resolution state of one getter.
#[derive(Clone)]
enum Slot {
    /// The definition is running on this thread.
    Resolving(ThreadId),

    /// The definition ran and produced this node.
    Resolved(StateNode),
}

struct GettersInner {
    state: Arc<StateTree>,
    defs: IndexMap<String, GetterFn>,
    cache: Mutex<HashMap<String, Slot>>,
    /// Signalled whenever a slot stops resolving.
    settled: Condvar,
}

/// Lazily-resolved, memoized getter facade.
#[derive(Clone)]
pub struct Getters {
    inner: Arc<GettersInner>,
}

impl Getters {
    /// Create a facade over `defs`. Nothing runs until a getter is read.
    pub fn new(state: Arc<StateTree>, defs: IndexMap<String, GetterFn>) -> Self {
        Self {
            inner: Arc::new(GettersInner {
                state,
                defs,
                cache: Mutex::new(HashMap::new()),
                settled: Condvar::new(),
            }),
        }
    }

    /// Read a getter, running its definition on first access.
    pub fn get(&self, name: &str) -> Result<StateNode> {
        let def = self
            .inner
            .defs
            .get(name)
            .ok_or_else(|| StoreError::UnknownGetter(name.to_string()))?;

        let me = thread::current().id();
        {
            let mut cache = self.inner.cache.lock();
            loop {
                match cache.get(name).cloned() {
                    Some(Slot::Resolved(node)) => return Ok(node),
                    Some(Slot::Resolving(owner)) if owner == me => {
                        return Err(StoreError::CyclicGetter(name.to_string()))
                    }
                    Some(Slot::Resolving(_)) => {
                        trace!(getter = name, "waiting on another thread");
                        self.inner.settled.wait(&mut cache);
                    }
                    None => {
                        cache.insert(name.to_string(), Slot::Resolving(me));
                        break;
                    }
                }
            }
        }

        trace!(getter = name, "resolving getter");
        let result = def(&self.inner.state, self);

        let mut cache = self.inner.cache.lock();
        let result = match result {
            Ok(node) => {
                cache.insert(name.to_string(), Slot::Resolved(node.clone()));
                Ok(node)
            }
            Err(err) => {
                cache.remove(name);
                Err(err)
            }
        };
        self.inner.settled.notify_all();
        result
    }

    /// Force every getter once and collect the results, in declaration order.
    ///
    /// The returned tree is what gets bound into the live derived snapshot.
    pub fn resolve_all(&self) -> Result<StateTree> {
        self.inner
            .defs
            .keys()
            .map(|name| Ok((name.clone(), self.get(name)?)))
            .collect()
    }

    /// Check if a getter has already run.
    pub fn is_resolved(&self, name: &str) -> bool {
        matches!(self.inner.cache.lock().get(name), Some(Slot::Resolved(_)))
    }

    /// Getter names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.inner.defs.keys().cloned().collect()
    }

    /// The raw state getters are evaluated against.
    pub fn state(&self) -> &StateTree {
        &self.inner.state
    }
}

impl std::fmt::Debug for Getters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Getters")
            .field("names", &self.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Derived, Writable};
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counted<F>(count: &Arc<AtomicI32>, f: F) -> GetterFn
    where
        F: Fn(&StateTree, &Getters) -> Result<StateNode> + Send + Sync + 'static,
    {
        let count = count.clone();
        Arc::new(move |state: &StateTree, getters: &Getters| {
            count.fetch_add(1, Ordering::SeqCst);
            f(state, getters)
        })
    }

    #[test]
    fn resolves_dependencies_and_runs_each_once() {
        let foo = Arc::new(AtomicI32::new(0));
        let bar = Arc::new(AtomicI32::new(0));
        let baz = Arc::new(AtomicI32::new(0));
        let qux = Arc::new(AtomicI32::new(0));

        // `bar` and `baz` are declared after the getters that read them.
        let mut defs: IndexMap<String, GetterFn> = IndexMap::new();
        defs.insert("foo".into(), counted(&foo, |_, g| g.get("bar")));
        defs.insert("bar".into(), counted(&bar, |_, g| g.get("baz")));
        defs.insert("baz".into(), counted(&baz, |_, _| Ok(json!(42).into())));
        defs.insert("qux".into(), counted(&qux, |_, _| Ok(json!(null).into())));

        let getters = Getters::new(Arc::new(StateTree::new()), defs);
        let resolved = getters.resolve_all().unwrap();

        for count in [&foo, &bar, &baz, &qux] {
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
        assert_eq!(
            resolved.get("foo").and_then(StateNode::as_value),
            Some(&json!(42))
        );
        assert_eq!(resolved.names(), vec!["foo", "bar", "baz", "qux"]);
    }

    #[test]
    fn falsy_results_are_still_memoized() {
        let runs = Arc::new(AtomicI32::new(0));
        let mut defs: IndexMap<String, GetterFn> = IndexMap::new();
        defs.insert("zero".into(), counted(&runs, |_, _| Ok(json!(0).into())));

        let getters = Getters::new(Arc::new(StateTree::new()), defs);
        getters.get("zero").unwrap();
        getters.get("zero").unwrap();
        getters.resolve_all().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn getters_receive_state_and_facade() {
        let state = Arc::new(StateTree::new().with("a", json!(1)));
        let mut defs: IndexMap<String, GetterFn> = IndexMap::new();
        defs.insert(
            "foo".into(),
            Arc::new(|state: &StateTree, getters: &Getters| -> Result<StateNode> {
                assert_eq!(state.get("a").and_then(StateNode::as_value), Some(&json!(1)));
                assert_eq!(getters.names(), vec!["foo", "bar"]);
                Ok(json!(true).into())
            }),
        );
        defs.insert("bar".into(), Arc::new(|_: &StateTree, _: &Getters| -> Result<StateNode> { Ok(json!(false).into()) }));

        let getters = Getters::new(state, defs);
        assert!(!getters.is_resolved("foo"));
        getters.get("foo").unwrap();
        assert!(getters.is_resolved("foo"));
        assert!(!getters.is_resolved("bar"));
    }

    #[test]
    fn cycles_fail_fast() {
        let mut defs: IndexMap<String, GetterFn> = IndexMap::new();
        defs.insert("a".into(), Arc::new(|_: &StateTree, g: &Getters| g.get("b")));
        defs.insert("b".into(), Arc::new(|_: &StateTree, g: &Getters| g.get("a")));

        let getters = Getters::new(Arc::new(StateTree::new()), defs);
        assert_eq!(
            getters.resolve_all().unwrap_err(),
            StoreError::CyclicGetter("a".into())
        );
    }

    #[test]
    fn concurrent_first_reads_wait_instead_of_failing() {
        let runs = Arc::new(AtomicI32::new(0));
        let mut defs: IndexMap<String, GetterFn> = IndexMap::new();
        defs.insert(
            "slow".into(),
            counted(&runs, |_, _| {
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok(json!(7).into())
            }),
        );
        let getters = Getters::new(Arc::new(StateTree::new()), defs);

        let results: Vec<Result<StateNode>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| getters.get("slow")))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        for result in results {
            assert_eq!(result.unwrap().as_value(), Some(&json!(7)));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_getter() {
        let getters = Getters::new(Arc::new(StateTree::new()), IndexMap::new());
        assert_eq!(
            getters.get("nope").unwrap_err(),
            StoreError::UnknownGetter("nope".into())
        );
    }

    #[test]
    fn sources_returned_by_getters_stay_live() {
        let num = Writable::new(1);
        let state = Arc::new(StateTree::new().with("num", num.clone()));
        let runs = Arc::new(AtomicI32::new(0));

        let mut defs: IndexMap<String, GetterFn> = IndexMap::new();
        defs.insert(
            "doubled".into(),
            counted(&runs, |state, _| {
                let num = state.source("num").ok_or(StoreError::InvalidStateShape)?;
                Ok(Derived::new(num, |v| json!(v.as_i64().unwrap_or(0) * 2)).into())
            }),
        );

        let getters = Getters::new(state, defs);
        let resolved = StateNode::from(getters.resolve_all().unwrap());
        let derived = crate::snapshot::Snapshot::build(&resolved).unwrap();
        assert_eq!(derived.get("doubled"), Some(json!(2)));

        num.set(5);
        assert_eq!(derived.get("doubled"), Some(json!(10)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
