//! Dispatch Context
//!
//! The context is the single shared object every mutator and action sees:
//! raw state, the getter facade, `commit`, and `dispatch`. It is built once
//! per store, and the action receiving it gets the exact same instance, so
//! actions can commit and dispatch recursively.
//!
//! # Commit vs. Dispatch
//!
//! - `commit` runs a mutator synchronously with `(state, payload)` and hands
//!   back its return value.
//! - `dispatch` runs an action synchronously with `(context, payload)` and
//!   normalizes whatever it returns into a [`Dispatched`] future. Commits the
//!   action makes before returning are therefore visible before the caller
//!   awaits; work the action schedules for later is not awaited.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::getters::Getters;
use crate::state::StateTree;

/// A mutator: `(state, payload) -> value`, run synchronously.
pub type Mutator = Arc<dyn Fn(&StateTree, Value) -> Value + Send + Sync>;

/// An action: `(context, payload) -> result`, possibly asynchronous.
pub type Action = Arc<dyn Fn(&Context, Value) -> ActionResult + Send + Sync>;

/// The settled result of a dispatch.
pub type Dispatched = BoxFuture<'static, Result<Value>>;

/// What an action hands back: a value now, one later, or an error now.
pub enum ActionResult {
    /// The action finished with this value.
    Ready(Value),

    /// The action settles when this future does.
    Deferred(Dispatched),

    /// The action body failed; `dispatch` returns this error directly.
    Failed(StoreError),
}

impl ActionResult {
    /// Wrap a future as a deferred result.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    fn into_dispatched(self) -> Result<Dispatched> {
        match self {
            Self::Ready(value) => Ok(future::ready(Ok(value)).boxed()),
            Self::Deferred(dispatched) => Ok(dispatched),
            Self::Failed(err) => Err(err),
        }
    }
}

impl From<()> for ActionResult {
    fn from(_: ()) -> Self {
        Self::Ready(Value::Null)
    }
}

impl From<Value> for ActionResult {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

impl From<Dispatched> for ActionResult {
    fn from(dispatched: Dispatched) -> Self {
        Self::Deferred(dispatched)
    }
}

/// An error returned by the action body fails the `dispatch` call itself.
impl<T> From<Result<T>> for ActionResult
where
    T: Into<ActionResult>,
{
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Conversion for mutator return values; `()` becomes `null`.
pub trait IntoValue {
    /// Convert into a plain value.
    fn into_value(self) -> Value;
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

struct ContextInner {
    state: Arc<StateTree>,
    getters: Getters,
    mutators: IndexMap<String, Mutator>,
    actions: IndexMap<String, Action>,
}

/// The shared `{state, getters, commit, dispatch}` object.
///
/// Clones are handles to the same context; see [`Context::ptr_eq`].
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Build the context. `getters` should be evaluated against `state`.
    pub fn new(
        state: Arc<StateTree>,
        getters: Getters,
        mutators: IndexMap<String, Mutator>,
        actions: IndexMap<String, Action>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                state,
                getters,
                mutators,
                actions,
            }),
        }
    }

    /// The raw state tree, not the snapshot. Mutators write through its sources.
    pub fn state(&self) -> &StateTree {
        &self.inner.state
    }

    /// The getter facade, for getter-to-getter reads.
    pub fn getters(&self) -> &Getters {
        &self.inner.getters
    }

    /// Run the mutator `name` synchronously.
    pub fn commit(&self, name: &str, payload: Value) -> Result<Value> {
        let mutator = self
            .inner
            .mutators
            .get(name)
            .ok_or_else(|| StoreError::UnknownMutator(name.to_string()))?;

        debug!(mutator = name, "commit");
        Ok(mutator(&self.inner.state, payload))
    }

    /// Run the action `name` and normalize its result into a future.
    ///
    /// The action body runs before this returns; only its result is deferred.
    /// An error from the body comes back here, not through the future.
    pub fn dispatch(&self, name: &str, payload: Value) -> Result<Dispatched> {
        let action = self
            .inner
            .actions
            .get(name)
            .ok_or_else(|| StoreError::UnknownAction(name.to_string()))?;

        debug!(action = name, "dispatch");
        action(self, payload).into_dispatched()
    }

    /// Commit `name` after `delay` on the current tokio runtime.
    ///
    /// Fails with [`StoreError::NoRuntime`] outside a runtime. The commit is
    /// not tied to any dispatch; callers that care about its outcome await
    /// the handle.
    pub fn commit_after(
        &self,
        delay: Duration,
        name: impl Into<String>,
        payload: Value,
    ) -> Result<JoinHandle<Result<Value>>> {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let context = self.clone();
        let name = name.into();
        debug!(mutator = %name, ?delay, "scheduling commit");
        Ok(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            context.commit(&name, payload)
        }))
    }

    /// Check whether a mutator is registered under `name`.
    pub fn has_mutator(&self, name: &str) -> bool {
        self.inner.mutators.contains_key(name)
    }

    /// Check whether an action is registered under `name`.
    pub fn has_action(&self, name: &str) -> bool {
        self.inner.actions.contains_key(name)
    }

    /// Mutator names in declaration order.
    pub fn mutator_names(&self) -> Vec<String> {
        self.inner.mutators.keys().cloned().collect()
    }

    /// Action names in declaration order.
    pub fn action_names(&self) -> Vec<String> {
        self.inner.actions.keys().cloned().collect()
    }

    /// Check if two handles refer to the same context.
    pub fn ptr_eq(a: &Context, b: &Context) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.inner.state.names())
            .field("getters", &self.inner.getters)
            .field("mutators", &self.mutator_names())
            .field("actions", &self.action_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Writable;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn context(
        state: StateTree,
        mutators: IndexMap<String, Mutator>,
        actions: IndexMap<String, Action>,
    ) -> Context {
        let state = Arc::new(state);
        let getters = Getters::new(Arc::clone(&state), IndexMap::new());
        Context::new(state, getters, mutators, actions)
    }

    #[test]
    fn commit_runs_mutator_with_state_and_payload() {
        let called = Arc::new(AtomicI32::new(0));
        let given = Arc::new(Mutex::new(Value::Null));

        let mut mutators: IndexMap<String, Mutator> = IndexMap::new();
        let (called_clone, given_clone) = (called.clone(), given.clone());
        mutators.insert(
            "foo".into(),
            Arc::new(move |state: &StateTree, payload: Value| -> Value {
                called_clone.fetch_add(1, Ordering::SeqCst);
                assert_eq!(state.names(), vec!["a"]);
                *given_clone.lock() = payload;
                json!("done")
            }),
        );

        let cx = context(StateTree::new().with("a", json!(1)), mutators, IndexMap::new());
        let returned = cx.commit("foo", json!("bar")).unwrap();

        assert_eq!(returned, json!("done"));
        assert_eq!(*given.lock(), json!("bar"));
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_names_fail() {
        let cx = context(StateTree::new(), IndexMap::new(), IndexMap::new());

        assert_eq!(
            cx.commit("missing", Value::Null).unwrap_err(),
            StoreError::UnknownMutator("missing".into())
        );
        assert_eq!(
            cx.dispatch("missing", Value::Null).err(),
            Some(StoreError::UnknownAction("missing".into()))
        );
    }

    #[tokio::test]
    async fn dispatch_passes_the_shared_context() {
        let seen: Arc<Mutex<Vec<Context>>> = Arc::new(Mutex::new(Vec::new()));
        let payloads = Arc::new(Mutex::new(Vec::new()));

        let mut actions: IndexMap<String, Action> = IndexMap::new();
        let (seen_outer, payloads_outer) = (seen.clone(), payloads.clone());
        actions.insert(
            "outer".into(),
            Arc::new(move |cx: &Context, payload: Value| -> ActionResult {
                seen_outer.lock().push(cx.clone());
                payloads_outer.lock().push(payload);
                cx.dispatch("inner", json!(2)).into()
            }),
        );
        let seen_inner = seen.clone();
        actions.insert(
            "inner".into(),
            Arc::new(move |cx: &Context, payload: Value| -> ActionResult {
                seen_inner.lock().push(cx.clone());
                payload.into()
            }),
        );

        let cx = context(StateTree::new(), IndexMap::new(), actions);
        let settled = cx.dispatch("outer", json!(1)).unwrap().await.unwrap();

        assert_eq!(settled, json!(2));
        assert_eq!(*payloads.lock(), vec![json!(1)]);
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|other| Context::ptr_eq(&cx, other)));
    }

    #[tokio::test]
    async fn synchronous_commits_land_before_settlement() {
        let num = Writable::new(0);

        let mut mutators: IndexMap<String, Mutator> = IndexMap::new();
        mutators.insert(
            "inc".into(),
            Arc::new(|state: &StateTree, _: Value| -> Value {
                if let Some(num) = state.writable("num") {
                    num.update(|v| json!(v.as_i64().unwrap_or(0) + 1));
                }
                Value::Null
            }),
        );
        let mut actions: IndexMap<String, Action> = IndexMap::new();
        actions.insert(
            "bump".into(),
            Arc::new(|cx: &Context, _: Value| -> ActionResult { cx.commit("inc", Value::Null).into() }),
        );

        let cx = context(StateTree::new().with("num", num.clone()), mutators, actions);
        let dispatched = cx.dispatch("bump", Value::Null).unwrap();

        // The body already ran, before anyone awaited.
        assert_eq!(num.get(), json!(1));
        assert_eq!(dispatched.await.unwrap(), Value::Null);
    }

    #[test]
    fn failing_action_body_fails_dispatch() {
        let mut actions: IndexMap<String, Action> = IndexMap::new();
        actions.insert(
            "broken".into(),
            Arc::new(|cx: &Context, _: Value| -> ActionResult { cx.commit("nope", Value::Null).into() }),
        );

        let cx = context(StateTree::new(), IndexMap::new(), actions);

        assert_eq!(
            cx.dispatch("broken", Value::Null).err(),
            Some(StoreError::UnknownMutator("nope".into()))
        );
    }

    #[tokio::test]
    async fn deferred_failure_settles_with_error() {
        let mut actions: IndexMap<String, Action> = IndexMap::new();
        actions.insert(
            "later".into(),
            Arc::new(|cx: &Context, _: Value| -> ActionResult {
                let cx = cx.clone();
                ActionResult::deferred(async move { cx.commit("nope", Value::Null) })
            }),
        );

        let cx = context(StateTree::new(), IndexMap::new(), actions);
        let dispatched = cx.dispatch("later", Value::Null).unwrap();

        assert_eq!(
            dispatched.await.unwrap_err(),
            StoreError::UnknownMutator("nope".into())
        );
    }

    #[tokio::test]
    async fn commit_after_runs_later() {
        let num = Writable::new(0);
        let mut mutators: IndexMap<String, Mutator> = IndexMap::new();
        mutators.insert(
            "set".into(),
            Arc::new(|state: &StateTree, payload: Value| -> Value {
                if let Some(num) = state.writable("num") {
                    num.set(payload);
                }
                Value::Null
            }),
        );

        let cx = context(StateTree::new().with("num", num.clone()), mutators, IndexMap::new());
        let handle = cx
            .commit_after(Duration::from_millis(5), "set", json!(9))
            .unwrap();

        assert_eq!(num.get(), json!(0));
        handle.await.unwrap().unwrap();
        assert_eq!(num.get(), json!(9));
    }

    #[test]
    fn commit_after_needs_a_runtime() {
        let cx = context(StateTree::new(), IndexMap::new(), IndexMap::new());

        assert_eq!(
            cx.commit_after(Duration::from_millis(5), "set", Value::Null).err(),
            Some(StoreError::NoRuntime)
        );
    }
}
