//! Store Assembly
//!
//! Ties the pieces together:
//!
//! ```text
//! spec.state ──► Snapshot ──► host.observe ──► Props ──► map_state
//! spec.state ─┬► Getters ──► resolve_all ──► Snapshot ──► Props ──► map_getters
//!             └─────────────────┐
//! {state, getters, mutators, actions} ──► Context ─┬► Binder<Commit>   ──► map_mutations
//!                                                  └► Binder<Dispatch> ──► map_actions
//! ```
//!
//! Getters run once, during assembly. Sources they return are bound in a
//! second snapshot pass, so derived values keep updating afterwards.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::binder::{Binder, Commit, Dispatch};
use crate::context::{Action, ActionResult, Context, IntoValue, Mutator};
use crate::error::Result;
use crate::getters::{GetterFn, Getters};
use crate::host::{wrap_values, Host, Props};
use crate::selector::{Selection, Selector, Subset};
use crate::snapshot::Snapshot;
use crate::state::{StateNode, StateTree};

/// Everything a store is built from. Every part defaults to empty.
#[derive(Default)]
pub struct StoreSpec {
    state: StateNode,
    getters: IndexMap<String, GetterFn>,
    mutators: IndexMap<String, Mutator>,
    actions: IndexMap<String, Action>,
}

impl StoreSpec {
    /// Start an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state tree. Anything but a mapping fails at build time.
    pub fn state(mut self, state: impl Into<StateNode>) -> Self {
        self.state = state.into();
        self
    }

    /// Add a getter.
    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&StateTree, &Getters) -> Result<StateNode> + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(getter));
        self
    }

    /// Add a mutator. It may return `()` or a value.
    pub fn mutator<F, R>(mut self, name: impl Into<String>, mutator: F) -> Self
    where
        F: Fn(&StateTree, Value) -> R + Send + Sync + 'static,
        R: IntoValue,
    {
        self.mutators.insert(
            name.into(),
            Arc::new(move |state: &StateTree, payload: Value| mutator(state, payload).into_value()),
        );
        self
    }

    /// Add an action. It may return `()`, a value, a future, or a `Result` of those.
    pub fn action<F, R>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Context, Value) -> R + Send + Sync + 'static,
        R: Into<ActionResult>,
    {
        self.actions.insert(
            name.into(),
            Arc::new(move |context: &Context, payload: Value| action(context, payload).into()),
        );
        self
    }
}

/// An assembled store.
///
/// Holding the store, or any prop it handed out, keeps its subscriptions
/// alive. Call [`Store::release`] to detach them explicitly.
pub struct Store {
    context: Context,
    state: Snapshot,
    derived: Snapshot,
    map_state: Selector<Props>,
    map_getters: Selector<Props>,
    map_mutations: Selector<Binder<Commit>>,
    map_actions: Selector<Binder<Dispatch>>,
}

impl Store {
    /// Assemble a store, observing its snapshots through `host`.
    ///
    /// Fails without building anything if the state is not a mapping or a
    /// getter fails to resolve.
    pub fn build(spec: StoreSpec, host: &dyn Host) -> Result<Self> {
        let StoreSpec {
            state,
            getters,
            mutators,
            actions,
        } = spec;

        let state_snapshot = Snapshot::build(&state)?;
        let state = Arc::new(state.expect_tree()?.clone());

        let getters = Getters::new(Arc::clone(&state), getters);
        let derived = StateNode::Tree(getters.resolve_all()?);
        let derived_snapshot = Snapshot::build(&derived)?;

        let state_props = wrap_values(&host.observe(state_snapshot.clone()));
        let derived_props = wrap_values(&host.observe(derived_snapshot.clone()));

        let context = Context::new(state, getters, mutators, actions);

        debug!(
            state = state_props.len(),
            getters = derived_props.len(),
            mutators = context.mutator_names().len(),
            actions = context.action_names().len(),
            "store assembled"
        );

        Ok(Self {
            map_state: Selector::new(state_props),
            map_getters: Selector::new(derived_props),
            map_mutations: Selector::new(Binder::new(context.clone())),
            map_actions: Selector::new(Binder::new(context.clone())),
            context,
            state: state_snapshot,
            derived: derived_snapshot,
        })
    }

    /// Select state props.
    pub fn map_state(&self, selection: &Selection<Props>) -> Subset<Props> {
        self.map_state.select(selection)
    }

    /// Select getter props.
    pub fn map_getters(&self, selection: &Selection<Props>) -> Subset<Props> {
        self.map_getters.select(selection)
    }

    /// Select commit-bound mutators.
    pub fn map_mutations(&self, selection: &Selection<Binder<Commit>>) -> Subset<Binder<Commit>> {
        self.map_mutations.select(selection)
    }

    /// Select dispatch-bound actions.
    pub fn map_actions(
        &self,
        selection: &Selection<Binder<Dispatch>>,
    ) -> Subset<Binder<Dispatch>> {
        self.map_actions.select(selection)
    }

    /// The four selectors, for handing to a host.
    pub fn selectors(&self) -> Selectors {
        Selectors {
            map_state: self.map_state.clone(),
            map_getters: self.map_getters.clone(),
            map_mutations: self.map_mutations.clone(),
            map_actions: self.map_actions.clone(),
        }
    }

    /// The shared context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The live state snapshot.
    pub fn state(&self) -> &Snapshot {
        &self.state
    }

    /// The live derived snapshot.
    pub fn derived(&self) -> &Snapshot {
        &self.derived
    }

    /// Release every subscription held by both snapshots.
    pub fn release(&self) {
        self.state.release();
        self.derived.release();
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("context", &self.context)
            .field("state", &self.state)
            .field("derived", &self.derived)
            .finish()
    }
}

/// The store's public surface: one selector per category.
#[derive(Clone)]
pub struct Selectors {
    /// Over the live state snapshot.
    pub map_state: Selector<Props>,
    /// Over the live derived snapshot.
    pub map_getters: Selector<Props>,
    /// Over the commit-bound facade.
    pub map_mutations: Selector<Binder<Commit>>,
    /// Over the dispatch-bound facade.
    pub map_actions: Selector<Binder<Dispatch>>,
}
