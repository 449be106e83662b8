//! Statehub Core
//!
//! This crate provides a reactive state container for UI hosts. It
//! implements:
//!
//! - Live snapshots that mirror a state tree of push-based sources
//! - Memoized getters that derive new sources from state and each other
//! - A shared dispatch context for synchronous mutators and async actions
//! - Selectors that hand components the slices of the store they ask for
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Subscribables, writables, derived sources, read tracking
//! - `state`: The raw state tree a store is built from
//! - `snapshot`: Live plain-value mirrors of state trees
//! - `host`: The host reactivity seam and computed props
//! - `getters`: Lazily-resolved, run-once getters
//! - `context`: `commit` and `dispatch`
//! - `binder`: Name-bound mutator and action facades
//! - `selector`: Subset selection over any named target
//! - `store`: Assembly of all of the above
//! - `registry`: Host installation and context publishing
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use serde_json::{json, Value};
//! use statehub_core::{
//!     InstallOptions, PlainHost, Registry, Selection, StateTree, StoreSpec, Writable,
//! };
//!
//! let registry = Registry::new();
//! registry.install(Arc::new(PlainHost), InstallOptions::default());
//!
//! let num = Writable::new(0);
//! let store = registry
//!     .store(
//!         StoreSpec::new()
//!             .state(StateTree::new().with("num", num.clone()))
//!             .mutator("inc", |state: &StateTree, _: Value| {
//!                 if let Some(num) = state.writable("num") {
//!                     num.update(|v| json!(v.as_i64().unwrap_or(0) + 1));
//!                 }
//!             }),
//!     )
//!     .unwrap();
//!
//! let props = store.map_state(&Selection::keys(["num"]));
//! let mutations = store.map_mutations(&Selection::keys(["inc"]));
//!
//! mutations["inc"].call(Value::Null).unwrap();
//! mutations["inc"].call(Value::Null).unwrap();
//! assert_eq!(props["num"].get(), json!(2));
//! ```

pub mod binder;
pub mod context;
pub mod error;
pub mod getters;
pub mod host;
pub mod reactive;
pub mod registry;
pub mod selector;
pub mod snapshot;
pub mod state;
pub mod store;

pub use binder::{Binder, Bound, CallType, Commit, Dispatch};
pub use context::{Action, ActionResult, Context, Dispatched, IntoValue, Mutator};
pub use error::{Result, StoreError};
pub use getters::{GetterFn, Getters};
pub use host::{wrap_values, Host, Observed, PlainHost, Prop, Props, TrackingHost};
pub use reactive::{
    Derived, Read, ReadScope, ReadSet, Subscribable, Subscription, ViewId, Writable,
};
pub use registry::{InstallOptions, Registry};
pub use selector::{Named, Pick, Selection, Selector, Subset};
pub use snapshot::Snapshot;
pub use state::{StateNode, StateTree};
pub use store::{Selectors, Store, StoreSpec};
