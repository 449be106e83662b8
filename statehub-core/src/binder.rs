//! Bound Facades
//!
//! A binder turns a context into a facade of callables with the mutator or
//! action name pre-applied, so `facade.get("inc").call(payload)` behaves
//! exactly like `context.commit("inc", payload)`.
//!
//! Callables are built on each lookup rather than cached. Lookups never fail:
//! a name with no registration still yields a callable, and the error
//! surfaces when it is invoked.

use std::marker::PhantomData;

use serde_json::Value;

use crate::context::{Context, Dispatched};
use crate::error::Result;

/// Which context entry point a binder forwards to.
pub trait CallType: Send + Sync + 'static {
    /// What a call returns.
    type Output;

    /// Forward a call to the context.
    fn invoke(context: &Context, name: &str, payload: Value) -> Result<Self::Output>;

    /// Registered names for this call type, in declaration order.
    fn names(context: &Context) -> Vec<String>;
}

/// Forwards to [`Context::commit`].
#[derive(Debug, Clone, Copy)]
pub struct Commit;

impl CallType for Commit {
    type Output = Value;

    fn invoke(context: &Context, name: &str, payload: Value) -> Result<Value> {
        context.commit(name, payload)
    }

    fn names(context: &Context) -> Vec<String> {
        context.mutator_names()
    }
}

/// Forwards to [`Context::dispatch`].
#[derive(Debug, Clone, Copy)]
pub struct Dispatch;

impl CallType for Dispatch {
    type Output = Dispatched;

    fn invoke(context: &Context, name: &str, payload: Value) -> Result<Dispatched> {
        context.dispatch(name, payload)
    }

    fn names(context: &Context) -> Vec<String> {
        context.action_names()
    }
}

/// A context call with its name pre-bound.
pub struct Bound<C: CallType> {
    context: Context,
    name: String,
    _call: PhantomData<fn() -> C>,
}

impl<C: CallType> Bound<C> {
    /// The bound name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with `payload`.
    pub fn call(&self, payload: Value) -> Result<C::Output> {
        C::invoke(&self.context, &self.name, payload)
    }
}

impl<C: CallType> Clone for Bound<C> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            name: self.name.clone(),
            _call: PhantomData,
        }
    }
}

impl<C: CallType> std::fmt::Debug for Bound<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bound").field("name", &self.name).finish()
    }
}

/// Facade of bound callables over one context.
pub struct Binder<C: CallType> {
    context: Context,
    _call: PhantomData<fn() -> C>,
}

impl<C: CallType> Binder<C> {
    /// Bind `context` for call type `C`.
    pub fn new(context: Context) -> Self {
        Self {
            context,
            _call: PhantomData,
        }
    }

    /// Build the callable for `name`.
    pub fn get(&self, name: &str) -> Bound<C> {
        Bound {
            context: self.context.clone(),
            name: name.to_string(),
            _call: PhantomData,
        }
    }

    /// Names registered for this call type.
    pub fn names(&self) -> Vec<String> {
        C::names(&self.context)
    }
}

impl<C: CallType> Clone for Binder<C> {
    fn clone(&self) -> Self {
        Self::new(self.context.clone())
    }
}
