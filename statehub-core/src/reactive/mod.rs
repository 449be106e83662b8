//! Reactive Sources
//!
//! This module implements the push-based value sources a store is built
//! from, and the read tracking hosts use to observe snapshots.
//!
//! # Concepts
//!
//! ## Subscribables
//!
//! A subscribable is anything that accepts a callback and pushes values into
//! it: once immediately, with the current value, and again on every change.
//! Binding returns a [`Subscription`] handle that detaches the callback.
//!
//! ## Writables
//!
//! A [`Writable`] is the built-in mutable source. Mutators usually reach the
//! writables in the raw state tree and `set`/`update` them; the change then
//! flows into every snapshot bound to it.
//!
//! ## Derived sources
//!
//! A [`Derived`] maps an upstream source through a pure function. Getters
//! return these so their values keep following state even though the getter
//! function itself runs only once.
//!
//! ## Read tracking
//!
//! A [`ReadScope`] collects the keyed reads a render makes through observed
//! views. A tracking host records every read into the innermost open scope.

mod subscriber;
mod writable;
mod derived;
mod tracking;

pub use subscriber::{Callback, Subscribable, Subscription, SubscriptionId};
pub use writable::Writable;
pub use derived::Derived;
pub use tracking::{Read, ReadScope, ReadSet, ViewId};
