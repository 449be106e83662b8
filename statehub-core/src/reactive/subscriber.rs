//! Subscription types for the reactive sources.
//!
//! A subscribable pushes values into callbacks. Binding a callback returns a
//! [`Subscription`] handle which detaches the callback when released.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

/// Callback invoked with every value a subscribable emits.
pub type Callback = Arc<dyn Fn(Value) + Send + Sync>;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A push-based value source.
///
/// Contract: `subscribe` must deliver the current value to `callback`
/// synchronously, before returning, and again on every later change until
/// the returned handle is released.
pub trait Subscribable: Send + Sync + 'static {
    /// Bind a callback and receive the handle that detaches it.
    fn subscribe(&self, callback: Callback) -> Subscription;

    /// Access the concrete source, e.g. to reach a [`Writable`](super::Writable).
    fn as_any(&self) -> &dyn Any;
}

/// Handle to a bound callback.
///
/// Dropping the handle releases the subscription.
pub struct Subscription {
    id: SubscriptionId,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a handle that runs `release` exactly once when released.
    pub fn new<F>(id: SubscriptionId, release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to detach, for sources that emit once and never again.
    pub fn detached(id: SubscriptionId) -> Self {
        Self { id, release: None }
    }

    /// Get the subscription's ID.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Detach the callback from its source.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.release.is_some())
            .finish()
    }
}
