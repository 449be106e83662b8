//! Writable Implementation
//!
//! A Writable is the built-in subscribable: a value cell that pushes every
//! change to its subscribers.
//!
//! # How Writables Work
//!
//! 1. Subscribing delivers the current value immediately, on the caller's
//!    stack, then keeps the callback registered.
//!
//! 2. `set` and `update` replace the value and notify every subscriber.
//!    Setting an equal value is a no-op.
//!
//! 3. Callbacks run after all locks are dropped, so a callback may read or
//!    write the same writable.
//!
//! # Re-entrant Writes
//!
//! A `set` made from inside a callback does not notify on the spot. Its
//! value is queued, and the outermost `set` finishes delivering the current
//! value to every subscriber before draining the queue. Every subscriber
//! therefore sees changes in the same order and ends on the latest value.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::trace;

use super::subscriber::{Callback, Subscribable, Subscription, SubscriptionId};

type Subscribers = RwLock<Vec<(SubscriptionId, Callback)>>;

/// Values waiting to be delivered.
#[derive(Default)]
struct Pending {
    /// Set while some caller is delivering; other writes only enqueue.
    draining: bool,
    queue: VecDeque<Value>,
}

/// A reactive value cell.
///
/// # Example
///
/// ```rust,ignore
/// let num = Writable::new(json!(0));
///
/// num.update(|v| json!(v.as_i64().unwrap_or(0) + 1));
/// assert_eq!(num.get(), json!(1));
/// ```
#[derive(Clone)]
pub struct Writable {
    /// The current value.
    value: Arc<RwLock<Value>>,

    /// Registered callbacks, in subscription order.
    subscribers: Arc<Subscribers>,

    /// Changes not yet delivered.
    pending: Arc<Mutex<Pending>>,
}

impl Writable {
    /// Create a new writable with the given initial value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: Arc::new(RwLock::new(value.into())),
            subscribers: Arc::new(RwLock::new(Vec::new())),
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> Value {
        self.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        {
            let mut guard = self.value.write();
            if *guard == value {
                return;
            }
            *guard = value.clone();
        }
        self.notify(value);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(next);
    }

    /// Get the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn notify(&self, value: Value) {
        {
            let mut pending = self.pending.lock();
            pending.queue.push_back(value);
            if pending.draining {
                trace!(queued = pending.queue.len(), "write queued behind delivery");
                return;
            }
            pending.draining = true;
        }

        loop {
            let next = {
                let mut pending = self.pending.lock();
                match pending.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        pending.draining = false;
                        return;
                    }
                }
            };

            let callbacks: Vec<Callback> = self
                .subscribers
                .read()
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect();

            trace!(subscribers = callbacks.len(), "writable changed");
            for callback in callbacks {
                callback(next.clone());
            }
        }
    }
}

impl Subscribable for Writable {
    fn subscribe(&self, callback: Callback) -> Subscription {
        let id = SubscriptionId::new();
        self.subscribers.write().push((id, Arc::clone(&callback)));

        callback(self.get());

        let subscribers: Weak<Subscribers> = Arc::downgrade(&self.subscribers);
        Subscription::new(id, move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.write().retain(|(sub_id, _)| *sub_id != id);
            }
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Debug for Writable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writable")
            .field("value", &self.get())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
