//! Derived Implementation
//!
//! A Derived maps every value of an upstream subscribable through a pure
//! function. It holds no value of its own; each subscription is a
//! subscription to the upstream source.

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use super::subscriber::{Callback, Subscribable, Subscription};

/// A subscribable whose values are computed from another subscribable.
///
/// # Example
///
/// ```rust,ignore
/// let num = Writable::new(json!(3));
/// let is_even = Derived::new(Arc::new(num.clone()), |v| json!(v.as_i64() == Some(0)));
/// ```
#[derive(Clone)]
pub struct Derived {
    source: Arc<dyn Subscribable>,
    map: Arc<dyn Fn(&Value) -> Value + Send + Sync>,
}

impl Derived {
    /// Create a derived source over `source`.
    pub fn new<F>(source: Arc<dyn Subscribable>, map: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self {
            source,
            map: Arc::new(map),
        }
    }
}

impl Subscribable for Derived {
    fn subscribe(&self, callback: Callback) -> Subscription {
        let map = Arc::clone(&self.map);
        self.source
            .subscribe(Arc::new(move |value| callback(map(&value))))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for Derived {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derived").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Writable;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn derived_maps_upstream_values() {
        let num = Writable::new(3);
        let is_even = Derived::new(Arc::new(num.clone()), |v| {
            json!(v.as_i64().unwrap_or(0) % 2 == 0)
        });

        let last = Arc::new(Mutex::new(Value::Null));
        let last_clone = last.clone();
        let _sub = is_even.subscribe(Arc::new(move |v| *last_clone.lock() = v));

        assert_eq!(*last.lock(), json!(false));

        num.set(4);
        assert_eq!(*last.lock(), json!(true));
    }

    #[test]
    fn derived_chains() {
        let num = Writable::new(2);
        let is_even = Derived::new(Arc::new(num.clone()), |v| {
            json!(v.as_i64().unwrap_or(0) % 2 == 0)
        });
        let is_odd = Derived::new(Arc::new(is_even), |v| json!(!v.as_bool().unwrap_or(false)));

        let last = Arc::new(Mutex::new(Value::Null));
        let last_clone = last.clone();
        let _sub = is_odd.subscribe(Arc::new(move |v| *last_clone.lock() = v));

        assert_eq!(*last.lock(), json!(false));
        num.set(5);
        assert_eq!(*last.lock(), json!(true));
    }

    #[test]
    fn releasing_derived_releases_upstream() {
        let num = Writable::new(0);
        let doubled = Derived::new(Arc::new(num.clone()), |v| json!(v.as_i64().unwrap_or(0) * 2));

        let sub = doubled.subscribe(Arc::new(|_| {}));
        assert_eq!(num.subscriber_count(), 1);

        sub.release();
        assert_eq!(num.subscriber_count(), 0);
    }
}
