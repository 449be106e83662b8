//! Live Snapshots
//!
//! A snapshot is a plain value mirror of a state tree, kept current by the
//! subscriptions bound while building it.
//!
//! # How Snapshots Are Built
//!
//! Each entry of the tree is handled by kind:
//!
//! - Static values are copied once and never change.
//! - Nested trees become nested objects, built recursively.
//! - Sources are subscribed; the callback writes the emitted value at the
//!   entry's path. The source's synchronous first emission fills the slot
//!   before `build` returns.
//!
//! Only subscription callbacks write to a snapshot. Callbacks hold a weak
//! reference, so a source outliving its snapshot just stops writing.
//!
//! The snapshot owns its subscription handles. They are released by
//! [`Snapshot::release`] or when the last clone of the snapshot is dropped.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::Result;
use crate::reactive::Subscription;
use crate::state::{StateNode, StateTree};

/// Key path from the snapshot root to one slot.
type Path = SmallVec<[String; 4]>;

struct SnapshotInner {
    /// Always a JSON object at the root.
    values: RwLock<Value>,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// A live, shape-mirroring view of a state tree.
#[derive(Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

impl Snapshot {
    /// Build a snapshot of `root`, subscribing to every source in it.
    ///
    /// Fails with [`StoreError::InvalidStateShape`](crate::StoreError::InvalidStateShape)
    /// unless `root` is a tree.
    pub fn build(root: &StateNode) -> Result<Self> {
        let tree = root.expect_tree()?;

        let inner = Arc::new(SnapshotInner {
            values: RwLock::new(Value::Object(Map::new())),
            subscriptions: Mutex::new(Vec::new()),
        });

        let mut subscriptions = Vec::new();
        bind_tree(&inner, tree, &mut Path::new(), &mut subscriptions);

        debug!(
            keys = tree.len(),
            subscriptions = subscriptions.len(),
            "snapshot built"
        );
        *inner.subscriptions.lock() = subscriptions;

        Ok(Self { inner })
    }

    /// Get the current value at a top-level key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.values.read().get(key).cloned()
    }

    /// Get the current value at a JSON pointer, e.g. `/bar/baz`.
    pub fn pointer(&self, pointer: &str) -> Option<Value> {
        self.inner.values.read().pointer(pointer).cloned()
    }

    /// Get the top-level keys in declaration order.
    pub fn keys(&self) -> Vec<String> {
        match &*self.inner.values.read() {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Copy out the whole snapshot.
    pub fn to_value(&self) -> Value {
        self.inner.values.read().clone()
    }

    /// Number of subscriptions this snapshot still holds.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// Release every subscription. The snapshot keeps its last values.
    pub fn release(&self) {
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.lock());
        debug!(count = subscriptions.len(), "releasing snapshot subscriptions");
        for subscription in subscriptions {
            subscription.release();
        }
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("values", &self.to_value())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

fn bind_tree(
    inner: &Arc<SnapshotInner>,
    tree: &StateTree,
    path: &mut Path,
    subscriptions: &mut Vec<Subscription>,
) {
    for (name, node) in tree.iter() {
        path.push(name.clone());
        match node {
            StateNode::Static(value) => write_at(&inner.values, path.as_slice(), value.clone()),
            StateNode::Tree(nested) => {
                write_at(&inner.values, path.as_slice(), Value::Object(Map::new()));
                bind_tree(inner, nested, path, subscriptions);
            }
            StateNode::Source(source) => {
                let target: Weak<SnapshotInner> = Arc::downgrade(inner);
                let slot = path.clone();
                trace!(path = ?slot, "subscribing");
                let subscription = source.subscribe(Arc::new(move |value| {
                    if let Some(inner) = target.upgrade() {
                        write_at(&inner.values, slot.as_slice(), value);
                    }
                }));
                subscriptions.push(subscription);
            }
        }
        path.pop();
    }
}

/// Write `value` at `path`, creating intermediate objects as needed.
fn write_at(values: &RwLock<Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut guard = values.write();
    let mut cursor = &mut *guard;
    for key in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let Value::Object(map) = cursor else {
            return;
        };
        cursor = map
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if let Value::Object(map) = cursor {
        map.insert(last.clone(), value);
    }
}
