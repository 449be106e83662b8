//! State Trees
//!
//! A state tree maps names to static values, subscribable sources, or nested
//! trees. It is the raw state a store is built from: snapshots mirror it,
//! getters read it, and mutators write through the sources it holds.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::reactive::{Derived, Subscribable, Writable};

/// One entry of a state tree.
#[derive(Clone)]
pub enum StateNode {
    /// A plain value, copied into snapshots as-is and never updated.
    Static(Value),

    /// A push-based source; snapshots follow every value it emits.
    Source(Arc<dyn Subscribable>),

    /// A nested tree, mirrored by a nested snapshot.
    Tree(StateTree),
}

impl StateNode {
    /// Wrap a subscribable source.
    pub fn source(source: impl Subscribable) -> Self {
        Self::Source(Arc::new(source))
    }

    /// Get the static value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Static(value) => Some(value),
            _ => None,
        }
    }

    /// Get the source handle, if this is one.
    pub fn as_source(&self) -> Option<Arc<dyn Subscribable>> {
        match self {
            Self::Source(source) => Some(Arc::clone(source)),
            _ => None,
        }
    }

    /// Get the nested tree, if this is one.
    pub fn as_tree(&self) -> Option<&StateTree> {
        match self {
            Self::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Get the nested tree, failing with [`StoreError::InvalidStateShape`]
    /// for anything that is not a mapping.
    pub fn expect_tree(&self) -> Result<&StateTree> {
        self.as_tree().ok_or(StoreError::InvalidStateShape)
    }
}

impl Default for StateNode {
    fn default() -> Self {
        Self::Tree(StateTree::new())
    }
}

/// JSON objects become trees; everything else, arrays and null included, is static.
impl From<Value> for StateNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Tree(
                map.into_iter()
                    .map(|(name, value)| (name, StateNode::from(value)))
                    .collect(),
            ),
            other => Self::Static(other),
        }
    }
}

impl From<Writable> for StateNode {
    fn from(writable: Writable) -> Self {
        Self::source(writable)
    }
}

impl From<Derived> for StateNode {
    fn from(derived: Derived) -> Self {
        Self::source(derived)
    }
}

impl From<StateTree> for StateNode {
    fn from(tree: StateTree) -> Self {
        Self::Tree(tree)
    }
}

impl std::fmt::Debug for StateNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Source(_) => f.write_str("Source(..)"),
            Self::Tree(tree) => f.debug_tuple("Tree").field(tree).finish(),
        }
    }
}

/// An ordered mapping from names to state nodes.
#[derive(Clone, Debug, Default)]
pub struct StateTree {
    entries: IndexMap<String, StateNode>,
}

impl StateTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, builder style.
    pub fn with(mut self, name: impl Into<String>, node: impl Into<StateNode>) -> Self {
        self.insert(name, node);
        self
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, node: impl Into<StateNode>) {
        self.entries.insert(name.into(), node.into());
    }

    /// Get an entry.
    pub fn get(&self, name: &str) -> Option<&StateNode> {
        self.entries.get(name)
    }

    /// Get the subscribable source stored at `name`.
    pub fn source(&self, name: &str) -> Option<Arc<dyn Subscribable>> {
        self.get(name).and_then(StateNode::as_source)
    }

    /// Get the [`Writable`] stored at `name`.
    pub fn writable(&self, name: &str) -> Option<&Writable> {
        match self.get(name)? {
            StateNode::Source(source) => source.as_any().downcast_ref::<Writable>(),
            _ => None,
        }
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StateNode)> {
        self.entries.iter()
    }

    /// Get the entry names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, StateNode)> for StateTree {
    fn from_iter<I: IntoIterator<Item = (String, StateNode)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl TryFrom<Value> for StateTree {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self> {
        match StateNode::from(value) {
            StateNode::Tree(tree) => Ok(tree),
            _ => Err(StoreError::InvalidStateShape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_become_trees() {
        let node = StateNode::from(json!({ "a": 1, "b": { "c": [1, 2] } }));
        let tree = node.as_tree().unwrap();

        assert_eq!(tree.names(), vec!["a", "b"]);
        assert_eq!(tree.get("a").and_then(StateNode::as_value), Some(&json!(1)));

        let nested = tree.get("b").and_then(StateNode::as_tree).unwrap();
        assert_eq!(nested.get("c").and_then(StateNode::as_value), Some(&json!([1, 2])));
    }

    #[test]
    fn arrays_and_null_are_not_trees() {
        assert_eq!(
            StateTree::try_from(json!([1, 2])).unwrap_err(),
            StoreError::InvalidStateShape
        );
        assert_eq!(
            StateTree::try_from(Value::Null).unwrap_err(),
            StoreError::InvalidStateShape
        );
        assert!(StateNode::from(json!("x")).expect_tree().is_err());
    }

    #[test]
    fn writable_lookup_downcasts() {
        let num = Writable::new(1);
        let tree = StateTree::new().with("num", num.clone()).with("label", json!("x"));

        tree.writable("num").unwrap().set(5);
        assert_eq!(num.get(), json!(5));

        assert!(tree.writable("label").is_none());
        assert!(tree.writable("missing").is_none());
        assert!(tree.source("num").is_some());
    }
}
