//! Selectors
//!
//! A selector maps a full named-value set down to the subset a caller asks
//! for. The same selector shape serves state, getters, mutators, and
//! actions.
//!
//! A request is either:
//!
//! - a list of names, giving a subset keyed by those names, or
//! - a map from output key to a [`Pick`]: a source name to copy (rename),
//!   or a function computed over the whole target.
//!
//! Names missing from a map target are left out of the subset. Prop
//! targets keep the key and hand back a prop that reads `null`.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::binder::{Binder, Bound, CallType};
use crate::host::{Prop, Props};

/// A target a selector can pick from.
pub trait Named: 'static {
    /// What a lookup yields.
    type Item: Clone;

    /// Look up `name`.
    fn lookup(&self, name: &str) -> Option<Self::Item>;
}

impl<T: Clone + 'static> Named for IndexMap<String, T> {
    type Item = T;

    fn lookup(&self, name: &str) -> Option<T> {
        self.get(name).cloned()
    }
}

impl Named for Props {
    type Item = Prop;

    fn lookup(&self, name: &str) -> Option<Prop> {
        Some(self.prop(name))
    }
}

/// Bound facades resolve any name; unknown ones fail when called.
impl<C: CallType> Named for Binder<C> {
    type Item = Bound<C>;

    fn lookup(&self, name: &str) -> Option<Bound<C>> {
        Some(self.get(name))
    }
}

/// Function computing one output entry from the whole target.
pub type ComputeFn<S> = Arc<dyn Fn(&S) -> <S as Named>::Item + Send + Sync>;

/// How one output entry of a map request is produced.
pub enum Pick<S: Named> {
    /// Copy the target's entry with this name.
    Key(String),

    /// Compute the entry from the entire target.
    Compute(ComputeFn<S>),
}

impl<S: Named> Clone for Pick<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Key(name) => Self::Key(name.clone()),
            Self::Compute(f) => Self::Compute(Arc::clone(f)),
        }
    }
}

/// A selector request.
pub enum Selection<S: Named> {
    /// Select these names as-is.
    Keys(Vec<String>),

    /// Produce each output key from its pick.
    Map(IndexMap<String, Pick<S>>),
}

impl<S: Named> Selection<S> {
    /// Request a list of names.
    pub fn keys<I, K>(names: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::Keys(names.into_iter().map(Into::into).collect())
    }

    /// Start an empty map request.
    pub fn map() -> Self {
        Self::Map(IndexMap::new())
    }

    /// Add `key`, copied from the target's `from` entry.
    pub fn rename(self, key: impl Into<String>, from: impl Into<String>) -> Self {
        self.with_pick(key.into(), Pick::Key(from.into()))
    }

    /// Add `key`, computed from the whole target.
    pub fn compute<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&S) -> S::Item + Send + Sync + 'static,
    {
        self.with_pick(key.into(), Pick::Compute(Arc::new(f)))
    }

    /// Read a request from JSON.
    ///
    /// Arrays select their string elements. Objects rename through their
    /// string values. Anything else, including non-string entries, is
    /// skipped, so a payload that is neither selects nothing.
    pub fn from_json(payload: &Value) -> Self {
        match payload {
            Value::Array(names) => {
                Self::keys(names.iter().filter_map(Value::as_str))
            }
            Value::Object(entries) => Self::Map(
                entries
                    .iter()
                    .filter_map(|(key, from)| {
                        from.as_str()
                            .map(|from| (key.clone(), Pick::Key(from.to_string())))
                    })
                    .collect(),
            ),
            _ => Self::map(),
        }
    }

    fn with_pick(self, key: String, pick: Pick<S>) -> Self {
        let mut picks = match self {
            Self::Map(picks) => picks,
            Self::Keys(names) => names
                .into_iter()
                .map(|name| (name.clone(), Pick::Key(name)))
                .collect(),
        };
        picks.insert(key, pick);
        Self::Map(picks)
    }
}

impl<S: Named> Clone for Selection<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Keys(names) => Self::Keys(names.clone()),
            Self::Map(picks) => Self::Map(picks.clone()),
        }
    }
}

/// Output of a selection.
pub type Subset<S> = IndexMap<String, <S as Named>::Item>;

/// Maps a fixed target to requested subsets.
pub struct Selector<S: Named> {
    target: Arc<S>,
}

impl<S: Named> Selector<S> {
    /// Create a selector over `target`.
    pub fn new(target: S) -> Self {
        Self {
            target: Arc::new(target),
        }
    }

    /// The full target.
    pub fn target(&self) -> &S {
        &self.target
    }

    /// Produce the subset `selection` asks for. Pure in target and request.
    pub fn select(&self, selection: &Selection<S>) -> Subset<S> {
        match selection {
            Selection::Keys(names) => names
                .iter()
                .filter_map(|name| Some((name.clone(), self.target.lookup(name)?)))
                .collect(),
            Selection::Map(picks) => picks
                .iter()
                .filter_map(|(key, pick)| {
                    let item = match pick {
                        Pick::Key(from) => self.target.lookup(from)?,
                        Pick::Compute(f) => f(self.target.as_ref()),
                    };
                    Some((key.clone(), item))
                })
                .collect(),
        }
    }
}

impl<S: Named> Clone for Selector<S> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
        }
    }
}
