//! Host Integration
//!
//! The store needs exactly one capability from the UI host: wrap a snapshot
//! so that keyed reads are observed by the host's renderer. This module
//! defines that seam ([`Host`]) and the computed-property shape the host
//! consumes ([`Prop`]).

use std::ops::Deref;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::reactive::{ReadScope, ViewId};
use crate::snapshot::Snapshot;

/// Hook invoked with the view and key of every observed read.
pub type ReadHook = Arc<dyn Fn(ViewId, &str) + Send + Sync>;

/// The host framework's reactivity capability.
pub trait Host: Send + Sync {
    /// Wrap `snapshot` so that reads through it are observed.
    fn observe(&self, snapshot: Snapshot) -> Observed;
}

/// A snapshot whose keyed reads are reported to the host.
///
/// Each observation is a distinct view with its own [`ViewId`]; clones share
/// it.
#[derive(Clone)]
pub struct Observed {
    view: ViewId,
    snapshot: Snapshot,
    on_read: Option<ReadHook>,
}

impl Observed {
    /// Observe `snapshot`, calling `on_read` before every keyed read.
    pub fn new(snapshot: Snapshot, on_read: ReadHook) -> Self {
        Self {
            view: ViewId::new(),
            snapshot,
            on_read: Some(on_read),
        }
    }

    /// Wrap `snapshot` without reporting reads.
    pub fn untracked(snapshot: Snapshot) -> Self {
        Self {
            view: ViewId::new(),
            snapshot,
            on_read: None,
        }
    }

    /// Read the current value at `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(on_read) = &self.on_read {
            on_read(self.view, key);
        }
        self.snapshot.get(key)
    }

    /// This view's identity, as reported to the read hook.
    pub fn view(&self) -> ViewId {
        self.view
    }

    /// Top-level keys of the underlying snapshot.
    pub fn keys(&self) -> Vec<String> {
        self.snapshot.keys()
    }

    /// The underlying snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// Host that records reads into the innermost open [`ReadScope`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackingHost;

impl Host for TrackingHost {
    fn observe(&self, snapshot: Snapshot) -> Observed {
        Observed::new(snapshot, Arc::new(ReadScope::record))
    }
}

/// Host that observes nothing; reads go straight to the snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHost;

impl Host for PlainHost {
    fn observe(&self, snapshot: Snapshot) -> Observed {
        Observed::untracked(snapshot)
    }
}

/// A zero-argument computed accessor, re-read on every call.
#[derive(Clone)]
pub struct Prop {
    read: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl Prop {
    /// Create a prop from any accessor.
    pub fn new<F>(read: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> Value {
        (self.read)()
    }
}

impl std::fmt::Debug for Prop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Prop").field(&self.get()).finish()
    }
}

/// Computed props keyed by name.
///
/// Selecting a name with no prop yields one that reads `null`, so a
/// selection always has the keys it asked for.
#[derive(Clone, Debug, Default)]
pub struct Props {
    props: IndexMap<String, Prop>,
}

impl Props {
    /// The prop for `name`, or a `null` reader if there is none.
    pub fn prop(&self, name: &str) -> Prop {
        self.props
            .get(name)
            .cloned()
            .unwrap_or_else(|| Prop::new(|| Value::Null))
    }
}

impl Deref for Props {
    type Target = IndexMap<String, Prop>;

    fn deref(&self) -> &Self::Target {
        &self.props
    }
}

impl FromIterator<(String, Prop)> for Props {
    fn from_iter<I: IntoIterator<Item = (String, Prop)>>(iter: I) -> Self {
        Self {
            props: iter.into_iter().collect(),
        }
    }
}

/// Wrap every top-level key of `observed` in a [`Prop`].
///
/// A key with no value reads as `null`.
pub fn wrap_values(observed: &Observed) -> Props {
    observed
        .keys()
        .into_iter()
        .map(|key| {
            let observed = observed.clone();
            let name = key.clone();
            let prop = Prop::new(move || observed.get(&name).unwrap_or(Value::Null));
            (key, prop)
        })
        .collect()
}
