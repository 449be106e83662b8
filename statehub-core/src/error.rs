//! Store Errors
//!
//! Every failure in the store is synchronous and surfaces at the call site.
//! Nothing is retried or recovered; construction errors abort the whole
//! store.

use thiserror::Error;

/// Errors raised by store construction and by commit/dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The root of a state tree was missing, a sequence, or not a mapping.
    #[error("expecting a mapping for state")]
    InvalidStateShape,

    /// `commit` was called with a name that has no registered mutator.
    #[error("unknown mutator \"{0}\"")]
    UnknownMutator(String),

    /// `dispatch` was called with a name that has no registered action.
    #[error("unknown action \"{0}\"")]
    UnknownAction(String),

    /// A store was built through a registry before `install` ran.
    #[error("store used before install; call Registry::install first")]
    NotInstalled,

    /// A getter was read by a name with no definition.
    #[error("unknown getter \"{0}\"")]
    UnknownGetter(String),

    /// A getter was read again while its own definition was running.
    #[error("getter \"{0}\" depends on itself")]
    CyclicGetter(String),

    /// A timed commit was scheduled outside a tokio runtime.
    #[error("no tokio runtime to schedule a timed commit on")]
    NoRuntime,
}

/// Result type used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
