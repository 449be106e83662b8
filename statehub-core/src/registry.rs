//! Install Registry
//!
//! Stores need a host before they can be built. A [`Registry`] holds that
//! host once `install` has run, builds stores against it, and publishes each
//! built store's context under a property name (`$store` by default) that
//! host components can look up.
//!
//! The registry is owned by the caller. There is no process-wide instance;
//! an application that wants one shares a registry the way it shares any
//! other handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::context::Context;
use crate::error::{Result, StoreError};
use crate::host::Host;
use crate::store::{Store, StoreSpec};

/// Install-time options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstallOptions {
    /// Property name, without the `$` prefix.
    pub name: String,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
        }
    }
}

impl InstallOptions {
    /// Options publishing under `$<name>`.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The published property name.
    pub fn property_name(&self) -> String {
        format!("${}", self.name)
    }
}

/// What `install` bound.
struct Installed {
    host: Arc<dyn Host>,
    options: InstallOptions,
}

/// Host binding plus published contexts.
#[derive(Default)]
pub struct Registry {
    /// Host and options change together.
    installed: RwLock<Option<Installed>>,
    published: RwLock<HashMap<String, Context>>,
}

impl Registry {
    /// Create a registry with no host installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `host`. Installing again replaces the host and options; contexts
    /// already published stay under their old property.
    pub fn install(&self, host: Arc<dyn Host>, options: InstallOptions) {
        debug!(property = %options.property_name(), "installing host");
        *self.installed.write() = Some(Installed { host, options });
    }

    /// Check whether a host is installed.
    pub fn is_installed(&self) -> bool {
        self.installed.read().is_some()
    }

    /// The property stores are published under. Before install, or after
    /// teardown, this is the default `$store`.
    pub fn property_name(&self) -> String {
        match &*self.installed.read() {
            Some(installed) => installed.options.property_name(),
            None => InstallOptions::default().property_name(),
        }
    }

    /// Build a store against the installed host and publish its context.
    ///
    /// Fails with [`StoreError::NotInstalled`] before [`Registry::install`].
    pub fn store(&self, spec: StoreSpec) -> Result<Store> {
        let (host, property) = match &*self.installed.read() {
            Some(installed) => (
                Arc::clone(&installed.host),
                installed.options.property_name(),
            ),
            None => return Err(StoreError::NotInstalled),
        };

        let store = Store::build(spec, host.as_ref())?;

        debug!(property = %property, "publishing store context");
        self.published
            .write()
            .insert(property, store.context().clone());

        Ok(store)
    }

    /// Get the context published under `property`, e.g. `"$store"`.
    pub fn lookup(&self, property: &str) -> Option<Context> {
        self.published.read().get(property).cloned()
    }

    /// Forget the host and every published context.
    pub fn teardown(&self) {
        debug!("tearing down registry");
        self.installed.write().take();
        self.published.write().clear();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("installed", &self.is_installed())
            .field("property", &self.property_name())
            .field("published", &self.published.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
