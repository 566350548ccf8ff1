//! Backend identity and plugin lookup
//!
//! The set of backends is closed: dispatch goes through the [`Backend`]
//! tag rather than string comparison, and [`BackendRegistry`] maps tags
//! to plugin factories so callers can construct plugins for a network
//! without naming concrete types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rxd_core::ReactionNetwork;

use crate::gillespie::GillespieEngine;
use crate::ode::{OdeMethod, OdePlugin};
use crate::embedded::EmbeddedPlugin;
use crate::plugin::SimulatorPlugin;

/// Tag identifying one of the supported simulation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Backend {
    /// In-process deterministic ODE integration
    Ode,
    /// SPiM process-calculus interpreter, run as a subprocess
    Spim,
    /// StochKit2 batch simulator, run as a subprocess
    StochKit2,
    /// In-process embedded stochastic engine
    Embedded,
}

impl Backend {
    /// All backends, in a stable order
    pub fn all() -> [Backend; 4] {
        [Self::Ode, Self::Spim, Self::StochKit2, Self::Embedded]
    }

    /// Stable lowercase name used in logs and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ode => "ode",
            Self::Spim => "spim",
            Self::StochKit2 => "stochkit2",
            Self::Embedded => "embedded",
        }
    }

    /// Parse a backend name as produced by [`Backend::name`]
    pub fn from_name(name: &str) -> Option<Backend> {
        Self::all().into_iter().find(|b| b.name() == name)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Factory producing a plugin bound to a network
pub type PluginFactory =
    Box<dyn Fn(Arc<ReactionNetwork>) -> Box<dyn SimulatorPlugin> + Send + Sync>;

/// Maps backend tags to plugin factories.
///
/// The default registry covers the in-process backends; the subprocess
/// backends need executable paths and are registered by the caller once
/// those are known.
pub struct BackendRegistry {
    factories: BTreeMap<Backend, PluginFactory>,
}

impl BackendRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the in-process backends pre-registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            Backend::Ode,
            Box::new(|network| Box::new(OdePlugin::new(network, OdeMethod::Fehlberg45))),
        );
        registry.register(
            Backend::Embedded,
            Box::new(|network| {
                Box::new(EmbeddedPlugin::new(network, GillespieEngine::from_entropy()))
            }),
        );
        registry
    }

    /// Register or replace the factory for a backend
    pub fn register(&mut self, backend: Backend, factory: PluginFactory) {
        if self.factories.insert(backend, factory).is_some() {
            log::debug!("replacing plugin factory for backend {}", backend);
        }
    }

    /// Construct a plugin for `backend` bound to `network`
    pub fn create(
        &self,
        backend: Backend,
        network: Arc<ReactionNetwork>,
    ) -> Option<Box<dyn SimulatorPlugin>> {
        self.factories.get(&backend).map(|factory| factory(network))
    }

    /// Backends currently registered, in stable order
    pub fn registered(&self) -> impl Iterator<Item = Backend> + '_ {
        self.factories.keys().copied()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names_round_trip() {
        for backend in Backend::all() {
            assert_eq!(Backend::from_name(backend.name()), Some(backend));
        }
        assert_eq!(Backend::from_name("fortran"), None);
    }

    #[test]
    fn test_default_registry_covers_in_process_backends() {
        let registry = BackendRegistry::with_defaults();
        let registered: Vec<Backend> = registry.registered().collect();
        assert_eq!(registered, vec![Backend::Ode, Backend::Embedded]);

        let network = Arc::new(
            ReactionNetwork::from_reactions(&["A -> B"]).expect("valid network"),
        );
        let plugin = registry
            .create(Backend::Ode, network.clone())
            .expect("ode factory registered");
        assert_eq!(plugin.backend(), Backend::Ode);
        assert!(registry.create(Backend::Spim, network).is_none());
    }
}
