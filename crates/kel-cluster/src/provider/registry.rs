use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::{ProviderConfig, ResourceConfig};

use super::{DryRunProvider, ProviderDriver, ProviderError, ProviderKind};

/// Builds a driver from the provider's `params` section
pub type ProviderConstructor =
    Arc<dyn Fn(&ResourceConfig) -> Result<Arc<dyn ProviderDriver>, ProviderError> + Send + Sync>;

/// Maps each [`ProviderKind`] to the constructor for its driver
///
/// The default registry only knows the dry-run driver. Cloud drivers are
/// registered by the binary that links them in.
#[derive(Clone)]
pub struct ProviderRegistry {
    constructors: HashMap<ProviderKind, ProviderConstructor>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::empty().register(ProviderKind::DryRun, |params| {
            Ok(Arc::new(DryRunProvider::from_params(params)) as Arc<dyn ProviderDriver>)
        })
    }
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register<F>(mut self, kind: ProviderKind, constructor: F) -> Self
    where
        F: Fn(&ResourceConfig) -> Result<Arc<dyn ProviderDriver>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(kind, Arc::new(constructor));
        self
    }

    pub fn is_registered(&self, kind: ProviderKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    pub fn resolve(&self, config: &ProviderConfig) -> Result<Arc<dyn ProviderDriver>, ProviderError> {
        let constructor = self
            .constructors
            .get(&config.kind)
            .ok_or(ProviderError::Unregistered(config.kind))?;
        debug!(kind = %config.kind, "resolving provider driver");
        constructor(&config.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config(kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            kind,
            params: ResourceConfig::new(),
        }
    }

    #[test]
    fn test_default_registry_resolves_dry_run() {
        let registry = ProviderRegistry::default();
        let driver = registry
            .resolve(&provider_config(ProviderKind::DryRun))
            .expect("dry run driver");
        assert_eq!(driver.kind(), ProviderKind::DryRun);
    }

    #[test]
    fn test_unregistered_kind() {
        let registry = ProviderRegistry::default();
        assert!(!registry.is_registered(ProviderKind::Gce));
        assert!(matches!(
            registry.resolve(&provider_config(ProviderKind::Gce)),
            Err(ProviderError::Unregistered(ProviderKind::Gce))
        ));
    }

    #[test]
    fn test_registered_constructor_is_used() {
        let shared = Arc::new(DryRunProvider::default());
        let registered = shared.clone();
        let registry = ProviderRegistry::empty().register(ProviderKind::Aws, move |_| {
            Ok(registered.clone() as Arc<dyn ProviderDriver>)
        });

        let driver = registry
            .resolve(&provider_config(ProviderKind::Aws))
            .expect("aws driver");
        assert_eq!(Arc::strong_count(&shared), 3);
        assert_eq!(driver.kind(), ProviderKind::DryRun);
    }
}
