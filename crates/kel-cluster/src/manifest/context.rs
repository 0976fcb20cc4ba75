use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{ClusterConfig, ConfigError};

/// Variables handed to the template engine when a manifest is rendered
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ManifestContext(Map<String, Value>);

impl ManifestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Parameters only workload components contribute to their context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadParams<'a> {
    pub replicas: u32,
    pub bundle: Option<&'a str>,
}

/// Builds the variables for one manifest from the layered configuration
#[derive(Debug, Clone, Copy)]
pub struct ManifestContextResolver<'a> {
    config: &'a ClusterConfig,
}

impl<'a> ManifestContextResolver<'a> {
    pub fn new(config: &'a ClusterConfig) -> Self {
        Self { config }
    }

    /// Start from the caller's variables, then add the layer's image
    /// override for this manifest. Workloads additionally get `version`
    /// (dots replaced by dashes so it fits an object name), `replicas`, and
    /// the configured `bundle` when they name one.
    pub fn resolve(
        &self,
        layer: &str,
        manifest: &str,
        base: ManifestContext,
        workload: Option<WorkloadParams<'_>>,
    ) -> Result<ManifestContext, ConfigError> {
        let layer_config = self.config.layer(layer)?;
        let mut ctx = base;

        if let Some(image) = layer_config.images.get(manifest) {
            ctx.insert("image", image.clone());
        }

        if let Some(workload) = workload {
            ctx.insert("version", layer_config.version.replace('.', "-"));
            ctx.insert("replicas", workload.replicas);
            if let Some(bundle) = workload.bundle {
                ctx.insert("bundle", self.config.bundle(layer, bundle)?.clone());
            }
        }

        Ok(ctx)
    }
}
