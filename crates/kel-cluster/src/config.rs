use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::ProviderKind;

/// Free-form settings handed to a provider for one infrastructure resource
pub type ResourceConfig = BTreeMap<String, Value>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Unable to parse cluster configuration")]
    Parse(#[from] serde_yaml::Error),
    #[error("Layer \"{0}\" is not configured")]
    MissingLayer(String),
    #[error("Manifest \"{manifest}\" is not present in layer \"{layer}\"")]
    MissingManifest { layer: String, manifest: String },
    #[error("Bundle \"{bundle}\" is not present in layer \"{layer}\"")]
    MissingBundle { layer: String, bundle: String },
    #[error("Unknown provider kind \"{0}\"")]
    UnknownProvider(String),
    #[error("Missing required config option {0}")]
    MissingRequiredConfig(String),
}

/// Layered configuration describing a whole cluster
///
/// ```yaml
/// name: prod
/// provider:
///   kind: gce
///   params: { project: kel-prod, region: us-central1 }
/// infrastructure:
///   network: { cidr: 10.240.0.0/16 }
///   etcd: { size: 3 }
///   master: { machine-type: n1-standard-2 }
///   nodes:
///     - { name: default-pool, count: 3 }
/// layers:
///   kel:
///     version: 1.2.0
///     images: { router: quay.io/kelproject/router:1.2.0 }
///     bundles: { router: { url: https://... } }
///     manifests: { router: <base64 jinja template> }
/// resources:
///   router-ip: 203.0.113.10
///   disks:
///     api-database: { size: 100, type: pd-ssd }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    pub name: String,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,
    #[serde(default)]
    pub layers: BTreeMap<String, LayerConfig>,
    #[serde(default)]
    pub resources: PlatformResources,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub params: ResourceConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureConfig {
    #[serde(default)]
    pub network: ResourceConfig,
    #[serde(default)]
    pub etcd: ResourceConfig,
    #[serde(default)]
    pub master: ResourceConfig,
    #[serde(default)]
    pub nodes: Vec<ResourceConfig>,
}

/// One named layer of platform manifests, e.g. `kubernetes` or `kel`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub version: String,
    /// Image overrides keyed by manifest name
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    #[serde(default)]
    pub bundles: BTreeMap<String, Value>,
    /// Base64 encoded manifest templates keyed by manifest name
    #[serde(default)]
    pub manifests: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlatformResources {
    /// Disk definitions keyed by the manifest that mounts them
    #[serde(default)]
    pub disks: BTreeMap<String, DiskConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub size: u64,
    #[serde(rename = "type")]
    pub disk_type: String,
}

impl ClusterConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn layer(&self, layer: &str) -> Result<&LayerConfig, ConfigError> {
        self.layers
            .get(layer)
            .ok_or_else(|| ConfigError::MissingLayer(layer.to_owned()))
    }

    /// The raw, still encoded, template source of a manifest
    pub fn manifest_source(&self, layer: &str, manifest: &str) -> Result<&str, ConfigError> {
        self.layer(layer)?
            .manifests
            .get(manifest)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingManifest {
                layer: layer.to_owned(),
                manifest: manifest.to_owned(),
            })
    }

    pub fn bundle(&self, layer: &str, bundle: &str) -> Result<&Value, ConfigError> {
        self.layer(layer)?
            .bundles
            .get(bundle)
            .ok_or_else(|| ConfigError::MissingBundle {
                layer: layer.to_owned(),
                bundle: bundle.to_owned(),
            })
    }

    pub fn disk(&self, manifest: &str) -> Option<&DiskConfig> {
        self.resources.disks.get(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
name: staging
provider:
  kind: dry-run
  params:
    master-ip: 10.0.0.5
infrastructure:
  etcd:
    size: 3
  nodes:
    - name: default-pool
      count: 2
    - count: 1
layers:
  kel:
    version: 1.2.0
    images:
      router: quay.io/kelproject/router:1.2.0
    bundles:
      router:
        url: https://storage.example.com/router.tgz
    manifests:
      router: a2luZDogU2VydmljZQo=
resources:
  router-ip: 203.0.113.10
  disks:
    api-database:
      size: 100
      type: pd-ssd
    blobstore-data:
      name: blobs
      size: 500
      type: pd-standard
"#;

    #[test]
    fn test_parse_layered_config() {
        let config = ClusterConfig::from_yaml_str(CONFIG).expect("parse");

        assert_eq!(config.name, "staging");
        assert_eq!(config.provider.kind, ProviderKind::DryRun);
        assert_eq!(config.infrastructure.nodes.len(), 2);
        assert_eq!(config.resources.router_ip.as_deref(), Some("203.0.113.10"));
        assert_eq!(config.layer("kel").expect("layer").version, "1.2.0");
        assert_eq!(
            config.manifest_source("kel", "router").expect("manifest"),
            "a2luZDogU2VydmljZQo="
        );

        let disk = config.disk("blobstore-data").expect("disk");
        assert_eq!(disk.name.as_deref(), Some("blobs"));
        assert_eq!(disk.disk_type, "pd-standard");
        assert!(config.disk("api-cache").is_none());
    }

    #[test]
    fn test_missing_entries() {
        let config = ClusterConfig::from_yaml_str(CONFIG).expect("parse");

        assert!(matches!(
            config.layer("kubernetes"),
            Err(ConfigError::MissingLayer(layer)) if layer == "kubernetes"
        ));
        assert!(matches!(
            config.manifest_source("kel", "blobstore"),
            Err(ConfigError::MissingManifest { manifest, .. }) if manifest == "blobstore"
        ));
        assert!(matches!(
            config.bundle("kel", "api"),
            Err(ConfigError::MissingBundle { bundle, .. }) if bundle == "api"
        ));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let yaml = "name: x\nprovider:\n  kind: openstack\n";
        assert!(matches!(
            ClusterConfig::from_yaml_str(yaml),
            Err(ConfigError::Parse(_))
        ));
    }
}
