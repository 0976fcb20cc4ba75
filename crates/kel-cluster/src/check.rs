use tracing::{debug, warn};

use crate::component::{Platform, PlatformComponent};
use crate::config::{ClusterConfig, ConfigError};
use crate::error::ClusterError;

/// Allows checks to suggest further action
pub trait CheckSuggestion {
    /// Returns `Some(suggestion)` if there is a suggestion
    /// to give, otherwise returns `None`.
    fn suggestion(&self) -> Option<String> {
        None
    }
}

/// A collection of the successes and failures of running checks
pub type CheckStatuses = Vec<CheckStatus>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// This check has passed and has the given success message
    Pass(String),
    Unrecoverable(UnrecoverableCheckStatus),
}

impl CheckStatus {
    pub(crate) fn pass(msg: impl Into<String>) -> Self {
        Self::Pass(msg.into())
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass(_))
    }
}

/// A configuration problem that would stop a component part way
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UnrecoverableCheckStatus {
    #[error("\"{component}\" needs layer \"{layer}\" which is not configured")]
    MissingLayer { component: String, layer: String },
    #[error("\"{component}\" needs manifest \"{layer}/{manifest}\"")]
    MissingManifest {
        component: String,
        layer: String,
        manifest: String,
    },
    #[error("\"{component}\" needs bundle \"{layer}/{bundle}\"")]
    MissingBundle {
        component: String,
        layer: String,
        bundle: String,
    },
    #[error("\"{component}\" requires disk configuration")]
    MissingDiskConfig { component: String },
}

impl CheckSuggestion for UnrecoverableCheckStatus {
    fn suggestion(&self) -> Option<String> {
        let suggestion = match self {
            Self::MissingLayer { layer, .. } => format!("Add a \"{layer}\" entry under layers"),
            Self::MissingManifest { layer, manifest, .. } => {
                format!("Add \"{manifest}\" to layers.{layer}.manifests")
            }
            Self::MissingBundle { layer, bundle, .. } => {
                format!("Add \"{bundle}\" to layers.{layer}.bundles")
            }
            Self::MissingDiskConfig { component } => {
                format!("Add \"{component}\" to resources.disks")
            }
        };
        Some(suggestion)
    }
}

/// Validates the cluster configuration against a platform before any
/// component is applied
#[derive(Debug, Clone, Copy)]
pub struct PlatformChecker<'a> {
    config: &'a ClusterConfig,
}

impl<'a> PlatformChecker<'a> {
    pub fn new(config: &'a ClusterConfig) -> Self {
        Self { config }
    }

    pub fn check_component(&self, component: &dyn PlatformComponent) -> CheckStatus {
        let name = component.name().to_owned();
        let layer = component.layer();

        if let Err(err) = self.config.manifest_source(layer, component.manifest()) {
            let status = match err {
                ConfigError::MissingLayer(layer) => UnrecoverableCheckStatus::MissingLayer {
                    component: name,
                    layer,
                },
                _ => UnrecoverableCheckStatus::MissingManifest {
                    component: name,
                    layer: layer.to_owned(),
                    manifest: component.manifest().to_owned(),
                },
            };
            return CheckStatus::Unrecoverable(status);
        }

        if let Some(bundle) = component.bundle() {
            if self.config.bundle(layer, bundle).is_err() {
                return CheckStatus::Unrecoverable(UnrecoverableCheckStatus::MissingBundle {
                    component: name,
                    layer: layer.to_owned(),
                    bundle: bundle.to_owned(),
                });
            }
        }

        if component.requires_disk() && self.config.disk(component.manifest()).is_none() {
            return CheckStatus::Unrecoverable(UnrecoverableCheckStatus::MissingDiskConfig {
                component: name,
            });
        }

        CheckStatus::pass(format!("\"{name}\" is fully configured"))
    }

    /// Check every component, failing if any check failed
    pub fn run(&self, platform: &Platform) -> Result<CheckStatuses, ClusterError> {
        let statuses: CheckStatuses = platform
            .iter()
            .map(|component| self.check_component(component))
            .collect();

        let mut failed = false;
        for status in &statuses {
            match status {
                CheckStatus::Pass(msg) => debug!("{msg}"),
                CheckStatus::Unrecoverable(err) => {
                    failed = true;
                    warn!(suggestion = ?err.suggestion(), "{err}");
                }
            }
        }

        if failed {
            return Err(ClusterError::PreflightFailed(statuses));
        }
        Ok(statuses)
    }
}
