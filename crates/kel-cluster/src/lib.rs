//! Functionality for provisioning, upgrading, and tearing down Kel clusters.
//!
//! A Kel cluster is built in two tiers. The infrastructure tier (network,
//! etcd, control plane, worker node groups) is driven through a
//! [`ProviderDriver`], strictly in dependency order. The platform tier
//! (router, blobstore, API database/cache, log pipeline, DNS) is rendered
//! from templated manifests and applied through a [`ClusterApi`] client.
//!
//! Each platform workload is addressed by a short content-addressed
//! [`DeploymentKey`], so an upgrade only happens when the rendered workload
//! or one of the credentials it mounts actually changed.
//!
//! # Example
//!
//! ```no_run
//! use kel_cluster::{Cluster, ClusterConfig, ClusterError, ClusterSettings, ProviderRegistry};
//! # async fn example(yaml: &str) -> Result<(), ClusterError> {
//! let config = ClusterConfig::from_yaml_str(yaml)?;
//! let mut cluster = Cluster::new(
//!     config,
//!     &ProviderRegistry::default(),
//!     ClusterSettings::builder().max_workers(4).build()?,
//! )?;
//! cluster.create().await?;
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod api;
mod check;
mod cluster;
pub mod component;
mod config;
pub mod deployment;
mod error;
pub mod infra;
pub mod manifest;
mod outputs;
pub mod pki;
mod pool;
mod progress;
pub mod provider;
mod render;

#[cfg(test)]
pub(crate) mod fixture;

pub use api::{ClusterApi, MemoryClusterApi, ResourceHandle, ResourceKind};
pub use check::{CheckStatus, CheckStatuses, PlatformChecker, UnrecoverableCheckStatus};
pub use cluster::{Cluster, ClusterSettings, ClusterSettingsBuilder};
pub use component::{
    ComponentManifest, ComponentResource, DeletionPolicy, NamespacedResource, Platform,
    PlatformComponent, PlatformContext, Router, UpgradeOutcome,
};
pub use config::{
    ClusterConfig, ConfigError, DiskConfig, InfrastructureConfig, LayerConfig, PlatformResources,
    ProviderConfig, ResourceConfig,
};
pub use deployment::DeploymentKey;
pub use error::{ClusterError, Operation};
pub use manifest::{JinjaEngine, Materializer, ResolvedDocumentSet, TemplateEngine};
pub use outputs::DiscoveredOutputs;
pub use pool::WorkerPool;
pub use provider::{DryRunProvider, ProviderDriver, ProviderKind, ProviderRegistry};
