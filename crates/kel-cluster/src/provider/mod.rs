//! Infrastructure providers.
//!
//! A provider turns the infrastructure section of a [`ClusterConfig`] into
//! real machines, networks and load balancers. Providers are selected by
//! [`ProviderKind`] through a [`ProviderRegistry`] when a cluster is
//! constructed.
//!
//! [`ClusterConfig`]: crate::ClusterConfig

mod dry_run;
mod registry;

use std::fmt;
use std::fmt::Debug;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ResourceConfig};
use crate::outputs::DiscoveredOutputs;

pub use dry_run::{DryRunProvider, ProviderCall};
pub use registry::{ProviderConstructor, ProviderRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Gce,
    Aws,
    DryRun,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gce => "gce",
            Self::Aws => "aws",
            Self::DryRun => "dry-run",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gce" => Ok(Self::Gce),
            "aws" => Ok(Self::Aws),
            "dry-run" => Ok(Self::DryRun),
            other => Err(ConfigError::UnknownProvider(other.to_owned())),
        }
    }
}

/// Every remote action a provider can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOperation {
    CreateNetwork,
    DestroyNetwork,
    CreateEtcdCluster,
    DestroyEtcdCluster,
    CreateMasterGroup,
    DestroyMasterGroup,
    CreateNodeGroup,
    DestroyNodeGroup,
    CreateDisk,
    DestroyDisk,
    CreateLoadBalancer,
    DestroyLoadBalancer,
}

impl fmt::Display for ProviderOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateNetwork => "create network",
            Self::DestroyNetwork => "destroy network",
            Self::CreateEtcdCluster => "create etcd cluster",
            Self::DestroyEtcdCluster => "destroy etcd cluster",
            Self::CreateMasterGroup => "create master group",
            Self::DestroyMasterGroup => "destroy master group",
            Self::CreateNodeGroup => "create node group",
            Self::DestroyNodeGroup => "destroy node group",
            Self::CreateDisk => "create disk",
            Self::DestroyDisk => "destroy disk",
            Self::CreateLoadBalancer => "create load balancer",
            Self::DestroyLoadBalancer => "destroy load balancer",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("No provider registered for kind \"{0}\"")]
    Unregistered(ProviderKind),
    #[error("Provider failed to {operation} \"{target}\": {reason}")]
    Operation {
        operation: ProviderOperation,
        target: String,
        reason: String,
    },
}

impl ProviderError {
    pub fn operation(
        operation: ProviderOperation,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Operation {
            operation,
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// What an infrastructure stage can see of the cluster it provisions
#[derive(Debug, Clone, Copy)]
pub struct ProviderContext<'a> {
    pub cluster_name: &'a str,
    pub outputs: &'a DiscoveredOutputs,
}

impl<'a> ProviderContext<'a> {
    pub fn new(cluster_name: &'a str, outputs: &'a DiscoveredOutputs) -> Self {
        Self {
            cluster_name,
            outputs,
        }
    }

    /// Name a provider resource after the cluster it belongs to
    pub fn resource_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.cluster_name, suffix)
    }
}

/// Driver for one cloud or virtualization backend
///
/// Create operations return whatever outputs they discovered, such as the
/// control plane address, and never write into shared configuration.
#[async_trait]
pub trait ProviderDriver: Debug + Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn create_network(
        &self,
        ctx: ProviderContext<'_>,
        config: &ResourceConfig,
    ) -> Result<DiscoveredOutputs, ProviderError>;

    async fn destroy_network(
        &self,
        ctx: ProviderContext<'_>,
        config: &ResourceConfig,
    ) -> Result<(), ProviderError>;

    async fn create_etcd_cluster(
        &self,
        ctx: ProviderContext<'_>,
        config: &ResourceConfig,
    ) -> Result<DiscoveredOutputs, ProviderError>;

    async fn destroy_etcd_cluster(
        &self,
        ctx: ProviderContext<'_>,
        config: &ResourceConfig,
    ) -> Result<(), ProviderError>;

    async fn create_master_group(
        &self,
        ctx: ProviderContext<'_>,
        config: &ResourceConfig,
    ) -> Result<DiscoveredOutputs, ProviderError>;

    async fn destroy_master_group(
        &self,
        ctx: ProviderContext<'_>,
        config: &ResourceConfig,
    ) -> Result<(), ProviderError>;

    async fn create_node_group(
        &self,
        ctx: ProviderContext<'_>,
        name: &str,
        config: &ResourceConfig,
    ) -> Result<DiscoveredOutputs, ProviderError>;

    async fn destroy_node_group(
        &self,
        ctx: ProviderContext<'_>,
        name: &str,
        config: &ResourceConfig,
    ) -> Result<(), ProviderError>;

    async fn create_disk(&self, name: &str, size: u64, disk_type: &str)
    -> Result<(), ProviderError>;

    async fn destroy_disk(&self, name: &str) -> Result<(), ProviderError>;

    /// Returns the address the load balancer ended up with
    async fn create_loadbalancer(
        &self,
        name: &str,
        ports: &[u16],
        ip: Option<&str>,
    ) -> Result<String, ProviderError>;

    async fn destroy_loadbalancer(&self, name: &str) -> Result<(), ProviderError>;
}
