//! Infrastructure tier stages, applied in dependency order.

mod nodes;

use std::fmt;

use tracing::info;

use crate::config::ResourceConfig;
use crate::outputs::DiscoveredOutputs;
use crate::pool::WorkerPool;
use crate::provider::{ProviderContext, ProviderDriver, ProviderError};

pub use nodes::{ClusterNodes, NodeGroup};

/// The four infrastructure stages of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InfraComponent {
    Network,
    Etcd,
    Master,
    Nodes,
}

impl InfraComponent {
    pub const CREATE_ORDER: [InfraComponent; 4] = [
        InfraComponent::Network,
        InfraComponent::Etcd,
        InfraComponent::Master,
        InfraComponent::Nodes,
    ];

    pub fn creation_order() -> impl Iterator<Item = InfraComponent> {
        Self::CREATE_ORDER.into_iter()
    }

    pub fn destruction_order() -> impl Iterator<Item = InfraComponent> {
        Self::CREATE_ORDER.into_iter().rev()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Etcd => "etcd",
            Self::Master => "master",
            Self::Nodes => "nodes",
        }
    }
}

impl fmt::Display for InfraComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-backed resource bound to its slice of configuration
#[derive(Debug)]
pub enum InfrastructureResource<'a> {
    Network(&'a ResourceConfig),
    EtcdCluster(&'a ResourceConfig),
    MasterGroup(&'a ResourceConfig),
    Nodes(ClusterNodes<'a>),
}

impl InfrastructureResource<'_> {
    pub fn component(&self) -> InfraComponent {
        match self {
            Self::Network(_) => InfraComponent::Network,
            Self::EtcdCluster(_) => InfraComponent::Etcd,
            Self::MasterGroup(_) => InfraComponent::Master,
            Self::Nodes(_) => InfraComponent::Nodes,
        }
    }

    pub async fn create(
        &self,
        driver: &dyn ProviderDriver,
        ctx: ProviderContext<'_>,
        pool: &WorkerPool,
    ) -> Result<DiscoveredOutputs, ProviderError> {
        let outputs = match self {
            Self::Network(config) => pool.run(driver.create_network(ctx, config)).await?,
            Self::EtcdCluster(config) => pool.run(driver.create_etcd_cluster(ctx, config)).await?,
            Self::MasterGroup(config) => pool.run(driver.create_master_group(ctx, config)).await?,
            Self::Nodes(nodes) => nodes.create(driver, ctx, pool).await?,
        };
        info!(stage = %self.component(), "infrastructure created");
        Ok(outputs)
    }

    pub async fn destroy(
        &self,
        driver: &dyn ProviderDriver,
        ctx: ProviderContext<'_>,
        pool: &WorkerPool,
    ) -> Result<(), ProviderError> {
        match self {
            Self::Network(config) => pool.run(driver.destroy_network(ctx, config)).await?,
            Self::EtcdCluster(config) => pool.run(driver.destroy_etcd_cluster(ctx, config)).await?,
            Self::MasterGroup(config) => pool.run(driver.destroy_master_group(ctx, config)).await?,
            Self::Nodes(nodes) => nodes.destroy(driver, ctx, pool).await?,
        }
        info!(stage = %self.component(), "infrastructure destroyed");
        Ok(())
    }
}
