use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ResourceConfig;
use crate::outputs::DiscoveredOutputs;
use crate::pool::WorkerPool;
use crate::provider::{ProviderContext, ProviderDriver, ProviderError};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeGroup<'a> {
    pub name: String,
    pub config: &'a ResourceConfig,
}

/// Every worker node group of a cluster, provisioned together
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNodes<'a> {
    groups: Vec<NodeGroup<'a>>,
}

impl<'a> ClusterNodes<'a> {
    /// Groups are named by their `name` key, falling back to `nodes-<index>`
    pub fn new(configs: &'a [ResourceConfig]) -> Self {
        let groups = configs
            .iter()
            .enumerate()
            .map(|(index, config)| NodeGroup {
                name: config
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("nodes-{index}")),
                config,
            })
            .collect();
        Self { groups }
    }

    pub fn groups(&self) -> &[NodeGroup<'a>] {
        &self.groups
    }

    /// Submits every group to the pool and waits for all of them. Fails with
    /// the first group error once every group has finished.
    #[instrument(skip_all, fields(groups = self.groups.len()))]
    pub async fn create(
        &self,
        driver: &dyn ProviderDriver,
        ctx: ProviderContext<'_>,
        pool: &WorkerPool,
    ) -> Result<DiscoveredOutputs, ProviderError> {
        let discovered = pool
            .run_all(
                self.groups
                    .iter()
                    .map(|group| driver.create_node_group(ctx, &group.name, group.config)),
            )
            .await?;

        let mut outputs = DiscoveredOutputs::default();
        for group_outputs in discovered {
            outputs.merge(group_outputs);
        }
        debug!("all node groups created");
        Ok(outputs)
    }

    #[instrument(skip_all, fields(groups = self.groups.len()))]
    pub async fn destroy(
        &self,
        driver: &dyn ProviderDriver,
        ctx: ProviderContext<'_>,
        pool: &WorkerPool,
    ) -> Result<(), ProviderError> {
        pool.run_all(
            self.groups
                .iter()
                .map(|group| driver.destroy_node_group(ctx, &group.name, group.config)),
        )
        .await?;
        debug!("all node groups destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use crate::provider::{DryRunProvider, ProviderOperation};

    use super::*;

    fn node_configs() -> Vec<ResourceConfig> {
        vec![
            ResourceConfig::from([("name".to_owned(), json!("pool-a"))]),
            ResourceConfig::from([("name".to_owned(), json!("pool-b"))]),
            ResourceConfig::new(),
        ]
    }

    fn control_plane() -> DiscoveredOutputs {
        DiscoveredOutputs::default()
            .with_master_ip("10.240.0.2")
            .with_node_join_token("token")
    }

    #[test]
    fn test_group_names() {
        let configs = node_configs();
        let nodes = ClusterNodes::new(&configs);
        let names: Vec<_> = nodes.groups().iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, vec!["pool-a", "pool-b", "nodes-2"]);
    }

    #[fluvio_future::test]
    async fn test_create_waits_for_every_group() {
        let configs = node_configs();
        let nodes = ClusterNodes::new(&configs);
        let provider = DryRunProvider::default().with_latency(Duration::from_millis(5));
        let outputs = control_plane();

        nodes
            .create(&provider, ProviderContext::new("kel", &outputs), &WorkerPool::new(2))
            .await
            .expect("nodes");

        let mut targets: Vec<_> = provider.calls().into_iter().map(|call| call.target).collect();
        targets.sort();
        assert_eq!(targets, vec!["nodes-2", "pool-a", "pool-b"]);
    }

    #[fluvio_future::test]
    async fn test_one_failing_group_fails_the_stage() {
        let configs = node_configs();
        let nodes = ClusterNodes::new(&configs);
        let provider = DryRunProvider::default()
            .fail_on_target(ProviderOperation::CreateNodeGroup, "pool-a");
        let outputs = control_plane();

        let err = nodes
            .create(&provider, ProviderContext::new("kel", &outputs), &WorkerPool::new(4))
            .await
            .expect_err("pool-a fails");

        assert!(matches!(err, ProviderError::Operation { target, .. } if target == "pool-a"));
        // the sibling groups still ran to completion
        assert_eq!(provider.calls().len(), 2);
    }
}
