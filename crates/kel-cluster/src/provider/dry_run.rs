use std::time::Duration;

use async_trait::async_trait;
use fluvio_future::timer::sleep;
use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ResourceConfig;
use crate::outputs::DiscoveredOutputs;

use super::{ProviderContext, ProviderDriver, ProviderError, ProviderKind, ProviderOperation};

pub const DEFAULT_MASTER_IP: &str = "10.240.0.2";
pub const DEFAULT_LOADBALANCER_IP: &str = "203.0.113.1";
const DEFAULT_ETCD_SIZE: u64 = 3;
const JOIN_TOKEN_LENGTH: usize = 32;

/// One completed call against the dry-run provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub operation: ProviderOperation,
    pub target: String,
}

impl ProviderCall {
    pub fn new(operation: ProviderOperation, target: impl Into<String>) -> Self {
        Self {
            operation,
            target: target.into(),
        }
    }
}

/// Provider that provisions nothing and records what it was asked to do
///
/// Used for `provider.kind: dry-run` and throughout the tests. Failures can
/// be injected per operation, optionally narrowed to a single target.
#[derive(Debug, Default)]
pub struct DryRunProvider {
    master_ip: Option<String>,
    latency: Option<Duration>,
    failures: Vec<(ProviderOperation, Option<String>)>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl DryRunProvider {
    /// Reads `master-ip` and `latency-ms` from the provider params
    pub fn from_params(params: &ResourceConfig) -> Self {
        let mut provider = Self::default();
        if let Some(ip) = params.get("master-ip").and_then(Value::as_str) {
            provider.master_ip = Some(ip.to_owned());
        }
        if let Some(millis) = params.get("latency-ms").and_then(Value::as_u64) {
            provider.latency = Some(Duration::from_millis(millis));
        }
        provider
    }

    pub fn with_master_ip(mut self, ip: impl Into<String>) -> Self {
        self.master_ip = Some(ip.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_on(mut self, operation: ProviderOperation) -> Self {
        self.failures.push((operation, None));
        self
    }

    pub fn fail_on_target(mut self, operation: ProviderOperation, target: impl Into<String>) -> Self {
        self.failures.push((operation, Some(target.into())));
        self
    }

    /// Calls completed so far, in completion order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    pub fn operations(&self) -> Vec<ProviderOperation> {
        self.calls.lock().iter().map(|call| call.operation).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn should_fail(&self, operation: ProviderOperation, target: &str) -> bool {
        self.failures.iter().any(|(failing, failing_target)| {
            *failing == operation
                && failing_target
                    .as_deref()
                    .is_none_or(|failing_target| failing_target == target)
        })
    }

    async fn record(&self, operation: ProviderOperation, target: &str) -> Result<(), ProviderError> {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
        if self.should_fail(operation, target) {
            warn!(%operation, target, "dry run failure injected");
            return Err(ProviderError::operation(operation, target, "injected failure"));
        }
        debug!(%operation, target, "dry run");
        self.calls.lock().push(ProviderCall::new(operation, target));
        Ok(())
    }
}

#[async_trait]
impl ProviderDriver for DryRunProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DryRun
    }

    async fn create_network(
        &self,
        ctx: ProviderContext<'_>,
        _config: &ResourceConfig,
    ) -> Result<DiscoveredOutputs, ProviderError> {
        self.record(ProviderOperation::CreateNetwork, &ctx.resource_name("network"))
            .await?;
        Ok(DiscoveredOutputs::default())
    }

    async fn destroy_network(
        &self,
        ctx: ProviderContext<'_>,
        _config: &ResourceConfig,
    ) -> Result<(), ProviderError> {
        self.record(ProviderOperation::DestroyNetwork, &ctx.resource_name("network"))
            .await
    }

    async fn create_etcd_cluster(
        &self,
        ctx: ProviderContext<'_>,
        config: &ResourceConfig,
    ) -> Result<DiscoveredOutputs, ProviderError> {
        self.record(ProviderOperation::CreateEtcdCluster, &ctx.resource_name("etcd"))
            .await?;
        let size = config
            .get("size")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_ETCD_SIZE);
        let endpoints = (0..size)
            .map(|index| format!("http://{}:2379", ctx.resource_name(&format!("etcd-{index}"))))
            .collect();
        Ok(DiscoveredOutputs::default().with_etcd_endpoints(endpoints))
    }

    async fn destroy_etcd_cluster(
        &self,
        ctx: ProviderContext<'_>,
        _config: &ResourceConfig,
    ) -> Result<(), ProviderError> {
        self.record(ProviderOperation::DestroyEtcdCluster, &ctx.resource_name("etcd"))
            .await
    }

    async fn create_master_group(
        &self,
        ctx: ProviderContext<'_>,
        config: &ResourceConfig,
    ) -> Result<DiscoveredOutputs, ProviderError> {
        let name = ctx.resource_name("master");
        if ctx.outputs.etcd_endpoints.is_empty() {
            return Err(ProviderError::operation(
                ProviderOperation::CreateMasterGroup,
                name,
                "etcd endpoints have not been discovered",
            ));
        }
        self.record(ProviderOperation::CreateMasterGroup, &name).await?;

        let master_ip = self
            .master_ip
            .clone()
            .or_else(|| config.get("ip").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_else(|| DEFAULT_MASTER_IP.to_owned());
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(JOIN_TOKEN_LENGTH)
            .map(char::from)
            .collect();

        Ok(DiscoveredOutputs::default()
            .with_master_ip(master_ip)
            .with_node_join_token(token))
    }

    async fn destroy_master_group(
        &self,
        ctx: ProviderContext<'_>,
        _config: &ResourceConfig,
    ) -> Result<(), ProviderError> {
        self.record(ProviderOperation::DestroyMasterGroup, &ctx.resource_name("master"))
            .await
    }

    async fn create_node_group(
        &self,
        ctx: ProviderContext<'_>,
        name: &str,
        _config: &ResourceConfig,
    ) -> Result<DiscoveredOutputs, ProviderError> {
        if ctx.outputs.master_ip.is_none() || ctx.outputs.node_join_token.is_none() {
            return Err(ProviderError::operation(
                ProviderOperation::CreateNodeGroup,
                name,
                "control plane address has not been discovered",
            ));
        }
        self.record(ProviderOperation::CreateNodeGroup, name).await?;
        Ok(DiscoveredOutputs::default())
    }

    async fn destroy_node_group(
        &self,
        _ctx: ProviderContext<'_>,
        name: &str,
        _config: &ResourceConfig,
    ) -> Result<(), ProviderError> {
        self.record(ProviderOperation::DestroyNodeGroup, name).await
    }

    async fn create_disk(
        &self,
        name: &str,
        size: u64,
        disk_type: &str,
    ) -> Result<(), ProviderError> {
        debug!(size, disk_type, "dry run disk");
        self.record(ProviderOperation::CreateDisk, name).await
    }

    async fn destroy_disk(&self, name: &str) -> Result<(), ProviderError> {
        self.record(ProviderOperation::DestroyDisk, name).await
    }

    async fn create_loadbalancer(
        &self,
        name: &str,
        ports: &[u16],
        ip: Option<&str>,
    ) -> Result<String, ProviderError> {
        debug!(?ports, "dry run load balancer");
        self.record(ProviderOperation::CreateLoadBalancer, name).await?;
        Ok(ip.unwrap_or(DEFAULT_LOADBALANCER_IP).to_owned())
    }

    async fn destroy_loadbalancer(&self, name: &str) -> Result<(), ProviderError> {
        self.record(ProviderOperation::DestroyLoadBalancer, name).await
    }
}
