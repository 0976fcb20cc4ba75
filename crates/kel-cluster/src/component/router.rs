use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::error::ClusterError;
use crate::outputs::DiscoveredOutputs;

use super::{ComponentManifest, ComponentResource, PlatformComponent, PlatformContext, UpgradeOutcome};

pub const ROUTER_PORTS: [u16; 2] = [80, 443];

const ROUTER_MANIFEST: ComponentManifest =
    ComponentManifest::new("kel", "router", 3).with_bundle("router");

/// The edge router: a workload fronted by a provider load balancer
///
/// The load balancer comes up before the workload so the workload's
/// manifests can refer to the router address, and goes away last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router {
    resource: ComponentResource,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub const fn new() -> Self {
        Self {
            resource: ComponentResource::new(ROUTER_MANIFEST),
        }
    }

    pub fn resource(&self) -> &ComponentResource {
        &self.resource
    }

    pub fn loadbalancer_name(cluster_name: &str) -> String {
        format!("{cluster_name}-router")
    }
}

#[async_trait]
impl PlatformComponent for Router {
    fn layer(&self) -> &str {
        self.resource.layer()
    }

    fn manifest(&self) -> &str {
        self.resource.manifest()
    }

    fn bundle(&self) -> Option<&str> {
        self.resource.bundle()
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &PlatformContext<'_>) -> Result<DiscoveredOutputs, ClusterError> {
        let name = Self::loadbalancer_name(&ctx.config.name);
        let requested = ctx
            .outputs
            .router_ip
            .as_deref()
            .or(ctx.config.resources.router_ip.as_deref());
        let router_ip = ctx
            .provider
            .create_loadbalancer(&name, &ROUTER_PORTS, requested)
            .await?;
        info!(%router_ip, "created \"{name}\" load balancer");

        let mut outputs = ctx.outputs.clone();
        outputs.router_ip = Some(router_ip.clone());
        if let Err(err) = self.resource.create(&ctx.with_outputs(&outputs)).await {
            warn!(%router_ip, "\"{name}\" load balancer left in place after router failed");
            return Err(err);
        }

        Ok(DiscoveredOutputs::default().with_router_ip(router_ip))
    }

    async fn upgrade(&self, ctx: &PlatformContext<'_>) -> Result<UpgradeOutcome, ClusterError> {
        self.resource.upgrade(ctx).await
    }

    #[instrument(skip_all)]
    async fn destroy(&self, ctx: &PlatformContext<'_>) -> Result<(), ClusterError> {
        self.resource.destroy(ctx).await?;
        let name = Self::loadbalancer_name(&ctx.config.name);
        ctx.provider.destroy_loadbalancer(&name).await?;
        info!("deleted \"{name}\" load balancer");
        Ok(())
    }
}
