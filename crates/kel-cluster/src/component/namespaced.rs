use async_trait::async_trait;
use tracing::{info, instrument};

use crate::api::{ResourceHandle, ResourceKind};
use crate::error::ClusterError;
use crate::manifest::{ManifestContext, ManifestError};
use crate::outputs::DiscoveredOutputs;

use super::{PlatformComponent, PlatformContext, UpgradeOutcome, wait_for_deletion};

/// A component made of a single unversioned object, such as a namespace or a
/// node-level daemon set. Deleting it waits for the object to be gone, since
/// the cluster tears these down asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacedResource {
    layer: &'static str,
    manifest: &'static str,
    kind: ResourceKind,
}

impl NamespacedResource {
    pub const fn namespace(layer: &'static str, manifest: &'static str) -> Self {
        Self {
            layer,
            manifest,
            kind: ResourceKind::Namespace,
        }
    }

    pub const fn daemon_set(layer: &'static str, manifest: &'static str) -> Self {
        Self {
            layer,
            manifest,
            kind: ResourceKind::DaemonSet,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn object(&self, ctx: &PlatformContext<'_>) -> Result<ResourceHandle, ClusterError> {
        let mut objs = ctx
            .materializer()
            .get_api_objs(self.layer, self.manifest, ManifestContext::new(), None)
            .await?;
        let object = objs
            .take_first(self.kind)
            .ok_or_else(|| ManifestError::MissingDocument {
                manifest: self.manifest.to_owned(),
                kind: self.kind,
            })?;
        Ok(object)
    }
}

#[async_trait]
impl PlatformComponent for NamespacedResource {
    fn layer(&self) -> &str {
        self.layer
    }

    fn manifest(&self) -> &str {
        self.manifest
    }

    #[instrument(skip_all, fields(component = self.manifest))]
    async fn create(&self, ctx: &PlatformContext<'_>) -> Result<DiscoveredOutputs, ClusterError> {
        let mut object = self.object(ctx).await?;
        object.create(ctx.api).await?;
        info!("created \"{}\" {}", object.name(), self.kind);
        Ok(DiscoveredOutputs::default())
    }

    async fn upgrade(&self, _ctx: &PlatformContext<'_>) -> Result<UpgradeOutcome, ClusterError> {
        Ok(UpgradeOutcome::Unversioned)
    }

    #[instrument(skip_all, fields(component = self.manifest))]
    async fn destroy(&self, ctx: &PlatformContext<'_>) -> Result<(), ClusterError> {
        let object = self.object(ctx).await?;
        object.delete(ctx.api).await?;
        let polls = wait_for_deletion(ctx.api, &object, ctx.deletion).await?;
        info!(polls, "deleted \"{}\" {}", object.name(), self.kind);
        Ok(())
    }
}
