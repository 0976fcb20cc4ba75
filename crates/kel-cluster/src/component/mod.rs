//! Platform tier components and their lifecycle.

mod catalog;
mod deletion;
mod namespaced;
mod router;

use std::fmt::Debug;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::api::{
    ApiError, ClusterApi, DEFAULT_NAMESPACE, LabelSelector, ResourceHandle, ResourceKind,
};
use crate::config::{ClusterConfig, DiskConfig};
use crate::deployment::{
    BASE_LABEL, DEPLOYMENT_LABEL, DeploymentKey, RollingUpgrade, stamp, workload_key,
};
use crate::error::ClusterError;
use crate::manifest::{
    ManifestContext, ManifestError, Materializer, ResolvedDocumentSet, TemplateEngine,
    WorkloadParams,
};
use crate::outputs::DiscoveredOutputs;
use crate::provider::ProviderDriver;

pub use catalog::{
    API_CACHE, API_DATABASE, API_WEB, API_WORKER, BLOBSTORE, BLOBSTORE_DATA, KEL_BUILDS, KEL_SYSTEM,
    KUBE_DNS, LOG_AGENT, LOG_STORE, LOGSTASH, Platform,
};
pub use deletion::{DeletionPolicy, DeletionPolicyBuilder, wait_for_deletion};
pub use namespaced::NamespacedResource;
pub use router::Router;

/// Everything a component needs while it is being applied
#[derive(Debug, Clone, Copy)]
pub struct PlatformContext<'a> {
    pub config: &'a ClusterConfig,
    pub outputs: &'a DiscoveredOutputs,
    pub api: &'a dyn ClusterApi,
    pub provider: &'a dyn ProviderDriver,
    pub engine: &'a dyn TemplateEngine,
    pub deletion: &'a DeletionPolicy,
}

impl<'a> PlatformContext<'a> {
    pub fn materializer(&self) -> Materializer<'a> {
        Materializer::new(self.config, self.outputs, self.api, self.engine)
    }

    /// Same context seen through different outputs
    pub fn with_outputs<'b>(&self, outputs: &'b DiscoveredOutputs) -> PlatformContext<'b>
    where
        'a: 'b,
    {
        PlatformContext {
            config: self.config,
            outputs,
            api: self.api,
            provider: self.provider,
            engine: self.engine,
            deletion: self.deletion,
        }
    }
}

/// What an upgrade did to a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The running workload already carries this key
    UpToDate(DeploymentKey),
    Upgraded {
        from: Option<String>,
        to: DeploymentKey,
    },
    /// The component has no versioned workload
    Unversioned,
}

/// A named unit of the platform tier
#[async_trait]
pub trait PlatformComponent: Debug + Send + Sync {
    fn layer(&self) -> &str;

    fn manifest(&self) -> &str;

    fn name(&self) -> &str {
        self.manifest()
    }

    fn bundle(&self) -> Option<&str> {
        None
    }

    fn requires_disk(&self) -> bool {
        false
    }

    /// Apply the component; returns outputs discovered along the way
    async fn create(&self, ctx: &PlatformContext<'_>) -> Result<DiscoveredOutputs, ClusterError>;

    async fn upgrade(&self, ctx: &PlatformContext<'_>) -> Result<UpgradeOutcome, ClusterError>;

    async fn destroy(&self, ctx: &PlatformContext<'_>) -> Result<(), ClusterError>;
}

/// Static identity of a workload component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentManifest {
    pub layer: &'static str,
    pub manifest: &'static str,
    pub bundle: Option<&'static str>,
    pub replicas: u32,
    pub requires_disk: bool,
}

impl ComponentManifest {
    pub const fn new(layer: &'static str, manifest: &'static str, replicas: u32) -> Self {
        Self {
            layer,
            manifest,
            bundle: None,
            replicas,
            requires_disk: false,
        }
    }

    pub const fn with_bundle(mut self, bundle: &'static str) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub const fn with_disk(mut self) -> Self {
        self.requires_disk = true;
        self
    }
}

/// A workload component: credentials, services and one keyed workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentResource {
    manifest: ComponentManifest,
}

impl ComponentResource {
    pub const fn new(manifest: ComponentManifest) -> Self {
        Self { manifest }
    }

    pub fn component(&self) -> &ComponentManifest {
        &self.manifest
    }

    /// The disk entry this component mounts, checked before anything remote
    pub fn disk<'c>(&self, config: &'c ClusterConfig) -> Result<Option<&'c DiskConfig>, ClusterError> {
        if !self.manifest.requires_disk {
            return Ok(None);
        }
        config
            .disk(self.manifest.manifest)
            .map(Some)
            .ok_or_else(|| ClusterError::MissingDiskConfig {
                component: self.manifest.manifest.to_owned(),
            })
    }

    /// Provider disk name, `<cluster>-<disk name or manifest>`
    pub fn disk_name(&self, cluster_name: &str, disk: &DiskConfig) -> String {
        let name = disk.name.as_deref().unwrap_or(self.manifest.manifest);
        format!("{cluster_name}-{name}")
    }

    fn workload_params(&self) -> WorkloadParams<'static> {
        WorkloadParams {
            replicas: self.manifest.replicas,
            bundle: self.manifest.bundle,
        }
    }

    async fn objs(&self, ctx: &PlatformContext<'_>) -> Result<ResolvedDocumentSet, ClusterError> {
        ctx.materializer()
            .get_api_objs(
                self.manifest.layer,
                self.manifest.manifest,
                ManifestContext::new(),
                Some(self.workload_params()),
            )
            .await
    }

    fn rendered_workload<'o>(&self, objs: &'o ResolvedDocumentSet) -> Result<&'o ResourceHandle, ClusterError> {
        objs.first(ResourceKind::Deployment).ok_or_else(|| {
            ManifestError::MissingDocument {
                manifest: self.manifest.manifest.to_owned(),
                kind: ResourceKind::Deployment,
            }
            .into()
        })
    }

    fn key_of(&self, objs: &ResolvedDocumentSet) -> Result<DeploymentKey, ClusterError> {
        let workload = self.rendered_workload(objs)?;
        Ok(workload_key(workload, objs.get(ResourceKind::Secret)))
    }

    /// Key of the workload as it would be rendered right now
    pub async fn generate_deployment_key(
        &self,
        ctx: &PlatformContext<'_>,
    ) -> Result<DeploymentKey, ClusterError> {
        let objs = self.objs(ctx).await?;
        self.key_of(&objs)
    }

    /// The rendered workload, named and labelled with its key
    pub async fn get_deployment(
        &self,
        ctx: &PlatformContext<'_>,
    ) -> Result<ResourceHandle, ClusterError> {
        let objs = self.objs(ctx).await?;
        let key = self.key_of(&objs)?;
        let mut workload = self.rendered_workload(&objs)?.clone();
        stamp(&mut workload, &key);
        Ok(workload)
    }

    /// The revision running on the cluster, found by its base label
    pub async fn current_deployment(
        &self,
        ctx: &PlatformContext<'_>,
    ) -> Result<Option<ResourceHandle>, ClusterError> {
        let objs = self.objs(ctx).await?;
        self.running_workload(ctx.api, self.rendered_workload(&objs)?).await
    }

    async fn running_workload(
        &self,
        api: &dyn ClusterApi,
        rendered: &ResourceHandle,
    ) -> Result<Option<ResourceHandle>, ClusterError> {
        let component = rendered
            .label(BASE_LABEL)
            .ok_or_else(|| ManifestError::MissingLabel {
                document: rendered.id().to_string(),
                label: BASE_LABEL.to_owned(),
            })?;
        let selector = LabelSelector::from([(BASE_LABEL.to_owned(), component.to_owned())]);
        let namespace = rendered.namespace().unwrap_or(DEFAULT_NAMESPACE);

        match api.find_one(ResourceKind::Deployment, namespace, &selector).await? {
            Some(document) => Ok(Some(ResourceHandle::from_live(
                ResourceKind::Deployment,
                document,
            )?)),
            None => Ok(None),
        }
    }

    /// Rendered objects, fresh key and running revision, in one pass
    async fn plan(
        &self,
        ctx: &PlatformContext<'_>,
    ) -> Result<(ResolvedDocumentSet, DeploymentKey, ResourceHandle), ClusterError> {
        let objs = self.objs(ctx).await?;
        let key = self.key_of(&objs)?;
        let running = self
            .running_workload(ctx.api, self.rendered_workload(&objs)?)
            .await?
            .ok_or_else(|| ClusterError::NoRunningWorkload {
                component: self.manifest.manifest.to_owned(),
            })?;
        Ok((objs, key, running))
    }

    /// Whether the running revision's key differs from a fresh render
    pub async fn can_upgrade(&self, ctx: &PlatformContext<'_>) -> Result<bool, ClusterError> {
        let (_, key, running) = self.plan(ctx).await?;
        Ok(running.label(DEPLOYMENT_LABEL) != Some(key.as_str()))
    }
}

#[async_trait]
impl PlatformComponent for ComponentResource {
    fn layer(&self) -> &str {
        self.manifest.layer
    }

    fn manifest(&self) -> &str {
        self.manifest.manifest
    }

    fn bundle(&self) -> Option<&str> {
        self.manifest.bundle
    }

    fn requires_disk(&self) -> bool {
        self.manifest.requires_disk
    }

    #[instrument(skip_all, fields(component = self.manifest.manifest))]
    async fn create(&self, ctx: &PlatformContext<'_>) -> Result<DiscoveredOutputs, ClusterError> {
        if let Some(disk) = self.disk(ctx.config)? {
            let disk_name = self.disk_name(&ctx.config.name, disk);
            ctx.provider
                .create_disk(&disk_name, disk.size, &disk.disk_type)
                .await?;
            info!(disk = %disk_name, "created disk");
        }

        let mut objs = self.objs(ctx).await?;
        let key = self.key_of(&objs)?;

        for mut secret in objs.take(ResourceKind::Secret) {
            secret.create(ctx.api).await?;
            info!("created \"{}\" secret", secret.name());
        }
        for mut service in objs.take(ResourceKind::Service) {
            service.create(ctx.api).await?;
            info!("created \"{}\" service", service.name());
        }

        let mut workload = objs.take_first(ResourceKind::Deployment).ok_or_else(|| {
            ManifestError::MissingDocument {
                manifest: self.manifest.manifest.to_owned(),
                kind: ResourceKind::Deployment,
            }
        })?;
        stamp(&mut workload, &key);
        workload.create(ctx.api).await?;
        info!("created \"{}\" deployment", workload.name());

        Ok(DiscoveredOutputs::default())
    }

    #[instrument(skip_all, fields(component = self.manifest.manifest))]
    async fn upgrade(&self, ctx: &PlatformContext<'_>) -> Result<UpgradeOutcome, ClusterError> {
        let (mut objs, key, running) = self.plan(ctx).await?;
        let running_key = running.label(DEPLOYMENT_LABEL).map(str::to_owned);
        if running_key.as_deref() == Some(key.as_str()) {
            debug!(%key, "already up to date");
            return Ok(UpgradeOutcome::UpToDate(key));
        }

        for mut secret in objs.take(ResourceKind::Secret) {
            if secret.live().is_some() {
                secret.update(ctx.api).await?;
                info!("updated \"{}\" secret", secret.name());
            } else {
                secret.create(ctx.api).await?;
                info!("created \"{}\" secret", secret.name());
            }
        }

        let mut next = objs.take_first(ResourceKind::Deployment).ok_or_else(|| {
            ManifestError::MissingDocument {
                manifest: self.manifest.manifest.to_owned(),
                kind: ResourceKind::Deployment,
            }
        })?;
        stamp(&mut next, &key);
        RollingUpgrade::new(ctx.api).replace(&running, &next).await?;
        info!(from = ?running_key, to = %key, "upgraded deployment");

        Ok(UpgradeOutcome::Upgraded {
            from: running_key,
            to: key,
        })
    }

    /// Disks are left in place so data survives the platform
    #[instrument(skip_all, fields(component = self.manifest.manifest))]
    async fn destroy(&self, ctx: &PlatformContext<'_>) -> Result<(), ClusterError> {
        let objs = self.objs(ctx).await?;
        let rendered = self.rendered_workload(&objs)?;

        let running = self
            .running_workload(ctx.api, rendered)
            .await?
            .ok_or_else(|| ApiError::NotFound(rendered.id().clone()))?;
        running.scale(ctx.api, 0).await?;
        running.delete(ctx.api).await?;
        info!("deleted \"{}\" deployment", running.name());

        for service in objs.get(ResourceKind::Service) {
            service.delete(ctx.api).await?;
            info!("deleted \"{}\" service", service.name());
        }
        for secret in objs.get(ResourceKind::Secret) {
            secret.delete(ctx.api).await?;
            info!("deleted \"{}\" secret", secret.name());
        }
        Ok(())
    }
}
