use std::sync::Arc;

use derive_builder::Builder;
use tracing::{debug, info, instrument, warn};

use crate::api::ClusterApi;
use crate::check::{CheckStatuses, PlatformChecker};
use crate::component::{DeletionPolicy, Platform, PlatformComponent, PlatformContext, UpgradeOutcome};
use crate::config::{ClusterConfig, ConfigError};
use crate::error::{ClusterError, Operation};
use crate::infra::{ClusterNodes, InfraComponent, InfrastructureResource};
use crate::manifest::TemplateEngine;
use crate::outputs::DiscoveredOutputs;
use crate::pki::{CertificateAuthority, ClusterCredentials};
use crate::pool::{DEFAULT_MAX_WORKERS, WorkerPool};
use crate::progress::{OrchestrationProgressMessage, ProgressBarFactory};
use crate::provider::{ProviderContext, ProviderDriver, ProviderRegistry};
use crate::render::ProgressRenderedText;

/// Runtime knobs for an orchestration run
///
/// ```
/// # use kel_cluster::{ClusterError, ClusterSettings};
/// # fn example() -> Result<(), ClusterError> {
/// let settings = ClusterSettings::builder()
///     .max_workers(4)
///     .hide_spinner(false)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Builder, Debug, Clone)]
#[builder(build_fn(private, name = "build_impl"))]
pub struct ClusterSettings {
    /// Upper bound on provider calls in flight at once
    #[builder(default = "*DEFAULT_MAX_WORKERS")]
    max_workers: usize,
    #[builder(default)]
    deletion_policy: DeletionPolicy,
    /// Whether to hide the spinner animation for progress updates
    #[builder(default = "true")]
    hide_spinner: bool,
}

impl ClusterSettings {
    pub fn builder() -> ClusterSettingsBuilder {
        ClusterSettingsBuilder::default()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn deletion_policy(&self) -> &DeletionPolicy {
        &self.deletion_policy
    }

    pub fn hide_spinner(&self) -> bool {
        self.hide_spinner
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            max_workers: *DEFAULT_MAX_WORKERS,
            deletion_policy: DeletionPolicy::default(),
            hide_spinner: true,
        }
    }
}

impl ClusterSettingsBuilder {
    pub fn build(&self) -> Result<ClusterSettings, ConfigError> {
        self.build_impl()
            .map_err(|err| ConfigError::MissingRequiredConfig(err.to_string()))
    }
}

/// A Kel cluster: its configuration, its provider, and what has been
/// discovered about it so far
///
/// Infrastructure is applied network, etcd, master, nodes and removed in the
/// reverse order. A failing stage stops the run with
/// [`ClusterError::PartiallyApplied`], naming the stages that completed;
/// nothing is rolled back.
#[derive(Debug)]
pub struct Cluster {
    config: ClusterConfig,
    outputs: DiscoveredOutputs,
    provider: Arc<dyn ProviderDriver>,
    platform: Platform,
    settings: ClusterSettings,
    pb_factory: ProgressBarFactory,
}

impl Cluster {
    /// Resolves the provider driver once, up front
    pub fn new(
        config: ClusterConfig,
        registry: &ProviderRegistry,
        settings: ClusterSettings,
    ) -> Result<Self, ClusterError> {
        let provider = registry.resolve(&config.provider)?;
        debug!(cluster = %config.name, provider = %provider.kind(), "resolved provider");
        Ok(Self {
            config,
            outputs: DiscoveredOutputs::default(),
            provider,
            platform: Platform::standard(),
            pb_factory: ProgressBarFactory::new(settings.hide_spinner),
            settings,
        })
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Seed outputs recorded by an earlier run
    pub fn with_outputs(mut self, outputs: DiscoveredOutputs) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn outputs(&self) -> &DiscoveredOutputs {
        &self.outputs
    }

    pub fn master_ip(&self) -> Option<&str> {
        self.outputs.master_ip.as_deref()
    }

    pub fn router_ip(&self) -> Option<&str> {
        self.outputs
            .router_ip
            .as_deref()
            .or(self.config.resources.router_ip.as_deref())
    }

    pub fn etcd_endpoints(&self) -> &[String] {
        &self.outputs.etcd_endpoints
    }

    pub fn provider(&self) -> &dyn ProviderDriver {
        self.provider.as_ref()
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    /// The provider resource backing one infrastructure stage
    pub fn provider_resource(&self, component: InfraComponent) -> InfrastructureResource<'_> {
        let infrastructure = &self.config.infrastructure;
        match component {
            InfraComponent::Network => InfrastructureResource::Network(&infrastructure.network),
            InfraComponent::Etcd => InfrastructureResource::EtcdCluster(&infrastructure.etcd),
            InfraComponent::Master => InfrastructureResource::MasterGroup(&infrastructure.master),
            InfraComponent::Nodes => {
                InfrastructureResource::Nodes(ClusterNodes::new(&infrastructure.nodes))
            }
        }
    }

    /// Context for driving platform components against `api`
    pub fn platform_context<'a>(
        &'a self,
        api: &'a dyn ClusterApi,
        engine: &'a dyn TemplateEngine,
    ) -> PlatformContext<'a> {
        PlatformContext {
            config: &self.config,
            outputs: &self.outputs,
            api,
            provider: self.provider.as_ref(),
            engine,
            deletion: &self.settings.deletion_policy,
        }
    }

    /// Provision the infrastructure tier, one stage after another
    #[instrument(skip(self), fields(cluster = %self.config.name))]
    pub async fn create(&mut self) -> Result<(), ClusterError> {
        let pool = WorkerPool::new(self.settings.max_workers);
        let mut completed = Vec::new();

        for component in InfraComponent::creation_order() {
            let pb = self.pb_factory.create()?;
            pb.set_message(OrchestrationProgressMessage::Creating(component.to_string()).msg());

            let result = {
                let resource = self.provider_resource(component);
                let ctx = ProviderContext::new(&self.config.name, &self.outputs);
                resource.create(self.provider.as_ref(), ctx, &pool).await
            };
            pb.finish_and_clear();

            match result {
                Ok(discovered) => {
                    self.outputs.merge(discovered);
                    self.pb_factory
                        .println(OrchestrationProgressMessage::Created(component.to_string()).msg());
                    completed.push(component.to_string());
                }
                Err(err) => {
                    warn!(stage = %component, %err, "infrastructure creation stopped");
                    return Err(ClusterError::partially_applied(
                        Operation::Create,
                        component.as_str(),
                        completed,
                        err.into(),
                    ));
                }
            }
        }

        info!(master_ip = ?self.outputs.master_ip, "infrastructure ready");
        self.pb_factory.println(
            OrchestrationProgressMessage::Success(Operation::Create, self.config.name.clone()).msg(),
        );
        Ok(())
    }

    /// Tear the infrastructure tier down in reverse order
    #[instrument(skip(self), fields(cluster = %self.config.name))]
    pub async fn destroy(&self) -> Result<(), ClusterError> {
        let pool = WorkerPool::new(self.settings.max_workers);
        let mut completed = Vec::new();

        for component in InfraComponent::destruction_order() {
            let pb = self.pb_factory.create()?;
            pb.set_message(OrchestrationProgressMessage::Destroying(component.to_string()).msg());

            let resource = self.provider_resource(component);
            let ctx = ProviderContext::new(&self.config.name, &self.outputs);
            let result = resource.destroy(self.provider.as_ref(), ctx, &pool).await;
            pb.finish_and_clear();

            if let Err(err) = result {
                warn!(stage = %component, %err, "infrastructure teardown stopped");
                return Err(ClusterError::partially_applied(
                    Operation::Destroy,
                    component.as_str(),
                    completed,
                    err.into(),
                ));
            }
            self.pb_factory
                .println(OrchestrationProgressMessage::Destroyed(component.to_string()).msg());
            completed.push(component.to_string());
        }

        self.pb_factory.println(
            OrchestrationProgressMessage::Success(Operation::Destroy, self.config.name.clone()).msg(),
        );
        Ok(())
    }

    /// Verify the configuration covers every platform component
    pub fn preflight_check(&self) -> Result<CheckStatuses, ClusterError> {
        self.pb_factory
            .println(OrchestrationProgressMessage::PreFlightCheck.msg());
        PlatformChecker::new(&self.config).run(&self.platform)
    }

    /// Apply every platform component in order
    #[instrument(skip_all, fields(cluster = %self.config.name))]
    pub async fn create_platform(
        &mut self,
        api: &dyn ClusterApi,
        engine: &dyn TemplateEngine,
    ) -> Result<(), ClusterError> {
        self.preflight_check()?;
        let mut completed = Vec::new();

        for index in 0..self.platform.len() {
            let Some(component) = self.platform.component(index) else {
                break;
            };
            let name = component.name().to_owned();
            let pb = self.pb_factory.create()?;
            pb.set_message(OrchestrationProgressMessage::Creating(name.clone()).msg());

            let result = {
                let ctx = PlatformContext {
                    config: &self.config,
                    outputs: &self.outputs,
                    api,
                    provider: self.provider.as_ref(),
                    engine,
                    deletion: &self.settings.deletion_policy,
                };
                component.create(&ctx).await
            };
            pb.finish_and_clear();

            match result {
                Ok(discovered) => {
                    self.outputs.merge(discovered);
                    self.pb_factory
                        .println(OrchestrationProgressMessage::Created(name.clone()).msg());
                    completed.push(name);
                }
                Err(err) => {
                    warn!(component = %name, %err, "platform creation stopped");
                    return Err(ClusterError::partially_applied(
                        Operation::Create,
                        name,
                        completed,
                        err,
                    ));
                }
            }
        }

        self.pb_factory.println(
            OrchestrationProgressMessage::Success(Operation::Create, self.config.name.clone()).msg(),
        );
        Ok(())
    }

    /// Upgrade every platform component whose deployment key changed
    #[instrument(skip_all, fields(cluster = %self.config.name))]
    pub async fn upgrade_platform(
        &self,
        api: &dyn ClusterApi,
        engine: &dyn TemplateEngine,
    ) -> Result<Vec<(String, UpgradeOutcome)>, ClusterError> {
        self.preflight_check()?;
        let ctx = self.platform_context(api, engine);
        let mut outcomes: Vec<(String, UpgradeOutcome)> = Vec::new();

        for component in self.platform.iter() {
            let name = component.name().to_owned();
            let pb = self.pb_factory.create()?;
            pb.set_message(OrchestrationProgressMessage::Upgrading(name.clone()).msg());
            let result = component.upgrade(&ctx).await;
            pb.finish_and_clear();

            match result {
                Ok(outcome) => {
                    let msg = match outcome {
                        UpgradeOutcome::Upgraded { .. } => {
                            OrchestrationProgressMessage::Upgraded(name.clone())
                        }
                        _ => OrchestrationProgressMessage::UpToDate(name.clone()),
                    };
                    self.pb_factory.println(msg.msg());
                    outcomes.push((name, outcome));
                }
                Err(err) => {
                    warn!(component = %name, %err, "platform upgrade stopped");
                    let completed = outcomes.into_iter().map(|(name, _)| name).collect();
                    return Err(ClusterError::partially_applied(
                        Operation::Upgrade,
                        name,
                        completed,
                        err,
                    ));
                }
            }
        }

        self.pb_factory.println(
            OrchestrationProgressMessage::Success(Operation::Upgrade, self.config.name.clone())
                .msg(),
        );
        Ok(outcomes)
    }

    /// Remove platform components in reverse order
    #[instrument(skip_all, fields(cluster = %self.config.name))]
    pub async fn destroy_platform(
        &self,
        api: &dyn ClusterApi,
        engine: &dyn TemplateEngine,
    ) -> Result<(), ClusterError> {
        let ctx = self.platform_context(api, engine);
        let mut completed = Vec::new();

        for component in self.platform.iter().rev() {
            let name = component.name().to_owned();
            let pb = self.pb_factory.create()?;
            pb.set_message(OrchestrationProgressMessage::Destroying(name.clone()).msg());
            let result = component.destroy(&ctx).await;
            pb.finish_and_clear();

            if let Err(err) = result {
                warn!(component = %name, %err, "platform teardown stopped");
                return Err(ClusterError::partially_applied(
                    Operation::Destroy,
                    name,
                    completed,
                    err,
                ));
            }
            self.pb_factory
                .println(OrchestrationProgressMessage::Destroyed(name.clone()).msg());
            completed.push(name);
        }
        Ok(())
    }

    /// Issue the cluster CA plus admin and API server credentials. The API
    /// server certificate covers the master address once it is known.
    pub fn issue_credentials(&self) -> Result<ClusterCredentials, ClusterError> {
        let ca = CertificateAuthority::generate(&self.config.name)?;
        Ok(ClusterCredentials::issue(&ca, self.master_ip())?)
    }
}
