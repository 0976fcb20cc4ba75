use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use kel_cluster::api::{ApiCall, ObjectId};
use kel_cluster::provider::ProviderOperation;
use kel_cluster::{
    Cluster, ClusterConfig, ClusterError, ClusterSettings, ComponentManifest, ComponentResource,
    DeletionPolicy, DiscoveredOutputs, DryRunProvider, JinjaEngine, MemoryClusterApi,
    NamespacedResource, Operation, PlatformComponent, PlatformContext, ProviderDriver,
    ProviderKind, ProviderRegistry, ResourceKind, UpgradeOutcome,
};

const CONFIG: &str = r#"
name: itest
provider:
  kind: dry-run
infrastructure:
  network:
    cidr: 10.240.0.0/16
  etcd:
    size: 3
  nodes:
    - name: pool-a
    - name: pool-b
    - name: pool-c
layers:
  kel:
    version: 2.0.1
    bundles:
      api:
        url: https://storage.example.com/api.tgz
resources:
  router-ip: 203.0.113.20
"#;

const WEB: &str = r#"
apiVersion: v1
kind: Secret
metadata:
  name: web-creds
  namespace: kel-system
data:
  token: {{ "__TOKEN__" | b64 }}
---
apiVersion: v1
kind: Service
metadata:
  name: web
  namespace: kel-system
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web-{{ version }}
  namespace: kel-system
  labels:
    kelproject.com/name: web
spec:
  replicas: {{ replicas }}
  selector:
    matchLabels:
      kelproject.com/name: web
  template:
    metadata:
      labels:
        kelproject.com/name: web
    spec:
      containers:
      - name: web
        image: quay.io/kelproject/web
      volumes:
      - name: creds
        secret:
          secretName: web-creds
"#;

const BUILDS_NAMESPACE: &str = "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: kel-builds\n";

const WEB_COMPONENT: ComponentResource =
    ComponentResource::new(ComponentManifest::new("kel", "web", 2).with_bundle("api"));
const BUILDS: NamespacedResource = NamespacedResource::namespace("kel", "kel-builds");

fn config(web_token: &str) -> ClusterConfig {
    let mut config = ClusterConfig::from_yaml_str(CONFIG).expect("config");
    let kel = config.layers.get_mut("kel").expect("kel layer");
    kel.manifests.insert(
        "web".to_owned(),
        STANDARD.encode(WEB.replace("__TOKEN__", web_token)),
    );
    kel.manifests
        .insert("kel-builds".to_owned(), STANDARD.encode(BUILDS_NAMESPACE));
    config
}

fn cluster(provider: Arc<DryRunProvider>) -> Cluster {
    cluster_with(provider, config("initial"))
}

/// Cluster keeping only the first `groups` node groups of the config
fn cluster_with_node_groups(provider: Arc<DryRunProvider>, groups: usize) -> Cluster {
    let mut config = config("initial");
    config.infrastructure.nodes.truncate(groups);
    cluster_with(provider, config)
}

fn cluster_with(provider: Arc<DryRunProvider>, config: ClusterConfig) -> Cluster {
    let registry = ProviderRegistry::empty().register(ProviderKind::DryRun, move |_| {
        Ok(provider.clone() as Arc<dyn ProviderDriver>)
    });
    Cluster::new(
        config,
        &registry,
        ClusterSettings::builder()
            .max_workers(2)
            .build()
            .expect("settings"),
    )
    .expect("cluster")
}

fn fast_deletion(timeout: Duration) -> DeletionPolicy {
    DeletionPolicy::builder()
        .interval(Duration::from_millis(1))
        .max_interval(Duration::from_millis(2))
        .timeout(timeout)
        .build()
        .expect("policy")
}

#[fluvio_future::test]
async fn infrastructure_is_created_then_destroyed_in_reverse() {
    let provider = Arc::new(DryRunProvider::default().with_latency(Duration::from_millis(2)));
    let mut cluster = cluster(provider.clone());

    cluster.create().await.expect("create");

    let created = provider.operations();
    assert_eq!(created.len(), 6);
    assert_eq!(
        &created[..3],
        &[
            ProviderOperation::CreateNetwork,
            ProviderOperation::CreateEtcdCluster,
            ProviderOperation::CreateMasterGroup,
        ]
    );
    assert_eq!(cluster.etcd_endpoints().len(), 3);
    assert!(cluster.master_ip().is_some());

    provider.clear();
    cluster.destroy().await.expect("destroy");

    let destroyed = provider.operations();
    assert_eq!(destroyed.len(), 6);
    assert!(
        destroyed[..3]
            .iter()
            .all(|operation| *operation == ProviderOperation::DestroyNodeGroup)
    );
    assert_eq!(
        &destroyed[3..],
        &[
            ProviderOperation::DestroyMasterGroup,
            ProviderOperation::DestroyEtcdCluster,
            ProviderOperation::DestroyNetwork,
        ]
    );
}

#[fluvio_future::test]
async fn single_node_group_follows_control_plane() {
    let provider = Arc::new(DryRunProvider::default());
    let mut cluster = cluster_with_node_groups(provider.clone(), 1);

    cluster.create().await.expect("create");

    assert_eq!(
        provider.operations(),
        vec![
            ProviderOperation::CreateNetwork,
            ProviderOperation::CreateEtcdCluster,
            ProviderOperation::CreateMasterGroup,
            ProviderOperation::CreateNodeGroup,
        ]
    );
    let calls = provider.calls();
    assert_eq!(calls[3].target, "pool-a");
}

#[fluvio_future::test]
async fn cluster_without_node_groups() {
    let provider = Arc::new(DryRunProvider::default());
    let mut cluster = cluster_with_node_groups(provider.clone(), 0);

    cluster.create().await.expect("create");
    assert_eq!(
        provider.operations(),
        vec![
            ProviderOperation::CreateNetwork,
            ProviderOperation::CreateEtcdCluster,
            ProviderOperation::CreateMasterGroup,
        ]
    );

    provider.clear();
    cluster.destroy().await.expect("destroy");
    assert_eq!(
        provider.operations(),
        vec![
            ProviderOperation::DestroyMasterGroup,
            ProviderOperation::DestroyEtcdCluster,
            ProviderOperation::DestroyNetwork,
        ]
    );
}

#[fluvio_future::test]
async fn failing_node_group_reports_partial_progress() {
    let provider = Arc::new(
        DryRunProvider::default().fail_on_target(ProviderOperation::CreateNodeGroup, "pool-b"),
    );
    let mut cluster = cluster(provider.clone());

    let err = cluster.create().await.expect_err("pool-b fails");

    let ClusterError::PartiallyApplied {
        operation,
        stage,
        completed,
        ..
    } = &err
    else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(*operation, Operation::Create);
    assert_eq!(stage, "nodes");
    assert_eq!(completed, &["network", "etcd", "master"]);
    assert_eq!(err.stage(), Some("nodes"));

    // sibling groups still ran to completion and nothing was rolled back
    let targets: Vec<_> = provider
        .calls()
        .into_iter()
        .filter(|call| call.operation == ProviderOperation::CreateNodeGroup)
        .map(|call| call.target)
        .collect();
    assert_eq!(targets.len(), 2);
    assert!(targets.iter().any(|target| target == "pool-a"));
    assert!(targets.iter().any(|target| target == "pool-c"));
    assert!(
        !provider
            .operations()
            .iter()
            .any(|operation| matches!(operation, ProviderOperation::DestroyNetwork))
    );
    assert!(cluster.master_ip().is_some());
}

#[fluvio_future::test]
async fn upgrade_rolls_only_when_credentials_change() {
    let outputs = DiscoveredOutputs::default();
    let api = MemoryClusterApi::new();
    let provider = DryRunProvider::default();
    let deletion = DeletionPolicy::default();

    let initial = config("initial");
    let ctx = PlatformContext {
        config: &initial,
        outputs: &outputs,
        api: &api,
        provider: &provider,
        engine: &JinjaEngine,
        deletion: &deletion,
    };
    WEB_COMPONENT.create(&ctx).await.expect("create");
    let first_key = WEB_COMPONENT.generate_deployment_key(&ctx).await.expect("key");
    api.clear_calls();

    let outcome = WEB_COMPONENT.upgrade(&ctx).await.expect("upgrade");
    assert_eq!(outcome, UpgradeOutcome::UpToDate(first_key.clone()));
    assert!(api.mutations().is_empty());

    let rotated = config("rotated");
    let ctx = PlatformContext {
        config: &rotated,
        ..ctx
    };
    let outcome = WEB_COMPONENT.upgrade(&ctx).await.expect("upgrade");
    let UpgradeOutcome::Upgraded { from, to } = outcome else {
        panic!("expected a rolling upgrade, got {outcome:?}");
    };
    assert_eq!(from.as_deref(), Some(first_key.as_str()));
    assert_ne!(to, first_key);

    let mutations = api.mutations();
    assert!(matches!(&mutations[0], ApiCall::Update(id) if id.kind == ResourceKind::Secret));
    assert!(matches!(
        &mutations[1],
        ApiCall::RollingReplace { from, to: next }
            if from.name == format!("web-2-0-1-{first_key}") && next.name == format!("web-2-0-1-{to}")
    ));
    assert_eq!(api.objects(ResourceKind::Deployment).len(), 1);
}

#[fluvio_future::test]
async fn namespace_deletion_waits_for_termination() {
    let config = config("initial");
    let outputs = DiscoveredOutputs::default();
    let api = MemoryClusterApi::new().with_deletion_lag(1);
    let provider = DryRunProvider::default();
    let deletion = fast_deletion(Duration::from_secs(5));
    let ctx = PlatformContext {
        config: &config,
        outputs: &outputs,
        api: &api,
        provider: &provider,
        engine: &JinjaEngine,
        deletion: &deletion,
    };

    BUILDS.create(&ctx).await.expect("create");
    api.clear_calls();
    BUILDS.destroy(&ctx).await.expect("destroy");

    let polls = api
        .calls()
        .into_iter()
        .skip_while(|call| !matches!(call, ApiCall::Delete(_)))
        .filter(|call| matches!(call, ApiCall::Retrieve(_)))
        .count();
    assert_eq!(polls, 2);
    assert!(!api.contains(&ObjectId::new(ResourceKind::Namespace, None, "kel-builds")));
}

#[fluvio_future::test]
async fn stuck_namespace_times_out() {
    let config = config("initial");
    let outputs = DiscoveredOutputs::default();
    let api = MemoryClusterApi::new().with_deletion_lag(u32::MAX);
    let provider = DryRunProvider::default();
    let deletion = fast_deletion(Duration::from_millis(20));
    let ctx = PlatformContext {
        config: &config,
        outputs: &outputs,
        api: &api,
        provider: &provider,
        engine: &JinjaEngine,
        deletion: &deletion,
    };

    BUILDS.create(&ctx).await.expect("create");
    let err = BUILDS.destroy(&ctx).await.expect_err("never terminates");

    assert!(matches!(
        err,
        ClusterError::DeletionTimeout { kind: ResourceKind::Namespace, ref name, polls, .. }
            if name == "kel-builds" && polls > 1
    ));
}
