//! Cluster configuration shared by the unit tests.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

use crate::config::{
    ClusterConfig, DiskConfig, InfrastructureConfig, LayerConfig, PlatformResources,
    ProviderConfig, ResourceConfig,
};
use crate::provider::ProviderKind;

pub(crate) const ROUTER_IP: &str = "203.0.113.10";
pub(crate) const ROUTER_IMAGE: &str = "quay.io/kelproject/router:1.2.0";
pub(crate) const ROUTER_BUNDLE_URL: &str = "https://storage.example.com/router-1.2.0.tgz";
pub(crate) const NODE_GROUPS: usize = 2;

const WORKLOAD: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: __NAME__-{{ version }}
  namespace: __NAMESPACE__
  labels:
    kelproject.com/name: __NAME__
  annotations:
    kelproject.com/router-ip: "{{ cluster.router_ip }}"
spec:
  replicas: {{ replicas }}
  selector:
    matchLabels:
      kelproject.com/name: __NAME__
  template:
    metadata:
      labels:
        kelproject.com/name: __NAME__
    spec:
      containers:
      - name: __NAME__
        image: "{{ image }}"
"#;

const CREDENTIAL_VOLUME: &str = r#"      volumes:
      - name: creds
        secret:
          secretName: __NAME__-creds
"#;

const CREDENTIAL: &str = r#"
apiVersion: v1
kind: Secret
metadata:
  name: __NAME__-creds
  namespace: __NAMESPACE__
data:
  password: {{ "__PASSWORD__" | b64 }}
---"#;

const SERVICE: &str = r#"
apiVersion: v1
kind: Service
metadata:
  name: __NAME__
  namespace: __NAMESPACE__
spec:
  ports:
  - port: 5432
---"#;

pub(crate) fn encode(source: &str) -> String {
    STANDARD.encode(source)
}

/// Credential, service and deployment for one workload component
pub(crate) fn workload_manifest(name: &str, namespace: &str, password: Option<&str>) -> String {
    let mut manifest = String::new();
    if let Some(password) = password {
        manifest.push_str(&CREDENTIAL.replace("__PASSWORD__", password));
    }
    manifest.push_str(SERVICE);
    manifest.push_str(WORKLOAD);
    if password.is_some() {
        manifest.push_str(CREDENTIAL_VOLUME);
    }
    manifest
        .replace("__NAMESPACE__", namespace)
        .replace("__NAME__", name)
}

fn namespace_manifest(name: &str) -> String {
    format!("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: {name}\n")
}

const LOG_AGENT: &str = r#"
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: log-agent
  namespace: kel-system
  labels:
    kelproject.com/name: log-agent
spec:
  template:
    spec:
      containers:
      - name: log-agent
        image: "{{ image }}"
"#;

const BUILDS_GC: &str = r#"
apiVersion: batch/v1
kind: CronJob
metadata:
  name: builds-gc
  namespace: kel-builds
"#;

const CLUSTER_INFO: &str = "master: {{ cluster.master_ip }}\ncluster: {{ cluster.name }}\n";

fn kel_manifests() -> BTreeMap<String, String> {
    let mut manifests = BTreeMap::new();
    for namespace in ["kel-system", "kel-builds"] {
        manifests.insert(namespace.to_owned(), encode(&namespace_manifest(namespace)));
    }
    let workloads = [
        ("api-database", Some("hunter2")),
        ("api-cache", None),
        ("blobstore-data", None),
        ("blobstore", Some("blobs")),
        ("log-store", None),
        ("logstash", None),
        ("api-web", Some("web")),
        ("api-worker", Some("worker")),
        ("router", None),
    ];
    for (name, password) in workloads {
        manifests.insert(
            name.to_owned(),
            encode(&workload_manifest(name, "kel-system", password)),
        );
    }
    manifests.insert("log-agent".to_owned(), encode(LOG_AGENT));
    manifests.insert("builds-gc".to_owned(), encode(BUILDS_GC));
    manifests.insert("cluster-info".to_owned(), encode(CLUSTER_INFO));
    manifests
}

fn disk(size: u64) -> DiskConfig {
    DiskConfig {
        name: None,
        size,
        disk_type: "pd-ssd".to_owned(),
    }
}

pub(crate) fn cluster_config() -> ClusterConfig {
    let kubernetes = LayerConfig {
        version: "1.9.0".to_owned(),
        manifests: BTreeMap::from([(
            "kube-dns".to_owned(),
            encode(&workload_manifest("kube-dns", "kube-system", None)),
        )]),
        ..Default::default()
    };
    let kel = LayerConfig {
        version: "1.2.0".to_owned(),
        images: BTreeMap::from([("router".to_owned(), ROUTER_IMAGE.to_owned())]),
        bundles: BTreeMap::from([
            ("router".to_owned(), json!({ "url": ROUTER_BUNDLE_URL })),
            ("blobstore".to_owned(), json!({ "url": "https://storage.example.com/blobstore.tgz" })),
            ("api".to_owned(), json!({ "url": "https://storage.example.com/api.tgz" })),
        ]),
        manifests: kel_manifests(),
    };

    ClusterConfig {
        name: "test".to_owned(),
        provider: ProviderConfig {
            kind: ProviderKind::DryRun,
            params: ResourceConfig::new(),
        },
        infrastructure: InfrastructureConfig {
            network: ResourceConfig::from([("cidr".to_owned(), json!("10.240.0.0/16"))]),
            etcd: ResourceConfig::from([("size".to_owned(), json!(3))]),
            master: ResourceConfig::new(),
            nodes: vec![
                ResourceConfig::from([("name".to_owned(), json!("pool-a"))]),
                ResourceConfig::from([("name".to_owned(), json!("pool-b"))]),
            ],
        },
        layers: BTreeMap::from([("kubernetes".to_owned(), kubernetes), ("kel".to_owned(), kel)]),
        resources: PlatformResources {
            disks: BTreeMap::from([
                ("api-database".to_owned(), disk(100)),
                ("api-cache".to_owned(), disk(10)),
                ("blobstore-data".to_owned(), disk(500)),
            ]),
            router_ip: Some(ROUTER_IP.to_owned()),
        },
    }
}

/// Rotate the api database credential
pub(crate) fn set_database_password(config: &mut ClusterConfig, password: &str) {
    if let Some(kel) = config.layers.get_mut("kel") {
        kel.manifests.insert(
            "api-database".to_owned(),
            encode(&workload_manifest("api-database", "kel-system", Some(password))),
        );
    }
}
