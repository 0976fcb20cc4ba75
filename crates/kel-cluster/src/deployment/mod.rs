//! Content-addressed workload identities.
//!
//! Every workload created by the platform is named `<name>-<key>` and carries
//! its key in the `deployment` label, next to the stable
//! `kelproject.com/name` base label that survives upgrades.

mod key;
mod rolling;

use serde_json::{Map, Value};

use crate::api::ResourceHandle;

pub use key::{DeploymentKey, KEY_LENGTH, canonical_bytes, generate_key};
pub use rolling::RollingUpgrade;

/// Stable label naming the component a workload belongs to
pub const BASE_LABEL: &str = "kelproject.com/name";
/// Label carrying the deployment key of a workload revision
pub const DEPLOYMENT_LABEL: &str = "deployment";

const KEY_LABEL_PATHS: [&[&str]; 3] = [
    &["metadata", "labels"],
    &["spec", "selector", "matchLabels"],
    &["spec", "template", "metadata", "labels"],
];

/// Credentials mounted by the workload's volumes, in volume order.
/// Volumes naming a credential that was not rendered are skipped.
pub fn referenced_credentials<'a>(
    workload: &ResourceHandle,
    credentials: &'a [ResourceHandle],
) -> Vec<&'a ResourceHandle> {
    let Some(volumes) = workload
        .desired()
        .pointer("/spec/template/spec/volumes")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    volumes
        .iter()
        .filter_map(|volume| volume.pointer("/secret/secretName").and_then(Value::as_str))
        .filter_map(|secret_name| {
            credentials
                .iter()
                .find(|credential| credential.name() == secret_name)
        })
        .collect()
}

/// Key of a rendered workload and the credentials it references
pub fn workload_key(workload: &ResourceHandle, credentials: &[ResourceHandle]) -> DeploymentKey {
    let referenced = referenced_credentials(workload, credentials);
    generate_key(
        workload.desired(),
        referenced.into_iter().map(ResourceHandle::desired),
    )
}

/// Suffix the workload name with its key and label it with the key on the
/// object, its selector, and its pod template
pub fn stamp(workload: &mut ResourceHandle, key: &DeploymentKey) {
    let name = format!("{}-{}", workload.name(), key);
    workload.rename(name);

    let document = workload.desired_mut();
    for path in KEY_LABEL_PATHS {
        if let Some(labels) = object_at(document, path) {
            labels.insert(DEPLOYMENT_LABEL.to_owned(), Value::String(key.to_string()));
        }
    }
}

/// Walk `path`, creating empty objects where they are missing
fn object_at<'a>(document: &'a mut Value, path: &[&str]) -> Option<&'a mut Map<String, Value>> {
    let mut current = document;
    for segment in path {
        current = current
            .as_object_mut()?
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current.as_object_mut()
}
