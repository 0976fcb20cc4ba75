use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest
pub const KEY_LENGTH: usize = 8;

/// Short content address of a workload and the credentials it mounts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeploymentKey(String);

impl DeploymentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeploymentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the key for a workload document and its referenced credentials.
///
/// Every document is serialized with object keys sorted at every level, so
/// the key depends only on content. Credentials are hashed in the order
/// given.
pub fn generate_key<'a>(
    workload: &Value,
    credentials: impl IntoIterator<Item = &'a Value>,
) -> DeploymentKey {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(workload));
    for credential in credentials {
        hasher.update(canonical_bytes(credential));
    }
    let digest = hasher.finalize();
    DeploymentKey(hex::encode(&digest[..KEY_LENGTH / 2]))
}

/// Compact JSON with object keys sorted recursively
pub fn canonical_bytes(document: &Value) -> Vec<u8> {
    canonicalize(document).to_string().into_bytes()
}

fn canonicalize(document: &Value) -> Value {
    match document {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> = map
                .iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            let mut canonical = Map::new();
            for (key, value) in sorted {
                canonical.insert(key.clone(), value);
            }
            Value::Object(canonical)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
