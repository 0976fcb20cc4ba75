//! Client seam for the cluster API server.
//!
//! Objects travel as untyped JSON documents. Only the handful of fields the
//! orchestrator needs (kind, name, namespace, labels) are ever interpreted.

mod handle;
mod kind;
mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

use crate::manifest::ManifestError;

pub use handle::ResourceHandle;
pub use kind::ResourceKind;
pub use memory::{ApiCall, MemoryClusterApi};

pub const DEFAULT_NAMESPACE: &str = "default";

/// Label key and value pairs that must all be present on a match
pub type LabelSelector = BTreeMap<String, String>;

/// Identity of one object on the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectId {
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: impl Into<String>) -> Self {
        let namespace = if kind.is_namespaced() {
            Some(namespace.unwrap_or(DEFAULT_NAMESPACE).to_owned())
        } else {
            None
        };
        Self {
            kind,
            namespace,
            name: name.into(),
        }
    }

    /// Identity from `metadata.name` and `metadata.namespace`
    pub fn from_document(kind: ResourceKind, document: &Value) -> Result<Self, ManifestError> {
        let name = document
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| ManifestError::MissingField {
                document: kind.to_string(),
                field: "metadata.name",
            })?;
        let namespace = document.pointer("/metadata/namespace").and_then(Value::as_str);
        Ok(Self::new(kind, namespace, name))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{} {}/{}", self.kind, namespace, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Read one label from `metadata.labels`
pub fn document_label<'a>(document: &'a Value, key: &str) -> Option<&'a str> {
    document
        .pointer("/metadata/labels")?
        .get(key)?
        .as_str()
}

pub fn matches_selector(document: &Value, selector: &LabelSelector) -> bool {
    selector
        .iter()
        .all(|(key, value)| document_label(document, key) == Some(value.as_str()))
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0} already exists")]
    AlreadyExists(ObjectId),
    #[error("{0} not found")]
    NotFound(ObjectId),
    #[error("More than one {kind} in \"{namespace}\" matches {selector:?}")]
    MultipleMatches {
        kind: ResourceKind,
        namespace: String,
        selector: LabelSelector,
    },
    #[error("{0} cannot be scaled")]
    NotScalable(ObjectId),
    #[error("Cluster API request failed: {0}")]
    Other(String),
}

/// Operations the orchestrator needs from the cluster API server
#[async_trait]
pub trait ClusterApi: Debug + Send + Sync {
    /// The live document, or `None` when the object does not exist
    async fn retrieve(&self, id: &ObjectId) -> Result<Option<Value>, ApiError>;

    async fn exists(&self, id: &ObjectId) -> Result<bool, ApiError> {
        Ok(self.retrieve(id).await?.is_some())
    }

    async fn create(&self, id: &ObjectId, document: &Value) -> Result<Value, ApiError>;

    async fn update(&self, id: &ObjectId, document: &Value) -> Result<Value, ApiError>;

    async fn delete(&self, id: &ObjectId) -> Result<(), ApiError>;

    async fn scale(&self, id: &ObjectId, replicas: u32) -> Result<(), ApiError>;

    /// The single object of `kind` in `namespace` carrying every selector label
    async fn find_one(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Option<Value>, ApiError>;

    /// Replace a running workload with `next`, shifting replicas over
    /// gradually and removing `current` once `next` is available.
    async fn rolling_replace(&self, current: &ObjectId, next: &Value) -> Result<(), ApiError>;
}
