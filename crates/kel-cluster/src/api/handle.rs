use serde_json::{Map, Value};
use tracing::debug;

use crate::manifest::ManifestError;

use super::{ApiError, ClusterApi, ObjectId, ResourceKind, document_label};

/// One rendered object together with what the cluster currently holds for it
///
/// The live view is filled by [`reload`](Self::reload) and by successful
/// writes. The desired view is what will be sent on the next write; reloading
/// never touches it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceHandle {
    id: ObjectId,
    live: Option<Value>,
    desired: Value,
}

impl ResourceHandle {
    /// Wrap a freshly rendered manifest document
    pub fn from_document(manifest: &str, document: Value) -> Result<Self, ManifestError> {
        let kind_name = document
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| ManifestError::MissingField {
                document: manifest.to_owned(),
                field: "kind",
            })?;
        let kind = ResourceKind::from_kind(kind_name).ok_or_else(|| {
            ManifestError::UnknownResourceKind {
                manifest: manifest.to_owned(),
                kind: kind_name.to_owned(),
            }
        })?;
        let id = ObjectId::from_document(kind, &document)?;
        Ok(Self {
            id,
            live: None,
            desired: document,
        })
    }

    /// Wrap a document read back from the cluster
    pub fn from_live(kind: ResourceKind, document: Value) -> Result<Self, ManifestError> {
        let id = ObjectId::from_document(kind, &document)?;
        Ok(Self {
            id,
            live: Some(document.clone()),
            desired: document,
        })
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.id.kind
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.id.namespace.as_deref()
    }

    pub fn live(&self) -> Option<&Value> {
        self.live.as_ref()
    }

    pub fn desired(&self) -> &Value {
        &self.desired
    }

    pub(crate) fn desired_mut(&mut self) -> &mut Value {
        &mut self.desired
    }

    pub fn set_desired(&mut self, document: Value) {
        self.desired = document;
    }

    /// Label on the desired document
    pub fn label(&self, key: &str) -> Option<&str> {
        document_label(&self.desired, key)
    }

    /// Change the object's name, keeping the identity and document in step
    pub fn rename(&mut self, name: impl Into<String>) {
        let name = name.into();
        if let Some(metadata) = self.desired.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert("name".to_owned(), Value::String(name.clone()));
        } else if let Some(document) = self.desired.as_object_mut() {
            let mut metadata = Map::new();
            metadata.insert("name".to_owned(), Value::String(name.clone()));
            document.insert("metadata".to_owned(), Value::Object(metadata));
        }
        self.id.name = name;
    }

    pub async fn exists(&self, api: &dyn ClusterApi) -> Result<bool, ApiError> {
        api.exists(&self.id).await
    }

    /// Refresh the live view from the cluster
    pub async fn reload(&mut self, api: &dyn ClusterApi) -> Result<(), ApiError> {
        let live = api
            .retrieve(&self.id)
            .await?
            .ok_or_else(|| ApiError::NotFound(self.id.clone()))?;
        self.live = Some(live);
        Ok(())
    }

    pub async fn create(&mut self, api: &dyn ClusterApi) -> Result<(), ApiError> {
        debug!(object = %self.id, "creating");
        self.live = Some(api.create(&self.id, &self.desired).await?);
        Ok(())
    }

    pub async fn update(&mut self, api: &dyn ClusterApi) -> Result<(), ApiError> {
        debug!(object = %self.id, "updating");
        self.live = Some(api.update(&self.id, &self.desired).await?);
        Ok(())
    }

    pub async fn delete(&self, api: &dyn ClusterApi) -> Result<(), ApiError> {
        debug!(object = %self.id, "deleting");
        api.delete(&self.id).await
    }

    pub async fn scale(&self, api: &dyn ClusterApi, replicas: u32) -> Result<(), ApiError> {
        if !self.kind().is_scalable() {
            return Err(ApiError::NotScalable(self.id.clone()));
        }
        debug!(object = %self.id, replicas, "scaling");
        api.scale(&self.id, replicas).await
    }
}
