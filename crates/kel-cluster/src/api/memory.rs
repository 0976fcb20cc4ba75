use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::trace;

use crate::manifest::ManifestError;

use super::{ApiError, ClusterApi, LabelSelector, ObjectId, ResourceKind, matches_selector};

/// A request received by [`MemoryClusterApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Retrieve(ObjectId),
    Find(ResourceKind),
    Create(ObjectId),
    Update(ObjectId),
    Delete(ObjectId),
    Scale(ObjectId, u32),
    RollingReplace { from: ObjectId, to: ObjectId },
}

impl ApiCall {
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Retrieve(_) | Self::Find(_))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<ObjectId, Value>,
    /// objects that were deleted but stay visible for this many more reads
    terminating: HashMap<ObjectId, u32>,
    calls: Vec<ApiCall>,
}

impl MemoryState {
    fn observe(&mut self, id: &ObjectId) -> Option<Value> {
        if let Some(remaining) = self.terminating.get_mut(id) {
            if *remaining == 0 {
                self.terminating.remove(id);
                self.objects.remove(id);
                return None;
            }
            *remaining -= 1;
        }
        self.objects.get(id).cloned()
    }
}

/// In-memory cluster API server
///
/// Records every request it receives. Deleted objects can be made to linger
/// for a number of reads to mimic graceful termination.
#[derive(Debug, Default)]
pub struct MemoryClusterApi {
    state: Mutex<MemoryState>,
    deletion_lag: u32,
}

impl MemoryClusterApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deleted objects remain visible for `reads` more retrievals
    pub fn with_deletion_lag(mut self, reads: u32) -> Self {
        self.deletion_lag = reads;
        self
    }

    /// Store an object directly, without recording a request
    pub fn seed(&self, kind: ResourceKind, document: Value) -> Result<ObjectId, ManifestError> {
        let id = ObjectId::from_document(kind, &document)?;
        self.state.lock().objects.insert(id.clone(), document);
        Ok(id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<Value> {
        self.state.lock().objects.get(id).cloned()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.state.lock().objects.contains_key(id)
    }

    pub fn objects(&self, kind: ResourceKind) -> Vec<Value> {
        self.state
            .lock()
            .objects
            .iter()
            .filter(|(id, _)| id.kind == kind)
            .map(|(_, document)| document.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    /// Recorded requests that change cluster state
    pub fn mutations(&self) -> Vec<ApiCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| !call.is_read())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

#[async_trait]
impl ClusterApi for MemoryClusterApi {
    async fn retrieve(&self, id: &ObjectId) -> Result<Option<Value>, ApiError> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::Retrieve(id.clone()));
        Ok(state.observe(id))
    }

    async fn create(&self, id: &ObjectId, document: &Value) -> Result<Value, ApiError> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::Create(id.clone()));
        if state.objects.contains_key(id) {
            return Err(ApiError::AlreadyExists(id.clone()));
        }
        trace!(object = %id, "stored");
        state.objects.insert(id.clone(), document.clone());
        Ok(document.clone())
    }

    async fn update(&self, id: &ObjectId, document: &Value) -> Result<Value, ApiError> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::Update(id.clone()));
        match state.objects.get_mut(id) {
            Some(existing) => {
                *existing = document.clone();
                Ok(document.clone())
            }
            None => Err(ApiError::NotFound(id.clone())),
        }
    }

    async fn delete(&self, id: &ObjectId) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::Delete(id.clone()));
        if !state.objects.contains_key(id) {
            return Err(ApiError::NotFound(id.clone()));
        }
        if state.terminating.contains_key(id) {
            return Ok(());
        }
        if self.deletion_lag == 0 {
            state.objects.remove(id);
        } else {
            state.terminating.insert(id.clone(), self.deletion_lag);
        }
        Ok(())
    }

    async fn scale(&self, id: &ObjectId, replicas: u32) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::Scale(id.clone(), replicas));
        let document = state
            .objects
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(id.clone()))?;
        document["spec"]["replicas"] = json!(replicas);
        Ok(())
    }

    async fn find_one(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Option<Value>, ApiError> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::Find(kind));
        let mut matches = state.objects.iter().filter(|(id, document)| {
            id.kind == kind
                && id.namespace.as_deref() == Some(namespace)
                && !state.terminating.contains_key(*id)
                && matches_selector(document, selector)
        });
        let found = matches.next().map(|(_, document)| document.clone());
        if matches.next().is_some() {
            return Err(ApiError::MultipleMatches {
                kind,
                namespace: namespace.to_owned(),
                selector: selector.clone(),
            });
        }
        Ok(found)
    }

    async fn rolling_replace(&self, current: &ObjectId, next: &Value) -> Result<(), ApiError> {
        let next_id = ObjectId::from_document(current.kind, next)
            .map_err(|err| ApiError::Other(err.to_string()))?;
        let mut state = self.state.lock();
        state.calls.push(ApiCall::RollingReplace {
            from: current.clone(),
            to: next_id.clone(),
        });
        if !state.objects.contains_key(current) {
            return Err(ApiError::NotFound(current.clone()));
        }
        if state.objects.contains_key(&next_id) {
            return Err(ApiError::AlreadyExists(next_id));
        }
        state.objects.insert(next_id, next.clone());
        state.objects.remove(current);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(name: &str, component: &str) -> Value {
        json!({
            "kind": "Deployment",
            "metadata": {
                "name": name,
                "namespace": "kel-system",
                "labels": { "kelproject.com/name": component }
            },
            "spec": { "replicas": 3 }
        })
    }

    fn selector(component: &str) -> LabelSelector {
        LabelSelector::from([("kelproject.com/name".to_owned(), component.to_owned())])
    }

    #[fluvio_future::test]
    async fn test_create_twice_conflicts() {
        let api = MemoryClusterApi::new();
        let document = deployment("router-aaaa", "router");
        let id = ObjectId::from_document(ResourceKind::Deployment, &document).expect("id");

        api.create(&id, &document).await.expect("first");
        assert!(matches!(
            api.create(&id, &document).await,
            Err(ApiError::AlreadyExists(_))
        ));
    }

    #[fluvio_future::test]
    async fn test_find_one() {
        let api = MemoryClusterApi::new();
        api.seed(ResourceKind::Deployment, deployment("router-aaaa", "router"))
            .expect("seed");
        api.seed(ResourceKind::Deployment, deployment("api-web-bbbb", "api-web"))
            .expect("seed");

        let found = api
            .find_one(ResourceKind::Deployment, "kel-system", &selector("router"))
            .await
            .expect("find")
            .expect("router");
        assert_eq!(found["metadata"]["name"], "router-aaaa");

        let missing = api
            .find_one(ResourceKind::Deployment, "default", &selector("router"))
            .await
            .expect("find");
        assert!(missing.is_none());

        api.seed(ResourceKind::Deployment, deployment("router-cccc", "router"))
            .expect("seed");
        assert!(matches!(
            api.find_one(ResourceKind::Deployment, "kel-system", &selector("router"))
                .await,
            Err(ApiError::MultipleMatches { .. })
        ));
    }

    #[fluvio_future::test]
    async fn test_deleted_object_lingers() {
        let api = MemoryClusterApi::new().with_deletion_lag(2);
        let id = api
            .seed(ResourceKind::Deployment, deployment("router-aaaa", "router"))
            .expect("seed");

        api.delete(&id).await.expect("delete");
        assert!(api.exists(&id).await.expect("read 1"));
        assert!(api.exists(&id).await.expect("read 2"));
        assert!(!api.exists(&id).await.expect("read 3"));
        assert!(!api.contains(&id));
    }

    #[fluvio_future::test]
    async fn test_rolling_replace_swaps_objects() {
        let api = MemoryClusterApi::new();
        let current = api
            .seed(ResourceKind::Deployment, deployment("router-aaaa", "router"))
            .expect("seed");
        let next = deployment("router-bbbb", "router");

        api.rolling_replace(&current, &next).await.expect("replace");

        assert!(!api.contains(&current));
        let names: Vec<_> = api
            .objects(ResourceKind::Deployment)
            .iter()
            .map(|document| document["metadata"]["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("router-bbbb")]);
        assert_eq!(api.mutations().len(), 1);
    }
}
