use tracing::{info, instrument};

use crate::api::{ClusterApi, ResourceHandle, ResourceKind};
use crate::error::ClusterError;

use super::BASE_LABEL;

/// Replaces a running workload revision with a new one
#[derive(Debug, Clone, Copy)]
pub struct RollingUpgrade<'a> {
    api: &'a dyn ClusterApi,
}

impl<'a> RollingUpgrade<'a> {
    pub fn new(api: &'a dyn ClusterApi) -> Self {
        Self { api }
    }

    /// Both revisions must be workloads of the same component in the same
    /// namespace, under different names.
    pub fn validate(current: &ResourceHandle, next: &ResourceHandle) -> Result<(), ClusterError> {
        if current.kind() != ResourceKind::Deployment || next.kind() != ResourceKind::Deployment {
            return Err(ClusterError::InvalidRollingUpgrade(format!(
                "only deployments can be rolled, got {} and {}",
                current.kind(),
                next.kind()
            )));
        }
        if current.namespace() != next.namespace() {
            return Err(ClusterError::InvalidRollingUpgrade(format!(
                "{} and {} live in different namespaces",
                current.id(),
                next.id()
            )));
        }
        let component = current.label(BASE_LABEL);
        if component.is_none() || component != next.label(BASE_LABEL) {
            return Err(ClusterError::InvalidRollingUpgrade(format!(
                "{} and {} do not share the \"{BASE_LABEL}\" label",
                current.id(),
                next.id()
            )));
        }
        if current.name() == next.name() {
            return Err(ClusterError::InvalidRollingUpgrade(format!(
                "{} would replace itself",
                current.id()
            )));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(from = %current.name(), to = %next.name()))]
    pub async fn replace(
        &self,
        current: &ResourceHandle,
        next: &ResourceHandle,
    ) -> Result<(), ClusterError> {
        Self::validate(current, next)?;
        self.api.rolling_replace(current.id(), next.desired()).await?;
        info!("rolled workload to new revision");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::{ApiCall, MemoryClusterApi};

    use super::*;

    fn revision(name: &str, component: &str, namespace: &str) -> ResourceHandle {
        ResourceHandle::from_document(
            component,
            json!({
                "kind": "Deployment",
                "metadata": {
                    "name": name,
                    "namespace": namespace,
                    "labels": { BASE_LABEL: component }
                }
            }),
        )
        .expect("revision")
    }

    #[fluvio_future::test]
    async fn test_replace_calls_api() {
        let api = MemoryClusterApi::new();
        let current = revision("router-aaaa1111", "router", "kel-system");
        api.seed(ResourceKind::Deployment, current.desired().clone())
            .expect("seed");
        let next = revision("router-bbbb2222", "router", "kel-system");

        RollingUpgrade::new(&api)
            .replace(&current, &next)
            .await
            .expect("replace");

        assert_eq!(
            api.mutations(),
            vec![ApiCall::RollingReplace {
                from: current.id().clone(),
                to: next.id().clone(),
            }]
        );
    }

    #[fluvio_future::test]
    async fn test_mismatched_revisions_are_rejected() {
        let api = MemoryClusterApi::new();
        let current = revision("router-aaaa1111", "router", "kel-system");
        let upgrade = RollingUpgrade::new(&api);

        for next in [
            revision("router-bbbb2222", "api-web", "kel-system"),
            revision("router-bbbb2222", "router", "default"),
            revision("router-aaaa1111", "router", "kel-system"),
        ] {
            assert!(matches!(
                upgrade.replace(&current, &next).await,
                Err(ClusterError::InvalidRollingUpgrade(_))
            ));
        }
        assert!(api.calls().is_empty());
    }
}
