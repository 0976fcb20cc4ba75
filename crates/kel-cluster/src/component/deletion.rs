use std::time::{Duration, Instant};

use derive_builder::Builder;
use fluvio_future::timer::sleep;
use once_cell::sync::Lazy;
use tracing::{debug, instrument};

use crate::api::{ClusterApi, ResourceHandle};
use crate::config::ConfigError;
use crate::error::ClusterError;

static DELETE_POLL_MS: Lazy<u64> = Lazy::new(|| {
    let var_value = std::env::var("KEL_CLUSTER_DELETE_POLL_MS").unwrap_or_default();
    var_value.parse().unwrap_or(1000)
});

static DELETE_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
    let var_value = std::env::var("KEL_CLUSTER_DELETE_TIMEOUT").unwrap_or_default();
    var_value.parse().unwrap_or(300)
});

/// How long and how often to poll for an object to disappear
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(build_fn(private, name = "build_impl"))]
pub struct DeletionPolicy {
    /// Wait before the second poll
    #[builder(default = "Duration::from_millis(*DELETE_POLL_MS)")]
    interval: Duration,
    /// Each wait is this many times the previous one
    #[builder(default = "2")]
    backoff: u32,
    #[builder(default = "Duration::from_secs(10)")]
    max_interval: Duration,
    /// Give up once the next wait would end past this
    #[builder(default = "Duration::from_secs(*DELETE_TIMEOUT_SECS)")]
    timeout: Duration,
}

impl DeletionPolicy {
    pub fn builder() -> DeletionPolicyBuilder {
        DeletionPolicyBuilder::default()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn backoff(&self) -> u32 {
        self.backoff
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.saturating_mul(self.backoff.max(1)).min(self.max_interval)
    }
}

impl Default for DeletionPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(*DELETE_POLL_MS),
            backoff: 2,
            max_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(*DELETE_TIMEOUT_SECS),
        }
    }
}

impl DeletionPolicyBuilder {
    pub fn build(&self) -> Result<DeletionPolicy, ConfigError> {
        self.build_impl()
            .map_err(|err| ConfigError::MissingRequiredConfig(err.to_string()))
    }
}

/// Poll until `handle` no longer exists and return how many polls it took
#[instrument(skip_all, fields(object = %handle.id()))]
pub async fn wait_for_deletion(
    api: &dyn ClusterApi,
    handle: &ResourceHandle,
    policy: &DeletionPolicy,
) -> Result<u32, ClusterError> {
    let started = Instant::now();
    let mut interval = policy.interval;
    let mut polls = 0;

    loop {
        polls += 1;
        if !handle.exists(api).await? {
            debug!(polls, "object is gone");
            return Ok(polls);
        }

        let elapsed = started.elapsed();
        if elapsed + interval > policy.timeout {
            return Err(ClusterError::DeletionTimeout {
                kind: handle.kind(),
                name: handle.name().to_owned(),
                polls,
                elapsed,
            });
        }

        debug!(polls, ?interval, "object still terminating");
        sleep(interval).await;
        interval = policy.next_interval(interval);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::{MemoryClusterApi, ResourceKind};

    use super::*;

    fn namespace() -> ResourceHandle {
        ResourceHandle::from_document(
            "kel-builds",
            json!({ "kind": "Namespace", "metadata": { "name": "kel-builds" } }),
        )
        .expect("namespace")
    }

    fn fast_policy(timeout: Duration) -> DeletionPolicy {
        DeletionPolicy::builder()
            .interval(Duration::from_millis(1))
            .max_interval(Duration::from_millis(4))
            .timeout(timeout)
            .build()
            .expect("policy")
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = fast_policy(Duration::from_secs(1));
        let mut interval = policy.interval();
        let mut seen = Vec::new();
        for _ in 0..4 {
            interval = policy.next_interval(interval);
            seen.push(interval.as_millis());
        }
        assert_eq!(seen, vec![2, 4, 4, 4]);
    }

    #[fluvio_future::test]
    async fn test_returns_once_gone() {
        let api = MemoryClusterApi::new().with_deletion_lag(1);
        let handle = namespace();
        api.seed(ResourceKind::Namespace, handle.desired().clone())
            .expect("seed");
        handle.delete(&api).await.expect("delete");

        let polls = wait_for_deletion(&api, &handle, &fast_policy(Duration::from_secs(5)))
            .await
            .expect("deleted");
        assert_eq!(polls, 2);
    }

    #[fluvio_future::test]
    async fn test_times_out() {
        let api = MemoryClusterApi::new().with_deletion_lag(u32::MAX);
        let handle = namespace();
        api.seed(ResourceKind::Namespace, handle.desired().clone())
            .expect("seed");
        handle.delete(&api).await.expect("delete");

        let err = wait_for_deletion(&api, &handle, &fast_policy(Duration::from_millis(20)))
            .await
            .expect_err("timeout");
        assert!(matches!(
            err,
            ClusterError::DeletionTimeout { kind: ResourceKind::Namespace, polls, .. } if polls >= 1
        ));
    }
}
