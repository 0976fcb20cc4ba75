use serde::{Deserialize, Serialize};

/// Values learned from the provider or the cluster while a run progresses
///
/// Stages return the outputs they discovered and the orchestrator merges
/// them once the stage completes, so later stages read them from here
/// rather than from mutated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveredOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_join_token: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub etcd_endpoints: Vec<String>,
}

impl DiscoveredOutputs {
    pub fn with_master_ip(mut self, ip: impl Into<String>) -> Self {
        self.master_ip = Some(ip.into());
        self
    }

    pub fn with_router_ip(mut self, ip: impl Into<String>) -> Self {
        self.router_ip = Some(ip.into());
        self
    }

    pub fn with_node_join_token(mut self, token: impl Into<String>) -> Self {
        self.node_join_token = Some(token.into());
        self
    }

    pub fn with_etcd_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.etcd_endpoints = endpoints;
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Fold newer outputs in. Values present in `other` replace ours,
    /// absent values leave ours untouched.
    pub fn merge(&mut self, other: DiscoveredOutputs) {
        if other.master_ip.is_some() {
            self.master_ip = other.master_ip;
        }
        if other.router_ip.is_some() {
            self.router_ip = other.router_ip;
        }
        if other.node_join_token.is_some() {
            self.node_join_token = other.node_join_token;
        }
        if !other.etcd_endpoints.is_empty() {
            self.etcd_endpoints = other.etcd_endpoints;
        }
    }
}
