use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of object kinds a platform manifest may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Deployment,
    Service,
    Secret,
    Namespace,
    DaemonSet,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Deployment,
        ResourceKind::Service,
        ResourceKind::Secret,
        ResourceKind::Namespace,
        ResourceKind::DaemonSet,
    ];

    /// Look up the kind named by a document's `kind` field
    pub fn from_kind(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::Secret => "Secret",
            Self::Namespace => "Namespace",
            Self::DaemonSet => "DaemonSet",
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !matches!(self, Self::Namespace)
    }

    pub fn is_scalable(&self) -> bool {
        matches!(self, Self::Deployment)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
