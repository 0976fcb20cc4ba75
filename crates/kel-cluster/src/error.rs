use std::fmt;
use std::time::Duration;

use indicatif::style::TemplateError;

use crate::api::{ApiError, ResourceKind};
use crate::check::CheckStatuses;
use crate::config::ConfigError;
use crate::manifest::ManifestError;
use crate::pki::PkiError;
use crate::provider::ProviderError;

/// The orchestration run an error interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Upgrade,
    Destroy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Upgrade => "upgrade",
            Self::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// The types of errors that can occur during cluster orchestration
#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    /// The layered cluster configuration is incomplete or malformed
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A component that needs a disk has no disk entry in its resources
    #[error("\"{component}\" requires disk configuration")]
    MissingDiskConfig { component: String },
    /// A manifest could not be rendered or understood
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// The cluster API client reported a failure
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The infrastructure provider reported a failure
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Issuing cluster credentials failed
    #[error("Failed to issue cluster credentials")]
    Pki(#[from] PkiError),
    /// Upgrade was requested for a component that was never created
    #[error("No running workload found for \"{component}\", it must be created first")]
    NoRunningWorkload { component: String },
    /// The two ends of a rolling upgrade do not describe the same workload
    #[error("Invalid rolling upgrade: {0}")]
    InvalidRollingUpgrade(String),
    /// An object was still present when the deletion wait expired
    #[error("Timed out after {elapsed:?} ({polls} polls) waiting for {kind} \"{name}\" to be deleted")]
    DeletionTimeout {
        kind: ResourceKind,
        name: String,
        polls: u32,
        elapsed: Duration,
    },
    /// One or more pre-checks failed before any remote call was made
    #[error("Pre-checks failed before cluster operation")]
    PreflightFailed(CheckStatuses),
    /// A multi-stage run stopped part way; completed stages are left in place
    #[error("{operation} failed at \"{stage}\" after completing {completed:?}, nothing was rolled back")]
    PartiallyApplied {
        operation: Operation,
        stage: String,
        completed: Vec<String>,
        #[source]
        source: Box<ClusterError>,
    },
    #[error("Progress Error")]
    ProgressError(#[from] TemplateError),
}

impl ClusterError {
    pub(crate) fn partially_applied(
        operation: Operation,
        stage: impl Into<String>,
        completed: Vec<String>,
        source: ClusterError,
    ) -> Self {
        Self::PartiallyApplied {
            operation,
            stage: stage.into(),
            completed,
            source: Box::new(source),
        }
    }

    /// The stage or component that was in progress when a run failed
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::PartiallyApplied { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// The error that caused a run to stop, looking through `PartiallyApplied`
    pub fn root_cause(&self) -> &ClusterError {
        match self {
            Self::PartiallyApplied { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
