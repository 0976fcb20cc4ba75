//! Turning layered manifest templates into cluster objects.

mod context;
mod materialize;
mod template;

use crate::api::ResourceKind;

pub use context::{ManifestContext, ManifestContextResolver, WorkloadParams};
pub use materialize::{Materializer, ResolvedDocumentSet};
pub use template::{JinjaEngine, RenderError, TemplateEngine, decode_manifest};

#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("Failed to render manifest \"{layer}/{manifest}\": {reason}")]
    Render {
        layer: String,
        manifest: String,
        reason: String,
    },
    #[error("Manifest \"{manifest}\" declares unsupported kind \"{kind}\"")]
    UnknownResourceKind { manifest: String, kind: String },
    #[error("Manifest \"{manifest}\" does not contain a {kind}")]
    MissingDocument { manifest: String, kind: ResourceKind },
    #[error("{document} is missing required field {field}")]
    MissingField {
        document: String,
        field: &'static str,
    },
    #[error("{document} is missing required label \"{label}\"")]
    MissingLabel { document: String, label: String },
}
