use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::api::{ClusterApi, ResourceHandle, ResourceKind};
use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::outputs::DiscoveredOutputs;

use super::{
    ManifestContext, ManifestContextResolver, ManifestError, TemplateEngine, WorkloadParams,
    decode_manifest,
};

/// Rendered objects of one manifest grouped by kind, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDocumentSet {
    objs: BTreeMap<ResourceKind, Vec<ResourceHandle>>,
}

impl ResolvedDocumentSet {
    pub fn push(&mut self, handle: ResourceHandle) {
        self.objs.entry(handle.kind()).or_default().push(handle);
    }

    pub fn get(&self, kind: ResourceKind) -> &[ResourceHandle] {
        self.objs.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn take(&mut self, kind: ResourceKind) -> Vec<ResourceHandle> {
        self.objs.remove(&kind).unwrap_or_default()
    }

    pub fn first(&self, kind: ResourceKind) -> Option<&ResourceHandle> {
        self.get(kind).first()
    }

    pub fn take_first(&mut self, kind: ResourceKind) -> Option<ResourceHandle> {
        self.take(kind).into_iter().next()
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        !self.get(kind).is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.objs.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.objs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders manifests and binds each document to its object on the cluster
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'a> {
    config: &'a ClusterConfig,
    outputs: &'a DiscoveredOutputs,
    api: &'a dyn ClusterApi,
    engine: &'a dyn TemplateEngine,
}

impl<'a> Materializer<'a> {
    pub fn new(
        config: &'a ClusterConfig,
        outputs: &'a DiscoveredOutputs,
        api: &'a dyn ClusterApi,
        engine: &'a dyn TemplateEngine,
    ) -> Self {
        Self {
            config,
            outputs,
            api,
            engine,
        }
    }

    /// Render `layer/manifest` and return its documents keyed by kind.
    ///
    /// A document whose object already exists gets its live view loaded from
    /// the cluster, while its desired view stays the freshly rendered
    /// document.
    #[instrument(skip(self, ctx, workload))]
    pub async fn get_api_objs(
        &self,
        layer: &str,
        manifest: &str,
        ctx: ManifestContext,
        workload: Option<WorkloadParams<'_>>,
    ) -> Result<ResolvedDocumentSet, ClusterError> {
        let ctx = ManifestContextResolver::new(self.config).resolve(layer, manifest, ctx, workload)?;
        let rendered = self.render(layer, manifest, ctx)?;

        let mut objs = ResolvedDocumentSet::default();
        for document in parse_documents(layer, manifest, &rendered)? {
            let mut handle = ResourceHandle::from_document(manifest, document)?;
            if handle.exists(self.api).await? {
                debug!(object = %handle.id(), "found existing object");
                handle.reload(self.api).await?;
            }
            objs.push(handle);
        }
        Ok(objs)
    }

    /// Render without touching the cluster
    pub fn render(
        &self,
        layer: &str,
        manifest: &str,
        ctx: ManifestContext,
    ) -> Result<String, ClusterError> {
        let source = self.config.manifest_source(layer, manifest)?;
        let mut variables = ctx.into_map();
        variables.insert("cluster".to_owned(), self.cluster_view());

        decode_manifest(self.engine, source, &Value::Object(variables)).map_err(|err| {
            ManifestError::Render {
                layer: layer.to_owned(),
                manifest: manifest.to_owned(),
                reason: err.to_string(),
            }
            .into()
        })
    }

    fn cluster_view(&self) -> Value {
        json!({
            "name": self.config.name,
            "master_ip": self.outputs.master_ip,
            "router_ip": self.outputs.router_ip.as_ref().or(self.config.resources.router_ip.as_ref()),
            "node_join_token": self.outputs.node_join_token,
            "etcd_endpoints": self.outputs.etcd_endpoints,
        })
    }
}

/// Split a rendered multi-document YAML stream, dropping empty documents
fn parse_documents(layer: &str, manifest: &str, rendered: &str) -> Result<Vec<Value>, ManifestError> {
    let render_error = |reason: String| ManifestError::Render {
        layer: layer.to_owned(),
        manifest: manifest.to_owned(),
        reason,
    };
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(rendered) {
        let mut value =
            serde_yaml::Value::deserialize(document).map_err(|err| render_error(err.to_string()))?;
        if value.is_null() {
            continue;
        }
        // `<<: *anchor` keys are folded into their mapping
        value
            .apply_merge()
            .map_err(|err| render_error(err.to_string()))?;
        let value = serde_json::to_value(&value).map_err(|err| render_error(err.to_string()))?;
        documents.push(value);
    }
    Ok(documents)
}
