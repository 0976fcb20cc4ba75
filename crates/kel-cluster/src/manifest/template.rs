use std::fmt::Debug;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use minijinja::Environment;
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct RenderError(String);

impl RenderError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Renders one template source against a set of variables
pub trait TemplateEngine: Debug + Send + Sync {
    fn render(&self, source: &str, variables: &Value) -> Result<String, RenderError>;
}

/// Jinja templates with a `b64` filter and function
#[derive(Debug, Default, Clone, Copy)]
pub struct JinjaEngine;

impl TemplateEngine for JinjaEngine {
    fn render(&self, source: &str, variables: &Value) -> Result<String, RenderError> {
        let mut env = Environment::new();
        env.add_filter("b64", b64);
        env.add_function("b64", b64);
        env.render_str(source, variables)
            .map_err(|err| RenderError::new(err.to_string()))
    }
}

fn b64(value: String) -> String {
    STANDARD.encode(value)
}

/// Decode a base64 manifest and render it
pub fn decode_manifest(
    engine: &dyn TemplateEngine,
    data: &str,
    variables: &Value,
) -> Result<String, RenderError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|err| RenderError::new(format!("manifest is not valid base64: {err}")))?;
    let source = String::from_utf8(bytes)
        .map_err(|err| RenderError::new(format!("manifest is not valid utf-8: {err}")))?;
    engine.render(&source, variables)
}
