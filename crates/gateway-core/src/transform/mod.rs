//! Transform Engine (SPEC_FULL.md §4.D): extracts fields via path expressions and applies
//! built-in/pluggable value transforms.

mod path;
mod plugins;

pub use plugins::TransformPlugin;

use std::collections::HashMap;

use serde_json::Value;

use crate::types::{ResponseSpec, TransformSpec};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("invalid path expression {0}")]
    InvalidPath(String),
    #[error("unknown transform operation {0}")]
    UnknownOperation(String),
    #[error("plugin {0} failed: {1}")]
    PluginFailed(String, String),
}

/// Parses raw response bytes once and applies an endpoint's [`ResponseSpec`] to shape the
/// result (SPEC_FULL.md §4.D).
pub struct TransformEngine {
    plugins: HashMap<String, Box<dyn TransformPlugin>>,
}

impl Default for TransformEngine {
    fn default() -> Self {
        let mut engine = TransformEngine { plugins: HashMap::new() };
        plugins::register_builtins(&mut engine);
        engine
    }
}

impl TransformEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_plugin(&mut self, name: impl Into<String>, plugin: Box<dyn TransformPlugin>) {
        self.plugins.insert(name.into(), plugin);
    }

    pub fn transform(&self, body: &[u8], spec: &ResponseSpec) -> Result<Value, TransformError> {
        let tree: Value = serde_json::from_slice(body)
            .map_err(|e| TransformError::InvalidPath(format!("body is not valid JSON: {e}")))?;
        self.transform_value(&tree, spec)
    }

    pub fn transform_value(&self, tree: &Value, spec: &ResponseSpec) -> Result<Value, TransformError> {
        let mut result = serde_json::Map::new();

        for (field, expr) in &spec.mapping {
            let matches = path::evaluate(tree, expr)?;
            match matches.len() {
                0 => continue,
                1 => {
                    result.insert(field.clone(), matches.into_iter().next().unwrap().clone());
                }
                _ => {
                    result.insert(field.clone(), Value::Array(matches.into_iter().cloned().collect()));
                }
            }
        }

        for transform in &spec.transforms {
            if let Some(current) = result.get(&transform.field).cloned() {
                let transformed = self.apply(&current, transform)?;
                result.insert(transform.field.clone(), transformed);
            }
        }

        Ok(Value::Object(result))
    }

    fn apply(&self, value: &Value, transform: &TransformSpec) -> Result<Value, TransformError> {
        if transform.op == "map_values" {
            return Ok(map_values(value, transform.values.as_ref()));
        }

        let plugin = self
            .plugins
            .get(&transform.op)
            .ok_or_else(|| TransformError::UnknownOperation(transform.op.clone()))?;
        plugin
            .transform(value, transform.params.as_ref())
            .map_err(|e| TransformError::PluginFailed(transform.op.clone(), e))
    }
}

fn map_values(value: &Value, mapping: Option<&HashMap<String, String>>) -> Value {
    let Some(mapping) = mapping else { return value.clone() };
    let key = stringify(value);
    match mapping.get(&key) {
        Some(mapped) => Value::String(mapped.clone()),
        None => value.clone(),
    }
}

pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
