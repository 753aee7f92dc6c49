//! URL/request construction (SPEC_FULL.md §4.F step 4-5), grounded on `buildURL` /
//! `buildRequest` / `applyTemplate` in the original's `executor.go`, with parameter
//! validation added per SPEC_FULL.md's `InvalidParams` taxonomy.

use std::collections::HashMap;

use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::{EndpointSpec, ParameterSpec};

/// Substitutes every `{name}` path segment with `params[name]`'s string form.
pub fn build_url(base_url: &str, path: &str, params: &HashMap<String, Value>) -> String {
    let mut url = format!("{base_url}{path}");
    for (key, value) in params {
        url = url.replace(&format!("{{{key}}}"), &value_to_string(value));
    }
    url
}

pub fn build_request(url: &str, endpoint: &EndpointSpec, params: &HashMap<String, Value>) -> Result<RequestBuilder, GatewayError> {
    let client = Client::new();
    let mut builder = client.request(endpoint.method.as_reqwest(), url);

    for (key, value) in &endpoint.headers {
        builder = builder.header(key, value);
    }

    if !endpoint.query_params.is_empty() {
        let mut query = Vec::new();
        for param in &endpoint.query_params {
            match resolve_param(param, params)? {
                Some(value) => query.push((param.name.clone(), value)),
                None => continue,
            }
        }
        builder = builder.query(&query);
    }

    if let Some(body) = &endpoint.body {
        if !body.template.is_empty() {
            let rendered = apply_template(&body.template, params);
            builder = builder.header("Content-Type", &body.content_type).body(rendered);
        }
    }

    Ok(builder)
}

/// Resolves one declared parameter against the call's `params`, falling back to its
/// `default`, then validates `required`/`pattern`/length (SPEC_FULL.md §4.F step 5).
fn resolve_param(param: &ParameterSpec, params: &HashMap<String, Value>) -> Result<Option<String>, GatewayError> {
    let resolved = match params.get(&param.name) {
        Some(value) => Some(value_to_string(value)),
        None => param.default.as_ref().map(value_to_string),
    };

    let Some(value) = resolved else {
        if param.required {
            return Err(GatewayError::InvalidParams(format!("missing required parameter {}", param.name)));
        }
        return Ok(None);
    };

    if let Some(min) = param.min_length
        && value.len() < min
    {
        return Err(GatewayError::InvalidParams(format!("parameter {} is shorter than {min} characters", param.name)));
    }
    if let Some(max) = param.max_length
        && value.len() > max
    {
        return Err(GatewayError::InvalidParams(format!("parameter {} is longer than {max} characters", param.name)));
    }
    if let Some(pattern) = &param.pattern {
        let regex = Regex::new(pattern).map_err(|e| GatewayError::InvalidParams(format!("invalid pattern for {}: {e}", param.name)))?;
        if !regex.is_match(&value) {
            return Err(GatewayError::InvalidParams(format!("parameter {} does not match pattern {pattern}", param.name)));
        }
    }

    Ok(Some(value))
}

/// Substitutes `{{name}}` placeholders in a body template.
fn apply_template(template: &str, params: &HashMap<String, Value>) -> String {
    let mut result = template.to_string();
    for (key, value) in params {
        result = result.replace(&format!("{{{{{key}}}}}"), &value_to_string(value));
    }
    result
}

pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
