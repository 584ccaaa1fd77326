//! Resolved command specifications
//!
//! A [`CommandSpec`] is built once from its configuration before the
//! pipeline runs. Configured placeholders, media types, the body template
//! and the filter value are settled at that point; store placeholders are
//! left for each run of the command.

use std::fmt;
use std::fs;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::errors::{RestchainError, Result};
use crate::filter::{set_values_at, value_to_string, AlternativeOption, FilterSpec};
use crate::store::VariableStore;
use super::config::{BodyConfig, CommandConfig, TargetConfig, UpdateConfig};
use super::template::{
    resolve_configured, resolve_configured_endpoint, substitute_first_values, wrap_body, StoreExpansion,
};

/// HTTP method of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    /// Anything else; such commands send no request
    Other(String),
}

impl Method {
    pub fn parse(method: &str) -> Self {
        match method.trim().to_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            _ => Method::Other(method.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Other(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Method::Other(_))
    }

    /// GET requests never carry a body.
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media type used for `Accept` and `Content-Type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    #[default]
    Json,
    Xml,
}

impl MediaType {
    /// Read a configured type such as `xml` or `application/json`. Missing
    /// or unknown values fall back to JSON.
    pub fn from_config(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return MediaType::Json;
        };
        let subtype = raw.rsplit('/').next().unwrap_or(raw).trim().to_lowercase();
        match subtype.as_str() {
            "json" => MediaType::Json,
            "xml" => MediaType::Xml,
            _ => {
                warn!(media_type = %raw, "Unknown media type, using JSON instead");
                MediaType::Json
            }
        }
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Json => "application/json",
            MediaType::Xml => "application/xml",
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, MediaType::Json)
    }
}

/// How extracted values are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetKind {
    /// As found in the response
    #[default]
    Raw,
    /// Rendered as text
    Text,
}

impl TargetKind {
    pub fn from_config(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("raw") | Some("json") => TargetKind::Raw,
            Some("text") | Some("string") => TargetKind::Text,
            Some(other) => {
                warn!(kind = %other, "Unknown target type, storing raw values");
                TargetKind::Raw
            }
        }
    }
}

/// Store whatever `path` yields under `variable`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub variable: String,
    pub path: String,
    pub kind: TargetKind,
}

impl Target {
    pub fn from_config(config: &TargetConfig) -> Self {
        Self {
            variable: config.var.clone(),
            path: config.path.clone(),
            kind: TargetKind::from_config(config.kind.as_deref()),
        }
    }

    /// Drop nulls and apply the value type.
    pub fn prepare(&self, values: Vec<JsonValue>) -> Vec<JsonValue> {
        values
            .into_iter()
            .filter(|v| !v.is_null())
            .map(|v| match self.kind {
                TargetKind::Raw => v,
                TargetKind::Text => JsonValue::String(value_to_string(&v)),
            })
            .collect()
    }
}

/// A field overwritten inside a captured response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntry {
    pub path: String,
    /// Literal text, or a variable reference such as `$status`
    pub value: String,
}

/// Whole-response capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSpec {
    pub variable: String,
    pub entries: Vec<UpdateEntry>,
}

impl UpdateSpec {
    pub fn from_config(config: &UpdateConfig) -> Self {
        Self {
            variable: config.var.clone(),
            entries: config
                .entries
                .iter()
                .map(|e| UpdateEntry {
                    path: e.path.clone(),
                    value: e.value.clone(),
                })
                .collect(),
        }
    }

    /// Write every entry into `document`. Variable references resolve to
    /// the first stored value, keeping its JSON type.
    pub fn apply(&self, document: &mut JsonValue, store: &VariableStore) -> Result<()> {
        for entry in &self.entries {
            let value = match entry.value.contains('$').then(|| store.lookup(&entry.value)).flatten() {
                Some(values) => values.first().cloned().unwrap_or(JsonValue::Null),
                None => JsonValue::String(entry.value.clone()),
            };
            let written = set_values_at(&entry.path, document, &value)?;
            debug!(path = %entry.path, written, "Captured response updated");
        }
        Ok(())
    }
}

/// One pipeline step, ready to run
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: String,
    pub method: Method,
    /// Endpoint with configured placeholders filled in
    pub endpoint: String,
    pub parameters: IndexMap<String, String>,
    pub headers: IndexMap<String, String>,
    pub accept: MediaType,
    pub content_type: MediaType,
    /// Body template, already wrapped
    pub body: String,
    pub filter: FilterSpec,
    pub targets: Vec<Target>,
    pub update: Option<UpdateSpec>,
    /// Configured placeholders that had no value
    pub unresolved: Vec<String>,
}

impl CommandSpec {
    /// Build a command. The store is consulted for a variable filter value.
    pub fn from_config(config: &CommandConfig, index: usize, store: &VariableStore) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(RestchainError::Config(format!(
                "Command {} must have an endpoint",
                index + 1
            )));
        }

        let name = config
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("command-{}", index + 1));

        let endpoint = resolve_configured_endpoint(&config.endpoint, &config.values);
        let mut unresolved = endpoint.unresolved;

        let (content_type, body) = match &config.body {
            Some(body_config) => {
                let content_type = MediaType::from_config(body_config.kind.as_deref());
                let raw = read_body_template(body_config);
                let configured = resolve_configured(&raw, &config.values);
                for placeholder in configured.unresolved {
                    if !unresolved.contains(&placeholder) {
                        unresolved.push(placeholder);
                    }
                }
                let body = wrap_body(&configured.text, &body_config.wrapper, content_type.as_mime());
                (content_type, body)
            }
            None => (MediaType::Json, String::new()),
        };

        let filter = match &config.filter {
            Some(filter_config) => FilterSpec::new(
                filter_config.key.clone(),
                filter_config.fallback.clone(),
                resolve_filter_value(&filter_config.value, store),
                AlternativeOption::parse_or_none(&filter_config.alt),
            ),
            None => FilterSpec::default(),
        };

        let accept = MediaType::from_config(config.accept.as_deref());
        debug!(command = %name, accept = accept.as_mime(), "Command initialized");

        Ok(Self {
            name,
            method: Method::parse(&config.method),
            endpoint: endpoint.text,
            parameters: config.parameters.clone(),
            headers: config.headers.clone(),
            accept,
            content_type,
            body,
            filter,
            targets: config.targets.iter().map(Target::from_config).collect(),
            update: config.update.as_ref().map(UpdateSpec::from_config),
            unresolved,
        })
    }

    /// Concrete endpoints for the current store contents.
    pub fn resolve_endpoints(&self, store: &VariableStore) -> Result<StoreExpansion> {
        StoreExpansion::new(&self.endpoint, store)
    }

    /// Body for the current store contents.
    pub fn resolve_body(&self, store: &VariableStore) -> String {
        substitute_first_values(&self.body, store)
    }

    /// Target variable names mapped to their paths. Targets without a
    /// variable are left out so their paths do not shape the rows.
    pub fn target_paths(&self) -> IndexMap<String, String> {
        self.targets
            .iter()
            .filter(|t| !t.variable.trim().is_empty())
            .map(|t| (t.variable.clone(), t.path.clone()))
            .collect()
    }
}

fn read_body_template(config: &BodyConfig) -> String {
    if let Some(path) = &config.src {
        debug!(path = %path.display(), "Reading body template");
        match fs::read_to_string(path) {
            Ok(content) => return content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read body template, sending an empty body");
                return String::new();
            }
        }
    }
    config.content.clone().unwrap_or_default()
}

fn resolve_filter_value(raw: &str, store: &VariableStore) -> String {
    if !raw.contains('$') {
        return raw.to_string();
    }
    if store.contains(raw) {
        let value = store.first_string(raw);
        debug!(variable = %raw, value = %value, "Filter value taken from variable");
        value
    } else {
        warn!(variable = %raw, "Unknown variable in filter value, comparing literally");
        raw.to_string()
    }
}
