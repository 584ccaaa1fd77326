//! Pipeline definition and loading
//!
//! Supports YAML and TOML pipeline files.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::{RestchainError, Result};

/// Maximum pipeline file size (1 MB)
const MAX_PIPELINE_FILE_SIZE: u64 = 1024 * 1024;

/// A string that redacts its value in Debug output to prevent credential leakage
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(pub String);

impl SecretString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "SecretString(\"\")")
        } else {
            write!(f, "SecretString(\"[REDACTED]\")")
        }
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString(s)
    }
}

impl std::str::FromStr for SecretString {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(SecretString(s.to_string()))
    }
}

/// A complete pipeline: connection settings, seed variables, commands and
/// the entries saved once every command has run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base URL every endpoint is appended to
    #[serde(default)]
    pub url: String,

    /// API key sent as the `apikey` query parameter
    #[serde(default, rename = "api-key", alias = "api_key", skip_serializing_if = "SecretString::is_empty")]
    pub api_key: SecretString,

    /// Request timeout (e.g., "30s", "2m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Variables available before the first command runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableConfig>,

    /// Commands in execution order
    #[serde(default)]
    pub commands: Vec<CommandConfig>,

    /// Values written back to the host after the last command
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub saves: Vec<SaveConfig>,
}

/// A seed variable. A list value defines a multi-valued variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    #[serde(default)]
    pub value: JsonValue,
}

impl VariableConfig {
    /// The value list this variable seeds the store with.
    pub fn values(&self) -> Vec<JsonValue> {
        match &self.value {
            JsonValue::Null => Vec::new(),
            JsonValue::String(s) if s.trim().is_empty() => Vec::new(),
            JsonValue::Array(items) => items.clone(),
            other => vec![other.clone()],
        }
    }
}

/// One request step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Label used in logs and reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Endpoint template, relative to the base URL
    pub endpoint: String,

    /// HTTP method (GET, POST, PUT, PATCH)
    #[serde(default = "default_method")]
    pub method: String,

    /// Accepted response type: json or xml
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,

    /// Values for `{name}` placeholders
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, String>,

    /// Query parameters
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, String>,

    /// Extra request headers
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetConfig>,

    /// Capture the whole response under a variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyConfig>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Row filter for target extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Expected value, may reference a variable (`$name`)
    #[serde(default)]
    pub value: String,
    /// all | first | last | random | none
    #[serde(default)]
    pub alt: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub var: String,
    #[serde(default)]
    pub path: String,
    /// raw (default) or text
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConfig {
    pub var: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<UpdateEntryConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEntryConfig {
    pub path: String,
    #[serde(default)]
    pub value: String,
}

/// Request body template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodyConfig {
    /// Content type: json or xml
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// File holding the body template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<PathBuf>,

    /// Inline body template, used when no file is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Space separated tags wrapped around the body, innermost first
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub wrapper: String,
}

/// An entry written back to the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveConfig {
    /// property, metadata or group
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    /// Variable holding the values
    pub value: String,
    /// first | last | random | each | :delimiter
    #[serde(default)]
    pub choice: String,
    #[serde(default)]
    pub overwrite: bool,
    /// Fields of a group save, read from each stored record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<GroupEntryConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupEntryConfig {
    pub name: String,
    #[serde(default)]
    pub path: String,
}

/// Load a pipeline from a YAML or TOML file
pub fn load_pipeline(path: &Path) -> Result<PipelineConfig> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > MAX_PIPELINE_FILE_SIZE {
        return Err(RestchainError::Config(format!(
            "Pipeline file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_PIPELINE_FILE_SIZE
        )));
    }

    let content = fs::read_to_string(path)?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    parse_pipeline(&content, extension)
}

/// Parse pipeline text. `extension` picks the format; anything other than
/// yaml/yml/toml tries YAML first, then TOML.
pub fn parse_pipeline(content: &str, extension: &str) -> Result<PipelineConfig> {
    let config: PipelineConfig = match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content)
            .map_err(|e| RestchainError::Config(format!("Failed to parse YAML pipeline: {}", e)))?,
        "toml" => toml::from_str(content)
            .map_err(|e| RestchainError::Config(format!("Failed to parse TOML pipeline: {}", e)))?,
        _ => serde_yaml::from_str(content).or_else(|_| {
            toml::from_str(content)
                .map_err(|e| RestchainError::Config(format!("Failed to parse pipeline: {}", e)))
        })?,
    };

    validate_pipeline_structure(&config)?;
    Ok(config)
}

fn validate_pipeline_structure(config: &PipelineConfig) -> Result<()> {
    if config.commands.is_empty() {
        return Err(RestchainError::Config(
            "Pipeline must have at least one command".to_string(),
        ));
    }

    for (i, command) in config.commands.iter().enumerate() {
        if command.endpoint.trim().is_empty() {
            return Err(RestchainError::Config(format!(
                "Command {} must have an endpoint",
                i + 1
            )));
        }
    }

    Ok(())
}

/// Apply `NAME=VALUE` overrides from the command line.
///
/// Repeating a name collects all its values into one multi-valued variable,
/// which replaces any configured variable of the same name.
pub fn apply_cli_variables(config: &mut PipelineConfig, vars: &[String]) -> Result<()> {
    let mut overrides: IndexMap<String, Vec<JsonValue>> = IndexMap::new();
    for var in vars {
        let (name, value) = var.split_once('=').ok_or_else(|| {
            RestchainError::Config(format!("Invalid variable '{}', expected NAME=VALUE", var))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RestchainError::Config(format!("Invalid variable '{}', empty name", var)));
        }
        overrides
            .entry(name.to_string())
            .or_default()
            .push(JsonValue::String(value.to_string()));
    }

    for (name, values) in overrides {
        let value = if values.len() == 1 {
            values.into_iter().next().unwrap_or_default()
        } else {
            JsonValue::Array(values)
        };
        let store_key = crate::store::canonical_name(&name);
        match config
            .variables
            .iter_mut()
            .find(|v| crate::store::canonical_name(&v.name) == store_key)
        {
            Some(existing) => existing.value = value,
            None => config.variables.push(VariableConfig { name, value }),
        }
    }

    Ok(())
}
