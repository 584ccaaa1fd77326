//! Variable store shared by the commands of one pipeline run
//!
//! Every variable holds an ordered, non-empty list of JSON values. Names are
//! canonicalized to the `{$name}` form before any access, so `id`, `$id`,
//! `{id}` and `{$id}` all address the same variable.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::errors::{RestchainError, Result};
use crate::filter::value_to_string;

/// Canonical key for a variable name: `x`, `$x`, `{x}` and `{$x}` all map to
/// `{$x}`.
///
/// ```
/// use restchain::store::canonical_name;
///
/// assert_eq!(canonical_name("id"), "{$id}");
/// assert_eq!(canonical_name("{$id}"), "{$id}");
/// ```
pub fn canonical_name(name: &str) -> String {
    let name = name.trim();
    let name = name.strip_prefix('{').unwrap_or(name);
    let name = name.strip_prefix('$').unwrap_or(name);
    let name = name.strip_suffix('}').unwrap_or(name);
    format!("{{${}}}", name)
}

/// Multi-valued variables owned by a single pipeline run
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    variables: HashMap<String, Vec<JsonValue>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `values` under `name`, replacing any previous values.
    ///
    /// A blank name is accepted and ignored since no variable was requested.
    /// An empty value list is rejected and leaves the previous value intact.
    pub fn set(&mut self, name: &str, values: Vec<JsonValue>) -> Result<()> {
        if name.trim().is_empty() {
            return Ok(());
        }

        let key = canonical_name(name);
        if values.is_empty() {
            return Err(RestchainError::EmptyValues(key));
        }

        if self.variables.contains_key(&key) {
            debug!(variable = %key, "Replacing existing variable");
        }
        debug!(variable = %key, count = values.len(), "Variable stored");
        self.variables.insert(key, values);
        Ok(())
    }

    /// Values of `name`, or `name` itself as a single text value when the
    /// variable is unknown.
    pub fn get(&self, name: &str) -> Vec<JsonValue> {
        self.lookup(name)
            .map(<[JsonValue]>::to_vec)
            .unwrap_or_else(|| vec![JsonValue::String(name.to_string())])
    }

    /// Values of `name` if the variable exists.
    pub fn lookup(&self, name: &str) -> Option<&[JsonValue]> {
        self.variables.get(&canonical_name(name)).map(Vec::as_slice)
    }

    /// Values of `name` rendered as text, with the same pass-through rule as
    /// [`VariableStore::get`].
    pub fn get_strings(&self, name: &str) -> Vec<String> {
        self.get(name).iter().map(value_to_string).collect()
    }

    /// First value of `name` rendered as text.
    pub fn first_string(&self, name: &str) -> String {
        self.lookup(name)
            .and_then(|values| values.first())
            .map(value_to_string)
            .unwrap_or_else(|| name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(&canonical_name(name))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
