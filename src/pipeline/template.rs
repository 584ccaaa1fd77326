//! Endpoint and body templates
//!
//! Two placeholder families share the template syntax:
//! - `{name}` is filled once from literal values configured on the command
//! - `{$name}` is filled from the variable store on every run of the
//!   command, since earlier commands may have changed the store
//!
//! A store variable with several values fans the template out into one
//! concrete string per combination of values.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use crate::errors::{RestchainError, Result};
use crate::filter::value_to_string;
use crate::store::{canonical_name, VariableStore};

// Bodies may hold literal JSON braces, so only identifier-like names count
static CONFIGURED_PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").expect("Failed to compile placeholder regex")
});

static ENDPOINT_PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([^{}]*)\}").expect("Failed to compile endpoint placeholder regex")
});

static STORE_PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\$[^{}]*\}").expect("Failed to compile store placeholder regex")
});

/// Result of filling configured placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredTemplate {
    pub text: String,
    /// Placeholders without a configured value, left in place
    pub unresolved: Vec<String>,
}

/// Fill every `{name}` placeholder from `values`.
///
/// Placeholders without a value stay in the text and are reported in
/// [`ConfiguredTemplate::unresolved`].
pub fn resolve_configured(template: &str, values: &IndexMap<String, String>) -> ConfiguredTemplate {
    fill_configured(&CONFIGURED_PLACEHOLDER_RE, template, values)
}

/// Like [`resolve_configured`], but any braced text other than a store
/// placeholder counts, so `{mms id}` or `{1}` without a value is reported.
pub fn resolve_configured_endpoint(template: &str, values: &IndexMap<String, String>) -> ConfiguredTemplate {
    fill_configured(&ENDPOINT_PLACEHOLDER_RE, template, values)
}

fn fill_configured(pattern: &Regex, template: &str, values: &IndexMap<String, String>) -> ConfiguredTemplate {
    let mut unresolved: Vec<String> = Vec::new();
    let text = pattern
        .replace_all(template, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None if caps[1].starts_with('$') => caps[0].to_string(),
            None => {
                if !unresolved.iter().any(|u| u == &caps[0]) {
                    unresolved.push(caps[0].to_string());
                }
                caps[0].to_string()
            }
        })
        .into_owned();

    for placeholder in &unresolved {
        warn!(placeholder = %placeholder, template = %template, "No value configured for placeholder");
    }

    ConfiguredTemplate { text, unresolved }
}

/// Distinct `{$name}` placeholders in order of first appearance.
pub fn store_placeholders(template: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in STORE_PLACEHOLDER_RE.find_iter(template) {
        if !found.iter().any(|f| f == m.as_str()) {
            found.push(m.as_str().to_string());
        }
    }
    found
}

/// Lazy cartesian expansion of the store placeholders of a template
///
/// Yields one string per combination of values, each exactly once. The last
/// placeholder varies fastest.
#[derive(Debug, Clone)]
pub struct StoreExpansion {
    template: String,
    slots: Vec<(String, Vec<String>)>,
    cursor: Option<Vec<usize>>,
}

impl StoreExpansion {
    /// Prepare the expansion. Fails when a placeholder names a variable the
    /// store does not know.
    pub fn new(template: &str, store: &VariableStore) -> Result<Self> {
        let mut slots = Vec::new();
        for placeholder in store_placeholders(template) {
            let values = store.lookup(&placeholder).ok_or_else(|| RestchainError::UnknownVariable {
                name: canonical_name(&placeholder),
                context: format!("template '{}'", template),
            })?;
            slots.push((placeholder, values.iter().map(value_to_string).collect::<Vec<_>>()));
        }

        let cursor = if slots.iter().any(|(_, values)| values.is_empty()) {
            None
        } else {
            Some(vec![0; slots.len()])
        };

        Ok(Self {
            template: template.to_string(),
            slots,
            cursor,
        })
    }

    /// Total number of combinations, saturating at `usize::MAX`.
    pub fn combinations(&self) -> usize {
        combination_count(self.slots.iter().map(|(_, values)| values.len()))
    }

    fn render(&self, cursor: &[usize]) -> String {
        STORE_PLACEHOLDER_RE
            .replace_all(&self.template, |caps: &Captures| {
                self.slots
                    .iter()
                    .position(|(placeholder, _)| placeholder == &caps[0])
                    .map(|i| self.slots[i].1[cursor[i]].clone())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

impl Iterator for StoreExpansion {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let cursor = self.cursor.take()?;
        let rendered = self.render(&cursor);

        // odometer step
        let mut next = cursor;
        for i in (0..next.len()).rev() {
            next[i] += 1;
            if next[i] < self.slots[i].1.len() {
                self.cursor = Some(next);
                return Some(rendered);
            }
            next[i] = 0;
        }

        Some(rendered)
    }
}

fn combination_count<I: IntoIterator<Item = usize>>(sizes: I) -> usize {
    sizes.into_iter().fold(1, usize::saturating_mul)
}

/// Expand a template into every concrete string.
pub fn expand_store_placeholders(template: &str, store: &VariableStore) -> Result<Vec<String>> {
    Ok(StoreExpansion::new(template, store)?.collect())
}

/// Replace each `{$name}` with the first value of the variable. Unknown
/// variables are left as they are.
pub fn substitute_first_values(template: &str, store: &VariableStore) -> String {
    STORE_PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| store.first_string(&caps[0]))
        .into_owned()
}

/// Nest `content` inside the space separated `wrapper` tags, innermost
/// first. JSON content types wrap as `{"tag": content}`, XML as
/// `<tag>content</tag>`; other types are returned unchanged.
pub fn wrap_body(content: &str, wrapper: &str, content_type: &str) -> String {
    let content_type = content_type.to_lowercase();
    let tags = wrapper.split_whitespace();

    if content_type.ends_with("json") {
        tags.fold(content.to_string(), |inner, tag| {
            let key = serde_json::Value::String(tag.to_string());
            format!("{{{}: {}}}", key, inner)
        })
    } else if content_type.ends_with("xml") {
        tags.fold(content.to_string(), |inner, tag| format!("<{}>{}</{}>", tag, inner, tag))
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn values(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_resolve_configured() {
        let result = resolve_configured(
            "bibs/{mms_id}/holdings/{$holding}",
            &values(&[("mms_id", "991")]),
        );
        assert_eq!(result.text, "bibs/991/holdings/{$holding}");
        assert!(result.unresolved.is_empty());
    }

    #[test]
    fn test_resolve_configured_reports_missing() {
        let result = resolve_configured("a/{x}/{y}/{x}", &values(&[("y", "2")]));
        assert_eq!(result.text, "a/{x}/2/{x}");
        assert_eq!(result.unresolved, vec!["{x}".to_string()]);
    }

    #[test]
    fn test_endpoint_reports_any_braced_name() {
        let result = resolve_configured_endpoint(
            "bibs/{mms id}/{1}/{lib}/{$item}",
            &values(&[("lib", "MAIN")]),
        );
        assert_eq!(result.text, "bibs/{mms id}/{1}/MAIN/{$item}");
        assert_eq!(result.unresolved, vec!["{mms id}".to_string(), "{1}".to_string()]);
    }

    #[test]
    fn test_configured_placeholders_ignore_json() {
        let body = r#"{"a": {"b": 1}}"#;
        assert_eq!(resolve_configured(body, &IndexMap::new()).text, body);
    }

    #[test]
    fn test_store_placeholders_distinct() {
        assert_eq!(
            store_placeholders("{$a}/{$b}/{$a}/{c}"),
            vec!["{$a}".to_string(), "{$b}".to_string()]
        );
    }

    #[test]
    fn test_expansion_is_cartesian_product() {
        let mut store = VariableStore::new();
        store.set("a", vec![json!("1"), json!("2")]).unwrap();
        store.set("b", vec![json!("x"), json!("y"), json!("z")]).unwrap();

        let expansion = StoreExpansion::new("r/{$a}/{$b}/{$a}", &store).unwrap();
        assert_eq!(expansion.combinations(), 6);

        let endpoints: Vec<String> = expansion.collect();
        assert_eq!(endpoints.len(), 6);
        let unique: HashSet<&String> = endpoints.iter().collect();
        assert_eq!(unique.len(), 6);
        assert!(endpoints.contains(&"r/1/x/1".to_string()));
        assert!(endpoints.contains(&"r/2/z/2".to_string()));
    }

    #[test]
    fn test_expansion_without_placeholders_yields_once() {
        let store = VariableStore::new();
        assert_eq!(expand_store_placeholders("plain/path", &store).unwrap(), vec!["plain/path"]);
    }

    #[test]
    fn test_expansion_unknown_variable_fails() {
        let mut store = VariableStore::new();
        store.set("a", vec![json!("1")]).unwrap();
        let err = expand_store_placeholders("{$a}/{$missing}", &store).unwrap_err();
        assert!(matches!(err, RestchainError::UnknownVariable { ref name, .. } if name == "{$missing}"));
    }

    #[test]
    fn test_expansion_stringifies_values() {
        let mut store = VariableStore::new();
        store.set("id", vec![json!(7), json!(9)]).unwrap();
        assert_eq!(
            expand_store_placeholders("items/{$id}", &store).unwrap(),
            vec!["items/7", "items/9"]
        );
    }

    #[test]
    fn test_substitute_first_values() {
        let mut store = VariableStore::new();
        store.set("id", vec![json!("7"), json!("9")]).unwrap();
        store.set("record", vec![json!({"a": 1})]).unwrap();
        assert_eq!(
            substitute_first_values(r#"{"id": "{$id}", "r": {$record}, "m": "{$missing}"}"#, &store),
            r#"{"id": "7", "r": {"a":1}, "m": "{$missing}"}"#
        );
    }

    #[test]
    fn test_wrap_body_json() {
        assert_eq!(
            wrap_body(r#"{"x": 1}"#, "inner outer", "application/json"),
            r#"{"outer": {"inner": {"x": 1}}}"#
        );
    }

    #[test]
    fn test_wrap_body_xml() {
        assert_eq!(
            wrap_body("<x/>", "item items", "application/xml"),
            "<items><item><x/></item></items>"
        );
    }

    #[test]
    fn test_wrap_body_passthrough() {
        assert_eq!(wrap_body("data", "a b", "text/plain"), "data");
        assert_eq!(wrap_body("data", "", "application/json"), "data");
    }

    #[test]
    fn test_combination_count_saturates() {
        assert_eq!(combination_count([2, 3]), 6);
        assert_eq!(combination_count(std::iter::empty()), 1);
        assert_eq!(combination_count([usize::MAX / 2, 3, 4]), usize::MAX);
    }
}
