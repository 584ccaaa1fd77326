//! Dot-separated path navigation over JSON documents
//!
//! A path such as `reviewers.name` names a field sequence. Whenever a step
//! lands on an array the remaining path is applied to every element and the
//! results are flattened, so no index syntax is ever needed. A leading `$.`
//! (JSONPath root) is accepted and ignored.

use serde_json::Value as JsonValue;
use crate::errors::{RestchainError, Result};

/// Trim a path and drop an optional JSONPath-style `$` root.
pub fn normalize_path(path: &str) -> &str {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    path.strip_prefix('.').unwrap_or(path)
}

fn split_segment(path: &str) -> (&str, &str) {
    path.split_once('.').unwrap_or((path, ""))
}

/// All values reachable from `node` by following `path`.
///
/// An empty path yields `node` itself. Missing fields contribute nothing, so
/// absent data shows up as an empty result rather than an error.
pub fn values_at<'a>(path: &str, node: &'a JsonValue) -> Vec<&'a JsonValue> {
    let path = normalize_path(path);
    if path.is_empty() {
        return vec![node];
    }

    let mut found = Vec::new();
    collect(path, node, &mut found);
    found
}

/// The rows found by walking `heading` down from `node`.
///
/// Unlike [`values_at`], an array at the end of the walk is always expanded,
/// so every returned row is a single element.
pub fn common_parents<'a>(heading: &str, node: &'a JsonValue) -> Vec<&'a JsonValue> {
    let mut rows = Vec::new();
    collect(normalize_path(heading), node, &mut rows);
    rows
}

fn collect<'a>(path: &str, node: &'a JsonValue, found: &mut Vec<&'a JsonValue>) {
    if let JsonValue::Array(items) = node {
        for item in items {
            collect(path, item, found);
        }
        return;
    }

    if path.is_empty() {
        found.push(node);
        return;
    }

    if let JsonValue::Object(map) = node {
        let (field, rest) = split_segment(path);
        if let Some(child) = map.get(field) {
            collect(rest, child, found);
        }
    }
}

/// Longest shared dot-delimited prefix of two paths.
///
/// ```
/// use restchain::filter::common_heading;
///
/// assert_eq!(common_heading("a.b.c", "a.b.d"), "a.b");
/// assert_eq!(common_heading("a.b", "c.d"), "");
/// ```
pub fn common_heading(first: &str, second: &str) -> String {
    normalize_path(first)
        .split('.')
        .zip(normalize_path(second).split('.'))
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a)
        .collect::<Vec<_>>()
        .join(".")
}

/// Common heading across any number of paths. Blank paths are ignored.
pub fn common_heading_all<'a, I>(paths: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut heading: Option<String> = None;
    for path in paths.into_iter().map(normalize_path).filter(|p| !p.is_empty()) {
        heading = Some(match heading {
            None => path.to_string(),
            Some(current) => common_heading(&current, path),
        });
    }
    heading.unwrap_or_default()
}

/// The part of `path` below `heading`.
///
/// Returns an empty string when the path is the heading itself and the whole
/// path when it does not start with the heading.
pub fn strip_heading<'a>(path: &'a str, heading: &str) -> &'a str {
    let path = normalize_path(path);
    let heading = normalize_path(heading);
    if heading.is_empty() {
        return path;
    }
    if path == heading {
        return "";
    }
    path.strip_prefix(heading)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(path)
}

/// Overwrite every value at `path` inside `node` with `value`.
///
/// Arrays are distributed over like in [`values_at`]. The last field is
/// created when missing; a missing intermediate field leaves that branch
/// untouched. Descending into a scalar is a structural mismatch and fails
/// with [`RestchainError::Fault`]. Returns the number of values written.
pub fn set_values_at(path: &str, node: &mut JsonValue, value: &JsonValue) -> Result<usize> {
    let path = normalize_path(path);
    if path.is_empty() {
        *node = value.clone();
        return Ok(1);
    }
    assign(path, node, value)
}

fn assign(path: &str, node: &mut JsonValue, value: &JsonValue) -> Result<usize> {
    match node {
        JsonValue::Array(items) => {
            let mut written = 0;
            for item in items.iter_mut() {
                written += assign(path, item, value)?;
            }
            Ok(written)
        }
        JsonValue::Object(map) => {
            let (field, rest) = split_segment(path);
            if rest.is_empty() {
                map.insert(field.to_string(), value.clone());
                return Ok(1);
            }
            match map.get_mut(field) {
                Some(child) => assign(rest, child, value),
                None => Ok(0),
            }
        }
        JsonValue::Null => Ok(0),
        scalar => Err(RestchainError::Fault(format!(
            "cannot descend into scalar value {} while setting '{}'",
            scalar, path
        ))),
    }
}
