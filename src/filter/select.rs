//! Filtered extraction of several targets at once
//!
//! Targets and filter paths are resolved relative to their shared ancestor
//! (the common heading). Each node found at that heading is a row; a row
//! contributes its target values when its filter value matches. When a
//! target ends up empty, the alternative option decides which rows to take
//! instead.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::errors::RestchainError;
use super::path::{common_heading_all, common_parents, strip_heading, values_at};
use super::value::{is_blank, value_to_string};

/// Row selection used when no row satisfies the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlternativeOption {
    /// Take every row
    All,
    /// Take only the first row
    First,
    /// Take only the last row
    Last,
    /// Take one uniformly chosen row
    Random,
    /// Leave the target empty
    #[default]
    None,
}

impl AlternativeOption {
    /// Lenient parse used for configuration input: anything unknown becomes
    /// [`AlternativeOption::None`].
    pub fn parse_or_none(option: &str) -> Self {
        if option.trim().is_empty() {
            return AlternativeOption::None;
        }
        option.parse().unwrap_or_else(|_| {
            warn!(option = %option, "Unknown alternative option, using 'none'");
            AlternativeOption::None
        })
    }
}

impl FromStr for AlternativeOption {
    type Err = RestchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(AlternativeOption::All),
            "first" => Ok(AlternativeOption::First),
            "last" => Ok(AlternativeOption::Last),
            "random" => Ok(AlternativeOption::Random),
            "none" => Ok(AlternativeOption::None),
            other => Err(RestchainError::Config(format!(
                "unknown alternative option '{}' (expected all, first, last, random or none)",
                other
            ))),
        }
    }
}

impl fmt::Display for AlternativeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlternativeOption::All => "all",
            AlternativeOption::First => "first",
            AlternativeOption::Last => "last",
            AlternativeOption::Random => "random",
            AlternativeOption::None => "none",
        };
        f.write_str(name)
    }
}

/// Filter applied to the rows of a response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Path whose value is compared
    pub path: String,
    /// Path compared instead when the primary path is blank for a row
    pub fallback_path: String,
    /// Expected value
    pub value: String,
    /// Selection policy when nothing matches
    pub alternative: AlternativeOption,
}

impl FilterSpec {
    /// Build a filter. The fallback path defaults to the primary path.
    pub fn new(
        path: impl Into<String>,
        fallback_path: Option<String>,
        value: impl Into<String>,
        alternative: AlternativeOption,
    ) -> Self {
        let path = path.into();
        let fallback_path = fallback_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| path.clone());
        Self {
            path,
            fallback_path,
            value: value.into(),
            alternative,
        }
    }

    /// A blank path or a blank value matches every row.
    pub fn is_unconditional(&self) -> bool {
        self.path.trim().is_empty() || self.value.trim().is_empty()
    }

    fn matches(&self, row: &JsonValue, primary: &str, fallback: &str) -> bool {
        let mut candidates = values_at(primary, row);
        if candidates.iter().all(|v| is_blank(v)) {
            candidates = values_at(fallback, row);
        }
        candidates.iter().any(|v| value_to_string(v) == self.value)
    }
}

/// Extract every target from `root`, keeping only rows accepted by `filter`.
///
/// `targets` maps variable names to paths. The result holds one entry per
/// target name, in the order of `targets`; an entry may be empty.
pub fn filtered_extract(
    targets: &IndexMap<String, String>,
    filter: &FilterSpec,
    root: &JsonValue,
) -> IndexMap<String, Vec<JsonValue>> {
    filtered_extract_with_rng(targets, filter, root, &mut rand::rng())
}

/// [`filtered_extract`] with a caller-supplied random source for the
/// `random` alternative option.
pub fn filtered_extract_with_rng<R: Rng>(
    targets: &IndexMap<String, String>,
    filter: &FilterSpec,
    root: &JsonValue,
    rng: &mut R,
) -> IndexMap<String, Vec<JsonValue>> {
    let heading = common_heading_all(
        targets
            .values()
            .map(String::as_str)
            .chain([filter.path.as_str(), filter.fallback_path.as_str()]),
    );
    let rows = common_parents(&heading, root);
    let primary = strip_heading(&filter.path, &heading);
    let fallback = strip_heading(&filter.fallback_path, &heading);
    let suffixes: Vec<(&str, &str)> = targets
        .iter()
        .map(|(name, path)| (name.as_str(), strip_heading(path, &heading)))
        .collect();

    debug!(heading = %heading, rows = rows.len(), "Filtering common parent rows");

    let unconditional = filter.is_unconditional();
    let mut results: IndexMap<String, Vec<JsonValue>> = targets
        .keys()
        .map(|name| (name.clone(), Vec::new()))
        .collect();

    for row in &rows {
        if !unconditional && !filter.matches(row, primary, fallback) {
            continue;
        }
        for (name, suffix) in &suffixes {
            if let Some(values) = results.get_mut(*name) {
                values.extend(values_at(suffix, row).into_iter().cloned());
            }
        }
    }

    // Chosen lazily and shared by every empty target, so that fields taken
    // from a random row all come from the same row.
    let mut alternative_rows: Option<Vec<&JsonValue>> = None;
    for (name, suffix) in &suffixes {
        let Some(values) = results.get_mut(*name) else {
            continue;
        };
        if !values.is_empty() {
            continue;
        }
        let chosen = alternative_rows
            .get_or_insert_with(|| select_rows(&rows, filter.alternative, rng));
        if !chosen.is_empty() {
            debug!(variable = %name, option = %filter.alternative, "No row matched, applying alternative option");
        }
        for row in chosen.iter() {
            values.extend(values_at(suffix, row).into_iter().cloned());
        }
    }

    results
}

fn select_rows<'a, R: Rng>(
    rows: &[&'a JsonValue],
    option: AlternativeOption,
    rng: &mut R,
) -> Vec<&'a JsonValue> {
    match option {
        AlternativeOption::All => rows.to_vec(),
        AlternativeOption::First => rows.first().copied().into_iter().collect(),
        AlternativeOption::Last => rows.last().copied().into_iter().collect(),
        AlternativeOption::Random if !rows.is_empty() => vec![rows[rng.random_range(0..rows.len())]],
        AlternativeOption::Random | AlternativeOption::None => Vec::new(),
    }
}
