//! Writing results back to the host
//!
//! After the last command, each save entry picks values from a store
//! variable and hands them to a [`PropertySink`]. Group entries instead
//! read fields out of every record held by the variable.

use std::fmt;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{RestchainError, Result};
use crate::filter::{value_to_string, values_at};
use crate::store::VariableStore;
use super::config::SaveConfig;

/// Kind of host record a save entry writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveKind {
    Property,
    Metadata,
    /// One metadata group per stored record
    Group,
}

impl SaveKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim().to_lowercase().as_str() {
            "property" => Some(SaveKind::Property),
            "metadata" => Some(SaveKind::Metadata),
            "group" => Some(SaveKind::Group),
            _ => None,
        }
    }
}

impl fmt::Display for SaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveKind::Property => f.write_str("property"),
            SaveKind::Metadata => f.write_str("metadata"),
            SaveKind::Group => f.write_str("group"),
        }
    }
}

/// Which of a variable's values get saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    First,
    Last,
    Random,
    /// One record per value
    Each,
    /// All values joined by the delimiter
    Join(String),
}

impl Choice {
    /// `first`, `last`, `random` and `each` select values; `:<delimiter>`
    /// joins them with the delimiter and anything else joins with `", "`.
    pub fn parse(choice: &str) -> Self {
        match choice.trim().to_lowercase().as_str() {
            "first" => Choice::First,
            "last" => Choice::Last,
            "random" => Choice::Random,
            "each" => Choice::Each,
            _ => match choice.strip_prefix(':') {
                Some(delimiter) if !delimiter.is_empty() => Choice::Join(delimiter.to_string()),
                _ => Choice::Join(", ".to_string()),
            },
        }
    }

    /// Values to write, one record each.
    pub fn select<R: Rng>(&self, values: &[String], rng: &mut R) -> Vec<String> {
        if values.is_empty() {
            return Vec::new();
        }
        match self {
            Choice::First => vec![values[0].clone()],
            Choice::Last => vec![values[values.len() - 1].clone()],
            Choice::Random => vec![values[rng.random_range(0..values.len())].clone()],
            Choice::Each => values.to_vec(),
            Choice::Join(delimiter) => vec![values.join(delimiter)],
        }
    }
}

/// Destination of saved records
pub trait PropertySink {
    /// Write one record. With `overwrite`, an existing record of the same
    /// kind and name is updated instead of adding a new one.
    fn save(&mut self, kind: SaveKind, name: &str, value: &str, overwrite: bool) -> Result<()>;

    /// Write one group whose fields are `(field name, value)` pairs in order.
    fn save_group(&mut self, name: &str, fields: &[(String, String)]) -> Result<()>;
}

/// A record held by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedRecord {
    pub kind: SaveKind,
    pub name: String,
    pub value: String,
}

/// A group held by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedGroup {
    pub name: String,
    pub fields: Vec<GroupFieldValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFieldValue {
    pub name: String,
    pub value: String,
}

impl SavedGroup {
    /// Values of every field called `field`.
    pub fn values_of(&self, field: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.name == field)
            .map(|f| f.value.as_str())
            .collect()
    }
}

/// Keeps saved records and groups in memory, in write order
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<SavedRecord>,
    groups: Vec<SavedGroup>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SavedRecord] {
        &self.records
    }

    pub fn groups(&self) -> &[SavedGroup] {
        &self.groups
    }

    /// Values of every record called `name`.
    pub fn values_of(&self, name: &str) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.value.as_str())
            .collect()
    }
}

impl PropertySink for MemorySink {
    fn save(&mut self, kind: SaveKind, name: &str, value: &str, overwrite: bool) -> Result<()> {
        if overwrite {
            if let Some(existing) = self
                .records
                .iter_mut()
                .find(|r| r.kind == kind && r.name == name)
            {
                existing.value = value.to_string();
                return Ok(());
            }
        }
        self.records.push(SavedRecord {
            kind,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn save_group(&mut self, name: &str, fields: &[(String, String)]) -> Result<()> {
        self.groups.push(SavedGroup {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(field, value)| GroupFieldValue {
                    name: field.clone(),
                    value: value.clone(),
                })
                .collect(),
        });
        Ok(())
    }
}

/// A field of a group save and the path of its values inside a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupField {
    pub name: String,
    pub path: String,
}

/// A save entry ready to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSpec {
    pub kind: SaveKind,
    pub name: String,
    pub variable: String,
    pub choice: Choice,
    pub overwrite: bool,
    /// Only used by group saves
    pub fields: Vec<GroupField>,
}

impl SaveSpec {
    pub fn from_config(config: &SaveConfig) -> Result<Self> {
        let kind = SaveKind::parse(&config.kind).ok_or_else(|| {
            RestchainError::Save(format!(
                "Unknown save type '{}' for '{}'",
                config.kind, config.name
            ))
        })?;
        if config.name.trim().is_empty() {
            return Err(RestchainError::Save("Save entry without a name".to_string()));
        }
        Ok(Self {
            kind,
            name: config.name.clone(),
            variable: config.value.clone(),
            choice: Choice::parse(&config.choice),
            overwrite: config.overwrite,
            fields: config
                .entries
                .iter()
                .filter(|entry| !entry.name.trim().is_empty())
                .map(|entry| GroupField {
                    name: entry.name.clone(),
                    path: entry.path.clone(),
                })
                .collect(),
        })
    }

    /// Write the selected values. Returns the number of records written; a
    /// variable missing from the store writes nothing.
    pub fn execute(&self, store: &VariableStore, sink: &mut dyn PropertySink) -> Result<usize> {
        if !store.contains(&self.variable) {
            warn!(name = %self.name, variable = %self.variable, "Nothing to save, variable is not set");
            return Ok(0);
        }
        if self.kind == SaveKind::Group {
            return self.execute_group(store, sink);
        }

        let values = store.get_strings(&self.variable);
        let selected = self.choice.select(&values, &mut rand::rng());
        // Repeated metadata always adds entries, properties honour overwrite
        let overwrite = self.overwrite && !(self.choice == Choice::Each && self.kind == SaveKind::Metadata);

        for value in &selected {
            debug!(kind = %self.kind, name = %self.name, value = %value, "Saving value");
            sink.save(self.kind, &self.name, value, overwrite)?;
        }

        info!(kind = %self.kind, name = %self.name, count = selected.len(), "Saved");
        Ok(selected.len())
    }

    /// One group per stored record; every field collects all values found at
    /// its path inside that record.
    fn execute_group(&self, store: &VariableStore, sink: &mut dyn PropertySink) -> Result<usize> {
        if self.fields.is_empty() {
            warn!(name = %self.name, "Group save has no entries, groups will be empty");
        }

        let records = store.lookup(&self.variable).unwrap_or_default();
        for record in records {
            let fields: Vec<(String, String)> = self
                .fields
                .iter()
                .flat_map(|field| {
                    values_at(&field.path, record)
                        .into_iter()
                        .map(move |value| (field.name.clone(), value_to_string(value)))
                })
                .collect();
            debug!(name = %self.name, fields = fields.len(), "Saving group");
            sink.save_group(&self.name, &fields)?;
        }

        info!(kind = %self.kind, name = %self.name, count = records.len(), "Saved");
        Ok(records.len())
    }
}
