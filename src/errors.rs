//! Error types for restchain

use thiserror::Error;

/// Main error type for restchain
///
/// The variants follow the failure kinds a pipeline run can meet. Only
/// [`RestchainError::Fault`] aborts a run; every other kind is handled by
/// skipping the affected endpoint or command.
#[derive(Error, Debug)]
pub enum RestchainError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown variable {name} in {context}")]
    UnknownVariable {
        name: String,
        context: String,
    },

    #[error("Variable '{0}' must not be set to an empty value list")]
    EmptyValues(String),

    #[error("Request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected fault: {0}")]
    Fault(String),

    #[error("Save error: {0}")]
    Save(String),
}

impl RestchainError {
    /// Whether this error must abort the remaining pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RestchainError::Fault(_))
    }
}

pub type Result<T> = std::result::Result<T, RestchainError>;
