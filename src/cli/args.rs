//! CLI argument definitions using clap

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::SecretString;

/// restchain - Run chained REST requests described in a pipeline file
#[derive(Parser, Debug, Clone)]
#[command(name = "restchain", version, about, long_about = None)]
pub struct Args {
    /// Pipeline file (YAML or TOML)
    #[arg(value_name = "PIPELINE")]
    pub pipeline: PathBuf,

    /// Set a variable before the first command (repeat a name for several values)
    #[arg(long = "var", value_name = "NAME=VALUE", action = ArgAction::Append)]
    pub vars: Vec<String>,

    /// Base URL, overrides the pipeline file
    #[arg(long = "url", value_name = "URL")]
    pub url: Option<String>,

    /// API key sent as the apikey query parameter
    #[arg(long = "api-key", value_name = "KEY", env = "RESTCHAIN_API_KEY", hide_env_values = true)]
    pub api_key: Option<SecretString>,

    /// Request timeout (e.g., "30s", "2m")
    #[arg(long = "timeout", value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Report format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Output format for structured logging: json (JSON Lines) or text (default)
    #[arg(long = "log-format", value_name = "FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Verbose output. Use -vv for even more verbose
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Check the pipeline file without sending any request
    #[arg(long = "validate", action = ArgAction::SetTrue)]
    pub validate: bool,
}

/// Run report format
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable summary (default)
    #[default]
    Text,
    /// JSON Lines, one event per line
    Json,
}

/// Log format for structured output (CI/CD)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Plain text output (default)
    #[default]
    Text,
    /// JSON Lines format for parsing
    Json,
}
