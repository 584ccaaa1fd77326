//! Pipeline definition and execution
//!
//! A pipeline is an ordered list of REST commands. Values extracted from one
//! response become variables that later endpoints and bodies refer to.

pub mod command;
pub mod config;
pub mod report;
pub mod runner;
pub mod save;
pub mod template;

pub use command::{CommandSpec, MediaType, Method, Target, TargetKind, UpdateEntry, UpdateSpec};
pub use config::{
    apply_cli_variables, load_pipeline, parse_pipeline, GroupEntryConfig, PipelineConfig, SaveConfig,
    SecretString,
};
pub use report::{
    format_run_report, format_run_report_json, CommandReport, EndpointOutcome, EndpointReport,
    RunReport, SaveReport,
};
pub use runner::{Pipeline, PipelineState};
pub use save::{
    Choice, GroupField, GroupFieldValue, MemorySink, PropertySink, SaveKind, SaveSpec, SavedGroup,
    SavedRecord,
};
pub use template::{
    expand_store_placeholders, resolve_configured, resolve_configured_endpoint,
    substitute_first_values, wrap_body, ConfiguredTemplate, StoreExpansion,
};
