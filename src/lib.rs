//! restchain library interface
//!
//! Runs configuration-driven chains of REST requests. Values extracted from
//! one JSON response feed the endpoints and bodies of later requests.
//!
//! # Module Organization
//!
//! - [`store`] - Multi-valued variables of one pipeline run
//! - [`filter`] - JSON path navigation and filtered extraction
//! - [`pipeline`] - Pipeline configuration, templates, commands and the runner
//! - [`client`] - Request building and the HTTP transport
//! - [`errors`] - Error types (RestchainError, Result)
//! - [`status`] - Exit status codes (ExitStatus)
//! - [`core`] - Main execution logic

pub mod cli;
pub mod client;
pub mod core;
pub mod errors;
pub mod filter;
pub mod pipeline;
pub mod status;
pub mod store;

pub use errors::{RestchainError, Result};
pub use status::ExitStatus;
