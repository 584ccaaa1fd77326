//! HTTP client functionality

pub mod http;

// Re-exports
pub use http::{build_request_url, redact_api_key, HttpTransport, RequestDescriptor, Transport, USER_AGENT_STRING};
