//! Common test utilities for restchain integration tests
//!
//! This module provides shared test infrastructure including:
//! - A scripted in-memory transport
//! - Pipeline file fixtures
//! - CLI invocation helpers

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use restchain::client::{RequestDescriptor, Transport};
use restchain::errors::{RestchainError, Result};
use restchain::pipeline::{parse_pipeline, PipelineConfig};

/// Base URL used with [`FakeTransport`]
pub const FAKE_BASE: &str = "http://api.test/v1";

/// Answers requests by URL path and records everything sent
#[derive(Default)]
pub struct FakeTransport {
    routes: HashMap<String, String>,
    sent: RefCell<Vec<RequestDescriptor>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `path` (e.g. "/v1/items/7") with `body`.
    pub fn route(mut self, path: &str, body: impl Into<String>) -> Self {
        self.routes.insert(path.to_string(), body.into());
        self
    }

    pub fn sent(&self) -> Vec<RequestDescriptor> {
        self.sent.borrow().clone()
    }

    /// Paths of every request sent, in order.
    pub fn sent_paths(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|r| url::Url::parse(&r.url).ok())
            .map(|u| u.path().to_string())
            .collect()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: &RequestDescriptor) -> Result<String> {
        self.sent.borrow_mut().push(request.clone());
        let path = url::Url::parse(&request.url)?.path().to_string();
        self.routes.get(&path).cloned().ok_or_else(|| {
            RestchainError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("no route for {}", path),
            ))
        })
    }
}

/// Parse a YAML pipeline, panicking on errors.
pub fn yaml_pipeline(yaml: &str) -> PipelineConfig {
    parse_pipeline(yaml, "yaml").expect("Failed to parse test pipeline")
}

/// Write a pipeline file into `dir`.
pub fn write_pipeline(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write pipeline file");
    path
}

/// The restchain binary, with logging environment cleared.
pub fn restchain() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(env!("CARGO_BIN_EXE_restchain"));
    cmd.env_remove("RESTCHAIN_LOG")
        .env_remove("RUST_LOG")
        .env_remove("RESTCHAIN_API_KEY");
    cmd
}
