//! Pipeline execution engine
//!
//! Runs commands strictly in order, one endpoint at a time, since later
//! commands read what earlier ones stored. Failures are sorted by kind: an
//! unresolvable command or a broken response is recorded and skipped, a
//! fault aborts everything that is left.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use crate::client::{build_request_url, redact_api_key, RequestDescriptor, Transport};
use crate::errors::{RestchainError, Result};
use crate::filter::filtered_extract;
use crate::store::VariableStore;
use super::command::CommandSpec;
use super::config::{PipelineConfig, SaveConfig};
use super::report::{CommandReport, EndpointOutcome, EndpointReport, RunReport, SaveReport};
use super::save::{PropertySink, SaveSpec};

/// Lifecycle of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineState {
    Pending,
    Running,
    Success,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Success | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Pending => "PENDING",
            PipelineState::Running => "RUNNING",
            PipelineState::Success => "SUCCESS",
            PipelineState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// One pipeline run with its own variable store
pub struct Pipeline<T: Transport> {
    transport: T,
    base_url: String,
    api_key: String,
    commands: Vec<CommandSpec>,
    saves: Vec<SaveConfig>,
    store: VariableStore,
    state: PipelineState,
}

impl<T: Transport> Pipeline<T> {
    /// Seed the store from the configured variables and build every command.
    pub fn from_config(config: &PipelineConfig, transport: T) -> Result<Self> {
        let mut store = VariableStore::new();
        for variable in &config.variables {
            if let Err(e) = store.set(&variable.name, variable.values()) {
                warn!(variable = %variable.name, error = %e, "Ignoring variable");
            }
        }

        let commands = config
            .commands
            .iter()
            .enumerate()
            .map(|(i, command)| CommandSpec::from_config(command, i, &store))
            .collect::<Result<Vec<_>>>()?;

        debug!(commands = commands.len(), variables = store.len(), "Pipeline initialized");

        Ok(Self {
            transport,
            base_url: config.url.clone(),
            api_key: config.api_key.as_str().to_string(),
            commands,
            saves: config.saves.clone(),
            store,
            state: PipelineState::Pending,
        })
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Run every command, then every save entry. A pipeline runs once.
    pub fn run(&mut self, sink: &mut dyn PropertySink) -> Result<RunReport> {
        if self.state != PipelineState::Pending {
            return Err(RestchainError::Config(format!(
                "Pipeline cannot run again, it is {}",
                self.state
            )));
        }

        self.state = PipelineState::Running;
        let started = Instant::now();
        let mut report = RunReport::new();
        info!(commands = self.commands.len(), "Pipeline started");

        let commands = std::mem::take(&mut self.commands);
        for command in &commands {
            let mut command_report =
                CommandReport::new(&command.name, command.method.as_str(), &command.endpoint);
            let result = self.run_command(command, &mut command_report);
            report.commands.push(command_report);

            if let Err(e) = result {
                error!(command = %command.name, error = %e, "Pipeline aborted");
                report.fault = Some(e.to_string());
                break;
            }
        }
        self.commands = commands;

        let mut failed = report.fault.is_some();
        if !failed {
            failed = !self.run_saves(sink, &mut report);
        }

        self.state = if failed { PipelineState::Failed } else { PipelineState::Success };
        report.state = self.state;
        report.duration = started.elapsed();
        info!(state = %self.state, duration = ?report.duration, "Pipeline finished");

        Ok(report)
    }

    /// Returns an error only for faults that must stop the pipeline.
    fn run_command(&mut self, command: &CommandSpec, report: &mut CommandReport) -> Result<()> {
        info!(command = %command.name, method = %command.method, endpoint = %command.endpoint, "Running command");

        let endpoints = match command.resolve_endpoints(&self.store) {
            Ok(endpoints) => endpoints,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(command = %command.name, error = %e, "Skipping command, endpoint could not be resolved");
                report.error = Some(e.to_string());
                return Ok(());
            }
        };
        debug!(command = %command.name, count = endpoints.combinations(), "Endpoints resolved");

        for endpoint in endpoints {
            let started = Instant::now();
            let mut url = String::new();
            let result = self.run_endpoint(command, &endpoint, &mut url);

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => {
                    report.endpoints.push(EndpointReport {
                        endpoint,
                        url,
                        duration: started.elapsed(),
                        outcome: EndpointOutcome::Failed { error: e.to_string() },
                    });
                    return Err(e);
                }
                Err(e) => {
                    warn!(command = %command.name, endpoint = %endpoint, error = %e, "Endpoint failed, continuing");
                    EndpointOutcome::Failed { error: e.to_string() }
                }
            };

            report.endpoints.push(EndpointReport {
                endpoint,
                url,
                duration: started.elapsed(),
                outcome,
            });
        }

        Ok(())
    }

    fn run_endpoint(&mut self, command: &CommandSpec, endpoint: &str, url_out: &mut String) -> Result<EndpointOutcome> {
        if !command.method.is_supported() {
            debug!(command = %command.name, method = %command.method, "Unsupported method, no request sent");
            return Ok(EndpointOutcome::Skipped {
                reason: format!("unsupported method {}", command.method),
            });
        }

        let parameters: Vec<(String, String)> = command
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let url = build_request_url(&self.base_url, endpoint, &parameters, &self.api_key)?;
        *url_out = redact_api_key(url.as_str());

        let mut request = RequestDescriptor::new(command.method.as_str(), url.as_str())
            .header("Accept", command.accept.as_mime())
            .header("Content-Type", command.content_type.as_mime());
        for (name, value) in &command.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if command.method.carries_body() {
            request = request.body(command.resolve_body(&self.store));
        }

        info!(command = %command.name, method = %command.method, url = %url_out, "Sending request");
        let response = self.transport.send(&request)?;

        if !command.accept.is_json() {
            debug!(command = %command.name, accept = command.accept.as_mime(), "Response is not JSON, nothing extracted");
            return Ok(EndpointOutcome::NotParsed);
        }

        let mut document: JsonValue = serde_json::from_str(&response)?;
        let mut stored = Vec::new();

        let extracted = filtered_extract(&command.target_paths(), &command.filter, &document);
        for target in &command.targets {
            if target.variable.trim().is_empty() {
                continue;
            }
            let values = extracted
                .get(&target.variable)
                .map(|values| target.prepare(values.clone()))
                .unwrap_or_default();
            if values.is_empty() {
                debug!(command = %command.name, variable = %target.variable, path = %target.path, "No values found for target");
                continue;
            }
            self.store.set(&target.variable, values)?;
            stored.push(target.variable.clone());
        }

        if let Some(update) = &command.update {
            update.apply(&mut document, &self.store)?;
            if !update.variable.trim().is_empty() {
                self.store.set(&update.variable, vec![document])?;
                stored.push(update.variable.clone());
            }
        }

        Ok(EndpointOutcome::Completed { stored })
    }

    /// Returns false once a save entry fails; the remaining ones are skipped.
    fn run_saves(&self, sink: &mut dyn PropertySink, report: &mut RunReport) -> bool {
        for save in &self.saves {
            let result = SaveSpec::from_config(save).and_then(|entry| entry.execute(&self.store, &mut *sink));
            match result {
                Ok(written) => report.saves.push(SaveReport {
                    kind: save.kind.clone(),
                    name: save.name.clone(),
                    written,
                    error: None,
                }),
                Err(e) => {
                    error!(kind = %save.kind, name = %save.name, error = %e, "Save failed");
                    report.saves.push(SaveReport {
                        kind: save.kind.clone(),
                        name: save.name.clone(),
                        written: 0,
                        error: Some(e.to_string()),
                    });
                    return false;
                }
            }
        }
        true
    }
}
