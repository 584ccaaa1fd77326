//! Run reports
//!
//! Collects what happened to every command, endpoint and save entry of a
//! pipeline run, and renders it as text or JSON lines.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::runner::PipelineState;

/// What happened to one resolved endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointOutcome {
    /// Response handled; names of the variables written
    Completed { stored: Vec<String> },
    /// Response received but not JSON, nothing extracted
    NotParsed,
    /// No request was sent
    Skipped { reason: String },
    Failed { error: String },
}

impl EndpointOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EndpointOutcome::Completed { .. } => "completed",
            EndpointOutcome::NotParsed => "not_parsed",
            EndpointOutcome::Skipped { .. } => "skipped",
            EndpointOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, EndpointOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct EndpointReport {
    pub endpoint: String,
    /// Request URL with the API key hidden, empty if none was built
    pub url: String,
    pub duration: Duration,
    pub outcome: EndpointOutcome,
}

#[derive(Debug, Clone)]
pub struct CommandReport {
    pub name: String,
    pub method: String,
    pub endpoint_template: String,
    pub endpoints: Vec<EndpointReport>,
    /// Set when the endpoints could not be resolved
    pub error: Option<String>,
}

impl CommandReport {
    pub fn new(name: &str, method: &str, endpoint_template: &str) -> Self {
        Self {
            name: name.to_string(),
            method: method.to_string(),
            endpoint_template: endpoint_template.to_string(),
            endpoints: Vec::new(),
            error: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some() || self.endpoints.iter().any(|e| e.outcome.is_failure())
    }
}

#[derive(Debug, Clone)]
pub struct SaveReport {
    pub kind: String,
    pub name: String,
    pub written: usize,
    pub error: Option<String>,
}

/// Outcome of a whole pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub commands: Vec<CommandReport>,
    pub saves: Vec<SaveReport>,
    /// Error that aborted the run
    pub fault: Option<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Running,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            commands: Vec::new(),
            saves: Vec::new(),
            fault: None,
        }
    }

    pub fn success(&self) -> bool {
        self.state == PipelineState::Success
    }

    pub fn endpoint_count(&self) -> usize {
        self.commands.iter().map(|c| c.endpoints.len()).sum()
    }

    pub fn failed_commands(&self) -> usize {
        self.commands.iter().filter(|c| c.failed()).count()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a run report for terminal output
pub fn format_run_report(report: &RunReport) -> String {
    let mut output = String::new();
    output.push_str("\n═══════════════════════════════════════════════════════════════════\n");
    output.push_str("                        PIPELINE RESULTS\n");
    output.push_str("═══════════════════════════════════════════════════════════════════\n\n");

    for (i, command) in report.commands.iter().enumerate() {
        let icon = if command.failed() { "✗" } else { "✓" };
        output.push_str(&format!(
            "  {} Command {}: {} ({} {})\n",
            icon, i + 1, command.name, command.method, command.endpoint_template
        ));

        if let Some(ref error) = command.error {
            output.push_str(&format!("      Error: {}\n", error));
        }

        for endpoint in &command.endpoints {
            let target = if endpoint.url.is_empty() { &endpoint.endpoint } else { &endpoint.url };
            output.push_str(&format!("      {} {:?}\n", target, endpoint.duration));
            match &endpoint.outcome {
                EndpointOutcome::Completed { stored } if !stored.is_empty() => {
                    output.push_str(&format!("        Stored: {}\n", stored.join(", ")));
                }
                EndpointOutcome::Completed { .. } => {}
                EndpointOutcome::NotParsed => output.push_str("        Response not parsed\n"),
                EndpointOutcome::Skipped { reason } => {
                    output.push_str(&format!("        Skipped: {}\n", reason));
                }
                EndpointOutcome::Failed { error } => {
                    output.push_str(&format!("        Error: {}\n", error));
                }
            }
        }

        output.push('\n');
    }

    if !report.saves.is_empty() {
        output.push_str("  Saves:\n");
        for save in &report.saves {
            match &save.error {
                Some(error) => output.push_str(&format!("    ✗ {} {}: {}\n", save.kind, save.name, error)),
                None => output.push_str(&format!(
                    "    ✓ {} {} ({} written)\n",
                    save.kind, save.name, save.written
                )),
            }
        }
        output.push('\n');
    }

    if let Some(ref fault) = report.fault {
        output.push_str(&format!("  Aborted: {}\n\n", fault));
    }

    output.push_str("───────────────────────────────────────────────────────────────────\n");
    output.push_str(&format!(
        "  Result: {} | Commands: {} | Failed: {} | Endpoints: {} | Time: {:?}\n",
        report.state,
        report.commands.len(),
        report.failed_commands(),
        report.endpoint_count(),
        report.duration
    ));
    output.push_str("═══════════════════════════════════════════════════════════════════\n");

    output
}

/// Format a run report as JSON lines, one line per endpoint and save entry
/// followed by a summary line
pub fn format_run_report_json(report: &RunReport) -> String {
    let mut output = String::new();

    for command in &report.commands {
        if let Some(ref error) = command.error {
            let line = json!({
                "level": "error",
                "timestamp": Utc::now().to_rfc3339(),
                "event": "command_result",
                "command": command.name,
                "method": command.method,
                "endpoint": command.endpoint_template,
                "error": error,
            });
            output.push_str(&line.to_string());
            output.push('\n');
        }

        for endpoint in &command.endpoints {
            let (stored, detail) = match &endpoint.outcome {
                EndpointOutcome::Completed { stored } => (stored.clone(), None),
                EndpointOutcome::NotParsed => (Vec::new(), None),
                EndpointOutcome::Skipped { reason } => (Vec::new(), Some(reason.clone())),
                EndpointOutcome::Failed { error } => (Vec::new(), Some(error.clone())),
            };
            let line = json!({
                "level": if endpoint.outcome.is_failure() { "error" } else { "info" },
                "timestamp": Utc::now().to_rfc3339(),
                "event": "endpoint_result",
                "command": command.name,
                "method": command.method,
                "endpoint": endpoint.endpoint,
                "url": endpoint.url,
                "duration_ms": endpoint.duration.as_millis() as u64,
                "outcome": endpoint.outcome.label(),
                "stored": stored,
                "detail": detail,
            });
            output.push_str(&line.to_string());
            output.push('\n');
        }
    }

    for save in &report.saves {
        let line = json!({
            "level": if save.error.is_some() { "error" } else { "info" },
            "timestamp": Utc::now().to_rfc3339(),
            "event": "save_result",
            "kind": save.kind,
            "name": save.name,
            "written": save.written,
            "error": save.error,
        });
        output.push_str(&line.to_string());
        output.push('\n');
    }

    let summary = json!({
        "level": if report.success() { "info" } else { "error" },
        "timestamp": Utc::now().to_rfc3339(),
        "event": "pipeline_summary",
        "started_at": report.started_at.to_rfc3339(),
        "state": report.state.to_string(),
        "commands": report.commands.len(),
        "failed_commands": report.failed_commands(),
        "endpoints": report.endpoint_count(),
        "duration_ms": report.duration.as_millis() as u64,
        "fault": report.fault,
        "success": report.success(),
    });
    output.push_str(&summary.to_string());
    output.push('\n');

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> RunReport {
        let mut lookup = CommandReport::new("lookup", "GET", "bibs/{$mms_id}");
        lookup.endpoints.push(EndpointReport {
            endpoint: "bibs/991".to_string(),
            url: "http://api.test/bibs/991".to_string(),
            duration: Duration::from_millis(12),
            outcome: EndpointOutcome::Completed { stored: vec!["{$id}".to_string()] },
        });
        lookup.endpoints.push(EndpointReport {
            endpoint: "bibs/992".to_string(),
            url: "http://api.test/bibs/992".to_string(),
            duration: Duration::from_millis(3),
            outcome: EndpointOutcome::Failed { error: "JSON error: EOF".to_string() },
        });

        let mut items = CommandReport::new("items", "GET", "items/{$missing}");
        items.error = Some("Unknown variable {$missing} in template 'items/{$missing}'".to_string());

        let mut report = RunReport::new();
        report.state = PipelineState::Success;
        report.commands = vec![lookup, items];
        report.saves.push(SaveReport {
            kind: "property".to_string(),
            name: "Id".to_string(),
            written: 1,
            error: None,
        });
        report
    }

    #[test]
    fn test_command_failed() {
        let report = sample_report();
        assert!(report.commands[0].failed());
        assert!(report.commands[1].failed());
        assert!(!CommandReport::new("x", "GET", "y").failed());
        assert_eq!(report.failed_commands(), 2);
        assert_eq!(report.endpoint_count(), 2);
    }

    #[test]
    fn test_format_text() {
        let text = format_run_report(&sample_report());
        assert!(text.contains("PIPELINE RESULTS"));
        assert!(text.contains("Command 1: lookup (GET bibs/{$mms_id})"));
        assert!(text.contains("Stored: {$id}"));
        assert!(text.contains("Error: JSON error: EOF"));
        assert!(text.contains("Unknown variable {$missing}"));
        assert!(text.contains("property Id (1 written)"));
        assert!(text.contains("Result: SUCCESS"));
    }

    #[test]
    fn test_format_json_lines() {
        let text = format_run_report_json(&sample_report());
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        // two endpoints, one command error, one save, one summary
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0]["event"], "endpoint_result");
        assert_eq!(lines[0]["outcome"], "completed");
        assert_eq!(lines[0]["stored"][0], "{$id}");
        assert_eq!(lines[1]["level"], "error");
        assert_eq!(lines[1]["outcome"], "failed");
        assert_eq!(lines[2]["event"], "command_result");
        assert_eq!(lines[3]["event"], "save_result");
        assert_eq!(lines[4]["event"], "pipeline_summary");
        assert_eq!(lines[4]["state"], "SUCCESS");
        assert_eq!(lines[4]["success"], true);
    }
}
