//! Main execution logic

use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, LogFormat, OutputFormat};
use crate::client::HttpTransport;
use crate::errors::{RestchainError, Result};
use crate::pipeline::{
    apply_cli_variables, format_run_report, format_run_report_json, load_pipeline, MemorySink,
    Pipeline, PipelineConfig,
};
use crate::status::ExitStatus;

/// Main entry point for the CLI.
///
/// Parses arguments, sets up logging, then loads and runs the pipeline.
pub fn run(args: Vec<String>) -> ExitStatus {
    let args = match Args::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitStatus::Error } else { ExitStatus::Success };
        }
    };

    init_logging(args.verbose, args.log_format.unwrap_or_default());

    match run_pipeline(&args) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("restchain: error: {}", e);
            ExitStatus::Error
        }
    }
}

/// Install the global tracing subscriber on stderr.
///
/// `-v` and `-vv` pick the level; without them `RESTCHAIN_LOG`, then
/// `RUST_LOG`, then `warn` apply.
pub fn init_logging(verbose: u8, format: LogFormat) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("RESTCHAIN_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // A subscriber may already be installed when embedded
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
}

/// Load the pipeline file and apply the command line overrides.
pub fn prepare_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = load_pipeline(&args.pipeline)?;
    apply_cli_variables(&mut config, &args.vars)?;

    if let Some(ref url) = args.url {
        config.url = url.clone();
    }
    if let Some(ref api_key) = args.api_key {
        config.api_key = api_key.clone();
    }
    if args.timeout.is_some() {
        config.timeout = args.timeout.clone();
    }

    if config.url.trim().is_empty() {
        return Err(RestchainError::Config(
            "No base URL, set 'url' in the pipeline or pass --url".to_string(),
        ));
    }

    Ok(config)
}

fn parse_timeout(config: &PipelineConfig) -> Result<Option<Duration>> {
    config
        .timeout
        .as_deref()
        .map(|t| {
            humantime::parse_duration(t)
                .map_err(|e| RestchainError::Config(format!("Invalid timeout '{}': {}", t, e)))
        })
        .transpose()
}

fn run_pipeline(args: &Args) -> Result<ExitStatus> {
    let config = prepare_config(args)?;
    let timeout = parse_timeout(&config)?;
    debug!(pipeline = %args.pipeline.display(), timeout = ?timeout, "Pipeline loaded");

    let transport = HttpTransport::new(timeout)?;
    let mut pipeline = Pipeline::from_config(&config, transport)?;

    if args.validate {
        println!(
            "Pipeline is valid: {} commands, {} variables, {} saves",
            pipeline.commands().len(),
            pipeline.store().len(),
            config.saves.len()
        );
        for command in pipeline.commands() {
            for placeholder in &command.unresolved {
                println!("  warning: {} has no value for {}", command.name, placeholder);
            }
        }
        return Ok(ExitStatus::Success);
    }

    let mut sink = MemorySink::new();
    let report = pipeline.run(&mut sink)?;
    info!(records = sink.records().len(), groups = sink.groups().len(), "Saved records collected");

    match args.format {
        OutputFormat::Text => {
            print!("{}", format_run_report(&report));
            if !sink.records().is_empty() {
                println!("Saved:");
                for record in sink.records() {
                    println!("  {} {} = {}", record.kind, record.name, record.value);
                }
            }
            if !sink.groups().is_empty() {
                println!("Groups:");
                for group in sink.groups() {
                    let fields: Vec<String> = group
                        .fields
                        .iter()
                        .map(|field| format!("{}={}", field.name, field.value))
                        .collect();
                    println!("  {}: {}", group.name, fields.join(", "));
                }
            }
        }
        OutputFormat::Json => {
            print!("{}", format_run_report_json(&report));
            for record in sink.records() {
                let line = serde_json::json!({
                    "event": "saved_record",
                    "kind": record.kind,
                    "name": record.name,
                    "value": record.value,
                });
                println!("{}", line);
            }
            for group in sink.groups() {
                let line = serde_json::json!({
                    "event": "saved_group",
                    "name": group.name,
                    "fields": group.fields,
                });
                println!("{}", line);
            }
        }
    }

    Ok(ExitStatus::from_state(report.state))
}
