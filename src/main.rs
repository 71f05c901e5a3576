mod brand;
mod catalog;
mod config;
mod dedupe;
mod http;
mod llm;
mod metrics;
mod models;
mod parse;
mod pipeline;
mod prompts;

use clap::Parser;
use clap::error::ErrorKind;
use config::{AppConfig, Cli};
use models::ProcessSummary;
use pipeline::Pipeline;
use std::{fs::File, path::Path, process::ExitCode, sync::Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };
    let config = cli.into_config();
    init_tracing(config.log_file.as_deref());

    if !config.input.exists() {
        eprintln!("Error: File not found: {}", config.input.display());
        return ExitCode::FAILURE;
    }

    let summary = run(&config);
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            error!(target = "catalog.main", error = %err, "summary_encode_failed");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn run(config: &AppConfig) -> ProcessSummary {
    let mut pipeline = match Pipeline::from_config(config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            error!(target = "catalog.main", error = %format!("{err:#}"), "init_failed");
            return ProcessSummary::failed(format!("Failed to initialize processor: {err:#}"));
        }
    };
    let summary = pipeline.process_file(&config.input);
    info!(
        target = "catalog.main",
        total = summary.total,
        processed = summary.processed,
        skipped = summary.skipped,
        errors = summary.errors,
        success = summary.success,
        "run_finished"
    );
    summary
}

/// Logs go to stderr; stdout carries only the summary.
fn init_tracing(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, file_error) = match log_file.map(File::create) {
        Some(Ok(file)) => (
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            None,
        ),
        Some(Err(err)) => (None, Some(err)),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    if let Some(err) = file_error {
        warn!(target = "catalog.main", error = %err, "log_file_unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_llm_yields_failure_summary() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(&pipeline::tests::offline_config(dir.path(), true));
        assert!(!summary.success);
        assert_eq!((summary.total, summary.errors), (0, 1));
        assert!(
            summary
                .error
                .unwrap()
                .starts_with("Failed to initialize processor: LLM unavailable")
        );
    }
}
