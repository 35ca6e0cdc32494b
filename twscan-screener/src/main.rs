//! twscan - Daily TWSE volume breakout screener.
//!
//! Runs one scan and exits. The result file is written on every run, empty
//! when the run fails.

use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use twscan_common::config::Config;
use twscan_common::logging::{init_logging, init_logging_with_exclusions};
use twscan_screener::screener::ScanStatus;
use twscan_screener::{write_empty_result, RunOptions, ScanService};

#[derive(Debug, Parser)]
#[command(name = "twscan", version, about = "Screen TWSE for volume breakouts")]
struct Cli {
    /// Config file (default: ~/.twscan/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Screen this date instead of the latest session
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Log the report instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Result file (overrides output.result_path)
    #[arg(long, value_name = "PATH")]
    result: Option<PathBuf>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", raw, e))
}

/// Record the failure in the result file and pick the exit code.
fn fail(result_path: &str, date: NaiveDate) -> ExitCode {
    if let Err(e) = write_empty_result(result_path, date) {
        tracing::error!(error = %format!("{:#}", e), "Failed to write empty scan result");
    }
    ExitCode::FAILURE
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let today = cli.date.unwrap_or_else(|| Local::now().date_naive());

    let mut config = match Config::load_with_env(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info", "pretty");
            tracing::error!(error = %e, "Failed to load configuration");
            let path = cli
                .result
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| Config::default().output.result_path);
            return fail(&path, today);
        }
    };
    if let Some(path) = &cli.result {
        config.output.result_path = path.to_string_lossy().into_owned();
    }

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("twscan v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        telegram_token_present = config.telegram_bot_token().is_some(),
        telegram_chat_id_present = config.telegram_chat_id().is_some(),
        dry_run = cli.dry_run,
        "Credentials checked"
    );

    let require_notifier = !cli.dry_run && config.notification.enabled;
    if let Err(e) = config.validate_for_run(require_notifier) {
        tracing::error!(error = %e, "Configuration is invalid");
        return fail(&config.output.result_path, today);
    }

    let options = RunOptions {
        dry_run: cli.dry_run,
    };
    let service = match ScanService::new(&config, &options) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Failed to start scan service");
            return fail(&config.output.result_path, today);
        }
    };
    tracing::info!(notifier = service.notifier_name(), "Scan service ready");

    match service.run(cli.date).await {
        Ok(outcome) => {
            tracing::info!(
                status = ?outcome.status,
                signal_date = %outcome.signal_date,
                stocks = outcome.result.all_codes.len(),
                "Scan finished"
            );
            if outcome.status == ScanStatus::NoTradingData {
                tracing::warn!("No market data for the requested date");
            }
            ExitCode::SUCCESS
        }
        // the orchestrator already wrote the empty result
        Err(_) => ExitCode::FAILURE,
    }
}
