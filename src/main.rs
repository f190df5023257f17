//! CLI entry point for the fuel alert cache.
//!
//! Refreshes each region's alert cache from its dashboard endpoint, once or on
//! a fixed cadence, and exports the derived dashboard tables as CSV.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use fuel_alerts::{
    config::Config,
    fetch::BasicClient,
    output::{RunSummary, append_record, write_combined_data_loss, write_region_exports},
    pipeline::{RefreshReport, RegionViews, refresh_all},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fuel_alerts")]
#[command(about = "Incremental fuel alert cache for the regional dashboards", long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, env = "FUEL_ALERTS_CONFIG", default_value = "fuel_alerts.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh every region once
    Run {
        /// Optional: CSV file to append one summary row per region to
        #[arg(long)]
        run_log: Option<PathBuf>,
    },
    /// Refresh every region on a fixed cadence
    Poll {
        /// Seconds between refresh cycles
        #[arg(short, long, default_value_t = 21_600)]
        interval_secs: u64,

        /// Number of cycles to run (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        iterations: usize,

        /// Optional: CSV file to append one summary row per region to
        #[arg(long)]
        run_log: Option<PathBuf>,
    },
    /// Refresh every region, then write its dashboard tables as CSV
    Export {
        /// Directory to write one sub-directory of CSVs per region into
        #[arg(short, long, default_value = "exports")]
        output_dir: PathBuf,

        /// Optional: only include alerts at or after this epoch-ms timestamp
        #[arg(long)]
        start_ms: Option<i64>,

        /// Optional: only include alerts at or before this epoch-ms timestamp
        #[arg(long)]
        end_ms: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fuel_alerts.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fuel_alerts.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    info!(
        config = %cli.config.display(),
        regions = config.regions.len(),
        cache_dir = %config.cache_dir.display(),
        "Config loaded"
    );

    let client = Arc::new(
        BasicClient::new(config.request_timeout()).context("building HTTP client")?,
    );

    match cli.command {
        Commands::Run { run_log } => {
            let report = refresh_all(&config, client, Utc::now()).await;
            log_report(&report, run_log.as_deref());
        }
        Commands::Poll {
            interval_secs,
            iterations,
            run_log,
        } => {
            if iterations == 0 {
                info!(interval_secs, "Polling infinitely. Press Ctrl+C to stop.");
            } else {
                info!(iterations, interval_secs, "Starting poll");
            }

            let mut cycle = 0;
            loop {
                if iterations > 0 && cycle >= iterations {
                    break;
                }
                cycle += 1;

                info!(cycle, "Starting refresh cycle");
                let report = refresh_all(&config, client.clone(), Utc::now()).await;
                log_report(&report, run_log.as_deref());

                if iterations == 0 || cycle < iterations {
                    info!(interval_secs, "Waiting before next cycle");
                    tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)).await;
                }
            }
        }
        Commands::Export {
            output_dir,
            start_ms,
            end_ms,
        } => {
            let report = refresh_all(&config, client, Utc::now()).await;
            log_report(&report, None);

            let mut all_views = Vec::with_capacity(report.runs.len());
            for run in &report.runs {
                let views = match (start_ms, end_ms) {
                    (None, None) => run.views(),
                    (start, end) => RegionViews::derive_within(
                        &run.region,
                        &run.tables,
                        start.unwrap_or(i64::MIN),
                        end.unwrap_or(i64::MAX),
                    ),
                };
                write_region_exports(&output_dir, &views)?;
                all_views.push(views);
            }
            write_combined_data_loss(&output_dir, &all_views)?;
            info!(output_dir = %output_dir.display(), "Export complete");
        }
    }

    Ok(())
}

/// Logs per-region results and the partial-failure banner, and appends each
/// region's summary to `run_log` when one is given.
fn log_report(report: &RefreshReport, run_log: Option<&Path>) {
    let now = Utc::now();
    for run in &report.runs {
        info!(
            region = %run.region,
            window = %run.window.range(),
            fetched = ?run.fetched,
            fresh = run.stats.fresh,
            kept = run.stats.kept,
            trimmed = run.stats.trimmed,
            failed = run.failures.len(),
            "Region refreshed"
        );

        if let Some(path) = run_log {
            if let Err(e) = append_record(path, &RunSummary::from_run(now, run)) {
                error!(path = %path.display(), error = %e, "Failed to append run log");
            }
        }
    }

    for (region, e) in &report.errors {
        error!(region = %region, error = %format!("{e:#}"), "Region skipped");
    }

    if let Some(banner) = report.banner() {
        warn!(failed = report.failed_requests(), "{banner}");
    }
}
