//! Opslab - Entry Point
//!
//! Runs the scripted DevOps demos in real time and narrates them on the
//! console: a CI/CD pipeline, a metrics panel, an auto-scaling fleet and a
//! request travelling through a web architecture.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::Context;
use colored::Colorize;
use opslab::app::options::SimOptions;
use opslab::app::run::{run, SessionReport};
use opslab::logs::{init_logging, LogLevel, LogOptions};
use opslab::pipeline::RunPhase;
use opslab::settings::{Settings, DEFAULT_SETTINGS_FILE};
use opslab::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_main().await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn try_main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version)?);
        return Ok(());
    }

    // Retrieve the settings file
    let settings_file = cli_args
        .get("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let mut settings = Settings::load(&settings_file)
        .await
        .with_context(|| format!("unable to read settings file {}", settings_file.display()))?;
    apply_cli_overrides(&mut settings, &cli_args)?;

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
        log_dir: settings.log_dir.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Run the demo
    let options = SimOptions::from_settings(&settings);
    info!("Running opslab {} with options: {:?}", version.version, options);

    match run(options, await_shutdown_signal()).await {
        Ok(report) => {
            print_summary(&report);
            Ok(())
        }
        Err(e) => {
            error!("Simulation failed: {e}");
            Err(e).context("simulation failed")
        }
    }
}

fn apply_cli_overrides(
    settings: &mut Settings,
    cli_args: &HashMap<String, String>,
) -> anyhow::Result<()> {
    if let Some(level) = cli_args.get("log-level") {
        settings.log_level = level
            .parse::<LogLevel>()
            .map_err(anyhow::Error::msg)?;
    }
    if cli_args.contains_key("json-logs") {
        settings.json_logs = true;
    }
    if let Some(seed) = cli_args.get("seed") {
        settings.seed = Some(seed.parse::<u64>().with_context(|| format!("invalid seed: {seed}"))?);
    }
    if let Some(fault) = cli_args.get("fault") {
        settings.pipeline.fault_stage = Some(fault.clone());
    }
    if let Some(duration) = cli_args.get("duration") {
        settings.demo.duration_secs = duration
            .parse::<u64>()
            .with_context(|| format!("invalid duration: {duration}"))?;
    }
    Ok(())
}

fn print_summary(report: &SessionReport) {
    println!();
    println!("{} {}", "Session".bold(), report.session_id.dimmed());

    let pipeline = match report.pipeline.phase {
        RunPhase::Succeeded => "succeeded".green(),
        RunPhase::Failed { index } => format!(
            "failed at {}, rollback initiated",
            report.pipeline.stages[index].label
        )
        .red(),
        RunPhase::Running { index, .. } => {
            format!("still running ({})", report.pipeline.stages[index].label).yellow()
        }
        RunPhase::Idle => "idle".normal(),
    };
    println!("  pipeline: {}", pipeline);

    let sample = &report.metrics.sample;
    let alert = if report.metrics.alert_active {
        "ALERT".red().bold()
    } else {
        "ok".green()
    };
    println!(
        "  metrics:  {} ticks, cpu {:.0}%, memory {:.0}%, {:.0} req/s, errors {:.1}% [{}]",
        report.metrics.ticks,
        sample.cpu,
        sample.memory,
        sample.requests_per_sec,
        sample.error_rate,
        alert
    );

    let fleet = &report.scaling.state;
    println!(
        "  scaling:  {} servers at {}% traffic, {}% per server{}",
        fleet.server_count,
        fleet.traffic_level,
        report.scaling.load_per_server,
        fleet
            .failed_server
            .map(|s| format!(", server {} failed", s))
            .unwrap_or_default()
    );

    println!("  flow:     {} traversals completed", report.flow.completed_runs);
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
