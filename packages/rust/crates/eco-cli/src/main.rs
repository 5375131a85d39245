//! eco-telemetry CLI: reconcile, replay, or inspect JSONL telemetry exports.
//!
//! Logging: set `RUST_LOG=eco_reconcile=debug` (or `warn`, `trace`) to see engine logs on stderr.

mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use eco_cli::{
    ReplayOptions, RunSummary, build_coordinator, run_gaps, run_reconcile, run_replay,
};
use eco_reconcile::{load_runtime_settings, set_config_home_override};

use crate::cli::{Cli, Command};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{body}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }

    // RUST_LOG overrides; --verbose => debug; else info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "eco_telemetry=debug,eco_cli=debug,eco_reconcile=debug"
        } else {
            "eco_telemetry=info,eco_cli=info,eco_reconcile=info"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = load_runtime_settings().into_config();

    match cli.command {
        Command::Reconcile {
            session,
            persisted,
            history,
            out,
        } => {
            let coordinator = build_coordinator(config, &persisted, history.as_deref())?;
            let outcome = run_reconcile(&coordinator, &session, out.as_deref()).await?;
            if out.is_some() {
                print_json(&RunSummary::from(&outcome))
            } else {
                print_json(&outcome)
            }
        }
        Command::Replay {
            session,
            persisted,
            history,
            live,
            interval_ms,
            refresh_secs,
        } => {
            let coordinator = build_coordinator(config, &persisted, history.as_deref())?;
            let options = ReplayOptions {
                interval: Duration::from_millis(interval_ms),
                refresh_every: Duration::from_secs(refresh_secs.max(1)),
            };
            let summary = run_replay(&coordinator, &session, &live, options).await?;
            print_json(&summary)
        }
        Command::Gaps {
            input,
            session,
            max_gap_ms,
        } => {
            let mut interpolation = config.interpolation;
            if let Some(max_gap_ms) = max_gap_ms {
                interpolation.max_gap_ms = max_gap_ms.max(0);
            }
            let report = run_gaps(&input, session.as_deref(), &interpolation)?;
            print_json(&report)
        }
    }
}
