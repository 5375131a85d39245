use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "eco-telemetry",
    about = "Reconcile persisted, channel-history, and live telemetry into one series",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Override config home directory (user settings: `<DIR>/eco-telemetry/settings.yaml`).
    #[arg(long, value_name = "DIR", global = true)]
    pub(crate) conf: Option<PathBuf>,

    /// Debug logging (`RUST_LOG` still takes precedence).
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Initial load of one session from JSONL files; prints stats, writes the merged series.
    Reconcile {
        /// Session to reconcile.
        #[arg(long)]
        session: String,

        /// Persisted-store export (JSONL).
        #[arg(long, value_name = "FILE")]
        persisted: PathBuf,

        /// Channel-history export (JSONL).
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,

        /// Write the full outcome (stats + merged series) here instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Initial load, then feed a live JSONL file through the fast path.
    Replay {
        /// Session to reconcile.
        #[arg(long)]
        session: String,

        /// Persisted-store export (JSONL).
        #[arg(long, value_name = "FILE")]
        persisted: PathBuf,

        /// Channel-history export (JSONL).
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,

        /// Live records to replay (JSONL), in arrival order.
        #[arg(long, value_name = "FILE")]
        live: PathBuf,

        /// Delay between live records.
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,

        /// Period of the background refresh loop.
        #[arg(long, default_value_t = 5)]
        refresh_secs: u64,
    },
    /// Estimate the sampling interval of a JSONL file and list its gaps.
    Gaps {
        /// Records to inspect (JSONL).
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Only consider this session.
        #[arg(long)]
        session: Option<String>,

        /// Override the longest gap that is filled by interpolation.
        #[arg(long)]
        max_gap_ms: Option<i64>,
    },
}
