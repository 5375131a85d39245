//! Library side of the `eco-telemetry` binary: JSONL-backed sources and the
//! command implementations, so both can be tested without a process.

mod commands;
mod jsonl;

pub use commands::{
    GapReport, ReplayOptions, ReplaySummary, RunSummary, build_coordinator, run_gaps, run_reconcile,
    run_replay,
};
pub use jsonl::{JsonlHistory, JsonlStore, read_jsonl};
