//! Telemetry reconciliation: one gap-free series per session out of a
//! persisted store, a bounded channel history, and a live feed.
//!
//! # Architecture
//!
//! ```text
//! initial_load / refresh / force_refresh          merge_realtime
//!        ↓                                              ↓
//! Coordinator (throttle, coalesce, session)     MergeWindow (fast path)
//!        ↓
//! PersistedStore ∥ ChannelHistory  →  normalize  →  build_series
//!        ↓
//! MergeWindow.replace  →  EventBus (DataReady, Progress, SourceError, ...)
//! ```
//!
//! Transport clients are not part of this crate. They implement
//! [`PersistedStore`] (or [`PageFetcher`], wrapped in
//! [`PagedPersistedStore`]) and [`ChannelHistory`], returning raw JSON rows.
//!
//! Settings come from `packages/conf/settings.yaml` overlaid by
//! `$PRJ_CONFIG_HOME/eco-telemetry/settings.yaml`; see
//! [`load_runtime_settings`].

mod config;
mod coordinator;
mod error;
mod observability;
mod settings;
mod source;

pub use config::{HistoryDirection, ReconcileConfig};
pub use coordinator::{
    Coordinator, LiveOutcome, ReconcileOptions, ReconcileOutcome, ReconcileStatus,
    ReconciliationState,
};
pub use error::{SettingsError, SourceError};
pub use observability::ReconcileEvent;
pub use settings::{
    InterpolationSettings, QualitySettings, ReconcileSettings, RuntimeSettings, SourceSettings,
    load_runtime_settings, load_runtime_settings_from_paths, load_settings_file,
    runtime_settings_paths, set_config_home_override,
};
pub use source::{
    ChannelHistory, FetchRequest, NoChannelHistory, PageFetcher, PagedPersistedStore,
    PersistedStore, ProgressSink,
};

pub use eco_events::{EngineEvent, EventBus, EventKind, ListenerHandle, ReconcileStats, topics};
pub use eco_types::{SourceKind, TelemetryRecord};
pub use eco_window::{AppendAction, AppendOutcome, WindowSnapshot};
