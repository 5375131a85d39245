//! Runtime settings loader for eco-telemetry.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/settings.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/eco-telemetry/settings.yaml`
//!
//! Merge precedence is user over system. Every field is optional; whatever
//! neither file sets falls back to [`ReconcileConfig::default`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use eco_merge::SourcePrecedence;
use eco_quality::FieldBounds;
use eco_types::SourceKind;
use serde::Deserialize;

use crate::config::{HistoryDirection, ReconcileConfig};
use crate::error::SettingsError;
use crate::observability::ReconcileEvent;

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/settings.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "eco-telemetry/settings.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Merged settings file contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSettings {
    /// `reconcile:` section.
    #[serde(default)]
    pub reconcile: ReconcileSettings,
    /// `interpolation:` section.
    #[serde(default)]
    pub interpolation: InterpolationSettings,
    /// `sources:` section.
    #[serde(default)]
    pub sources: SourceSettings,
    /// `quality:` section.
    #[serde(default)]
    pub quality: QualitySettings,
}

/// Window, throttle, and precedence options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileSettings {
    /// Window cap.
    pub max_points: Option<usize>,
    /// Throttle between non-forced full runs.
    pub min_interval_ms: Option<u64>,
    /// Overlap before the watermark for incremental fetches.
    pub overlap_ms: Option<i64>,
    /// Merge precedence, lowest first (e.g. `[existing, persisted, channel_history, realtime]`).
    pub precedence: Option<Vec<SourceKind>>,
    /// Event bus capacity.
    pub event_capacity: Option<usize>,
}

/// Gap filling options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterpolationSettings {
    /// Gap threshold as a multiple of the expected interval.
    pub gap_threshold_factor: Option<f64>,
    /// Longest gap that is still filled.
    pub max_gap_ms: Option<i64>,
    /// Cap on synthetic points per gap.
    pub max_points_per_gap: Option<usize>,
}

/// Fetch limits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSettings {
    /// Persisted-store page size.
    pub page_size: Option<usize>,
    /// Persisted-store page limit.
    pub max_pages: Option<usize>,
    /// Channel-history limit.
    pub history_limit: Option<usize>,
    /// Channel-history order.
    pub history_direction: Option<HistoryDirection>,
}

/// Stall and anomaly thresholds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualitySettings {
    /// Live silence before a stall is reported.
    pub stall_timeout_ms: Option<u64>,
    /// Rolling window length.
    pub window_size: Option<usize>,
    /// z-score threshold.
    pub z_score_threshold: Option<f64>,
    /// Samples required before z-scores apply.
    pub min_samples: Option<usize>,
    /// Identical readings before a sensor counts as stuck.
    pub stuck_count: Option<usize>,
    /// Nominal live sample spacing.
    pub sample_interval_ms: Option<u64>,
    /// Relative jump from the rolling mean that is flagged.
    pub electrical_jump_pct: Option<f64>,
    /// Acceleration magnitude ceiling.
    pub accel_magnitude_max: Option<f64>,
    /// Gyro change per sample ceiling.
    pub gyro_rate_max: Option<f64>,
    /// GPS-implied speed ceiling (m/s).
    pub gps_impossible_speed: Option<f64>,
    /// Altitude change per fix ceiling (m).
    pub altitude_rate_max: Option<f64>,
    /// Speed change rate ceiling (m/s²).
    pub speed_impossible_accel: Option<f64>,
    /// Per-field bounds; entries replace the defaults field by field.
    pub bounds: Option<BTreeMap<String, FieldBounds>>,
}

impl RuntimeSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            reconcile: self.reconcile.merge(overlay.reconcile),
            interpolation: self.interpolation.merge(overlay.interpolation),
            sources: self.sources.merge(overlay.sources),
            quality: self.quality.merge(overlay.quality),
        }
    }

    /// Apply these settings on top of the defaults and clamp the result.
    #[must_use]
    pub fn into_config(self) -> ReconcileConfig {
        let mut config = ReconcileConfig::default();

        let reconcile = self.reconcile;
        if let Some(value) = reconcile.max_points {
            config.max_points = value;
        }
        if let Some(value) = reconcile.min_interval_ms {
            config.min_interval_ms = value;
        }
        if let Some(value) = reconcile.overlap_ms {
            config.overlap_ms = value;
        }
        if let Some(order) = reconcile.precedence
            && !order.is_empty()
        {
            config.precedence = SourcePrecedence::new(order);
        }
        if let Some(value) = reconcile.event_capacity {
            config.event_capacity = value;
        }

        let interpolation = self.interpolation;
        if let Some(value) = interpolation.gap_threshold_factor {
            config.interpolation.gap_threshold_factor = value;
        }
        if let Some(value) = interpolation.max_gap_ms {
            config.interpolation.max_gap_ms = value;
        }
        if let Some(value) = interpolation.max_points_per_gap {
            config.interpolation.max_points_per_gap = value;
        }

        let sources = self.sources;
        config.page_size = sources.page_size.unwrap_or(config.page_size);
        config.max_pages = sources.max_pages.unwrap_or(config.max_pages);
        config.history_limit = sources.history_limit.unwrap_or(config.history_limit);
        config.history_direction = sources
            .history_direction
            .unwrap_or(config.history_direction);

        let quality = self.quality;
        let q = &mut config.quality;
        q.stall_timeout_ms = quality.stall_timeout_ms.unwrap_or(q.stall_timeout_ms);
        q.window_size = quality.window_size.unwrap_or(q.window_size);
        q.z_score_threshold = quality.z_score_threshold.unwrap_or(q.z_score_threshold);
        q.min_samples = quality.min_samples.unwrap_or(q.min_samples);
        q.stuck_count = quality.stuck_count.unwrap_or(q.stuck_count);
        q.sample_interval_ms = quality.sample_interval_ms.unwrap_or(q.sample_interval_ms);
        q.electrical_jump_pct = quality.electrical_jump_pct.unwrap_or(q.electrical_jump_pct);
        q.accel_magnitude_max = quality.accel_magnitude_max.unwrap_or(q.accel_magnitude_max);
        q.gyro_rate_max = quality.gyro_rate_max.unwrap_or(q.gyro_rate_max);
        q.gps_impossible_speed = quality.gps_impossible_speed.unwrap_or(q.gps_impossible_speed);
        q.altitude_rate_max = quality.altitude_rate_max.unwrap_or(q.altitude_rate_max);
        q.speed_impossible_accel = quality
            .speed_impossible_accel
            .unwrap_or(q.speed_impossible_accel);
        if let Some(bounds) = quality.bounds {
            q.bounds.extend(bounds);
        }

        config.normalized()
    }
}

impl ReconcileSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            max_points: overlay.max_points.or(self.max_points),
            min_interval_ms: overlay.min_interval_ms.or(self.min_interval_ms),
            overlap_ms: overlay.overlap_ms.or(self.overlap_ms),
            precedence: overlay.precedence.or(self.precedence),
            event_capacity: overlay.event_capacity.or(self.event_capacity),
        }
    }
}

impl InterpolationSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            gap_threshold_factor: overlay.gap_threshold_factor.or(self.gap_threshold_factor),
            max_gap_ms: overlay.max_gap_ms.or(self.max_gap_ms),
            max_points_per_gap: overlay.max_points_per_gap.or(self.max_points_per_gap),
        }
    }
}

impl SourceSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            page_size: overlay.page_size.or(self.page_size),
            max_pages: overlay.max_pages.or(self.max_pages),
            history_limit: overlay.history_limit.or(self.history_limit),
            history_direction: overlay.history_direction.or(self.history_direction),
        }
    }
}

impl QualitySettings {
    fn merge(self, overlay: Self) -> Self {
        let bounds = match (self.bounds, overlay.bounds) {
            (Some(mut base), Some(top)) => {
                base.extend(top);
                Some(base)
            }
            (base, top) => top.or(base),
        };
        Self {
            stall_timeout_ms: overlay.stall_timeout_ms.or(self.stall_timeout_ms),
            window_size: overlay.window_size.or(self.window_size),
            z_score_threshold: overlay.z_score_threshold.or(self.z_score_threshold),
            min_samples: overlay.min_samples.or(self.min_samples),
            stuck_count: overlay.stuck_count.or(self.stuck_count),
            sample_interval_ms: overlay.sample_interval_ms.or(self.sample_interval_ms),
            electrical_jump_pct: overlay.electrical_jump_pct.or(self.electrical_jump_pct),
            accel_magnitude_max: overlay.accel_magnitude_max.or(self.accel_magnitude_max),
            gyro_rate_max: overlay.gyro_rate_max.or(self.gyro_rate_max),
            gps_impossible_speed: overlay.gps_impossible_speed.or(self.gps_impossible_speed),
            altitude_rate_max: overlay.altitude_rate_max.or(self.altitude_rate_max),
            speed_impossible_accel: overlay
                .speed_impossible_accel
                .or(self.speed_impossible_accel),
            bounds,
        }
    }
}

/// Load merged runtime settings (user overrides system).
pub fn load_runtime_settings() -> RuntimeSettings {
    let (system_path, user_path) = runtime_settings_paths();
    load_runtime_settings_from_paths(&system_path, &user_path)
}

#[doc(hidden)]
pub fn runtime_settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
pub fn load_runtime_settings_from_paths(system: &Path, user: &Path) -> RuntimeSettings {
    load_one(system).merge(load_one(user))
}

/// Read one settings file, failing on unreadable or malformed content.
///
/// # Errors
///
/// Returns [`SettingsError`] when the file cannot be read or parsed.
pub fn load_settings_file(path: &Path) -> Result<RuntimeSettings, SettingsError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(RuntimeSettings::default());
    }
    serde_yaml::from_str(&raw).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_one(path: &Path) -> RuntimeSettings {
    if !path.exists() {
        return RuntimeSettings::default();
    }
    match load_settings_file(path) {
        Ok(settings) => {
            tracing::debug!(
                event = ReconcileEvent::SettingsLoaded.as_str(),
                path = %path.display(),
                "settings file loaded"
            );
            settings
        }
        Err(error) => {
            tracing::warn!(
                event = ReconcileEvent::SettingsIgnored.as_str(),
                path = %path.display(),
                error = %error,
                "failed to load settings file; ignoring"
            );
            RuntimeSettings::default()
        }
    }
}

fn project_root() -> PathBuf {
    std::env::var("PRJ_ROOT")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Set config-home override (used by CLI `--conf`).
///
/// The path can be absolute, or relative to `PRJ_ROOT`/cwd.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return;
    }
    if CONFIG_HOME_OVERRIDE.set(path.clone()).is_err()
        && let Some(current) = CONFIG_HOME_OVERRIDE.get()
        && current != &path
    {
        tracing::warn!(
            current = %current.display(),
            ignored = %path.display(),
            "config home override already set; ignoring subsequent value"
        );
    }
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    if let Some(path) = CONFIG_HOME_OVERRIDE.get() {
        return absolutize(project_root, path.clone());
    }

    let configured = std::env::var("PRJ_CONFIG_HOME")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_HOME_RELATIVE_PATH.to_string());
    absolutize(project_root, PathBuf::from(configured))
}

fn absolutize(project_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}
