#![allow(dead_code)]

//! Settings & Tuning Configuration
//!
//! User-facing settings snapshot plus the tuning parameters of the
//! adaptation heuristics. Settings are loaded from a JSON file under the
//! user config directory and hot-reloaded when the file changes; every
//! pipeline cycle reads one immutable snapshot, so edits take effect on
//! the next cycle, never mid-cycle.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::overlay::{BlurIntensity, BlurStyle};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    NoConfigDir,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "settings io error at {}: {}", path.display(), message)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "settings parse error at {}: {}", path.display(), message)
            }
            ConfigError::NoConfigDir => write!(f, "no user config directory available"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// APP SETTINGS
// ============================================================================

/// User-configured settings, consumed as a read-only snapshot each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Master switch for the whole detection pipeline
    pub detection_enabled: bool,

    /// Blur detected female faces
    pub blur_female_faces: bool,
    /// Blur detected male faces
    pub blur_male_faces: bool,
    /// Run NSFW detection on frames
    pub detect_nsfw: bool,

    /// User sensitivity slider (0.0 - 1.0); gates the tiered NSFW checks
    pub sensitivity: f32,

    /// Base NSFW confidence threshold; adaptation starts from here
    pub nsfw_threshold: f32,
    /// Base gender confidence threshold; adaptation starts from here
    pub gender_threshold: f32,

    /// Visual treatment of blurred regions
    pub blur_style: BlurStyle,
    pub blur_intensity: BlurIntensity,

    /// Interval between captures (clamped to the global floor)
    pub capture_interval_ms: u64,
    /// Budget handed to the classifier for one frame
    pub max_processing_time_ms: u64,
    /// Minimum time a blur stays up once shown
    pub min_blur_duration_ms: u64,

    /// Number of high-confidence NSFW regions that escalates to full screen
    pub region_density_threshold: usize,
    /// Seconds the full-screen warning refuses dismissal
    pub reflection_seconds: u32,

    /// Check browser URLs against the site blocklist
    pub site_blocking_enabled: bool,

    /// Consult the external decision advisor for region-dense frames
    pub advisor_enabled: bool,
    pub advisor_url: String,
    pub advisor_timeout_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            detection_enabled: true,
            blur_female_faces: true,
            blur_male_faces: false,
            detect_nsfw: true,
            sensitivity: 0.5,
            nsfw_threshold: 0.5,
            gender_threshold: 0.6,
            blur_style: BlurStyle::Pixelate,
            blur_intensity: BlurIntensity::Medium,
            capture_interval_ms: constants::DEFAULT_CAPTURE_INTERVAL_MS,
            max_processing_time_ms: 2_000,
            min_blur_duration_ms: 2_000,
            region_density_threshold: 6,
            reflection_seconds: 5,
            site_blocking_enabled: true,
            advisor_enabled: constants::is_advisor_enabled(),
            advisor_url: constants::get_advisor_url(),
            advisor_timeout_ms: constants::get_advisor_timeout_ms(),
        }
    }
}

impl AppSettings {
    /// Capture interval with the global floor applied.
    pub fn effective_capture_interval_ms(&self) -> u64 {
        self.capture_interval_ms.max(constants::MIN_CAPTURE_INTERVAL_MS)
    }

    /// Any face blurring active at all.
    pub fn blur_faces(&self) -> bool {
        self.blur_female_faces || self.blur_male_faces
    }
}

// ============================================================================
// TUNING PARAMETERS
// ============================================================================

/// Knobs of the adaptation and tiering heuristics. These are product-tuned
/// values, kept adjustable rather than baked into the engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningParams {
    /// Clamp bounds for the adaptive NSFW threshold
    pub nsfw_threshold_min: f32,
    pub nsfw_threshold_max: f32,
    /// Clamp bounds for the adaptive gender threshold
    pub gender_threshold_min: f32,
    pub gender_threshold_max: f32,

    /// History ratio above which thresholds step down (more vigilant)
    pub high_detection_ratio: f32,
    /// History ratio below which thresholds step back up (relax)
    pub low_detection_ratio: f32,
    /// Step applied when relaxing
    pub raise_step: f32,
    /// Step applied when tightening
    pub lower_step: f32,

    /// Medium NSFW tier fires at `factor * threshold`
    pub nsfw_medium_factor: f32,
    /// Any-indicator NSFW tier floor
    pub nsfw_any_floor: f32,
    /// Sensitivity required to arm the medium tier
    pub medium_sensitivity_gate: f32,
    /// Sensitivity required to arm the any-indicator tier
    pub any_sensitivity_gate: f32,

    /// Region confidence that counts toward density escalation
    pub high_region_confidence: f32,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            nsfw_threshold_min: 0.2,
            nsfw_threshold_max: 0.7,
            gender_threshold_min: 0.3,
            gender_threshold_max: 0.8,
            high_detection_ratio: 0.8,
            low_detection_ratio: 0.1,
            raise_step: 0.02,
            lower_step: 0.05,
            nsfw_medium_factor: 0.7,
            nsfw_any_floor: 0.2,
            medium_sensitivity_gate: 0.6,
            any_sensitivity_gate: 0.8,
            high_region_confidence: 0.7,
        }
    }
}

// ============================================================================
// SAFETY KILL-SWITCHES
// ============================================================================

// Default state: all systems nominal (enabled)
static DETECTION_ENABLED: AtomicBool = AtomicBool::new(true);
static OVERLAYS_ENABLED: AtomicBool = AtomicBool::new(true);
static ACTIONS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Process-wide kill-switches for panic paths. Flipping one of these takes
/// effect immediately, independent of the settings file.
pub struct SafetyConfig;

impl SafetyConfig {
    pub fn is_detection_enabled() -> bool {
        DETECTION_ENABLED.load(Ordering::Relaxed)
    }

    pub fn is_overlays_enabled() -> bool {
        OVERLAYS_ENABLED.load(Ordering::Relaxed)
    }

    pub fn is_actions_enabled() -> bool {
        ACTIONS_ENABLED.load(Ordering::Relaxed)
    }

    // Setters (e.g. from an emergency handler)
    pub fn set_detection(val: bool) {
        DETECTION_ENABLED.store(val, Ordering::Relaxed);
    }
    pub fn set_overlays(val: bool) {
        OVERLAYS_ENABLED.store(val, Ordering::Relaxed);
    }
    pub fn set_actions(val: bool) {
        ACTIONS_ENABLED.store(val, Ordering::Relaxed);
    }
}

// ============================================================================
// SETTINGS HANDLE
// ============================================================================

/// Shared settings holder. The pipeline clones one snapshot per cycle;
/// writers (file watcher, host application) swap the whole value.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<AppSettings>>,
    tuning: Arc<RwLock<TuningParams>>,
}

impl SettingsHandle {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
            tuning: Arc::new(RwLock::new(TuningParams::default())),
        }
    }

    /// Immutable snapshot for one pipeline cycle.
    pub fn snapshot(&self) -> AppSettings {
        self.inner.read().clone()
    }

    pub fn tuning(&self) -> TuningParams {
        self.tuning.read().clone()
    }

    pub fn update(&self, settings: AppSettings) {
        *self.inner.write() = settings;
    }

    pub fn update_tuning(&self, tuning: TuningParams) {
        *self.tuning.write() = tuning;
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(AppSettings::default())
    }
}

// ============================================================================
// FILE PERSISTENCE & HOT RELOAD
// ============================================================================

/// Default settings file location under the user config directory.
pub fn default_settings_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("screen-shield").join("settings.json"))
}

/// Load settings from a JSON file. A missing file yields defaults.
pub fn load_settings(path: &Path) -> Result<AppSettings, ConfigError> {
    if !path.exists() {
        log::info!("[Config] No settings file at {}, using defaults", path.display());
        return Ok(AppSettings::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Save settings to a JSON file, creating parent directories as needed.
pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    let content = serde_json::to_string_pretty(settings).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    std::fs::write(path, content).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Watch a settings file and push reloaded snapshots into the handle.
/// Returns the watcher; dropping it stops the reloads.
pub fn watch_settings(
    path: PathBuf,
    handle: SettingsHandle,
) -> Result<RecommendedWatcher, ConfigError> {
    let watch_dir = path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| ConfigError::Io {
            path: path.clone(),
            message: "settings path has no parent directory".to_string(),
        })?;

    let watched = path.clone();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        let event = match event {
            Ok(e) => e,
            Err(e) => {
                log::warn!("[Config] Watch error: {}", e);
                return;
            }
        };

        if !event.paths.iter().any(|p| p == &watched) {
            return;
        }

        match load_settings(&watched) {
            Ok(settings) => {
                log::info!("[Config] Settings file changed, snapshot updated");
                handle.update(settings);
            }
            Err(e) => log::warn!("[Config] Reload failed, keeping previous snapshot: {}", e),
        }
    })
    .map_err(|e| ConfigError::Io {
        path: path.clone(),
        message: e.to_string(),
    })?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|e| ConfigError::Io {
            path,
            message: e.to_string(),
        })?;

    Ok(watcher)
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let s = AppSettings::default();
        assert!(s.detection_enabled);
        assert!(s.nsfw_threshold > 0.0 && s.nsfw_threshold < 1.0);
        assert!(s.min_blur_duration_ms >= 1_000);
        assert_eq!(s.region_density_threshold, 6);
    }

    #[test]
    fn test_interval_floor() {
        let s = AppSettings {
            capture_interval_ms: 100,
            ..Default::default()
        };
        assert_eq!(
            s.effective_capture_interval_ms(),
            constants::MIN_CAPTURE_INTERVAL_MS
        );
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let loaded = load_settings(&path).unwrap();
        assert!(loaded.detection_enabled);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = AppSettings {
            sensitivity: 0.85,
            blur_male_faces: true,
            ..Default::default()
        };
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.sensitivity, 0.85);
        assert!(loaded.blur_male_faces);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"sensitivity": 0.9}"#).unwrap();

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.sensitivity, 0.9);
        assert!(loaded.detect_nsfw);
    }

    #[test]
    fn test_snapshot_isolation() {
        let handle = SettingsHandle::default();
        let before = handle.snapshot();

        let mut updated = handle.snapshot();
        updated.sensitivity = 0.99;
        handle.update(updated);

        // The earlier snapshot is unaffected by the update.
        assert_eq!(before.sensitivity, AppSettings::default().sensitivity);
        assert_eq!(handle.snapshot().sensitivity, 0.99);
    }
}
