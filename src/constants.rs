//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To change a default budget or interval, only edit this file.

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Screen-Shield";

/// Default interval between screen captures (milliseconds)
pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 1_000;

/// Hard floor for the capture interval; user settings cannot go below this
pub const MIN_CAPTURE_INTERVAL_MS: u64 = 500;

/// Budget for a single native screenshot call
pub const CAPTURE_TIMEOUT_MS: u64 = 3_000;

/// Frame decision cache entry lifetime
pub const CACHE_TTL_MS: u64 = 5_000;

/// Recent-detection list entry lifetime (consecutive-count smoothing)
pub const RECENT_DETECTION_TTL_MS: u64 = 10_000;

/// Learning history window for threshold adaptation
pub const LEARNING_WINDOW_MS: u64 = 600_000;

/// Maximum number of entries kept in the learning window
pub const LEARNING_WINDOW_MAX_ENTRIES: usize = 20;

/// Minimum gap between threshold recalculations
pub const THRESHOLD_RECALC_INTERVAL_MS: u64 = 30_000;

/// Minimum samples required before a recalculation runs
pub const MIN_LEARNING_SAMPLES: usize = 5;

/// Smallest blur region edge that is still worth drawing (pixels)
pub const MIN_REGION_PX: i32 = 20;

/// Full-screen blur auto-close delay
pub const AUTO_CLOSE_DELAY_MS: u64 = 10_000;

/// Grace period after the auto-close navigate-away before force-hiding
pub const AUTO_CLOSE_GRACE_MS: u64 = 1_500;

/// Hard timeout for the blocked-site overlay when the user takes no action
pub const BLOCKED_SITE_TIMEOUT_MS: u64 = 30_000;

/// Minimum gap between global navigation actions
pub const ACTION_MIN_GAP_MS: u64 = 2_000;

/// At most one URL extraction per browser event window
pub const URL_EXTRACT_THROTTLE_MS: u64 = 1_000;

/// Depth bound for accessibility node walks
pub const NODE_WALK_MAX_DEPTH: usize = 8;

/// Default decision advisor endpoint
pub const DEFAULT_ADVISOR_URL: &str = "http://localhost:8686/v1/decide";

/// Default decision advisor timeout (milliseconds)
pub const DEFAULT_ADVISOR_TIMEOUT_MS: u64 = 2_500;

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get advisor endpoint from environment or use default
pub fn get_advisor_url() -> String {
    std::env::var("SHIELD_ADVISOR_URL").unwrap_or_else(|_| DEFAULT_ADVISOR_URL.to_string())
}

/// Get advisor timeout from environment or use default
pub fn get_advisor_timeout_ms() -> u64 {
    std::env::var("SHIELD_ADVISOR_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_ADVISOR_TIMEOUT_MS)
}

/// Check if the advisor is enabled via environment
pub fn is_advisor_enabled() -> bool {
    std::env::var("SHIELD_ADVISOR_ENABLED")
        .map(|s| s.to_lowercase() == "true" || s == "1")
        .unwrap_or(false)
}
