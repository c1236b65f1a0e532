//! Overlay Types
//!
//! Draw specifications handed to the platform window backend, plus the
//! backend boundary itself. No window-manager logic here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::classify::Rect;
use crate::logic::decision::{ContentCategory, Severity};

// ============================================================================
// USER-FACING STYLE KNOBS
// ============================================================================

/// Visual family of the region blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurStyle {
    /// Flat tint only
    Solid,
    /// Coarse pixelation blocks
    Pixelate,
    /// Pixelation plus scatter noise
    Noise,
}

/// Strength tier of the region blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurIntensity {
    Light,
    Medium,
    Strong,
    Maximum,
}

impl BlurIntensity {
    pub fn level(&self) -> u8 {
        match self {
            BlurIntensity::Light => 0,
            BlurIntensity::Medium => 1,
            BlurIntensity::Strong => 2,
            BlurIntensity::Maximum => 3,
        }
    }
}

// ============================================================================
// OVERLAY KINDS & WINDOW SPECS
// ============================================================================

/// The three independent overlay surfaces. Hiding one never implicitly
/// hides another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    Blur,
    FullScreenWarning,
    BlockedSite,
}

impl OverlayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayKind::Blur => "blur",
            OverlayKind::FullScreenWarning => "full_screen_warning",
            OverlayKind::BlockedSite => "blocked_site",
        }
    }
}

/// Live window handle issued by the backend.
pub type WindowId = Uuid;

/// One validated region with its final visual treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEffect {
    pub region: Rect,
    /// Fill color (ARGB)
    pub tint_argb: u32,
    /// Fill opacity (0.0 - 1.0)
    pub alpha: f32,
    /// Pixelation block edge in pixels, when pixelating
    pub pixel_block: Option<u32>,
    /// Scatter noise dot positions inside the region
    pub noise_dots: Vec<(i32, i32)>,
    pub border: bool,
}

/// Full-screen cover treatment. Density and color scale with how the
/// trigger happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullScreenSpec {
    pub category: ContentCategory,
    pub severity: Severity,
    /// True when region-count escalation raised this cover
    pub region_triggered: bool,
    pub base_alpha: f32,
    /// Spacing of the directional warning lines
    pub line_spacing: u32,
    /// Density of the decorative geometric pattern (0.0 - 1.0)
    pub pattern_density: f32,
    pub accent_argb: u32,
    pub reflection_seconds: u32,
}

/// Blocked-site interstitial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedSiteSpec {
    pub url: String,
    pub category: String,
    pub severity: Severity,
    pub guidance: String,
}

/// Everything a platform window can be asked to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WindowSpec {
    /// Non-focusable, non-touchable blur boxes
    RegionBlur { effects: Vec<RegionEffect> },
    /// Semi-modal full-screen cover
    FullScreen(FullScreenSpec),
    /// Semi-modal blocked-site dialog
    BlockedSite(BlockedSiteSpec),
}

// ============================================================================
// USER DIALOG ACTIONS
// ============================================================================

/// Everything a user can do on a warning or blocked-site dialog. Dispatch
/// is a single exhaustive match; adding a variant must fail compilation
/// everywhere it is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningAction {
    /// Dismiss and reveal the content
    Continue,
    /// Leave the screen
    GoBack,
    /// Close the foreground app
    CloseApp,
}

// ============================================================================
// BACKEND BOUNDARY
// ============================================================================

#[derive(Debug)]
pub enum OverlayError {
    AddFailed(String),
    UpdateFailed(String),
    RemoveFailed(String),
}

impl std::fmt::Display for OverlayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayError::AddFailed(msg) => write!(f, "overlay add failed: {}", msg),
            OverlayError::UpdateFailed(msg) => write!(f, "overlay update failed: {}", msg),
            OverlayError::RemoveFailed(msg) => write!(f, "overlay remove failed: {}", msg),
        }
    }
}

impl std::error::Error for OverlayError {}

/// Platform window manager boundary. Calls arrive only from the overlay
/// dispatcher task, so implementations may assume single-threaded access.
pub trait WindowBackend: Send + Sync {
    fn add(&self, kind: OverlayKind, spec: &WindowSpec) -> Result<WindowId, OverlayError>;

    fn update(&self, id: WindowId, spec: &WindowSpec) -> Result<(), OverlayError>;

    fn remove(&self, id: WindowId) -> Result<(), OverlayError>;
}
