//! Decision Types
//!
//! Core types for frame decisions. No logic - only data structures.

use serde::{Deserialize, Serialize};

use crate::logic::classify::Rect;

// ============================================================================
// STATE MACHINE
// ============================================================================

/// Decision engine state. Every cycle runs Idle → Evaluating → outcome; the
/// outcome state stays visible until the next cycle starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Evaluating,
    SelectiveBlur,
    FullScreenWarning,
    ActionDispatch,
    Clean,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Evaluating => "evaluating",
            EngineState::SelectiveBlur => "selective_blur",
            EngineState::FullScreenWarning => "full_screen_warning",
            EngineState::ActionDispatch => "action_dispatch",
            EngineState::Clean => "clean",
        }
    }
}

// ============================================================================
// SEVERITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Bucket a confidence score into a severity.
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence >= 0.9 {
            Severity::Critical
        } else if confidence >= 0.75 {
            Severity::High
        } else if confidence >= 0.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }

    pub fn level(&self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }
}

// ============================================================================
// RECOMMENDED ACTIONS
// ============================================================================

/// What to do about a region-dense frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Stay with per-region blur
    SelectiveBlur,
    /// Scroll the offending content out of view
    ScrollAway,
    /// Leave the current screen
    NavigateBack,
    /// Close the foreground app entirely
    AutoCloseApp,
    /// Send the user somewhere calmer
    GentleRedirect,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::SelectiveBlur => "selective_blur",
            RecommendedAction::ScrollAway => "scroll_away",
            RecommendedAction::NavigateBack => "navigate_back",
            RecommendedAction::AutoCloseApp => "auto_close_app",
            RecommendedAction::GentleRedirect => "gentle_redirect",
        }
    }
}

// ============================================================================
// CONTENT CATEGORY
// ============================================================================

/// What kind of content triggered a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Nsfw,
    Face,
    Mixed,
    BlockedSite,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Nsfw => "nsfw",
            ContentCategory::Face => "face",
            ContentCategory::Mixed => "mixed",
            ContentCategory::BlockedSite => "blocked_site",
        }
    }
}

// ============================================================================
// DECISION
// ============================================================================

/// The outcome side of one decision cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Nothing inappropriate; clear any blur
    Clean,
    /// Keep whatever overlay is currently up (hysteresis hold or failure)
    Maintain,
    /// Blur these validated regions
    SelectiveBlur { regions: Vec<Rect> },
    /// Cover the whole screen and make the user pause
    FullScreenWarning {
        category: ContentCategory,
        severity: Severity,
        region_triggered: bool,
    },
    /// Region density escalation: run a navigation-level response
    Dispatch {
        action: RecommendedAction,
        severity: Severity,
        region_count: usize,
        max_confidence: f32,
        /// Raw regions, kept so a selective-blur recommendation can still
        /// be honored
        regions: Vec<Rect>,
    },
}

/// One full decision, with the raw (pre-gate) verdict and the reasons that
/// produced it.
#[derive(Debug, Clone)]
pub struct Decision {
    pub verdict: Verdict,
    /// Content verdict before the stability gate; this is what the frame
    /// cache stores
    pub content_inappropriate: bool,
    /// Post-gate blur flag
    pub should_blur: bool,
    pub reasons: Vec<String>,
}

impl Decision {
    /// Engine state this verdict lands in; `None` for Maintain, which
    /// keeps the previous state.
    pub fn state(&self) -> Option<EngineState> {
        match self.verdict {
            Verdict::Clean => Some(EngineState::Clean),
            Verdict::Maintain => None,
            Verdict::SelectiveBlur { .. } => Some(EngineState::SelectiveBlur),
            Verdict::FullScreenWarning { .. } => Some(EngineState::FullScreenWarning),
            Verdict::Dispatch { .. } => Some(EngineState::ActionDispatch),
        }
    }
}
