//! Capture Module - Screen Sampling
//!
//! - `sampler` - the repeating capture loop with timeout and backoff
//! - `simulated` - scripted frame source for hosts without native capture

pub mod sampler;
pub mod simulated;

pub use sampler::ScreenSampler;
pub use simulated::{SimScene, SimulatedScreenSource};

use std::time::Instant;

// ============================================================================
// FRAME
// ============================================================================

/// One captured screen bitmap. Ephemeral: owned by the sampler until the
/// classifier consumes it, never persisted.
#[derive(Debug, Clone)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture instant, used by all gate math
    pub captured_at: Instant,
    /// Wall clock milliseconds, used only for the signature time bucket
    pub wall_ms: u64,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        let wall_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            rgba,
            width,
            height,
            captured_at: Instant::now(),
            wall_ms,
        }
    }
}

// ============================================================================
// SCREEN SOURCE BOUNDARY
// ============================================================================

/// Native screenshot machinery sits behind this trait.
///
/// `capture` may block for the duration of one screenshot call; the sampler
/// wraps it in its own timeout. `release` tears down platform handles and
/// must tolerate being called more than once.
pub trait ScreenSource: Send + Sync {
    fn capture(&self) -> Result<Frame, CaptureError>;

    fn release(&self);
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum CaptureError {
    /// The source was released or never became available
    SourceUnavailable(String),
    /// The platform screenshot call reported a failure
    Failed(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::SourceUnavailable(msg) => write!(f, "capture source unavailable: {}", msg),
            CaptureError::Failed(msg) => write!(f, "capture failed: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}
