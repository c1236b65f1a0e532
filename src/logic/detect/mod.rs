//! Detect Module - Frame Cache, Stability, Adaptive Thresholds
//!
//! The smoothing layer between raw per-frame classification and the
//! decision engine:
//! - `cache` - perceptual frame signatures and short-lived decision reuse
//! - `stability` - blur hysteresis (instant on, delayed off)
//! - `threshold` - slow threshold adaptation from rolling history

pub mod cache;
pub mod stability;
pub mod threshold;

pub use cache::{frame_signature, CacheLookup, DetectionCache};
pub use stability::StabilityState;
pub use threshold::{AdaptiveThresholds, ThresholdStats};
