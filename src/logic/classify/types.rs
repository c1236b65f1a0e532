//! Classification Types
//!
//! Data structures only - no inference logic here.

use serde::{Deserialize, Serialize};

// ============================================================================
// GEOMETRY
// ============================================================================

/// Rectangle in screen coordinates. May be unclamped/degenerate when it
/// comes straight from a detector; the overlay layer validates before
/// drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Clamp to [0, screen_w] x [0, screen_h].
    pub fn clamped(&self, screen_w: i32, screen_h: i32) -> Rect {
        Rect {
            left: self.left.clamp(0, screen_w),
            top: self.top.clamp(0, screen_h),
            right: self.right.clamp(0, screen_w),
            bottom: self.bottom.clamp(0, screen_h),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

// ============================================================================
// DETECTION RESULTS
// ============================================================================

/// Estimated gender of a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    Unknown,
}

/// One detected face with its gender estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetection {
    pub bounds: Rect,
    pub gender: Gender,
    /// Confidence of the gender estimate (0.0 - 1.0)
    pub confidence: f32,
}

/// One region the NSFW detector flagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NsfwRegion {
    pub bounds: Rect,
    pub confidence: f32,
}

/// Result of analyzing a single frame. Immutable for the duration of one
/// decision cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub faces: Vec<FaceDetection>,
    /// Whole-frame NSFW confidence (0.0 - 1.0)
    pub nsfw_confidence: f32,
    pub nsfw_regions: Vec<NsfwRegion>,
    pub success: bool,
    pub error: Option<String>,
    /// Wall time the classifier spent on this frame
    pub processing_time_ms: u64,
}

impl ClassificationResult {
    /// A failed analysis carrying only the error message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Highest region confidence, 0.0 when there are no regions.
    pub fn max_region_confidence(&self) -> f32 {
        self.nsfw_regions
            .iter()
            .map(|r| r.confidence)
            .fold(0.0, f32::max)
    }

    /// Count of regions at or above the given confidence.
    pub fn regions_above(&self, confidence: f32) -> usize {
        self.nsfw_regions
            .iter()
            .filter(|r| r.confidence >= confidence)
            .count()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_clamp_negative_coords() {
        let r = Rect::new(-50, -10, 100, 90).clamped(1080, 1920);
        assert_eq!(r, Rect::new(0, 0, 100, 90));
    }

    #[test]
    fn test_rect_clamp_oversized() {
        let r = Rect::new(500, 500, 5000, 9000).clamped(1080, 1920);
        assert_eq!(r, Rect::new(500, 500, 1080, 1920));
    }

    #[test]
    fn test_rect_fully_outside_becomes_empty() {
        let r = Rect::new(-300, -300, -100, -100).clamped(1080, 1920);
        assert!(r.is_empty());
    }

    #[test]
    fn test_max_region_confidence() {
        let result = ClassificationResult {
            nsfw_regions: vec![
                NsfwRegion { bounds: Rect::new(0, 0, 50, 50), confidence: 0.4 },
                NsfwRegion { bounds: Rect::new(60, 0, 120, 50), confidence: 0.9 },
            ],
            success: true,
            ..Default::default()
        };
        assert_eq!(result.max_region_confidence(), 0.9);
        assert_eq!(result.regions_above(0.5), 1);
    }
}
