//! Heuristic Fallback Classifier
//!
//! Cheap pixel-statistics stand-in used when no model adapter is loaded.
//! Splits the frame into a coarse grid, scores each cell by skin-tone pixel
//! ratio, and reports scored cells as regions. Not a real detector - it
//! exists so the pipeline degrades to something deterministic instead of
//! going blind.

use std::time::Instant;

use super::types::{ClassificationResult, NsfwRegion, Rect};
use super::Classifier;
use crate::logic::capture::Frame;
use crate::logic::config::AppSettings;

/// Grid resolution of the cell scorer.
const GRID: u32 = 4;

/// Pixel sampling stride inside a cell.
const SAMPLE_STRIDE: u32 = 8;

/// Cell skin-ratio at which a cell becomes a region.
const CELL_REGION_FLOOR: f32 = 0.45;

pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
        // Classic RGB skin gate: dominant red, moderate green, r-g spread.
        let (r, g, b) = (r as i32, g as i32, b as i32);
        r > 95 && g > 40 && b > 20 && r > g && r > b && (r - g) > 15
    }

    fn score_cell(frame: &Frame, cell_x: u32, cell_y: u32) -> f32 {
        let cell_w = frame.width / GRID;
        let cell_h = frame.height / GRID;
        if cell_w == 0 || cell_h == 0 {
            return 0.0;
        }

        let x0 = cell_x * cell_w;
        let y0 = cell_y * cell_h;
        let mut sampled = 0u32;
        let mut skin = 0u32;

        let mut y = y0;
        while y < y0 + cell_h {
            let mut x = x0;
            while x < x0 + cell_w {
                let idx = ((y * frame.width + x) * 4) as usize;
                if idx + 2 < frame.rgba.len() {
                    sampled += 1;
                    if Self::is_skin_tone(
                        frame.rgba[idx],
                        frame.rgba[idx + 1],
                        frame.rgba[idx + 2],
                    ) {
                        skin += 1;
                    }
                }
                x += SAMPLE_STRIDE;
            }
            y += SAMPLE_STRIDE;
        }

        if sampled == 0 {
            0.0
        } else {
            skin as f32 / sampled as f32
        }
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for HeuristicClassifier {
    fn analyze(&self, frame: &Frame, settings: &AppSettings) -> ClassificationResult {
        let start = Instant::now();

        if !settings.detect_nsfw {
            return ClassificationResult {
                success: true,
                ..Default::default()
            };
        }

        if frame.rgba.is_empty() || frame.width == 0 || frame.height == 0 {
            return ClassificationResult::failed("empty frame");
        }

        let cell_w = (frame.width / GRID) as i32;
        let cell_h = (frame.height / GRID) as i32;

        let mut regions = Vec::new();
        let mut total = 0.0f32;

        for cy in 0..GRID {
            for cx in 0..GRID {
                let score = Self::score_cell(frame, cx, cy);
                total += score;

                if score >= CELL_REGION_FLOOR {
                    regions.push(NsfwRegion {
                        bounds: Rect::new(
                            cx as i32 * cell_w,
                            cy as i32 * cell_h,
                            (cx as i32 + 1) * cell_w,
                            (cy as i32 + 1) * cell_h,
                        ),
                        confidence: score.min(1.0),
                    });
                }
            }
        }

        let mean = total / (GRID * GRID) as f32;
        // Flat skin-heavy frames score high; sparse cells pull the mean down.
        let nsfw_confidence = mean.min(1.0);

        ClassificationResult {
            faces: Vec::new(),
            nsfw_confidence,
            nsfw_regions: regions,
            success: true,
            error: None,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn engine(&self) -> &'static str {
        "heuristic"
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
