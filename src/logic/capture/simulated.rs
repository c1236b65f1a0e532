//! Simulated Screen Source
//!
//! Scripted frame generator so the full pipeline runs on hosts without
//! native screenshot access. Scenes cycle in order, one per capture.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{CaptureError, Frame, ScreenSource};

/// What a simulated frame looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimScene {
    /// Cool, flat background - classifies clean
    Neutral,
    /// Skin-tone dominant fill - classifies inappropriate
    SkinHeavy,
    /// A capture failure, as if the platform call errored
    Failure,
}

pub struct SimulatedScreenSource {
    width: u32,
    height: u32,
    scenes: Vec<SimScene>,
    cursor: AtomicUsize,
    released: AtomicBool,
}

impl SimulatedScreenSource {
    pub fn new(width: u32, height: u32, scenes: Vec<SimScene>) -> Self {
        Self {
            width,
            height,
            scenes,
            cursor: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        }
    }

    /// Endless neutral screen.
    pub fn neutral(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![SimScene::Neutral])
    }

    /// Alternating clean / inappropriate frames, for demos and tests.
    pub fn alternating(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![SimScene::Neutral, SimScene::SkinHeavy])
    }

    fn fill(&self, rgb: [u8; 3]) -> Frame {
        let pixels = (self.width * self.height) as usize;
        let mut rgba = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Frame::new(rgba, self.width, self.height)
    }
}

impl ScreenSource for SimulatedScreenSource {
    fn capture(&self) -> Result<Frame, CaptureError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(CaptureError::SourceUnavailable("released".to_string()));
        }
        if self.scenes.is_empty() {
            return Err(CaptureError::Failed("empty scene script".to_string()));
        }

        let idx = self.cursor.fetch_add(1, Ordering::SeqCst) % self.scenes.len();
        match self.scenes[idx] {
            SimScene::Neutral => Ok(self.fill([40, 70, 120])),
            SimScene::SkinHeavy => Ok(self.fill([220, 170, 140])),
            SimScene::Failure => Err(CaptureError::Failed("scripted failure".to_string())),
        }
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
