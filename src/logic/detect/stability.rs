//! Stability Gate - Blur Hysteresis
//!
//! Asymmetric on/off smoothing over the per-frame signal: blur turns on the
//! instant content is inappropriate and refuses to turn off until the
//! minimum duration has passed. Noisy classification flickers toward
//! over-blurring, never toward revealing content.

use std::time::{Duration, Instant};

/// Mutable per-pipeline stability tracking. Single instance, owned by the
/// frame-processing stream.
#[derive(Debug)]
pub struct StabilityState {
    is_blurred: bool,
    blur_started_at: Option<Instant>,
    consecutive_inappropriate: u32,
    consecutive_clean: u32,
}

impl StabilityState {
    pub fn new() -> Self {
        Self {
            is_blurred: false,
            blur_started_at: None,
            consecutive_inappropriate: 0,
            consecutive_clean: 0,
        }
    }

    /// Apply the hysteresis gate to one frame's verdict.
    ///
    /// Inappropriate content blurs immediately. Clean content while blurred
    /// keeps the blur up until `min_blur_duration` has elapsed since the
    /// blur started; only then does the gate release.
    pub fn apply_gate(
        &mut self,
        content_inappropriate: bool,
        min_blur_duration: Duration,
        now: Instant,
    ) -> bool {
        if content_inappropriate {
            self.consecutive_inappropriate += 1;
            self.consecutive_clean = 0;

            if !self.is_blurred {
                self.is_blurred = true;
                self.blur_started_at = Some(now);
            }
            return true;
        }

        self.consecutive_clean += 1;
        self.consecutive_inappropriate = 0;

        if self.is_blurred {
            let held_long_enough = self
                .blur_started_at
                .map(|start| now.duration_since(start) >= min_blur_duration)
                .unwrap_or(true);

            if !held_long_enough {
                return true;
            }

            self.is_blurred = false;
            self.blur_started_at = None;
        }

        false
    }

    pub fn is_blurred(&self) -> bool {
        self.is_blurred
    }

    pub fn consecutive_inappropriate(&self) -> u32 {
        self.consecutive_inappropriate
    }

    pub fn consecutive_clean(&self) -> u32 {
        self.consecutive_clean
    }

    pub fn reset(&mut self) {
        self.is_blurred = false;
        self.blur_started_at = None;
        self.consecutive_inappropriate = 0;
        self.consecutive_clean = 0;
    }
}

impl Default for StabilityState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MIN_BLUR: Duration = Duration::from_millis(2_000);

    #[test]
    fn test_blur_on_is_immediate() {
        let mut state = StabilityState::new();
        let now = Instant::now();

        assert!(state.apply_gate(true, MIN_BLUR, now));
        assert!(state.is_blurred());
    }

    #[test]
    fn test_blur_off_is_delayed() {
        let mut state = StabilityState::new();
        let t0 = Instant::now();

        assert!(state.apply_gate(true, MIN_BLUR, t0));

        // Clean frames inside the minimum duration keep the blur up.
        assert!(state.apply_gate(false, MIN_BLUR, t0 + Duration::from_millis(500)));
        assert!(state.apply_gate(false, MIN_BLUR, t0 + Duration::from_millis(1_900)));
        assert!(state.is_blurred());

        // Past the minimum duration the gate releases.
        assert!(!state.apply_gate(false, MIN_BLUR, t0 + Duration::from_millis(2_100)));
        assert!(!state.is_blurred());
    }

    #[test]
    fn test_rapid_flicker_keeps_blur_continuous() {
        // Inappropriate/clean alternating every 200ms for 3 seconds with a
        // 2s minimum: the gate must report blur for every single frame.
        let mut state = StabilityState::new();
        let t0 = Instant::now();

        let mut inappropriate = true;
        let mut t = t0;
        let end = t0 + Duration::from_millis(3_000);

        while t <= end {
            assert!(
                state.apply_gate(inappropriate, MIN_BLUR, t),
                "gate dropped blur mid-flicker at {:?}",
                t.duration_since(t0)
            );
            inappropriate = !inappropriate;
            t += Duration::from_millis(200);
        }
    }

    #[test]
    fn test_blur_hides_promptly_after_window() {
        let mut state = StabilityState::new();
        let t0 = Instant::now();

        state.apply_gate(true, MIN_BLUR, t0);
        // Well past the window, a clean frame releases on the first try.
        assert!(!state.apply_gate(false, MIN_BLUR, t0 + Duration::from_millis(10_000)));
    }

    #[test]
    fn test_reblur_restarts_the_clock() {
        let mut state = StabilityState::new();
        let t0 = Instant::now();

        state.apply_gate(true, MIN_BLUR, t0);
        state.apply_gate(false, MIN_BLUR, t0 + Duration::from_millis(2_500)); // released
        state.apply_gate(true, MIN_BLUR, t0 + Duration::from_millis(3_000)); // new blur

        // 1s into the new blur, still held.
        assert!(state.apply_gate(false, MIN_BLUR, t0 + Duration::from_millis(4_000)));
    }

    #[test]
    fn test_consecutive_counters() {
        let mut state = StabilityState::new();
        let now = Instant::now();

        state.apply_gate(true, MIN_BLUR, now);
        state.apply_gate(true, MIN_BLUR, now);
        assert_eq!(state.consecutive_inappropriate(), 2);
        assert_eq!(state.consecutive_clean(), 0);

        state.apply_gate(false, MIN_BLUR, now);
        assert_eq!(state.consecutive_inappropriate(), 0);
        assert_eq!(state.consecutive_clean(), 1);
    }
}
