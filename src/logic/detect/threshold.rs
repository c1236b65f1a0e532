//! Adaptive Thresholds
//!
//! Slowly adapts the NSFW and gender confidence thresholds from a rolling
//! window of detection outcomes. A detection-heavy stretch tightens the
//! thresholds (more vigilant), a quiet stretch relaxes them back toward
//! base. Both values stay inside hard clamp bounds no matter what the
//! history looks like, so adaptation can neither disable detection nor
//! lock the screen into permanent blur.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::config::TuningParams;

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    was_inappropriate: bool,
}

/// Snapshot of the adaptation state for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdStats {
    pub nsfw_threshold: f32,
    pub gender_threshold: f32,
    pub sample_count: usize,
    pub last_ratio: Option<f32>,
}

pub struct AdaptiveThresholds {
    nsfw: f32,
    gender: f32,
    nsfw_base: f32,
    gender_base: f32,
    history: Vec<Sample>,
    last_recalc: Option<Instant>,
    last_ratio: Option<f32>,
    tuning: TuningParams,
}

impl AdaptiveThresholds {
    pub fn new(nsfw_base: f32, gender_base: f32, tuning: TuningParams) -> Self {
        let nsfw = nsfw_base.clamp(tuning.nsfw_threshold_min, tuning.nsfw_threshold_max);
        let gender = gender_base.clamp(tuning.gender_threshold_min, tuning.gender_threshold_max);
        Self {
            nsfw,
            gender,
            nsfw_base,
            gender_base,
            history: Vec::new(),
            last_recalc: None,
            last_ratio: None,
            tuning,
        }
    }

    pub fn nsfw(&self) -> f32 {
        self.nsfw
    }

    pub fn gender(&self) -> f32 {
        self.gender
    }

    /// Re-anchor on new user bases. Only acts when the bases actually
    /// changed, so calling this every cycle with the current snapshot is
    /// free.
    pub fn rebase(&mut self, nsfw_base: f32, gender_base: f32) {
        if nsfw_base != self.nsfw_base || gender_base != self.gender_base {
            log::info!(
                "[Threshold] Rebasing to nsfw={:.2} gender={:.2}",
                nsfw_base,
                gender_base
            );
            *self = Self::new(nsfw_base, gender_base, self.tuning.clone());
        }
    }

    /// Feed one detection outcome into the learning window and trim the
    /// window to its entry/age caps.
    pub fn record_outcome(&mut self, was_inappropriate: bool, now: Instant) {
        self.history.push(Sample {
            at: now,
            was_inappropriate,
        });

        let max_age = Duration::from_millis(constants::LEARNING_WINDOW_MS);
        self.history.retain(|s| now.duration_since(s.at) < max_age);

        while self.history.len() > constants::LEARNING_WINDOW_MAX_ENTRIES {
            self.history.remove(0);
        }
    }

    /// Recalculate thresholds from the window. No-op unless the minimum
    /// interval since the last run has passed and enough samples exist -
    /// sparse traffic leaves thresholds untouched.
    pub fn maybe_recalculate(&mut self, now: Instant) {
        if let Some(last) = self.last_recalc {
            let min_gap = Duration::from_millis(constants::THRESHOLD_RECALC_INTERVAL_MS);
            if now.duration_since(last) < min_gap {
                return;
            }
        }

        if self.history.len() < constants::MIN_LEARNING_SAMPLES {
            return;
        }

        let inappropriate = self
            .history
            .iter()
            .filter(|s| s.was_inappropriate)
            .count();
        let ratio = inappropriate as f32 / self.history.len() as f32;

        if ratio >= self.tuning.high_detection_ratio {
            // Hot environment: tighten.
            self.nsfw -= self.tuning.lower_step;
            self.gender -= self.tuning.lower_step;
        } else if ratio <= self.tuning.low_detection_ratio {
            // Quiet environment: relax back toward base.
            self.nsfw = (self.nsfw + self.tuning.raise_step).min(self.nsfw_base.max(self.nsfw));
            self.gender =
                (self.gender + self.tuning.raise_step).min(self.gender_base.max(self.gender));
        }

        self.nsfw = self
            .nsfw
            .clamp(self.tuning.nsfw_threshold_min, self.tuning.nsfw_threshold_max);
        self.gender = self
            .gender
            .clamp(self.tuning.gender_threshold_min, self.tuning.gender_threshold_max);

        self.last_recalc = Some(now);
        self.last_ratio = Some(ratio);

        log::debug!(
            "[Threshold] Recalculated: ratio={:.2} nsfw={:.2} gender={:.2}",
            ratio,
            self.nsfw,
            self.gender
        );
    }

    pub fn stats(&self) -> ThresholdStats {
        ThresholdStats {
            nsfw_threshold: self.nsfw,
            gender_threshold: self.gender,
            sample_count: self.history.len(),
            last_ratio: self.last_ratio,
        }
    }

    pub fn reset(&mut self) {
        let tuning = self.tuning.clone();
        *self = Self::new(self.nsfw_base, self.gender_base, tuning);
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> AdaptiveThresholds {
        AdaptiveThresholds::new(0.5, 0.6, TuningParams::default())
    }

    /// Drive many recalculation rounds with a uniform outcome and return
    /// the final state.
    fn drive(mut t: AdaptiveThresholds, was_inappropriate: bool, rounds: usize) -> AdaptiveThresholds {
        let t0 = Instant::now();
        let recalc_gap = Duration::from_millis(constants::THRESHOLD_RECALC_INTERVAL_MS + 500);

        for round in 0..rounds {
            let base = t0 + recalc_gap * round as u32;
            for i in 0..constants::MIN_LEARNING_SAMPLES {
                t.record_outcome(was_inappropriate, base + Duration::from_millis(i as u64));
            }
            t.maybe_recalculate(base + Duration::from_millis(100));
        }
        t
    }

    #[test]
    fn test_all_inappropriate_streak_stays_clamped() {
        let t = drive(thresholds(), true, 50);
        let tuning = TuningParams::default();

        assert!(t.nsfw() >= tuning.nsfw_threshold_min);
        assert!(t.gender() >= tuning.gender_threshold_min);
        // Streak long enough to hit the floor exactly.
        assert_eq!(t.nsfw(), tuning.nsfw_threshold_min);
    }

    #[test]
    fn test_all_clean_streak_stays_clamped() {
        let t = drive(thresholds(), false, 50);
        let tuning = TuningParams::default();

        assert!(t.nsfw() <= tuning.nsfw_threshold_max);
        assert!(t.gender() <= tuning.gender_threshold_max);
        // Relaxation never overshoots the user base.
        assert!(t.nsfw() <= 0.5 + 1e-6);
    }

    #[test]
    fn test_no_recalc_under_min_samples() {
        let mut t = thresholds();
        let now = Instant::now();

        for i in 0..(constants::MIN_LEARNING_SAMPLES - 1) {
            t.record_outcome(true, now + Duration::from_millis(i as u64));
        }
        t.maybe_recalculate(now + Duration::from_millis(100));

        assert_eq!(t.nsfw(), 0.5);
        assert_eq!(t.gender(), 0.6);
    }

    #[test]
    fn test_no_recalc_before_interval() {
        let mut t = thresholds();
        let now = Instant::now();

        for i in 0..10 {
            t.record_outcome(true, now + Duration::from_millis(i));
        }
        t.maybe_recalculate(now + Duration::from_millis(100));
        let after_first = t.nsfw();

        // A second run right away must be a no-op.
        for i in 0..10 {
            t.record_outcome(true, now + Duration::from_millis(200 + i));
        }
        t.maybe_recalculate(now + Duration::from_millis(300));
        assert_eq!(t.nsfw(), after_first);
    }

    #[test]
    fn test_window_entry_cap() {
        let mut t = thresholds();
        let now = Instant::now();

        for i in 0..100 {
            t.record_outcome(i % 2 == 0, now + Duration::from_millis(i));
        }
        assert!(t.stats().sample_count <= constants::LEARNING_WINDOW_MAX_ENTRIES);
    }

    #[test]
    fn test_rebase_resets_adaptation() {
        let mut t = drive(thresholds(), true, 10);
        assert!(t.nsfw() < 0.5);

        t.rebase(0.5, 0.6); // unchanged bases: keep adapted values
        assert!(t.nsfw() < 0.5);

        t.rebase(0.6, 0.6); // new base: re-anchor
        assert_eq!(t.nsfw(), 0.6);
        assert_eq!(t.stats().sample_count, 0);
    }

    #[test]
    fn test_mixed_ratio_leaves_thresholds_alone() {
        // A mid-band ratio (between the low and high cutoffs) must not move
        // thresholds at all.
        let mut t = thresholds();
        let t0 = Instant::now();

        for i in 0..10 {
            t.record_outcome(i % 2 == 0, t0 + Duration::from_millis(i));
        }
        t.maybe_recalculate(t0 + Duration::from_millis(100));

        assert_eq!(t.nsfw(), 0.5);
        assert_eq!(t.gender(), 0.6);
    }
}
