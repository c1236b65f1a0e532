//! Decision Engine
//!
//! Turns one classification result plus the current settings snapshot into
//! a verdict: do nothing, blur regions, raise a full-screen warning, or
//! dispatch a navigation action. Owns the stability gate and the adaptive
//! thresholds; both are touched only from the frame-processing stream.

use std::time::{Duration, Instant};

use super::types::{ContentCategory, Decision, EngineState, RecommendedAction, Severity, Verdict};
use crate::logic::classify::{ClassificationResult, Gender, Rect};
use crate::logic::config::{AppSettings, TuningParams};
use crate::logic::detect::{AdaptiveThresholds, StabilityState, ThresholdStats};

pub struct DecisionEngine {
    state: EngineState,
    stability: StabilityState,
    thresholds: AdaptiveThresholds,
    tuning: TuningParams,
}

impl DecisionEngine {
    pub fn new(settings: &AppSettings, tuning: TuningParams) -> Self {
        Self {
            state: EngineState::Idle,
            stability: StabilityState::new(),
            thresholds: AdaptiveThresholds::new(
                settings.nsfw_threshold,
                settings.gender_threshold,
                tuning.clone(),
            ),
            tuning,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_blurred(&self) -> bool {
        self.stability.is_blurred()
    }

    pub fn threshold_stats(&self) -> ThresholdStats {
        self.thresholds.stats()
    }

    /// Clear all learned and gated state.
    pub fn reset(&mut self) {
        self.state = EngineState::Idle;
        self.stability.reset();
        self.thresholds.reset();
    }

    /// Full evaluation of a fresh classification result.
    pub fn evaluate(
        &mut self,
        result: &ClassificationResult,
        settings: &AppSettings,
        now: Instant,
    ) -> Decision {
        self.state = EngineState::Evaluating;
        self.thresholds
            .rebase(settings.nsfw_threshold, settings.gender_threshold);

        // A failed classification never un-blurs: hold whatever is up.
        if !result.success {
            let held = self.stability.is_blurred();
            return Decision {
                verdict: Verdict::Maintain,
                content_inappropriate: held,
                should_blur: held,
                reasons: vec![format!(
                    "classification failed: {}",
                    result.error.as_deref().unwrap_or("unknown")
                )],
            };
        }

        let mut reasons = Vec::new();

        // 1. Faces above the gender threshold, gated by per-gender settings.
        let gender_thr = self.thresholds.gender();
        let flagged_faces: Vec<Rect> = result
            .faces
            .iter()
            .filter(|f| {
                let enabled = match f.gender {
                    Gender::Female => settings.blur_female_faces,
                    Gender::Male => settings.blur_male_faces,
                    Gender::Unknown => false,
                };
                enabled && f.confidence > gender_thr
            })
            .map(|f| f.bounds)
            .collect();

        if !flagged_faces.is_empty() {
            reasons.push(format!(
                "{} face(s) above gender threshold {:.2}",
                flagged_faces.len(),
                gender_thr
            ));
        }

        // 2. Tiered NSFW confidence check. A single sensitivity slider arms
        //    progressively lower tiers.
        let nsfw_thr = self.thresholds.nsfw();
        let c = result.nsfw_confidence;
        let has_nsfw = settings.detect_nsfw
            && (c > nsfw_thr
                || (c > nsfw_thr * self.tuning.nsfw_medium_factor
                    && settings.sensitivity > self.tuning.medium_sensitivity_gate)
                || (c > self.tuning.nsfw_any_floor
                    && settings.sensitivity > self.tuning.any_sensitivity_gate));

        if has_nsfw {
            reasons.push(format!("nsfw confidence {:.2} (threshold {:.2})", c, nsfw_thr));
        }

        // 3. Region list as safety fallback, plus the flagged face bounds.
        let mut blur_regions: Vec<Rect> = result.nsfw_regions.iter().map(|r| r.bounds).collect();
        blur_regions.extend(flagged_faces.iter().copied());

        let content_inappropriate =
            !flagged_faces.is_empty() || has_nsfw || !result.nsfw_regions.is_empty();

        if content_inappropriate && reasons.is_empty() {
            reasons.push(format!(
                "{} flagged region(s) (safety fallback)",
                result.nsfw_regions.len()
            ));
        }

        // Feed the learning window before gating.
        self.thresholds.record_outcome(content_inappropriate, now);
        self.thresholds.maybe_recalculate(now);

        // 4. Stability gate.
        let should_blur = self.stability.apply_gate(
            content_inappropriate,
            Duration::from_millis(settings.min_blur_duration_ms),
            now,
        );

        // 5. Region-density escalation: many simultaneous high-confidence
        //    regions mean the whole screen is unsafe and N small blur boxes
        //    are both expensive and insufficient.
        let dense = result.regions_above(self.tuning.high_region_confidence);
        let verdict = if dense >= settings.region_density_threshold {
            let max_conf = result.max_region_confidence();
            let action =
                Self::rule_based_action(dense, max_conf, settings.region_density_threshold);
            reasons.push(format!(
                "region density {} >= {} -> {}",
                dense,
                settings.region_density_threshold,
                action.as_str()
            ));
            Verdict::Dispatch {
                action,
                severity: Severity::from_confidence(max_conf).max(Severity::Medium),
                region_count: dense,
                max_confidence: max_conf,
                regions: blur_regions.clone(),
            }
        } else if should_blur {
            if !content_inappropriate {
                reasons.push("hysteresis hold".to_string());
                Verdict::Maintain
            } else if blur_regions.is_empty() {
                // Whole-frame trigger with nothing localized to blur.
                let category = match (has_nsfw, !flagged_faces.is_empty()) {
                    (true, true) => ContentCategory::Mixed,
                    (false, true) => ContentCategory::Face,
                    _ => ContentCategory::Nsfw,
                };
                Verdict::FullScreenWarning {
                    category,
                    severity: Severity::from_confidence(c),
                    region_triggered: false,
                }
            } else {
                Verdict::SelectiveBlur {
                    regions: blur_regions,
                }
            }
        } else {
            Verdict::Clean
        };

        let decision = Decision {
            verdict,
            content_inappropriate,
            should_blur,
            reasons,
        };
        self.state = decision.state().unwrap_or(self.state);
        decision
    }

    /// Cheap path for a cache hit: the content verdict is known, only the
    /// gate runs. The classifier is not consulted.
    pub fn gate_cached(
        &mut self,
        cached_inappropriate: bool,
        settings: &AppSettings,
        now: Instant,
    ) -> Decision {
        self.state = EngineState::Evaluating;

        let should_blur = self.stability.apply_gate(
            cached_inappropriate,
            Duration::from_millis(settings.min_blur_duration_ms),
            now,
        );

        let verdict = if should_blur {
            Verdict::Maintain
        } else {
            Verdict::Clean
        };

        let decision = Decision {
            verdict,
            content_inappropriate: cached_inappropriate,
            should_blur,
            reasons: vec!["cached frame decision".to_string()],
        };
        self.state = decision.state().unwrap_or(self.state);
        decision
    }

    /// Rule bucketing for the region-density branch. Also the mandatory
    /// fallback when the external advisor times out or errors.
    pub fn rule_based_action(
        region_count: usize,
        max_confidence: f32,
        density_threshold: usize,
    ) -> RecommendedAction {
        let threshold = density_threshold.max(1);

        if max_confidence >= 0.95 || region_count >= threshold * 3 {
            RecommendedAction::AutoCloseApp
        } else if region_count >= threshold * 2 {
            RecommendedAction::NavigateBack
        } else if max_confidence >= 0.85 {
            RecommendedAction::ScrollAway
        } else if max_confidence >= 0.75 {
            RecommendedAction::GentleRedirect
        } else {
            RecommendedAction::SelectiveBlur
        }
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::classify::{FaceDetection, NsfwRegion};

    fn engine(settings: &AppSettings) -> DecisionEngine {
        DecisionEngine::new(settings, TuningParams::default())
    }

    fn nsfw_result(confidence: f32) -> ClassificationResult {
        ClassificationResult {
            nsfw_confidence: confidence,
            success: true,
            ..Default::default()
        }
    }

    fn region(conf: f32) -> NsfwRegion {
        NsfwRegion {
            bounds: Rect::new(0, 0, 100, 100),
            confidence: conf,
        }
    }

    #[test]
    fn test_high_confidence_always_triggers() {
        let settings = AppSettings {
            sensitivity: 0.0,
            ..Default::default()
        };
        let mut e = engine(&settings);

        let d = e.evaluate(&nsfw_result(0.8), &settings, Instant::now());
        assert!(d.content_inappropriate);
        assert!(d.should_blur);
    }

    #[test]
    fn test_medium_tier_needs_sensitivity() {
        // 0.4 sits between 0.7*threshold (0.35) and threshold (0.5).
        let low = AppSettings {
            sensitivity: 0.5,
            ..Default::default()
        };
        let mut e = engine(&low);
        let d = e.evaluate(&nsfw_result(0.4), &low, Instant::now());
        assert!(!d.content_inappropriate);

        let high = AppSettings {
            sensitivity: 0.7,
            ..Default::default()
        };
        let mut e = engine(&high);
        let d = e.evaluate(&nsfw_result(0.4), &high, Instant::now());
        assert!(d.content_inappropriate);
    }

    #[test]
    fn test_any_indicator_tier_needs_high_sensitivity() {
        let mid = AppSettings {
            sensitivity: 0.7,
            ..Default::default()
        };
        let mut e = engine(&mid);
        let d = e.evaluate(&nsfw_result(0.25), &mid, Instant::now());
        assert!(!d.content_inappropriate);

        let max = AppSettings {
            sensitivity: 0.9,
            ..Default::default()
        };
        let mut e = engine(&max);
        let d = e.evaluate(&nsfw_result(0.25), &max, Instant::now());
        assert!(d.content_inappropriate);
    }

    #[test]
    fn test_female_face_gated_by_setting() {
        let result = ClassificationResult {
            faces: vec![FaceDetection {
                bounds: Rect::new(10, 10, 200, 200),
                gender: Gender::Female,
                confidence: 0.95,
            }],
            success: true,
            ..Default::default()
        };

        let off = AppSettings {
            blur_female_faces: false,
            ..Default::default()
        };
        let mut e = engine(&off);
        let d = e.evaluate(&result, &off, Instant::now());
        assert!(!d.content_inappropriate);

        let on = AppSettings::default();
        let mut e = engine(&on);
        let d = e.evaluate(&result, &on, Instant::now());
        assert!(d.content_inappropriate);
        assert!(matches!(d.verdict, Verdict::SelectiveBlur { .. }));
    }

    #[test]
    fn test_region_fallback_triggers_blur() {
        let settings = AppSettings {
            sensitivity: 0.0,
            ..Default::default()
        };
        let result = ClassificationResult {
            nsfw_confidence: 0.1,
            nsfw_regions: vec![region(0.4)],
            success: true,
            ..Default::default()
        };

        let mut e = engine(&settings);
        let d = e.evaluate(&result, &settings, Instant::now());
        assert!(d.content_inappropriate);
        assert!(matches!(d.verdict, Verdict::SelectiveBlur { ref regions } if regions.len() == 1));
    }

    #[test]
    fn test_region_density_escalates_past_selective_blur() {
        let settings = AppSettings::default(); // density threshold 6
        let result = ClassificationResult {
            nsfw_confidence: 0.9,
            nsfw_regions: (0..7).map(|_| region(0.8)).collect(),
            success: true,
            ..Default::default()
        };

        let mut e = engine(&settings);
        let d = e.evaluate(&result, &settings, Instant::now());

        match d.verdict {
            Verdict::Dispatch { action, region_count, .. } => {
                assert_eq!(region_count, 7);
                assert_ne!(action, RecommendedAction::SelectiveBlur);
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
        assert_eq!(e.state(), EngineState::ActionDispatch);
    }

    #[test]
    fn test_low_confidence_regions_do_not_escalate() {
        let settings = AppSettings::default();
        let result = ClassificationResult {
            nsfw_confidence: 0.9,
            nsfw_regions: (0..7).map(|_| region(0.5)).collect(),
            success: true,
            ..Default::default()
        };

        let mut e = engine(&settings);
        let d = e.evaluate(&result, &settings, Instant::now());
        assert!(matches!(d.verdict, Verdict::SelectiveBlur { .. }));
    }

    #[test]
    fn test_whole_frame_trigger_without_regions_goes_full_screen() {
        let settings = AppSettings::default();
        let mut e = engine(&settings);

        let d = e.evaluate(&nsfw_result(0.9), &settings, Instant::now());
        assert!(matches!(
            d.verdict,
            Verdict::FullScreenWarning {
                category: ContentCategory::Nsfw,
                region_triggered: false,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_classification_maintains_blur() {
        let settings = AppSettings::default();
        let mut e = engine(&settings);

        // Get into a blurred state first.
        let d = e.evaluate(&nsfw_result(0.9), &settings, Instant::now());
        assert!(d.should_blur);

        let d = e.evaluate(
            &ClassificationResult::failed("model stalled"),
            &settings,
            Instant::now(),
        );
        assert_eq!(d.verdict, Verdict::Maintain);
        assert!(d.should_blur);
    }

    #[test]
    fn test_failed_classification_while_clean_stays_clean() {
        let settings = AppSettings::default();
        let mut e = engine(&settings);

        let d = e.evaluate(
            &ClassificationResult::failed("model stalled"),
            &settings,
            Instant::now(),
        );
        assert_eq!(d.verdict, Verdict::Maintain);
        assert!(!d.should_blur);
    }

    #[test]
    fn test_gate_cached_skips_everything_but_the_gate() {
        let settings = AppSettings::default();
        let mut e = engine(&settings);

        let d = e.gate_cached(true, &settings, Instant::now());
        assert!(d.should_blur);
        assert_eq!(d.verdict, Verdict::Maintain);

        // Still holding inside the minimum duration.
        let d = e.gate_cached(false, &settings, Instant::now());
        assert!(d.should_blur);
    }

    #[test]
    fn test_rule_buckets_cover_all_actions() {
        use RecommendedAction::*;
        assert_eq!(DecisionEngine::rule_based_action(20, 0.99, 6), AutoCloseApp);
        assert_eq!(DecisionEngine::rule_based_action(13, 0.8, 6), NavigateBack);
        assert_eq!(DecisionEngine::rule_based_action(7, 0.9, 6), ScrollAway);
        assert_eq!(DecisionEngine::rule_based_action(7, 0.8, 6), GentleRedirect);
        assert_eq!(DecisionEngine::rule_based_action(6, 0.72, 6), SelectiveBlur);
    }
}
