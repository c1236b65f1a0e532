//! Pipeline Module - Supervisor
//!
//! Wires every engine together behind injected boundaries and owns the
//! task streams: the capture/processing loop, the overlay dispatcher, and
//! independent action-resolution tasks. All frame state (cache, gate,
//! thresholds) lives here behind one lock that only the processing stream
//! and the emergency path ever take.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::logic::actions::{ActionBackend, ActionExecutor};
use crate::logic::browser::{
    AccessibilityEvent, BrowserMonitor, DomainBlocklist, SiteBlocklist,
};
use crate::logic::capture::{Frame, ScreenSampler, ScreenSource};
use crate::logic::classify::{ClassificationResult, Classifier};
use crate::logic::config::{SafetyConfig, SettingsHandle};
use crate::logic::decision::advisor::{consult_with_fallback, AdvisorRequest};
use crate::logic::decision::{
    ContentCategory, Decision, DecisionAdvisor, DecisionEngine, EngineState, RecommendedAction,
    Severity, Verdict,
};
use crate::logic::detect::{frame_signature, DetectionCache, ThresholdStats};
use crate::logic::events::{EventBus, PipelineEvent};
use crate::logic::overlay::{self, OverlayHandle, WindowBackend};


// ============================================================================
// STATUS & INCIDENTS
// ============================================================================

/// Full status snapshot exposed to hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub engine_state: EngineState,
    pub classifier_engine: String,
    pub frames_processed: u64,
    pub frames_errored: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Inappropriate detections inside the recent smoothing window
    pub recent_detections: usize,
    pub thresholds: ThresholdStats,
    pub currently_blurred: bool,
    pub incident_count: usize,
    pub total_actions: u32,
}

/// Consecutive detections grouped by time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: uuid::Uuid,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub frames: u32,
    pub max_confidence: f32,
}

/// Gap under which detections merge into one incident.
const INCIDENT_WINDOW_SECS: i64 = 60;

/// Incidents kept in memory.
const MAX_INCIDENTS: usize = 100;

#[derive(Default)]
struct Stats {
    frames_processed: AtomicU64,
    frames_errored: AtomicU64,
}

// ============================================================================
// FRAME PROCESSOR
// ============================================================================

struct DetectorCore {
    cache: DetectionCache,
    engine: DecisionEngine,
}

/// Everything one frame goes through. Shared by the capture task and the
/// handle (status, emergency reset).
struct FrameProcessor {
    classifier: Arc<dyn Classifier>,
    advisor: Option<Arc<dyn DecisionAdvisor>>,
    overlay: OverlayHandle,
    executor: Arc<ActionExecutor>,
    settings: SettingsHandle,
    events: EventBus,
    core: Mutex<DetectorCore>,
    incidents: Mutex<Vec<Incident>>,
    stats: Stats,
}

impl FrameProcessor {
    async fn process(&self, frame: Frame) {
        let settings = self.settings.snapshot();
        if !settings.detection_enabled || !SafetyConfig::is_detection_enabled() {
            return;
        }

        let now = Instant::now();
        let signature = frame_signature(&frame);

        let probe = {
            let mut core = self.core.lock();
            core.cache.lookup(signature, now)
        };

        let decision = match (probe.cached, probe.decision) {
            (true, Some(cached)) => {
                let mut core = self.core.lock();
                core.engine.gate_cached(cached, &settings, now)
            }
            _ => {
                let result = self.classify(frame, &settings).await;
                if !result.success {
                    self.stats.frames_errored.fetch_add(1, Ordering::Relaxed);
                }

                let decision = {
                    let mut core = self.core.lock();
                    let decision = core.engine.evaluate(&result, &settings, now);
                    // Failed classifications are not cacheable verdicts.
                    if result.success {
                        core.cache
                            .insert(signature, decision.content_inappropriate, now);
                        core.cache
                            .record_detection(decision.content_inappropriate, now);
                    }
                    decision
                };

                if result.success && decision.content_inappropriate {
                    self.note_detection(&result);
                }
                decision
            }
        };

        self.stats.frames_processed.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "[Pipeline] Frame {:08x}: blur={} verdict={:?}",
            signature,
            decision.should_blur,
            decision.reasons
        );

        self.apply(decision, &settings);
    }

    /// Classifier call under the outer timeout budget. Timeouts and task
    /// failures come back as failed results, never as panics.
    async fn classify(
        &self,
        frame: Frame,
        settings: &crate::logic::config::AppSettings,
    ) -> ClassificationResult {
        let classifier = self.classifier.clone();
        let settings = settings.clone();
        let budget = Duration::from_millis(settings.max_processing_time_ms);

        let attempt =
            tokio::task::spawn_blocking(move || classifier.analyze(&frame, &settings));

        match tokio::time::timeout(budget, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                log::error!("[Pipeline] Classifier task died: {}", join_err);
                ClassificationResult::failed("classifier task died")
            }
            Err(_) => {
                log::warn!(
                    "[Pipeline] Classification exceeded {}ms budget",
                    budget.as_millis()
                );
                ClassificationResult::failed("classification timed out")
            }
        }
    }

    fn apply(&self, decision: Decision, settings: &crate::logic::config::AppSettings) {
        match decision.verdict {
            Verdict::Clean => self.overlay.hide_blur(),
            Verdict::Maintain => {}
            Verdict::SelectiveBlur { regions } => {
                self.overlay
                    .show_blur(regions, settings.blur_intensity, settings.blur_style)
            }
            Verdict::FullScreenWarning {
                category,
                severity,
                region_triggered,
            } => self.overlay.show_full_screen_warning(
                category,
                severity,
                region_triggered,
                settings.reflection_seconds,
            ),
            Verdict::Dispatch {
                action,
                severity,
                region_count,
                max_confidence,
                regions,
            } => {
                // Cover the screen first; the action resolves independently.
                self.overlay.show_full_screen_warning(
                    ContentCategory::Nsfw,
                    severity,
                    true,
                    settings.reflection_seconds,
                );
                self.resolve_dispatch(action, region_count, max_confidence, regions, settings);
            }
        }
    }

    /// Run the region-density response on its own task so the frame loop
    /// never waits on the advisor.
    fn resolve_dispatch(
        &self,
        rule_action: RecommendedAction,
        region_count: usize,
        max_confidence: f32,
        regions: Vec<crate::logic::classify::Rect>,
        settings: &crate::logic::config::AppSettings,
    ) {
        let advisor = if settings.advisor_enabled {
            self.advisor.clone()
        } else {
            None
        };
        let overlay = self.overlay.clone();
        let executor = self.executor.clone();
        let advisor_timeout = Duration::from_millis(settings.advisor_timeout_ms);
        let intensity = settings.blur_intensity;
        let style = settings.blur_style;

        tokio::spawn(async move {
            let action = match advisor {
                Some(advisor) => {
                    let request = AdvisorRequest {
                        region_count,
                        max_confidence,
                        app_context: "foreground".to_string(),
                    };
                    consult_with_fallback(advisor.as_ref(), request, advisor_timeout, rule_action)
                        .await
                        .0
                }
                None => rule_action,
            };

            match action {
                RecommendedAction::SelectiveBlur => {
                    // Advisor kept it local: drop the cover, blur regions.
                    overlay.hide_full_screen_warning();
                    overlay.show_blur(regions, intensity, style);
                }
                RecommendedAction::ScrollAway => {
                    executor.scroll_away();
                }
                RecommendedAction::NavigateBack => {
                    executor.navigate_back();
                }
                RecommendedAction::AutoCloseApp => {
                    executor.close_app();
                }
                RecommendedAction::GentleRedirect => {
                    executor.navigate_home();
                }
            }
        });
    }

    fn note_detection(&self, result: &ClassificationResult) {
        self.events.emit(PipelineEvent::ContentDetected {
            nsfw_confidence: result.nsfw_confidence,
            face_count: result.faces.len(),
            region_count: result.nsfw_regions.len(),
            timestamp: Utc::now(),
        });

        let confidence = result.nsfw_confidence.max(result.max_region_confidence());
        let now = Utc::now();
        let mut incidents = self.incidents.lock();

        if let Some(last) = incidents.last_mut() {
            if (now - last.last_seen).num_seconds().abs() < INCIDENT_WINDOW_SECS {
                last.last_seen = now;
                last.frames += 1;
                last.max_confidence = last.max_confidence.max(confidence);
                return;
            }
        }

        incidents.push(Incident {
            id: uuid::Uuid::new_v4(),
            first_seen: now,
            last_seen: now,
            frames: 1,
            max_confidence: confidence,
        });

        if incidents.len() > MAX_INCIDENTS {
            let overflow = incidents.len() - MAX_INCIDENTS;
            incidents.drain(0..overflow);
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct PipelineBuilder {
    source: Arc<dyn ScreenSource>,
    classifier: Arc<dyn Classifier>,
    windows: Arc<dyn WindowBackend>,
    actions: Arc<dyn ActionBackend>,
    blocklist: Arc<dyn SiteBlocklist>,
    advisor: Option<Arc<dyn DecisionAdvisor>>,
    settings: SettingsHandle,
    events: EventBus,
    screen: (i32, i32),
}

impl PipelineBuilder {
    pub fn new(
        source: Arc<dyn ScreenSource>,
        classifier: Arc<dyn Classifier>,
        windows: Arc<dyn WindowBackend>,
        actions: Arc<dyn ActionBackend>,
    ) -> Self {
        Self {
            source,
            classifier,
            windows,
            actions,
            blocklist: Arc::new(DomainBlocklist::new(Vec::new())),
            advisor: None,
            settings: SettingsHandle::default(),
            events: EventBus::new(),
            screen: (1080, 1920),
        }
    }

    pub fn with_blocklist(mut self, blocklist: Arc<dyn SiteBlocklist>) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn DecisionAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn with_settings(mut self, settings: SettingsHandle) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_screen_size(mut self, width: i32, height: i32) -> Self {
        self.screen = (width, height);
        self
    }

    /// Wire everything and start the task streams.
    pub fn start(self) -> PipelineHandle {
        log::info!(
            "[Pipeline] Starting ({}x{} screen, classifier '{}')",
            self.screen.0,
            self.screen.1,
            self.classifier.engine()
        );

        let executor = Arc::new(ActionExecutor::new(self.actions, self.events.clone()));

        let nav_executor = executor.clone();
        let close_executor = executor.clone();
        let (overlay_handle, overlay_task) = overlay::spawn(
            self.windows,
            self.screen,
            Box::new(move || {
                nav_executor.navigate_back();
            }),
            Box::new(move || {
                close_executor.close_app();
            }),
            self.events.clone(),
        );

        let processor = Arc::new(FrameProcessor {
            classifier: self.classifier,
            advisor: self.advisor,
            overlay: overlay_handle.clone(),
            executor: executor.clone(),
            settings: self.settings.clone(),
            events: self.events.clone(),
            core: Mutex::new(DetectorCore {
                cache: DetectionCache::new(),
                engine: DecisionEngine::new(&self.settings.snapshot(), self.settings.tuning()),
            }),
            incidents: Mutex::new(Vec::new()),
            stats: Stats::default(),
        });

        let monitor = BrowserMonitor::new(
            self.blocklist,
            overlay_handle.clone(),
            executor.clone(),
            self.settings.clone(),
            self.events.clone(),
        );

        let sampler = Arc::new(ScreenSampler::new(self.source));
        let capture_task = {
            let sampler = sampler.clone();
            let settings = self.settings.clone();
            let processor = processor.clone();
            tokio::spawn(async move {
                sampler
                    .run(settings, move |frame| {
                        let processor = processor.clone();
                        async move { processor.process(frame).await }
                    })
                    .await;
            })
        };

        PipelineHandle {
            processor,
            sampler,
            monitor: Mutex::new(monitor),
            overlay: overlay_handle,
            executor,
            events: self.events,
            tasks: Mutex::new(vec![overlay_task, capture_task]),
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Owner of the running pipeline. Dropping or stopping it tears every
/// task stream down.
pub struct PipelineHandle {
    processor: Arc<FrameProcessor>,
    sampler: Arc<ScreenSampler>,
    monitor: Mutex<BrowserMonitor>,
    overlay: OverlayHandle,
    executor: Arc<ActionExecutor>,
    events: EventBus,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PipelineHandle {
    /// Feed one accessibility event to the URL monitor.
    pub fn on_accessibility_event(&self, event: &AccessibilityEvent) {
        self.monitor.lock().on_event(event);
    }

    /// Overlay boundary for hosts that raise overlays directly.
    pub fn overlay(&self) -> &OverlayHandle {
        &self.overlay
    }

    /// Action boundary.
    pub fn actions(&self) -> &Arc<ActionExecutor> {
        &self.executor
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Force-clear every cache, state flag, and overlay. Safe to call at
    /// any time, including mid-cycle.
    pub fn emergency_reset(&self) {
        log::warn!("[Pipeline] Emergency reset");

        {
            let mut core = self.processor.core.lock();
            core.cache.clear();
            core.engine.reset();
        }
        self.monitor.lock().reset();
        self.executor.reset();
        self.overlay.emergency_hide_all();
    }

    /// Stop sampling and cancel all in-flight work. Overlays are torn down
    /// on the way out.
    pub fn stop(&self) {
        log::info!("[Pipeline] Stopping");
        self.sampler.stop();
        self.overlay.emergency_hide_all();

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    pub fn status(&self) -> EngineStatus {
        let core = self.processor.core.lock();
        EngineStatus {
            engine_state: core.engine.state(),
            classifier_engine: self.processor.classifier.engine().to_string(),
            frames_processed: self.processor.stats.frames_processed.load(Ordering::Relaxed),
            frames_errored: self.processor.stats.frames_errored.load(Ordering::Relaxed),
            cache_hits: core.cache.hits(),
            cache_misses: core.cache.misses(),
            recent_detections: core.cache.recent_inappropriate(Instant::now()),
            thresholds: core.engine.threshold_stats(),
            currently_blurred: core.engine.is_blurred(),
            incident_count: self.processor.incidents.lock().len(),
            total_actions: self.executor.total_actions(),
        }
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.processor.incidents.lock().clone()
    }

    /// Severity bucket helper for hosts rendering incident lists.
    pub fn incident_severity(incident: &Incident) -> Severity {
        Severity::from_confidence(incident.max_confidence)
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.sampler.stop();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
