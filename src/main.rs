//! Screen-Shield Core - Main Entry Point
//!
//! Runs the full detection-to-action pipeline against the simulated
//! screen source and logging platform backends. Real deployments inject
//! their own `ScreenSource`, `Classifier`, `WindowBackend`, and
//! `ActionBackend` implementations through the same builder.

mod constants;
mod logic;

use std::sync::Arc;

use logic::browser::DomainBlocklist;
use logic::capture::SimulatedScreenSource;
use logic::classify::HeuristicClassifier;
use logic::config;
use logic::decision::{HttpAdvisor, Severity};
use logic::events::EventBus;
use logic::overlay::{OverlayError, OverlayKind, WindowBackend, WindowId, WindowSpec};
use logic::pipeline::PipelineBuilder;

/// Window backend that logs draw specs instead of talking to a window
/// manager.
struct LoggingWindows;

impl WindowBackend for LoggingWindows {
    fn add(&self, kind: OverlayKind, spec: &WindowSpec) -> Result<WindowId, OverlayError> {
        let id = uuid::Uuid::new_v4();
        match spec {
            WindowSpec::RegionBlur { effects } => {
                log::info!("[Windows] + {} ({} region(s))", kind.as_str(), effects.len())
            }
            WindowSpec::FullScreen(fs) => log::info!(
                "[Windows] + {} ({}, density {:.2})",
                kind.as_str(),
                fs.category.as_str(),
                fs.pattern_density
            ),
            WindowSpec::BlockedSite(bs) => {
                log::info!("[Windows] + {} ({})", kind.as_str(), bs.url)
            }
        }
        Ok(id)
    }

    fn update(&self, _id: WindowId, _spec: &WindowSpec) -> Result<(), OverlayError> {
        Ok(())
    }

    fn remove(&self, _id: WindowId) -> Result<(), OverlayError> {
        log::info!("[Windows] - window removed");
        Ok(())
    }
}

/// Action backend that logs gestures and reports success.
struct LoggingActions;

impl logic::actions::ActionBackend for LoggingActions {
    fn global_back(&self) -> bool {
        log::info!("[Gestures] global back");
        true
    }
    fn global_home(&self) -> bool {
        log::info!("[Gestures] global home");
        true
    }
    fn scroll_away(&self) -> bool {
        log::info!("[Gestures] scroll away");
        true
    }
    fn close_tab_button(&self) -> bool {
        log::info!("[Gestures] close tab");
        true
    }
    fn kill_foreground_app(&self) -> bool {
        log::info!("[Gestures] close app");
        true
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!(
        "Starting {} v{} (simulated capture)...",
        constants::APP_NAME,
        constants::APP_VERSION
    );

    // Settings: load once, then hot-reload on file changes.
    let settings = config::SettingsHandle::default();
    let _watcher = match config::default_settings_path() {
        Ok(path) => {
            match config::load_settings(&path) {
                Ok(loaded) => settings.update(loaded),
                Err(e) => log::warn!("Settings load failed, using defaults: {}", e),
            }
            match config::watch_settings(path, settings.clone()) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    log::warn!("Settings watch unavailable: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            log::warn!("No settings directory: {}", e);
            None
        }
    };

    let events = EventBus::new();
    events.subscribe(|event| {
        log::info!("[Event] {}", event.name());
    });

    let blocklist = Arc::new(DomainBlocklist::new(vec![
        (
            "blocked.example".to_string(),
            "adult".to_string(),
            Severity::High,
        ),
        (
            "casino.example".to_string(),
            "gambling".to_string(),
            Severity::Medium,
        ),
    ]));

    let mut builder = PipelineBuilder::new(
        Arc::new(SimulatedScreenSource::alternating(1080, 1920)),
        Arc::new(HeuristicClassifier::new()),
        Arc::new(LoggingWindows),
        Arc::new(LoggingActions),
    )
    .with_settings(settings.clone())
    .with_events(events)
    .with_blocklist(blocklist)
    .with_screen_size(1080, 1920);

    let snapshot = settings.snapshot();
    if snapshot.advisor_enabled {
        log::info!("Decision advisor enabled at {}", snapshot.advisor_url);
        builder = builder.with_advisor(Arc::new(HttpAdvisor::new(snapshot.advisor_url)));
    }

    let pipeline = builder.start();

    log::info!("Pipeline running; press ctrl-c to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Signal handler failed: {}", e);
    }

    let status = pipeline.status();
    log::info!(
        "Shutting down: {} frame(s) processed, {} cache hit(s), {} action(s)",
        status.frames_processed,
        status.cache_hits,
        status.total_actions
    );
    pipeline.stop();
}
