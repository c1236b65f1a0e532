//! Overlay Module - Always-On-Top Window Management
//!
//! Owns the visibility state of every overlay kind and talks to the
//! platform window backend. All mutation happens on one dispatcher task
//! fed by a command channel - the only place overlay state is touched, so
//! window-manager calls never race.
//!
//! Idempotency contract: showing an already-visible overlay updates it in
//! place, hiding an already-hidden one is a no-op, and the emergency path
//! unconditionally attempts every removal and resets every flag even when
//! individual removals fail. A stuck window can never permanently block
//! the screen: full-screen covers carry an auto-close timer and the
//! blocked-site dialog a hard timeout, both as cancellable task handles
//! tied to the overlay's lifetime.

pub mod effects;
pub mod types;

pub use types::{
    BlockedSiteSpec, BlurIntensity, BlurStyle, OverlayError, OverlayKind, RegionEffect,
    WarningAction, WindowBackend, WindowId, WindowSpec,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::constants;
use crate::logic::classify::Rect;
use crate::logic::config::SafetyConfig;
use crate::logic::decision::{ContentCategory, Severity};
use crate::logic::events::{EventBus, PipelineEvent};

type ActionCallback = Box<dyn Fn(WarningAction) + Send>;
type NavigateCallback = Box<dyn Fn() + Send>;

// ============================================================================
// COMMANDS
// ============================================================================

/// Everything the dispatcher task can be asked to do.
pub enum OverlayCommand {
    ShowBlur {
        regions: Vec<Rect>,
        intensity: BlurIntensity,
        style: BlurStyle,
    },
    HideBlur,
    ShowWarning {
        category: ContentCategory,
        severity: Severity,
        region_triggered: bool,
        reflection_seconds: u32,
    },
    WarningAction(WarningAction),
    HideWarning,
    ShowBlockedSite {
        spec: BlockedSiteSpec,
        on_action: ActionCallback,
    },
    BlockedSiteAction(WarningAction),
    HideBlockedSite,
    /// Internal: full-screen auto-close delay elapsed
    AutoCloseFired,
    /// Internal: grace period after auto-close elapsed
    ForceHideWarning,
    /// Internal: blocked-site hard timeout elapsed
    BlockedSiteTimeout,
    EmergencyHideAll,
}

// ============================================================================
// HANDLE
// ============================================================================

/// Cloneable sender for the dispatcher task. Every method is fire-and-
/// forget; a dead dispatcher only means the service is shutting down.
#[derive(Clone)]
pub struct OverlayHandle {
    tx: mpsc::UnboundedSender<OverlayCommand>,
}

impl OverlayHandle {
    fn send(&self, command: OverlayCommand) {
        if self.tx.send(command).is_err() {
            log::debug!("[Overlay] Dispatcher gone, command dropped");
        }
    }

    pub fn show_blur(&self, regions: Vec<Rect>, intensity: BlurIntensity, style: BlurStyle) {
        self.send(OverlayCommand::ShowBlur {
            regions,
            intensity,
            style,
        });
    }

    pub fn hide_blur(&self) {
        self.send(OverlayCommand::HideBlur);
    }

    pub fn show_full_screen_warning(
        &self,
        category: ContentCategory,
        severity: Severity,
        region_triggered: bool,
        reflection_seconds: u32,
    ) {
        self.send(OverlayCommand::ShowWarning {
            category,
            severity,
            region_triggered,
            reflection_seconds,
        });
    }

    pub fn warning_action(&self, action: WarningAction) {
        self.send(OverlayCommand::WarningAction(action));
    }

    pub fn hide_full_screen_warning(&self) {
        self.send(OverlayCommand::HideWarning);
    }

    pub fn show_blocked_site<F>(&self, spec: BlockedSiteSpec, on_action: F)
    where
        F: Fn(WarningAction) + Send + 'static,
    {
        self.send(OverlayCommand::ShowBlockedSite {
            spec,
            on_action: Box::new(on_action),
        });
    }

    pub fn blocked_site_action(&self, action: WarningAction) {
        self.send(OverlayCommand::BlockedSiteAction(action));
    }

    pub fn hide_blocked_site(&self) {
        self.send(OverlayCommand::HideBlockedSite);
    }

    pub fn emergency_hide_all(&self) {
        self.send(OverlayCommand::EmergencyHideAll);
    }
}

// ============================================================================
// MANAGER
// ============================================================================

#[derive(Default)]
struct KindState {
    visible: bool,
    window: Option<WindowId>,
}

pub struct OverlayManager {
    backend: Arc<dyn WindowBackend>,
    screen_w: i32,
    screen_h: i32,

    blur: KindState,
    warning: KindState,
    blocked: KindState,

    /// Warning dismissal stays disabled until this instant
    reflection_until: Option<Instant>,
    auto_close: Option<JoinHandle<()>>,
    blocked_timer: Option<JoinHandle<()>>,
    blocked_on_action: Option<ActionCallback>,

    on_navigate_away: NavigateCallback,
    on_close_app: NavigateCallback,

    tx: mpsc::UnboundedSender<OverlayCommand>,
    events: EventBus,
}

/// Build the manager and its dispatcher task. The returned handle is the
/// only way in.
pub fn spawn(
    backend: Arc<dyn WindowBackend>,
    screen: (i32, i32),
    on_navigate_away: NavigateCallback,
    on_close_app: NavigateCallback,
    events: EventBus,
) -> (OverlayHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let manager = OverlayManager::new(backend, screen, tx.clone(), on_navigate_away, on_close_app, events);
    let task = tokio::spawn(manager.run(rx));
    (OverlayHandle { tx }, task)
}

impl OverlayManager {
    fn new(
        backend: Arc<dyn WindowBackend>,
        screen: (i32, i32),
        tx: mpsc::UnboundedSender<OverlayCommand>,
        on_navigate_away: NavigateCallback,
        on_close_app: NavigateCallback,
        events: EventBus,
    ) -> Self {
        Self {
            backend,
            screen_w: screen.0,
            screen_h: screen.1,
            blur: KindState::default(),
            warning: KindState::default(),
            blocked: KindState::default(),
            reflection_until: None,
            auto_close: None,
            blocked_timer: None,
            blocked_on_action: None,
            on_navigate_away,
            on_close_app,
            tx,
            events,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<OverlayCommand>) {
        log::info!("[Overlay] Dispatcher started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        // Channel closed: make sure nothing stays on screen.
        self.emergency_hide_all();
        log::info!("[Overlay] Dispatcher finished");
    }

    fn handle(&mut self, command: OverlayCommand) {
        match command {
            OverlayCommand::ShowBlur {
                regions,
                intensity,
                style,
            } => self.show_blur(&regions, intensity, style),
            OverlayCommand::HideBlur => self.hide_blur(),
            OverlayCommand::ShowWarning {
                category,
                severity,
                region_triggered,
                reflection_seconds,
            } => self.show_warning(category, severity, region_triggered, reflection_seconds),
            OverlayCommand::WarningAction(action) => self.warning_action(action),
            OverlayCommand::HideWarning => self.hide_warning(),
            OverlayCommand::ShowBlockedSite { spec, on_action } => {
                self.show_blocked_site(spec, on_action)
            }
            OverlayCommand::BlockedSiteAction(action) => self.blocked_site_action(action),
            OverlayCommand::HideBlockedSite => self.hide_blocked_site(),
            OverlayCommand::AutoCloseFired => self.auto_close_fired(),
            OverlayCommand::ForceHideWarning => {
                if self.warning.visible {
                    log::warn!("[Overlay] Force-hiding full-screen warning after grace period");
                    self.hide_warning();
                }
            }
            OverlayCommand::BlockedSiteTimeout => {
                if self.blocked.visible {
                    log::info!("[Overlay] Blocked-site dialog timed out, force-hiding");
                    self.hide_blocked_site();
                }
            }
            OverlayCommand::EmergencyHideAll => self.emergency_hide_all(),
        }
    }

    // ------------------------------------------------------------------
    // Selective blur
    // ------------------------------------------------------------------

    fn show_blur(&mut self, regions: &[Rect], intensity: BlurIntensity, style: BlurStyle) {
        if !SafetyConfig::is_overlays_enabled() {
            log::warn!("[Overlay] Overlays disabled by kill-switch, blur skipped");
            return;
        }

        let validated = effects::validate_regions(regions, self.screen_w, self.screen_h);
        if validated.is_empty() {
            // Every region clamped away: nothing worth drawing.
            self.hide_blur();
            return;
        }

        let spec = WindowSpec::RegionBlur {
            effects: effects::build_region_effects(
                &validated,
                intensity,
                style,
                &mut rand::thread_rng(),
            ),
        };

        match upsert(self.backend.as_ref(), &mut self.blur, OverlayKind::Blur, &spec) {
            Ok(true) => self.emit_shown(OverlayKind::Blur),
            Ok(false) => {}
            Err(e) => {
                log::error!("[Overlay] Blur show failed: {}", e);
                self.emergency_hide_all();
            }
        }
    }

    fn hide_blur(&mut self) {
        match teardown(self.backend.as_ref(), &mut self.blur) {
            Ok(true) => self.emit_hidden(OverlayKind::Blur),
            Ok(false) => {}
            Err(e) => {
                log::error!("[Overlay] Blur hide failed: {}", e);
                self.emergency_hide_all();
            }
        }
    }

    // ------------------------------------------------------------------
    // Full-screen warning
    // ------------------------------------------------------------------

    fn show_warning(
        &mut self,
        category: ContentCategory,
        severity: Severity,
        region_triggered: bool,
        reflection_seconds: u32,
    ) {
        if !SafetyConfig::is_overlays_enabled() {
            log::warn!("[Overlay] Overlays disabled by kill-switch, warning skipped");
            return;
        }

        let spec = WindowSpec::FullScreen(effects::build_full_screen(
            category,
            severity,
            region_triggered,
            reflection_seconds,
        ));

        match upsert(
            self.backend.as_ref(),
            &mut self.warning,
            OverlayKind::FullScreenWarning,
            &spec,
        ) {
            Ok(newly_shown) => {
                if newly_shown {
                    self.reflection_until =
                        Some(Instant::now() + Duration::from_secs(reflection_seconds as u64));
                    self.arm_auto_close();
                    self.emit_shown(OverlayKind::FullScreenWarning);
                }
            }
            Err(e) => {
                log::error!("[Overlay] Warning show failed: {}", e);
                self.emergency_hide_all();
            }
        }
    }

    fn warning_action(&mut self, action: WarningAction) {
        if !self.warning.visible {
            return;
        }

        if let Some(until) = self.reflection_until {
            if Instant::now() < until {
                log::info!("[Overlay] Action ignored during reflection countdown");
                return;
            }
        }

        match action {
            WarningAction::Continue => {
                log::info!("[Overlay] User chose to continue");
                self.hide_warning();
            }
            WarningAction::GoBack => {
                log::info!("[Overlay] User chose to go back");
                (self.on_navigate_away)();
                self.hide_warning();
            }
            WarningAction::CloseApp => {
                log::info!("[Overlay] User chose to close the app");
                (self.on_close_app)();
                self.hide_warning();
            }
        }
    }

    fn hide_warning(&mut self) {
        self.cancel_auto_close();
        self.reflection_until = None;

        match teardown(self.backend.as_ref(), &mut self.warning) {
            Ok(true) => self.emit_hidden(OverlayKind::FullScreenWarning),
            Ok(false) => {}
            Err(e) => {
                log::error!("[Overlay] Warning hide failed: {}", e);
                self.emergency_hide_all();
            }
        }
    }

    /// Auto-close delay elapsed with the cover still up: try to leave the
    /// screen, then force-hide after a grace period if nothing changed.
    fn auto_close_fired(&mut self) {
        if !self.warning.visible {
            return;
        }

        log::warn!("[Overlay] Full-screen warning auto-close fired, navigating away");
        (self.on_navigate_away)();

        let tx = self.tx.clone();
        self.auto_close = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(constants::AUTO_CLOSE_GRACE_MS)).await;
            let _ = tx.send(OverlayCommand::ForceHideWarning);
        }));
    }

    fn arm_auto_close(&mut self) {
        self.cancel_auto_close();
        let tx = self.tx.clone();
        self.auto_close = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(constants::AUTO_CLOSE_DELAY_MS)).await;
            let _ = tx.send(OverlayCommand::AutoCloseFired);
        }));
    }

    fn cancel_auto_close(&mut self) {
        if let Some(handle) = self.auto_close.take() {
            handle.abort();
        }
    }

    // ------------------------------------------------------------------
    // Blocked site
    // ------------------------------------------------------------------

    fn show_blocked_site(&mut self, spec: BlockedSiteSpec, on_action: ActionCallback) {
        if !SafetyConfig::is_overlays_enabled() {
            log::warn!("[Overlay] Overlays disabled by kill-switch, blocked-site skipped");
            return;
        }

        let window_spec = WindowSpec::BlockedSite(spec);
        match upsert(
            self.backend.as_ref(),
            &mut self.blocked,
            OverlayKind::BlockedSite,
            &window_spec,
        ) {
            Ok(newly_shown) => {
                self.blocked_on_action = Some(on_action);
                if newly_shown {
                    self.arm_blocked_timer();
                    self.emit_shown(OverlayKind::BlockedSite);
                }
            }
            Err(e) => {
                log::error!("[Overlay] Blocked-site show failed: {}", e);
                self.emergency_hide_all();
            }
        }
    }

    fn blocked_site_action(&mut self, action: WarningAction) {
        if !self.blocked.visible {
            return;
        }
        if let Some(callback) = self.blocked_on_action.as_ref() {
            callback(action);
        }
        self.hide_blocked_site();
    }

    fn hide_blocked_site(&mut self) {
        if let Some(handle) = self.blocked_timer.take() {
            handle.abort();
        }
        self.blocked_on_action = None;

        match teardown(self.backend.as_ref(), &mut self.blocked) {
            Ok(true) => self.emit_hidden(OverlayKind::BlockedSite),
            Ok(false) => {}
            Err(e) => {
                log::error!("[Overlay] Blocked-site hide failed: {}", e);
                self.emergency_hide_all();
            }
        }
    }

    fn arm_blocked_timer(&mut self) {
        if let Some(handle) = self.blocked_timer.take() {
            handle.abort();
        }
        let tx = self.tx.clone();
        self.blocked_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(constants::BLOCKED_SITE_TIMEOUT_MS)).await;
            let _ = tx.send(OverlayCommand::BlockedSiteTimeout);
        }));
    }

    // ------------------------------------------------------------------
    // Emergency path
    // ------------------------------------------------------------------

    /// Unconditionally remove every overlay and reset every flag. Each
    /// removal failure is logged and ignored - the state always ends up
    /// fully hidden.
    fn emergency_hide_all(&mut self) {
        log::warn!("[Overlay] Emergency hide-all");

        self.cancel_auto_close();
        if let Some(handle) = self.blocked_timer.take() {
            handle.abort();
        }
        self.reflection_until = None;
        self.blocked_on_action = None;

        for (state, kind) in [
            (&mut self.blur, OverlayKind::Blur),
            (&mut self.warning, OverlayKind::FullScreenWarning),
            (&mut self.blocked, OverlayKind::BlockedSite),
        ] {
            if let Some(id) = state.window.take() {
                if let Err(e) = self.backend.remove(id) {
                    log::error!("[Overlay] Emergency removal of {} failed: {}", kind.as_str(), e);
                }
            }
            state.visible = false;
        }

        self.events.emit(PipelineEvent::EmergencyReset {
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_shown(&self, kind: OverlayKind) {
        self.events.emit(PipelineEvent::OverlayShown {
            kind: kind.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_hidden(&self, kind: OverlayKind) {
        self.events.emit(PipelineEvent::OverlayHidden {
            kind: kind.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}

// ============================================================================
// BACKEND HELPERS
// ============================================================================

/// Show or update one overlay kind. Returns true when the overlay went
/// from hidden to visible.
fn upsert(
    backend: &dyn WindowBackend,
    state: &mut KindState,
    kind: OverlayKind,
    spec: &WindowSpec,
) -> Result<bool, OverlayError> {
    if state.visible {
        if let Some(id) = state.window {
            backend.update(id, spec)?;
            return Ok(false);
        }
    }

    let id = backend.add(kind, spec)?;
    state.window = Some(id);
    state.visible = true;
    Ok(true)
}

/// Hide one overlay kind. Returns true when it was actually visible.
fn teardown(backend: &dyn WindowBackend, state: &mut KindState) -> Result<bool, OverlayError> {
    if !state.visible {
        return Ok(false);
    }

    state.visible = false;
    if let Some(id) = state.window.take() {
        backend.remove(id)?;
    }
    Ok(true)
}

// ============================================================================
// UNIT TESTS
// ============================================================================
