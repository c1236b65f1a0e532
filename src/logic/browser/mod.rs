//! Browser Module - URL Monitoring & Site Blocking
//!
//! Watches accessibility events from recognized browsers, pulls the
//! current URL out of the node tree (known address-bar ids first, regex
//! over visible text as fallback), and raises the blocked-site overlay
//! when the blocklist matches. Extraction is throttled and the walk is
//! depth-bounded, because browser trees get deep and events arrive in
//! bursts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::actions::ActionExecutor;
use crate::logic::config::SettingsHandle;
use crate::logic::decision::Severity;
use crate::logic::events::{EventBus, PipelineEvent};
use crate::logic::overlay::{BlockedSiteSpec, OverlayHandle, WarningAction};

// ============================================================================
// ACCESSIBILITY SNAPSHOT TYPES
// ============================================================================

/// Platform-neutral snapshot of one accessibility node.
#[derive(Debug, Clone, Default)]
pub struct UiNode {
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub content_description: Option<String>,
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn with_text(resource_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserEventKind {
    WindowStateChanged,
    ContentChanged,
}

/// One accessibility event as delivered by the platform layer.
#[derive(Debug, Clone)]
pub struct AccessibilityEvent {
    pub package: String,
    pub kind: BrowserEventKind,
    pub root: Option<UiNode>,
}

// ============================================================================
// BROWSER REGISTRY & URL EXTRACTION
// ============================================================================

/// Known browsers and their address-bar resource ids, checked before any
/// regex work.
static BROWSER_ADDRESS_BARS: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| {
        let mut map: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        map.insert(
            "com.android.chrome",
            &["com.android.chrome:id/url_bar"] as &[_],
        );
        map.insert(
            "org.mozilla.firefox",
            &["org.mozilla.firefox:id/mozac_browser_toolbar_url_view"] as &[_],
        );
        map.insert(
            "com.brave.browser",
            &["com.brave.browser:id/url_bar"] as &[_],
        );
        map.insert(
            "com.microsoft.emmx",
            &["com.microsoft.emmx:id/url_bar"] as &[_],
        );
        map.insert(
            "com.opera.browser",
            &["com.opera.browser:id/url_field"] as &[_],
        );
        map.insert(
            "com.sec.android.app.sbrowser",
            &["com.sec.android.app.sbrowser:id/location_bar_edit_text"] as &[_],
        );
        map
    });

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:https?://)?(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}(?:/[^\s]*)?")
        .expect("url regex")
});

pub fn is_recognized_browser(package: &str) -> bool {
    BROWSER_ADDRESS_BARS.contains_key(package)
}

/// Pull the current URL out of a node tree. Prefers the browser's known
/// address-bar ids; falls back to regex extraction from any text or
/// description field. The walk stops at the depth bound.
pub fn extract_url(root: &UiNode, package: &str) -> Option<String> {
    if let Some(ids) = BROWSER_ADDRESS_BARS.get(package) {
        if let Some(text) = find_by_resource_id(root, ids, 0) {
            if let Some(url) = URL_REGEX.find(text) {
                return Some(url.as_str().to_lowercase());
            }
        }
    }

    find_by_regex(root, 0)
}

fn find_by_resource_id<'a>(node: &'a UiNode, ids: &[&str], depth: usize) -> Option<&'a str> {
    if depth > constants::NODE_WALK_MAX_DEPTH {
        return None;
    }

    if let (Some(id), Some(text)) = (node.resource_id.as_deref(), node.text.as_deref()) {
        if ids.contains(&id) && !text.is_empty() {
            return Some(text);
        }
    }

    node.children
        .iter()
        .find_map(|child| find_by_resource_id(child, ids, depth + 1))
}

fn find_by_regex(node: &UiNode, depth: usize) -> Option<String> {
    if depth > constants::NODE_WALK_MAX_DEPTH {
        return None;
    }

    for field in [node.text.as_deref(), node.content_description.as_deref()] {
        if let Some(text) = field {
            if let Some(url) = URL_REGEX.find(text) {
                return Some(url.as_str().to_lowercase());
            }
        }
    }

    node.children
        .iter()
        .find_map(|child| find_by_regex(child, depth + 1))
}

/// Host portion of an extracted URL.
fn host_of(url: &str) -> &str {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    stripped
        .split(['/', ':', '?'])
        .next()
        .unwrap_or(stripped)
}

// ============================================================================
// BLOCKLIST BOUNDARY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockCheck {
    pub is_blocked: bool,
    pub category: String,
    pub severity: Severity,
}

impl BlockCheck {
    pub fn clean() -> Self {
        Self {
            is_blocked: false,
            category: String::new(),
            severity: Severity::Low,
        }
    }
}

pub trait SiteBlocklist: Send + Sync {
    fn check_url(&self, url: &str) -> BlockCheck;
}

/// Domain-suffix blocklist, good enough for hosts without a full list
/// provider.
pub struct DomainBlocklist {
    entries: Vec<(String, String, Severity)>,
}

impl DomainBlocklist {
    pub fn new(entries: Vec<(String, String, Severity)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(d, c, s)| (d.to_lowercase(), c, s))
                .collect(),
        }
    }
}

impl SiteBlocklist for DomainBlocklist {
    fn check_url(&self, url: &str) -> BlockCheck {
        let host = host_of(&url.to_lowercase()).to_string();

        for (domain, category, severity) in &self.entries {
            if host == *domain || host.ends_with(&format!(".{}", domain)) {
                return BlockCheck {
                    is_blocked: true,
                    category: category.clone(),
                    severity: *severity,
                };
            }
        }
        BlockCheck::clean()
    }
}

// ============================================================================
// MONITOR
// ============================================================================

/// Per-service browser monitor. Runs on accessibility events, in parallel
/// with the frame pipeline, feeding the same overlay and action machinery.
pub struct BrowserMonitor {
    blocklist: Arc<dyn SiteBlocklist>,
    overlay: OverlayHandle,
    executor: Arc<ActionExecutor>,
    settings: SettingsHandle,
    events: EventBus,

    last_extraction_at: Option<Instant>,
    last_url: Option<String>,
    showing_since: Option<Instant>,
}

impl BrowserMonitor {
    pub fn new(
        blocklist: Arc<dyn SiteBlocklist>,
        overlay: OverlayHandle,
        executor: Arc<ActionExecutor>,
        settings: SettingsHandle,
        events: EventBus,
    ) -> Self {
        Self {
            blocklist,
            overlay,
            executor,
            settings,
            events,
            last_extraction_at: None,
            last_url: None,
            showing_since: None,
        }
    }

    pub fn on_event(&mut self, event: &AccessibilityEvent) {
        self.on_event_at(event, Instant::now());
    }

    fn on_event_at(&mut self, event: &AccessibilityEvent, now: Instant) {
        if !self.settings.snapshot().site_blocking_enabled {
            return;
        }
        if !is_recognized_browser(&event.package) {
            return;
        }

        // At most one extraction per throttle window.
        if let Some(last) = self.last_extraction_at {
            if now.duration_since(last) < Duration::from_millis(constants::URL_EXTRACT_THROTTLE_MS)
            {
                return;
            }
        }
        self.last_extraction_at = Some(now);

        let root = match event.root.as_ref() {
            Some(root) => root,
            None => return,
        };
        let url = match extract_url(root, &event.package) {
            Some(url) => url,
            None => return,
        };

        if self.last_url.as_deref() == Some(url.as_str()) {
            return;
        }
        self.last_url = Some(url.clone());

        let check = self.blocklist.check_url(&url);
        if !check.is_blocked {
            return;
        }

        // Overlay already up for a recent match: no duplicates.
        if let Some(since) = self.showing_since {
            if now.duration_since(since)
                < Duration::from_millis(constants::BLOCKED_SITE_TIMEOUT_MS)
            {
                return;
            }
        }
        self.showing_since = Some(now);

        log::warn!(
            "[Browser] Blocked site in {}: {} ({})",
            event.package,
            url,
            check.category
        );
        self.events.emit(PipelineEvent::SiteBlocked {
            url: url.clone(),
            category: check.category.clone(),
            timestamp: chrono::Utc::now(),
        });

        let executor = self.executor.clone();
        let spec = BlockedSiteSpec {
            guidance: guidance_for(&check.category),
            url,
            category: check.category,
            severity: check.severity,
        };
        self.overlay.show_blocked_site(spec, move |action| match action {
            WarningAction::Continue => {}
            WarningAction::GoBack => {
                executor.close_tab();
            }
            WarningAction::CloseApp => {
                executor.close_app();
            }
        });
    }

    pub fn reset(&mut self) {
        self.last_extraction_at = None;
        self.last_url = None;
        self.showing_since = None;
    }

    pub fn is_showing(&self, now: Instant) -> bool {
        self.showing_since
            .map(|since| {
                now.duration_since(since)
                    < Duration::from_millis(constants::BLOCKED_SITE_TIMEOUT_MS)
            })
            .unwrap_or(false)
    }
}

fn guidance_for(category: &str) -> String {
    match category {
        "adult" => "This site is blocked. Take a moment before deciding where to go next.".to_string(),
        "gambling" => "This site is blocked. Consider stepping away for a while.".to_string(),
        _ => "This site is on your block list.".to_string(),
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::actions::ActionBackend;
    use crate::logic::overlay::{self, OverlayKind, WindowBackend, WindowSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopActions;

    impl ActionBackend for NoopActions {
        fn global_back(&self) -> bool {
            true
        }
        fn global_home(&self) -> bool {
            true
        }
        fn scroll_away(&self) -> bool {
            true
        }
        fn close_tab_button(&self) -> bool {
            true
        }
        fn kill_foreground_app(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct CountingWindows {
        adds: AtomicUsize,
    }

    impl WindowBackend for CountingWindows {
        fn add(
            &self,
            _kind: OverlayKind,
            _spec: &WindowSpec,
        ) -> Result<overlay::WindowId, overlay::OverlayError> {
            self.adds.fetch_add(1, Ordering::SeqCst);
            Ok(uuid::Uuid::new_v4())
        }

        fn update(
            &self,
            _id: overlay::WindowId,
            _spec: &WindowSpec,
        ) -> Result<(), overlay::OverlayError> {
            Ok(())
        }

        fn remove(&self, _id: overlay::WindowId) -> Result<(), overlay::OverlayError> {
            Ok(())
        }
    }

    fn chrome_tree(url: &str) -> UiNode {
        UiNode {
            resource_id: Some("root".to_string()),
            children: vec![UiNode {
                children: vec![UiNode::with_text("com.android.chrome:id/url_bar", url)],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn blocklist() -> Arc<DomainBlocklist> {
        Arc::new(DomainBlocklist::new(vec![(
            "blocked.example".to_string(),
            "adult".to_string(),
            Severity::High,
        )]))
    }

    fn monitor(windows: Arc<CountingWindows>) -> BrowserMonitor {
        let events = EventBus::new();
        let (overlay_handle, _task) = overlay::spawn(
            windows,
            (1080, 1920),
            Box::new(|| {}),
            Box::new(|| {}),
            events.clone(),
        );
        let executor = Arc::new(ActionExecutor::new(Arc::new(NoopActions), events.clone()));
        BrowserMonitor::new(
            blocklist(),
            overlay_handle,
            executor,
            SettingsHandle::default(),
            events,
        )
    }

    fn event(url: &str) -> AccessibilityEvent {
        AccessibilityEvent {
            package: "com.android.chrome".to_string(),
            kind: BrowserEventKind::ContentChanged,
            root: Some(chrome_tree(url)),
        }
    }

    #[test]
    fn test_extract_prefers_address_bar_id() {
        let mut tree = chrome_tree("https://real.example/path");
        // A decoy URL in page text must lose to the address bar.
        tree.children.insert(
            0,
            UiNode {
                text: Some("visit decoy.example now".to_string()),
                ..Default::default()
            },
        );

        let url = extract_url(&tree, "com.android.chrome").unwrap();
        assert!(url.contains("real.example"));
    }

    #[test]
    fn test_extract_falls_back_to_regex() {
        let tree = UiNode {
            children: vec![UiNode {
                content_description: Some("now showing en.wikipedia.org/wiki/Rust".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let url = extract_url(&tree, "org.unknown.browser").unwrap();
        assert!(url.starts_with("en.wikipedia.org"));
    }

    #[test]
    fn test_walk_is_depth_bounded() {
        let mut node = UiNode::with_text("com.android.chrome:id/url_bar", "deep.example");
        for _ in 0..(constants::NODE_WALK_MAX_DEPTH + 3) {
            node = UiNode {
                children: vec![node],
                ..Default::default()
            };
        }
        assert!(extract_url(&node, "com.android.chrome").is_none());
    }

    #[test]
    fn test_domain_blocklist_matches_subdomains() {
        let list = blocklist();
        assert!(list.check_url("https://blocked.example/page").is_blocked);
        assert!(list.check_url("http://www.blocked.example").is_blocked);
        assert!(!list.check_url("https://notblocked.example").is_blocked);
        assert!(!list.check_url("https://blocked.example.evil.com").is_blocked);
    }

    #[tokio::test]
    async fn test_blocked_url_raises_overlay_once() {
        let windows = Arc::new(CountingWindows::default());
        let mut m = monitor(windows.clone());
        let t0 = Instant::now();

        m.on_event_at(&event("https://blocked.example/x"), t0);
        // Second event past the throttle window, same URL: deduped.
        m.on_event_at(
            &event("https://blocked.example/x"),
            t0 + Duration::from_millis(constants::URL_EXTRACT_THROTTLE_MS + 50),
        );

        // Let the dispatcher drain.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(windows.adds.load(Ordering::SeqCst), 1);
        assert!(m.is_showing(t0 + Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_throttle_swallows_bursts() {
        let windows = Arc::new(CountingWindows::default());
        let mut m = monitor(windows.clone());
        let t0 = Instant::now();

        m.on_event_at(&event("https://clean.example"), t0);
        // Inside the throttle window: not even extracted.
        m.on_event_at(
            &event("https://blocked.example"),
            t0 + Duration::from_millis(200),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(windows.adds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_package_is_ignored() {
        let windows = Arc::new(CountingWindows::default());
        let mut m = monitor(windows.clone());

        let mut ev = event("https://blocked.example");
        ev.package = "com.example.game".to_string();
        m.on_event_at(&ev, Instant::now());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(windows.adds.load(Ordering::SeqCst), 0);
    }
}
