//! Actions Module - Throttled Global Navigation
//!
//! Performs one platform navigation action at a time. A minimum gap plus
//! an in-flight guard coalesce overlapping requests into at most one
//! running action, so rapid-fire decisions cannot destabilize the
//! foreground app. Each action walks an ordered strategy chain until one
//! strategy reports success; exhausting the chain is logged, never thrown.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::config::SafetyConfig;
use crate::logic::events::{EventBus, PipelineEvent};

/// History entries kept in memory.
const MAX_HISTORY: usize = 500;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Navigation-level action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavAction {
    Back,
    Home,
    ScrollAway,
    CloseApp,
    CloseTab,
}

impl NavAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavAction::Back => "back",
            NavAction::Home => "home",
            NavAction::ScrollAway => "scroll_away",
            NavAction::CloseApp => "close_app",
            NavAction::CloseTab => "close_tab",
        }
    }
}

/// Record of one executed (or fully failed) action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub action: NavAction,
    pub success: bool,
    /// Strategy that finally succeeded, if any
    pub strategy: Option<String>,
    /// Strategies tried, in order
    pub attempts: Vec<String>,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum ActionError {
    /// Inside the minimum gap since the previous action
    Throttled { remaining_ms: u64 },
    /// Another action is currently running
    InFlight,
    /// Actions disabled by the kill-switch
    Disabled,
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionError::Throttled { remaining_ms } => {
                write!(f, "action throttled, {}ms remaining", remaining_ms)
            }
            ActionError::InFlight => write!(f, "another action is in flight"),
            ActionError::Disabled => write!(f, "actions disabled by kill-switch"),
        }
    }
}

impl std::error::Error for ActionError {}

// ============================================================================
// BACKEND BOUNDARY
// ============================================================================

/// Platform gesture primitives. Each returns whether the platform reported
/// success.
pub trait ActionBackend: Send + Sync {
    fn global_back(&self) -> bool;

    fn global_home(&self) -> bool;

    fn scroll_away(&self) -> bool;

    /// Find and press the browser's close-tab button
    fn close_tab_button(&self) -> bool;

    fn kill_foreground_app(&self) -> bool;
}

// ============================================================================
// STRATEGY CHAINS
// ============================================================================

type Strategy = fn(&dyn ActionBackend) -> bool;

fn strat_back(b: &dyn ActionBackend) -> bool {
    b.global_back()
}
fn strat_home(b: &dyn ActionBackend) -> bool {
    b.global_home()
}
fn strat_scroll(b: &dyn ActionBackend) -> bool {
    b.scroll_away()
}
fn strat_close_tab(b: &dyn ActionBackend) -> bool {
    b.close_tab_button()
}
fn strat_kill_app(b: &dyn ActionBackend) -> bool {
    b.kill_foreground_app()
}

/// Primary strategy first, then the ordered fallbacks.
fn strategies_for(action: NavAction) -> &'static [(&'static str, Strategy)] {
    match action {
        NavAction::Back => &[("global_back", strat_back), ("global_home", strat_home)],
        NavAction::Home => &[("global_home", strat_home)],
        NavAction::ScrollAway => &[
            ("scroll_away", strat_scroll),
            ("global_back", strat_back),
            ("global_home", strat_home),
        ],
        NavAction::CloseApp => &[
            ("kill_foreground_app", strat_kill_app),
            ("global_home", strat_home),
        ],
        NavAction::CloseTab => &[
            ("close_tab_button", strat_close_tab),
            ("global_back", strat_back),
            ("global_home", strat_home),
        ],
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

pub struct ActionExecutor {
    backend: Arc<dyn ActionBackend>,
    last_action_at: Mutex<Option<Instant>>,
    in_flight: AtomicBool,
    history: RwLock<Vec<ActionRecord>>,
    total: AtomicU32,
    events: EventBus,
}

impl ActionExecutor {
    pub fn new(backend: Arc<dyn ActionBackend>, events: EventBus) -> Self {
        Self {
            backend,
            last_action_at: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            history: RwLock::new(Vec::new()),
            total: AtomicU32::new(0),
            events,
        }
    }

    /// Run one action through its strategy chain.
    pub fn execute(&self, action: NavAction) -> Result<ActionRecord, ActionError> {
        self.execute_at(action, Instant::now())
    }

    fn execute_at(&self, action: NavAction, now: Instant) -> Result<ActionRecord, ActionError> {
        if !SafetyConfig::is_actions_enabled() {
            return Err(ActionError::Disabled);
        }

        // Minimum gap between actions.
        {
            let mut last = self.last_action_at.lock();
            let gap = Duration::from_millis(constants::ACTION_MIN_GAP_MS);
            if let Some(prev) = *last {
                let elapsed = now.duration_since(prev);
                if elapsed < gap {
                    return Err(ActionError::Throttled {
                        remaining_ms: (gap - elapsed).as_millis() as u64,
                    });
                }
            }
            *last = Some(now);
        }

        // In-flight guard: overlapping requests coalesce.
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ActionError::InFlight);
        }

        let mut attempts = Vec::new();
        let mut winner = None;

        for (name, strategy) in strategies_for(action) {
            attempts.push(name.to_string());
            if strategy(self.backend.as_ref()) {
                winner = Some(name.to_string());
                break;
            }
            log::debug!("[Actions] Strategy '{}' failed for {}", name, action.as_str());
        }

        self.in_flight.store(false, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);

        let success = winner.is_some();
        if success {
            log::info!(
                "[Actions] {} succeeded via {}",
                action.as_str(),
                winner.as_deref().unwrap_or("?")
            );
        } else {
            log::warn!(
                "[Actions] {} exhausted all strategies ({})",
                action.as_str(),
                attempts.join(" -> ")
            );
        }

        let record = ActionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            success,
            strategy: winner,
            attempts,
            executed_at: Utc::now(),
        };

        self.record(record.clone());
        self.events.emit(PipelineEvent::ActionExecuted {
            action: action.as_str().to_string(),
            success,
            timestamp: record.executed_at,
        });

        Ok(record)
    }

    fn record(&self, record: ActionRecord) {
        let mut history = self.history.write();
        history.push(record);
        if history.len() > MAX_HISTORY {
            let overflow = history.len() - MAX_HISTORY / 2;
            history.drain(0..overflow);
        }
    }

    // ------------------------------------------------------------------
    // Convenience boundary: success/failure only
    // ------------------------------------------------------------------

    pub fn navigate_back(&self) -> bool {
        self.run_quiet(NavAction::Back)
    }

    pub fn navigate_home(&self) -> bool {
        self.run_quiet(NavAction::Home)
    }

    pub fn scroll_away(&self) -> bool {
        self.run_quiet(NavAction::ScrollAway)
    }

    pub fn close_app(&self) -> bool {
        self.run_quiet(NavAction::CloseApp)
    }

    pub fn close_tab(&self) -> bool {
        self.run_quiet(NavAction::CloseTab)
    }

    fn run_quiet(&self, action: NavAction) -> bool {
        match self.execute(action) {
            Ok(record) => record.success,
            Err(e) => {
                log::debug!("[Actions] {} not run: {}", action.as_str(), e);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn history(&self, limit: usize) -> Vec<ActionRecord> {
        let history = self.history.read();
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    pub fn total_actions(&self) -> u32 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        *self.last_action_at.lock() = None;
        self.in_flight.store(false, Ordering::SeqCst);
        self.history.write().clear();
        self.total.store(0, Ordering::SeqCst);
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
