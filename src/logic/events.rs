#![allow(dead_code)]

//! Event Bus - Pipeline Event Emitter
//!
//! Lets any engine emit typed events to host-registered listeners.
//! Events with no registered listener drop silently - the pipeline never
//! depends on anyone watching.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

// ============================================================================
// EVENT TYPES
// ============================================================================

/// Everything the pipeline reports to its host.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A frame was classified as inappropriate
    ContentDetected {
        nsfw_confidence: f32,
        face_count: usize,
        region_count: usize,
        timestamp: DateTime<Utc>,
    },
    /// An overlay became visible
    OverlayShown { kind: String, timestamp: DateTime<Utc> },
    /// An overlay was hidden
    OverlayHidden { kind: String, timestamp: DateTime<Utc> },
    /// A global navigation action ran
    ActionExecuted {
        action: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    /// A visited URL matched the blocklist
    SiteBlocked { url: String, category: String, timestamp: DateTime<Utc> },
    /// The emergency reset path ran
    EmergencyReset { timestamp: DateTime<Utc> },
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::ContentDetected { .. } => "content:detected",
            PipelineEvent::OverlayShown { .. } => "overlay:shown",
            PipelineEvent::OverlayHidden { .. } => "overlay:hidden",
            PipelineEvent::ActionExecuted { .. } => "action:executed",
            PipelineEvent::SiteBlocked { .. } => "site:blocked",
            PipelineEvent::EmergencyReset { .. } => "system:emergency-reset",
        }
    }
}

// ============================================================================
// EVENT BUS
// ============================================================================

type Listener = Box<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Listener registry handed to every engine at construction.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all pipeline events.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Box::new(listener));
    }

    /// Emit an event to every listener. A listener panicking is the host's
    /// bug; emit itself never fails.
    pub fn emit(&self, event: PipelineEvent) {
        let listeners = self.listeners.read();
        if listeners.is_empty() {
            log::trace!("[Events] No listeners, '{}' dropped", event.name());
            return;
        }
        for listener in listeners.iter() {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_all_listeners() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            bus.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(PipelineEvent::EmergencyReset { timestamp: Utc::now() });
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_emit_without_listeners_is_silent() {
        let bus = EventBus::new();
        // Must not panic or error.
        bus.emit(PipelineEvent::OverlayHidden {
            kind: "blur".to_string(),
            timestamp: Utc::now(),
        });
        assert_eq!(bus.listener_count(), 0);
    }
}
