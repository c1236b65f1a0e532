//! Decision Module - Verdicts and Action Recommendation
//!
//! - `types` - decision data structures, no logic
//! - `engine` - the per-frame decision state machine
//! - `advisor` - optional external decision service with rule fallback

pub mod advisor;
pub mod engine;
pub mod types;

pub use advisor::{AdvisorRequest, AdvisorResponse, DecisionAdvisor, HttpAdvisor};
pub use engine::DecisionEngine;
pub use types::{ContentCategory, Decision, EngineState, RecommendedAction, Severity, Verdict};
