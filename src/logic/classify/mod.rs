//! Classifier Boundary
//!
//! The pipeline consumes face/gender and NSFW detection through this
//! trait; model wrappers live behind it. When no real adapter is injected
//! the heuristic fallback keeps the pipeline running end to end.

pub mod heuristic;
pub mod types;

pub use heuristic::HeuristicClassifier;
pub use types::{ClassificationResult, FaceDetection, Gender, NsfwRegion, Rect};

use crate::logic::capture::Frame;
use crate::logic::config::AppSettings;

/// Pluggable frame classifier.
///
/// Implementations must respect `settings.max_processing_time_ms` as their
/// own internal budget and return a degraded/failed result rather than
/// blocking past it; the pipeline additionally enforces an outer timeout.
pub trait Classifier: Send + Sync {
    fn analyze(&self, frame: &Frame, settings: &AppSettings) -> ClassificationResult;

    /// Short engine label for status reporting, e.g. "heuristic".
    fn engine(&self) -> &'static str;
}
