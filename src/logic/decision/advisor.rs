//! Decision Advisor - External Decision Service Client
//!
//! For region-dense frames the engine can defer the action choice to an
//! external service. The call is optional and strictly bounded: the caller
//! computes the rule-based action first and keeps it unless the advisor
//! answers in time with something parseable. The pipeline never waits on
//! this boundary without a timeout.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::RecommendedAction;

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AdvisorRequest {
    pub region_count: usize,
    pub max_confidence: f32,
    /// Foreground app context, e.g. package name
    pub app_context: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorResponse {
    pub action: RecommendedAction,
    pub reasoning: String,
    pub confidence: f32,
    pub response_time_ms: u64,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum AdvisorError {
    Http(String),
    Parse(String),
}

impl std::fmt::Display for AdvisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisorError::Http(msg) => write!(f, "advisor http error: {}", msg),
            AdvisorError::Parse(msg) => write!(f, "advisor parse error: {}", msg),
        }
    }
}

impl std::error::Error for AdvisorError {}

// ============================================================================
// BOUNDARY
// ============================================================================

pub type AdvisorFuture<'a> =
    Pin<Box<dyn Future<Output = Result<AdvisorResponse, AdvisorError>> + Send + 'a>>;

/// External decision service. Implementations may block indefinitely; the
/// caller applies its own timeout regardless of what happens in here.
pub trait DecisionAdvisor: Send + Sync {
    fn advise(&self, request: AdvisorRequest) -> AdvisorFuture<'_>;
}

/// HTTP advisor posting the request as JSON.
pub struct HttpAdvisor {
    client: reqwest::Client,
    url: String,
}

impl HttpAdvisor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl DecisionAdvisor for HttpAdvisor {
    fn advise(&self, request: AdvisorRequest) -> AdvisorFuture<'_> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&request)
                .send()
                .await
                .map_err(|e| AdvisorError::Http(e.to_string()))?;

            if !response.status().is_success() {
                return Err(AdvisorError::Http(format!(
                    "status {}",
                    response.status()
                )));
            }

            response
                .json::<AdvisorResponse>()
                .await
                .map_err(|e| AdvisorError::Parse(e.to_string()))
        })
    }
}

// ============================================================================
// CONSULT WITH FALLBACK
// ============================================================================

/// Ask the advisor with a hard timeout. On timeout, transport error, or
/// parse failure, the rule-based fallback wins - there is no path that
/// waits indefinitely or returns nothing.
pub async fn consult_with_fallback(
    advisor: &dyn DecisionAdvisor,
    request: AdvisorRequest,
    timeout: Duration,
    fallback: RecommendedAction,
) -> (RecommendedAction, Option<AdvisorResponse>) {
    match tokio::time::timeout(timeout, advisor.advise(request)).await {
        Ok(Ok(response)) => {
            log::info!(
                "[Advisor] Recommended {} ({:.2}) in {}ms",
                response.action.as_str(),
                response.confidence,
                response.response_time_ms
            );
            (response.action, Some(response))
        }
        Ok(Err(e)) => {
            log::warn!("[Advisor] Call failed, using rule action: {}", e);
            (fallback, None)
        }
        Err(_) => {
            log::warn!(
                "[Advisor] No answer within {}ms, using rule action",
                timeout.as_millis()
            );
            (fallback, None)
        }
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverResolves;

    impl DecisionAdvisor for NeverResolves {
        fn advise(&self, _request: AdvisorRequest) -> AdvisorFuture<'_> {
            Box::pin(std::future::pending())
        }
    }

    struct Scripted(RecommendedAction);

    impl DecisionAdvisor for Scripted {
        fn advise(&self, _request: AdvisorRequest) -> AdvisorFuture<'_> {
            let action = self.0;
            Box::pin(async move {
                Ok(AdvisorResponse {
                    action,
                    reasoning: "scripted".to_string(),
                    confidence: 0.9,
                    response_time_ms: 1,
                })
            })
        }
    }

    struct Failing;

    impl DecisionAdvisor for Failing {
        fn advise(&self, _request: AdvisorRequest) -> AdvisorFuture<'_> {
            Box::pin(async { Err(AdvisorError::Http("boom".to_string())) })
        }
    }

    fn request() -> AdvisorRequest {
        AdvisorRequest {
            region_count: 8,
            max_confidence: 0.8,
            app_context: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_rule_action() {
        let (action, response) = consult_with_fallback(
            &NeverResolves,
            request(),
            Duration::from_millis(50),
            RecommendedAction::NavigateBack,
        )
        .await;

        assert_eq!(action, RecommendedAction::NavigateBack);
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_error_falls_back_to_rule_action() {
        let (action, response) = consult_with_fallback(
            &Failing,
            request(),
            Duration::from_millis(50),
            RecommendedAction::ScrollAway,
        )
        .await;

        assert_eq!(action, RecommendedAction::ScrollAway);
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_timely_answer_wins() {
        let (action, response) = consult_with_fallback(
            &Scripted(RecommendedAction::AutoCloseApp),
            request(),
            Duration::from_millis(500),
            RecommendedAction::ScrollAway,
        )
        .await;

        assert_eq!(action, RecommendedAction::AutoCloseApp);
        assert!(response.is_some());
    }
}
