//! Analytics backend integration.
//!
//! The backend owns all analytical work: SQL generation, querying, claim
//! verification and article synthesis. This module only describes its
//! contract and ships an HTTP implementation.

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod types;

pub use client::HttpBackend;
pub use types::{
    AnalysisResponse, AnalyticalStep, ChartSpec, ClaimVerdict, ConversationTurn,
    DeepAnalysisResponse, FinalizeRequest, FinalizedProject, HealthStatus, PromptRequest,
    PublishReceipt, PublishRequest, RateLimitStatus, Recommendation, Record, ValidateRequest,
    ValidationResult,
};

use async_trait::async_trait;

/// Default backend address when nothing is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Backend operations, one per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Analyze,
    AnalyzeDeep,
    Finalize,
    Validate,
    Publish,
}

impl Endpoint {
    /// Request path relative to the backend base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Analyze => "/analyze",
            Self::AnalyzeDeep => "/analyze-deep",
            Self::Finalize => "/finalize",
            Self::Validate => "/validate",
            Self::Publish => "/publish",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors from a backend call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never produced an HTTP response.
    #[error("Network error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("{}", status_message(.status, .detail))]
    Status { status: u16, detail: Option<String> },

    /// The response body was not the expected JSON shape.
    #[error("Invalid response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
fn status_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(detail) if !detail.is_empty() => detail.clone(),
        _ => format!("Backend request failed (status {status})"),
    }
}

impl BackendError {
    /// HTTP status, if the backend responded at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The five calls the client makes against the analytics backend.
///
/// Calls run to completion or failure; there is no streaming and no
/// cancellation.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Translate a question into SQL, run it and summarize.
    async fn analyze(&self, prompt: &str) -> BackendResult<AnalysisResponse>;

    /// Multi-step analysis returning several sequential query results.
    async fn analyze_deep(&self, prompt: &str) -> BackendResult<DeepAnalysisResponse>;

    /// Synthesize a conversation into a publishable project draft.
    async fn finalize(&self, request: &FinalizeRequest) -> BackendResult<FinalizedProject>;

    /// Re-check the factual claims of a drafted project.
    async fn validate(&self, request: &ValidateRequest<'_>) -> BackendResult<ValidationResult>;

    /// Persist a validated project as the final artifact.
    async fn publish(&self, request: &PublishRequest<'_>) -> BackendResult<PublishReceipt>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Box<B> {
    async fn analyze(&self, prompt: &str) -> BackendResult<AnalysisResponse> {
        (**self).analyze(prompt).await
    }

    async fn analyze_deep(&self, prompt: &str) -> BackendResult<DeepAnalysisResponse> {
        (**self).analyze_deep(prompt).await
    }

    async fn finalize(&self, request: &FinalizeRequest) -> BackendResult<FinalizedProject> {
        (**self).finalize(request).await
    }

    async fn validate(&self, request: &ValidateRequest<'_>) -> BackendResult<ValidationResult> {
        (**self).validate(request).await
    }

    async fn publish(&self, request: &PublishRequest<'_>) -> BackendResult<PublishReceipt> {
        (**self).publish(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Endpoint::Analyze.path(), "/analyze");
        assert_eq!(Endpoint::AnalyzeDeep.path(), "/analyze-deep");
        assert_eq!(Endpoint::Publish.to_string(), "/publish");
    }

    #[test]
    fn test_status_error_prefers_detail() {
        let err = BackendError::Status { status: 500, detail: Some("Binder Error".to_string()) };
        assert_eq!(err.to_string(), "Binder Error");
        assert_eq!(err.status(), Some(500));

        let err = BackendError::Status { status: 502, detail: None };
        assert_eq!(err.to_string(), "Backend request failed (status 502)");
    }
}
