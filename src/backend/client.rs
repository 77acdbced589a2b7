//! HTTP implementation of the backend contract.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{
    AnalysisResponse, Backend, BackendError, BackendResult, DeepAnalysisResponse, Endpoint,
    FinalizeRequest, FinalizedProject, HealthStatus, PromptRequest, PublishReceipt,
    PublishRequest, RateLimitStatus, ValidateRequest, ValidationResult, DEFAULT_BACKEND_URL,
};

/// Backend reached over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for the given base URL. Requests never time out.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: normalize_base_url(base_url.into()) }
    }

    /// Create a client whose requests fail after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BackendError::Transport { endpoint: "client".to_string(), source })?;
        Ok(Self { client, base_url: normalize_base_url(base_url.into()) })
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and decode a JSON response.
    async fn post_json<Req, Resp>(&self, endpoint: Endpoint, body: &Req) -> BackendResult<Resp>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        tracing::debug!(endpoint = %endpoint, "backend request");

        let response = self
            .client
            .post(self.url(endpoint.path()))
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::Transport { endpoint: endpoint.to_string(), source })?;

        self.decode(endpoint.path(), response).await
    }

    /// GET a JSON document.
    async fn get_json<Resp: DeserializeOwned>(&self, path: &str) -> BackendResult<Resp> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|source| BackendError::Transport { endpoint: path.to_string(), source })?;

        self.decode(path, response).await
    }

    async fn decode<Resp: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> BackendResult<Resp> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| BackendError::Transport { endpoint: path.to_string(), source })?;

        if !status.is_success() {
            tracing::warn!(endpoint = path, status = status.as_u16(), "backend returned error");
            return Err(BackendError::Status { status: status.as_u16(), detail: error_detail(&body) });
        }

        serde_json::from_str(&body)
            .map_err(|source| BackendError::Decode { endpoint: path.to_string(), source })
    }

    /// Liveness check (`GET /`).
    pub async fn health(&self) -> BackendResult<HealthStatus> {
        self.get_json("/").await
    }

    /// Remaining daily quota of the backend's language model (`GET /rate-limit`).
    pub async fn rate_limit(&self) -> BackendResult<RateLimitStatus> {
        self.get_json("/rate-limit").await
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn analyze(&self, prompt: &str) -> BackendResult<AnalysisResponse> {
        self.post_json(Endpoint::Analyze, &PromptRequest { prompt }).await
    }

    async fn analyze_deep(&self, prompt: &str) -> BackendResult<DeepAnalysisResponse> {
        self.post_json(Endpoint::AnalyzeDeep, &PromptRequest { prompt }).await
    }

    async fn finalize(&self, request: &FinalizeRequest) -> BackendResult<FinalizedProject> {
        self.post_json(Endpoint::Finalize, request).await
    }

    async fn validate(&self, request: &ValidateRequest<'_>) -> BackendResult<ValidationResult> {
        self.post_json(Endpoint::Validate, request).await
    }

    async fn publish(&self, request: &PublishRequest<'_>) -> BackendResult<PublishReceipt> {
        self.post_json(Endpoint::Publish, request).await
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Extract the `detail` message from an error body, if there is one.
///
/// FastAPI-style backends send either a string or a list of validation
/// errors; the latter is rendered as compact JSON.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:8000/");
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.url("/analyze"), "http://localhost:8000/analyze");
    }

    #[test]
    fn test_error_detail_string() {
        assert_eq!(error_detail(r#"{"detail": "Daily limit reached"}"#).as_deref(), Some("Daily limit reached"));
    }

    #[test]
    fn test_error_detail_structured() {
        let detail = error_detail(r#"{"detail": [{"loc": ["body", "prompt"]}]}"#).unwrap();
        assert!(detail.contains("prompt"));
    }

    #[test]
    fn test_error_detail_missing() {
        assert!(error_detail("Internal Server Error").is_none());
        assert!(error_detail(r#"{"error": "x"}"#).is_none());
    }
}
