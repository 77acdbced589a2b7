//! In-memory backend that records every request, for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use super::{
    AnalysisResponse, AnalyticalStep, Backend, BackendError, BackendResult, DeepAnalysisResponse,
    Endpoint, FinalizeRequest, FinalizedProject, PromptRequest, PublishReceipt, PublishRequest,
    Recommendation, Record, ValidateRequest, ValidationResult,
};

pub(crate) struct FakeBackend {
    calls: Mutex<Vec<(Endpoint, Value)>>,
    failures: HashSet<Endpoint>,
    pub analysis: AnalysisResponse,
    pub deep: DeepAnalysisResponse,
    pub project: FinalizedProject,
    pub validation: ValidationResult,
    pub receipt: PublishReceipt,
}

pub(crate) fn row(player: &str, runs: i64) -> Record {
    let mut r = Record::new();
    r.insert("player".to_string(), json!(player));
    r.insert("runs".to_string(), json!(runs));
    r
}

pub(crate) fn sample_project() -> FinalizedProject {
    serde_json::from_value(json!({
        "slug": "nervous-nineties",
        "title": "Nervous Nineties",
        "author": "Analyst",
        "date": "2026-10-19",
        "executive_summary": "Attacking in the nineties is safer.",
        "article_markdown": "# Nervous Nineties\n\nBatters who sped up were dismissed 6.6% of the time.",
        "tweet": "Speed up in the 90s.",
        "key_stats": [{"title": "Innings Analyzed", "value": "2,034"}],
        "charts": [{"chart_type": "bar", "title": "Dismissal rate", "data_key": "step_1", "description": ""}],
        "data_tables": [{"name": "accelerators", "rows": [{"player": "MS Dhoni", "sr": 146.7}]}],
        "methodology": "Ball-by-ball ODI data, 1990-2024.",
        "limitations": "ODIs only.",
        "verification_notes": "",
        "reading_time": 6
    }))
    .unwrap_or_default()
}

pub(crate) fn validation(recommendation: Recommendation) -> ValidationResult {
    let ready = recommendation.is_ready();
    ValidationResult {
        overall_status: if ready { "VERIFIED" } else { "PARTIAL" }.to_string(),
        total_claims: 4,
        verified_claims: if ready { 4 } else { 2 },
        failed_claims: if ready { 0 } else { 2 },
        verification_score: if ready { 100.0 } else { 50.0 },
        recommendation,
        ..ValidationResult::default()
    }
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: HashSet::new(),
            analysis: AnalysisResponse {
                markdown: Some("### Analysis Results".to_string()),
                sql_used: Some("SELECT player, runs FROM batting".to_string()),
                data: vec![row("Tendulkar", 18426), row("Sangakkara", 14234)],
            },
            deep: DeepAnalysisResponse {
                executive_summary: Some("Two-step summary".to_string()),
                steps: vec![
                    AnalyticalStep {
                        sql_query: Some("SELECT 1".to_string()),
                        results: Some(vec![row("a", 1), row("b", 2)]),
                        ..AnalyticalStep::default()
                    },
                    AnalyticalStep {
                        sql_query: Some("SELECT 2".to_string()),
                        results: Some(vec![row("c", 3)]),
                        ..AnalyticalStep::default()
                    },
                ],
                ..DeepAnalysisResponse::default()
            },
            project: sample_project(),
            validation: validation(Recommendation::ReadyToPublish),
            receipt: PublishReceipt {
                success: true,
                slug: "nervous-nineties".to_string(),
                files_created: vec!["content.md".to_string(), "tweet.txt".to_string()],
                project_path: "outputs/nervous-nineties".to_string(),
                message: "Published".to_string(),
            },
        }
    }

    pub(crate) fn failing(mut self, endpoint: Endpoint) -> Self {
        self.failures.insert(endpoint);
        self
    }

    pub(crate) fn with_recommendation(mut self, recommendation: Recommendation) -> Self {
        self.validation = validation(recommendation);
        self
    }

    /// Endpoints called so far, in order.
    pub(crate) fn calls(&self) -> Vec<Endpoint> {
        self.calls.lock().map(|c| c.iter().map(|(e, _)| *e).collect()).unwrap_or_default()
    }

    /// Body of the most recent call to `endpoint`.
    pub(crate) fn last_body(&self, endpoint: Endpoint) -> Option<Value> {
        let calls = self.calls.lock().ok()?;
        calls.iter().rev().find(|(e, _)| *e == endpoint).map(|(_, body)| body.clone())
    }

    fn record<T: Serialize + ?Sized>(&self, endpoint: Endpoint, body: &T) -> BackendResult<()> {
        let value = serde_json::to_value(body).unwrap_or(Value::Null);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((endpoint, value));
        }
        if self.failures.contains(&endpoint) {
            return Err(BackendError::Status {
                status: 500,
                detail: Some(format!("{} failed", endpoint.path().trim_start_matches('/'))),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn analyze(&self, prompt: &str) -> BackendResult<AnalysisResponse> {
        self.record(Endpoint::Analyze, &PromptRequest { prompt })?;
        Ok(self.analysis.clone())
    }

    async fn analyze_deep(&self, prompt: &str) -> BackendResult<DeepAnalysisResponse> {
        self.record(Endpoint::AnalyzeDeep, &PromptRequest { prompt })?;
        Ok(self.deep.clone())
    }

    async fn finalize(&self, request: &FinalizeRequest) -> BackendResult<FinalizedProject> {
        self.record(Endpoint::Finalize, request)?;
        Ok(self.project.clone())
    }

    async fn validate(&self, request: &ValidateRequest<'_>) -> BackendResult<ValidationResult> {
        self.record(Endpoint::Validate, request)?;
        Ok(self.validation.clone())
    }

    async fn publish(&self, request: &PublishRequest<'_>) -> BackendResult<PublishReceipt> {
        self.record(Endpoint::Publish, request)?;
        Ok(self.receipt.clone())
    }
}
