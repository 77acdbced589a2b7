//! Request and response payloads exchanged with the analytics backend.
//!
//! Response types keep any fields the backend adds beyond the ones modelled
//! here, so a project or validation report can be forwarded to the next
//! stage without losing data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row: a JSON object with backend-defined column names.
pub type Record = Map<String, Value>;

/// Body for `/analyze` and `/analyze-deep`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptRequest<'a> {
    /// The user's question, trimmed
    pub prompt: &'a str,
}

/// Response from `/analyze`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResponse {
    /// Narrative summary in markdown
    pub markdown: Option<String>,
    /// SQL the backend generated and ran
    pub sql_used: Option<String>,
    /// Result rows
    pub data: Vec<Record>,
}

/// A single step of a deep analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticalStep {
    pub step_number: u32,
    pub title: String,
    pub research_question: String,
    pub sql_query: Option<String>,
    pub results: Option<Vec<Record>>,
    pub insight: Option<String>,
    pub error: Option<String>,
}

/// Chart recommendation attached to deep analyses and finalized projects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSpec {
    /// bar, line, pie, scatter, area, radar, horizontal-bar, composed
    pub chart_type: String,
    pub title: String,
    /// Which data set the chart draws from
    pub data_key: String,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
    pub description: String,
}

/// Response from `/analyze-deep`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepAnalysisResponse {
    pub title: String,
    pub executive_summary: Option<String>,
    pub steps: Vec<AnalyticalStep>,
    pub article: String,
    pub tweet: String,
    pub charts: Vec<ChartSpec>,
    pub methodology: String,
    pub limitations: String,
    pub total_records_analyzed: u64,
}

/// Conversation turn as sent to `/finalize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
    pub sql_query: Option<String>,
    pub data: Option<Vec<Record>>,
}

/// Body for `/finalize`.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeRequest {
    pub project_title: String,
    pub conversation: Vec<ConversationTurn>,
    pub author: String,
}

/// A publishable project draft synthesized from a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizedProject {
    pub slug: String,
    pub title: String,
    pub author: String,
    pub date: String,
    pub executive_summary: String,
    pub article_markdown: String,
    pub tweet: String,
    pub key_stats: Vec<Value>,
    pub charts: Vec<Value>,
    pub data_tables: Vec<Value>,
    pub methodology: String,
    pub limitations: String,
    pub verification_notes: String,
    /// Fields not modelled above, forwarded untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FinalizedProject {
    /// Chart specifications that parse as [`ChartSpec`]; others are skipped.
    pub fn chart_specs(&self) -> Vec<ChartSpec> {
        self.charts.iter().filter_map(|c| serde_json::from_value(c.clone()).ok()).collect()
    }
}

/// Body for `/validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateRequest<'a> {
    pub article_markdown: &'a str,
    pub data_tables: &'a [Value],
    pub key_stats: &'a [Value],
}

impl<'a> From<&'a FinalizedProject> for ValidateRequest<'a> {
    fn from(project: &'a FinalizedProject) -> Self {
        Self {
            article_markdown: &project.article_markdown,
            data_tables: &project.data_tables,
            key_stats: &project.key_stats,
        }
    }
}

/// The validator's verdict on whether a project may be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Recommendation {
    ReadyToPublish,
    NeedsRevision,
    MajorIssues,
    Other(String),
}

impl Recommendation {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::ReadyToPublish)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ReadyToPublish => "READY_TO_PUBLISH",
            Self::NeedsRevision => "NEEDS_REVISION",
            Self::MajorIssues => "MAJOR_ISSUES",
            Self::Other(s) => s,
        }
    }
}

impl Default for Recommendation {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for Recommendation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "READY_TO_PUBLISH" => Self::ReadyToPublish,
            "NEEDS_REVISION" => Self::NeedsRevision,
            "MAJOR_ISSUES" => Self::MajorIssues,
            _ => Self::Other(value),
        }
    }
}

impl From<Recommendation> for String {
    fn from(value: Recommendation) -> Self {
        match value {
            Recommendation::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification of a single factual claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimVerdict {
    pub claim_id: u32,
    pub claim_text: String,
    /// statistical, factual, player_stat, match_detail
    pub claim_type: String,
    /// database_query, web_search, both
    pub verification_method: String,
    pub sql_query: Option<String>,
    pub sql_result: Option<Value>,
    pub web_search_query: Option<String>,
    pub web_search_result: Option<String>,
    pub expected_value: Option<String>,
    pub actual_value: Option<String>,
    pub is_verified: bool,
    pub discrepancy_percent: Option<f64>,
    pub notes: String,
}

/// Response from `/validate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationResult {
    /// VERIFIED, PARTIAL or FAILED
    pub overall_status: String,
    pub total_claims: u32,
    pub verified_claims: u32,
    pub failed_claims: u32,
    /// Percentage of verified claims, 0 to 100
    pub verification_score: f64,
    pub claims: Vec<ClaimVerdict>,
    pub database_queries_run: u32,
    pub web_searches_performed: u32,
    pub summary: String,
    pub recommendation: Recommendation,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ValidationResult {
    pub fn is_ready(&self) -> bool {
        self.recommendation.is_ready()
    }

    /// "12/14 claims verified (85.7%)"
    pub fn score_line(&self) -> String {
        format!(
            "{}/{} claims verified ({:.1}%)",
            self.verified_claims, self.total_claims, self.verification_score
        )
    }
}

/// Body for `/publish`.
#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest<'a> {
    pub project: &'a FinalizedProject,
    pub validation: &'a ValidationResult,
}

/// Response from `/publish`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishReceipt {
    pub success: bool,
    pub slug: String,
    pub files_created: Vec<String>,
    pub project_path: String,
    pub message: String,
}

/// Response from `GET /`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
}

/// Response from `GET /rate-limit`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitStatus {
    pub date: String,
    pub used: u32,
    pub remaining: i64,
    pub daily_limit: u32,
    pub status: String,
    pub model: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recommendation_parsing() {
        let ready: Recommendation = serde_json::from_value(json!("READY_TO_PUBLISH")).unwrap();
        assert!(ready.is_ready());

        let custom: Recommendation = serde_json::from_value(json!("HOLD")).unwrap();
        assert_eq!(custom, Recommendation::Other("HOLD".to_string()));
        assert!(!custom.is_ready());
        assert_eq!(serde_json::to_value(&custom).unwrap(), json!("HOLD"));
    }

    #[test]
    fn test_project_keeps_unknown_fields() {
        let raw = json!({
            "slug": "nervous-nineties",
            "title": "Nervous Nineties",
            "article_markdown": "# Title",
            "key_stats": [{"label": "Innings", "value": "2,034"}],
            "reading_time": 7
        });
        let project: FinalizedProject = serde_json::from_value(raw).unwrap();
        assert_eq!(project.extra.get("reading_time"), Some(&json!(7)));

        let back = serde_json::to_value(&project).unwrap();
        assert_eq!(back["reading_time"], json!(7));
        assert_eq!(back["key_stats"][0]["value"], json!("2,034"));
    }

    #[test]
    fn test_chart_specs_skip_malformed() {
        let project = FinalizedProject {
            charts: vec![
                json!({"chart_type": "bar", "title": "Dismissals", "data_key": "step_1"}),
                json!("not a chart"),
            ],
            ..FinalizedProject::default()
        };
        let specs = project.chart_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].chart_type, "bar");
    }

    #[test]
    fn test_score_line() {
        let validation = ValidationResult {
            total_claims: 14,
            verified_claims: 12,
            verification_score: 85.714,
            ..ValidationResult::default()
        };
        assert_eq!(validation.score_line(), "12/14 claims verified (85.7%)");
    }
}
