//! Query dispatch.
//!
//! Chooses between the standard and deep analysis endpoints and normalizes
//! either response into a single [`AssistantReply`].

use crate::backend::{AnalysisResponse, AnalyticalStep, Backend, BackendResult, DeepAnalysisResponse, Record};

use super::conversation::AssistantReply;

/// Prompts longer than this, sent on an empty conversation, use deep analysis.
pub const DEEP_ANALYSIS_THRESHOLD: usize = 200;

/// Maximum number of combined deep-analysis rows kept for display.
pub const DISPLAY_ROW_CAP: usize = 100;

/// Separator placed between the SQL of consecutive deep-analysis steps.
const STEP_SQL_SEPARATOR: &str = "\n\n-- Step ---\n\n";

/// Which backend operation answers a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Standard,
    Deep,
}

impl QueryMode {
    /// Pick the mode for a prompt.
    ///
    /// Length is counted in characters of the prompt as sent.
    pub fn select(conversation_len: usize, prompt: &str, threshold: usize) -> Self {
        if conversation_len == 0 && prompt.chars().count() > threshold {
            Self::Deep
        } else {
            Self::Standard
        }
    }
}

/// Run a prompt against the backend in the given mode.
pub async fn dispatch<B: Backend + ?Sized>(
    backend: &B,
    mode: QueryMode,
    prompt: &str,
    display_cap: usize,
) -> BackendResult<AssistantReply> {
    match mode {
        QueryMode::Standard => backend.analyze(prompt).await.map(normalize_standard),
        QueryMode::Deep => {
            backend.analyze_deep(prompt).await.map(|resp| normalize_deep(resp, display_cap))
        }
    }
}

/// Standard responses are used as-is, with a placeholder narrative.
pub fn normalize_standard(response: AnalysisResponse) -> AssistantReply {
    let content = match response.markdown {
        Some(markdown) if !markdown.trim().is_empty() => markdown,
        _ => format!("Found {} results", response.data.len()),
    };
    AssistantReply { content, sql: response.sql_used, data: response.data }
}

/// Deep responses are flattened into one result set.
pub fn normalize_deep(response: DeepAnalysisResponse, display_cap: usize) -> AssistantReply {
    let content = match response.executive_summary {
        Some(summary) if !summary.trim().is_empty() => summary,
        _ => format!("Deep analysis completed with {} steps", response.steps.len()),
    };

    let queries: Vec<&str> = response
        .steps
        .iter()
        .filter_map(|s| s.sql_query.as_deref())
        .filter(|q| !q.is_empty())
        .collect();
    let sql = if queries.is_empty() { None } else { Some(queries.join(STEP_SQL_SEPARATOR)) };

    AssistantReply { content, sql, data: flatten_steps(&response.steps, display_cap) }
}

/// Concatenate every step's rows in order, keeping at most `cap`.
pub fn flatten_steps(steps: &[AnalyticalStep], cap: usize) -> Vec<Record> {
    steps.iter().filter_map(|s| s.results.as_ref()).flatten().take(cap).cloned().collect()
}
