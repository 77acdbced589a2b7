//! Chat session.
//!
//! A [`Session`] ties the conversation, the publishing workflow and the
//! backend together. The terminal UI and the `ask` / `pipeline` commands
//! drive everything through it.

mod conversation;
mod dispatch;
mod workflow;

pub use conversation::{
    AssistantReply, Conversation, Message, MessageId, Role, FAILED_QUERY_CONTENT,
};
pub use dispatch::{
    dispatch, flatten_steps, normalize_deep, normalize_standard, QueryMode,
    DEEP_ANALYSIS_THRESHOLD, DISPLAY_ROW_CAP,
};
pub use workflow::{Stage, Workflow, WorkflowError, WorkflowState, MIN_MESSAGES_TO_FINALIZE};

use crate::backend::{Backend, PublishReceipt, ValidationResult};
use crate::core::QueryHistory;

/// Author credited on finalized projects unless configured otherwise.
pub const DEFAULT_AUTHOR: &str = "Vinay Bale";

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub author: String,
    pub deep_threshold: usize,
    pub display_cap: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            author: DEFAULT_AUTHOR.to_string(),
            deep_threshold: DEEP_ANALYSIS_THRESHOLD,
            display_cap: DISPLAY_ROW_CAP,
        }
    }
}

/// A query that has been accepted and is waiting for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub id: MessageId,
    pub prompt: String,
    pub mode: QueryMode,
}

/// One user's exploration session.
pub struct Session<B: Backend> {
    backend: B,
    conversation: Conversation,
    workflow: Workflow,
    analyzing: bool,
    history: Option<QueryHistory>,
    settings: SessionSettings,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            conversation: Conversation::new(),
            workflow: Workflow::new(),
            analyzing: false,
            history: None,
            settings: SessionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Remember submitted prompts in `history`.
    pub fn with_history(mut self, history: QueryHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn state(&self) -> WorkflowState {
        self.workflow.state()
    }

    pub fn history(&self) -> Option<&QueryHistory> {
        self.history.as_ref()
    }

    pub fn history_mut(&mut self) -> Option<&mut QueryHistory> {
        self.history.as_mut()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    pub fn can_finalize(&self) -> bool {
        self.workflow.can_finalize(self.conversation.len(), self.analyzing)
    }

    pub fn can_publish(&self) -> bool {
        self.workflow.can_publish()
    }

    /// Accept a prompt and append the user turn and a loading placeholder.
    ///
    /// The caller can redraw between this and [`Session::complete_query`]
    /// so the placeholder is visible while the backend works.
    pub fn begin_query(&mut self, input: &str) -> Result<PendingQuery, WorkflowError> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return Err(WorkflowError::EmptyPrompt);
        }
        if self.workflow.state() != WorkflowState::Exploring {
            return Err(WorkflowError::InvalidState {
                action: "ask a question",
                state: self.workflow.state(),
            });
        }
        if self.analyzing {
            return Err(WorkflowError::Analyzing);
        }

        if let Some(history) = self.history.as_mut() {
            if let Err(e) = history.record(prompt) {
                tracing::warn!(error = %e, "Failed to save query history");
            }
        }

        // The deep threshold counts the input as typed, surrounding whitespace included
        let mode = QueryMode::select(self.conversation.len(), input, self.settings.deep_threshold);
        self.conversation.push_user(prompt);
        let id = self.conversation.push_placeholder();
        self.analyzing = true;
        tracing::debug!(?mode, chars = prompt.chars().count(), "query submitted");

        Ok(PendingQuery { id, prompt: prompt.to_string(), mode })
    }

    /// Run a pending query and complete its placeholder.
    ///
    /// Backend failures end up on the assistant message, so this never
    /// fails; the returned message is the completed turn.
    pub async fn complete_query(&mut self, pending: PendingQuery) -> Option<&Message> {
        let result =
            dispatch(&self.backend, pending.mode, &pending.prompt, self.settings.display_cap).await;

        match result {
            Ok(reply) => {
                tracing::info!(rows = reply.data.len(), "query answered");
                self.conversation.resolve(pending.id, reply);
            }
            Err(e) => {
                tracing::warn!(error = %e, "query failed");
                self.conversation.fail(pending.id, e.to_string());
            }
        }
        self.analyzing = false;

        self.conversation.get(pending.id)
    }

    /// Submit a prompt and wait for the answer.
    pub async fn submit(&mut self, prompt: &str) -> Result<Option<&Message>, WorkflowError> {
        let pending = self.begin_query(prompt)?;
        Ok(self.complete_query(pending).await)
    }

    /// Finalize the conversation under `title`, then validate the result.
    pub async fn finalize(&mut self, title: &str) -> Result<&ValidationResult, WorkflowError> {
        self.workflow
            .finalize(
                &self.backend,
                &self.conversation,
                title,
                &self.settings.author,
                self.analyzing,
            )
            .await
    }

    pub async fn revalidate(&mut self) -> Result<&ValidationResult, WorkflowError> {
        self.workflow.revalidate(&self.backend).await
    }

    pub async fn publish(&mut self) -> Result<&PublishReceipt, WorkflowError> {
        self.workflow.publish(&self.backend).await
    }

    pub fn continue_exploring(&mut self) -> Result<(), WorkflowError> {
        self.workflow.continue_exploring()
    }

    /// Start over with an empty conversation.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.workflow.reset();
        self.analyzing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::backend::Endpoint;
    use tempfile::tempdir;

    fn session() -> Session<FakeBackend> {
        Session::new(FakeBackend::new())
    }

    #[tokio::test]
    async fn test_submit_standard() {
        let mut session = session();
        let message = session.submit("Most centuries in ODIs").await.unwrap().unwrap();

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "### Analysis Results");
        assert_eq!(message.rows().map(<[_]>::len), Some(2));
        assert!(!session.is_analyzing());
        assert_eq!(session.conversation().len(), 2);
        assert_eq!(session.backend().calls(), vec![Endpoint::Analyze]);
    }

    #[tokio::test]
    async fn test_long_first_prompt_uses_deep() {
        let mut session = session();
        let prompt = "x".repeat(250);
        let message = session.submit(&prompt).await.unwrap().unwrap();

        assert_eq!(message.content, "Two-step summary");
        assert_eq!(message.data.as_ref().map(Vec::len), Some(3));
        assert_eq!(message.sql.as_deref(), Some("SELECT 1\n\n-- Step ---\n\nSELECT 2"));
        assert_eq!(session.backend().calls(), vec![Endpoint::AnalyzeDeep]);

        session.submit(&prompt).await.unwrap();
        assert_eq!(session.backend().calls(), vec![Endpoint::AnalyzeDeep, Endpoint::Analyze]);
    }

    #[tokio::test]
    async fn test_deep_threshold_counts_raw_input() {
        let mut session = session();
        let input = format!("{}{}", "x".repeat(195), " ".repeat(10));
        session.submit(&input).await.unwrap();

        assert_eq!(session.backend().calls(), vec![Endpoint::AnalyzeDeep]);
        assert_eq!(session.conversation().messages()[0].content, "x".repeat(195));
    }

    #[tokio::test]
    async fn test_query_failure_sets_error() {
        let mut session = Session::new(FakeBackend::new().failing(Endpoint::Analyze));
        let message = session.submit("anything").await.unwrap().unwrap();

        assert_eq!(message.content, FAILED_QUERY_CONTENT);
        assert_eq!(message.error.as_deref(), Some("analyze failed"));
        assert!(!message.is_loading);
        assert!(!session.is_analyzing());
    }

    #[test]
    fn test_begin_query_guards() {
        let mut session = session();
        assert!(matches!(session.begin_query("   "), Err(WorkflowError::EmptyPrompt)));

        let pending = session.begin_query("first").unwrap();
        assert!(session.is_analyzing());
        assert!(session.conversation().has_pending());
        assert!(matches!(session.begin_query("second"), Err(WorkflowError::Analyzing)));
        assert!(!session.can_finalize());
        assert_eq!(pending.mode, QueryMode::Standard);
        assert!(session.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_prompts_recorded_in_history() {
        let dir = tempdir().unwrap();
        let history = QueryHistory::open(dir.path().join("history.json"));
        let mut session = session().with_history(history);

        session.submit("  Ashwin and Jadeja at home ").await.unwrap();
        let history = session.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.items()[0].query, "Ashwin and Jadeja at home");
    }

    #[tokio::test]
    async fn test_full_workflow() {
        let mut session = session().with_settings(SessionSettings {
            author: "Desk".to_string(),
            ..SessionSettings::default()
        });
        assert!(!session.can_finalize());

        session.submit("Nervous nineties").await.unwrap();
        assert!(session.can_finalize());

        session.finalize("Nervous Nineties").await.unwrap();
        assert_eq!(session.state(), WorkflowState::Validated);
        assert!(session.can_publish());
        assert!(matches!(
            session.submit("more").await,
            Err(WorkflowError::InvalidState { .. })
        ));

        let receipt = session.publish().await.unwrap();
        assert!(receipt.success);
        assert_eq!(session.state(), WorkflowState::Published);

        let body = session.backend().last_body(Endpoint::Finalize).unwrap();
        assert_eq!(body["author"], "Desk");
        assert_eq!(body["conversation"][0]["role"], "user");
        assert_eq!(body["conversation"][1]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_continue_exploring_keeps_conversation() {
        let mut session = session();
        session.submit("question").await.unwrap();
        session.finalize("Draft").await.unwrap();

        session.continue_exploring().unwrap();
        assert_eq!(session.state(), WorkflowState::Exploring);
        assert_eq!(session.conversation().len(), 2);

        session.submit("follow up").await.unwrap();
        assert_eq!(session.conversation().len(), 4);
    }

    #[tokio::test]
    async fn test_reset() {
        let mut session = session();
        session.submit("question").await.unwrap();
        session.finalize("Draft").await.unwrap();
        session.reset();

        assert!(session.conversation().is_empty());
        assert_eq!(session.state(), WorkflowState::Exploring);
        assert!(session.workflow().project().is_none());
    }
}
