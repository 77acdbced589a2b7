//! Finalize, validate, publish workflow.
//!
//! A single [`WorkflowState`] value drives which actions are available.
//! Legal edges live in [`WorkflowState::allows`]; each action has one
//! function that checks its guard before any backend call is made.
//!
//! ```text
//! exploring -> finalizing -> finalized -> validating -> validated -> publishing -> published
//!     ^            |             ^  |          |            ^ |           |
//!     +------------+             |  |          |            | |           |
//!     +-------- continue --------+--+          +-- fail ----+ +-- fail ---+
//! ```
//!
//! Every action takes `&mut self`, so at most one backend call per
//! workflow can be in flight.

use crate::backend::{
    Backend, BackendError, FinalizeRequest, FinalizedProject, PublishReceipt, PublishRequest,
    Recommendation, ValidateRequest, ValidationResult,
};

use super::conversation::Conversation;

/// Messages required before a conversation can be finalized.
pub const MIN_MESSAGES_TO_FINALIZE: usize = 2;

/// Where a project is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    #[default]
    Exploring,
    Finalizing,
    Finalized,
    Validating,
    Validated,
    Publishing,
    Published,
}

impl WorkflowState {
    /// Transition table.
    pub fn allows(self, next: Self) -> bool {
        use WorkflowState::{
            Exploring, Finalized, Finalizing, Published, Publishing, Validated, Validating,
        };

        matches!(
            (self, next),
            (Exploring, Finalizing)
                | (Finalizing, Finalized | Exploring)
                | (Finalized, Validating | Exploring)
                | (Validating, Validated | Finalized)
                | (Validated, Publishing | Exploring)
                | (Publishing, Published | Validated)
        )
    }

    fn advance(&mut self, next: Self) -> Result<(), WorkflowError> {
        if !self.allows(next) {
            return Err(WorkflowError::IllegalTransition { from: *self, to: next });
        }
        tracing::debug!(from = %self, to = %next, "workflow transition");
        *self = next;
        Ok(())
    }

    /// A backend call for this workflow is outstanding.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Finalizing | Self::Validating | Self::Publishing)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Published
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exploring => "exploring",
            Self::Finalizing => "finalizing",
            Self::Finalized => "finalized",
            Self::Validating => "validating",
            Self::Validated => "validated",
            Self::Publishing => "publishing",
            Self::Published => "published",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-facing workflow stage, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Finalize,
    Validate,
    Publish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Finalize => "Finalization",
            Self::Validate => "Validation",
            Self::Publish => "Publish",
        })
    }
}

/// Errors raised by session and workflow actions.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Enter a question first")]
    EmptyPrompt,

    #[error("Please enter a project title")]
    EmptyTitle,

    #[error("Finalize needs at least {required} messages (have {count})")]
    NotEnoughMessages { count: usize, required: usize },

    #[error("Wait for the current analysis to finish")]
    Analyzing,

    #[error("Cannot {action} while {state}")]
    InvalidState { action: &'static str, state: WorkflowState },

    #[error("Cannot publish: validation recommends {recommendation}. Fix issues and re-finalize.")]
    NotReady { recommendation: Recommendation },

    #[error("No finalized project in memory")]
    MissingProject,

    #[error("Illegal workflow transition {from} -> {to}")]
    IllegalTransition { from: WorkflowState, to: WorkflowState },

    #[error("{stage} failed: {source}")]
    Backend {
        stage: Stage,
        #[source]
        source: BackendError,
    },
}

impl WorkflowError {
    /// Guard violations are detected before any network call.
    pub fn is_guard(&self) -> bool {
        !matches!(self, Self::Backend { .. })
    }
}

/// Workflow controller: current state plus each stage's output.
#[derive(Debug, Clone, Default)]
pub struct Workflow {
    state: WorkflowState,
    title: Option<String>,
    project: Option<FinalizedProject>,
    validation: Option<ValidationResult>,
    receipt: Option<PublishReceipt>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Title of the project being finalized or already finalized.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn project(&self) -> Option<&FinalizedProject> {
        self.project.as_ref()
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        self.validation.as_ref()
    }

    pub fn receipt(&self) -> Option<&PublishReceipt> {
        self.receipt.as_ref()
    }

    /// Whether the finalize action is offered (a title is still required).
    pub fn can_finalize(&self, message_count: usize, analyzing: bool) -> bool {
        self.state == WorkflowState::Exploring
            && !analyzing
            && message_count >= MIN_MESSAGES_TO_FINALIZE
    }

    pub fn can_publish(&self) -> bool {
        self.state == WorkflowState::Validated && self.validation.as_ref().is_some_and(|v| v.is_ready())
    }

    /// Continue exploring is offered once a draft exists but is not yet publishing.
    pub fn can_continue_exploring(&self) -> bool {
        matches!(self.state, WorkflowState::Finalized | WorkflowState::Validated)
    }

    /// One-line description of the current state for headers.
    pub fn status_line(&self) -> &'static str {
        match self.state {
            WorkflowState::Exploring => "Ask questions, then finalize when ready",
            WorkflowState::Finalizing => "Creating your analysis...",
            WorkflowState::Finalized => "Analysis created, validation pending",
            WorkflowState::Validating => "Validation agent checking claims...",
            WorkflowState::Validated if self.can_publish() => "Ready to publish!",
            WorkflowState::Validated => "Issues found - review below",
            WorkflowState::Publishing => "Publishing...",
            WorkflowState::Published => "Published successfully!",
        }
    }

    fn check_finalize(
        &self,
        message_count: usize,
        analyzing: bool,
        title: &str,
    ) -> Result<(), WorkflowError> {
        if self.state != WorkflowState::Exploring {
            return Err(WorkflowError::InvalidState { action: "finalize", state: self.state });
        }
        if analyzing {
            return Err(WorkflowError::Analyzing);
        }
        if message_count < MIN_MESSAGES_TO_FINALIZE {
            return Err(WorkflowError::NotEnoughMessages {
                count: message_count,
                required: MIN_MESSAGES_TO_FINALIZE,
            });
        }
        if title.trim().is_empty() {
            return Err(WorkflowError::EmptyTitle);
        }
        Ok(())
    }

    /// Finalize the conversation into a project, then validate it.
    ///
    /// On a finalize failure the workflow returns to exploring and the title
    /// is dropped. On a validation failure the project is kept and the state
    /// is `finalized`; call [`Workflow::revalidate`] to try again.
    pub async fn finalize<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        conversation: &Conversation,
        title: &str,
        author: &str,
        analyzing: bool,
    ) -> Result<&ValidationResult, WorkflowError> {
        self.check_finalize(conversation.len(), analyzing, title)?;

        let request = FinalizeRequest {
            project_title: title.trim().to_string(),
            conversation: conversation.to_turns(),
            author: author.to_string(),
        };

        self.state.advance(WorkflowState::Finalizing)?;
        self.title = Some(request.project_title.clone());
        tracing::info!(title = %request.project_title, turns = request.conversation.len(), "finalizing");

        match backend.finalize(&request).await {
            Ok(project) => {
                self.state.advance(WorkflowState::Finalized)?;
                self.project = Some(project);
                self.validation = None;
                self.receipt = None;
            }
            Err(source) => {
                tracing::warn!(error = %source, "finalize failed");
                self.state.advance(WorkflowState::Exploring)?;
                self.title = None;
                return Err(WorkflowError::Backend { stage: Stage::Finalize, source });
            }
        }

        self.run_validation(backend).await
    }

    /// Validate the finalized project again after a failed validation call.
    pub async fn revalidate<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<&ValidationResult, WorkflowError> {
        if self.state != WorkflowState::Finalized {
            return Err(WorkflowError::InvalidState { action: "validate", state: self.state });
        }
        self.run_validation(backend).await
    }

    async fn run_validation<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<&ValidationResult, WorkflowError> {
        let Some(project) = self.project.as_ref() else {
            return Err(WorkflowError::MissingProject);
        };
        self.state.advance(WorkflowState::Validating)?;

        match backend.validate(&ValidateRequest::from(project)).await {
            Ok(validation) => {
                self.state.advance(WorkflowState::Validated)?;
                tracing::info!(
                    score = validation.verification_score,
                    recommendation = %validation.recommendation,
                    "validation complete"
                );
                Ok(&*self.validation.insert(validation))
            }
            Err(source) => {
                tracing::warn!(error = %source, "validation failed");
                self.state.advance(WorkflowState::Finalized)?;
                Err(WorkflowError::Backend { stage: Stage::Validate, source })
            }
        }
    }

    /// Publish the validated project.
    ///
    /// Refused without a network call unless the validator recommended
    /// `READY_TO_PUBLISH`.
    pub async fn publish<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<&PublishReceipt, WorkflowError> {
        if self.state != WorkflowState::Validated {
            return Err(WorkflowError::InvalidState { action: "publish", state: self.state });
        }
        let (Some(project), Some(validation)) = (self.project.as_ref(), self.validation.as_ref())
        else {
            return Err(WorkflowError::MissingProject);
        };
        if !validation.is_ready() {
            return Err(WorkflowError::NotReady {
                recommendation: validation.recommendation.clone(),
            });
        }

        self.state.advance(WorkflowState::Publishing)?;

        match backend.publish(&PublishRequest { project, validation }).await {
            Ok(receipt) => {
                self.state.advance(WorkflowState::Published)?;
                tracing::info!(path = %receipt.project_path, files = receipt.files_created.len(), "published");
                Ok(&*self.receipt.insert(receipt))
            }
            Err(source) => {
                tracing::warn!(error = %source, "publish failed");
                self.state.advance(WorkflowState::Validated)?;
                Err(WorkflowError::Backend { stage: Stage::Publish, source })
            }
        }
    }

    /// Discard the draft and its validation and return to exploring.
    pub fn continue_exploring(&mut self) -> Result<(), WorkflowError> {
        if !self.can_continue_exploring() {
            return Err(WorkflowError::InvalidState { action: "continue exploring", state: self.state });
        }
        self.state.advance(WorkflowState::Exploring)?;
        self.title = None;
        self.project = None;
        self.validation = None;
        Ok(())
    }

    /// Forget everything, including a published receipt.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
