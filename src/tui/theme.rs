//! Color themes for the chat interface.

use ratatui::style::Color;

use crate::backend::Recommendation;
use crate::session::{Role, WorkflowState};

/// Colors used by the chat screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: String,
    /// Headers, titles and focused borders
    pub primary: Color,
    /// User messages
    pub user: Color,
    /// Assistant messages
    pub assistant: Color,
    /// Generated SQL
    pub sql: Color,
    /// Highlighted first table row
    pub highlight: Color,
    pub text: Color,
    pub text_dim: Color,
    pub text_muted: Color,
    pub background: Color,
    pub border: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

impl Theme {
    /// Purple on the terminal's own background.
    pub fn default_theme() -> Self {
        Self {
            name: "default".to_string(),
            primary: Color::Rgb(147, 51, 234),     // Purple-600
            user: Color::Rgb(96, 165, 250),        // Blue-400
            assistant: Color::White,
            sql: Color::Rgb(52, 211, 153),         // Emerald-400
            highlight: Color::Rgb(88, 28, 135),    // Purple-900
            text: Color::White,
            text_dim: Color::Rgb(156, 163, 175),   // Gray-400
            text_muted: Color::Rgb(107, 114, 128), // Gray-500
            background: Color::Reset,
            border: Color::Rgb(75, 85, 99),        // Gray-600
            success: Color::Rgb(34, 197, 94),
            warning: Color::Rgb(245, 158, 11),
            error: Color::Rgb(239, 68, 68),
        }
    }

    pub fn dracula() -> Self {
        Self {
            name: "dracula".to_string(),
            primary: Color::Rgb(189, 147, 249),
            user: Color::Rgb(139, 233, 253),
            assistant: Color::Rgb(248, 248, 242),
            sql: Color::Rgb(80, 250, 123),
            highlight: Color::Rgb(68, 71, 90),
            text: Color::Rgb(248, 248, 242),
            text_dim: Color::Rgb(189, 147, 249),
            text_muted: Color::Rgb(98, 114, 164),
            background: Color::Rgb(40, 42, 54),
            border: Color::Rgb(68, 71, 90),
            success: Color::Rgb(80, 250, 123),
            warning: Color::Rgb(255, 184, 108),
            error: Color::Rgb(255, 85, 85),
        }
    }

    pub fn nord() -> Self {
        Self {
            name: "nord".to_string(),
            primary: Color::Rgb(136, 192, 208),
            user: Color::Rgb(129, 161, 193),
            assistant: Color::Rgb(236, 239, 244),
            sql: Color::Rgb(163, 190, 140),
            highlight: Color::Rgb(59, 66, 82),
            text: Color::Rgb(236, 239, 244),
            text_dim: Color::Rgb(216, 222, 233),
            text_muted: Color::Rgb(76, 86, 106),
            background: Color::Rgb(46, 52, 64),
            border: Color::Rgb(67, 76, 94),
            success: Color::Rgb(163, 190, 140),
            warning: Color::Rgb(235, 203, 139),
            error: Color::Rgb(191, 97, 106),
        }
    }

    /// Get a theme by name (case-insensitive).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" => Some(Self::default_theme()),
            "dracula" => Some(Self::dracula()),
            "nord" => Some(Self::nord()),
            _ => None,
        }
    }

    /// Theme named in configuration, or the default one.
    pub fn from_config(name: &str) -> Self {
        Self::by_name(name).unwrap_or_else(|| {
            tracing::warn!(theme = name, "Unknown theme, using default");
            Self::default_theme()
        })
    }

    pub fn available_themes() -> Vec<&'static str> {
        vec!["default", "dracula", "nord"]
    }

    pub fn role_color(&self, role: Role) -> Color {
        match role {
            Role::User => self.user,
            Role::Assistant => self.assistant,
        }
    }

    /// Color of the workflow badge in the header.
    pub fn state_color(&self, state: WorkflowState) -> Color {
        match state {
            WorkflowState::Exploring => self.text_dim,
            WorkflowState::Finalizing | WorkflowState::Validating | WorkflowState::Publishing => {
                self.warning
            }
            WorkflowState::Finalized | WorkflowState::Validated => self.primary,
            WorkflowState::Published => self.success,
        }
    }

    pub fn recommendation_color(&self, recommendation: &Recommendation) -> Color {
        match recommendation {
            Recommendation::ReadyToPublish => self.success,
            Recommendation::NeedsRevision => self.warning,
            Recommendation::MajorIssues | Recommendation::Other(_) => self.error,
        }
    }
}
