//! # CricketAI
//!
//! Terminal studio for exploring cricket statistics and publishing verified analyses.
//!
//! Questions are sent to an analytics backend that writes and runs the SQL.
//! Once a conversation has produced something worth keeping, it is finalized
//! into an article, checked claim by claim by the validation agent, and
//! published as a report.
//!
//! ## Quick Start
//!
//! ```bash
//! # Open the chat interface
//! cricketai
//!
//! # One-off question
//! cricketai ask "Who has the most ODI hundreds?"
//!
//! # Read a published report
//! cricketai report nervous-nineties --dir ./public/data
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::future_not_send)]

pub mod backend;
pub mod core;
pub mod report;
pub mod session;

#[cfg(feature = "tui")]
pub mod app;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
#[cfg(feature = "tui")]
pub use app::App;
pub use backend::{Backend, BackendError, HttpBackend};
pub use core::{Config, QueryHistory};
pub use report::{ProjectCatalog, Report, ReportError};
pub use session::{Session, Workflow, WorkflowError, WorkflowState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "cricketai";
