//! Core functionality for CricketAI.
//!
//! Configuration and the persisted query history.

mod config;
mod history;

pub use config::{
    expand_path, BackendConfig, Config, HistoryConfig, ProjectEntry, ReportsConfig,
    SessionConfig, UiConfig, BACKEND_URL_ENV, LOCAL_CONFIG_FILE,
};
pub use history::{age_display, QueryHistory, QueryHistoryItem, HISTORY_FILE, SIDEBAR_LIMIT};
