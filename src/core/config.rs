//! Configuration management for CricketAI.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::DEFAULT_BACKEND_URL;
use crate::session::{SessionSettings, DEEP_ANALYSIS_THRESHOLD, DEFAULT_AUTHOR, DISPLAY_ROW_CAP};

/// Environment variable overriding the backend URL.
pub const BACKEND_URL_ENV: &str = "CRICKETAI_BACKEND_URL";

/// Name of the per-directory config file.
pub const LOCAL_CONFIG_FILE: &str = ".cricketai.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Analytics backend settings
    pub backend: BackendConfig,

    /// Chat session settings
    pub session: SessionConfig,

    /// UI/TUI settings
    pub ui: UiConfig,

    /// Query history settings
    pub history: HistoryConfig,

    /// Published report pages
    pub reports: ReportsConfig,
}

/// Analytics backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend
    pub url: String,

    /// Request timeout in seconds; unset waits indefinitely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Chat session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Author credited on finalized projects
    pub author: String,

    /// Prompt length above which a first question uses deep analysis
    pub deep_analysis_threshold: usize,

    /// Maximum number of deep-analysis rows kept for display
    pub display_row_cap: usize,
}

/// UI/TUI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Color theme name (built-in: default, dracula, nord)
    pub theme: String,

    /// Maximum number of table rows to display
    pub max_table_rows: usize,
}

/// Query history settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of queries to keep
    pub max_entries: usize,

    /// History file location; `~` and environment variables are expanded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Published report pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Local directory holding `{slug}/content.md` and friends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Site serving the same files under `/data`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,

    /// Published projects
    pub projects: Vec<ProjectEntry>,
}

/// A published project listed on the landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    /// URL-safe identifier, also the asset directory name
    pub slug: String,

    /// Display title
    pub title: String,

    /// CSV tables rendered on the report page
    #[serde(default)]
    pub csv: Vec<String>,
}

impl ProjectEntry {
    pub fn new(slug: impl Into<String>, title: impl Into<String>, csv: &[&str]) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            csv: csv.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.cricketai.toml` in current directory
    /// 2. `~/.config/cricketai/config.toml`
    /// 3. Falls back to defaults
    ///
    /// `CRICKETAI_BACKEND_URL` overrides the backend URL in every case.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match Self::locate() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// The file [`Config::load`] would read, if any exists.
    pub fn locate() -> Option<PathBuf> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        Self::global_path().filter(|p| p.exists())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend.url = url.trim().to_string();
            }
        }
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::global_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cricketai"))
    }

    /// Get the data directory path (for history, cache, etc.).
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("cricketai"))
    }

    fn global_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            author: self.session.author.clone(),
            deep_threshold: self.session.deep_analysis_threshold,
            display_cap: self.session.display_row_cap,
        }
    }

    /// Resolved query history file.
    pub fn history_path(&self) -> anyhow::Result<PathBuf> {
        match &self.history.path {
            Some(path) => expand_path(path),
            None => crate::core::QueryHistory::default_path(),
        }
    }

    /// Resolved local report directory, if configured.
    pub fn reports_dir(&self) -> anyhow::Result<Option<PathBuf>> {
        self.reports.data_dir.as_deref().map(expand_path).transpose()
    }
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(path: &str) -> anyhow::Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .map_err(|e| anyhow::anyhow!("Cannot expand path {path}: {e}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { url: DEFAULT_BACKEND_URL.to_string(), timeout_secs: None }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            author: DEFAULT_AUTHOR.to_string(),
            deep_analysis_threshold: DEEP_ANALYSIS_THRESHOLD,
            display_row_cap: DISPLAY_ROW_CAP,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { theme: "default".to_string(), max_table_rows: 10 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: crate::core::QueryHistory::DEFAULT_MAX_ENTRIES, path: None }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            site_url: None,
            projects: vec![
                ProjectEntry::new("nervous-nineties", "Nervous Nineties", &["accelerators.csv"]),
                ProjectEntry::new("ashwin-jadeja", "Ashwin-Jadeja", &["table4.csv"]),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.url, "http://localhost:8000");
        assert!(config.backend_timeout().is_none());
        assert_eq!(config.session.author, "Vinay Bale");
        assert_eq!(config.session.deep_analysis_threshold, 200);
        assert_eq!(config.session.display_row_cap, 100);
        assert_eq!(config.ui.theme, "default");
        assert_eq!(config.history.max_entries, 50);
        assert_eq!(config.reports.projects.len(), 2);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[backend]"));
        assert!(toml_str.contains("[session]"));
        assert!(toml_str.contains("[[reports.projects]]"));
        assert!(!toml_str.contains("timeout_secs"));

        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [backend]
            url = "https://stats.example.com"
            timeout_secs = 90

            [session]
            author = "Desk"

            [ui]
            theme = "nord"

            [[reports.projects]]
            slug = "spin-twins"
            title = "Spin Twins"
            csv = ["table4.csv", "table5.csv"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.url, "https://stats.example.com");
        assert_eq!(config.backend_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.session.author, "Desk");
        assert_eq!(config.session.deep_analysis_threshold, 200);
        assert_eq!(config.ui.theme, "nord");
        assert_eq!(config.ui.max_table_rows, 10);
        assert_eq!(config.reports.projects.len(), 1);
        assert_eq!(config.reports.projects[0].csv.len(), 2);
    }

    #[test]
    fn test_session_settings() {
        let mut config = Config::default();
        config.session.deep_analysis_threshold = 10;
        let settings = config.session_settings();
        assert_eq!(settings.deep_threshold, 10);
        assert_eq!(settings.author, "Vinay Bale");
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let mut config = Config::default();
        config.backend.timeout_secs = Some(0);
        assert!(config.backend_timeout().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[history]\nmax_entries = 5\npath = \"/tmp/h.json\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.history.max_entries, 5);
        assert_eq!(config.history_path().unwrap(), PathBuf::from("/tmp/h.json"));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backend\nurl = 3").unwrap();
        assert!(Config::load_from_file(&path).is_err());
    }

    #[test]
    #[serial(env)]
    fn test_env_override() {
        std::env::set_var(BACKEND_URL_ENV, "http://10.0.0.5:9000");
        let mut config = Config::default();
        config.apply_env();
        std::env::remove_var(BACKEND_URL_ENV);

        assert_eq!(config.backend.url, "http://10.0.0.5:9000");
    }

    #[test]
    #[serial(env)]
    fn test_expand_path() {
        std::env::set_var("CRICKETAI_TEST_DIR", "/srv/cricket");
        let path = expand_path("$CRICKETAI_TEST_DIR/data").unwrap();
        std::env::remove_var("CRICKETAI_TEST_DIR");

        assert_eq!(path, PathBuf::from("/srv/cricket/data"));
    }
}
