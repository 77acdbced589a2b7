//! Recent query history.
//!
//! Keeps the questions a user asked, newest first, in a small JSON file so
//! the sidebar and `cricketai history` can list them across sessions.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File name of the history store inside the data directory.
pub const HISTORY_FILE: &str = "query-history.json";

/// Number of entries the sidebar shows.
pub const SIDEBAR_LIMIT: usize = 10;

/// A single remembered query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHistoryItem {
    /// Unique id
    pub id: String,
    /// The prompt as submitted
    pub query: String,
    /// When the query was submitted
    pub timestamp: DateTime<Utc>,
}

/// Persistent list of recent queries.
#[derive(Debug)]
pub struct QueryHistory {
    /// Path to the history file
    path: PathBuf,
    /// Entries, newest first
    items: Vec<QueryHistoryItem>,
    /// Maximum number of entries to keep
    max_entries: usize,
}

impl QueryHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 50;

    /// Open the history stored at `path`.
    ///
    /// A missing file yields an empty history. A file that cannot be parsed
    /// is logged and ignored; it is overwritten on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match Self::load(&path) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse query history");
                Vec::new()
            }
        };

        Self { path, items, max_entries: Self::DEFAULT_MAX_ENTRIES }
    }

    /// Open the history at the default location.
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::open(Self::default_path()?))
    }

    /// Get the default history file path.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let data_dir = crate::core::Config::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join(HISTORY_FILE))
    }

    /// Limit the number of stored entries.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self.items.truncate(self.max_entries);
        self
    }

    fn load(path: &Path) -> anyhow::Result<Vec<QueryHistoryItem>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Save history to file.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.items)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Remember a query and persist the history.
    ///
    /// Blank queries are ignored and return `None`.
    pub fn record(&mut self, query: &str) -> anyhow::Result<Option<&QueryHistoryItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let item = QueryHistoryItem {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.to_string(),
            timestamp: Utc::now(),
        };
        self.items.insert(0, item);
        self.items.truncate(self.max_entries);
        self.save()?;

        Ok(self.items.first())
    }

    /// All entries, newest first.
    pub fn items(&self) -> &[QueryHistoryItem] {
        &self.items
    }

    /// Up to `limit` newest entries.
    pub fn recent(&self, limit: usize) -> &[QueryHistoryItem] {
        &self.items[..self.items.len().min(limit)]
    }

    /// Forget every entry and delete the file.
    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.items.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Human-readable age of a timestamp ("just now", "5m ago", "3d ago").
pub fn age_display(timestamp: DateTime<Utc>) -> String {
    let age_seconds = (Utc::now() - timestamp).num_seconds().max(0);

    if age_seconds < 60 {
        "just now".to_string()
    } else if age_seconds < 3600 {
        format!("{}m ago", age_seconds / 60)
    } else if age_seconds < 86400 {
        format!("{}h ago", age_seconds / 3600)
    } else if age_seconds < 604_800 {
        format!("{}d ago", age_seconds / 86400)
    } else {
        format!("{}w ago", age_seconds / 604_800)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_newest_first() {
        let dir = tempdir().unwrap();
        let mut history = QueryHistory::open(dir.path().join(HISTORY_FILE));

        history.record("Most sixes in 2019").unwrap();
        history.record("  Best economy in death overs ").unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.items()[0].query, "Best economy in death overs");
        assert_eq!(history.items()[1].query, "Most sixes in 2019");
        assert_ne!(history.items()[0].id, history.items()[1].id);
    }

    #[test]
    fn test_blank_query_ignored() {
        let dir = tempdir().unwrap();
        let mut history = QueryHistory::open(dir.path().join(HISTORY_FILE));
        assert!(history.record("   ").unwrap().is_none());
        assert!(history.is_empty());
        assert!(!history.path().exists());
    }

    #[test]
    fn test_max_entries() {
        let dir = tempdir().unwrap();
        let mut history = QueryHistory::open(dir.path().join(HISTORY_FILE)).with_max_entries(3);
        for i in 0..5 {
            history.record(&format!("query {i}")).unwrap();
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.items()[0].query, "query 4");
        assert_eq!(history.recent(2).len(), 2);
        assert_eq!(history.recent(10).len(), 3);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(HISTORY_FILE);

        {
            let mut history = QueryHistory::open(&path);
            history.record("Ashwin and Jadeja together").unwrap();
        }

        let history = QueryHistory::open(&path);
        assert_eq!(history.len(), 1);
        assert_eq!(history.items()[0].query, "Ashwin and Jadeja together");
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE);
        fs::write(&path, "{not json").unwrap();

        let mut history = QueryHistory::open(&path);
        assert!(history.is_empty());

        history.record("recovered").unwrap();
        assert_eq!(QueryHistory::open(&path).len(), 1);
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE);
        let mut history = QueryHistory::open(&path);
        history.record("something").unwrap();
        assert!(path.exists());

        history.clear().unwrap();
        assert!(history.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(Utc::now()), "just now");
        assert_eq!(age_display(Utc::now() - chrono::Duration::minutes(5)), "5m ago");
        assert_eq!(age_display(Utc::now() - chrono::Duration::days(2)), "2d ago");
    }
}
