//! Published report pages.
//!
//! A report is a set of static files under `{root}/{slug}/`: the article
//! (`content.md`), a tweet (`tweet.txt`), a verification summary
//! (`verification_report.json`) and any number of CSV tables. The root is
//! either a local directory or a site serving them under `/data`.

pub mod table;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::Record;
use crate::core::{ProjectEntry, ReportsConfig};

pub use table::{SortDirection, SortState, TableView};

const CONTENT_FILE: &str = "content.md";
const TWEET_FILE: &str = "tweet.txt";
const VERIFICATION_FILE: &str = "verification_report.json";

/// Errors loading report assets.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Unknown project '{0}'")]
    UnknownProject(String),

    #[error("No report source configured (set reports.data_dir or reports.site_url)")]
    NoSource,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetching {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid CSV in {name}: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },
}

/// Where report files come from.
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// A directory containing one subdirectory per slug
    Directory(PathBuf),
    /// A site serving `{base_url}/{slug}/...`
    Http { client: reqwest::Client, base_url: String },
}

impl AssetSource {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory(path.into())
    }

    /// Read from a web site that serves report data under `/data`.
    pub fn site(site_url: &str) -> Self {
        Self::Http {
            client: reqwest::Client::new(),
            base_url: format!("{}/data", site_url.trim_end_matches('/')),
        }
    }

    /// Pick the source configured for reports. A directory wins over a site.
    pub fn from_config(config: &ReportsConfig, data_dir: Option<PathBuf>) -> Result<Self, ReportError> {
        if let Some(dir) = data_dir {
            return Ok(Self::directory(dir));
        }
        config.site_url.as_deref().map(Self::site).ok_or(ReportError::NoSource)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Directory(path) => path.display().to_string(),
            Self::Http { base_url, .. } => base_url.clone(),
        }
    }

    /// Read `{slug}/{name}` as text. A missing asset is `Ok(None)`.
    pub async fn read_text(&self, slug: &str, name: &str) -> Result<Option<String>, ReportError> {
        match self {
            Self::Directory(root) => read_file(&root.join(slug).join(name)).await,
            Self::Http { client, base_url } => {
                let url = format!(
                    "{base_url}/{}/{}",
                    urlencoding::encode(slug),
                    urlencoding::encode(name)
                );
                fetch_text(client, &url).await
            }
        }
    }
}

async fn read_file(path: &Path) -> Result<Option<String>, ReportError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ReportError::Io { path: path.to_path_buf(), source }),
    }
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<Option<String>, ReportError> {
    let http_err = |source| ReportError::Http { url: url.to_string(), source };

    let response = client.get(url).send().await.map_err(http_err)?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(ReportError::Status { url: url.to_string(), status: status.as_u16() });
    }
    response.text().await.map(Some).map_err(http_err)
}

/// Claims the validation agent confirmed before publishing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationReport {
    pub agent_name: String,
    pub timestamp: String,
    pub items: Vec<VerifiedClaim>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifiedClaim {
    pub claim: String,
    pub verified_value: Value,
}

impl VerificationReport {
    /// Date part of the timestamp for display.
    pub fn date(&self) -> String {
        chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.format("%Y-%m-%d").to_string())
            .or_else(|_| {
                chrono::NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|t| t.format("%Y-%m-%d").to_string())
            })
            .unwrap_or_else(|_| self.timestamp.clone())
    }
}

/// A CSV table from a report.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub name: String,
    pub rows: Vec<Record>,
}

/// Everything a report page shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub slug: String,
    pub title: String,
    pub content: Option<String>,
    pub tweet: Option<String>,
    pub verification: Option<VerificationReport>,
    pub tables: Vec<DataTable>,
}

/// Load a project's report. Missing files are skipped; unreadable or
/// malformed ones are logged and skipped.
pub async fn load_report(source: &AssetSource, entry: &ProjectEntry) -> Report {
    let slug = entry.slug.as_str();
    tracing::debug!(slug, source = %source.describe(), "loading report");

    let content = read_asset(source, slug, CONTENT_FILE).await;
    let tweet = read_asset(source, slug, TWEET_FILE).await.map(|t| t.trim().to_string());

    let verification = match read_asset(source, slug, VERIFICATION_FILE).await {
        Some(text) => match serde_json::from_str(&text) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(slug, error = %e, "Could not parse verification report");
                None
            }
        },
        None => None,
    };

    let mut tables = Vec::new();
    for name in &entry.csv {
        let Some(text) = read_asset(source, slug, name).await else {
            continue;
        };
        match parse_csv(name, &text) {
            Ok(rows) => tables.push(DataTable { name: name.clone(), rows }),
            Err(e) => tracing::warn!(slug, error = %e, "Skipping table"),
        }
    }

    Report {
        slug: entry.slug.clone(),
        title: entry.title.clone(),
        content,
        tweet,
        verification,
        tables,
    }
}

/// Read one asset for a page, treating any failure as absent.
async fn read_asset(source: &AssetSource, slug: &str, name: &str) -> Option<String> {
    match source.read_text(slug, name).await {
        Ok(Some(text)) => Some(text),
        Ok(None) => {
            tracing::debug!(slug, file = %name, "asset not found");
            None
        }
        Err(e) => {
            tracing::warn!(slug, file = %name, error = %e, "Skipping asset");
            None
        }
    }
}

/// Parse CSV with a header row into records, typing each cell.
pub fn parse_csv(name: &str, text: &str) -> Result<Vec<Record>, ReportError> {
    let csv_err = |source| ReportError::Csv { name: name.to_string(), source };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let row: Record = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_string(), typed_cell(cell)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Numbers and booleans become typed values, empty cells become null.
pub fn typed_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match trimmed {
        "true" | "TRUE" | "True" => return Value::Bool(true),
        "false" | "FALSE" | "False" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    let looks_numeric = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && trimmed.chars().any(|c| c.is_ascii_digit());
    if looks_numeric {
        if let Some(n) = trimmed.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(cell.to_string())
}

/// The published projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCatalog {
    projects: Vec<ProjectEntry>,
}

impl ProjectCatalog {
    pub fn new(projects: Vec<ProjectEntry>) -> Self {
        Self { projects }
    }

    pub fn from_config(config: &ReportsConfig) -> Self {
        Self::new(config.projects.clone())
    }

    pub fn get(&self, slug: &str) -> Result<&ProjectEntry, ReportError> {
        self.projects
            .iter()
            .find(|p| p.slug == slug)
            .ok_or_else(|| ReportError::UnknownProject(slug.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectEntry> {
        self.projects.iter()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl Default for ProjectCatalog {
    fn default() -> Self {
        Self::from_config(&ReportsConfig::default())
    }
}

/// Render a report as plain text for the terminal.
///
/// `sort` applies to every table that has its key; other tables keep file
/// order.
pub fn render_text(report: &Report, sort: &SortState, max_rows: Option<usize>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.title);
    let _ = writeln!(out, "{}", "=".repeat(report.title.chars().count()));

    if let Some(verification) = &report.verification {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Analysis verified by {} on {}",
            verification.agent_name,
            verification.date()
        );
        for item in &verification.items {
            let value = match &item.verified_value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = writeln!(out, "  ✓ {}  [{value}]", item.claim);
        }
    }

    if let Some(content) = &report.content {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", content.trim_end());
    }

    for table in &report.tables {
        let has_key = sort
            .key
            .as_deref()
            .is_some_and(|k| table.rows.first().is_some_and(|r| r.contains_key(k)));
        let table_sort = if has_key { sort.clone() } else { SortState::default() };

        let _ = writeln!(out);
        let _ = writeln!(out, "{} ({} rows)", table.name, table.rows.len());
        out.push_str(&TableView::new(&table.rows, &table_sort, max_rows).render_text(&table_sort));
    }

    if let Some(tweet) = &report.tweet {
        let _ = writeln!(out);
        let _ = writeln!(out, "Tweet:");
        let _ = writeln!(out, "{tweet}");
    }

    out
}
