//! CricketAI - cricket analytics studio for your terminal.
//!
//! Ask questions of the analytics backend, then turn the conversation into
//! a validated, published report.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cricketai::backend::HttpBackend;
use cricketai::core::{age_display, Config, QueryHistory};
use cricketai::report::table::{SortDirection, SortState, TableView};
use cricketai::report::{self, AssetSource, ProjectCatalog};
use cricketai::session::{Message, Session};

/// Cricket analytics studio for your terminal
#[derive(Parser)]
#[command(name = "cricketai")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Analytics backend URL (overrides config and CRICKETAI_BACKEND_URL)
    #[arg(long, global = true, value_name = "URL")]
    backend_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat interface (default)
    Chat {
        /// Question to submit as soon as the chat opens
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// Ask a single question and print the answer
    Ask {
        /// The question
        prompt: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Run questions, finalize them into an article and optionally publish
    Pipeline {
        /// Project title
        #[arg(short, long)]
        title: String,

        /// Publish when validation recommends it
        #[arg(long)]
        publish: bool,

        /// Questions to ask, in order
        #[arg(required = true)]
        prompts: Vec<String>,
    },

    /// Show recent queries
    History {
        /// Delete all saved queries
        #[arg(long)]
        clear: bool,

        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// List published reports
    Projects,

    /// Print a published report
    Report {
        /// Project slug
        slug: String,

        /// Directory holding report data (one subdirectory per slug)
        #[arg(long, conflicts_with = "site")]
        dir: Option<PathBuf>,

        /// Site serving report data under /data
        #[arg(long)]
        site: Option<String>,

        /// Column to sort tables by
        #[arg(long)]
        sort: Option<String>,

        /// Sort ascending instead of descending
        #[arg(long, requires = "sort")]
        asc: bool,

        /// Maximum rows per table
        #[arg(long)]
        max_rows: Option<usize>,
    },

    /// Check backend health and the daily query allowance
    Status,

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    dotenvy::dotenv().ok();

    let mut config = Config::load()?;
    if let Some(url) = cli.backend_url {
        config.backend.url = url;
    }

    match cli.command {
        None => cmd_chat(config, None)?,
        Some(Commands::Chat { prompt }) => cmd_chat(config, prompt.as_deref())?,
        Some(Commands::Ask { prompt, format }) => cmd_ask(&config, &prompt, format)?,
        Some(Commands::Pipeline { title, publish, prompts }) => {
            cmd_pipeline(&config, &title, publish, &prompts)?;
        }
        Some(Commands::History { clear, limit }) => cmd_history(&config, clear, limit)?,
        Some(Commands::Projects) => cmd_projects(&config),
        Some(Commands::Report { slug, dir, site, sort, asc, max_rows }) => {
            let sort = sort.map(|key| {
                SortState::by(key, if asc { SortDirection::Asc } else { SortDirection::Desc })
            });
            cmd_report(&config, &slug, dir, site.as_deref(), sort.unwrap_or_default(), max_rows)?;
        }
        Some(Commands::Status) => cmd_status(&config)?,
        Some(Commands::Config { path }) => cmd_config(&config, path)?,
        Some(Commands::Completions { shell }) => cmd_completions(shell),
    }

    Ok(())
}

/// Run the interactive TUI.
#[cfg(feature = "tui")]
fn cmd_chat(config: Config, prompt: Option<&str>) -> Result<()> {
    let app = cricketai::App::new(config)?;
    cricketai::tui::run_tui(app, prompt)
}

#[cfg(not(feature = "tui"))]
fn cmd_chat(_config: Config, _prompt: Option<&str>) -> Result<()> {
    anyhow::bail!("The chat interface is not available in this build. Use `cricketai ask` instead.")
}

fn http_backend(config: &Config) -> Result<HttpBackend> {
    Ok(match config.backend_timeout() {
        Some(timeout) => HttpBackend::with_timeout(&config.backend.url, timeout)?,
        None => HttpBackend::new(&config.backend.url),
    })
}

/// Session against the configured backend, recording queries to history.
fn open_session(config: &Config) -> Result<Session<HttpBackend>> {
    let history = QueryHistory::open(config.history_path()?)
        .with_max_entries(config.history.max_entries);
    Ok(Session::new(http_backend(config)?)
        .with_settings(config.session_settings())
        .with_history(history))
}

fn print_message(message: &Message, max_rows: usize) {
    println!("{}", message.content.trim_end());

    if let Some(error) = &message.error {
        println!("\nError: {error}");
    }
    if let Some(sql) = &message.sql {
        println!("\nSQL:\n{sql}");
    }
    if let Some(rows) = message.rows() {
        let sort = SortState::default();
        println!();
        print!("{}", TableView::new(rows, &sort, Some(max_rows)).render_text(&sort));
    }
}

/// Ask a single question.
fn cmd_ask(config: &Config, prompt: &str, format: OutputFormat) -> Result<()> {
    let mut session = open_session(config)?;
    let rt = tokio::runtime::Runtime::new()?;

    let failed = rt.block_on(async {
        let message = session.submit(prompt).await?;
        let Some(message) = message else {
            return Ok::<_, anyhow::Error>(false);
        };
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(message)?),
            OutputFormat::Text => print_message(message, config.ui.max_table_rows),
        }
        Ok(message.error.is_some())
    })?;

    if failed {
        anyhow::bail!("Query failed");
    }
    Ok(())
}

/// Run prompts, then finalize, validate and optionally publish.
fn cmd_pipeline(config: &Config, title: &str, publish: bool, prompts: &[String]) -> Result<()> {
    let mut session = open_session(config)?;
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        for (i, prompt) in prompts.iter().enumerate() {
            println!("[{}/{}] {prompt}", i + 1, prompts.len());
            if let Some(message) = session.submit(prompt).await? {
                match (&message.error, message.rows()) {
                    (Some(error), _) => println!("  failed: {error}"),
                    (None, Some(rows)) => println!("  {} rows", rows.len()),
                    (None, None) => println!("  answered"),
                }
            }
        }

        println!("Finalizing \"{title}\"...");
        let validation = session.finalize(title).await?;
        println!("  {} · {}", validation.recommendation, validation.score_line());
        for claim in &validation.claims {
            let mark = if claim.is_verified { "✓" } else { "✗" };
            println!("  {mark} {}", claim.claim_text);
        }

        if publish {
            if !session.can_publish() {
                anyhow::bail!(
                    "Not publishing: validation recommends {}",
                    session.workflow().validation().map_or_else(String::new, |v| v.recommendation.to_string())
                );
            }
            let receipt = session.publish().await?;
            println!("Published {} to {}", receipt.slug, receipt.project_path);
            for file in &receipt.files_created {
                println!("  {file}");
            }
        }

        Ok::<(), anyhow::Error>(())
    })
}

/// Show or clear recent queries.
fn cmd_history(config: &Config, clear: bool, limit: usize) -> Result<()> {
    let mut history = QueryHistory::open(config.history_path()?)
        .with_max_entries(config.history.max_entries);

    if clear {
        history.clear()?;
        println!("History cleared");
        return Ok(());
    }

    if history.is_empty() {
        println!("No history yet");
        return Ok(());
    }

    for item in history.recent(limit) {
        println!("{:>10}  {}", age_display(item.timestamp), item.query);
    }

    Ok(())
}

/// List published reports.
fn cmd_projects(config: &Config) {
    let catalog = ProjectCatalog::from_config(&config.reports);
    if catalog.is_empty() {
        println!("No published reports");
        return;
    }

    for project in catalog.iter() {
        println!("{:20} {} ({} tables)", project.slug, project.title, project.csv.len());
    }
}

/// Print a published report.
fn cmd_report(
    config: &Config,
    slug: &str,
    dir: Option<PathBuf>,
    site: Option<&str>,
    sort: SortState,
    max_rows: Option<usize>,
) -> Result<()> {
    let catalog = ProjectCatalog::from_config(&config.reports);
    let entry = catalog.get(slug)?;

    let source = match (dir, site) {
        (Some(dir), _) => AssetSource::directory(dir),
        (None, Some(site)) => AssetSource::site(site),
        (None, None) => AssetSource::from_config(&config.reports, config.reports_dir()?)?,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let loaded = rt.block_on(report::load_report(&source, entry));

    print!("{}", report::render_text(&loaded, &sort, max_rows));
    Ok(())
}

/// Check backend health and rate limit.
fn cmd_status(config: &Config) -> Result<()> {
    let backend = http_backend(config)?;
    let rt = tokio::runtime::Runtime::new()?;

    println!("Backend: {}", backend.base_url());
    rt.block_on(async {
        match backend.health().await {
            Ok(health) => println!("  status:   {} (database {})", health.status, health.database),
            Err(e) => println!("  status:   unreachable ({e})"),
        }
        match backend.rate_limit().await {
            Ok(limit) => {
                println!(
                    "  queries:  {} used, {} remaining of {} ({})",
                    limit.used, limit.remaining, limit.daily_limit, limit.date
                );
                if !limit.model.is_empty() {
                    println!("  model:    {}", limit.model);
                }
                if !limit.message.is_empty() {
                    println!("  {}", limit.message);
                }
            }
            Err(e) => println!("  queries:  unavailable ({e})"),
        }
    });

    Ok(())
}

/// Show configuration.
fn cmd_config(config: &Config, show_path: bool) -> Result<()> {
    if show_path {
        let path = Config::locate().or_else(|| Config::config_dir().map(|d| d.join("config.toml")));
        if let Some(path) = path {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let toml = toml::to_string_pretty(config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "cricketai", &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_is_chat() {
        let cli = Cli::try_parse_from(["cricketai"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_report_dir_conflicts_with_site() {
        let result = Cli::try_parse_from([
            "cricketai", "report", "x", "--dir", "d", "--site", "http://s",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_backend_url() {
        let cli = Cli::try_parse_from(["cricketai", "status", "--backend-url", "http://b:1"]).unwrap();
        assert_eq!(cli.backend_url.as_deref(), Some("http://b:1"));
    }
}
