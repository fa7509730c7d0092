mod config;
mod error;
mod indexer;
mod models;
mod providers;
mod search;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tabled::{Table, Tabled, settings::Style};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::Config;
use error::{Error, Result};
use indexer::IndexerManager;
use models::SearchMode;
use search::{ProcessedResults, SearchEngine};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    /// No logs
    Off,
    /// Only errors
    Error,
    /// Errors and warnings
    Warn,
    /// Info, warnings and errors (default)
    Info,
    /// Debug logs
    Debug,
    /// All logs including trace
    Trace,
}

impl LogLevel {
    fn as_filter(&self) -> &str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSearchMode {
    /// Ranked list for user selection
    Manual,
    /// Single best pick
    Automatic,
}

impl From<CliSearchMode> for SearchMode {
    fn from(mode: CliSearchMode) -> Self {
        match mode {
            CliSearchMode::Manual => SearchMode::Manual,
            CliSearchMode::Automatic => SearchMode::Automatic,
        }
    }
}

#[derive(Parser)]
#[command(name = "listenarr")]
#[command(about = "Listenarr: federated audiobook search across Torznab and direct trackers")]
#[command(version)]
struct Cli {
    /// Config file path (defaults to the platform config directory)
    #[arg(short, long, env = "LISTENARR_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (can also use RUST_LOG env var)
    #[arg(short = 'l', long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search configured indexers for an audiobook
    Search {
        /// Book title
        title: String,

        /// Author name
        #[arg(short, long, default_value = "")]
        author: String,

        /// Selection mode
        #[arg(short, long, value_enum, default_value = "manual")]
        mode: CliSearchMode,
    },

    /// Test connections to all configured indexers
    Test {
        /// Only test this indexer key
        #[arg(short, long)]
        indexer: Option<String>,
    },

    /// Run the canned search queries end to end
    Selftest,

    /// Show indexer health and capabilities
    Status,
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    id: usize,
    #[tabled(rename = "Indexer")]
    indexer: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Fmt")]
    format: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "S")]
    seeders: String,
    #[tabled(rename = "P")]
    peers: String,
    #[tabled(rename = "Conf%")]
    confidence: String,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Prio")]
    priority: i32,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Last Error")]
    last_error: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > CLI flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(cli.log_level.as_filter())
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(filter)
        .init();

    tracing::debug!("Listenarr starting...");

    let config = match &cli.config {
        Some(path) => Config::load_from(path.clone())?,
        None => Config::load()?,
    };

    let enabled = config.enabled_indexers();
    if enabled.is_empty() {
        eprintln!(
            "{} No enabled indexers configured. Add [indexers.<key>] tables to the config file.",
            "Warning:".yellow()
        );
    }

    let manager = Arc::new(IndexerManager::new(enabled));

    match cli.command {
        Commands::Search {
            title,
            author,
            mode,
        } => {
            let engine = SearchEngine::new(manager);
            let outcome = engine
                .search_for_audiobook(&title, &author, mode.into())
                .await;

            if !outcome.success {
                eprintln!(
                    "{} {}",
                    "Search failed:".red(),
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                std::process::exit(1);
            }

            if outcome.results.is_empty() {
                println!("No results found.");
            } else {
                match &outcome.results {
                    ProcessedResults::Manual(results) => {
                        let rows: Vec<ResultRow> = results
                            .iter()
                            .map(|result| ResultRow {
                                id: result.id,
                                indexer: result.indexer.clone(),
                                title: truncate(&result.title, 60),
                                author: truncate(&result.author, 24),
                                format: result.format.clone(),
                                size: result.size.clone(),
                                seeders: swarm_count(result.seeders),
                                peers: swarm_count(result.peers),
                                confidence: format!("{:.0}", result.quality_assessment.confidence),
                            })
                            .collect();
                        let mut table = Table::new(rows);
                        table.with(Style::rounded());
                        println!("{table}");

                        let stats = search::ResultProcessor::new().processing_stats(results);
                        let formats: Vec<String> = stats
                            .formats
                            .iter()
                            .map(|(format, count)| format!("{format}: {count}"))
                            .collect();
                        println!("Formats: {}", formats.join(", "));
                    }
                    ProcessedResults::Automatic(selections) => {
                        if let Some(selection) = selections.first() {
                            println!(
                                "{} {} ({}, confidence {:.0}%)",
                                "Selected:".green(),
                                selection.selected_result.title,
                                selection.selected_result.indexer_name,
                                selection.confidence_score
                            );
                            println!("{}", selection.selected_result.download_url);
                        }
                    }
                }
            }

            println!(
                "{} result(s) from {} indexer(s) in {:.2}s",
                outcome.result_count, outcome.indexers_searched, outcome.search_time_s
            );

            engine.shutdown().await;
        }

        Commands::Test { indexer: key } => {
            let results = match key {
                Some(key) => {
                    let indexer = manager
                        .get(&key)
                        .await
                        .ok_or_else(|| anyhow::anyhow!(Error::IndexerNotFound(key.clone())))?;
                    let mut map = std::collections::BTreeMap::new();
                    map.insert(key, indexer.test_connection().await);
                    map
                }
                None => manager.test_all().await,
            };

            for (key, test) in &results {
                if test.success {
                    println!(
                        "{} {} ({})",
                        "OK".green(),
                        key,
                        test.version.as_deref().unwrap_or("unknown version")
                    );
                } else {
                    println!(
                        "{} {} - {}",
                        "FAIL".red(),
                        key,
                        test.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }

            if results.values().any(|test| !test.success) {
                std::process::exit(1);
            }
        }

        Commands::Selftest => {
            let engine = SearchEngine::new(manager);
            let report = engine.test_search_functionality().await;

            for test in &report.tests {
                let marker = if test.search_successful {
                    "OK".green()
                } else {
                    "FAIL".red()
                };
                println!(
                    "{} \"{}\" by {}: {} result(s) from {} indexer(s) in {:.2}s",
                    marker,
                    test.title,
                    test.author,
                    test.result_count,
                    test.indexers_searched,
                    test.search_time_s
                );
            }

            let status = engine.get_service_status().await;
            println!(
                "{}/{} indexers available, {} search(es) in history",
                status.indexer_status.available,
                status.indexer_status.total,
                status.history_entries
            );

            if !report.success {
                std::process::exit(1);
            }
        }

        Commands::Status => {
            let status = manager.status().await;
            let rows: Vec<StatusRow> = status
                .indexers
                .iter()
                .map(|indexer| StatusRow {
                    key: indexer.key.clone(),
                    name: indexer.name.clone(),
                    kind: indexer.kind.clone(),
                    priority: indexer.priority,
                    available: if indexer.health.available {
                        "yes".green().to_string()
                    } else {
                        "no".red().to_string()
                    },
                    failures: indexer.health.consecutive_failures,
                    last_error: indexer
                        .health
                        .last_error
                        .clone()
                        .map(|error| truncate(&error, 40))
                        .unwrap_or_default(),
                })
                .collect();

            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
            println!("{}/{} indexers available", status.available, status.total);
        }
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{truncated}\u{2026}")
    }
}

fn swarm_count(value: i64) -> String {
    if value < 0 {
        "?".to_string()
    } else {
        value.to_string()
    }
}
