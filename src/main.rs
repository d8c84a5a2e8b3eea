mod analytics;
mod client;
mod config;
mod error;
mod export;
mod logger;
mod models;
mod session;
mod tui;
mod view;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client::ApiClient;
use config::{Config, Overrides};
use error::ClientError;
use export::{ExportDispatcher, ExportFormat};
use session::{Phase, Session};
use std::path::PathBuf;
use std::sync::Arc;
use view::{SortDirection, SortField, ViewState};

#[derive(Parser)]
#[command(name = "jobtable")]
#[command(about = "Scrape job listings through the scraper backend, then sort, filter, analyze and export them")]
struct Cli {
    /// Scraper backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory exports are saved to
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the backend is reachable
    Health,

    /// Scrape jobs and print the table with analytics
    Scrape {
        /// Job title to search for
        job_title: String,

        #[command(flatten)]
        query: QueryArgs,

        /// Only show jobs whose title, company or location contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Sort by this column
        #[arg(short, long, value_enum)]
        sort: Option<SortField>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Print the processed table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scrape jobs and browse them interactively
    Browse {
        /// Job title to search for
        job_title: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Download the backend's current result set
    Download {
        /// Formats to download (csv, excel, json)
        #[arg(required = true)]
        formats: Vec<String>,
    },

    /// Show the backend's statistics for its current result set
    Stats,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Location (defaults to Remote)
    #[arg(short, long, default_value = "")]
    location: String,

    /// Number of result pages to scrape (1-10)
    #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
    pages: i64,
}

/// Logs the full error chain, hands the user the friendly message.
fn fail(err: ClientError) -> anyhow::Error {
    log::debug!("{:?}", err);
    anyhow!(err.user_message())
}

async fn run_scrape(client: &ApiClient, job_title: &str, query: &QueryArgs) -> Result<Session> {
    let mut session = Session::new();
    eprintln!(
        "Scraping '{}' ({} page(s))... this can take a few minutes.",
        job_title.trim(),
        query.pages
    );

    let outcome = session
        .submit(client, job_title, &query.location, query.pages)
        .await;
    log::debug!("Scrape cycle ended in {:?}", session.phase());

    match outcome {
        Ok(()) => Ok(session),
        Err(e) if session.phase() == Phase::Idle && !session.field_errors().is_empty() => {
            log::debug!("{:?}", e);
            let fields: Vec<String> = session
                .field_errors()
                .iter()
                .map(|f| format!("  {}: {}", f.field, f.message))
                .collect();
            Err(anyhow!("Invalid input:\n{}", fields.join("\n")))
        }
        Err(e) => {
            log::debug!("{:?}", e);
            Err(anyhow!(session.error().map(str::to_string).unwrap_or_else(|| e.user_message())))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // The browse view owns the terminal, so its logs go to a file.
    let log_file = match cli.command {
        Commands::Browse { .. } => logger::default_log_file(),
        _ => None,
    };
    logger::init(cli.verbose, log_file.as_deref());

    let config = Config::load(Overrides {
        api_url: cli.api_url,
        download_dir: cli.download_dir,
    })?;
    let client = ApiClient::new(&config)
        .map_err(fail)
        .context("Failed to set up HTTP client")?;

    match cli.command {
        Commands::Health => match client.health().await {
            Ok(health) => {
                println!("Backend reachable at {}", client.base_url());
                println!("  {}", health.message);
                if let Some(version) = &health.version {
                    println!("  Version: {}", version);
                }
                if let Some(status) = &health.status {
                    println!("  Status:  {}", status);
                }
            }
            Err(e) => {
                println!("Backend unreachable at {}", client.base_url());
                return Err(fail(e));
            }
        },

        Commands::Scrape {
            job_title,
            query,
            filter,
            sort,
            desc,
            json,
        } => {
            let mut session = run_scrape(&client, &job_title, &query).await?;

            let view = ViewState {
                filter_text: filter.unwrap_or_default(),
                sort_field: sort,
                sort_direction: if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                },
            };
            let jobs = Arc::clone(session.jobs());
            let processed = view.apply(&jobs);

            if json {
                println!("{}", to_json(&processed)?);
                return Ok(());
            }

            if let Some(message) = session.message() {
                println!("{}\n", message);
            }
            print_table(&processed);
            if processed.len() != jobs.len() {
                println!("\nShowing {} of {} jobs", processed.len(), jobs.len());
            }
            print_analytics(&mut session);
        }

        Commands::Browse { job_title, query } => {
            let mut session = run_scrape(&client, &job_title, &query).await?;

            let dispatcher = Arc::new(ExportDispatcher::new(client, config.download_dir));
            tui::run_browse(&mut session, dispatcher).await?;
        }

        Commands::Download { formats } => {
            // Reject every bad name before anything is requested.
            for name in &formats {
                name.parse::<ExportFormat>().map_err(fail)?;
            }

            let dispatcher = Arc::new(ExportDispatcher::new(client, config.download_dir));
            let mut downloads = tokio::task::JoinSet::new();
            for name in formats {
                let dispatcher = Arc::clone(&dispatcher);
                downloads.spawn(async move {
                    let outcome = dispatcher.download(&name).await;
                    (name, outcome)
                });
            }

            let mut failed = 0;
            while let Some(joined) = downloads.join_next().await {
                let (name, outcome) = joined.context("Download task panicked")?;
                match outcome {
                    Ok(record) => println!(
                        "{:<6} saved {} ({} bytes)",
                        record.format.label(),
                        dispatcher.download_dir().join(&record.filename).display(),
                        record.size
                    ),
                    Err(e) => {
                        failed += 1;
                        println!("{:<6} failed: {}", name, e.user_message());
                    }
                }
            }
            if failed > 0 {
                return Err(anyhow!("{} download(s) failed", failed));
            }
        }

        Commands::Stats => {
            let stats = client.stats().await.map_err(fail)?;
            println!("Jobs held by server: {}", stats.current_jobs_count);
            if let Some(timestamp) = &stats.timestamp {
                println!("As of: {}", timestamp);
            }
            match stats.analytics {
                Some(analytics) => {
                    println!("Unique companies: {}", analytics.unique_companies);
                    println!("Unique locations: {}", analytics.unique_locations);
                    print_ranking("Top companies", &analytics.top_companies);
                    print_ranking("Top locations", &analytics.top_locations);
                }
                None => println!("No data. Run a scrape first."),
            }
        }
    }

    Ok(())
}

/// Exported rows carry the same fallbacks as the table.
fn to_json(jobs: &[&models::JobRecord]) -> serde_json::Result<String> {
    let rows: Vec<models::DisplayRecord> = jobs.iter().map(|job| job.normalize()).collect();
    serde_json::to_string_pretty(&rows)
}

fn print_table(jobs: &[&models::JobRecord]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }

    println!("{:<4} {:<36} {:<24} {:<24} {:<6}", "#", "TITLE", "COMPANY", "LOCATION", "LINK");
    println!("{}", "-".repeat(98));
    for (i, job) in jobs.iter().enumerate() {
        let display = job.normalize();
        println!(
            "{:<4} {:<36} {:<24} {:<24} {:<6}",
            i + 1,
            truncate(&display.title, 34),
            truncate(&display.company, 22),
            truncate(&display.location, 22),
            if display.link.is_some() { "yes" } else { "-" }
        );
    }
}

fn print_analytics(session: &mut Session) {
    let pages = session.pages_scraped();
    let Some(summary) = session.analytics() else {
        return;
    };

    println!("\nAnalytics");
    println!("  Total jobs:       {}", summary.total_jobs);
    println!("  Pages scraped:    {}", pages);
    println!("  Unique companies: {}", summary.unique_companies);
    println!("  Unique locations: {}", summary.unique_locations);
    println!("  Valid links:      {}%", summary.valid_link_percentage);
    print_ranking("Top companies", &summary.top_companies);
    print_ranking("Top locations", &summary.top_locations);
}

fn print_ranking(label: &str, entries: &[(String, usize)]) {
    if entries.is_empty() {
        return;
    }
    println!("  {}:", label);
    for (name, count) in entries {
        println!("    {:<30} {:>4}", truncate(name, 30), count);
    }
}

/// Shortens to at most `max` characters, ending in "..." when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
