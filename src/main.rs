//! Slack-Harvest main entry point
//!
//! This is the command-line interface for the Slack-Harvest workspace crawler.

use anyhow::Context;
use clap::Parser;
use slack_harvest::config::{load_config_with_hash, Config};
use slack_harvest::crawler::crawl;
use slack_harvest::output::{load_statistics, print_statistics, print_summary};
use slack_harvest::storage::open_storage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Slack-Harvest: a Slack workspace crawler
///
/// Slack-Harvest walks channels, messages, thread replies and files through
/// the Slack Web API and stores one flat record per item for indexing.
#[derive(Parser, Debug)]
#[command(name = "slack-harvest")]
#[command(version)]
#[command(about = "Crawl a Slack workspace into index records", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("slack_harvest=info,warn"),
            1 => EnvFilter::new("slack_harvest=debug,info"),
            2 => EnvFilter::new("slack_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Slack-Harvest Dry Run ===\n");

    println!("Slack:");
    println!("  API: {}", config.slack.api_base_url);
    if let Some(proxy) = config.slack.proxy_address() {
        println!("  Proxy: {}", proxy);
    }
    println!("  Conversation types: {}", config.slack.conversation_types());
    match config.slack.channel_names() {
        Some(names) => {
            println!("  Channels ({}):", names.len());
            for name in names {
                println!("    - #{}", name);
            }
        }
        None => println!("  Channels: all visible to the token"),
    }

    println!("\nCrawler:");
    println!("  Worker threads: {}", config.crawler.thread_count);
    println!("  Queue capacity: {}", config.crawler.queue_capacity);
    println!("  Shutdown grace: {}s", config.crawler.shutdown_grace_secs);

    println!("\nFiles:");
    if config.files.enabled {
        println!("  Max size: {} bytes", config.files.max_size);
        println!("  MIME types: {}", config.files.mime_types.join(", "));
        println!("  Ignore extraction errors: {}", config.files.ignore_error);
    } else {
        println!("  Disabled");
    }

    if !config.filter.include_urls.is_empty() || !config.filter.exclude_urls.is_empty() {
        println!("\nURL filter:");
        for pattern in &config.filter.include_urls {
            println!("  + {}", pattern);
        }
        for pattern in &config.filter.exclude_urls {
            println!("  - {}", pattern);
        }
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if !config.default_fields.is_empty() {
        println!("  Default fields:");
        for (key, value) in &config.default_fields {
            println!("    {} = {}", key, value);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;
    let stats = load_statistics(&storage).context("Failed to load statistics")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    match crawl(config, config_hash).await {
        Ok(summary) => {
            tracing::info!("Crawl completed successfully");
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e).context("Crawl failed")
        }
    }
}
