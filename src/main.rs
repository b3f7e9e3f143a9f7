//! Sumi-Fetch main entry point
//!
//! This is the command-line interface for the Sumi-Fetch crawl engine.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sumi_fetch::config::{load_config_with_hash, Config};
use sumi_fetch::output::print_statistics;
use sumi_fetch::{Callback, CrawlOutcome, Crawler, SitemapOptions, TaskOptions};
use tracing_subscriber::EnvFilter;

/// Sumi-Fetch: a crawl-orchestration engine
///
/// Fetches the configured seeds, any URLs given on the command line and the
/// URLs listed in sitemaps, with bounded concurrency, retries and caching.
#[derive(Parser, Debug)]
#[command(name = "sumi-fetch")]
#[command(version = "1.0.0")]
#[command(about = "A crawl-orchestration engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URLs to fetch in addition to the configured seeds
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Sitemap to walk in addition to the configured ones
    #[arg(long, value_name = "URL")]
    sitemap: Option<String>,

    /// Skip sitemap entries with a lower priority
    #[arg(long, default_value_t = 0.0)]
    min_priority: f64,

    /// Queue at most this many sitemap entries
    #[arg(long, requires = "sitemap")]
    max_urls: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let crawler = Crawler::with_http(config.crawler.clone()).context("Failed to start crawler")?;
    let report: Callback = Arc::new(report_outcome);

    let queued = queue_work(&crawler, &config, &cli, &report);
    if queued == 0 {
        tracing::warn!("Nothing to crawl: no seeds, URLs or sitemaps given");
        return Ok(());
    }

    crawler.wait_idle().await;
    tracing::info!("Crawl complete");

    if !cli.quiet {
        print_statistics(&crawler.statistics());
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_fetch=info,warn"),
            1 => EnvFilter::new("sumi_fetch=debug,info"),
            2 => EnvFilter::new("sumi_fetch=trace,debug"),
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

/// Queues seeds, command-line URLs and sitemaps; returns how many items
fn queue_work(crawler: &Crawler, config: &Config, cli: &Cli, report: &Callback) -> usize {
    let mut queued = 0;

    for uri in config.seeds.iter().chain(&cli.urls) {
        crawler.enqueue(TaskOptions::new(uri.as_str()).shared_callback(Arc::clone(report)));
        queued += 1;
    }

    for entry in &config.sitemap {
        crawler.enqueue_sitemap(SitemapOptions::from(entry).shared_callback(Arc::clone(report)));
        queued += 1;
    }

    if let Some(uri) = &cli.sitemap {
        let mut options = SitemapOptions::new(uri.as_str())
            .min_priority(cli.min_priority)
            .shared_callback(Arc::clone(report));
        if let Some(max_urls) = cli.max_urls {
            options = options.max_urls(max_urls);
        }
        crawler.enqueue_sitemap(options);
        queued += 1;
    }

    tracing::info!("Queued {} item(s)", queued);
    queued
}

/// Logs one line per finished page
fn report_outcome(outcome: CrawlOutcome<'_>) {
    match outcome {
        CrawlOutcome::Failed(error) => tracing::error!("{}", error),
        CrawlOutcome::Fetched(response) => tracing::info!(
            "{} {} ({} bytes{})",
            response.status,
            response.url,
            response.content.len(),
            if response.from_cache { ", cached" } else { "" }
        ),
        CrawlOutcome::Dom {
            response, query, ..
        } => tracing::info!(
            "{} {} ({} bytes) {}",
            response.status,
            response.url,
            response.content.len(),
            query.title().unwrap_or_default()
        ),
        CrawlOutcome::Document { document, task } => {
            let title = document
                .find("//title")
                .ok()
                .and_then(|nodes| nodes.first().map(|node| node.text()))
                .unwrap_or_default();
            tracing::info!(
                "{} ({} elements) {}",
                task.label(),
                document.element_count(),
                title.trim()
            );
        }
    }
}
