//! Crawl statistics
//!
//! Counters are bumped by the scheduler as tasks move through admission,
//! fetch, cache and parse; [`CrawlStatistics`] is a point-in-time snapshot.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by every task of a crawler
#[derive(Debug, Default)]
pub struct CrawlCounters {
    enqueued: AtomicU64,
    fetched: AtomicU64,
    cache_hits: AtomicU64,
    duplicates: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    parse_failures: AtomicU64,
    delivered: AtomicU64,
    sitemaps: AtomicU64,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// A sitemap walked; its document stays with the walker
    pub fn record_sitemap(&self) {
        self.sitemaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retries(&self, retries: u64) {
        self.retries.fetch_add(retries, Ordering::Relaxed);
    }

    pub fn snapshot(&self, started_at: DateTime<Utc>) -> CrawlStatistics {
        CrawlStatistics {
            started_at,
            enqueued: self.enqueued.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            sitemaps: self.sitemaps.load(Ordering::Relaxed),
        }
    }
}

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    pub started_at: DateTime<Utc>,

    /// Tasks accepted by `enqueue`, sitemap children included
    pub enqueued: u64,

    /// Successful transport calls
    pub fetched: u64,

    /// Responses replayed from the cache
    pub cache_hits: u64,

    /// Tasks dropped by duplicate suppression
    pub duplicates: u64,

    /// Retried transport attempts
    pub retries: u64,

    /// Tasks whose callback received an error
    pub failures: u64,

    /// Failures caused by a parser rather than the transport
    pub parse_failures: u64,

    /// Successful callbacks
    pub delivered: u64,

    /// Sitemaps fetched and walked
    pub sitemaps: u64,
}

impl CrawlStatistics {
    /// Tasks that reached any terminal outcome
    pub fn completed(&self) -> u64 {
        self.delivered + self.failures + self.duplicates + self.sitemaps
    }

    pub fn success_rate(&self) -> f64 {
        let finished = self.delivered + self.failures;
        if finished > 0 {
            (self.delivered as f64 / finished as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    let elapsed = Utc::now() - stats.started_at;
    println!("Overview:");
    println!("  Started: {}", stats.started_at.to_rfc3339());
    println!("  Elapsed: {}s", elapsed.num_seconds());
    println!("  Tasks enqueued: {}", stats.enqueued);
    println!("  Tasks completed: {}", stats.completed());
    println!();

    println!("Fetching:");
    println!("  Fetched: {}", stats.fetched);
    println!("  Cache hits: {}", stats.cache_hits);
    println!("  Duplicates dropped: {}", stats.duplicates);
    println!("  Retries: {}", stats.retries);
    if stats.sitemaps > 0 {
        println!("  Sitemaps walked: {}", stats.sitemaps);
    }
    println!();

    if stats.failures > 0 {
        println!("Error Summary:");
        println!("  Failed tasks: {}", stats.failures);
        println!("  Parse failures: {}", stats.parse_failures);
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} tasks delivered)",
        stats.success_rate(),
        stats.delivered,
        stats.delivered + stats.failures
    );
}
