//! Output module for crawl summaries
//!
//! This module handles recording crawl counters and printing the
//! end-of-crawl statistics.

pub mod stats;

pub use stats::{print_statistics, CrawlCounters, CrawlStatistics};
