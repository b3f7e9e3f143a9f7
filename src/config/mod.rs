//! Configuration module for Sumi-Fetch
//!
//! Crawler defaults are read from a TOML file (or built in code with
//! [`CrawlerConfig::new`]) and validated before any crawler is constructed.
//!
//! # Example
//!
//! ```no_run
//! use sumi_fetch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Retries per task: {}", config.crawler.retries);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{CacheSetting, Config, CrawlerConfig, Method, ParserKind, SitemapEntry};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate_crawler_config, validate_retry_timeout};
