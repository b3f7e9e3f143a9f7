//! Sumi-Fetch: a crawl-orchestration engine
//!
//! This crate schedules fetches through a bounded, priority-ordered pool,
//! retries failed transports, caches responses by URI and hands each body to
//! a structured-document parser before invoking the caller's callback.

pub mod config;
pub mod crawler;
pub mod document;
pub mod output;

use thiserror::Error;

/// Main error type delivered to crawl callbacks
#[derive(Debug, Error)]
pub enum SumiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to resolve deferred URI: {0}")]
    Resolve(String),
}

impl SumiError {
    /// Returns true if a fresh attempt could succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("\"parser\" is a required field")]
    MissingParser,

    #[error("Unknown parser '{0}': must be one of none, dom-parser, xml-parser or html-parser")]
    UnknownParser(String),

    #[error("Parser '{0}' is not available in this build")]
    ParserUnavailable(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Errors raised by a transport while fetching a URI
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}")]
    Connect { url: String },

    #[error("Server error {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid URI '{url}': {message}")]
    InvalidUri { url: String, message: String },

    #[error("Transport failure for {url}: {message}")]
    Other { url: String, message: String },
}

/// Errors raised while turning a body into a structured document
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Document is empty")]
    Empty,

    #[error("Malformed XML at byte {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Invalid path expression '{path}': {message}")]
    Path { path: String, message: String },

    #[error("Parser '{0}' is not available in this build")]
    Unavailable(&'static str),
}

/// Result type alias for Sumi-Fetch operations
pub type Result<T> = std::result::Result<T, SumiError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{CacheSetting, CrawlerConfig, Method, ParserKind};
pub use crawler::{
    Callback, CrawlOutcome, Crawler, Enqueue, HttpTransport, Response, SitemapOptions, Task,
    TaskOptions, Transport,
};
pub use document::{Document, DomQuery, Node};
