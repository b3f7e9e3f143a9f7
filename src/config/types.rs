use crate::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration file structure for Sumi-Fetch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,

    /// URLs queued when the crawl starts
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Sitemaps walked when the crawl starts
    #[serde(default)]
    pub sitemap: Vec<SitemapEntry>,
}

/// Instance-level defaults for every task a crawler runs
///
/// Every field can be overridden per task through `TaskOptions`.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Transport timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Parser applied to successful bodies (required)
    #[serde(default)]
    pub parser: Option<ParserKind>,

    /// Maximum number of tasks holding a pool slot at once
    #[serde(rename = "max-connections", default = "default_max_connections")]
    pub max_connections: usize,

    /// Number of distinct priority levels (priorities are `0..priority_range`)
    #[serde(rename = "priority-range", default = "default_priority_range")]
    pub priority_range: u32,

    /// Default priority; higher values are admitted sooner
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Retry attempts after the first failed transport call
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay before a retried attempt, in seconds
    #[serde(rename = "retry-timeout", default = "default_retry_timeout")]
    pub retry_timeout: f64,

    /// Default request method
    #[serde(default)]
    pub method: Method,

    /// Whether successful responses are cached
    #[serde(default)]
    pub cache: CacheSetting,

    /// Drop tasks whose URI already has a cached response
    #[serde(rename = "skip-duplicates", default)]
    pub skip_duplicates: bool,

    /// User agent sent by the HTTP transport
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,
}

fn default_timeout() -> f64 {
    60.0
}

fn default_max_connections() -> usize {
    10
}

fn default_priority_range() -> u32 {
    10
}

fn default_priority() -> u32 {
    5
}

fn default_retries() -> u32 {
    3
}

fn default_retry_timeout() -> f64 {
    10.0
}

impl CrawlerConfig {
    /// Creates a configuration with all defaults and the given parser
    pub fn new(parser: ParserKind) -> Self {
        Self {
            timeout: default_timeout(),
            parser: Some(parser),
            max_connections: default_max_connections(),
            priority_range: default_priority_range(),
            priority: default_priority(),
            retries: default_retries(),
            retry_timeout: default_retry_timeout(),
            method: Method::default(),
            cache: CacheSetting::default(),
            skip_duplicates: false,
            user_agent: None,
        }
    }

    /// Zero when out of range; validation rejects such values
    pub fn timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or_default()
    }

    pub fn retry_timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_timeout).unwrap_or_default()
    }
}

/// Sitemap listed in the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct SitemapEntry {
    pub uri: String,

    /// Entries with a lower `<priority>` are skipped
    #[serde(rename = "min-priority", default)]
    pub min_priority: f64,

    /// Maximum number of entries to queue
    #[serde(rename = "max-urls", default)]
    pub max_urls: Option<usize>,
}

/// How a successful body is turned into a document before the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ParserKind {
    /// Deliver the raw response
    None,
    /// CSS-selector query handle over an HTML tree
    Dom,
    /// Path-queryable tree built by a strict XML parser
    Xml,
    /// Path-queryable tree built by a lenient HTML parser
    Html,
}

impl ParserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Dom => "dom-parser",
            Self::Xml => "xml-parser",
            Self::Html => "html-parser",
        }
    }

    /// Returns true if this build can construct documents of this kind
    pub fn is_available(&self) -> bool {
        match self {
            Self::Xml => cfg!(feature = "xml"),
            Self::None | Self::Dom | Self::Html => true,
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParserKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "dom-parser" => Ok(Self::Dom),
            "xml-parser" => Ok(Self::Xml),
            "html-parser" => Ok(Self::Html),
            other => Err(ConfigError::UnknownParser(other.to_string())),
        }
    }
}

impl TryFrom<String> for ParserKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Request methods understood by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Only read-safe methods may consult or populate the response cache
    pub fn is_read_safe(&self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }

    /// HEAD responses carry no body to parse
    pub fn returns_body(&self) -> bool {
        !matches!(self, Self::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(ConfigError::Validation(format!(
                "Unsupported method '{}'",
                other
            ))),
        }
    }
}

/// Cache flag: either a plain switch or a TTL in seconds
///
/// A TTL enables caching; entries are kept for the crawler's lifetime
/// regardless of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CacheSetting {
    Enabled(bool),
    Ttl(u64),
}

impl CacheSetting {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Enabled(enabled) => *enabled,
            Self::Ttl(_) => true,
        }
    }
}

impl Default for CacheSetting {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl From<bool> for CacheSetting {
    fn from(enabled: bool) -> Self {
        Self::Enabled(enabled)
    }
}
