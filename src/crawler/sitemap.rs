//! Sitemap traversal
//!
//! A sitemap is fetched as XML, its `<url>` entries are filtered by
//! `<priority>` and position, and every surviving `<loc>` is queued as an
//! `html-parser` task sharing the caller's callback. The sitemap document
//! itself never reaches that callback; a failed sitemap fetch or parse does.

use crate::config::{Method, ParserKind, SitemapEntry};
use crate::crawler::scheduler::Crawler;
use crate::crawler::task::{Callback, CrawlOutcome, TaskOptions};
use crate::document::Document;
use crate::SumiError;
use std::sync::Arc;
use url::Url;

/// What to walk and how to filter it
#[derive(Clone, Default)]
pub struct SitemapOptions {
    pub uri: String,
    /// Entries whose `<priority>` is below this are skipped; 0 keeps all
    pub min_priority: f64,
    pub max_urls: Option<usize>,
    pub callback: Option<Callback>,
}

impl SitemapOptions {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn min_priority(mut self, min_priority: f64) -> Self {
        self.min_priority = min_priority;
        self
    }

    pub fn max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls = Some(max_urls);
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(CrawlOutcome<'_>) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn shared_callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }
}

impl std::fmt::Debug for SitemapOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SitemapOptions")
            .field("uri", &self.uri)
            .field("min_priority", &self.min_priority)
            .field("max_urls", &self.max_urls)
            .finish_non_exhaustive()
    }
}

impl From<&str> for SitemapOptions {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for SitemapOptions {
    fn from(uri: String) -> Self {
        Self::new(uri)
    }
}

impl From<&SitemapEntry> for SitemapOptions {
    fn from(entry: &SitemapEntry) -> Self {
        Self {
            uri: entry.uri.clone(),
            min_priority: entry.min_priority,
            max_urls: entry.max_urls,
            callback: None,
        }
    }
}

/// Path query selecting the `<url>` entries to queue
pub fn sitemap_query(min_priority: f64, max_urls: Option<usize>) -> String {
    let mut query = String::from("//url");
    if min_priority > 0.0 {
        query.push_str(&format!("[priority>={}]", min_priority));
    }
    if let Some(max_urls) = max_urls {
        query.push_str(&format!("[position()<={}]", max_urls));
    }
    query
}

impl Crawler {
    /// Fetches a sitemap and queues the URLs it lists
    pub fn enqueue_sitemap(&self, options: impl Into<SitemapOptions>) {
        let SitemapOptions {
            uri,
            min_priority,
            max_urls,
            callback,
        } = options.into();
        let query = sitemap_query(min_priority, max_urls);
        let base = Url::parse(&uri).ok();
        let crawler = self.clone();

        let task = TaskOptions::new(uri)
            .sitemap()
            .method(Method::Get)
            .parser(ParserKind::Xml)
            .callback(move |outcome| match outcome {
                CrawlOutcome::Document { document, task } => {
                    tracing::debug!("Walking sitemap {}", task.label());
                    crawler.queue_entries(&document, &query, base.as_ref(), callback.as_ref());
                }
                CrawlOutcome::Failed(error) => {
                    tracing::warn!("Sitemap failed: {}", error);
                    forward(callback.as_ref(), error);
                }
                other => tracing::debug!("Ignoring sitemap outcome {:?}", other),
            });
        self.enqueue(task);
    }

    fn queue_entries(
        &self,
        document: &Document,
        query: &str,
        base: Option<&Url>,
        callback: Option<&Callback>,
    ) {
        tracing::info!("Parsing sitemap with path {}", query);
        let entries = match document.find(query) {
            Ok(entries) => entries,
            Err(error) => {
                forward(callback, error.into());
                return;
            }
        };

        let uris: Vec<String> = entries
            .iter()
            .filter_map(|entry| entry.get("loc"))
            .map(|loc| loc.text().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .map(|loc| resolve_loc(base, loc))
            .collect();

        tracing::info!("About to queue {} url(s)", uris.len());
        for uri in uris {
            let mut child = TaskOptions::new(uri).parser(ParserKind::Html);
            if let Some(callback) = callback {
                child = child.shared_callback(Arc::clone(callback));
            }
            self.enqueue(child);
        }
    }
}

fn forward(callback: Option<&Callback>, error: SumiError) {
    if let Some(callback) = callback {
        callback(CrawlOutcome::Failed(error));
    }
}

/// Resolves a relative `<loc>` against the sitemap URI
///
/// Absolute and unparseable values are queued exactly as written.
fn resolve_loc(base: Option<&Url>, loc: String) -> String {
    match Url::parse(&loc) {
        Err(url::ParseError::RelativeUrlWithoutBase) => base
            .and_then(|base| base.join(&loc).ok())
            .map(|url| url.to_string())
            .unwrap_or(loc),
        _ => loc,
    }
}
