//! Task descriptors and callback outcomes
//!
//! Callers describe work with [`TaskOptions`] (every field optional) or a
//! bare URI string. Each enqueued item is overlaid on the crawler's
//! [`CrawlerConfig`] to produce a fully-specified [`Task`].

use crate::config::{CacheSetting, CrawlerConfig, Method, ParserKind};
use crate::crawler::fetcher::{BoxFut, FetchRequest, Response};
use crate::document::{Document, DomQuery};
use crate::{ConfigError, SumiError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Continuation invoked once per task with its terminal outcome
pub type Callback = Arc<dyn Fn(CrawlOutcome<'_>) + Send + Sync>;

/// Error type deferred URI resolvers may fail with
pub type ResolveError = Box<dyn std::error::Error + Send + Sync>;

type Resolver = Arc<dyn Fn() -> BoxFut<'static, Result<String, ResolveError>> + Send + Sync>;

/// Where a task's URI comes from
#[derive(Clone)]
pub enum UriSource {
    Literal(String),
    /// Computed just before the task is admitted
    Deferred(Resolver),
}

impl UriSource {
    /// Wraps an async function that yields the URI
    pub fn deferred<F, Fut>(resolve: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ResolveError>> + Send + 'static,
    {
        Self::Deferred(Arc::new(move || Box::pin(resolve())))
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(uri) => Some(uri),
            Self::Deferred(_) => None,
        }
    }

    pub(crate) async fn resolve(&self) -> Result<String, SumiError> {
        match self {
            Self::Literal(uri) => Ok(uri.clone()),
            Self::Deferred(resolve) => resolve()
                .await
                .map_err(|e| SumiError::Resolve(e.to_string())),
        }
    }
}

impl fmt::Debug for UriSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(uri) => f.debug_tuple("Literal").field(uri).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for UriSource {
    fn from(uri: &str) -> Self {
        Self::Literal(uri.to_string())
    }
}

impl From<String> for UriSource {
    fn from(uri: String) -> Self {
        Self::Literal(uri)
    }
}

/// Per-task overrides; unset fields fall back to the crawler defaults
#[derive(Clone, Default)]
pub struct TaskOptions {
    pub uri: Option<UriSource>,
    pub html: Option<String>,
    pub method: Option<Method>,
    pub parser: Option<ParserKind>,
    pub priority: Option<u32>,
    pub retries: Option<u32>,
    pub retry_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
    pub cache: Option<CacheSetting>,
    pub skip_duplicates: Option<bool>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub callback: Option<Callback>,
    /// Set by the sitemap walker on the sitemap's own fetch
    pub(crate) sitemap: bool,
}

impl TaskOptions {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(UriSource::Literal(uri.into())),
            ..Self::default()
        }
    }

    /// A task whose URI is computed by `resolve` before admission
    pub fn deferred<F, Fut>(resolve: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ResolveError>> + Send + 'static,
    {
        Self {
            uri: Some(UriSource::deferred(resolve)),
            ..Self::default()
        }
    }

    /// A task that skips the transport and treats `html` as the fetched body
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn parser(mut self, parser: ParserKind) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_timeout(mut self, delay: Duration) -> Self {
        self.retry_timeout = Some(delay);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache(mut self, cache: impl Into<CacheSetting>) -> Self {
        self.cache = Some(cache.into());
        self
    }

    pub fn skip_duplicates(mut self, skip: bool) -> Self {
        self.skip_duplicates = Some(skip);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(CrawlOutcome<'_>) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Shares an existing callback, e.g. across sitemap children
    pub fn shared_callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub(crate) fn sitemap(mut self) -> Self {
        self.sitemap = true;
        self
    }
}

impl fmt::Debug for TaskOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskOptions")
            .field("uri", &self.uri)
            .field("html", &self.html.as_ref().map(String::len))
            .field("method", &self.method)
            .field("parser", &self.parser)
            .field("priority", &self.priority)
            .field("retries", &self.retries)
            .field("cache", &self.cache)
            .field("skip_duplicates", &self.skip_duplicates)
            .finish_non_exhaustive()
    }
}

/// A fully-specified unit of crawl work
#[derive(Clone)]
pub struct Task {
    /// Replaced by the resolved literal once a deferred URI is resolved
    pub uri: Option<UriSource>,
    pub html: Option<String>,
    pub method: Method,
    pub parser: ParserKind,
    pub priority: u32,
    pub retries: u32,
    pub retry_timeout: Duration,
    pub timeout: Duration,
    pub cache: CacheSetting,
    pub skip_duplicates: bool,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub callback: Option<Callback>,
    pub(crate) sitemap: bool,
}

impl Task {
    /// Overlays task options on the crawler defaults; task fields win
    pub fn from_options(defaults: &CrawlerConfig, options: TaskOptions) -> Self {
        Self {
            uri: options.uri,
            html: options.html,
            method: options.method.unwrap_or(defaults.method),
            parser: options
                .parser
                .or(defaults.parser)
                .unwrap_or(ParserKind::None),
            priority: options.priority.unwrap_or(defaults.priority),
            retries: options.retries.unwrap_or(defaults.retries),
            retry_timeout: options
                .retry_timeout
                .unwrap_or_else(|| defaults.retry_timeout_duration()),
            timeout: options
                .timeout
                .unwrap_or_else(|| defaults.timeout_duration()),
            cache: options.cache.unwrap_or(defaults.cache),
            skip_duplicates: options.skip_duplicates.unwrap_or(defaults.skip_duplicates),
            headers: options.headers,
            body: options.body,
            callback: options.callback,
            sitemap: options.sitemap,
        }
    }

    /// The literal URI, if known (always set for admitted URI tasks)
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_ref().and_then(UriSource::as_literal)
    }

    /// Resolves the URI source; a task with neither URI nor body is invalid
    pub(crate) async fn resolve_uri(&self) -> Result<String, SumiError> {
        match &self.uri {
            Some(source) => source.resolve().await,
            None => Err(SumiError::Config(ConfigError::Validation(
                "task has neither a uri nor an html body".to_string(),
            ))),
        }
    }

    pub(crate) fn fetch_request(&self, uri: &str) -> FetchRequest {
        FetchRequest {
            uri: uri.to_string(),
            method: self.method,
            timeout: self.timeout,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    /// Display label for logs
    pub fn label(&self) -> &str {
        match (&self.html, self.uri()) {
            (Some(_), _) => "<literal html>",
            (None, Some(uri)) => uri,
            (None, None) => "<deferred uri>",
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("uri", &self.uri)
            .field("method", &self.method)
            .field("parser", &self.parser)
            .field("priority", &self.priority)
            .field("retries", &self.retries)
            .field("cache", &self.cache)
            .field("skip_duplicates", &self.skip_duplicates)
            .finish_non_exhaustive()
    }
}

/// Terminal outcome handed to a task's callback
pub enum CrawlOutcome<'a> {
    /// Transport failure after all retries, parse failure, or resolve failure
    Failed(SumiError),
    /// No parser configured, or the method returns no body
    Fetched(Response),
    /// `dom-parser` result: the response plus a selector query handle
    Dom {
        response: Response,
        query: &'a DomQuery,
        task: &'a Task,
    },
    /// `xml-parser` / `html-parser` result
    Document { document: Document, task: &'a Task },
}

impl CrawlOutcome<'_> {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&SumiError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// The response, when the outcome carries one
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Fetched(response) | Self::Dom { response, .. } => Some(response),
            _ => None,
        }
    }
}

impl fmt::Debug for CrawlOutcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            Self::Fetched(response) => f.debug_tuple("Fetched").field(response).finish(),
            Self::Dom { response, .. } => f.debug_struct("Dom").field("response", response).finish(),
            Self::Document { document, .. } => f
                .debug_struct("Document")
                .field("elements", &document.element_count())
                .finish(),
        }
    }
}

/// Anything [`Crawler::enqueue`](crate::crawler::Crawler::enqueue) accepts
#[derive(Debug, Clone)]
pub enum Enqueue {
    /// GET at the default priority
    Uri(String),
    Task(TaskOptions),
    /// Expanded into independent enqueues, in order
    Batch(Vec<Enqueue>),
}

impl From<&str> for Enqueue {
    fn from(uri: &str) -> Self {
        Self::Uri(uri.to_string())
    }
}

impl From<String> for Enqueue {
    fn from(uri: String) -> Self {
        Self::Uri(uri)
    }
}

impl From<TaskOptions> for Enqueue {
    fn from(options: TaskOptions) -> Self {
        Self::Task(options)
    }
}

impl<T: Into<Enqueue>> From<Vec<T>> for Enqueue {
    fn from(items: Vec<T>) -> Self {
        Self::Batch(items.into_iter().map(Into::into).collect())
    }
}
