//! Fetch scheduler
//!
//! This module handles:
//! - Accepting URIs, task options and batches through [`Crawler::enqueue`]
//! - Priority admission through the concurrency pool
//! - Cache reads and writes, duplicate suppression
//! - Retried transport calls
//! - Routing each terminal outcome through the configured parser to the callback
//!
//! Every enqueued task runs as its own tokio task and ends in exactly one of:
//! a success callback, a failure callback, or a silent duplicate drop.

use crate::config::{validate_crawler_config, CrawlerConfig, ParserKind};
use crate::crawler::cache::{should_use_cache, Lookup, ResponseCache};
use crate::crawler::fetcher::{HttpTransport, Response, Transport};
use crate::crawler::pool::ConcurrencyPool;
use crate::crawler::retry::{fetch_with_retries, RetryController};
use crate::crawler::task::{CrawlOutcome, Enqueue, Task, TaskOptions, UriSource};
use crate::document::{Document, DomQuery};
use crate::output::{CrawlCounters, CrawlStatistics};
use crate::{ConfigError, ParseError, SumiError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// Handle to a running crawl; cheap to clone
#[derive(Clone)]
pub struct Crawler {
    shared: Arc<Shared>,
}

struct Shared {
    config: CrawlerConfig,
    pool: ConcurrencyPool,
    cache: Arc<ResponseCache>,
    transport: Arc<dyn Transport>,
    counters: CrawlCounters,
    started_at: DateTime<Utc>,
    /// Tasks enqueued but not yet terminal
    outstanding: watch::Sender<usize>,
}

/// Counts a task as outstanding until it is dropped
struct Outstanding {
    shared: Arc<Shared>,
}

impl Outstanding {
    fn new(shared: &Arc<Shared>) -> Self {
        shared.outstanding.send_modify(|count| *count += 1);
        Self {
            shared: Arc::clone(shared),
        }
    }
}

impl Drop for Outstanding {
    fn drop(&mut self) {
        self.shared
            .outstanding
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

impl Crawler {
    /// Creates a crawler fetching through `transport`
    ///
    /// The configuration is validated first: a missing or unavailable parser
    /// and out-of-range numeric settings are rejected here, before any task
    /// can run.
    pub fn new<T: Transport>(config: CrawlerConfig, transport: T) -> Result<Self, ConfigError> {
        Self::from_transport(config, Arc::new(transport))
    }

    /// Creates a crawler with the reqwest transport
    pub fn with_http(config: CrawlerConfig) -> Result<Self, ConfigError> {
        validate_crawler_config(&config)?;
        let transport = HttpTransport::new(&config)?;
        Self::new(config, transport)
    }

    pub fn from_transport(
        mut config: CrawlerConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let parser = validate_crawler_config(&config)?;
        config.parser = Some(parser);

        tracing::debug!(
            "Crawler ready: parser={}, max-connections={}, priority-range={}",
            parser,
            config.max_connections,
            config.priority_range
        );

        let (outstanding, _) = watch::channel(0);
        Ok(Self {
            shared: Arc::new(Shared {
                pool: ConcurrencyPool::new(config.max_connections, config.priority_range),
                config,
                cache: Arc::new(ResponseCache::new()),
                transport,
                counters: CrawlCounters::new(),
                started_at: Utc::now(),
                outstanding,
            }),
        })
    }

    /// Queues a URI, task options, or a batch of either
    ///
    /// Each task is spawned onto the current tokio runtime and runs
    /// independently; batches are expanded in order.
    pub fn enqueue(&self, item: impl Into<Enqueue>) {
        match item.into() {
            Enqueue::Uri(uri) => self.spawn(TaskOptions::new(uri)),
            Enqueue::Task(options) => self.spawn(options),
            Enqueue::Batch(items) => {
                for item in items {
                    self.enqueue(item);
                }
            }
        }
    }

    fn spawn(&self, options: TaskOptions) {
        let task = Task::from_options(&self.shared.config, options);
        tracing::trace!("Queued {} at priority {}", task.label(), task.priority);

        self.shared.counters.record_enqueued();
        let outstanding = Outstanding::new(&self.shared);
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            run_task(&shared, task).await;
            drop(outstanding);
        });
    }

    /// Resolves once every enqueued task, including tasks enqueued by
    /// callbacks, has reached a terminal outcome
    pub async fn wait_idle(&self) {
        let mut outstanding = self.shared.outstanding.subscribe();
        // The sender lives in `shared`, so the channel cannot close here
        let _ = outstanding.wait_for(|count| *count == 0).await;
    }

    /// Tasks enqueued but not yet terminal
    pub fn outstanding(&self) -> usize {
        *self.shared.outstanding.borrow()
    }

    pub fn statistics(&self) -> CrawlStatistics {
        self.shared.counters.snapshot(self.shared.started_at)
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.shared.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.shared.cache
    }

    /// Tasks currently holding a pool slot
    pub fn active(&self) -> usize {
        self.shared.pool.active()
    }

    /// Tasks waiting for admission
    pub fn waiting(&self) -> usize {
        self.shared.pool.waiting()
    }
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("config", &self.shared.config)
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}

async fn run_task(shared: &Shared, mut task: Task) {
    if let Some(html) = task.html.take() {
        let _slot = shared.pool.acquire(task.priority).await;
        deliver(shared, &task, Ok(Response::literal(html)));
        return;
    }

    // Resolution failures are terminal and never retried
    let uri = match task.resolve_uri().await {
        Ok(uri) => uri,
        Err(error) => {
            deliver(shared, &task, Err(error));
            return;
        }
    };
    task.uri = Some(UriSource::Literal(uri.clone()));

    let _slot = shared.pool.acquire(task.priority).await;

    let claim = if should_use_cache(&task) {
        match shared.cache.lookup(&uri, task.skip_duplicates).await {
            Lookup::Hit(response) => {
                tracing::debug!("Cache hit for {}", uri);
                shared.counters.record_cache_hit();
                deliver(shared, &task, Ok(response));
                return;
            }
            Lookup::Duplicate => {
                tracing::debug!("Skipping duplicate {}", uri);
                shared.counters.record_duplicate();
                return;
            }
            Lookup::Claimed(claim) => Some(claim),
        }
    } else {
        None
    };

    let request = task.fetch_request(&uri);
    let transport = shared.transport.as_ref();
    let mut retry = RetryController::new(task.retries, task.retry_timeout);
    let result = fetch_with_retries(&mut retry, &uri, || transport.fetch(&request)).await;
    shared
        .counters
        .record_retries(u64::from(retry.attempts().saturating_sub(1)));

    // A failed fetch drops the claim so a waiting task can try its own
    if let (Ok(response), Some(claim)) = (&result, claim) {
        claim.fulfil(response);
    }
    if result.is_ok() {
        shared.counters.record_fetched();
    }

    deliver(shared, &task, result.map_err(SumiError::from));
}

/// Turns a terminal result into the callback's outcome
///
/// Runs synchronously: the DOM handle is not `Send` and must not be held
/// across an await.
fn deliver(shared: &Shared, task: &Task, result: Result<Response, SumiError>) {
    let response = match result {
        Ok(response) => response,
        Err(error) => {
            tracing::debug!("Task {} failed: {}", task.label(), error);
            finish(shared, task, CrawlOutcome::Failed(error));
            return;
        }
    };

    if task.parser == ParserKind::None || !task.method.returns_body() {
        finish(shared, task, CrawlOutcome::Fetched(response));
        return;
    }

    match task.parser {
        ParserKind::Dom => match DomQuery::parse(&response.content) {
            Ok(query) => finish(
                shared,
                task,
                CrawlOutcome::Dom {
                    response,
                    query: &query,
                    task,
                },
            ),
            Err(error) => parse_failed(shared, task, error),
        },
        ParserKind::Xml => parsed(shared, task, Document::parse_xml(&response.content)),
        ParserKind::Html => parsed(shared, task, Document::parse_html(&response.content)),
        ParserKind::None => finish(shared, task, CrawlOutcome::Fetched(response)),
    }
}

fn parsed(shared: &Shared, task: &Task, document: Result<Document, ParseError>) {
    match document {
        Ok(document) => finish(shared, task, CrawlOutcome::Document { document, task }),
        Err(error) => parse_failed(shared, task, error),
    }
}

fn parse_failed(shared: &Shared, task: &Task, error: ParseError) {
    tracing::warn!(
        "Failed to parse {} as {}: {}",
        task.label(),
        task.parser,
        error
    );
    shared.counters.record_parse_failure();
    finish(shared, task, CrawlOutcome::Failed(error.into()));
}

fn finish(shared: &Shared, task: &Task, outcome: CrawlOutcome<'_>) {
    if outcome.is_failure() {
        shared.counters.record_failure();
    } else if task.sitemap {
        shared.counters.record_sitemap();
    } else {
        shared.counters.record_delivered();
    }

    if let Some(callback) = &task.callback {
        callback(outcome);
    }
}
