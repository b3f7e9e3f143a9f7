//! Shared helpers for the integration tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_fetch::crawler::{BoxFut, FetchRequest};
use sumi_fetch::{CrawlOutcome, Response, Transport, TransportError};

/// In-memory transport replaying a per-URI script
///
/// URIs without a script (or whose script ran out) answer 200 with a small
/// HTML page naming the URI.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Result<String, TransportError>>>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch takes at least `delay`
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn respond(self, uri: &str, body: &str) -> Self {
        self.push(uri, Ok(body.to_string()));
        self
    }

    pub fn fail(self, uri: &str) -> Self {
        self.push(
            uri,
            Err(TransportError::Connect {
                url: uri.to_string(),
            }),
        );
        self
    }

    pub fn fail_times(mut self, uri: &str, times: usize) -> Self {
        for _ in 0..times {
            self = self.fail(uri);
        }
        self
    }

    fn push(&self, uri: &str, result: Result<String, TransportError>) {
        self.script
            .lock()
            .unwrap()
            .entry(uri.to_string())
            .or_default()
            .push_back(result);
    }

    fn next(&self, uri: &str) -> Result<String, TransportError> {
        self.script
            .lock()
            .unwrap()
            .get_mut(uri)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(format!("<html><body><p>{}</p></body></html>", uri)))
    }
}

impl Transport for ScriptedTransport {
    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFut<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.uri.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let result = self.next(&request.uri);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            result.map(|content| Response {
                url: request.uri.clone(),
                status: 200,
                content,
                ..Response::default()
            })
        })
    }
}

/// Shared view of a [`ScriptedTransport`] after it moved into a crawler
#[derive(Clone)]
pub struct Wire(pub Arc<ScriptedTransport>);

impl Wire {
    pub fn calls(&self) -> Vec<String> {
        self.0.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, uri: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == uri).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.0.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Transport for Wire {
    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFut<'a, Result<Response, TransportError>> {
        self.0.fetch(request)
    }
}

/// What a callback saw, reduced to something comparable
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Failed(String),
    Fetched { content: String, from_cache: bool },
    Dom(Option<String>),
    Document { uri: String, text: String },
}

/// Collects every callback invocation
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn(CrawlOutcome<'_>) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |outcome: CrawlOutcome<'_>| {
            let entry = match outcome {
                CrawlOutcome::Failed(error) => Seen::Failed(error.to_string()),
                CrawlOutcome::Fetched(response) => Seen::Fetched {
                    content: response.content,
                    from_cache: response.from_cache,
                },
                CrawlOutcome::Dom { query, .. } => Seen::Dom(query.title()),
                CrawlOutcome::Document { document, task } => Seen::Document {
                    uri: task.label().to_string(),
                    text: document.text(),
                },
            };
            seen.lock().unwrap().push(entry);
        }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}
