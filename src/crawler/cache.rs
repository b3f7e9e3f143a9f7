//! Response cache keyed by resolved URI
//!
//! Only successful responses are stored. An identity that is being fetched
//! is *claimed*, and every other task for it waits on the claim. Once the
//! response is stored, caching tasks replay it and duplicate-suppressing
//! tasks are dropped; if the fetch failed, the next waiter claims it.
//! Entries live as long as the crawler.

use crate::crawler::fetcher::Response;
use crate::crawler::task::Task;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Whether a task may read or populate the cache
///
/// Caching or duplicate suppression must be requested, and only GET and HEAD
/// are ever cached.
pub fn should_use_cache(task: &Task) -> bool {
    (task.cache.is_enabled() || task.skip_duplicates) && task.method.is_read_safe()
}

enum Entry {
    /// Closed when the claim holder stores or abandons the entry
    Pending(watch::Receiver<()>),
    Ready(Response),
}

/// Result of a cache lookup made before fetching
#[derive(Debug)]
pub enum Lookup {
    /// A stored response, flagged `from_cache`
    Hit(Response),
    /// The identity is cached and the task suppresses duplicates
    Duplicate,
    /// Nothing stored: the caller owns the fetch for this identity
    Claimed(CacheClaim),
}

#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up `key`, claiming it when nothing is stored or in flight
    pub async fn lookup(self: &Arc<Self>, key: &str, skip_duplicates: bool) -> Lookup {
        loop {
            let mut in_flight = {
                let mut entries = self.lock();
                match entries.get(key) {
                    Some(Entry::Ready(_)) if skip_duplicates => return Lookup::Duplicate,
                    Some(Entry::Ready(response)) => {
                        let mut response = response.clone();
                        response.from_cache = true;
                        return Lookup::Hit(response);
                    }
                    Some(Entry::Pending(done)) => done.clone(),
                    None => {
                        let (done_tx, done_rx) = watch::channel(());
                        entries.insert(key.to_string(), Entry::Pending(done_rx));
                        return Lookup::Claimed(CacheClaim {
                            cache: Arc::clone(self),
                            key: key.to_string(),
                            _done: done_tx,
                        });
                    }
                }
            };

            tracing::trace!("Waiting for in-flight fetch of {}", key);
            // Never sent to; returns once the claim holder drops the sender
            let _ = in_flight.changed().await;
        }
    }

    /// Stored response for `key`, flagged `from_cache`
    pub fn get(&self, key: &str) -> Option<Response> {
        match self.lock().get(key) {
            Some(Entry::Ready(response)) => {
                let mut response = response.clone();
                response.from_cache = true;
                Some(response)
            }
            _ => None,
        }
    }

    /// Stores a response, replacing whatever was there
    pub fn insert(&self, key: impl Into<String>, mut response: Response) {
        response.from_cache = false;
        self.lock().insert(key.into(), Entry::Ready(response));
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.lock().get(key), Some(Entry::Ready(_)))
    }

    /// Number of stored responses
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| matches!(entry, Entry::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive right to fetch and store one identity
///
/// Dropping the claim without [`fulfil`](CacheClaim::fulfil) removes the
/// pending marker so a waiting task can try the fetch itself.
pub struct CacheClaim {
    cache: Arc<ResponseCache>,
    key: String,
    _done: watch::Sender<()>,
}

impl CacheClaim {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stores the fetched response under the claimed key
    pub fn fulfil(self, response: &Response) {
        self.cache.insert(self.key.clone(), response.clone());
    }
}

impl std::fmt::Debug for CacheClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClaim").field("key", &self.key).finish()
    }
}

impl Drop for CacheClaim {
    fn drop(&mut self) {
        let mut entries = self.cache.lock();
        if matches!(entries.get(&self.key), Some(Entry::Pending(_))) {
            entries.remove(&self.key);
        }
    }
}
