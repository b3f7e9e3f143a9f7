//! Crawler module for scheduling and running fetches
//!
//! This module contains the core crawling logic, including:
//! - The transport boundary and its reqwest implementation
//! - Priority admission through a bounded pool
//! - Retry handling and the response cache
//! - Task descriptors, the scheduler and the sitemap walker

pub mod cache;
pub mod fetcher;
pub mod pool;
pub mod retry;
mod scheduler;
mod sitemap;
mod task;

pub use cache::{should_use_cache, ResponseCache};
pub use fetcher::{BoxFut, FetchRequest, HttpTransport, Response, Transport};
pub use pool::{ConcurrencyPool, PoolSlot};
pub use retry::{RetryController, RetryState};
pub use scheduler::Crawler;
pub use sitemap::{sitemap_query, SitemapOptions};
pub use task::{Callback, CrawlOutcome, Enqueue, ResolveError, Task, TaskOptions, UriSource};
