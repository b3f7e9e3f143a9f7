//! Scheduler behavior against an in-memory transport
//!
//! Covers admission bounds and ordering, the retry budget, cache replay,
//! duplicate suppression, and the single-callback guarantee.

use crate::support::{Recorder, ScriptedTransport, Seen, Wire};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_fetch::crawler::ResolveError;
use sumi_fetch::{
    CrawlOutcome, Crawler, CrawlerConfig, Method, ParserKind, SitemapOptions, SumiError, TaskOptions,
};

fn config(parser: ParserKind) -> CrawlerConfig {
    let mut config = CrawlerConfig::new(parser);
    config.retry_timeout = 0.0;
    config
}

fn crawler(config: CrawlerConfig, transport: ScriptedTransport) -> (Crawler, Wire) {
    let wire = Wire(Arc::new(transport));
    let crawler = Crawler::new(config, wire.clone()).unwrap();
    (crawler, wire)
}

#[tokio::test]
async fn test_concurrency_never_exceeds_max_connections() {
    let mut config = config(ParserKind::None);
    config.max_connections = 2;
    let (crawler, wire) = crawler(
        config,
        ScriptedTransport::with_delay(Duration::from_millis(20)),
    );

    let uris: Vec<String> = (0..10).map(|i| format!("http://site/{}", i)).collect();
    crawler.enqueue(uris);
    crawler.wait_idle().await;

    assert_eq!(wire.calls().len(), 10);
    assert_eq!(wire.max_in_flight(), 2);
    assert_eq!(crawler.active(), 0);
}

#[tokio::test]
async fn test_higher_priority_admitted_first() {
    let mut config = config(ParserKind::None);
    config.max_connections = 1;
    let (crawler, wire) = crawler(
        config,
        ScriptedTransport::with_delay(Duration::from_millis(30)),
    );

    crawler.enqueue("http://site/blocker");
    tokio::time::sleep(Duration::from_millis(10)).await;
    for priority in [1, 9, 5] {
        crawler.enqueue(TaskOptions::new(format!("http://site/p{}", priority)).priority(priority));
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(crawler.waiting(), 3);

    crawler.wait_idle().await;
    assert_eq!(
        wire.calls(),
        vec![
            "http://site/blocker",
            "http://site/p9",
            "http://site/p5",
            "http://site/p1"
        ]
    );
}

#[tokio::test]
async fn test_retry_budget_bounds_attempts() {
    let mut config = config(ParserKind::None);
    config.retries = 3;
    let (crawler, wire) = crawler(
        config,
        ScriptedTransport::new().fail_times("http://site/down", 10),
    );
    let recorder = Recorder::new();

    crawler.enqueue(TaskOptions::new("http://site/down").callback(recorder.callback()));
    crawler.wait_idle().await;

    assert_eq!(wire.call_count("http://site/down"), 4);
    assert_eq!(recorder.len(), 1);
    assert!(matches!(recorder.seen()[0], Seen::Failed(_)));

    let stats = crawler.statistics();
    assert_eq!(stats.retries, 3);
    assert_eq!(stats.failures, 1);
}

#[tokio::test]
async fn test_cache_replays_first_body() {
    let mut config = config(ParserKind::None);
    config.cache = true.into();
    let (crawler, wire) = crawler(
        config,
        ScriptedTransport::new()
            .respond("http://site/a", "first")
            .respond("http://site/a", "second"),
    );
    let recorder = Recorder::new();

    crawler.enqueue(TaskOptions::new("http://site/a").callback(recorder.callback()));
    crawler.wait_idle().await;
    crawler.enqueue(TaskOptions::new("http://site/a").callback(recorder.callback()));
    crawler.wait_idle().await;

    assert_eq!(wire.call_count("http://site/a"), 1);
    assert_eq!(
        recorder.seen(),
        vec![
            Seen::Fetched {
                content: "first".to_string(),
                from_cache: false
            },
            Seen::Fetched {
                content: "first".to_string(),
                from_cache: true
            },
        ]
    );
    assert_eq!(crawler.statistics().cache_hits, 1);
}

#[tokio::test]
async fn test_concurrent_cached_requests_share_one_fetch() {
    let mut config = config(ParserKind::None);
    config.cache = true.into();
    let (crawler, wire) = crawler(
        config,
        ScriptedTransport::with_delay(Duration::from_millis(20))
            .respond("http://site/a", "first")
            .respond("http://site/a", "second"),
    );
    let recorder = Recorder::new();

    for _ in 0..3 {
        crawler.enqueue(TaskOptions::new("http://site/a").callback(recorder.callback()));
    }
    crawler.wait_idle().await;

    assert_eq!(wire.call_count("http://site/a"), 1);
    let seen = recorder.seen();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|entry| matches!(
        entry,
        Seen::Fetched { content, .. } if content == "first"
    )));
}

#[tokio::test]
async fn test_skip_duplicates_invokes_callback_once() {
    let (crawler, wire) = crawler(config(ParserKind::None), ScriptedTransport::new());
    let recorder = Recorder::new();

    crawler.enqueue(
        TaskOptions::new("http://site/a")
            .skip_duplicates(true)
            .callback(recorder.callback()),
    );
    crawler.wait_idle().await;
    crawler.enqueue(
        TaskOptions::new("http://site/a")
            .skip_duplicates(true)
            .callback(recorder.callback()),
    );
    crawler.wait_idle().await;

    assert_eq!(recorder.len(), 1);
    assert_eq!(wire.call_count("http://site/a"), 1);
    assert_eq!(crawler.statistics().duplicates, 1);
}

#[tokio::test]
async fn test_concurrent_duplicates_are_dropped() {
    let (crawler, wire) = crawler(
        config(ParserKind::None),
        ScriptedTransport::with_delay(Duration::from_millis(20)),
    );
    let recorder = Recorder::new();

    for _ in 0..4 {
        crawler.enqueue(
            TaskOptions::new("http://site/a")
                .skip_duplicates(true)
                .callback(recorder.callback()),
        );
    }
    crawler.wait_idle().await;

    assert_eq!(recorder.len(), 1);
    assert_eq!(wire.call_count("http://site/a"), 1);
}

#[tokio::test]
async fn test_duplicate_of_failed_fetch_is_fetched() {
    let mut config = config(ParserKind::None);
    config.retries = 0;
    let (crawler, wire) = crawler(
        config,
        ScriptedTransport::with_delay(Duration::from_millis(20)).fail("http://site/a"),
    );
    let recorder = Recorder::new();

    for _ in 0..2 {
        crawler.enqueue(
            TaskOptions::new("http://site/a")
                .skip_duplicates(true)
                .callback(recorder.callback()),
        );
    }
    crawler.wait_idle().await;

    let seen = recorder.seen();
    assert_eq!(seen.len(), 2);
    assert!(matches!(&seen[0], Seen::Failed(message) if message.contains("http://site/a")));
    assert!(matches!(&seen[1], Seen::Fetched { from_cache: false, .. }));
    assert_eq!(wire.call_count("http://site/a"), 2);
    assert!(crawler.cache().contains("http://site/a"));
    assert_eq!(crawler.statistics().duplicates, 0);
}

#[tokio::test]
async fn test_sitemap_locs_are_queued_verbatim() {
    let sitemap = "<urlset>\
        <url><loc>HTTP://Example.COM:80/a b</loc></url>\
        <url><loc>http://x</loc></url>\
        <url><loc>/rel</loc></url>\
        </urlset>";
    let (crawler, wire) = crawler(
        config(ParserKind::None),
        ScriptedTransport::new().respond("http://site/sitemap.xml", sitemap),
    );
    let recorder = Recorder::new();

    crawler.enqueue_sitemap(SitemapOptions::new("http://site/sitemap.xml").callback(recorder.callback()));
    crawler.wait_idle().await;

    let mut calls = wire.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            "HTTP://Example.COM:80/a b",
            "http://site/rel",
            "http://site/sitemap.xml",
            "http://x",
        ]
    );
    assert_eq!(recorder.len(), 3);

    let stats = crawler.statistics();
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.sitemaps, 1);
}

#[tokio::test]
async fn test_post_is_never_cached() {
    let mut config = config(ParserKind::None);
    config.cache = true.into();
    let (crawler, wire) = crawler(config, ScriptedTransport::new());

    for _ in 0..2 {
        crawler.enqueue(TaskOptions::new("http://site/form").method(Method::Post));
        crawler.wait_idle().await;
    }

    assert_eq!(wire.call_count("http://site/form"), 2);
    assert!(crawler.cache().is_empty());
}

#[tokio::test]
async fn test_each_task_gets_exactly_one_callback() {
    let mut config = config(ParserKind::None);
    config.max_connections = 3;
    config.retries = 1;
    let mut transport = ScriptedTransport::with_delay(Duration::from_millis(2));
    for i in (0..20).filter(|i| i % 3 == 0) {
        transport = transport.fail_times(&format!("http://site/{}", i), 2);
    }
    let (crawler, _) = crawler(config, transport);

    let counts = Arc::new(Mutex::new(vec![0u32; 20]));
    for i in 0..20 {
        let counts = Arc::clone(&counts);
        crawler.enqueue(
            TaskOptions::new(format!("http://site/{}", i))
                .callback(move |_| counts.lock().unwrap()[i] += 1),
        );
    }
    crawler.wait_idle().await;

    assert!(counts.lock().unwrap().iter().all(|count| *count == 1));
    let stats = crawler.statistics();
    assert_eq!(stats.failures, 7);
    assert_eq!(stats.delivered, 13);
}

#[tokio::test]
async fn test_retry_then_parse_as_html() {
    let mut config = config(ParserKind::Html);
    config.max_connections = 1;
    config.retries = 1;
    let (crawler, wire) = crawler(
        config,
        ScriptedTransport::new()
            .fail("http://site/page")
            .respond("http://site/page", "<p>hi</p>"),
    );
    let recorder = Recorder::new();

    crawler.enqueue(TaskOptions::new("http://site/page").callback(recorder.callback()));
    crawler.wait_idle().await;

    assert_eq!(wire.call_count("http://site/page"), 2);
    assert_eq!(
        recorder.seen(),
        vec![Seen::Document {
            uri: "http://site/page".to_string(),
            text: "hi".to_string()
        }]
    );
}

#[tokio::test]
async fn test_deferred_resolution_failure_is_not_retried() {
    let mut config = config(ParserKind::None);
    config.retries = 5;
    let (crawler, wire) = crawler(config, ScriptedTransport::new());

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    crawler.enqueue(
        TaskOptions::deferred(|| async { Err::<String, ResolveError>("no such host".into()) }).callback(
            move |outcome| {
                if let CrawlOutcome::Failed(error) = outcome {
                    sink.lock().unwrap().push(error);
                }
            },
        ),
    );
    crawler.wait_idle().await;

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], SumiError::Resolve(message) if message == "no such host"));
    assert!(!errors[0].is_retryable());
    assert!(wire.calls().is_empty());
}

#[tokio::test]
async fn test_dom_parser_with_cached_replay() {
    let mut config = config(ParserKind::Dom);
    config.cache = true.into();
    let (crawler, _) = crawler(
        config,
        ScriptedTransport::new().respond(
            "http://site/doc",
            "<html><head><title>Cached</title></head></html>",
        ),
    );
    let recorder = Recorder::new();

    for _ in 0..2 {
        crawler.enqueue(TaskOptions::new("http://site/doc").callback(recorder.callback()));
        crawler.wait_idle().await;
    }

    assert_eq!(
        recorder.seen(),
        vec![
            Seen::Dom(Some("Cached".to_string())),
            Seen::Dom(Some("Cached".to_string()))
        ]
    );
}
