//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the
//! reqwest transport, the parsers and the sitemap walker end-to-end.

use crate::support::{Recorder, Seen};
use std::io::Write;
use sumi_fetch::config::load_config;
use sumi_fetch::{Crawler, CrawlerConfig, ParserKind, SitemapOptions, TaskOptions};
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(parser: ParserKind) -> CrawlerConfig {
    let mut config = CrawlerConfig::new(parser);
    config.retry_timeout = 0.0;
    config.timeout = 5.0;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_dom_parser_over_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            "<html><head><title>Home</title></head><body><a href=\"/a\">A</a></body></html>",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let crawler = Crawler::with_http(config(ParserKind::Dom)).unwrap();
    let recorder = Recorder::new();
    crawler.enqueue(TaskOptions::new(format!("{}/", mock_server.uri())).callback(recorder.callback()));
    crawler.wait_idle().await;

    assert_eq!(recorder.seen(), vec![Seen::Dom(Some("Home".to_string()))]);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html("<p>recovered</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = config(ParserKind::Html);
    config.retries = 1;
    let crawler = Crawler::with_http(config).unwrap();
    let recorder = Recorder::new();
    let uri = format!("{}/flaky", mock_server.uri());
    crawler.enqueue(TaskOptions::new(uri.as_str()).callback(recorder.callback()));
    crawler.wait_idle().await;

    assert_eq!(
        recorder.seen(),
        vec![Seen::Document {
            uri,
            text: "recovered".to_string()
        }]
    );
    assert_eq!(crawler.statistics().retries, 1);
}

#[tokio::test]
async fn test_client_error_is_delivered_as_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = config(ParserKind::None);
    config.retries = 3;
    let crawler = Crawler::with_http(config).unwrap();
    let statuses = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&statuses);
    crawler.enqueue(
        TaskOptions::new(format!("{}/missing", mock_server.uri())).callback(move |outcome| {
            if let Some(response) = outcome.response() {
                sink.lock().unwrap().push(response.status);
            }
        }),
    );
    crawler.wait_idle().await;

    assert_eq!(*statuses.lock().unwrap(), vec![404]);
}

#[tokio::test]
async fn test_headers_are_forwarded() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("x-token", "secret"))
        .respond_with(html("<p>ok</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let crawler = Crawler::with_http(config(ParserKind::Html)).unwrap();
    let recorder = Recorder::new();
    crawler.enqueue(
        TaskOptions::new(format!("{}/private", mock_server.uri()))
            .header("x-token", "secret")
            .callback(recorder.callback()),
    );
    crawler.wait_idle().await;

    assert!(matches!(&recorder.seen()[0], Seen::Document { text, .. } if text == "ok"));
}

#[tokio::test]
async fn test_sitemap_filters_by_priority() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>{}/high</loc><priority>10</priority></url>
          <url><loc>/mid</loc><priority>5</priority></url>
          <url><loc>{}/low</loc><priority>1</priority></url>
        </urlset>"#,
        base_url, base_url
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sitemap)
                .insert_header("content-type", "application/xml"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/high"))
        .respond_with(html("<p>high</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mid"))
        .respond_with(html("<p>mid</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/low"))
        .respond_with(html("<p>low</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let crawler = Crawler::with_http(config(ParserKind::None)).unwrap();
    let recorder = Recorder::new();
    crawler.enqueue_sitemap(
        SitemapOptions::new(format!("{}/sitemap.xml", base_url))
            .min_priority(5.0)
            .callback(recorder.callback()),
    );
    crawler.wait_idle().await;

    let mut seen = recorder.seen();
    seen.sort_by_key(|entry| format!("{:?}", entry));
    assert_eq!(
        seen,
        vec![
            Seen::Document {
                uri: format!("{}/high", base_url),
                text: "high".to_string()
            },
            Seen::Document {
                uri: format!("{}/mid", base_url),
                text: "mid".to_string()
            },
        ]
    );
    let stats = crawler.statistics();
    assert_eq!(stats.enqueued, 3);
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.sitemaps, 1);
}

#[tokio::test]
async fn test_sitemap_max_urls() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let entries: String = (0..5)
        .map(|i| format!("<url><loc>{}/page/{}</loc></url>", base_url, i))
        .collect();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("<urlset>{}</urlset>", entries)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/page/"))
        .respond_with(html("<p>page</p>"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let crawler = Crawler::with_http(config(ParserKind::None)).unwrap();
    let recorder = Recorder::new();
    crawler.enqueue_sitemap(
        SitemapOptions::new(format!("{}/sitemap.xml", base_url))
            .max_urls(2)
            .callback(recorder.callback()),
    );
    crawler.wait_idle().await;

    assert_eq!(recorder.len(), 2);
}

#[tokio::test]
async fn test_sitemap_failure_reaches_callback() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = config(ParserKind::None);
    config.retries = 0;
    let crawler = Crawler::with_http(config).unwrap();
    let recorder = Recorder::new();
    crawler.enqueue_sitemap(
        SitemapOptions::new(format!("{}/sitemap.xml", mock_server.uri()))
            .callback(recorder.callback()),
    );
    crawler.wait_idle().await;

    let seen = recorder.seen();
    assert_eq!(seen.len(), 1);
    assert!(matches!(&seen[0], Seen::Failed(message) if message.contains("500")));
}

#[tokio::test]
async fn test_crawl_from_config_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seed"))
        .respond_with(html("<html><body><p>seeded</p></body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
seeds = ["{}/seed"]

[crawler]
parser = "html-parser"
retries = 0
max-connections = 2
"#,
        mock_server.uri()
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    let crawler = Crawler::with_http(config.crawler.clone()).unwrap();
    let recorder = Recorder::new();
    for seed in &config.seeds {
        crawler.enqueue(TaskOptions::new(seed.as_str()).callback(recorder.callback()));
    }
    crawler.wait_idle().await;

    assert!(matches!(&recorder.seen()[0], Seen::Document { text, .. } if text == "seeded"));
    assert_eq!(crawler.config().max_connections, 2);
}
