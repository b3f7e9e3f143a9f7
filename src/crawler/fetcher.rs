//! Transport boundary and the default HTTP implementation
//!
//! This module handles:
//! - The [`Transport`] trait the scheduler fetches through
//! - Building reqwest clients from crawler configuration
//! - Error classification (timeouts, connection failures, server errors)

use crate::config::{CrawlerConfig, Method};
use crate::{ConfigError, TransportError};
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// Boxed future type.
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const DEFAULT_USER_AGENT: &str = concat!("sumi-fetch/", env!("CARGO_PKG_VERSION"));

/// A single request handed to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub uri: String,
    pub method: Method,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn new(uri: impl Into<String>, method: Method) -> Self {
        Self {
            uri: uri.into(),
            method,
            timeout: Duration::from_secs(60),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Response metadata with the body attached as `content`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// Final URL after redirects (empty for literal bodies)
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content: String,
    /// Set when this response was replayed from the response cache
    pub from_cache: bool,
}

impl Response {
    /// Synthesized response for a task that supplied its own body
    pub fn literal(content: impl Into<String>) -> Self {
        Self {
            status: 200,
            content: content.into(),
            ..Self::default()
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Performs fetches on behalf of the scheduler
///
/// Implementations must complete every call exactly once and enforce the
/// request timeout themselves, reporting it as a [`TransportError`].
pub trait Transport: Send + Sync + 'static {
    fn fetch<'a>(&'a self, request: &'a FetchRequest)
        -> BoxFut<'a, Result<Response, TransportError>>;
}

impl TransportError {
    /// Whether a later attempt at the same request could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidUri { .. })
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport from the crawler defaults
    ///
    /// Uses the configured user agent (or `sumi-fetch/<version>`) and the
    /// configured timeout as the client-wide default; tasks can still
    /// override the timeout per request.
    pub fn new(config: &CrawlerConfig) -> Result<Self, ConfigError> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let timeout = config.timeout_duration();

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(ConfigError::Client)?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: &FetchRequest) -> Result<Response, TransportError> {
        let url = Url::parse(&request.uri).map_err(|e| TransportError::InvalidUri {
            url: request.uri.clone(),
            message: e.to_string(),
        })?;

        let mut builder = self
            .client
            .request(reqwest_method(request.method), url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(&request.uri, e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TransportError::Status {
                url: request.uri.clone(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let content = response
            .text()
            .await
            .map_err(|e| classify(&request.uri, e))?;

        Ok(Response {
            url: final_url,
            status: status.as_u16(),
            headers,
            content,
            from_cache: false,
        })
    }
}

impl Transport for HttpTransport {
    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFut<'a, Result<Response, TransportError>> {
        Box::pin(self.send(request))
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

/// Maps a reqwest failure onto the transport error taxonomy
fn classify(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
        }
    } else {
        TransportError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
