use crate::config::types::{Config, CrawlerConfig, ParserKind, SitemapEntry};
use crate::ConfigError;
use std::time::Duration;
use url::Url;

/// Validates the entire configuration file
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_seeds(&config.seeds)?;
    validate_sitemaps(&config.sitemap)?;
    Ok(())
}

/// Validates crawler defaults
///
/// This runs before any crawler is constructed, so a misconfigured
/// instance can never accept tasks.
pub fn validate_crawler_config(config: &CrawlerConfig) -> Result<ParserKind, ConfigError> {
    let parser = config.parser.ok_or(ConfigError::MissingParser)?;

    if !parser.is_available() {
        return Err(ConfigError::ParserUnavailable(parser.as_str()));
    }

    if config.max_connections < 1 {
        return Err(ConfigError::Validation(format!(
            "max_connections must be >= 1, got {}",
            config.max_connections
        )));
    }

    if config.priority_range < 1 {
        return Err(ConfigError::Validation(format!(
            "priority_range must be >= 1, got {}",
            config.priority_range
        )));
    }

    if config.priority >= config.priority_range {
        return Err(ConfigError::Validation(format!(
            "priority must be below priority_range ({}), got {}",
            config.priority_range, config.priority
        )));
    }

    if config.timeout <= 0.0 || Duration::try_from_secs_f64(config.timeout).is_err() {
        return Err(ConfigError::Validation(format!(
            "timeout must be a positive number of seconds, got {}",
            config.timeout
        )));
    }

    validate_retry_timeout(config.retry_timeout)?;

    if let Some(user_agent) = &config.user_agent {
        if user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent cannot be empty".to_string(),
            ));
        }
    }

    Ok(parser)
}

/// Validates a retry delay, shared with per-task overrides
pub fn validate_retry_timeout(seconds: f64) -> Result<(), ConfigError> {
    if Duration::try_from_secs_f64(seconds).is_err() {
        return Err(ConfigError::Validation(format!(
            "retry_timeout must be a representable number of seconds >= 0, got {}",
            seconds
        )));
    }
    Ok(())
}

/// Validates seed URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        validate_http_url(seed)?;
    }
    Ok(())
}

/// Validates sitemap entries
fn validate_sitemaps(sitemaps: &[SitemapEntry]) -> Result<(), ConfigError> {
    for entry in sitemaps {
        validate_http_url(&entry.uri)?;

        if !entry.min_priority.is_finite() || entry.min_priority < 0.0 {
            return Err(ConfigError::Validation(format!(
                "Sitemap '{}' min_priority must be >= 0, got {}",
                entry.uri, entry.min_priority
            )));
        }

        if entry.max_urls == Some(0) {
            return Err(ConfigError::Validation(format!(
                "Sitemap '{}' max_urls must be >= 1",
                entry.uri
            )));
        }
    }
    Ok(())
}

fn validate_http_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::Validation(format!("Invalid URL '{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "URL '{}' must use the http or https scheme",
            raw
        )));
    }

    Ok(())
}
