//! CSS-selector query handle for the `dom-parser` kind
//!
//! This module wraps a scraper tree and provides:
//! - Selector queries returning elements or their text
//! - Page title extraction

use crate::ParseError;
use scraper::{ElementRef, Html, Selector};

/// Query helper handed to `dom-parser` callbacks
pub struct DomQuery {
    html: Html,
}

impl std::fmt::Debug for DomQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomQuery").finish_non_exhaustive()
    }
}

impl DomQuery {
    /// Builds the tree for a response body
    pub fn parse(body: &str) -> Result<Self, ParseError> {
        if body.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(Self {
            html: Html::parse_document(body),
        })
    }

    /// The underlying scraper document
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Elements matching a CSS selector, in document order
    pub fn select(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, ParseError> {
        let compiled = compile(selector)?;
        Ok(self.html.select(&compiled).collect())
    }

    /// Trimmed text of each element matching a CSS selector
    pub fn select_text(&self, selector: &str) -> Result<Vec<String>, ParseError> {
        Ok(self
            .select(selector)?
            .into_iter()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .collect())
    }

    /// The page title (from the `<title>` tag)
    pub fn title(&self) -> Option<String> {
        self.select_text("title")
            .ok()?
            .into_iter()
            .next()
            .filter(|s| !s.is_empty())
    }
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}
