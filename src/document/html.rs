//! Lenient HTML parsing with scraper
//!
//! The html5ever tree built by scraper is copied into a [`Document`] so HTML
//! pages support the same path queries as XML documents.

use super::Document;
use crate::ParseError;
use scraper::{Html, Node as HtmlNode};

pub(super) fn parse(body: &str) -> Result<Document, ParseError> {
    if body.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let html = Html::parse_document(body);
    let mut doc = Document::new();

    // Pre-order walk keeps node ids in document order
    let mut stack = vec![(html.tree.root(), doc.root_id())];
    while let Some((node, parent)) = stack.pop() {
        let id = match node.value() {
            HtmlNode::Element(element) => {
                let attrs = element
                    .attrs()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect();
                doc.append_element(parent, element.name().to_string(), attrs)
            }
            HtmlNode::Text(text) => {
                doc.append_text(parent, text);
                continue;
            }
            HtmlNode::Document | HtmlNode::Fragment => parent,
            _ => continue,
        };

        let children: Vec<_> = node.children().collect();
        for child in children.into_iter().rev() {
            stack.push((child, id));
        }
    }

    Ok(doc)
}
