//! Strict XML parsing with quick-xml

use super::{Document, NodeId};
use crate::ParseError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parses an XML body into a [`Document`]
///
/// Element and attribute names are stored without their namespace prefix,
/// so a default-namespaced sitemap is queried as plain `//url`.
pub(super) fn parse(body: &str) -> Result<Document, ParseError> {
    if body.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut doc = Document::new();
    let mut open: Vec<NodeId> = vec![doc.root_id()];

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| ParseError::Xml {
            position,
            message: e.to_string(),
        })?;

        let parent = *open.last().unwrap_or(&doc.root_id());
        match event {
            Event::Start(start) => {
                let (name, attrs) = element_parts(&start, position)?;
                let id = doc.append_element(parent, name, attrs);
                open.push(id);
            }
            Event::Empty(start) => {
                let (name, attrs) = element_parts(&start, position)?;
                doc.append_element(parent, name, attrs);
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| ParseError::Xml {
                    position,
                    message: e.to_string(),
                })?;
                if parent == doc.root_id() {
                    return Err(ParseError::Xml {
                        position,
                        message: "text outside of the root element".to_string(),
                    });
                }
                doc.append_text(parent, &text);
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                doc.append_text(parent, &String::from_utf8_lossy(&raw));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if open.len() > 1 {
        return Err(ParseError::Xml {
            position: body.len(),
            message: "unexpected end of document: unclosed element".to_string(),
        });
    }

    if doc.root_element().is_none() {
        return Err(ParseError::Xml {
            position: body.len(),
            message: "no root element".to_string(),
        });
    }

    Ok(doc)
}

fn element_parts(
    start: &BytesStart<'_>,
    position: usize,
) -> Result<(String, Vec<(String, String)>), ParseError> {
    let xml_error = |message: String| ParseError::Xml { position, message };

    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }

    Ok((name, attrs))
}
