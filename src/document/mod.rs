//! Structured documents handed to crawl callbacks
//!
//! Three parser kinds are supported:
//! - `xml-parser`: strict XML, built with quick-xml into a [`Document`]
//! - `html-parser`: lenient HTML, built with scraper into a [`Document`]
//! - `dom-parser`: a CSS-selector query handle ([`DomQuery`]) over the HTML tree
//!
//! [`Document`] trees support path queries (`//url[priority>=0.5]/loc`),
//! child lookup and text extraction. See [`path`] for the query syntax.

mod dom;
mod html;
pub mod path;
#[cfg(feature = "xml")]
mod xml;

pub use dom::DomQuery;

use crate::ParseError;

pub(crate) type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone)]
enum NodeKind {
    Root,
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A parsed XML or HTML tree
///
/// Node ids are assigned in document order, which path queries rely on to
/// return results in the order they appear in the source.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Document {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Root,
            }],
        }
    }

    /// Parses a body with the strict XML parser
    pub fn parse_xml(body: &str) -> Result<Self, ParseError> {
        #[cfg(feature = "xml")]
        {
            xml::parse(body)
        }
        #[cfg(not(feature = "xml"))]
        {
            let _ = body;
            Err(ParseError::Unavailable("xml-parser"))
        }
    }

    /// Parses a body with the lenient HTML parser
    pub fn parse_html(body: &str) -> Result<Self, ParseError> {
        html::parse(body)
    }

    pub(crate) fn root_id(&self) -> NodeId {
        ROOT
    }

    pub(crate) fn append_element(
        &mut self,
        parent: NodeId,
        name: String,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        self.push(parent, NodeKind::Element { name, attrs })
    }

    /// Appends text, merging with a directly preceding text sibling
    pub(crate) fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.nodes[parent].children.last() {
            if let NodeKind::Text(existing) = &mut self.nodes[last].kind {
                existing.push_str(text);
                return;
            }
        }
        self.push(parent, NodeKind::Text(text.to_string()));
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// The document node, parent of the root element
    pub fn root(&self) -> Node<'_> {
        self.node(ROOT)
    }

    /// The outermost element, if the document has one
    pub fn root_element(&self) -> Option<Node<'_>> {
        self.root().elements().next()
    }

    /// Runs a path query from the document root
    pub fn find(&self, path: &str) -> Result<Vec<Node<'_>>, ParseError> {
        self.root().find(path)
    }

    /// Concatenated text content of the whole document
    pub fn text(&self) -> String {
        self.root().text()
    }

    /// Number of element nodes in the tree
    pub fn element_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Element { .. }))
            .count()
    }

    pub(crate) fn node(&self, id: NodeId) -> Node<'_> {
        Node { doc: self, id }
    }

    pub(crate) fn child_ids(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub(crate) fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// `id` followed by all of its descendants, in document order
    pub(crate) fn descendants_or_self(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev());
        }
        out
    }
}

/// A borrowed handle to one node of a [`Document`]
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    /// Element name, or `None` for text and the document node
    pub fn name(&self) -> Option<&'a str> {
        self.doc.element_name(self.id)
    }

    pub fn is_element(&self) -> bool {
        self.name().is_some()
    }

    /// Attribute value by name
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        match &self.doc.nodes[self.id].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// First child element with the given name
    pub fn get(&self, name: &str) -> Option<Node<'a>> {
        self.elements().find(|child| child.name() == Some(name))
    }

    /// Child element nodes
    pub fn elements(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let doc = self.doc;
        doc.nodes[self.id]
            .children
            .iter()
            .map(move |&id| doc.node(id))
            .filter(|node| node.is_element())
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.doc.nodes[self.id].parent.map(|id| self.doc.node(id))
    }

    /// Concatenated text of this node and its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        for id in self.doc.descendants_or_self(self.id) {
            if let NodeKind::Text(text) = &self.doc.nodes[id].kind {
                out.push_str(text);
            }
        }
        out
    }

    /// Runs a path query relative to this node
    ///
    /// Absolute paths (starting with `/`) are evaluated from the document root.
    pub fn find(&self, path: &str) -> Result<Vec<Node<'a>>, ParseError> {
        let query = path::PathQuery::parse(path)?;
        let start = if query.is_absolute() {
            self.doc.root_id()
        } else {
            self.id
        };
        Ok(query
            .evaluate(self.doc, start)
            .into_iter()
            .map(|id| self.doc.node(id))
            .collect())
    }
}
