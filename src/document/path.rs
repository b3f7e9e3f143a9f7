//! Path queries over [`Document`](super::Document) trees
//!
//! A small XPath subset, enough for sitemap traversal and simple scraping:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `/name` | child elements named `name` |
//! | `//name` | descendant elements named `name` |
//! | `name` | relative child step (first step only) |
//! | `*` | any element name |
//! | `[position()<=3]` | position within the current group |
//! | `[2]` | shorthand for `[position()=2]` |
//! | `[priority>=0.5]` | some child element `priority` compares true |
//! | `[@lang='en']` | attribute comparison |
//! | `[loc]`, `[@href]` | existence tests |
//!
//! Comparisons against numbers parse the node text as `f64` and are false
//! when it does not parse. Predicates apply left to right, so `position()`
//! counts the nodes that survived the previous predicates.

use super::{Document, NodeId};
use crate::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Position,
    Child(String),
    Attr(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Exists(Operand),
    Compare(Operand, CompareOp, Literal),
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    name: Option<String>,
    predicates: Vec<Predicate>,
}

/// A compiled path expression
#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
    absolute: bool,
    steps: Vec<Step>,
}

impl PathQuery {
    /// Compiles a path expression
    pub fn parse(path: &str) -> Result<Self, ParseError> {
        Parser::new(path).parse()
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Evaluates the query from `start`, returning matches in document order
    pub(crate) fn evaluate(&self, doc: &Document, start: NodeId) -> Vec<NodeId> {
        let mut current = vec![start];

        for step in &self.steps {
            let mut next = Vec::new();
            for &context in &current {
                let parents = match step.axis {
                    Axis::Child => vec![context],
                    Axis::Descendant => doc.descendants_or_self(context),
                };
                for parent in parents {
                    let mut group: Vec<NodeId> = doc
                        .child_ids(parent)
                        .iter()
                        .copied()
                        .filter(|&id| step.matches_name(doc, id))
                        .collect();
                    for predicate in &step.predicates {
                        group = group
                            .into_iter()
                            .enumerate()
                            .filter(|(index, id)| predicate.holds(doc, *id, index + 1))
                            .map(|(_, id)| id)
                            .collect();
                    }
                    next.extend(group);
                }
            }
            next.sort_unstable();
            next.dedup();
            current = next;
        }

        current
    }
}

impl Step {
    fn matches_name(&self, doc: &Document, id: NodeId) -> bool {
        match (doc.element_name(id), &self.name) {
            (Some(_), None) => true,
            (Some(actual), Some(wanted)) => actual == wanted,
            (None, _) => false,
        }
    }
}

impl Predicate {
    fn holds(&self, doc: &Document, id: NodeId, position: usize) -> bool {
        match self {
            Self::Exists(Operand::Position) => true,
            Self::Exists(Operand::Child(name)) => doc.node(id).get(name).is_some(),
            Self::Exists(Operand::Attr(name)) => doc.node(id).attr(name).is_some(),
            Self::Compare(Operand::Position, op, literal) => {
                compare(&position.to_string(), *op, literal)
            }
            Self::Compare(Operand::Child(name), op, literal) => doc
                .node(id)
                .elements()
                .filter(|child| child.name() == Some(name.as_str()))
                .any(|child| compare(&child.text(), *op, literal)),
            Self::Compare(Operand::Attr(name), op, literal) => doc
                .node(id)
                .attr(name)
                .is_some_and(|value| compare(value, *op, literal)),
        }
    }
}

fn compare(value: &str, op: CompareOp, literal: &Literal) -> bool {
    let value = value.trim();
    match literal {
        Literal::Number(wanted) => value
            .parse::<f64>()
            .is_ok_and(|actual| compare_numbers(actual, op, *wanted)),
        Literal::Text(wanted) => match op {
            CompareOp::Eq => value == wanted,
            CompareOp::Ne => value != wanted,
            _ => match (value.parse::<f64>(), wanted.parse::<f64>()) {
                (Ok(actual), Ok(wanted)) => compare_numbers(actual, op, wanted),
                _ => false,
            },
        },
    }
}

fn compare_numbers(actual: f64, op: CompareOp, wanted: f64) -> bool {
    match op {
        CompareOp::Eq => actual == wanted,
        CompareOp::Ne => actual != wanted,
        CompareOp::Lt => actual < wanted,
        CompareOp::Le => actual <= wanted,
        CompareOp::Gt => actual > wanted,
        CompareOp::Ge => actual >= wanted,
    }
}

struct Parser<'a> {
    source: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            rest: source.trim(),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Path {
            path: self.source.to_string(),
            message: message.into(),
        }
    }

    fn parse(mut self) -> Result<PathQuery, ParseError> {
        if self.rest.is_empty() {
            return Err(self.error("empty path"));
        }

        let absolute = self.rest.starts_with('/');
        let mut steps = Vec::new();

        while !self.rest.is_empty() {
            let axis = if self.eat("//") {
                Axis::Descendant
            } else if self.eat("/") {
                Axis::Child
            } else if steps.is_empty() {
                Axis::Child
            } else {
                return Err(self.error(format!("expected '/' before '{}'", self.rest)));
            };

            let name = self.name_test()?;
            let mut predicates = Vec::new();
            while self.eat("[") {
                predicates.push(self.predicate()?);
                if !self.eat("]") {
                    return Err(self.error("unclosed predicate"));
                }
            }
            steps.push(Step {
                axis,
                name,
                predicates,
            });
        }

        Ok(PathQuery { absolute, steps })
    }

    fn eat(&mut self, token: &str) -> bool {
        match self.rest.strip_prefix(token) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn identifier(&mut self) -> Option<&'a str> {
        let end = self
            .rest
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let (ident, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(ident)
    }

    fn name_test(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat("*") {
            return Ok(None);
        }
        match self.identifier() {
            Some(name) => Ok(Some(local_name(name).to_string())),
            None => Err(self.error("expected an element name")),
        }
    }

    fn predicate(&mut self) -> Result<Predicate, ParseError> {
        self.skip_whitespace();

        if let Some(number) = self.number() {
            self.skip_whitespace();
            return Ok(Predicate::Compare(
                Operand::Position,
                CompareOp::Eq,
                Literal::Number(number),
            ));
        }

        let operand = if self.eat("position()") {
            Operand::Position
        } else if self.eat("@") {
            let name = self
                .identifier()
                .ok_or_else(|| self.error("expected an attribute name"))?;
            Operand::Attr(name.to_string())
        } else {
            let name = self
                .identifier()
                .ok_or_else(|| self.error("expected a predicate"))?;
            Operand::Child(local_name(name).to_string())
        };

        self.skip_whitespace();
        let Some(op) = self.compare_op() else {
            return Ok(Predicate::Exists(operand));
        };
        self.skip_whitespace();
        let literal = self.literal()?;
        self.skip_whitespace();

        Ok(Predicate::Compare(operand, op, literal))
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        // Two-character operators first so `<=` is not read as `<`
        for (token, op) in [
            ("!=", CompareOp::Ne),
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("=", CompareOp::Eq),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ] {
            if self.eat(token) {
                return Some(op);
            }
        }
        None
    }

    fn number(&mut self) -> Option<f64> {
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let value = self.rest[..end].parse::<f64>().ok()?;
        self.rest = &self.rest[end..];
        Some(value)
    }

    fn literal(&mut self) -> Result<Literal, ParseError> {
        for quote in ['\'', '"'] {
            if let Some(rest) = self.rest.strip_prefix(quote) {
                let end = rest
                    .find(quote)
                    .ok_or_else(|| self.error("unterminated string literal"))?;
                self.rest = &rest[end + 1..];
                return Ok(Literal::Text(rest[..end].to_string()));
            }
        }
        self.number()
            .map(Literal::Number)
            .ok_or_else(|| self.error("expected a number or quoted string"))
    }
}

/// Drops a namespace prefix: `sm:url` matches elements named `url`
fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}
