//! Selector and path queries
//!
//! Both go through the native path-query evaluator; selectors are first
//! rewritten by [`crate::selector`].

use std::fmt;
use std::rc::Weak;

use tracing::warn;
use veneer_native::{NativeId, Value};

use crate::collection::{HtmlCollection, NodeList};
use crate::document::{Document, DocumentInner};
use crate::error::{DomError, DomResult};
use crate::node::Node;
use crate::selector::{self, SelectorError};

/// Requested shape of a [`Document::evaluate`] result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultShape {
    #[default]
    Any,
    Number,
    String,
    Boolean,
    UnorderedNodeIterator,
    OrderedNodeIterator,
    UnorderedNodeSnapshot,
    OrderedNodeSnapshot,
    AnyUnorderedNode,
    FirstOrderedNode,
}

#[derive(Debug)]
pub enum QueryResult {
    Number(f64),
    String(String),
    Boolean(bool),
    Iterator(ResolvedNodes),
    Snapshot(NodeList),
    Node(Option<Node>),
}

impl QueryResult {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            QueryResult::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryResult::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryResult::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// All nodes of a node-shaped result; empty for scalars
    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            QueryResult::Iterator(nodes) => nodes.collect(),
            QueryResult::Snapshot(list) => list.to_vec(),
            QueryResult::Node(node) => node.into_iter().collect(),
            QueryResult::Number(_) | QueryResult::String(_) | QueryResult::Boolean(_) => Vec::new(),
        }
    }
}

/// Node-set result, wrapped lazily as it is consumed
pub struct ResolvedNodes {
    doc: Weak<DocumentInner>,
    pending: std::vec::IntoIter<NativeId>,
}

impl Iterator for ResolvedNodes {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let doc = self.doc.upgrade()?;
        self.pending.by_ref().find_map(|id| doc.resolve(id).ok())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.pending.len()))
    }
}

impl fmt::Debug for ResolvedNodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedNodes")
            .field("remaining", &self.pending.len())
            .finish()
    }
}

fn shape(doc: &DocumentInner, value: Value, shape: ResultShape) -> DomResult<QueryResult> {
    let iterator = |ids: Vec<NativeId>| {
        QueryResult::Iterator(ResolvedNodes {
            doc: doc.weak(),
            pending: ids.into_iter(),
        })
    };
    match shape {
        ResultShape::Number => Ok(QueryResult::Number(doc.tree().value_to_number(&value))),
        ResultShape::String => Ok(QueryResult::String(doc.tree().value_to_string(&value))),
        ResultShape::Boolean => Ok(QueryResult::Boolean(value.to_boolean())),
        ResultShape::Any => Ok(match value {
            Value::NodeSet(ids) => iterator(ids),
            Value::Number(n) => QueryResult::Number(n),
            Value::String(s) => QueryResult::String(s),
            Value::Boolean(b) => QueryResult::Boolean(b),
        }),
        _ => {
            let Value::NodeSet(ids) = value else {
                return Err(DomError::Type(format!("{shape:?} requires a node-set result")));
            };
            Ok(match shape {
                ResultShape::UnorderedNodeSnapshot | ResultShape::OrderedNodeSnapshot => {
                    QueryResult::Snapshot(NodeList::snapshot(doc.resolve_all(ids)))
                }
                ResultShape::AnyUnorderedNode | ResultShape::FirstOrderedNode => {
                    QueryResult::Node(ids.first().and_then(|&id| doc.resolve(id).ok()))
                }
                _ => iterator(ids),
            })
        }
    }
}

impl Document {
    /// Evaluate a path query with `context` as the context node
    pub fn evaluate(&self, expression: &str, context: &Node, result: ResultShape) -> DomResult<QueryResult> {
        if !self.0.owns(context) {
            return Err(DomError::WrongDocument);
        }
        let value = self.0.tree().evaluate(expression, context.native())?;
        shape(&self.0, value, result)
    }

    pub fn query_selector(&self, selectors: &str) -> DomResult<Option<Node>> {
        self.as_node().query_selector(selectors)
    }

    pub fn query_selector_all(&self, selectors: &str) -> DomResult<NodeList> {
        self.as_node().query_selector_all(selectors)
    }

    pub fn get_elements_by_tag_name(&self, qualified_name: &str) -> HtmlCollection {
        self.as_node().get_elements_by_tag_name(qualified_name)
    }

    pub fn get_elements_by_tag_name_ns(&self, namespace: Option<&str>, local_name: &str) -> HtmlCollection {
        self.as_node().get_elements_by_tag_name_ns(namespace, local_name)
    }

    pub fn get_elements_by_class_name(&self, class_names: &str) -> HtmlCollection {
        self.as_node().get_elements_by_class_name(class_names)
    }
}

impl Node {
    /// First matching descendant in tree order
    pub fn query_selector(&self, selectors: &str) -> DomResult<Option<Node>> {
        let found = self.select(selectors, |p| format!("descendant::*[{p}]"))?;
        Ok(self.doc().and_then(|doc| found.first().and_then(|&id| doc.resolve(id).ok())))
    }

    /// Static list of matching descendants
    pub fn query_selector_all(&self, selectors: &str) -> DomResult<NodeList> {
        let found = self.select(selectors, |p| format!("descendant::*[{p}]"))?;
        let nodes = self.doc().map(|doc| doc.resolve_all(found)).unwrap_or_default();
        Ok(NodeList::snapshot(nodes))
    }

    pub fn matches(&self, selectors: &str) -> DomResult<bool> {
        let found = self.select(selectors, |p| format!("self::*[{p}]"))?;
        Ok(!found.is_empty())
    }

    /// Nearest inclusive ancestor matching `selectors`
    pub fn closest(&self, selectors: &str) -> DomResult<Option<Node>> {
        let found = self.select(selectors, |p| format!("ancestor-or-self::*[{p}]"))?;
        Ok(self.doc().and_then(|doc| found.last().and_then(|&id| doc.resolve(id).ok())))
    }

    fn select(&self, selectors: &str, query: impl FnOnce(&str) -> String) -> DomResult<Vec<NativeId>> {
        let predicate = match selector::to_predicate(selectors) {
            Ok(predicate) => predicate,
            Err(SelectorError::Unsupported(feature)) => {
                warn!(selectors, %feature, "unsupported selector matches nothing");
                return Ok(Vec::new());
            }
            Err(err @ SelectorError::Syntax { .. }) => return Err(DomError::Syntax(err.to_string())),
        };
        let Some(doc) = self.doc() else {
            return Ok(Vec::new());
        };
        let value = doc.tree().evaluate(&query(&predicate), self.native())?;
        match value {
            Value::NodeSet(ids) => Ok(ids),
            other => Err(DomError::Invariant(format!("selector query produced {other:?}"))),
        }
    }
}
