//! Path queries
//!
//! An XPath 1.0 subset evaluated directly against a [`NativeTree`]:
//! location paths over the child, descendant, descendant-or-self, self,
//! parent, ancestor, ancestor-or-self, following-sibling, preceding-sibling
//! and attribute axes; name, `*`, `node()`, `text()`, `comment()` and
//! `processing-instruction()` tests; predicates; the usual operators; and
//! the string / number / boolean core functions.
//!
//! Unprefixed name tests match elements in no namespace or in the HTML
//! namespace. Prefixed tests compare the stored prefix; there is no
//! namespace resolver.

mod eval;
mod lexer;
mod parser;

use crate::{NativeId, NativeTree};
use eval::Evaluator;

/// Query result
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Nodes in document order, without duplicates
    NodeSet(Vec<NativeId>),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Value {
    /// XPath `boolean()` conversion
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::NodeSet(nodes) => !nodes.is_empty(),
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
        }
    }

    pub fn is_node_set(&self) -> bool {
        matches!(self, Value::NodeSet(_))
    }
}

/// Query failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown function {0}()")]
    UnknownFunction(String),

    #[error("{name}() called with {count} argument(s)")]
    Arity { name: String, count: usize },

    #[error("expression does not evaluate to a node-set")]
    NotANodeSet,

    #[error("context node is not part of this tree")]
    ForeignContext,
}

impl QueryError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        QueryError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// A parsed query, reusable across evaluations
#[derive(Debug, Clone)]
pub struct Query {
    source: String,
    expr: parser::Expr,
}

impl Query {
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        Ok(Self {
            source: source.to_owned(),
            expr: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `context`
    pub fn evaluate(&self, tree: &NativeTree, context: NativeId) -> Result<Value, QueryError> {
        let index = tree.index(context).map_err(|_| QueryError::ForeignContext)?;
        Evaluator::new(tree).evaluate(&self.expr, index)
    }
}

impl NativeTree {
    /// Parse and evaluate a query in one go
    pub fn evaluate(&self, query: &str, context: NativeId) -> Result<Value, QueryError> {
        let query = Query::parse(query)?;
        tracing::trace!(query = query.source(), "evaluating path query");
        query.evaluate(self, context)
    }

    /// XPath string-value of a node
    pub fn string_value(&self, id: NativeId) -> String {
        match self.index(id) {
            Ok(index) => Evaluator::new(self).string_value(index),
            Err(_) => String::new(),
        }
    }

    /// `string()` conversion of a result
    pub fn value_to_string(&self, value: &Value) -> String {
        match value {
            Value::NodeSet(nodes) => nodes.first().map(|&n| self.string_value(n)).unwrap_or_default(),
            Value::String(s) => s.clone(),
            Value::Number(n) => eval::number_to_string(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    /// `number()` conversion of a result
    pub fn value_to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            other => eval::string_to_number(&self.value_to_string(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (NativeTree, NativeId, NativeId, NativeId) {
        let mut tree = NativeTree::new();
        let root = tree.root();
        let html = tree.create_element(None, None, "html").unwrap();
        let p1 = tree.create_element(None, None, "p").unwrap();
        let p2 = tree.create_element(None, None, "p").unwrap();
        tree.append_child(root, html).unwrap();
        tree.append_child(html, p1).unwrap();
        tree.append_child(html, p2).unwrap();
        let t1 = tree.create_text("one");
        let t2 = tree.create_text("two");
        tree.append_child(p1, t1).unwrap();
        tree.append_child(p2, t2).unwrap();
        tree.set_attribute(p2, None, None, "class", "x y").unwrap();
        (tree, html, p1, p2)
    }

    #[test]
    fn test_descendant_paths() {
        let (tree, _, p1, p2) = sample();
        assert_eq!(tree.evaluate("//p", tree.root()), Ok(Value::NodeSet(vec![p1, p2])));
        assert_eq!(tree.evaluate("//p[2]", tree.root()), Ok(Value::NodeSet(vec![p2])));
        assert_eq!(
            tree.evaluate("//p[@class]", tree.root()),
            Ok(Value::NodeSet(vec![p2]))
        );
    }

    #[test]
    fn test_scalar_results() {
        let (tree, html, _, _) = sample();
        assert_eq!(tree.evaluate("count(p)", html), Ok(Value::Number(2.0)));
        assert_eq!(tree.evaluate("string(p[2])", html), Ok(Value::String("two".into())));
        assert_eq!(tree.evaluate("1 + 2 * 3", html), Ok(Value::Number(7.0)));
        assert_eq!(
            tree.evaluate(
                "boolean(//p[contains(concat(' ', normalize-space(@class), ' '), ' y ')])",
                html
            ),
            Ok(Value::Boolean(true))
        );
    }

    #[test]
    fn test_reverse_axis_positions() {
        let (tree, _, p1, p2) = sample();
        assert_eq!(
            tree.evaluate("preceding-sibling::*[1]", p2),
            Ok(Value::NodeSet(vec![p1]))
        );
        assert_eq!(
            tree.evaluate("ancestor::*[last()]", p1).map(|v| v.is_node_set()),
            Ok(true)
        );
    }

    #[test]
    fn test_union_is_document_ordered() {
        let (tree, html, p1, p2) = sample();
        assert_eq!(
            tree.evaluate("p[2] | p[1]", html),
            Ok(Value::NodeSet(vec![p1, p2]))
        );
    }

    #[test]
    fn test_errors() {
        let (tree, html, _, _) = sample();
        assert!(matches!(tree.evaluate("p[", html), Err(QueryError::Syntax { .. })));
        assert_eq!(
            tree.evaluate("frobnicate()", html),
            Err(QueryError::UnknownFunction("frobnicate".into()))
        );
        assert_eq!(tree.evaluate("'a'/b", html), Err(QueryError::NotANodeSet));
        let other = NativeTree::new();
        assert_eq!(tree.evaluate(".", other.root()), Err(QueryError::ForeignContext));
    }
}
