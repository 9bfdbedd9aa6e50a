//! Path-query evaluation

use std::cmp::Ordering;

use super::parser::{ArithOp, Axis, CompareOp, Expr, LocationPath, NodeTest, Step};
use super::{QueryError, Value};
use crate::{NativeData, NativeTree};

/// Elements in this namespace match unprefixed name tests, as in HTML documents
const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(Clone, Copy)]
struct Context {
    node: u32,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'a> {
    tree: &'a NativeTree,
}

impl<'a> Evaluator<'a> {
    pub fn new(tree: &'a NativeTree) -> Self {
        Self { tree }
    }

    pub fn evaluate(&self, expr: &Expr, node: u32) -> Result<Value, QueryError> {
        self.eval(expr, Context { node, position: 1, size: 1 })
    }

    fn handles(&self, nodes: Vec<u32>) -> Vec<crate::NativeId> {
        nodes.into_iter().map(|n| self.tree.handle(n)).collect()
    }

    fn eval(&self, expr: &Expr, ctx: Context) -> Result<Value, QueryError> {
        match expr {
            Expr::Or(a, b) => Ok(Value::Boolean(
                self.eval(a, ctx)?.to_boolean() || self.eval(b, ctx)?.to_boolean(),
            )),
            Expr::And(a, b) => Ok(Value::Boolean(
                self.eval(a, ctx)?.to_boolean() && self.eval(b, ctx)?.to_boolean(),
            )),
            Expr::Compare(op, a, b) => {
                let left = self.eval(a, ctx)?;
                let right = self.eval(b, ctx)?;
                Ok(Value::Boolean(self.compare(*op, &left, &right)))
            }
            Expr::Arithmetic(op, a, b) => {
                let left = self.number(&self.eval(a, ctx)?);
                let right = self.number(&self.eval(b, ctx)?);
                Ok(Value::Number(match op {
                    ArithOp::Add => left + right,
                    ArithOp::Sub => left - right,
                    ArithOp::Mul => left * right,
                    ArithOp::Div => left / right,
                    ArithOp::Mod => left % right,
                }))
            }
            Expr::Negate(inner) => Ok(Value::Number(-self.number(&self.eval(inner, ctx)?))),
            Expr::Union(a, b) => {
                let mut nodes = self.node_set(self.eval(a, ctx)?)?;
                nodes.extend(self.node_set(self.eval(b, ctx)?)?);
                Ok(Value::NodeSet(self.handles(self.document_order(nodes))))
            }
            Expr::Literal(s) => Ok(Value::String(s.clone())),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Function(name, args) => self.function(name, args, ctx),
            Expr::Path(path) => Ok(Value::NodeSet(self.handles(self.location_path(path, ctx)?))),
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = self.node_set(self.eval(primary, ctx)?)?;
                nodes = self.document_order(nodes);
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                for step in steps {
                    nodes = self.step(&nodes, step)?;
                }
                Ok(Value::NodeSet(self.handles(nodes)))
            }
        }
    }

    fn location_path(&self, path: &LocationPath, ctx: Context) -> Result<Vec<u32>, QueryError> {
        let start = if path.absolute {
            self.root_index(ctx.node)
        } else {
            ctx.node
        };
        let mut nodes = vec![start];
        for step in &path.steps {
            nodes = self.step(&nodes, step)?;
        }
        Ok(nodes)
    }

    fn step(&self, input: &[u32], step: &Step) -> Result<Vec<u32>, QueryError> {
        let mut output = Vec::new();
        for &node in input {
            let mut selected: Vec<u32> = self
                .axis(node, step.axis)
                .into_iter()
                .filter(|&n| self.test(n, &step.test, step.axis))
                .collect();
            for predicate in &step.predicates {
                selected = self.filter(selected, predicate)?;
            }
            output.extend(selected);
        }
        Ok(self.document_order(output))
    }

    /// Apply a predicate with positions taken from the slice order
    fn filter(&self, nodes: Vec<u32>, predicate: &Expr) -> Result<Vec<u32>, QueryError> {
        let size = nodes.len();
        let mut kept = Vec::with_capacity(size);
        for (i, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, ctx)? {
                Value::Number(n) => n == ctx.position as f64,
                other => other.to_boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along an axis, in axis order
    fn axis(&self, node: u32, axis: Axis) -> Vec<u32> {
        let tree = self.tree;
        let current = tree.node(node);
        match axis {
            Axis::Child => self.children(node),
            Axis::Descendant => self.descendants(node),
            Axis::DescendantOrSelf => {
                let mut nodes = vec![node];
                nodes.extend(self.descendants(node));
                nodes
            }
            Axis::SelfAxis => vec![node],
            Axis::Parent => self.parent(node).into_iter().collect(),
            Axis::Ancestor => self.ancestors(node),
            Axis::AncestorOrSelf => {
                let mut nodes = vec![node];
                nodes.extend(self.ancestors(node));
                nodes
            }
            Axis::FollowingSibling => {
                let mut nodes = Vec::new();
                let mut next = current.next_sibling;
                while let Some(sibling) = next {
                    nodes.push(sibling);
                    next = tree.node(sibling).next_sibling;
                }
                nodes
            }
            Axis::PrecedingSibling => {
                let mut nodes = Vec::new();
                let mut prev = current.prev_sibling;
                while let Some(sibling) = prev {
                    nodes.push(sibling);
                    prev = tree.node(sibling).prev_sibling;
                }
                nodes
            }
            Axis::Attribute => match &current.data {
                NativeData::Element { attrs, .. } => attrs.clone(),
                _ => Vec::new(),
            },
        }
    }

    fn children(&self, node: u32) -> Vec<u32> {
        let mut nodes = Vec::new();
        let mut next = self.tree.node(node).first_child;
        while let Some(child) = next {
            nodes.push(child);
            next = self.tree.node(child).next_sibling;
        }
        nodes
    }

    fn descendants(&self, node: u32) -> Vec<u32> {
        let root = self.tree.handle(node);
        self.tree.descendants(root).map(|id| id.index).collect()
    }

    /// Parent, or owner element for attributes
    fn parent(&self, node: u32) -> Option<u32> {
        self.tree.node(node).parent.or_else(|| self.tree.owner_index(node))
    }

    fn ancestors(&self, node: u32) -> Vec<u32> {
        let mut nodes = Vec::new();
        let mut current = self.parent(node);
        while let Some(ancestor) = current {
            nodes.push(ancestor);
            current = self.parent(ancestor);
        }
        nodes
    }

    fn root_index(&self, node: u32) -> u32 {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    fn test(&self, node: u32, test: &NodeTest, axis: Axis) -> bool {
        let data = &self.tree.node(node).data;
        let principal = match axis {
            Axis::Attribute => matches!(data, NativeData::Attribute { .. }),
            _ => matches!(data, NativeData::Element { .. }),
        };
        match test {
            NodeTest::Node => true,
            NodeTest::Text => matches!(data, NativeData::Text(_)),
            NodeTest::Comment => matches!(data, NativeData::Comment(_)),
            NodeTest::ProcessingInstruction(expected) => match data {
                NativeData::ProcessingInstruction { target, .. } => {
                    expected.as_deref().is_none_or(|expected| expected == target)
                }
                _ => false,
            },
            NodeTest::Any => principal,
            NodeTest::AnyInPrefix(prefix) => {
                principal && self.tree.node_name(node).is_some_and(|n| n.prefix.as_deref() == Some(prefix))
            }
            NodeTest::Name { prefix, local } => {
                if !principal {
                    return false;
                }
                let Some(name) = self.tree.node_name(node) else {
                    return false;
                };
                if name.local != *local {
                    return false;
                }
                match (prefix, data) {
                    (Some(prefix), _) => name.prefix.as_deref() == Some(prefix.as_str()),
                    (None, NativeData::Element { .. }) => {
                        matches!(name.namespace.as_deref(), None | Some(HTML_NAMESPACE))
                    }
                    (None, _) => name.namespace.is_none(),
                }
            }
        }
    }

    fn document_order(&self, mut nodes: Vec<u32>) -> Vec<u32> {
        let mut keyed: Vec<(Vec<u32>, u32)> = nodes.drain(..).map(|n| (self.order_key(n), n)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.1 == b.1);
        keyed.into_iter().map(|(_, n)| n).collect()
    }

    /// Path of sibling positions from the root. Attributes sort after their
    /// owner and before its children.
    fn order_key(&self, node: u32) -> Vec<u32> {
        let tree = self.tree;
        let mut key = Vec::new();
        let mut current = node;
        loop {
            let entry = tree.node(current);
            if let Some(owner) = tree.owner_index(current) {
                let position = match &tree.node(owner).data {
                    NativeData::Element { attrs, .. } => attrs.iter().position(|&a| a == current).unwrap_or(0),
                    _ => 0,
                };
                key.push(position as u32);
                key.push(0);
                current = owner;
            } else if let Some(parent) = entry.parent {
                let mut position = 1;
                let mut prev = entry.prev_sibling;
                while let Some(sibling) = prev {
                    position += 1;
                    prev = tree.node(sibling).prev_sibling;
                }
                key.push(position);
                current = parent;
            } else {
                key.push(current);
                break;
            }
        }
        key.reverse();
        key
    }

    fn node_set(&self, value: Value) -> Result<Vec<u32>, QueryError> {
        match value {
            Value::NodeSet(nodes) => Ok(nodes.into_iter().map(|id| id.index).collect()),
            _ => Err(QueryError::NotANodeSet),
        }
    }

    // ------------------------------------------------------------------
    // Conversions and comparison
    // ------------------------------------------------------------------

    pub fn string_value(&self, node: u32) -> String {
        match &self.tree.node(node).data {
            NativeData::Text(s) | NativeData::Comment(s) => s.clone(),
            NativeData::ProcessingInstruction { data, .. } => data.clone(),
            NativeData::Attribute { value, .. } => value.clone(),
            NativeData::Doctype { .. } => String::new(),
            NativeData::Document | NativeData::Fragment | NativeData::Element { .. } => self
                .tree
                .descendants(self.tree.handle(node))
                .filter_map(|id| match &self.tree.node(id.index).data {
                    NativeData::Text(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::NodeSet(nodes) => nodes.first().map(|n| self.string_value(n.index)).unwrap_or_default(),
            Value::String(s) => s.clone(),
            Value::Number(n) => number_to_string(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            other => string_to_number(&self.string(other)),
        }
    }

    fn compare(&self, op: CompareOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::NodeSet(a), Value::NodeSet(b)) => a.iter().any(|x| {
                let x = self.string_value(x.index);
                b.iter()
                    .any(|y| compare_atoms(op, &Value::String(x.clone()), &Value::String(self.string_value(y.index))))
            }),
            (Value::NodeSet(nodes), other) => match other {
                Value::Boolean(_) => compare_atoms(op, &Value::Boolean(!nodes.is_empty()), other),
                _ => nodes
                    .iter()
                    .any(|n| compare_atoms(op, &Value::String(self.string_value(n.index)), other)),
            },
            (other, Value::NodeSet(nodes)) => match other {
                Value::Boolean(_) => compare_atoms(op, other, &Value::Boolean(!nodes.is_empty())),
                _ => nodes
                    .iter()
                    .any(|n| compare_atoms(op, other, &Value::String(self.string_value(n.index)))),
            },
            _ => compare_atoms(op, left, right),
        }
    }

    // ------------------------------------------------------------------
    // Function library
    // ------------------------------------------------------------------

    fn function(&self, name: &str, args: &[Expr], ctx: Context) -> Result<Value, QueryError> {
        let arity = |min: usize, max: usize| -> Result<(), QueryError> {
            if args.len() < min || args.len() > max {
                Err(QueryError::Arity {
                    name: name.to_owned(),
                    count: args.len(),
                })
            } else {
                Ok(())
            }
        };
        let string_arg = |i: usize| -> Result<String, QueryError> {
            match args.get(i) {
                Some(arg) => Ok(self.string(&self.eval(arg, ctx)?)),
                None => Ok(self.string_value(ctx.node)),
            }
        };
        let number_arg = |i: usize| -> Result<f64, QueryError> {
            match args.get(i) {
                Some(arg) => Ok(self.number(&self.eval(arg, ctx)?)),
                None => Ok(string_to_number(&self.string_value(ctx.node))),
            }
        };
        let node_arg = |i: usize| -> Result<Option<u32>, QueryError> {
            match args.get(i) {
                Some(arg) => {
                    let nodes = self.node_set(self.eval(arg, ctx)?)?;
                    Ok(self.document_order(nodes).first().copied())
                }
                None => Ok(Some(ctx.node)),
            }
        };

        Ok(match name {
            "last" => {
                arity(0, 0)?;
                Value::Number(ctx.size as f64)
            }
            "position" => {
                arity(0, 0)?;
                Value::Number(ctx.position as f64)
            }
            "count" => {
                arity(1, 1)?;
                Value::Number(self.node_set(self.eval(&args[0], ctx)?)?.len() as f64)
            }
            "local-name" | "name" | "namespace-uri" => {
                arity(0, 1)?;
                let name_of = node_arg(0)?.and_then(|n| {
                    if let Some(qname) = self.tree.node_name(n) {
                        return Some(match name {
                            "local-name" => qname.local.clone(),
                            "name" => qname.qualified(),
                            _ => qname.namespace.clone().unwrap_or_default(),
                        });
                    }
                    match &self.tree.node(n).data {
                        NativeData::ProcessingInstruction { target, .. } if name != "namespace-uri" => {
                            Some(target.clone())
                        }
                        _ => None,
                    }
                });
                Value::String(name_of.unwrap_or_default())
            }
            "string" => {
                arity(0, 1)?;
                Value::String(string_arg(0)?)
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(QueryError::Arity {
                        name: name.to_owned(),
                        count: args.len(),
                    });
                }
                let mut out = String::new();
                for i in 0..args.len() {
                    out.push_str(&string_arg(i)?);
                }
                Value::String(out)
            }
            "starts-with" => {
                arity(2, 2)?;
                Value::Boolean(string_arg(0)?.starts_with(&string_arg(1)?))
            }
            "contains" => {
                arity(2, 2)?;
                Value::Boolean(string_arg(0)?.contains(&string_arg(1)?))
            }
            "substring-before" => {
                arity(2, 2)?;
                let (haystack, needle) = (string_arg(0)?, string_arg(1)?);
                Value::String(haystack.split_once(&needle).map(|(a, _)| a.to_owned()).unwrap_or_default())
            }
            "substring-after" => {
                arity(2, 2)?;
                let (haystack, needle) = (string_arg(0)?, string_arg(1)?);
                Value::String(haystack.split_once(&needle).map(|(_, b)| b.to_owned()).unwrap_or_default())
            }
            "substring" => {
                arity(2, 3)?;
                let s = string_arg(0)?;
                let start = round_half_up(number_arg(1)?);
                let end = if args.len() == 3 {
                    start + round_half_up(number_arg(2)?)
                } else {
                    f64::INFINITY
                };
                Value::String(
                    s.chars()
                        .enumerate()
                        .filter(|(i, _)| {
                            let position = (*i + 1) as f64;
                            position >= start && position < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            "string-length" => {
                arity(0, 1)?;
                Value::Number(string_arg(0)?.chars().count() as f64)
            }
            "normalize-space" => {
                arity(0, 1)?;
                Value::String(string_arg(0)?.split_ascii_whitespace().collect::<Vec<_>>().join(" "))
            }
            "translate" => {
                arity(3, 3)?;
                let (s, from, to) = (string_arg(0)?, string_arg(1)?, string_arg(2)?);
                let to: Vec<char> = to.chars().collect();
                Value::String(
                    s.chars()
                        .filter_map(|c| match from.chars().position(|f| f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            "not" => {
                arity(1, 1)?;
                Value::Boolean(!self.eval(&args[0], ctx)?.to_boolean())
            }
            "true" => {
                arity(0, 0)?;
                Value::Boolean(true)
            }
            "false" => {
                arity(0, 0)?;
                Value::Boolean(false)
            }
            "boolean" => {
                arity(1, 1)?;
                Value::Boolean(self.eval(&args[0], ctx)?.to_boolean())
            }
            "number" => {
                arity(0, 1)?;
                Value::Number(number_arg(0)?)
            }
            "sum" => {
                arity(1, 1)?;
                let nodes = self.node_set(self.eval(&args[0], ctx)?)?;
                Value::Number(nodes.iter().map(|&n| string_to_number(&self.string_value(n))).sum())
            }
            "floor" => {
                arity(1, 1)?;
                Value::Number(number_arg(0)?.floor())
            }
            "ceiling" => {
                arity(1, 1)?;
                Value::Number(number_arg(0)?.ceil())
            }
            "round" => {
                arity(1, 1)?;
                Value::Number(round_half_up(number_arg(0)?))
            }
            _ => return Err(QueryError::UnknownFunction(name.to_owned())),
        })
    }
}

impl NativeTree {
    pub(crate) fn node_name(&self, index: u32) -> Option<&crate::NativeName> {
        match &self.node(index).data {
            NativeData::Element { name, .. } | NativeData::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }
}

fn compare_atoms(op: CompareOp, left: &Value, right: &Value) -> bool {
    match op {
        CompareOp::Eq | CompareOp::NotEq => {
            let equal = match (left, right) {
                (Value::Boolean(a), b) | (b, Value::Boolean(a)) => *a == b.to_boolean(),
                (Value::Number(a), b) | (b, Value::Number(a)) => *a == atom_number(b),
                (Value::String(a), Value::String(b)) => a == b,
                _ => false,
            };
            equal == (op == CompareOp::Eq)
        }
        _ => {
            let (a, b) = (atom_number(left), atom_number(right));
            match a.partial_cmp(&b) {
                Some(ordering) => match op {
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                },
                None => false,
            }
        }
    }
}

fn atom_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Boolean(b) => f64::from(u8::from(*b)),
        Value::String(s) => string_to_number(s),
        Value::NodeSet(_) => f64::NAN,
    }
}

pub(crate) fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c: char| c.is_ascii_whitespace());
    let valid = !trimmed.is_empty()
        && trimmed
            .strip_prefix('-')
            .unwrap_or(trimmed)
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.');
    if valid { trimmed.parse().unwrap_or(f64::NAN) } else { f64::NAN }
}

pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_owned() } else { "-Infinity".to_owned() }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn round_half_up(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() { n } else { (n + 0.5).floor() }
}
