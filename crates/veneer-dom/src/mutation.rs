//! Tree mutation validator
//!
//! Every structural change goes `Requested → Validated → Applied`. A
//! [`MutationRequest`] is checked against the tree-shape rules before the
//! native tree is touched; only a [`ValidatedMutation`] can be applied.
//! Applying keeps the template liveness registry in step with the tree.

use std::rc::Rc;

use veneer_native::{NativeId, NativeKind, NativeTree};

use crate::document::DocumentInner;
use crate::error::{DomError, DomResult};
use crate::node::{Node, NodeKind};
use crate::template::TemplateContents;

/// Structural operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MutationKind {
    Append,
    Insert,
    Remove,
    Replace,
}

pub(crate) struct MutationRequest<'a> {
    kind: MutationKind,
    parent: &'a Node,
    node: &'a Node,
    child: Option<&'a Node>,
}

pub(crate) struct ValidatedMutation<'a> {
    request: MutationRequest<'a>,
    doc: Rc<DocumentInner>,
}

impl<'a> MutationRequest<'a> {
    pub(crate) fn append(parent: &'a Node, node: &'a Node) -> Self {
        Self {
            kind: MutationKind::Append,
            parent,
            node,
            child: None,
        }
    }

    pub(crate) fn insert(parent: &'a Node, node: &'a Node, child: Option<&'a Node>) -> Self {
        Self {
            kind: MutationKind::Insert,
            parent,
            node,
            child,
        }
    }

    pub(crate) fn remove(parent: &'a Node, child: &'a Node) -> Self {
        Self {
            kind: MutationKind::Remove,
            parent,
            node: child,
            child: Some(child),
        }
    }

    pub(crate) fn replace(parent: &'a Node, node: &'a Node, child: &'a Node) -> Self {
        Self {
            kind: MutationKind::Replace,
            parent,
            node,
            child: Some(child),
        }
    }

    pub(crate) fn validate(self) -> DomResult<ValidatedMutation<'a>> {
        let doc = self.parent.owner()?;
        if !doc.owns(self.node) || self.child.is_some_and(|child| !doc.owns(child)) {
            return Err(DomError::WrongDocument);
        }
        {
            let tree = doc.tree();
            let contents = doc.template_contents.borrow();
            let shape = Shape {
                tree: &tree,
                contents: &contents,
            };
            let parent = self.parent.native();
            let node = self.node.native();
            let child = self.child.map(Node::native);
            match self.kind {
                MutationKind::Remove => {
                    if tree.parent(node) != Some(parent) {
                        return Err(DomError::NotFound("node is not a child of parent"));
                    }
                }
                MutationKind::Append | MutationKind::Insert => shape.check_insert(parent, node, child)?,
                MutationKind::Replace => {
                    let child = child.ok_or(DomError::NotFound("replace needs a child"))?;
                    shape.check_replace(parent, node, child)?;
                }
            }
        }
        Ok(ValidatedMutation { request: self, doc })
    }
}

impl ValidatedMutation<'_> {
    /// Perform the change; returns the node DOM hands back to the caller
    pub(crate) fn apply(self) -> DomResult<Node> {
        let ValidatedMutation { request, doc } = self;
        let parent = request.parent.native();
        let node = request.node.native();
        let result = match request.kind {
            MutationKind::Append | MutationKind::Insert => {
                let mut reference = request.child.map(Node::native);
                if reference == Some(node) {
                    reference = doc.tree().next_sibling(node);
                }
                insert(&doc, parent, node, reference)?;
                request.node.clone()
            }
            MutationKind::Remove => {
                doc.tree_mut().remove_child(parent, node).map_err(DomError::invariant)?;
                doc.unregister_templates(node);
                request.node.clone()
            }
            MutationKind::Replace => {
                let Some(child) = request.child else {
                    return Err(DomError::Invariant("replace without a child".into()));
                };
                if child != request.node {
                    let old = child.native();
                    let mut reference = doc.tree().next_sibling(old);
                    if reference == Some(node) {
                        reference = doc.tree().next_sibling(node);
                    }
                    doc.tree_mut().remove_child(parent, old).map_err(DomError::invariant)?;
                    doc.unregister_templates(old);
                    insert(&doc, parent, node, reference)?;
                }
                child.clone()
            }
        };
        tracing::trace!(kind = ?request.kind, ?parent, ?node, "applied mutation");
        Ok(result)
    }
}

/// Insert `node` (or a fragment's children) before `reference`
fn insert(doc: &DocumentInner, parent: NativeId, node: NativeId, reference: Option<NativeId>) -> DomResult<()> {
    let nodes: Vec<NativeId> = {
        let tree = doc.tree();
        match tree.kind(node) {
            Ok(NativeKind::Fragment) => tree.children(node).collect(),
            _ => vec![node],
        }
    };
    {
        let mut tree = doc.tree_mut();
        for &inserted in &nodes {
            tree.insert_before(parent, inserted, reference)
                .map_err(DomError::invariant)?;
        }
    }
    for inserted in nodes {
        doc.sync_templates(inserted)?;
    }
    Ok(())
}

/// Read-only view used by the shape checks
struct Shape<'t> {
    tree: &'t NativeTree,
    contents: &'t TemplateContents,
}

impl Shape<'_> {
    fn kind(&self, id: NativeId) -> Option<NativeKind> {
        self.tree.kind(id).ok()
    }

    /// `ancestor` is `node` or one of its ancestors, crossing from template
    /// contents to their host
    fn is_host_including_inclusive_ancestor(&self, ancestor: NativeId, node: NativeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.tree.parent(id).or_else(|| self.contents.host_of(id));
        }
        false
    }

    fn count_children(&self, parent: NativeId, kind: NativeKind) -> usize {
        self.tree
            .children(parent)
            .filter(|&c| self.kind(c) == Some(kind))
            .count()
    }

    fn has_child_other_than(&self, parent: NativeId, kind: NativeKind, except: NativeId) -> bool {
        self.tree
            .children(parent)
            .any(|c| c != except && self.kind(c) == Some(kind))
    }

    fn kind_follows(&self, child: NativeId, kind: NativeKind) -> bool {
        let mut current = self.tree.next_sibling(child);
        while let Some(id) = current {
            if self.kind(id) == Some(kind) {
                return true;
            }
            current = self.tree.next_sibling(id);
        }
        false
    }

    fn kind_precedes(&self, child: NativeId, kind: NativeKind) -> bool {
        let mut current = self.tree.prev_sibling(child);
        while let Some(id) = current {
            if self.kind(id) == Some(kind) {
                return true;
            }
            current = self.tree.prev_sibling(id);
        }
        false
    }

    /// Rules shared by insertion and replacement
    fn check_common(&self, parent: NativeId, node: NativeId, child: Option<NativeId>) -> DomResult<(NativeKind, NativeKind)> {
        let parent_kind = self.kind(parent).ok_or(DomError::NotFound("parent is gone"))?;
        if !matches!(
            parent_kind,
            NativeKind::Document | NativeKind::Fragment | NativeKind::Element
        ) {
            return Err(DomError::HierarchyRequest("parent cannot have children"));
        }
        if self.is_host_including_inclusive_ancestor(node, parent) {
            return Err(DomError::HierarchyRequest("node is an inclusive ancestor of parent"));
        }
        if let Some(child) = child
            && self.tree.parent(child) != Some(parent)
        {
            return Err(DomError::NotFound("reference child is not a child of parent"));
        }
        let node_kind = self.kind(node).ok_or(DomError::NotFound("node is gone"))?;
        match node_kind {
            NativeKind::Fragment
            | NativeKind::Doctype
            | NativeKind::Element
            | NativeKind::Text
            | NativeKind::ProcessingInstruction
            | NativeKind::Comment => {}
            NativeKind::Document | NativeKind::Attribute => {
                return Err(DomError::HierarchyRequest("node cannot be inserted"));
            }
        }
        if node_kind == NativeKind::Text && parent_kind == NativeKind::Document {
            return Err(DomError::HierarchyRequest("text cannot be a child of a document"));
        }
        if node_kind == NativeKind::Doctype && parent_kind != NativeKind::Document {
            return Err(DomError::HierarchyRequest("doctype must be a child of a document"));
        }
        Ok((parent_kind, node_kind))
    }

    fn check_insert(&self, parent: NativeId, node: NativeId, child: Option<NativeId>) -> DomResult<()> {
        let (parent_kind, node_kind) = self.check_common(parent, node, child)?;
        if parent_kind != NativeKind::Document {
            return Ok(());
        }
        let has_element = self.count_children(parent, NativeKind::Element) > 0;
        let child_is_doctype = child.is_some_and(|c| self.kind(c) == Some(NativeKind::Doctype));
        let doctype_after_child = child.is_some_and(|c| self.kind_follows(c, NativeKind::Doctype));
        match node_kind {
            NativeKind::Fragment => {
                let elements = self.count_children(node, NativeKind::Element);
                if elements > 1 || self.count_children(node, NativeKind::Text) > 0 {
                    return Err(DomError::HierarchyRequest(
                        "fragment for a document must hold at most one element and no text",
                    ));
                }
                if elements == 1 && (has_element || child_is_doctype || doctype_after_child) {
                    return Err(DomError::HierarchyRequest("document already has an element"));
                }
            }
            NativeKind::Element => {
                if has_element || child_is_doctype || doctype_after_child {
                    return Err(DomError::HierarchyRequest(
                        "document element must be unique and follow the doctype",
                    ));
                }
            }
            NativeKind::Doctype => {
                let element_before_child = child.is_some_and(|c| self.kind_precedes(c, NativeKind::Element));
                if self.count_children(parent, NativeKind::Doctype) > 0
                    || element_before_child
                    || (child.is_none() && has_element)
                {
                    return Err(DomError::HierarchyRequest(
                        "doctype must be unique and precede the document element",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_replace(&self, parent: NativeId, node: NativeId, child: NativeId) -> DomResult<()> {
        let (parent_kind, node_kind) = self.check_common(parent, node, Some(child))?;
        if parent_kind != NativeKind::Document {
            return Ok(());
        }
        let other_element = self.has_child_other_than(parent, NativeKind::Element, child);
        let doctype_after_child = self.kind_follows(child, NativeKind::Doctype);
        match node_kind {
            NativeKind::Fragment => {
                let elements = self.count_children(node, NativeKind::Element);
                if elements > 1 || self.count_children(node, NativeKind::Text) > 0 {
                    return Err(DomError::HierarchyRequest(
                        "fragment for a document must hold at most one element and no text",
                    ));
                }
                if elements == 1 && (other_element || doctype_after_child) {
                    return Err(DomError::HierarchyRequest("document already has an element"));
                }
            }
            NativeKind::Element => {
                if other_element || doctype_after_child {
                    return Err(DomError::HierarchyRequest(
                        "document element must be unique and follow the doctype",
                    ));
                }
            }
            NativeKind::Doctype => {
                if self.has_child_other_than(parent, NativeKind::Doctype, child)
                    || self.kind_precedes(child, NativeKind::Element)
                {
                    return Err(DomError::HierarchyRequest(
                        "doctype must be unique and precede the document element",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Argument of the convenience mutators: a node, or text for a new Text node
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(Node),
    Text(String),
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Node(node)
    }
}

impl From<&Node> for Child {
    fn from(node: &Node) -> Self {
        Child::Node(node.clone())
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl Node {
    pub fn append_child(&self, node: &Node) -> DomResult<Node> {
        MutationRequest::append(self, node).validate()?.apply()
    }

    /// Insert before `child`, or append when `child` is `None`
    pub fn insert_before(&self, node: &Node, child: Option<&Node>) -> DomResult<Node> {
        MutationRequest::insert(self, node, child).validate()?.apply()
    }

    pub fn remove_child(&self, child: &Node) -> DomResult<Node> {
        MutationRequest::remove(self, child).validate()?.apply()
    }

    /// Put `node` in place of `child`; returns `child`
    pub fn replace_child(&self, node: &Node, child: &Node) -> DomResult<Node> {
        MutationRequest::replace(self, node, child).validate()?.apply()
    }

    /// Detach from the parent, if any
    pub fn remove(&self) -> DomResult<()> {
        match self.parent_node() {
            Some(parent) => parent.remove_child(self).map(drop),
            None => Ok(()),
        }
    }

    pub fn append<I>(&self, items: I) -> DomResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let node = self.convert_children(items)?;
        self.append_child(&node).map(drop)
    }

    pub fn prepend<I>(&self, items: I) -> DomResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let node = self.convert_children(items)?;
        let first = self.first_child();
        self.insert_before(&node, first.as_ref()).map(drop)
    }

    /// Insert before this node, in its parent
    pub fn before<I>(&self, items: I) -> DomResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let Some(parent) = self.parent_node() else {
            return Ok(());
        };
        let items: Vec<Child> = items.into_iter().map(Into::into).collect();
        let mut viable_previous = self.previous_sibling();
        while let Some(sibling) = &viable_previous {
            if !contains_node(&items, sibling) {
                break;
            }
            viable_previous = sibling.previous_sibling();
        }
        let node = self.convert_children(items)?;
        let reference = match viable_previous {
            Some(previous) => previous.next_sibling(),
            None => parent.first_child(),
        };
        parent.insert_before(&node, reference.as_ref()).map(drop)
    }

    /// Insert after this node, in its parent
    pub fn after<I>(&self, items: I) -> DomResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let Some(parent) = self.parent_node() else {
            return Ok(());
        };
        let items: Vec<Child> = items.into_iter().map(Into::into).collect();
        let viable_next = self.viable_next_sibling(&items);
        let node = self.convert_children(items)?;
        parent.insert_before(&node, viable_next.as_ref()).map(drop)
    }

    pub fn replace_with<I>(&self, items: I) -> DomResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let Some(parent) = self.parent_node() else {
            return Ok(());
        };
        let items: Vec<Child> = items.into_iter().map(Into::into).collect();
        let viable_next = self.viable_next_sibling(&items);
        let node = self.convert_children(items)?;
        if self.parent_node().as_ref() == Some(&parent) {
            parent.replace_child(&node, self).map(drop)
        } else {
            parent.insert_before(&node, viable_next.as_ref()).map(drop)
        }
    }

    /// Remove all children, then insert `items`
    ///
    /// Validation happens up front, but the removal and the insertion are
    /// separate native steps.
    pub fn replace_children<I>(&self, items: I) -> DomResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let node = self.convert_children(items)?;
        let empty = node.kind() == NodeKind::DocumentFragment && !node.has_child_nodes();
        let replacement = if empty { None } else { Some(&node) };
        self.replace_all(replacement)
    }

    /// DOM "replace all": drop every child, then insert `node`
    pub(crate) fn replace_all(&self, node: Option<&Node>) -> DomResult<()> {
        let validated = match node {
            Some(node) => Some(MutationRequest::append(self, node).validate()?),
            None => None,
        };
        for child in self.child_nodes().iter() {
            if Some(&child) != node {
                self.remove_child(&child)?;
            }
        }
        match validated {
            Some(mutation) => mutation.apply().map(drop),
            None => Ok(()),
        }
    }

    fn viable_next_sibling(&self, items: &[Child]) -> Option<Node> {
        let mut viable_next = self.next_sibling();
        while let Some(sibling) = &viable_next {
            if !contains_node(items, sibling) {
                break;
            }
            viable_next = sibling.next_sibling();
        }
        viable_next
    }

    /// One node from a mixed list: the node itself, a new Text node, or a
    /// fragment holding them all
    fn convert_children<I>(&self, items: I) -> DomResult<Node>
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let doc = self.owner()?;
        let mut nodes = Vec::new();
        for item in items {
            nodes.push(match item.into() {
                Child::Node(node) => node,
                Child::Text(text) => doc.create_text(&text)?,
            });
        }
        if nodes.len() == 1
            && let Some(node) = nodes.pop()
        {
            return Ok(node);
        }
        let fragment = doc.tree_mut().create_fragment();
        let fragment = doc.resolve(fragment)?;
        for node in &nodes {
            fragment.append_child(node)?;
        }
        Ok(fragment)
    }
}

fn contains_node(items: &[Child], node: &Node) -> bool {
    items.iter().any(|item| matches!(item, Child::Node(n) if n == node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    fn names(node: &Node) -> Vec<String> {
        node.child_nodes().iter().map(|n| n.node_name()).collect()
    }

    #[test]
    fn test_document_allows_single_element() {
        let doc = Document::new();
        let root = doc.as_node();
        root.append_child(&doc.create_element("html").unwrap()).unwrap();
        let err = root.append_child(&doc.create_element("body").unwrap()).unwrap_err();
        assert_eq!(err.name(), "HierarchyRequestError");
        assert_eq!(root.child_nodes().len(), 1);
    }

    #[test]
    fn test_doctype_rules() {
        let doc = Document::new();
        let root = doc.as_node();
        let html = root.append_child(&doc.create_element("html").unwrap()).unwrap();
        let doctype = doc.create_document_type("html", "", "").unwrap();
        assert!(root.append_child(&doctype).is_err());
        root.insert_before(&doctype, Some(&html)).unwrap();
        assert_eq!(names(root), ["html", "HTML"]);
        let second = doc.create_document_type("html", "", "").unwrap();
        assert!(root.insert_before(&second, Some(&html)).is_err());
        let div = doc.create_element("div").unwrap();
        assert_eq!(div.append_child(&second).map_err(|e| e.name()), Err("HierarchyRequestError"));
    }

    #[test]
    fn test_text_under_document_rejected() {
        let doc = Document::new();
        let text = doc.create_text_node("x").unwrap();
        assert!(doc.as_node().append_child(&text).is_err());
    }

    #[test]
    fn test_cycle_rejected() {
        let doc = Document::new();
        let outer = doc.create_element("div").unwrap();
        let inner = doc.create_element("span").unwrap();
        outer.append_child(&inner).unwrap();
        assert!(inner.append_child(&outer).is_err());
        assert!(outer.append_child(&outer).is_err());
    }

    #[test]
    fn test_cycle_through_template_content() {
        let doc = Document::new();
        let template = doc.create_element("template").unwrap();
        let content = template.content().unwrap();
        let div = content.append_child(&doc.create_element("div").unwrap()).unwrap();
        assert_eq!(div.append_child(&template).map_err(|e| e.name()), Err("HierarchyRequestError"));
    }

    #[test]
    fn test_missing_reference_child() {
        let doc = Document::new();
        let a = doc.create_element("div").unwrap();
        let b = doc.create_element("div").unwrap();
        let c = doc.create_element("div").unwrap();
        assert_eq!(a.insert_before(&b, Some(&c)).map_err(|e| e.name()), Err("NotFoundError"));
        assert_eq!(a.remove_child(&b).map_err(|e| e.name()), Err("NotFoundError"));
    }

    #[test]
    fn test_cross_document_rejected() {
        let one = Document::new();
        let two = Document::new();
        let a = one.create_element("div").unwrap();
        let b = two.create_element("div").unwrap();
        assert_eq!(a.append_child(&b), Err(DomError::WrongDocument));
    }

    #[test]
    fn test_fragment_insertion_unpacks() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        let fragment = doc.create_document_fragment().unwrap();
        fragment.append(["a", "b"]).unwrap();
        div.append_child(&fragment).unwrap();
        assert_eq!(div.child_nodes().len(), 2);
        assert!(!fragment.has_child_nodes());
    }

    #[test]
    fn test_replace_child() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        let a = div.append_child(&doc.create_element("a").unwrap()).unwrap();
        let b = doc.create_element("b").unwrap();
        assert_eq!(div.replace_child(&b, &a), Ok(a.clone()));
        assert_eq!(names(&div), ["B"]);
        assert_eq!(a.parent_node(), None);
        assert_eq!(div.replace_child(&b, &b), Ok(b.clone()));
    }

    #[test]
    fn test_convenience_family() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        let b = doc.create_element("b").unwrap();
        div.append([Child::from("x"), Child::from(&b)]).unwrap();
        b.before(["<"]).unwrap();
        b.after([Child::from(doc.create_element("i").unwrap())]).unwrap();
        div.prepend(["start"]).unwrap();
        assert_eq!(names(&div), ["#text", "#text", "#text", "B", "I"]);
        b.replace_with(["bold"]).unwrap();
        assert_eq!(div.text_content(), Some("startx<bold".into()));
        div.replace_children(["only"]).unwrap();
        assert_eq!(names(&div), ["#text"]);
        div.first_child().unwrap().remove().unwrap();
        assert!(!div.has_child_nodes());
    }

    #[test]
    fn test_before_skips_moved_siblings() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        let a = div.append_child(&doc.create_element("a").unwrap()).unwrap();
        let b = div.append_child(&doc.create_element("b").unwrap()).unwrap();
        b.before([&a]).unwrap();
        assert_eq!(names(&div), ["A", "B"]);
        a.after([&b]).unwrap();
        assert_eq!(names(&div), ["A", "B"]);
    }

    #[test]
    fn test_dropped_document() {
        let div = {
            let doc = Document::new();
            doc.create_element("div").unwrap()
        };
        assert_eq!(div.child_nodes().len(), 0);
        assert_eq!(div.local_name(), None);
        assert_eq!(
            div.append(["x"]).map_err(|e| e.name()),
            Err("InvalidStateError")
        );
    }
}
