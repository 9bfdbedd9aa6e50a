//! Wrapper nodes
//!
//! A [`Node`] is a cheap, clonable handle to the one wrapper the identity
//! cache holds for a native node. Two handles are equal only when they
//! point at the same wrapper, which in turn means the same native node.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use veneer_native::{NativeData, NativeId, NativeTree};

use crate::coercion::uncoerce_name;
use crate::collection::{HtmlCollection, NodeList};
use crate::document::{Document, DocumentInner, DOCTYPE_PLACEHOLDER};
use crate::error::{DomError, DomResult};
use crate::namespace;

/// Element flavour, fixed when the wrapper is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Html,
    /// HTML `template`, which owns a content fragment
    Template,
    Svg,
    MathMl,
    Other,
}

/// Wrapper variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    DocumentType,
    DocumentFragment,
    Element(ElementKind),
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// DOM `nodeType` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
}

impl NodeType {
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

pub(crate) struct NodeInner {
    pub(crate) doc: Weak<DocumentInner>,
    pub(crate) native: NativeId,
    pub(crate) kind: NodeKind,
    /// Content fragment of a template element
    pub(crate) content: Option<Node>,
}

/// Handle to a DOM node
#[derive(Clone)]
pub struct Node(pub(crate) Rc<NodeInner>);

/// Non-owning handle, see [`Node::downgrade`]
#[derive(Clone)]
pub struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.0.kind)
            .field("name", &self.node_name())
            .field("native", &self.0.native)
            .finish()
    }
}

impl Node {
    /// Crate-private construction; everything else goes through
    /// [`DocumentInner::resolve`]
    pub(crate) fn from_parts(doc: Weak<DocumentInner>, native: NativeId, kind: NodeKind, content: Option<Node>) -> Self {
        Node(Rc::new(NodeInner {
            doc,
            native,
            kind,
            content,
        }))
    }

    #[inline]
    pub(crate) fn native(&self) -> NativeId {
        self.0.native
    }

    pub(crate) fn doc(&self) -> Option<Rc<DocumentInner>> {
        self.0.doc.upgrade()
    }

    /// The owning document, or `InvalidStateError` once it is gone
    pub(crate) fn owner(&self) -> DomResult<Rc<DocumentInner>> {
        self.doc().ok_or_else(DomError::detached)
    }

    /// Read from the native tree; the default value when the document is gone
    pub(crate) fn read<R: Default>(&self, f: impl FnOnce(&NativeTree, NativeId) -> R) -> R {
        match self.doc() {
            Some(doc) => f(&doc.tree(), self.native()),
            None => R::default(),
        }
    }

    /// Resolve a related native node after the tree borrow is released
    pub(crate) fn related(&self, f: impl FnOnce(&NativeTree, NativeId) -> Option<NativeId>) -> Option<Node> {
        let doc = self.doc()?;
        let id = f(&doc.tree(), self.native())?;
        doc.resolve(id).ok()
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    /// Same wrapper (and therefore same native node)
    pub fn is_same_node(&self, other: &Node) -> bool {
        self == other
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    pub fn node_type(&self) -> NodeType {
        match self.0.kind {
            NodeKind::Document => NodeType::Document,
            NodeKind::DocumentType => NodeType::DocumentType,
            NodeKind::DocumentFragment => NodeType::DocumentFragment,
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Attribute => NodeType::Attribute,
            NodeKind::Text => NodeType::Text,
            NodeKind::Comment => NodeType::Comment,
            NodeKind::ProcessingInstruction => NodeType::ProcessingInstruction,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }

    pub fn is_template(&self) -> bool {
        self.0.kind == NodeKind::Element(ElementKind::Template)
    }

    pub(crate) fn is_parent_kind(&self) -> bool {
        matches!(
            self.0.kind,
            NodeKind::Document | NodeKind::DocumentFragment | NodeKind::Element(_)
        )
    }

    /// Document this node belongs to (itself for a document node)
    pub fn document(&self) -> Option<Document> {
        self.doc().map(Document)
    }

    /// DOM `ownerDocument`: `None` for document nodes
    pub fn owner_document(&self) -> Option<Document> {
        match self.0.kind {
            NodeKind::Document => None,
            _ => self.document(),
        }
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    /// DOM `nodeName`
    pub fn node_name(&self) -> String {
        match self.0.kind {
            NodeKind::Element(_) => self.tag_name().unwrap_or_default(),
            NodeKind::Attribute => self.qualified_name().unwrap_or_default(),
            NodeKind::Text => "#text".to_string(),
            NodeKind::Comment => "#comment".to_string(),
            NodeKind::Document => "#document".to_string(),
            NodeKind::DocumentFragment => "#document-fragment".to_string(),
            NodeKind::DocumentType => self.name().unwrap_or_default(),
            NodeKind::ProcessingInstruction => self.target().unwrap_or_default(),
        }
    }

    /// `prefix:local` for elements and attributes, uncoerced
    pub fn qualified_name(&self) -> Option<String> {
        self.read(|tree, id| {
            let name = tree.name(id)?;
            let local = uncoerce_name(&name.local);
            Some(match &name.prefix {
                Some(prefix) => format!("{prefix}:{local}"),
                None => local.into_owned(),
            })
        })
    }

    /// Element `tagName`: the qualified name, upper-cased for HTML elements
    pub fn tag_name(&self) -> Option<String> {
        if !self.is_element() {
            return None;
        }
        let qualified = self.qualified_name()?;
        match self.namespace_uri().as_deref() {
            Some(namespace::HTML) => Some(qualified.to_ascii_uppercase()),
            _ => Some(qualified),
        }
    }

    pub fn local_name(&self) -> Option<String> {
        self.read(|tree, id| tree.name(id).map(|name| uncoerce_name(&name.local).into_owned()))
    }

    pub fn namespace_uri(&self) -> Option<String> {
        self.read(|tree, id| tree.name(id).and_then(|name| name.namespace.clone()))
    }

    pub fn prefix(&self) -> Option<String> {
        self.read(|tree, id| tree.name(id).and_then(|name| name.prefix.clone()))
    }

    /// Doctype name (placeholder mapped back to empty)
    pub fn name(&self) -> Option<String> {
        self.read(|tree, id| match tree.data(id).ok()? {
            NativeData::Doctype { name, .. } if name == DOCTYPE_PLACEHOLDER => Some(String::new()),
            NativeData::Doctype { name, .. } => Some(name.clone()),
            _ => None,
        })
    }

    pub fn public_id(&self) -> Option<String> {
        self.read(|tree, id| match tree.data(id).ok()? {
            NativeData::Doctype { public_id, .. } => Some(public_id.clone()),
            _ => None,
        })
    }

    pub fn system_id(&self) -> Option<String> {
        self.read(|tree, id| match tree.data(id).ok()? {
            NativeData::Doctype { system_id, .. } => Some(system_id.clone()),
            _ => None,
        })
    }

    /// Processing instruction target
    pub fn target(&self) -> Option<String> {
        self.read(|tree, id| match tree.data(id).ok()? {
            NativeData::ProcessingInstruction { target, .. } => Some(target.clone()),
            _ => None,
        })
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent_node(&self) -> Option<Node> {
        self.related(|tree, id| tree.parent(id))
    }

    pub fn parent_element(&self) -> Option<Node> {
        self.parent_node().filter(Node::is_element)
    }

    pub fn first_child(&self) -> Option<Node> {
        self.related(|tree, id| tree.first_child(id))
    }

    pub fn last_child(&self) -> Option<Node> {
        self.related(|tree, id| tree.last_child(id))
    }

    pub fn next_sibling(&self) -> Option<Node> {
        self.related(|tree, id| tree.next_sibling(id))
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        self.related(|tree, id| tree.prev_sibling(id))
    }

    pub fn has_child_nodes(&self) -> bool {
        self.read(|tree, id| tree.first_child(id).is_some())
    }

    /// Live list of children
    pub fn child_nodes(&self) -> NodeList {
        NodeList::child_nodes(self)
    }

    /// Live collection of element children
    pub fn children(&self) -> HtmlCollection {
        HtmlCollection::children(self)
    }

    pub fn first_element_child(&self) -> Option<Node> {
        self.related(|tree, id| tree.children(id).find(|&c| is_element(tree, c)))
    }

    pub fn last_element_child(&self) -> Option<Node> {
        self.related(|tree, id| {
            let mut current = tree.last_child(id);
            while let Some(child) = current {
                if is_element(tree, child) {
                    return Some(child);
                }
                current = tree.prev_sibling(child);
            }
            None
        })
    }

    pub fn next_element_sibling(&self) -> Option<Node> {
        self.related(|tree, id| {
            let mut current = tree.next_sibling(id);
            while let Some(sibling) = current {
                if is_element(tree, sibling) {
                    return Some(sibling);
                }
                current = tree.next_sibling(sibling);
            }
            None
        })
    }

    pub fn previous_element_sibling(&self) -> Option<Node> {
        self.related(|tree, id| {
            let mut current = tree.prev_sibling(id);
            while let Some(sibling) = current {
                if is_element(tree, sibling) {
                    return Some(sibling);
                }
                current = tree.prev_sibling(sibling);
            }
            None
        })
    }

    pub fn child_element_count(&self) -> usize {
        self.read(|tree, id| tree.children(id).filter(|&c| is_element(tree, c)).count())
    }

    /// Topmost ancestor
    pub fn get_root_node(&self) -> Node {
        self.related(|tree, id| Some(tree.root_of(id)))
            .unwrap_or_else(|| self.clone())
    }

    /// Attached to its document
    pub fn is_connected(&self) -> bool {
        self.read(|tree, id| tree.root_of(id) == tree.root())
    }

    /// Inclusive descendant test
    pub fn contains(&self, other: &Node) -> bool {
        if self.native().tree() != other.native().tree() {
            return false;
        }
        self.read(|tree, id| {
            let mut current = Some(other.native());
            while let Some(node) = current {
                if node == id {
                    return true;
                }
                current = tree.parent(node);
            }
            false
        })
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// DOM `nodeValue`
    pub fn node_value(&self) -> Option<String> {
        match self.0.kind {
            NodeKind::Attribute => self.value(),
            NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction => self.data(),
            _ => None,
        }
    }

    pub fn set_node_value(&self, value: Option<&str>) -> DomResult<()> {
        let value = value.unwrap_or_default();
        match self.0.kind {
            NodeKind::Attribute => self.set_value(value),
            NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction => self.set_data(value),
            _ => Ok(()),
        }
    }

    /// DOM `textContent`
    pub fn text_content(&self) -> Option<String> {
        match self.0.kind {
            NodeKind::Document | NodeKind::DocumentType => None,
            NodeKind::Element(_) | NodeKind::DocumentFragment => Some(self.read(|tree, id| {
                tree.descendants(id)
                    .filter_map(|d| match tree.data(d) {
                        Ok(NativeData::Text(text)) => Some(text.as_str()),
                        _ => None,
                    })
                    .collect()
            })),
            _ => self.node_value(),
        }
    }

    pub fn set_text_content(&self, value: Option<&str>) -> DomResult<()> {
        match self.0.kind {
            NodeKind::Document | NodeKind::DocumentType => Ok(()),
            NodeKind::Element(_) | NodeKind::DocumentFragment => {
                let replacement = match value.unwrap_or_default() {
                    "" => None,
                    text => Some(self.owner()?.create_text(text)?),
                };
                self.replace_all(replacement.as_ref())
            }
            _ => self.set_node_value(value),
        }
    }

    // ------------------------------------------------------------------
    // Character data
    // ------------------------------------------------------------------

    /// Data of a text, comment or processing instruction node
    pub fn data(&self) -> Option<String> {
        self.read(|tree, id| tree.character_data(id).map(str::to_string))
    }

    pub fn set_data(&self, value: &str) -> DomResult<()> {
        if !self.is_character_data() {
            return Err(DomError::Type(format!("{:?} nodes carry no character data", self.0.kind)));
        }
        let doc = self.owner()?;
        doc.tree_mut()
            .set_character_data(self.native(), value)
            .map_err(DomError::invariant)
    }

    /// Length in UTF-16 code units
    pub fn length(&self) -> usize {
        match self.0.kind {
            NodeKind::DocumentType => 0,
            _ if self.is_character_data() => self.data().map_or(0, |d| d.encode_utf16().count()),
            NodeKind::Attribute => 0,
            _ => self.read(|tree, id| tree.child_count(id)),
        }
    }

    pub fn substring_data(&self, offset: usize, count: usize) -> DomResult<String> {
        let units: Vec<u16> = self.character_data()?.encode_utf16().collect();
        if offset > units.len() {
            return Err(DomError::IndexSize(offset));
        }
        let end = offset.saturating_add(count).min(units.len());
        Ok(String::from_utf16_lossy(&units[offset..end]))
    }

    pub fn append_data(&self, data: &str) -> DomResult<()> {
        let length = self.length();
        self.replace_data(length, 0, data)
    }

    pub fn insert_data(&self, offset: usize, data: &str) -> DomResult<()> {
        self.replace_data(offset, 0, data)
    }

    pub fn delete_data(&self, offset: usize, count: usize) -> DomResult<()> {
        self.replace_data(offset, count, "")
    }

    /// Replace `count` UTF-16 units at `offset`
    pub fn replace_data(&self, offset: usize, count: usize, data: &str) -> DomResult<()> {
        let units: Vec<u16> = self.character_data()?.encode_utf16().collect();
        if offset > units.len() {
            return Err(DomError::IndexSize(offset));
        }
        let end = offset.saturating_add(count).min(units.len());
        let mut replaced = Vec::with_capacity(units.len() + data.len());
        replaced.extend_from_slice(&units[..offset]);
        replaced.extend(data.encode_utf16());
        replaced.extend_from_slice(&units[end..]);
        self.set_data(&String::from_utf16_lossy(&replaced))
    }

    /// Split a text node at `offset`, returning the new following node
    pub fn split_text(&self, offset: usize) -> DomResult<Node> {
        if self.0.kind != NodeKind::Text {
            return Err(DomError::Type("split_text requires a text node".into()));
        }
        let length = self.length();
        if offset > length {
            return Err(DomError::IndexSize(offset));
        }
        let tail = self.substring_data(offset, length - offset)?;
        let doc = self.owner()?;
        let new = doc.create_text(&tail)?;
        if let Some(parent) = self.parent_node() {
            let next = self.next_sibling();
            parent.insert_before(&new, next.as_ref())?;
        }
        self.replace_data(offset, length - offset, "")?;
        Ok(new)
    }

    fn is_character_data(&self) -> bool {
        matches!(
            self.0.kind,
            NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction
        )
    }

    fn character_data(&self) -> DomResult<String> {
        if !self.is_character_data() {
            return Err(DomError::Type(format!("{:?} nodes carry no character data", self.0.kind)));
        }
        Ok(self.data().unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Whole-node operations
    // ------------------------------------------------------------------

    /// Copy this node (and its subtree when `deep`) within its document
    pub fn clone_node(&self, deep: bool) -> DomResult<Node> {
        if self.0.kind == NodeKind::Document {
            return Err(DomError::NotSupported("cloning a document"));
        }
        let doc = self.owner()?;
        let copy = doc.copy_subtree(&doc, self.native(), deep)?;
        doc.resolve(copy)
    }

    /// Structural equality
    pub fn is_equal_node(&self, other: &Node) -> bool {
        let (Some(a), Some(b)) = (self.doc(), other.doc()) else {
            return false;
        };
        let (left, right) = (a.tree(), b.tree());
        equal_nodes(&left, self.native(), &right, other.native())
    }

    /// Merge adjacent text nodes and drop empty ones
    pub fn normalize(&self) -> DomResult<()> {
        let doc = self.owner()?;
        let mut tree = doc.tree_mut();
        let texts: Vec<NativeId> = tree
            .descendants(self.native())
            .filter(|&d| matches!(tree.data(d), Ok(NativeData::Text(_))))
            .collect();
        for text in texts {
            let Some(parent) = tree.parent(text) else {
                continue;
            };
            let mut merged = tree.character_data(text).unwrap_or_default().to_string();
            let mut next = tree.next_sibling(text);
            while let Some(sibling) = next {
                let Ok(NativeData::Text(data)) = tree.data(sibling) else {
                    break;
                };
                merged.push_str(data);
                next = tree.next_sibling(sibling);
                tree.remove_child(parent, sibling).map_err(DomError::invariant)?;
            }
            if merged.is_empty() {
                tree.remove_child(parent, text).map_err(DomError::invariant)?;
            } else {
                tree.set_character_data(text, &merged).map_err(DomError::invariant)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn is_element(tree: &NativeTree, id: NativeId) -> bool {
    matches!(tree.data(id), Ok(NativeData::Element { .. }))
}

fn equal_nodes(left: &NativeTree, a: NativeId, right: &NativeTree, b: NativeId) -> bool {
    let (Ok(x), Ok(y)) = (left.data(a), right.data(b)) else {
        return false;
    };
    let same = match (x, y) {
        (NativeData::Document, NativeData::Document) | (NativeData::Fragment, NativeData::Fragment) => true,
        (
            NativeData::Doctype {
                name,
                public_id,
                system_id,
            },
            NativeData::Doctype {
                name: n,
                public_id: p,
                system_id: s,
            },
        ) => name == n && public_id == p && system_id == s,
        (NativeData::Element { name, .. }, NativeData::Element { name: other, .. }) => {
            name == other && equal_attributes(left, a, right, b)
        }
        (
            NativeData::Attribute { name, value, .. },
            NativeData::Attribute {
                name: n, value: v, ..
            },
        ) => name == n && value == v,
        (NativeData::Text(x), NativeData::Text(y)) | (NativeData::Comment(x), NativeData::Comment(y)) => x == y,
        (
            NativeData::ProcessingInstruction { target, data },
            NativeData::ProcessingInstruction { target: t, data: d },
        ) => target == t && data == d,
        _ => false,
    };
    if !same || left.child_count(a) != right.child_count(b) {
        return false;
    }
    left.children(a)
        .zip(right.children(b))
        .all(|(x, y)| equal_nodes(left, x, right, y))
}

fn equal_attributes(left: &NativeTree, a: NativeId, right: &NativeTree, b: NativeId) -> bool {
    if left.attribute_count(a) != right.attribute_count(b) {
        return false;
    }
    left.attributes(a).into_iter().all(|attr| {
        let Some(name) = left.name(attr) else {
            return false;
        };
        right
            .find_attribute(b, name.namespace.as_deref(), &name.local)
            .is_some_and(|other| right.attribute_value(other) == left.attribute_value(attr))
    })
}
