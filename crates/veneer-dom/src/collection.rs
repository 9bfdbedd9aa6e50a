//! Collection views
//!
//! Live views store a root and a filter and recompute their contents on
//! every access, so they always reflect the current tree. Only
//! `query_selector_all` produces a static snapshot.

use std::fmt;
use std::rc::{Rc, Weak};

use veneer_native::{NativeId, NativeTree};

use crate::coercion::uncoerce_name;
use crate::document::{DocumentInner, QuirksMode};
use crate::element::{find_by_ns, find_by_qualified, is_html_element, qualified};
use crate::error::{DomError, DomResult};
use crate::namespace;
use crate::node::{is_element, Node};

/// Element filter of an [`HtmlCollection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Filter {
    /// Element children of the root
    Children,
    /// Descendants by qualified name, `*` for all
    TagName(String),
    /// Descendants by namespace and local name, `*` wildcards
    TagNameNs {
        namespace: Option<String>,
        local_name: String,
    },
    /// Descendants carrying all of these classes
    ClassNames(Vec<String>),
}

impl Filter {
    fn matches(&self, tree: &NativeTree, element: NativeId, quirks_mode: QuirksMode) -> bool {
        let Some(name) = tree.name(element) else {
            return false;
        };
        match self {
            Filter::Children => true,
            Filter::TagName(wanted) if wanted == "*" => true,
            Filter::TagName(wanted) => {
                let actual = qualified(name);
                if name.namespace.as_deref() == Some(namespace::HTML) {
                    actual == wanted.to_ascii_lowercase()
                } else {
                    actual == *wanted
                }
            }
            Filter::TagNameNs {
                namespace,
                local_name,
            } => {
                let namespace_ok = match namespace.as_deref() {
                    Some("*") => true,
                    other => name.namespace.as_deref() == other,
                };
                namespace_ok && (local_name == "*" || uncoerce_name(&name.local) == local_name.as_str())
            }
            Filter::ClassNames(wanted) => {
                if wanted.is_empty() {
                    return false;
                }
                let Some(class) = find_by_ns(tree, element, None, "class").and_then(|a| tree.attribute_value(a))
                else {
                    return false;
                };
                let tokens: Vec<&str> = class.split_ascii_whitespace().collect();
                wanted.iter().all(|w| {
                    tokens.iter().any(|t| match quirks_mode {
                        QuirksMode::Quirks => t.eq_ignore_ascii_case(w),
                        _ => t == w,
                    })
                })
            }
        }
    }
}

enum ListSource {
    ChildNodes { doc: Weak<DocumentInner>, parent: NativeId },
    Static(Vec<Node>),
}

/// Ordered node list, live (`child_nodes`) or static (`query_selector_all`)
pub struct NodeList(ListSource);

impl NodeList {
    pub(crate) fn child_nodes(parent: &Node) -> Self {
        NodeList(ListSource::ChildNodes {
            doc: parent.0.doc.clone(),
            parent: parent.native(),
        })
    }

    pub(crate) fn snapshot(nodes: Vec<Node>) -> Self {
        NodeList(ListSource::Static(nodes))
    }

    pub fn is_live(&self) -> bool {
        matches!(self.0, ListSource::ChildNodes { .. })
    }

    pub fn len(&self) -> usize {
        match &self.0 {
            ListSource::ChildNodes { doc, parent } => doc.upgrade().map_or(0, |doc| doc.tree().child_count(*parent)),
            ListSource::Static(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn item(&self, index: usize) -> Option<Node> {
        match &self.0 {
            ListSource::ChildNodes { doc, parent } => {
                let doc = doc.upgrade()?;
                let child = doc.tree().children(*parent).nth(index)?;
                doc.resolve(child).ok()
            }
            ListSource::Static(nodes) => nodes.get(index).cloned(),
        }
    }

    /// Current contents
    pub fn to_vec(&self) -> Vec<Node> {
        match &self.0 {
            ListSource::ChildNodes { doc, parent } => match doc.upgrade() {
                Some(doc) => {
                    let children: Vec<NativeId> = doc.tree().children(*parent).collect();
                    doc.resolve_all(children)
                }
                None => Vec::new(),
            },
            ListSource::Static(nodes) => nodes.clone(),
        }
    }

    pub fn iter(&self) -> std::vec::IntoIter<Node> {
        self.to_vec().into_iter()
    }
}

impl IntoIterator for &NodeList {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

/// Live, filtered element collection
pub struct HtmlCollection {
    doc: Weak<DocumentInner>,
    root: NativeId,
    filter: Filter,
}

impl HtmlCollection {
    pub(crate) fn new(root: &Node, filter: Filter) -> Self {
        Self {
            doc: root.0.doc.clone(),
            root: root.native(),
            filter,
        }
    }

    pub(crate) fn children(root: &Node) -> Self {
        Self::new(root, Filter::Children)
    }

    fn evaluate(&self, doc: &DocumentInner) -> Vec<NativeId> {
        let tree = doc.tree();
        let quirks_mode = doc.quirks_mode();
        let candidates: Box<dyn Iterator<Item = NativeId> + '_> = match self.filter {
            Filter::Children => Box::new(tree.children(self.root)),
            _ => Box::new(tree.descendants(self.root)),
        };
        candidates
            .filter(|&id| is_element(&tree, id) && self.filter.matches(&tree, id, quirks_mode))
            .collect()
    }

    fn current(&self) -> Option<(Rc<DocumentInner>, Vec<NativeId>)> {
        let doc = self.doc.upgrade()?;
        let ids = self.evaluate(&doc);
        Some((doc, ids))
    }

    pub fn len(&self) -> usize {
        self.current().map_or(0, |(_, ids)| ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn item(&self, index: usize) -> Option<Node> {
        let (doc, ids) = self.current()?;
        doc.resolve(*ids.get(index)?).ok()
    }

    /// First element whose `id`, or (HTML elements only) `name`, is `key`
    pub fn named_item(&self, key: &str) -> Option<Node> {
        if key.is_empty() {
            return None;
        }
        let (doc, ids) = self.current()?;
        let found = {
            let tree = doc.tree();
            let value_is = |id: NativeId, attr: &str| {
                find_by_ns(&tree, id, None, attr).and_then(|a| tree.attribute_value(a)) == Some(key)
            };
            ids.iter()
                .copied()
                .find(|&id| value_is(id, "id") || (is_html_element(&tree, id) && value_is(id, "name")))
        };
        doc.resolve(found?).ok()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        match self.current() {
            Some((doc, ids)) => doc.resolve_all(ids),
            None => Vec::new(),
        }
    }

    pub fn iter(&self) -> std::vec::IntoIter<Node> {
        self.to_vec().into_iter()
    }
}

impl IntoIterator for &HtmlCollection {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Live view of an element's attributes
pub struct NamedNodeMap {
    doc: Weak<DocumentInner>,
    element: NativeId,
}

impl NamedNodeMap {
    pub(crate) fn new(element: &Node) -> Self {
        Self {
            doc: element.0.doc.clone(),
            element: element.native(),
        }
    }

    fn element(&self) -> DomResult<Node> {
        let doc = self.doc.upgrade().ok_or_else(DomError::detached)?;
        doc.resolve(self.element)
    }

    pub fn len(&self) -> usize {
        self.doc
            .upgrade()
            .map_or(0, |doc| doc.tree().attribute_count(self.element))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn item(&self, index: usize) -> Option<Node> {
        let doc = self.doc.upgrade()?;
        let attr = *doc.tree().attributes(self.element).get(index)?;
        doc.resolve(attr).ok()
    }

    pub fn get_named_item(&self, qualified_name: &str) -> Option<Node> {
        self.element().ok()?.get_attribute_node(qualified_name)
    }

    pub fn get_named_item_ns(&self, namespace: Option<&str>, local_name: &str) -> Option<Node> {
        self.element().ok()?.get_attribute_node_ns(namespace, local_name)
    }

    pub fn set_named_item(&self, attr: &Node) -> DomResult<Option<Node>> {
        self.element()?.set_attribute_node(attr)
    }

    pub fn remove_named_item(&self, qualified_name: &str) -> DomResult<Node> {
        let element = self.element()?;
        let attr = element
            .get_attribute_node(qualified_name)
            .ok_or(DomError::NotFound("no attribute with that name"))?;
        element.remove_attribute_node(&attr)
    }

    pub fn remove_named_item_ns(&self, namespace: Option<&str>, local_name: &str) -> DomResult<Node> {
        let element = self.element()?;
        let attr = element
            .get_attribute_node_ns(namespace, local_name)
            .ok_or(DomError::NotFound("no attribute with that name"))?;
        element.remove_attribute_node(&attr)
    }

    pub fn to_vec(&self) -> Vec<Node> {
        match self.doc.upgrade() {
            Some(doc) => {
                let attrs = doc.tree().attributes(self.element);
                doc.resolve_all(attrs)
            }
            None => Vec::new(),
        }
    }

    pub fn iter(&self) -> std::vec::IntoIter<Node> {
        self.to_vec().into_iter()
    }

    /// Whether an attribute with this qualified name exists
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.doc
            .upgrade()
            .is_some_and(|doc| find_by_qualified(&doc.tree(), self.element, qualified_name).is_some())
    }
}

impl IntoIterator for &NamedNodeMap {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
