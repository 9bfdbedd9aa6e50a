//! Native tree (arena-based allocation)

use crate::name::is_ncname;
use crate::{NativeData, NativeError, NativeId, NativeKind, NativeName, NativeNode, NativeResult, TreeId};

/// Arena-backed document tree
///
/// Slot 0 is always the document node. Removing a node only unlinks it; the
/// slot stays allocated so handles never dangle.
#[derive(Debug)]
pub struct NativeTree {
    id: TreeId,
    nodes: Vec<NativeNode>,
}

impl NativeTree {
    /// Create a tree holding only a document node
    pub fn new() -> Self {
        let mut tree = Self {
            id: TreeId::next(),
            nodes: Vec::new(),
        };
        tree.push(NativeData::Document);
        tree
    }

    #[inline]
    pub fn id(&self) -> TreeId {
        self.id
    }

    /// The document node
    #[inline]
    pub fn root(&self) -> NativeId {
        self.handle(0)
    }

    /// Number of allocated slots
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` points into this tree
    pub fn owns(&self, id: NativeId) -> bool {
        self.index(id).is_ok()
    }

    pub fn get(&self, id: NativeId) -> NativeResult<&NativeNode> {
        let index = self.index(id)?;
        Ok(self.node(index))
    }

    pub fn kind(&self, id: NativeId) -> NativeResult<NativeKind> {
        Ok(self.get(id)?.kind())
    }

    pub fn data(&self, id: NativeId) -> NativeResult<&NativeData> {
        Ok(&self.get(id)?.data)
    }

    /// Element or attribute name
    pub fn name(&self, id: NativeId) -> Option<&NativeName> {
        match self.data(id).ok()? {
            NativeData::Element { name, .. } | NativeData::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    pub fn create_element(
        &mut self,
        namespace: Option<&str>,
        prefix: Option<&str>,
        local: &str,
    ) -> NativeResult<NativeId> {
        check_name(prefix, local)?;
        let index = self.push(NativeData::Element {
            name: NativeName::new(namespace, prefix, local),
            attrs: Vec::new(),
        });
        Ok(self.handle(index))
    }

    pub fn create_attribute(
        &mut self,
        namespace: Option<&str>,
        prefix: Option<&str>,
        local: &str,
        value: &str,
    ) -> NativeResult<NativeId> {
        check_name(prefix, local)?;
        let index = self.push(NativeData::Attribute {
            name: NativeName::new(namespace, prefix, local),
            value: value.to_owned(),
            owner: None,
        });
        Ok(self.handle(index))
    }

    pub fn create_text(&mut self, data: &str) -> NativeId {
        let index = self.push(NativeData::Text(data.to_owned()));
        self.handle(index)
    }

    pub fn create_comment(&mut self, data: &str) -> NativeId {
        let index = self.push(NativeData::Comment(data.to_owned()));
        self.handle(index)
    }

    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> NativeResult<NativeId> {
        if target.is_empty() {
            return Err(NativeError::InvalidName(String::new()));
        }
        let index = self.push(NativeData::ProcessingInstruction {
            target: target.to_owned(),
            data: data.to_owned(),
        });
        Ok(self.handle(index))
    }

    pub fn create_doctype(&mut self, name: &str, public_id: &str, system_id: &str) -> NativeResult<NativeId> {
        if name.is_empty() {
            return Err(NativeError::EmptyDoctypeName);
        }
        let index = self.push(NativeData::Doctype {
            name: name.to_owned(),
            public_id: public_id.to_owned(),
            system_id: system_id.to_owned(),
        });
        Ok(self.handle(index))
    }

    pub fn create_fragment(&mut self) -> NativeId {
        let index = self.push(NativeData::Fragment);
        self.handle(index)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NativeId) -> Option<NativeId> {
        let index = self.index(id).ok()?;
        self.node(index).parent.map(|p| self.handle(p))
    }

    pub fn first_child(&self, id: NativeId) -> Option<NativeId> {
        let index = self.index(id).ok()?;
        self.node(index).first_child.map(|c| self.handle(c))
    }

    pub fn last_child(&self, id: NativeId) -> Option<NativeId> {
        let index = self.index(id).ok()?;
        self.node(index).last_child.map(|c| self.handle(c))
    }

    pub fn next_sibling(&self, id: NativeId) -> Option<NativeId> {
        let index = self.index(id).ok()?;
        self.node(index).next_sibling.map(|s| self.handle(s))
    }

    pub fn prev_sibling(&self, id: NativeId) -> Option<NativeId> {
        let index = self.index(id).ok()?;
        self.node(index).prev_sibling.map(|s| self.handle(s))
    }

    /// Children in order
    pub fn children(&self, id: NativeId) -> Children<'_> {
        let next = self.index(id).ok().and_then(|i| self.node(i).first_child);
        Children { tree: self, next }
    }

    pub fn child_count(&self, id: NativeId) -> usize {
        self.children(id).count()
    }

    /// Descendants in tree order, excluding `id` itself
    pub fn descendants(&self, id: NativeId) -> Descendants<'_> {
        match self.index(id) {
            Ok(root) => Descendants {
                tree: self,
                root,
                next: self.node(root).first_child,
            },
            Err(_) => Descendants {
                tree: self,
                root: 0,
                next: None,
            },
        }
    }

    /// Topmost ancestor (the node itself when detached)
    pub fn root_of(&self, id: NativeId) -> NativeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    // ------------------------------------------------------------------
    // Structure mutation
    // ------------------------------------------------------------------

    pub fn append_child(&mut self, parent: NativeId, child: NativeId) -> NativeResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or at the end), detaching it first
    pub fn insert_before(
        &mut self,
        parent: NativeId,
        child: NativeId,
        reference: Option<NativeId>,
    ) -> NativeResult<()> {
        let p = self.index(parent)?;
        let c = self.index(child)?;
        let mut r = match reference {
            Some(reference) => Some(self.index(reference)?),
            None => None,
        };
        match self.node(c).kind() {
            kind @ (NativeKind::Document | NativeKind::Attribute) => return Err(NativeError::WrongKind(kind)),
            _ => {}
        }
        if let Some(r) = r
            && self.node(r).parent != Some(p)
        {
            return Err(NativeError::NotAChild {
                parent,
                child: self.handle(r),
            });
        }
        if r == Some(c) {
            r = self.node(c).next_sibling;
        }
        self.unlink(c);
        self.link_before(p, c, r);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NativeId, child: NativeId) -> NativeResult<()> {
        let p = self.index(parent)?;
        let c = self.index(child)?;
        if self.node(c).parent != Some(p) {
            return Err(NativeError::NotAChild { parent, child });
        }
        self.unlink(c);
        Ok(())
    }

    /// Unlink a node from whatever parent it has
    pub fn detach(&mut self, id: NativeId) -> NativeResult<()> {
        let index = self.index(id)?;
        self.unlink(index);
        Ok(())
    }

    /// Put `new_child` where `old_child` is
    pub fn replace_child(&mut self, parent: NativeId, new_child: NativeId, old_child: NativeId) -> NativeResult<()> {
        let p = self.index(parent)?;
        let new = self.index(new_child)?;
        let old = self.index(old_child)?;
        if self.node(old).parent != Some(p) {
            return Err(NativeError::NotAChild {
                parent,
                child: old_child,
            });
        }
        if new == old {
            return Ok(());
        }
        match self.node(new).kind() {
            kind @ (NativeKind::Document | NativeKind::Attribute) => return Err(NativeError::WrongKind(kind)),
            _ => {}
        }
        self.unlink(new);
        let reference = self.node(old).next_sibling;
        self.unlink(old);
        self.link_before(p, new, reference);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Character data
    // ------------------------------------------------------------------

    /// Data of a text, comment or processing instruction node
    pub fn character_data(&self, id: NativeId) -> Option<&str> {
        match self.data(id).ok()? {
            NativeData::Text(data) | NativeData::Comment(data) => Some(data),
            NativeData::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn set_character_data(&mut self, id: NativeId, value: &str) -> NativeResult<()> {
        let index = self.index(id)?;
        match &mut self.node_mut(index).data {
            NativeData::Text(data) | NativeData::Comment(data) => {
                value.clone_into(data);
                Ok(())
            }
            NativeData::ProcessingInstruction { data, .. } => {
                value.clone_into(data);
                Ok(())
            }
            other => Err(NativeError::WrongKind(other.kind())),
        }
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Attribute nodes of an element, in order (empty for other kinds)
    pub fn attributes(&self, element: NativeId) -> Vec<NativeId> {
        match self.data(element) {
            Ok(NativeData::Element { attrs, .. }) => attrs.iter().map(|&a| self.handle(a)).collect(),
            _ => Vec::new(),
        }
    }

    pub fn attribute_count(&self, element: NativeId) -> usize {
        match self.data(element) {
            Ok(NativeData::Element { attrs, .. }) => attrs.len(),
            _ => 0,
        }
    }

    pub fn find_attribute(&self, element: NativeId, namespace: Option<&str>, local: &str) -> Option<NativeId> {
        self.attributes(element)
            .into_iter()
            .find(|&attr| self.name(attr).is_some_and(|name| name.matches(namespace, local)))
    }

    /// Set (or create) the attribute with the given namespace and local name
    pub fn set_attribute(
        &mut self,
        element: NativeId,
        namespace: Option<&str>,
        prefix: Option<&str>,
        local: &str,
        value: &str,
    ) -> NativeResult<NativeId> {
        if let Some(existing) = self.find_attribute(element, namespace, local) {
            self.set_attribute_value(existing, value)?;
            return Ok(existing);
        }
        let attr = self.create_attribute(namespace, prefix, local, value)?;
        self.attach_attribute(element, attr)?;
        Ok(attr)
    }

    /// Attach an attribute node, replacing one with the same namespace and
    /// local name in place. Returns the replaced attribute.
    pub fn attach_attribute(&mut self, element: NativeId, attr: NativeId) -> NativeResult<Option<NativeId>> {
        let e = self.index(element)?;
        let a = self.index(attr)?;
        let (namespace, local) = match &self.node(a).data {
            NativeData::Attribute { name, .. } => (name.namespace.clone(), name.local.clone()),
            other => return Err(NativeError::WrongKind(other.kind())),
        };
        if !matches!(self.node(e).data, NativeData::Element { .. }) {
            return Err(NativeError::WrongKind(self.node(e).kind()));
        }
        if self.owner_index(a) == Some(e) {
            return Ok(None);
        }
        self.detach_attribute(attr)?;
        let existing = self.find_attribute(element, namespace.as_deref(), &local);
        let replaced = existing.map(|old| old.index);
        if let NativeData::Element { attrs, .. } = &mut self.node_mut(e).data {
            match replaced.and_then(|old| attrs.iter().position(|&x| x == old)) {
                Some(position) => attrs[position] = a,
                None => attrs.push(a),
            }
        }
        if let Some(old) = replaced {
            self.set_owner(old, None);
        }
        self.set_owner(a, Some(e));
        Ok(existing)
    }

    /// Detach an attribute from its owner element (no-op when unowned)
    pub fn detach_attribute(&mut self, attr: NativeId) -> NativeResult<()> {
        let a = self.index(attr)?;
        let Some(owner) = self.owner_index(a) else {
            return Ok(());
        };
        if let NativeData::Element { attrs, .. } = &mut self.node_mut(owner).data {
            attrs.retain(|&x| x != a);
        }
        self.set_owner(a, None);
        Ok(())
    }

    pub fn attribute_value(&self, attr: NativeId) -> Option<&str> {
        match self.data(attr).ok()? {
            NativeData::Attribute { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn set_attribute_value(&mut self, attr: NativeId, new_value: &str) -> NativeResult<()> {
        let index = self.index(attr)?;
        match &mut self.node_mut(index).data {
            NativeData::Attribute { value, .. } => {
                new_value.clone_into(value);
                Ok(())
            }
            other => Err(NativeError::WrongKind(other.kind())),
        }
    }

    pub fn owner_element(&self, attr: NativeId) -> Option<NativeId> {
        let index = self.index(attr).ok()?;
        self.owner_index(index).map(|o| self.handle(o))
    }

    // ------------------------------------------------------------------
    // Cloning
    // ------------------------------------------------------------------

    /// Copy a node (and its subtree when `deep`) inside this tree
    pub fn clone_node(&mut self, id: NativeId, deep: bool) -> NativeResult<NativeId> {
        let index = self.index(id)?;
        let blueprint = self.blueprint(index, deep);
        let copy = self.build(blueprint);
        Ok(self.handle(copy))
    }

    /// Copy a node from another tree into this one, detached
    pub fn import_node(&mut self, source: &NativeTree, id: NativeId, deep: bool) -> NativeResult<NativeId> {
        let index = source.index(id)?;
        let blueprint = source.blueprint(index, deep);
        let copy = self.build(blueprint);
        Ok(self.handle(copy))
    }

    fn blueprint(&self, index: u32, deep: bool) -> Blueprint {
        let node = self.node(index);
        let (data, attrs) = match &node.data {
            NativeData::Element { name, attrs } => (
                NativeData::Element {
                    name: name.clone(),
                    attrs: Vec::new(),
                },
                attrs
                    .iter()
                    .filter_map(|&a| match &self.node(a).data {
                        NativeData::Attribute { name, value, .. } => Some((name.clone(), value.clone())),
                        _ => None,
                    })
                    .collect(),
            ),
            NativeData::Attribute { name, value, .. } => (
                NativeData::Attribute {
                    name: name.clone(),
                    value: value.clone(),
                    owner: None,
                },
                Vec::new(),
            ),
            other => (other.clone(), Vec::new()),
        };
        let mut children = Vec::new();
        if deep {
            let mut next = node.first_child;
            while let Some(child) = next {
                children.push(self.blueprint(child, true));
                next = self.node(child).next_sibling;
            }
        }
        Blueprint { data, attrs, children }
    }

    fn build(&mut self, blueprint: Blueprint) -> u32 {
        let index = self.push(blueprint.data);
        for (name, value) in blueprint.attrs {
            let attr = self.push(NativeData::Attribute {
                name,
                value,
                owner: Some(index),
            });
            if let NativeData::Element { attrs, .. } = &mut self.node_mut(index).data {
                attrs.push(attr);
            }
        }
        for child in blueprint.children {
            let child = self.build(child);
            self.link_before(index, child, None);
        }
        index
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    #[inline]
    pub(crate) fn handle(&self, index: u32) -> NativeId {
        NativeId { tree: self.id, index }
    }

    pub(crate) fn index(&self, id: NativeId) -> NativeResult<u32> {
        if id.tree != self.id {
            return Err(NativeError::ForeignNode(id));
        }
        if id.index as usize >= self.nodes.len() {
            return Err(NativeError::UnknownNode(id));
        }
        Ok(id.index)
    }

    #[inline]
    pub(crate) fn node(&self, index: u32) -> &NativeNode {
        &self.nodes[index as usize]
    }

    #[inline]
    fn node_mut(&mut self, index: u32) -> &mut NativeNode {
        &mut self.nodes[index as usize]
    }

    fn push(&mut self, data: NativeData) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(NativeNode::new(data));
        index
    }

    pub(crate) fn owner_index(&self, attr: u32) -> Option<u32> {
        match &self.node(attr).data {
            NativeData::Attribute { owner, .. } => *owner,
            _ => None,
        }
    }

    fn set_owner(&mut self, attr: u32, element: Option<u32>) {
        if let NativeData::Attribute { owner, .. } = &mut self.node_mut(attr).data {
            *owner = element;
        }
    }

    fn unlink(&mut self, index: u32) {
        let node = self.node(index);
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        let Some(parent) = parent else {
            return;
        };
        match prev {
            Some(prev) => self.node_mut(prev).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }
        match next {
            Some(next) => self.node_mut(next).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }
        let node = self.node_mut(index);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    fn link_before(&mut self, parent: u32, child: u32, reference: Option<u32>) {
        let prev = match reference {
            Some(reference) => self.node(reference).prev_sibling,
            None => self.node(parent).last_child,
        };
        {
            let node = self.node_mut(child);
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        match prev {
            Some(prev) => self.node_mut(prev).next_sibling = Some(child),
            None => self.node_mut(parent).first_child = Some(child),
        }
        match reference {
            Some(reference) => self.node_mut(reference).prev_sibling = Some(child),
            None => self.node_mut(parent).last_child = Some(child),
        }
    }
}

impl Default for NativeTree {
    fn default() -> Self {
        Self::new()
    }
}

fn check_name(prefix: Option<&str>, local: &str) -> NativeResult<()> {
    if !is_ncname(local) {
        return Err(NativeError::InvalidName(local.to_owned()));
    }
    if let Some(prefix) = prefix
        && !is_ncname(prefix)
    {
        return Err(NativeError::InvalidName(prefix.to_owned()));
    }
    Ok(())
}

struct Blueprint {
    data: NativeData,
    attrs: Vec<(NativeName, String)>,
    children: Vec<Blueprint>,
}

/// Iterator over a node's children
pub struct Children<'a> {
    tree: &'a NativeTree,
    next: Option<u32>,
}

impl Iterator for Children<'_> {
    type Item = NativeId;

    fn next(&mut self) -> Option<NativeId> {
        let current = self.next?;
        self.next = self.tree.node(current).next_sibling;
        Some(self.tree.handle(current))
    }
}

/// Pre-order iterator over a subtree, excluding its root
pub struct Descendants<'a> {
    tree: &'a NativeTree,
    root: u32,
    next: Option<u32>,
}

impl Descendants<'_> {
    fn following(&self, index: u32) -> Option<u32> {
        let node = self.tree.node(index);
        if let Some(child) = node.first_child {
            return Some(child);
        }
        let mut current = index;
        loop {
            if current == self.root {
                return None;
            }
            let node = self.tree.node(current);
            if let Some(sibling) = node.next_sibling {
                return Some(sibling);
            }
            current = node.parent?;
        }
    }
}

impl Iterator for Descendants<'_> {
    type Item = NativeId;

    fn next(&mut self) -> Option<NativeId> {
        let current = self.next?;
        self.next = self.following(current);
        Some(self.tree.handle(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tree: &NativeTree, ids: impl Iterator<Item = NativeId>) -> Vec<String> {
        ids.map(|id| match tree.data(id).unwrap() {
            NativeData::Element { name, .. } => name.local.clone(),
            NativeData::Text(t) => format!("#{t}"),
            other => format!("{:?}", other.kind()),
        })
        .collect()
    }

    #[test]
    fn test_append_and_order() {
        let mut tree = NativeTree::new();
        let root = tree.root();
        let div = tree.create_element(None, None, "div").unwrap();
        let a = tree.create_element(None, None, "a").unwrap();
        let b = tree.create_element(None, None, "b").unwrap();
        tree.append_child(root, div).unwrap();
        tree.append_child(div, b).unwrap();
        tree.insert_before(div, a, Some(b)).unwrap();
        assert_eq!(names(&tree, tree.children(div)), ["a", "b"]);
        assert_eq!(tree.parent(a), Some(div));
        assert_eq!(tree.prev_sibling(b), Some(a));
    }

    #[test]
    fn test_move_between_parents() {
        let mut tree = NativeTree::new();
        let x = tree.create_element(None, None, "x").unwrap();
        let y = tree.create_element(None, None, "y").unwrap();
        let t = tree.create_text("t");
        tree.append_child(x, t).unwrap();
        tree.append_child(y, t).unwrap();
        assert_eq!(tree.child_count(x), 0);
        assert_eq!(tree.first_child(y), Some(t));
    }

    #[test]
    fn test_replace_and_remove() {
        let mut tree = NativeTree::new();
        let p = tree.create_element(None, None, "p").unwrap();
        let a = tree.create_text("a");
        let b = tree.create_text("b");
        let c = tree.create_text("c");
        tree.append_child(p, a).unwrap();
        tree.append_child(p, b).unwrap();
        tree.replace_child(p, c, a).unwrap();
        assert_eq!(names(&tree, tree.children(p)), ["#c", "#b"]);
        tree.remove_child(p, b).unwrap();
        assert_eq!(names(&tree, tree.children(p)), ["#c"]);
        assert!(matches!(tree.remove_child(p, b), Err(NativeError::NotAChild { .. })));
    }

    #[test]
    fn test_rejects_colon_names() {
        let mut tree = NativeTree::new();
        assert_eq!(
            tree.create_element(None, None, "a:b"),
            Err(NativeError::InvalidName("a:b".into()))
        );
        let e = tree.create_element(None, None, "e").unwrap();
        assert!(tree.set_attribute(e, None, None, "test:test", "v").is_err());
        assert!(tree.create_doctype("", "", "").is_err());
    }

    #[test]
    fn test_attributes_replace_in_place() {
        let mut tree = NativeTree::new();
        let e = tree.create_element(None, None, "e").unwrap();
        tree.set_attribute(e, None, None, "a", "1").unwrap();
        tree.set_attribute(e, None, None, "b", "2").unwrap();
        let fresh = tree.create_attribute(None, None, "a", "3").unwrap();
        let old = tree.attach_attribute(e, fresh).unwrap().unwrap();
        assert_eq!(tree.owner_element(old), None);
        assert_eq!(tree.attributes(e), vec![fresh, tree.find_attribute(e, None, "b").unwrap()]);
        assert_eq!(tree.attribute_value(fresh), Some("3"));
    }

    #[test]
    fn test_descendants_and_clone() {
        let mut tree = NativeTree::new();
        let root = tree.root();
        let html = tree.create_element(None, None, "html").unwrap();
        let body = tree.create_element(None, None, "body").unwrap();
        let text = tree.create_text("hi");
        tree.append_child(root, html).unwrap();
        tree.append_child(html, body).unwrap();
        tree.append_child(body, text).unwrap();
        tree.set_attribute(body, None, None, "class", "x").unwrap();
        assert_eq!(names(&tree, tree.descendants(root)), ["html", "body", "#hi"]);

        let copy = tree.clone_node(html, true).unwrap();
        assert_eq!(tree.parent(copy), None);
        assert_eq!(names(&tree, tree.descendants(copy)), ["body", "#hi"]);
        let copied_body = tree.first_child(copy).unwrap();
        assert_ne!(copied_body, body);
        assert!(tree.find_attribute(copied_body, None, "class").is_some());
    }

    #[test]
    fn test_foreign_handles() {
        let mut a = NativeTree::new();
        let b = NativeTree::new();
        let root = a.root();
        assert!(matches!(a.append_child(root, b.root()), Err(NativeError::ForeignNode(_))));
        let imported = a.import_node(&b, b.root(), false).unwrap();
        assert_eq!(a.kind(imported), Ok(NativeKind::Document));
    }
}
