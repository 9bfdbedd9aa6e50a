//! Template content model
//!
//! Every HTML `template` element owns one content fragment. The document
//! keeps the native pairing so a template keeps its content across wrapper
//! rebuilds, and a liveness registry keeps inserted template wrappers
//! alive for as long as they stay inserted.

use std::collections::HashMap;

use veneer_native::{NativeData, NativeId, NativeTree};

use crate::document::DocumentInner;
use crate::error::DomResult;
use crate::namespace;
use crate::node::Node;

/// Native template ↔ content fragment pairs
#[derive(Default)]
pub(crate) struct TemplateContents {
    by_template: HashMap<NativeId, NativeId>,
    by_fragment: HashMap<NativeId, NativeId>,
}

impl TemplateContents {
    pub(crate) fn link(&mut self, template: NativeId, fragment: NativeId) {
        self.by_template.insert(template, fragment);
        self.by_fragment.insert(fragment, template);
    }

    pub(crate) fn content_of(&self, template: NativeId) -> Option<NativeId> {
        self.by_template.get(&template).copied()
    }

    pub(crate) fn host_of(&self, fragment: NativeId) -> Option<NativeId> {
        self.by_fragment.get(&fragment).copied()
    }
}

/// Strong references to inserted template wrappers
#[derive(Default)]
pub(crate) struct LivenessRegistry {
    live: HashMap<NativeId, Node>,
}

impl LivenessRegistry {
    pub(crate) fn register(&mut self, template: Node) {
        self.live.insert(template.native(), template);
    }

    pub(crate) fn unregister(&mut self, native: NativeId) -> Option<Node> {
        self.live.remove(&native)
    }

    pub(crate) fn contains(&self, native: NativeId) -> bool {
        self.live.contains_key(&native)
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }
}

pub(crate) fn is_html_template(tree: &NativeTree, id: NativeId) -> bool {
    match tree.data(id) {
        Ok(NativeData::Element { name, .. }) => {
            name.namespace.as_deref() == Some(namespace::HTML) && name.local == "template"
        }
        _ => false,
    }
}

impl DocumentInner {
    /// Content fragment of a template, created on first use
    pub(crate) fn template_content(&self, template: NativeId) -> DomResult<NativeId> {
        if let Some(fragment) = self.template_contents.borrow().content_of(template) {
            return Ok(fragment);
        }
        let fragment = self.tree_mut().create_fragment();
        self.template_contents.borrow_mut().link(template, fragment);
        Ok(fragment)
    }

    /// Templates in a subtree, descending into template contents
    pub(crate) fn templates_in(&self, root: NativeId) -> Vec<NativeId> {
        let tree = self.tree();
        let contents = self.template_contents.borrow();
        let mut found = Vec::new();
        let mut pending = vec![root];
        while let Some(current) = pending.pop() {
            let nodes = std::iter::once(current).chain(tree.descendants(current));
            for node in nodes {
                if is_html_template(&tree, node) {
                    found.push(node);
                    if let Some(fragment) = contents.content_of(node) {
                        pending.push(fragment);
                    }
                }
            }
        }
        found
    }

    /// `id` hangs off the document root, crossing from template contents
    /// to their host
    pub(crate) fn is_reachable(&self, id: NativeId) -> bool {
        let tree = self.tree();
        let contents = self.template_contents.borrow();
        let mut current = id;
        loop {
            let top = tree.root_of(current);
            if top == tree.root() {
                return true;
            }
            match contents.host_of(top) {
                Some(host) => current = host,
                None => return false,
            }
        }
    }

    /// Register the templates of a freshly inserted subtree while it is
    /// reachable, release them otherwise
    pub(crate) fn sync_templates(&self, root: NativeId) -> DomResult<()> {
        if self.is_reachable(root) {
            self.register_templates(root)
        } else {
            self.unregister_templates(root);
            Ok(())
        }
    }

    pub(crate) fn register_templates(&self, root: NativeId) -> DomResult<()> {
        for template in self.templates_in(root) {
            if self.templates.borrow().contains(template) {
                continue;
            }
            let node = self.resolve(template)?;
            self.templates.borrow_mut().register(node);
        }
        Ok(())
    }

    pub(crate) fn unregister_templates(&self, root: NativeId) {
        for template in self.templates_in(root) {
            self.templates.borrow_mut().unregister(template);
        }
    }
}

impl Node {
    /// Content fragment of a template element
    pub fn content(&self) -> Option<Node> {
        self.0.content.clone()
    }

    /// Template element whose content this fragment is
    pub fn template_host(&self) -> Option<Node> {
        let doc = self.doc()?;
        let host = doc.template_contents.borrow().host_of(self.native())?;
        doc.resolve(host).ok()
    }
}
