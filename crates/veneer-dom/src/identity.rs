//! Node identity cache
//!
//! Maps native handles to the single live wrapper for each. Entries are
//! weak: a wrapper nobody holds is dropped, and the next resolve of the
//! same native node builds a fresh one. Template wrappers are kept alive
//! separately by the liveness registry.

use std::collections::HashMap;
use std::rc::Weak;

use veneer_native::{NativeData, NativeId};

use crate::document::DocumentInner;
use crate::error::{DomError, DomResult};
use crate::namespace;
use crate::node::{ElementKind, Node, NodeInner, NodeKind};

/// Entry count below which binding never sweeps
const PRUNE_FLOOR: usize = 64;

pub(crate) struct IdentityCache {
    entries: HashMap<NativeId, Weak<NodeInner>>,
    /// Entry count that triggers the next sweep of dead entries
    prune_at: usize,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            prune_at: PRUNE_FLOOR,
        }
    }
}

impl IdentityCache {
    /// Cache holding just the document node
    pub(crate) fn seeded(root: &Node) -> Self {
        let mut cache = Self::default();
        cache.entries.insert(root.native(), std::rc::Rc::downgrade(&root.0));
        cache
    }

    pub(crate) fn lookup(&self, native: NativeId) -> Option<Node> {
        self.entries.get(&native).and_then(Weak::upgrade).map(Node)
    }

    /// Record `node` as the wrapper of its native node
    ///
    /// Binding the already-bound wrapper again is a no-op; a different live
    /// wrapper for the same native node is a conflict.
    pub(crate) fn bind(&mut self, node: &Node) -> DomResult<()> {
        match self.lookup(node.native()) {
            Some(existing) if existing == *node => Ok(()),
            Some(_) => Err(DomError::IdentityConflict),
            None => {
                tracing::trace!(native = ?node.native(), "binding wrapper");
                self.entries.insert(node.native(), std::rc::Rc::downgrade(&node.0));
                if self.entries.len() >= self.prune_at {
                    self.prune();
                }
                Ok(())
            }
        }
    }

    /// Number of entries whose wrapper is still alive
    pub(crate) fn live(&self) -> usize {
        self.entries.values().filter(|entry| entry.strong_count() > 0).count()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Forget entries whose wrapper has been dropped
    ///
    /// The next automatic sweep waits until the survivors have doubled, so
    /// binding stays amortized constant time.
    pub(crate) fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.strong_count() > 0);
        self.prune_at = (self.entries.len() * 2).max(PRUNE_FLOOR);
        tracing::trace!(before, after = self.entries.len(), "pruned identity cache");
    }
}

/// Pick the wrapper variant for a native node
pub(crate) fn classify(data: &NativeData) -> NodeKind {
    match data {
        NativeData::Document => NodeKind::Document,
        NativeData::Fragment => NodeKind::DocumentFragment,
        NativeData::Doctype { .. } => NodeKind::DocumentType,
        NativeData::Element { name, .. } => NodeKind::Element(match name.namespace.as_deref() {
            Some(namespace::HTML) if name.local == "template" => ElementKind::Template,
            Some(namespace::HTML) => ElementKind::Html,
            Some(namespace::SVG) => ElementKind::Svg,
            Some(namespace::MATHML) => ElementKind::MathMl,
            _ => ElementKind::Other,
        }),
        NativeData::Attribute { .. } => NodeKind::Attribute,
        NativeData::Text(_) => NodeKind::Text,
        NativeData::Comment(_) => NodeKind::Comment,
        NativeData::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
    }
}

/// Build the wrapper for `native`; templates get their content fragment
pub(crate) fn construct(doc: &DocumentInner, native: NativeId) -> DomResult<Node> {
    let kind = {
        let tree = doc.tree();
        classify(tree.data(native).map_err(|_| DomError::NotFound("no such native node"))?)
    };
    let content = match kind {
        NodeKind::Element(ElementKind::Template) => {
            let fragment = doc.template_content(native)?;
            Some(doc.resolve(fragment)?)
        }
        _ => None,
    };
    tracing::trace!(?native, ?kind, "constructing wrapper");
    Ok(Node::from_parts(doc.weak(), native, kind, content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    #[test]
    fn test_dead_entries_are_swept_while_binding() {
        let doc = Document::new_html().unwrap();
        let baseline = doc.live_wrappers();
        for i in 0..10 * PRUNE_FLOOR {
            doc.create_comment(&i.to_string()).unwrap();
        }
        let cache = doc.0.cache.borrow();
        assert!(cache.len() < 2 * PRUNE_FLOOR, "cache kept {} entries", cache.len());
        assert_eq!(cache.live(), baseline);
    }

    #[test]
    fn test_live_entries_survive_sweeps() {
        let doc = Document::new_html().unwrap();
        let baseline = doc.live_wrappers();
        let kept: Vec<Node> = (0..3 * PRUNE_FLOOR)
            .map(|i| doc.create_text_node(&i.to_string()).unwrap())
            .collect();
        for i in 0..3 * PRUNE_FLOOR {
            doc.create_comment(&i.to_string()).unwrap();
        }
        assert_eq!(doc.0.cache.borrow().live(), kept.len() + baseline);
        for node in &kept {
            assert!(doc.0.resolve(node.native()).unwrap().is_same_node(node));
        }
    }
}
