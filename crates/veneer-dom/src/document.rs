//! Documents
//!
//! A [`Document`] owns the native tree together with everything the
//! overlay keeps about it: the identity cache, the template pairing and
//! liveness registry, and document-wide settings.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use veneer_native::{NativeData, NativeId, NativeTree, TreeId};

use crate::coercion::{validate_and_extract, validate_name, with_coercion};
use crate::config::SerializerConfig;
use crate::error::{DomError, DomResult};
use crate::identity::{self, IdentityCache};
use crate::namespace;
use crate::node::{Node, NodeKind};
use crate::template::{is_html_template, LivenessRegistry, TemplateContents};

/// Stored in place of an empty doctype name, which the native tree refuses
pub const DOCTYPE_PLACEHOLDER: &str = " ";

/// Document compatibility mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuirksMode {
    #[default]
    NoQuirks,
    LimitedQuirks,
    Quirks,
}

/// A native tree produced outside the overlay (by the HTML parser),
/// adopted as-is by [`Document::adopt`]
#[derive(Debug)]
pub struct LoadedTree {
    pub tree: NativeTree,
    /// `(template element, content fragment)` pairs
    pub template_contents: Vec<(NativeId, NativeId)>,
    pub quirks_mode: QuirksMode,
    pub character_set: String,
    pub url: Option<String>,
}

pub(crate) struct DocumentInner {
    this: Weak<DocumentInner>,
    tree_id: TreeId,
    native: RefCell<NativeTree>,
    pub(crate) cache: RefCell<IdentityCache>,
    pub(crate) templates: RefCell<LivenessRegistry>,
    pub(crate) template_contents: RefCell<TemplateContents>,
    quirks_mode: Cell<QuirksMode>,
    character_set: RefCell<String>,
    url: RefCell<String>,
    pub(crate) config: RefCell<SerializerConfig>,
    root: Node,
}

impl DocumentInner {
    fn build(tree: NativeTree, quirks_mode: QuirksMode, character_set: String, url: String) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<DocumentInner>| {
            let root = Node::from_parts(this.clone(), tree.root(), NodeKind::Document, None);
            DocumentInner {
                this: this.clone(),
                tree_id: tree.id(),
                cache: RefCell::new(IdentityCache::seeded(&root)),
                native: RefCell::new(tree),
                templates: RefCell::default(),
                template_contents: RefCell::default(),
                quirks_mode: Cell::new(quirks_mode),
                character_set: RefCell::new(character_set),
                url: RefCell::new(url),
                config: RefCell::default(),
                root,
            }
        })
    }

    pub(crate) fn weak(&self) -> Weak<DocumentInner> {
        self.this.clone()
    }

    pub(crate) fn tree(&self) -> Ref<'_, NativeTree> {
        self.native.borrow()
    }

    pub(crate) fn tree_mut(&self) -> RefMut<'_, NativeTree> {
        self.native.borrow_mut()
    }

    pub(crate) fn tree_id(&self) -> TreeId {
        self.tree_id
    }

    pub(crate) fn owns(&self, node: &Node) -> bool {
        node.native().tree() == self.tree_id
    }

    pub(crate) fn quirks_mode(&self) -> QuirksMode {
        self.quirks_mode.get()
    }

    /// The unique wrapper of a native node, built on first access
    pub(crate) fn resolve(&self, native: NativeId) -> DomResult<Node> {
        if native.tree() != self.tree_id {
            return Err(DomError::WrongDocument);
        }
        if let Some(node) = self.cache.borrow().lookup(native) {
            return Ok(node);
        }
        let node = identity::construct(self, native)?;
        self.cache.borrow_mut().bind(&node)?;
        Ok(node)
    }

    pub(crate) fn resolve_all(&self, natives: impl IntoIterator<Item = NativeId>) -> Vec<Node> {
        natives.into_iter().filter_map(|id| self.resolve(id).ok()).collect()
    }

    pub(crate) fn create_text(&self, data: &str) -> DomResult<Node> {
        let native = self.tree_mut().create_text(data);
        self.resolve(native)
    }

    /// Copy a node from `source` (possibly this document) into this tree,
    /// carrying template contents along on deep copies
    pub(crate) fn copy_subtree(&self, source: &DocumentInner, node: NativeId, deep: bool) -> DomResult<NativeId> {
        let copy = if std::ptr::eq(self, source) {
            self.tree_mut().clone_node(node, deep)
        } else {
            let from = source.tree();
            self.tree_mut().import_node(&from, node, deep)
        }
        .map_err(DomError::invariant)?;
        if deep {
            self.copy_template_contents(source, node, copy)?;
        }
        Ok(copy)
    }

    fn copy_template_contents(&self, source: &DocumentInner, original: NativeId, copy: NativeId) -> DomResult<()> {
        let pairs: Vec<(NativeId, NativeId)> = {
            let from = source.tree();
            let to = self.tree();
            std::iter::once(original)
                .chain(from.descendants(original))
                .zip(std::iter::once(copy).chain(to.descendants(copy)))
                .filter(|&(o, _)| is_html_template(&from, o))
                .collect()
        };
        for (template, template_copy) in pairs {
            let source_content = source.template_contents.borrow().content_of(template);
            let Some(source_content) = source_content else {
                continue;
            };
            let target_content = self.template_content(template_copy)?;
            let children: Vec<NativeId> = source.tree().children(source_content).collect();
            for child in children {
                let child_copy = self.copy_subtree(source, child, true)?;
                self.tree_mut()
                    .append_child(target_content, child_copy)
                    .map_err(DomError::invariant)?;
            }
        }
        Ok(())
    }
}

/// Handle to a document
#[derive(Clone)]
pub struct Document(pub(crate) Rc<DocumentInner>);

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Document {}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("tree", &self.0.tree_id)
            .field("url", &self.0.url.borrow())
            .field("quirks_mode", &self.0.quirks_mode.get())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document
    pub fn new() -> Self {
        Document(DocumentInner::build(
            NativeTree::new(),
            QuirksMode::NoQuirks,
            "UTF-8".to_string(),
            "about:blank".to_string(),
        ))
    }

    /// `<!DOCTYPE html><html><head></head><body></body></html>`
    pub fn new_html() -> DomResult<Self> {
        let document = Self::new();
        let root = document.as_node();
        root.append_child(&document.create_document_type("html", "", "")?)?;
        let html = root.append_child(&document.create_element("html")?)?;
        html.append_child(&document.create_element("head")?)?;
        html.append_child(&document.create_element("body")?)?;
        Ok(document)
    }

    /// Take ownership of an externally built tree without re-validating it
    pub fn adopt(loaded: LoadedTree) -> DomResult<Self> {
        let LoadedTree {
            tree,
            template_contents,
            quirks_mode,
            character_set,
            url,
        } = loaded;
        if let Some(&(template, _)) = template_contents
            .iter()
            .find(|&&(template, fragment)| !tree.owns(template) || !tree.owns(fragment))
        {
            return Err(DomError::Invariant(format!(
                "template {template:?} is paired with a node outside the loaded tree"
            )));
        }

        let inner = DocumentInner::build(
            tree,
            quirks_mode,
            character_set,
            url.unwrap_or_else(|| "about:blank".to_string()),
        );
        {
            let mut contents = inner.template_contents.borrow_mut();
            for (template, fragment) in template_contents {
                contents.link(template, fragment);
            }
        }
        let root = inner.tree().root();
        inner.register_templates(root)?;
        tracing::debug!(
            nodes = inner.tree().len(),
            templates = inner.templates.borrow().len(),
            ?quirks_mode,
            "adopted loaded tree"
        );
        Ok(Document(inner))
    }

    /// The document node
    pub fn as_node(&self) -> &Node {
        &self.0.root
    }

    pub fn url(&self) -> String {
        self.0.url.borrow().clone()
    }

    pub fn set_url(&self, url: &str) {
        url.clone_into(&mut self.0.url.borrow_mut());
    }

    pub fn quirks_mode(&self) -> QuirksMode {
        self.0.quirks_mode.get()
    }

    pub fn set_quirks_mode(&self, mode: QuirksMode) {
        self.0.quirks_mode.set(mode);
    }

    /// Encoding the document was decoded from
    pub fn character_set(&self) -> String {
        self.0.character_set.borrow().clone()
    }

    pub fn serializer_config(&self) -> SerializerConfig {
        self.0.config.borrow().clone()
    }

    pub fn set_serializer_config(&self, config: SerializerConfig) {
        *self.0.config.borrow_mut() = config;
    }

    /// Wrappers currently alive in the identity cache
    pub fn live_wrappers(&self) -> usize {
        self.0.cache.borrow().live()
    }

    /// Inserted templates held by the liveness registry
    pub fn live_templates(&self) -> usize {
        self.0.templates.borrow().len()
    }

    /// Drop identity-cache entries whose wrappers are gone
    pub fn prune_identity_cache(&self) {
        self.0.cache.borrow_mut().prune();
    }

    // ------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------

    /// HTML element; the name is lower-cased
    pub fn create_element(&self, local_name: &str) -> DomResult<Node> {
        validate_name(local_name)?;
        let local_name = local_name.to_ascii_lowercase();
        let native = with_coercion(&local_name, |name| {
            self.0.tree_mut().create_element(Some(namespace::HTML), None, name)
        })?;
        self.0.resolve(native)
    }

    pub fn create_element_ns(&self, namespace: Option<&str>, qualified_name: &str) -> DomResult<Node> {
        let name = validate_and_extract(namespace, qualified_name)?;
        let native = with_coercion(&name.local_name, |local| {
            self.0
                .tree_mut()
                .create_element(name.namespace.as_deref(), name.prefix.as_deref(), local)
        })?;
        self.0.resolve(native)
    }

    pub fn create_text_node(&self, data: &str) -> DomResult<Node> {
        self.0.create_text(data)
    }

    pub fn create_comment(&self, data: &str) -> DomResult<Node> {
        let native = self.0.tree_mut().create_comment(data);
        self.0.resolve(native)
    }

    pub fn create_processing_instruction(&self, target: &str, data: &str) -> DomResult<Node> {
        validate_name(target)?;
        if data.contains("?>") {
            return Err(DomError::InvalidCharacter(data.to_string()));
        }
        let native = self
            .0
            .tree_mut()
            .create_processing_instruction(target, data)
            .map_err(DomError::invariant)?;
        self.0.resolve(native)
    }

    pub fn create_document_fragment(&self) -> DomResult<Node> {
        let native = self.0.tree_mut().create_fragment();
        self.0.resolve(native)
    }

    /// Detached attribute in no namespace; the name is lower-cased
    pub fn create_attribute(&self, local_name: &str) -> DomResult<Node> {
        validate_name(local_name)?;
        let local_name = local_name.to_ascii_lowercase();
        let native = with_coercion(&local_name, |name| {
            self.0.tree_mut().create_attribute(None, None, name, "")
        })?;
        self.0.resolve(native)
    }

    pub fn create_attribute_ns(&self, namespace: Option<&str>, qualified_name: &str) -> DomResult<Node> {
        let name = validate_and_extract(namespace, qualified_name)?;
        let native = with_coercion(&name.local_name, |local| {
            self.0
                .tree_mut()
                .create_attribute(name.namespace.as_deref(), name.prefix.as_deref(), local, "")
        })?;
        self.0.resolve(native)
    }

    /// Doctype node; an empty name is allowed
    pub fn create_document_type(&self, name: &str, public_id: &str, system_id: &str) -> DomResult<Node> {
        if name.chars().any(|c| c.is_ascii_whitespace() || c == '\0' || c == '>') {
            return Err(DomError::InvalidCharacter(name.to_string()));
        }
        let stored = if name.is_empty() { DOCTYPE_PLACEHOLDER } else { name };
        let native = self
            .0
            .tree_mut()
            .create_doctype(stored, public_id, system_id)
            .map_err(DomError::invariant)?;
        self.0.resolve(native)
    }

    /// CDATA sections only exist in XML documents
    pub fn create_cdata_section(&self, _data: &str) -> DomResult<Node> {
        Err(DomError::NotSupported("CDATA sections are not supported in HTML documents"))
    }

    /// Copy a node from any document into this one, detached
    pub fn import_node(&self, node: &Node, deep: bool) -> DomResult<Node> {
        if node.kind() == NodeKind::Document {
            return Err(DomError::NotSupported("importing a document"));
        }
        let source = node.owner()?;
        let copy = self.0.copy_subtree(&source, node.native(), deep)?;
        self.0.resolve(copy)
    }

    // ------------------------------------------------------------------
    // Well-known nodes
    // ------------------------------------------------------------------

    pub fn doctype(&self) -> Option<Node> {
        self.as_node().related(|tree, root| {
            tree.children(root)
                .find(|&c| matches!(tree.data(c), Ok(NativeData::Doctype { .. })))
        })
    }

    pub fn document_element(&self) -> Option<Node> {
        self.as_node().first_element_child()
    }

    pub fn head(&self) -> Option<Node> {
        self.html_child(&["head"])
    }

    pub fn body(&self) -> Option<Node> {
        self.html_child(&["body", "frameset"])
    }

    /// Text of the first `title` element, whitespace stripped and collapsed
    pub fn title(&self) -> String {
        let Some(title) = self.title_element() else {
            return String::new();
        };
        title
            .text_content()
            .unwrap_or_default()
            .split_ascii_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Replace the title text, creating a `title` in `head` if needed
    pub fn set_title(&self, title: &str) -> DomResult<()> {
        let element = match self.title_element() {
            Some(element) => element,
            None => {
                let Some(head) = self.head() else {
                    return Ok(());
                };
                head.append_child(&self.create_element("title")?)?
            }
        };
        element.set_text_content(Some(title))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Node> {
        self.as_node().get_element_by_id(id)
    }

    fn title_element(&self) -> Option<Node> {
        self.as_node().related(|tree, root| {
            tree.descendants(root).find(|&d| {
                tree.name(d).is_some_and(|name| {
                    matches!(tree.data(d), Ok(NativeData::Element { .. }))
                        && name.matches(Some(namespace::HTML), "title")
                })
            })
        })
    }

    fn html_child(&self, names: &[&str]) -> Option<Node> {
        let html = self.document_element()?;
        html.related(|tree, id| {
            tree.children(id).find(|&c| {
                matches!(tree.data(c), Ok(NativeData::Element { .. }))
                    && tree
                        .name(c)
                        .is_some_and(|name| names.iter().any(|local| name.matches(Some(namespace::HTML), local)))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_html_skeleton() {
        let doc = Document::new_html().unwrap();
        assert_eq!(doc.doctype().and_then(|d| d.name()), Some("html".into()));
        assert_eq!(doc.document_element().and_then(|e| e.local_name()), Some("html".into()));
        assert!(doc.head().is_some());
        assert!(doc.body().is_some());
        assert_eq!(doc.quirks_mode(), QuirksMode::NoQuirks);
        assert_eq!(doc.character_set(), "UTF-8");
    }

    #[test]
    fn test_title_round_trip() {
        let doc = Document::new_html().unwrap();
        assert_eq!(doc.title(), "");
        doc.set_title("  Hello \n  world ").unwrap();
        assert_eq!(doc.title(), "Hello world");
    }

    #[test]
    fn test_create_element_lowercases_and_coerces() {
        let doc = Document::new();
        let div = doc.create_element("DIV").unwrap();
        assert_eq!(div.local_name(), Some("div".into()));
        assert_eq!(div.tag_name(), Some("DIV".into()));

        let odd = doc.create_element("foo:bar").unwrap();
        assert_eq!(odd.local_name(), Some("foo:bar".into()));
        assert_eq!(odd.prefix(), None);
    }

    #[test]
    fn test_factory_validation() {
        let doc = Document::new();
        assert_eq!(doc.create_element("1a").map_err(|e| e.name()), Err("InvalidCharacterError"));
        assert_eq!(
            doc.create_processing_instruction("x", "a?>b").map_err(|e| e.name()),
            Err("InvalidCharacterError")
        );
        assert_eq!(doc.create_cdata_section("x").map_err(|e| e.name()), Err("NotSupportedError"));
        assert_eq!(
            doc.create_element_ns(None, "svg:rect").map_err(|e| e.name()),
            Err("NamespaceError")
        );
    }

    #[test]
    fn test_empty_doctype_name() {
        let doc = Document::new();
        let doctype = doc.create_document_type("", "", "").unwrap();
        assert_eq!(doctype.name(), Some(String::new()));
        assert_eq!(doctype.node_name(), "");
        assert!(doc.create_document_type("a b", "", "").is_err());
    }

    #[test]
    fn test_adopt_rejects_foreign_template_pairs() {
        let tree = NativeTree::new();
        let mut other = NativeTree::new();
        let fragment = other.create_fragment();
        let loaded = LoadedTree {
            template_contents: vec![(tree.root(), fragment)],
            tree,
            quirks_mode: QuirksMode::Quirks,
            character_set: "UTF-8".into(),
            url: None,
        };
        assert!(matches!(Document::adopt(loaded), Err(DomError::Invariant(_))));
    }
}
