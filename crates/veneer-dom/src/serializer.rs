//! HTML Serialization (innerHTML/outerHTML)
//!
//! Key features:
//! - HTML escaping of text and attribute values
//! - Void elements and raw text elements
//! - `template` elements serialize their content fragment
//! - Optional pretty printing of block-level structure

use tracing::debug;
use veneer_native::{NativeData, NativeId, NativeName, NativeTree};

use crate::coercion::uncoerce_name;
use crate::config::SerializerConfig;
use crate::document::{Document, DOCTYPE_PLACEHOLDER};
use crate::element::qualified;
use crate::namespace;
use crate::node::Node;
use crate::template::TemplateContents;

/// Void elements (no end tag, no content)
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Raw text parents (children written unescaped)
const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext"];

/// Elements placed on their own line when pretty printing
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "base", "blockquote", "body", "caption", "col", "colgroup", "dd", "details",
    "dialog", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hgroup", "hr", "html", "li", "link", "main", "menu", "meta", "nav", "noscript", "ol",
    "optgroup", "option", "p", "pre", "script", "section", "select", "style", "summary", "table", "tbody", "td",
    "template", "tfoot", "th", "thead", "title", "tr", "ul",
];

/// Content never reformatted
const PREFORMATTED_ELEMENTS: &[&str] = &["pre", "textarea", "listing", "plaintext", "script", "style"];

/// Parsers drop one newline right after these start tags
const LEADING_NEWLINE_ELEMENTS: &[&str] = &["pre", "textarea", "listing"];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// HTML serializer
#[derive(Debug, Clone, Default)]
pub struct HtmlSerializer {
    config: SerializerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Written exactly as stored
    Flat,
    /// Block structure reformatted; `foreign` inside a formatted SVG / MathML subtree
    Pretty { foreign: bool },
}

impl HtmlSerializer {
    pub fn new(config: SerializerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Serialize the children of `node` (innerHTML)
    pub fn serialize(&self, node: &Node) -> String {
        self.run(node, false)
    }

    /// Serialize `node` itself and its descendants (outerHTML)
    pub fn serialize_outer(&self, node: &Node) -> String {
        self.run(node, true)
    }

    fn run(&self, node: &Node, outer: bool) -> String {
        let Some(doc) = node.doc() else {
            return String::new();
        };
        debug!(outer, pretty = self.config.pretty_print, "serializing");
        let tree = doc.tree();
        let contents = doc.template_contents.borrow();
        let mut writer = Writer {
            tree: &tree,
            contents: &contents,
            config: &self.config,
            out: String::new(),
        };
        let mode = if self.config.pretty_print {
            Mode::Pretty { foreign: false }
        } else {
            Mode::Flat
        };
        let id = node.native();
        let container = matches!(tree.data(id), Ok(NativeData::Document | NativeData::Fragment));
        if outer && !container {
            let single = [id];
            writer.children(&single, 0, mode, false);
        } else {
            let source = writer.child_source(id);
            let children: Vec<NativeId> = tree.children(source).collect();
            let raw = is_raw_text_parent(&tree, id);
            let mode = if is_preformatted(&tree, id) { Mode::Flat } else { mode };
            let mode = match (mode, is_foreign(&tree, id)) {
                (Mode::Pretty { .. }, true) => Mode::Pretty { foreign: true },
                (mode, _) => mode,
            };
            writer.children(&children, 0, mode, raw);
        }
        writer.out
    }
}

struct Writer<'a> {
    tree: &'a NativeTree,
    contents: &'a TemplateContents,
    config: &'a SerializerConfig,
    out: String,
}

impl Writer<'_> {
    /// Where the serialized children of `id` live: a template's content
    /// fragment, or the node itself
    fn child_source(&self, id: NativeId) -> NativeId {
        self.contents.content_of(id).unwrap_or(id)
    }

    fn newline(&mut self, depth: usize) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        for _ in 0..depth {
            self.out.push_str(&self.config.indent);
        }
    }

    /// Write a run of siblings; true if any of them was put on its own line
    fn children(&mut self, children: &[NativeId], depth: usize, mode: Mode, raw: bool) -> bool {
        let Mode::Pretty { foreign } = mode else {
            for &child in children {
                self.node(child, depth, Mode::Flat, raw);
            }
            return false;
        };
        let formatted: Vec<bool> = children
            .iter()
            .map(|&child| self.is_formatted(child, children, foreign))
            .collect();
        if !formatted.contains(&true) {
            for &child in children {
                self.node(child, depth, Mode::Flat, raw);
            }
            return false;
        }

        let tree = self.tree;
        let mut broke = false;
        let mut previous: Option<&str> = None;
        for (&child, &own_line) in children.iter().zip(&formatted) {
            match tree.data(child) {
                Ok(NativeData::Text(text)) => {
                    let trimmed = text.trim_matches(|c: char| c.is_ascii_whitespace());
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.newline(depth);
                    if raw {
                        self.out.push_str(trimmed);
                    } else {
                        escape_text(trimmed, &mut self.out);
                    }
                    broke = true;
                    previous = None;
                }
                Ok(NativeData::Element { name, .. }) if own_line => {
                    let tag = name.local.as_str();
                    if let Some(prev) = previous
                        && prev != tag
                        && !(HEADINGS.contains(&prev) && HEADINGS.contains(&tag))
                    {
                        self.out.push('\n');
                    }
                    self.newline(depth);
                    self.node(child, depth, mode, false);
                    broke = true;
                    previous = Some(tag);
                }
                _ => {
                    self.node(child, depth, Mode::Flat, raw);
                    previous = None;
                }
            }
        }
        broke
    }

    fn node(&mut self, id: NativeId, depth: usize, mode: Mode, raw: bool) {
        let tree = self.tree;
        let Ok(data) = tree.data(id) else {
            return;
        };
        match data {
            NativeData::Document | NativeData::Fragment => {
                let children: Vec<NativeId> = tree.children(id).collect();
                self.children(&children, depth, mode, false);
            }
            NativeData::Element { name, .. } => self.element(id, name, depth, mode),
            NativeData::Text(text) => {
                if raw {
                    self.out.push_str(text);
                } else {
                    escape_text(text, &mut self.out);
                }
            }
            NativeData::Comment(text) => {
                self.out.push_str("<!--");
                self.out.push_str(text);
                self.out.push_str("-->");
            }
            NativeData::ProcessingInstruction { target, data } => {
                self.out.push_str("<?");
                self.out.push_str(target);
                self.out.push(' ');
                self.out.push_str(data);
                self.out.push('>');
            }
            NativeData::Doctype { name, .. } => {
                self.out.push_str("<!DOCTYPE ");
                if name != DOCTYPE_PLACEHOLDER {
                    self.out.push_str(name);
                }
                self.out.push('>');
            }
            NativeData::Attribute { .. } => {}
        }
    }

    fn element(&mut self, id: NativeId, name: &NativeName, depth: usize, mode: Mode) {
        let tag = element_tag(name);
        self.out.push('<');
        self.out.push_str(&tag);
        for attr in self.tree.attributes(id) {
            let (Some(attr_name), Some(value)) = (self.tree.name(attr), self.tree.attribute_value(attr)) else {
                continue;
            };
            self.out.push(' ');
            self.out.push_str(&attribute_name(attr_name));
            self.out.push_str("=\"");
            escape_attribute(value, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');

        let html = name.namespace.as_deref() == Some(namespace::HTML);
        if html && VOID_ELEMENTS.contains(&name.local.as_str()) {
            return;
        }

        let child_mode = match mode {
            Mode::Pretty { .. } if html && PREFORMATTED_ELEMENTS.contains(&name.local.as_str()) => Mode::Flat,
            Mode::Pretty { foreign } => Mode::Pretty {
                foreign: foreign || is_foreign_name(name),
            },
            Mode::Flat => Mode::Flat,
        };
        let raw = html && RAW_TEXT_ELEMENTS.contains(&name.local.as_str());
        let source = self.child_source(id);
        let children: Vec<NativeId> = self.tree.children(source).collect();
        if html && LEADING_NEWLINE_ELEMENTS.contains(&name.local.as_str()) && self.starts_with_newline(&children) {
            self.out.push('\n');
        }
        if self.children(&children, depth + 1, child_mode, raw) {
            self.newline(depth);
        }

        self.out.push_str("</");
        self.out.push_str(&tag);
        self.out.push('>');
    }

    fn starts_with_newline(&self, children: &[NativeId]) -> bool {
        children
            .first()
            .is_some_and(|&first| matches!(self.tree.data(first), Ok(NativeData::Text(text)) if text.starts_with('\n')))
    }

    fn is_formatted(&self, id: NativeId, siblings: &[NativeId], foreign: bool) -> bool {
        let Some(name) = self.element_name(id) else {
            return false;
        };
        if foreign {
            return true;
        }
        match name.namespace.as_deref() {
            Some(namespace::HTML) => self.is_block_like(id),
            Some(namespace::SVG) | Some(namespace::MATHML) => {
                siblings.iter().any(|&s| s != id && self.is_html_block_like(s))
            }
            _ => self.has_block_descendant(id),
        }
    }

    fn element_name(&self, id: NativeId) -> Option<&NativeName> {
        match self.tree.data(id) {
            Ok(NativeData::Element { name, .. }) => Some(name),
            _ => None,
        }
    }

    fn is_html_block_like(&self, id: NativeId) -> bool {
        self.element_name(id)
            .is_some_and(|name| name.namespace.as_deref() == Some(namespace::HTML))
            && self.is_block_like(id)
    }

    /// Block element, or inline element wrapping a block
    fn is_block_like(&self, id: NativeId) -> bool {
        self.element_name(id)
            .is_some_and(|name| BLOCK_ELEMENTS.contains(&name.local.as_str()))
            || self.has_block_descendant(id)
    }

    fn has_block_descendant(&self, id: NativeId) -> bool {
        self.tree.descendants(id).any(|d| {
            self.element_name(d).is_some_and(|name| {
                name.namespace.as_deref() == Some(namespace::HTML) && BLOCK_ELEMENTS.contains(&name.local.as_str())
            })
        })
    }
}

fn is_foreign_name(name: &NativeName) -> bool {
    matches!(name.namespace.as_deref(), Some(namespace::SVG) | Some(namespace::MATHML))
}

fn html_local(tree: &NativeTree, id: NativeId) -> Option<&str> {
    match tree.data(id) {
        Ok(NativeData::Element { name, .. }) if name.namespace.as_deref() == Some(namespace::HTML) => {
            Some(name.local.as_str())
        }
        _ => None,
    }
}

fn is_raw_text_parent(tree: &NativeTree, id: NativeId) -> bool {
    html_local(tree, id).is_some_and(|local| RAW_TEXT_ELEMENTS.contains(&local))
}

fn is_preformatted(tree: &NativeTree, id: NativeId) -> bool {
    html_local(tree, id).is_some_and(|local| PREFORMATTED_ELEMENTS.contains(&local))
}

fn is_foreign(tree: &NativeTree, id: NativeId) -> bool {
    tree.name(id).is_some_and(is_foreign_name)
}

/// HTML, SVG and MathML elements use the local name, others the qualified name
fn element_tag(name: &NativeName) -> String {
    match name.namespace.as_deref() {
        Some(namespace::HTML) | Some(namespace::SVG) | Some(namespace::MATHML) => {
            uncoerce_name(&name.local).into_owned()
        }
        _ => qualified(name),
    }
}

fn attribute_name(name: &NativeName) -> String {
    let local = uncoerce_name(&name.local);
    match name.namespace.as_deref() {
        None => local.into_owned(),
        Some(namespace::XML) => format!("xml:{local}"),
        Some(namespace::XMLNS) if local == "xmlns" => "xmlns".to_string(),
        Some(namespace::XMLNS) => format!("xmlns:{local}"),
        Some(namespace::XLINK) => format!("xlink:{local}"),
        Some(_) => qualified(name),
    }
}

/// Escape text content for HTML
fn escape_text(text: &str, output: &mut String) {
    for c in text.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '\u{A0}' => output.push_str("&nbsp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            _ => output.push(c),
        }
    }
}

/// Escape attribute value
fn escape_attribute(text: &str, output: &mut String) {
    for c in text.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '\u{A0}' => output.push_str("&nbsp;"),
            '"' => output.push_str("&quot;"),
            _ => output.push(c),
        }
    }
}

impl Node {
    /// Markup of the children, using the document's serializer settings
    pub fn inner_html(&self) -> String {
        self.serializer().serialize(self)
    }

    /// Markup of this node and its descendants
    pub fn outer_html(&self) -> String {
        self.serializer().serialize_outer(self)
    }

    fn serializer(&self) -> HtmlSerializer {
        let config = self.doc().map(|doc| doc.config.borrow().clone()).unwrap_or_default();
        HtmlSerializer::new(config)
    }
}

impl Document {
    /// The whole document as markup
    pub fn serialize(&self) -> String {
        self.as_node().inner_html()
    }
}
