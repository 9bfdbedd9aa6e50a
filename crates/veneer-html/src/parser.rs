//! HTML5 parser
//!
//! html5ever builds an `RcDom`; the result is copied into a native tree
//! and handed to [`Document::adopt`]. Names html5ever accepts but the
//! native tree refuses (`<a:b>`, `test:test="..."`) are stored coerced.

use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::{QuirksMode as RcQuirksMode, TreeBuilderOpts};
use html5ever::tokenizer::TokenizerOpts;
use html5ever::{parse_document, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use veneer_dom::coercion::with_coercion;
use veneer_dom::{Document, LoadedTree, Node, QuirksMode, DOCTYPE_PLACEHOLDER};
use veneer_native::{NativeId, NativeTree};

use crate::encoding::{sniff, Confidence, Encoding};
use crate::error::{ParseError, ParseResult};
use crate::options::ParseOptions;

/// A document parsed from bytes, with what was learned while decoding it
#[derive(Debug)]
pub struct Parsed {
    pub document: Document,
    pub encoding: Encoding,
    pub confidence: Confidence,
    /// Parse errors reported by the tree builder; parsing never stops on them
    pub errors: Vec<String>,
}

/// HTML5 parser
#[derive(Debug, Clone, Default)]
pub struct HtmlParser {
    options: ParseOptions,
}

/// Intermediate result shared by every entry point
struct Converted {
    tree: NativeTree,
    template_contents: Vec<(NativeId, NativeId)>,
    quirks_mode: QuirksMode,
    errors: Vec<String>,
}

impl HtmlParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse a complete document from text
    pub fn parse(&self, html: &str) -> ParseResult<Document> {
        self.parse_with_url(html, "about:blank")
    }

    /// Parse a complete document, recording `url` as its address
    pub fn parse_with_url(&self, html: &str, url: &str) -> ParseResult<Document> {
        tracing::debug!(url, len = html.len(), "parsing HTML document");
        let converted = self.convert(html)?;
        self.finish(converted, Encoding::Utf8, Some(url.to_string()))
            .map(|(document, _)| document)
    }

    /// Sniff the encoding of `bytes`, decode and parse them
    pub fn parse_bytes(&self, bytes: &[u8]) -> ParseResult<Parsed> {
        let sniffed = sniff(bytes, self.options.declared_encoding.as_deref());
        tracing::debug!(
            encoding = %sniffed.encoding,
            confidence = ?sniffed.confidence,
            len = bytes.len(),
            "parsing HTML bytes"
        );
        let text = sniffed.encoding.decode(&bytes[sniffed.bom_len..]);
        let converted = self.convert(&text)?;
        let (document, errors) = self.finish(converted, sniffed.encoding, None)?;
        Ok(Parsed {
            document,
            encoding: sniffed.encoding,
            confidence: sniffed.confidence,
            errors,
        })
    }

    /// Parse `html` as the content of a template and return it as a
    /// fragment owned by `document`
    ///
    /// Input containing `</template>` ends the fragment early.
    pub fn parse_fragment(&self, html: &str, document: &Document) -> ParseResult<Node> {
        let wrapped = format!("<template>{html}</template>");
        let converted = self.convert(&wrapped)?;
        let scratch = self.finish(converted, Encoding::Utf8, None)?.0;
        let content = scratch
            .get_elements_by_tag_name("template")
            .item(0)
            .and_then(|template| template.content())
            .ok_or(ParseError::MissingFragment)?;
        Ok(document.import_node(&content, true)?)
    }

    fn parse_opts(&self) -> ParseOpts {
        ParseOpts {
            tokenizer: TokenizerOpts {
                exact_errors: self.options.exact_errors,
                ..Default::default()
            },
            tree_builder: TreeBuilderOpts {
                exact_errors: self.options.exact_errors,
                scripting_enabled: self.options.scripting_enabled,
                ..Default::default()
            },
        }
    }

    fn convert(&self, html: &str) -> ParseResult<Converted> {
        let dom = parse_document(RcDom::default(), self.parse_opts()).one(html);
        let errors: Vec<String> = dom.errors.borrow().iter().map(|e| e.to_string()).collect();
        let quirks_mode = match dom.quirks_mode.get() {
            RcQuirksMode::Quirks => QuirksMode::Quirks,
            RcQuirksMode::LimitedQuirks => QuirksMode::LimitedQuirks,
            RcQuirksMode::NoQuirks => QuirksMode::NoQuirks,
        };

        let mut tree = NativeTree::new();
        let mut template_contents = Vec::new();
        let root = tree.root();
        copy_children(&dom.document, root, &mut tree, &mut template_contents)?;

        tracing::debug!(
            nodes = tree.len(),
            templates = template_contents.len(),
            errors = errors.len(),
            "converted parse tree"
        );
        Ok(Converted {
            tree,
            template_contents,
            quirks_mode,
            errors,
        })
    }

    fn finish(
        &self,
        converted: Converted,
        encoding: Encoding,
        url: Option<String>,
    ) -> ParseResult<(Document, Vec<String>)> {
        let Converted {
            tree,
            template_contents,
            quirks_mode,
            errors,
        } = converted;
        let document = Document::adopt(LoadedTree {
            tree,
            template_contents,
            quirks_mode,
            character_set: encoding.name().to_string(),
            url,
        })?;
        Ok((document, errors))
    }
}

/// Copy the children of `source` under `parent`, depth first without
/// recursion so deeply nested input cannot exhaust the stack
fn copy_children(
    source: &Handle,
    parent: NativeId,
    tree: &mut NativeTree,
    template_contents: &mut Vec<(NativeId, NativeId)>,
) -> ParseResult<()> {
    let mut pending: Vec<(Handle, NativeId)> = Vec::new();
    push_children(source, parent, &mut pending);

    while let Some((handle, parent)) = pending.pop() {
        let id = match &handle.data {
            RcNodeData::Document => continue,
            RcNodeData::Doctype {
                name,
                public_id,
                system_id,
            } => {
                let name = if name.is_empty() { DOCTYPE_PLACEHOLDER } else { &name[..] };
                tree.create_doctype(name, public_id, system_id)?
            }
            RcNodeData::Text { contents } => tree.create_text(&contents.borrow()),
            RcNodeData::Comment { contents } => tree.create_comment(contents),
            RcNodeData::ProcessingInstruction { target, contents } => {
                tree.create_processing_instruction(target, contents)?
            }
            RcNodeData::Element {
                name,
                attrs,
                template_contents: contents,
                ..
            } => {
                let element = create_element(tree, name)?;
                for attr in attrs.borrow().iter() {
                    let (namespace, prefix) = split(&attr.name);
                    with_coercion(&attr.name.local, |local| {
                        tree.set_attribute(element, namespace, prefix, local, &attr.value)
                    })?;
                }
                if let Some(contents) = contents.borrow().as_ref() {
                    let fragment = tree.create_fragment();
                    template_contents.push((element, fragment));
                    push_children(contents, fragment, &mut pending);
                }
                push_children(&handle, element, &mut pending);
                element
            }
        };
        tree.append_child(parent, id)?;
    }
    Ok(())
}

/// Queue children so they pop in document order
fn push_children(source: &Handle, parent: NativeId, pending: &mut Vec<(Handle, NativeId)>) {
    pending.extend(source.children.borrow().iter().rev().map(|child| (child.clone(), parent)));
}

fn create_element(tree: &mut NativeTree, name: &QualName) -> ParseResult<NativeId> {
    let (namespace, prefix) = split(name);
    Ok(with_coercion(&name.local, |local| {
        tree.create_element(namespace, prefix, local)
    })?)
}

fn split(name: &QualName) -> (Option<&str>, Option<&str>) {
    let namespace = Some(&*name.ns).filter(|ns| !ns.is_empty());
    let prefix = name.prefix.as_deref().filter(|p| !p.is_empty());
    (namespace, prefix)
}
