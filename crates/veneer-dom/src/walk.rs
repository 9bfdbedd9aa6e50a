//! Tree walks
//!
//! Lazy iterators with a predicate closure, in the manner of a TreeWalker:
//! nodes the predicate rejects are skipped but their subtrees are still
//! visited.

use std::rc::Weak;

use veneer_native::NativeId;

use crate::document::DocumentInner;
use crate::node::Node;

/// Descendants in tree order
pub struct Walk<F> {
    doc: Weak<DocumentInner>,
    stack: Vec<NativeId>,
    started: Option<NativeId>,
    include_template_content: bool,
    filter: F,
}

impl<F> Walk<F>
where
    F: FnMut(&Node) -> bool,
{
    /// Also walk into the content fragment of `template` elements
    pub fn include_template_content(mut self, include: bool) -> Self {
        self.include_template_content = include;
        self
    }

    /// Push the walk children of `node` so they pop in tree order
    fn expand(&mut self, doc: &DocumentInner, node: NativeId) {
        let tree = doc.tree();
        if self.include_template_content
            && let Some(fragment) = doc.template_contents.borrow().content_of(node)
        {
            let content: Vec<NativeId> = tree.children(fragment).collect();
            self.stack.extend(content.into_iter().rev());
        }
        let children: Vec<NativeId> = tree.children(node).collect();
        self.stack.extend(children.into_iter().rev());
    }
}

impl<F> Iterator for Walk<F>
where
    F: FnMut(&Node) -> bool,
{
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let doc = self.doc.upgrade()?;
        if let Some(root) = self.started.take() {
            self.expand(&doc, root);
        }
        while let Some(current) = self.stack.pop() {
            self.expand(&doc, current);
            if let Ok(node) = doc.resolve(current)
                && (self.filter)(&node)
            {
                return Some(node);
            }
        }
        None
    }
}

/// Ancestors, nearest first
pub struct Moonwalk<F> {
    doc: Weak<DocumentInner>,
    current: Option<NativeId>,
    include_template_content: bool,
    filter: F,
}

impl<F> Moonwalk<F>
where
    F: FnMut(&Node) -> bool,
{
    /// Step from a template content fragment to its host template
    pub fn include_template_content(mut self, include: bool) -> Self {
        self.include_template_content = include;
        self
    }
}

impl<F> Iterator for Moonwalk<F>
where
    F: FnMut(&Node) -> bool,
{
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let doc = self.doc.upgrade()?;
        loop {
            let current = self.current?;
            let parent = doc.tree().parent(current);
            let next = match parent {
                Some(parent) => Some(parent),
                None if self.include_template_content => doc.template_contents.borrow().host_of(current),
                None => None,
            };
            self.current = next;
            let ancestor = next?;
            if let Ok(node) = doc.resolve(ancestor)
                && (self.filter)(&node)
            {
                return Some(node);
            }
        }
    }
}

impl Node {
    /// Lazily iterate descendants accepted by `filter`
    pub fn walk<F>(&self, filter: F) -> Walk<F>
    where
        F: FnMut(&Node) -> bool,
    {
        Walk {
            doc: self.0.doc.clone(),
            stack: Vec::new(),
            started: Some(self.native()),
            include_template_content: false,
            filter,
        }
    }

    /// Lazily iterate ancestors accepted by `filter`
    pub fn moonwalk<F>(&self, filter: F) -> Moonwalk<F>
    where
        F: FnMut(&Node) -> bool,
    {
        Moonwalk {
            doc: self.0.doc.clone(),
            current: Some(self.native()),
            include_template_content: false,
            filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Document;

    #[test]
    fn test_walk_order_and_filter() {
        let doc = Document::new_html().unwrap();
        let body = doc.body().unwrap();
        body.append(["a"]).unwrap();
        let p = doc.create_element("p").unwrap();
        p.append(["b"]).unwrap();
        body.append_child(&p).unwrap();

        let names: Vec<String> = doc.as_node().walk(|_| true).map(|n| n.node_name()).collect();
        assert_eq!(names, ["html", "HTML", "HEAD", "BODY", "#text", "P", "#text"]);

        let elements: Vec<String> = doc
            .as_node()
            .walk(|n| n.is_element())
            .map(|n| n.node_name())
            .collect();
        assert_eq!(elements, ["HTML", "HEAD", "BODY", "P"]);
    }

    #[test]
    fn test_walk_into_template_content() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        let template = div.append_child(&doc.create_element("template").unwrap()).unwrap();
        template.content().unwrap().append(["inside"]).unwrap();

        assert_eq!(div.walk(|_| true).count(), 1);
        let all: Vec<String> = div
            .walk(|_| true)
            .include_template_content(true)
            .map(|n| n.node_name())
            .collect();
        assert_eq!(all, ["TEMPLATE", "#text"]);
    }

    #[test]
    fn test_moonwalk() {
        let doc = Document::new();
        let template = doc.create_element("template").unwrap();
        let span = doc.create_element("span").unwrap();
        let em = span.append_child(&doc.create_element("em").unwrap()).unwrap();
        template.content().unwrap().append_child(&span).unwrap();

        assert_eq!(em.moonwalk(|n| n.is_element()).count(), 1);
        let crossing: Vec<String> = em
            .moonwalk(|_| true)
            .include_template_content(true)
            .map(|n| n.node_name())
            .collect();
        assert_eq!(crossing, ["SPAN", "#document-fragment", "TEMPLATE"]);
    }
}
