//! Edge case and stress tests for veneer-dom
//!
//! Rare structural situations, dropped documents and randomized mutation
//! sequences against the document structure rules.

use proptest::prelude::*;
use veneer_dom::{Document, DomError, Node, NodeType, QuirksMode};

// ============================================================================
// DOCUMENT STRUCTURE
// ============================================================================

#[test]
fn test_doctype_must_precede_element() {
    let doc = Document::new();
    let html = doc.create_element("html").unwrap();
    doc.as_node().append_child(&html).unwrap();
    let doctype = doc.create_document_type("html", "", "").unwrap();
    assert_eq!(
        doc.as_node().append_child(&doctype).map_err(|e| e.name()),
        Err("HierarchyRequestError")
    );
    doc.as_node().insert_before(&doctype, Some(&html)).unwrap();
    assert_eq!(doc.doctype(), Some(doctype));
}

#[test]
fn test_replace_document_element() {
    let doc = Document::new_html().unwrap();
    let old = doc.document_element().unwrap();
    let new = doc.create_element("html").unwrap();
    doc.as_node().replace_child(&new, &old).unwrap();
    assert_eq!(doc.document_element(), Some(new));
    assert!(doc.body().is_none());
}

#[test]
fn test_fragment_with_two_elements_rejected_at_document() {
    let doc = Document::new();
    let fragment = doc.create_document_fragment().unwrap();
    fragment.append_child(&doc.create_element("a").unwrap()).unwrap();
    fragment.append_child(&doc.create_element("b").unwrap()).unwrap();
    assert_eq!(
        doc.as_node().append_child(&fragment).map_err(|e| e.name()),
        Err("HierarchyRequestError")
    );
    assert_eq!(fragment.child_nodes().len(), 2);
}

#[test]
fn test_self_insertion() {
    let doc = Document::new_html().unwrap();
    let body = doc.body().unwrap();
    assert_eq!(
        body.append_child(&body).map_err(|e| e.name()),
        Err("HierarchyRequestError")
    );
    let p = doc.create_element("p").unwrap();
    body.append_child(&p).unwrap();
    body.insert_before(&p, Some(&p)).unwrap();
    assert_eq!(body.child_nodes().len(), 1);
}

#[test]
fn test_document_cannot_be_cloned_or_inserted() {
    let doc = Document::new_html().unwrap();
    assert_eq!(doc.as_node().clone_node(true).map_err(|e| e.name()), Err("NotSupportedError"));
    let div = doc.create_element("div").unwrap();
    assert_eq!(
        div.append_child(doc.as_node()).map_err(|e| e.name()),
        Err("HierarchyRequestError")
    );
}

// ============================================================================
// NAMES
// ============================================================================

#[test]
fn test_invalid_names() {
    let doc = Document::new();
    assert_eq!(doc.create_element("").map_err(|e| e.name()), Err("InvalidCharacterError"));
    assert_eq!(doc.create_element("a b").map_err(|e| e.name()), Err("InvalidCharacterError"));
    assert_eq!(
        doc.create_element_ns(None, "x:y").map_err(|e| e.name()),
        Err("NamespaceError")
    );
    assert_eq!(doc.create_cdata_section("x").map_err(|e| e.name()), Err("NotSupportedError"));
}

#[test]
fn test_lookalike_names_survive() {
    let doc = Document::new();
    let el = doc.create_element("div").unwrap();
    el.set_attribute_ns(None, "U00003A", "literal").unwrap();
    el.set_attribute("a:b", "coerced").unwrap();
    assert_eq!(el.get_attribute_ns(None, "U00003A"), Some("literal".into()));
    assert_eq!(el.get_attribute("a:b"), Some("coerced".into()));
    let mut names = el.get_attribute_names();
    names.sort();
    assert_eq!(names, ["U00003A", "a:b"]);
}

#[test]
fn test_mixed_case_html_names() {
    let doc = Document::new_html().unwrap();
    let el = doc.create_element("DiV").unwrap();
    assert_eq!(el.local_name(), Some("div".into()));
    assert_eq!(el.tag_name(), Some("DIV".into()));
    el.set_attribute("DATA-X", "1").unwrap();
    assert_eq!(el.get_attribute("data-x"), Some("1".into()));
}

// ============================================================================
// DROPPED DOCUMENTS
// ============================================================================

#[test]
fn test_wrappers_outliving_their_document() {
    let doc = Document::new_html().unwrap();
    let body = doc.body().unwrap();
    let list = body.child_nodes();
    drop(doc);
    assert!(body.document().is_none());
    assert!(body.first_child().is_none());
    assert_eq!(list.len(), 0);
    assert_eq!(body.inner_html(), "");
    assert_eq!(body.query_selector_all("p").unwrap().len(), 0);
    assert_eq!(
        body.append(["x"]).map_err(|e| e.name()),
        Err("InvalidStateError")
    );
}

// ============================================================================
// QUERIES
// ============================================================================

#[test]
fn test_quirks_mode_class_matching() {
    let doc = Document::new_html().unwrap();
    let p = doc.create_element("p").unwrap();
    p.set_class_name("Big").unwrap();
    doc.body().unwrap().append_child(&p).unwrap();
    assert_eq!(doc.get_elements_by_class_name("big").len(), 0);
    doc.set_quirks_mode(QuirksMode::Quirks);
    assert_eq!(doc.get_elements_by_class_name("big").len(), 1);
}

#[test]
fn test_selector_with_quotes_in_value() {
    let doc = Document::new_html().unwrap();
    let p = doc.create_element("p").unwrap();
    p.set_attribute("title", "it's \"quoted\"").unwrap();
    doc.body().unwrap().append_child(&p).unwrap();
    let found = doc.query_selector(r#"[title="it's \"quoted\""]"#).unwrap();
    assert_eq!(found, Some(p));
}

#[test]
fn test_empty_and_unsupported_selectors() {
    let doc = Document::new_html().unwrap();
    assert_eq!(doc.query_selector("").map_err(|e| e.name()), Err("SyntaxError"));
    assert_eq!(doc.query_selector("body:hover").unwrap(), None);
    assert!(doc.query_selector(":empty").unwrap().is_some());
}

#[test]
fn test_text_content_of_kinds() {
    let doc = Document::new_html().unwrap();
    assert_eq!(doc.as_node().text_content(), None);
    let comment = doc.create_comment("c").unwrap();
    assert_eq!(comment.text_content(), Some("c".into()));
    assert_eq!(comment.node_type(), NodeType::Comment);
    let doctype = doc.doctype().unwrap();
    assert_eq!(doctype.text_content(), None);
    assert_eq!(doctype.name(), Some("html".into()));
}

// ============================================================================
// RANDOMIZED STRUCTURE
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Subject {
    Element,
    Doctype,
    Comment,
    Text,
    Fragment { elements: usize, text: bool },
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Insert(Subject),
    Remove,
    Replace(Subject),
}

fn fragment() -> impl Strategy<Value = Subject> {
    (0usize..=2, any::<bool>()).prop_map(|(elements, text)| Subject::Fragment { elements, text })
}

fn subject() -> impl Strategy<Value = Subject> {
    prop_oneof![
        Just(Subject::Element),
        Just(Subject::Doctype),
        Just(Subject::Comment),
        Just(Subject::Text),
        fragment(),
    ]
}

fn op() -> impl Strategy<Value = (Op, usize)> {
    let replacement = prop_oneof![Just(Subject::Element), Just(Subject::Doctype), fragment()];
    (
        prop_oneof![
            3 => subject().prop_map(Op::Insert),
            1 => Just(Op::Remove),
            2 => replacement.prop_map(Op::Replace),
        ],
        0usize..8,
    )
}

fn make(doc: &Document, subject: Subject) -> Node {
    match subject {
        Subject::Element => doc.create_element("html").unwrap(),
        Subject::Doctype => doc.create_document_type("html", "", "").unwrap(),
        Subject::Comment => doc.create_comment("c").unwrap(),
        Subject::Text => doc.create_text_node("t").unwrap(),
        Subject::Fragment { elements, text } => {
            let fragment = doc.create_document_fragment().unwrap();
            for _ in 0..elements {
                fragment.append_child(&doc.create_element("html").unwrap()).unwrap();
            }
            if text {
                fragment.append_child(&doc.create_text_node("t").unwrap()).unwrap();
            }
            fragment
        }
    }
}

fn assert_document_shape(doc: &Document) {
    let children = doc.as_node().child_nodes().to_vec();
    let position = |ty: NodeType| children.iter().position(|c| c.node_type() == ty);
    let count = |ty: NodeType| children.iter().filter(|c| c.node_type() == ty).count();
    assert!(count(NodeType::Element) <= 1);
    assert!(count(NodeType::DocumentType) <= 1);
    assert_eq!(count(NodeType::Text), 0);
    if let (Some(doctype), Some(element)) = (position(NodeType::DocumentType), position(NodeType::Element)) {
        assert!(doctype < element);
    }
}

proptest! {
    #[test]
    fn prop_document_structure_holds(ops in prop::collection::vec(op(), 0..40)) {
        let doc = Document::new();
        let root = doc.as_node();
        for (op, index) in ops {
            let children = root.child_nodes().to_vec();
            let target = (!children.is_empty()).then(|| children[index % children.len()].clone());
            let result = match (op, &target) {
                (Op::Remove, Some(child)) => root.remove_child(child).map(drop),
                (Op::Replace(subject), Some(child)) => {
                    let node = make(&doc, subject);
                    let result = root.replace_child(&node, child).map(drop);
                    if result.is_ok() && node.node_type() == NodeType::DocumentFragment {
                        prop_assert!(!node.has_child_nodes());
                    }
                    result
                }
                (Op::Remove | Op::Replace(_), None) => Ok(()),
                (Op::Insert(subject), _) => {
                    let node = make(&doc, subject);
                    let reference = children.get(index % (children.len() + 1)).cloned();
                    let result = root.insert_before(&node, reference.as_ref()).map(drop);
                    if result.is_ok() && node.node_type() == NodeType::DocumentFragment {
                        prop_assert!(!node.has_child_nodes());
                    }
                    result
                }
            };
            if let Err(err) = result {
                prop_assert_eq!(err.name(), "HierarchyRequestError");
            }
            assert_document_shape(&doc);
        }
    }

    #[test]
    fn prop_attribute_names_round_trip(name in "[a-z]{1,4}(:[a-z]{1,4})?") {
        let doc = Document::new();
        let el = doc.create_element("div").unwrap();
        el.set_attribute(&name, "v").unwrap();
        prop_assert_eq!(el.get_attribute(&name), Some("v".to_string()));
        prop_assert_eq!(el.get_attribute_names(), vec![name.clone()]);
        el.remove_attribute(&name).unwrap();
        prop_assert!(!el.has_attributes());
    }

    #[test]
    fn prop_lookalike_names_round_trip(name in "[a-z]{0,2}U[0-9A-F]{6}") {
        let doc = Document::new();
        let el = doc.create_element("div").unwrap();
        el.set_attribute_ns(None, &name, "v").unwrap();
        prop_assert_eq!(el.get_attribute_ns(None, &name), Some("v".to_string()));
        prop_assert_eq!(el.get_attribute_names(), vec![name.clone()]);
    }
}

#[test]
fn test_wrong_document_error_kind() {
    let a = Document::new();
    let b = Document::new();
    let node = b.create_comment("x").unwrap();
    assert_eq!(a.as_node().append_child(&node), Err(DomError::WrongDocument));
}
