//! Comprehensive tests for veneer-native
//!
//! Tree storage, cloning across trees, and path queries over a small
//! document.

use veneer_native::{NativeError, NativeId, NativeKind, NativeTree, Query, QueryError, Value};

const HTML: &str = "http://www.w3.org/1999/xhtml";
const SVG: &str = "http://www.w3.org/2000/svg";

struct Page {
    tree: NativeTree,
    body: NativeId,
    items: Vec<NativeId>,
}

fn page() -> Page {
    let mut tree = NativeTree::new();
    let root = tree.root();
    let doctype = tree.create_doctype("html", "", "").unwrap();
    tree.append_child(root, doctype).unwrap();
    let html = tree.create_element(Some(HTML), None, "html").unwrap();
    tree.append_child(root, html).unwrap();
    let body = tree.create_element(Some(HTML), None, "body").unwrap();
    tree.append_child(html, body).unwrap();

    let mut items = Vec::new();
    for (i, label) in ["alpha", "beta", "gamma"].iter().enumerate() {
        let li = tree.create_element(Some(HTML), None, "li").unwrap();
        tree.set_attribute(li, None, None, "id", &format!("i{i}")).unwrap();
        let text = tree.create_text(label);
        tree.append_child(li, text).unwrap();
        tree.append_child(body, li).unwrap();
        items.push(li);
    }
    let svg = tree.create_element(Some(SVG), None, "svg").unwrap();
    tree.append_child(body, svg).unwrap();
    let comment = tree.create_comment("note");
    tree.append_child(body, comment).unwrap();

    Page { tree, body, items }
}

fn nodes(value: Value) -> Vec<NativeId> {
    match value {
        Value::NodeSet(nodes) => nodes,
        other => panic!("expected a node-set, got {other:?}"),
    }
}

// ============================================================================
// STORAGE
// ============================================================================

#[test]
fn test_names_must_be_ncnames() {
    let mut tree = NativeTree::new();
    assert!(matches!(
        tree.create_element(None, None, "a:b"),
        Err(NativeError::InvalidName(_))
    ));
    assert!(matches!(
        tree.create_element(None, None, "1a"),
        Err(NativeError::InvalidName(_))
    ));
    assert!(tree.create_element(None, Some("svg"), "rect").is_ok());
    assert_eq!(tree.create_doctype("", "", ""), Err(NativeError::EmptyDoctypeName));
}

#[test]
fn test_navigation_and_descendants() {
    let Page { tree, body, items } = page();
    assert_eq!(tree.children(body).count(), 5);
    assert_eq!(tree.first_child(body), Some(items[0]));
    assert_eq!(tree.next_sibling(items[0]), Some(items[1]));
    assert_eq!(tree.prev_sibling(items[0]), None);
    assert_eq!(tree.root_of(items[2]), tree.root());
    assert_eq!(tree.descendants(body).filter(|&d| tree.kind(d) == Ok(NativeKind::Text)).count(), 3);
}

#[test]
fn test_move_and_replace() {
    let Page { mut tree, body, items } = page();
    tree.append_child(body, items[0]).unwrap();
    assert_eq!(tree.last_child(body), Some(items[0]));
    tree.insert_before(body, items[0], Some(items[1])).unwrap();
    assert_eq!(tree.first_child(body), Some(items[0]));

    let fresh = tree.create_element(Some(HTML), None, "li").unwrap();
    tree.replace_child(body, fresh, items[1]).unwrap();
    assert_eq!(tree.parent(items[1]), None);
    assert_eq!(tree.next_sibling(items[0]), Some(fresh));

    assert!(matches!(
        tree.remove_child(body, items[1]),
        Err(NativeError::NotAChild { .. })
    ));
}

#[test]
fn test_attributes_replace_in_place() {
    let Page { mut tree, items, .. } = page();
    let li = items[0];
    tree.set_attribute(li, None, None, "class", "a").unwrap();
    let first = tree.find_attribute(li, None, "id").unwrap();
    tree.set_attribute(li, None, None, "id", "changed").unwrap();
    assert_eq!(tree.attributes(li), [first, tree.find_attribute(li, None, "class").unwrap()]);
    assert_eq!(tree.attribute_value(first), Some("changed"));
    assert_eq!(tree.owner_element(first), Some(li));

    tree.detach_attribute(first).unwrap();
    assert_eq!(tree.attribute_count(li), 1);
    assert_eq!(tree.owner_element(first), None);
}

#[test]
fn test_import_into_another_tree() {
    let Page { tree, body, .. } = page();
    let mut other = NativeTree::new();
    let copy = other.import_node(&tree, body, true).unwrap();
    assert_eq!(copy.tree(), other.id());
    assert_ne!(copy.tree(), body.tree());
    assert_eq!(other.children(copy).count(), 5);
    assert!(other.parent(copy).is_none());
    assert!(matches!(
        other.append_child(other.root(), body),
        Err(NativeError::ForeignNode(_))
    ));
}

// ============================================================================
// QUERIES
// ============================================================================

#[test]
fn test_paths_and_predicates() {
    let Page { tree, body, items } = page();
    let root = tree.root();
    assert_eq!(nodes(tree.evaluate("//li", root).unwrap()), items);
    assert_eq!(nodes(tree.evaluate("li[2]", body).unwrap()), [items[1]]);
    assert_eq!(nodes(tree.evaluate("li[last()]", body).unwrap()), [items[2]]);
    assert_eq!(nodes(tree.evaluate("//li[@id='i1']/following-sibling::li", root).unwrap()), [items[2]]);
    assert_eq!(nodes(tree.evaluate("../body/li[1]", body).unwrap()), [items[0]]);
    assert_eq!(nodes(tree.evaluate("svg", body).unwrap()), Vec::<NativeId>::new());
    assert_eq!(nodes(tree.evaluate("*[local-name()='svg']", body).unwrap()).len(), 1);
}

#[test]
fn test_scalar_results() {
    let Page { tree, body, .. } = page();
    assert_eq!(tree.evaluate("count(li)", body).unwrap(), Value::Number(3.0));
    assert_eq!(
        tree.evaluate("concat(li[1], '-', li[3])", body).unwrap(),
        Value::String("alpha-gamma".into())
    );
    assert_eq!(tree.evaluate("boolean(comment())", body).unwrap(), Value::Boolean(true));
    assert_eq!(tree.evaluate("7 mod 3 + 10 div 4", body).unwrap(), Value::Number(3.5));
    let text = tree.evaluate("string(li[2])", body).unwrap();
    assert_eq!(tree.value_to_string(&text), "beta");
    assert!(tree.value_to_number(&Value::String("x".into())).is_nan());
}

#[test]
fn test_unions_are_in_document_order() {
    let Page { tree, body, items } = page();
    let union = nodes(tree.evaluate("li[3] | li[1]", body).unwrap());
    assert_eq!(union, [items[0], items[2]]);
}

#[test]
fn test_query_errors() {
    let Page { tree, body, .. } = page();
    assert!(matches!(tree.evaluate("//li[", body), Err(QueryError::Syntax { .. })));
    assert!(matches!(
        tree.evaluate("frobnicate()", body),
        Err(QueryError::UnknownFunction(_))
    ));
    let other = NativeTree::new();
    let query = Query::parse("*").unwrap();
    assert_eq!(query.evaluate(&other, body), Err(QueryError::ForeignContext));
    assert_eq!(query.source(), "*");
}
