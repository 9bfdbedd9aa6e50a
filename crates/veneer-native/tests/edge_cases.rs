//! Edge case and stress tests for veneer-native
//!
//! Degenerate trees, axis ordering corner cases, number formatting and
//! randomized name checks.

use proptest::prelude::*;
use veneer_native::name::{is_ncname, is_qname};
use veneer_native::{NativeError, NativeId, NativeTree, Value};

fn nodes(value: Value) -> Vec<NativeId> {
    match value {
        Value::NodeSet(nodes) => nodes,
        other => panic!("expected a node-set, got {other:?}"),
    }
}

/// `<r><a/><b/><c/></r>` with no namespace
fn siblings() -> (NativeTree, NativeId, Vec<NativeId>) {
    let mut tree = NativeTree::new();
    let r = tree.create_element(None, None, "r").unwrap();
    tree.append_child(tree.root(), r).unwrap();
    let kids: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            let id = tree.create_element(None, None, name).unwrap();
            tree.append_child(r, id).unwrap();
            id
        })
        .collect();
    (tree, r, kids)
}

// ============================================================================
// TREE
// ============================================================================

#[test]
fn test_empty_tree() {
    let tree = NativeTree::new();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.children(tree.root()).count(), 0);
    assert_eq!(nodes(tree.evaluate("//*", tree.root()).unwrap()), Vec::<NativeId>::new());
    assert_eq!(tree.string_value(tree.root()), "");
}

#[test]
fn test_structure_rules_are_not_enforced() {
    let (mut tree, r, kids) = siblings();
    let text = tree.create_text("t");
    tree.append_child(tree.root(), text).unwrap();
    let second = tree.create_element(None, None, "r2").unwrap();
    tree.append_child(tree.root(), second).unwrap();
    assert_eq!(tree.children(tree.root()).count(), 3);
    assert!(matches!(
        tree.append_child(r, tree.root()),
        Err(NativeError::WrongKind(_))
    ));
    assert_eq!(tree.parent(kids[0]), Some(r));
}

#[test]
fn test_insert_before_foreign_reference() {
    let (mut tree, r, kids) = siblings();
    let loose = tree.create_comment("x");
    assert!(matches!(
        tree.insert_before(kids[0], loose, Some(kids[1])),
        Err(NativeError::NotAChild { .. })
    ));
    tree.insert_before(r, loose, None).unwrap();
    assert_eq!(tree.last_child(r), Some(loose));
}

#[test]
fn test_deep_chain() {
    let mut tree = NativeTree::new();
    let mut parent = tree.root();
    for _ in 0..1_000 {
        let child = tree.create_element(None, None, "d").unwrap();
        tree.append_child(parent, child).unwrap();
        parent = child;
    }
    assert_eq!(tree.descendants(tree.root()).count(), 1_000);
    assert_eq!(tree.root_of(parent), tree.root());
    let copy = tree.clone_node(tree.root(), true).unwrap();
    assert_eq!(tree.descendants(copy).count(), 1_000);
}

#[test]
fn test_character_data_only_on_character_nodes() {
    let (mut tree, r, _) = siblings();
    assert!(tree.set_character_data(r, "x").is_err());
    let text = tree.create_text("");
    tree.set_character_data(text, "filled").unwrap();
    assert_eq!(tree.character_data(text), Some("filled"));
}

// ============================================================================
// AXES
// ============================================================================

#[test]
fn test_reverse_axes_count_from_context() {
    let (tree, r, kids) = siblings();
    assert_eq!(nodes(tree.evaluate("preceding-sibling::*[1]", kids[2]).unwrap()), [kids[1]]);
    assert_eq!(nodes(tree.evaluate("preceding-sibling::*[last()]", kids[2]).unwrap()), [kids[0]]);
    assert_eq!(nodes(tree.evaluate("ancestor::*[1]", kids[0]).unwrap()), [r]);
    assert_eq!(nodes(tree.evaluate("ancestor-or-self::*", kids[0]).unwrap()), [r, kids[0]]);
    assert_eq!(nodes(tree.evaluate("following-sibling::*[1]", kids[0]).unwrap()), [kids[1]]);
}

#[test]
fn test_attribute_axis_and_self() {
    let (mut tree, r, _) = siblings();
    tree.set_attribute(r, None, None, "k", "v").unwrap();
    let attr = tree.find_attribute(r, None, "k").unwrap();
    assert_eq!(nodes(tree.evaluate("@*", r).unwrap()), [attr]);
    assert_eq!(nodes(tree.evaluate("..", attr).unwrap()), [r]);
    assert_eq!(nodes(tree.evaluate("self::node()", attr).unwrap()), [attr]);
    assert_eq!(nodes(tree.evaluate("child::node()", attr).unwrap()), Vec::<NativeId>::new());
}

#[test]
fn test_detached_context() {
    let mut tree = NativeTree::new();
    let loose = tree.create_element(None, None, "x").unwrap();
    let inner = tree.create_element(None, None, "y").unwrap();
    tree.append_child(loose, inner).unwrap();
    assert_eq!(nodes(tree.evaluate("/", inner).unwrap()), [loose]);
    assert_eq!(nodes(tree.evaluate("//y", inner).unwrap()), [inner]);
}

// ============================================================================
// SCALARS
// ============================================================================

#[test]
fn test_number_formatting() {
    let tree = NativeTree::new();
    let root = tree.root();
    let string = |q: &str| tree.value_to_string(&tree.evaluate(q, root).unwrap());
    assert_eq!(string("1 div 0"), "Infinity");
    assert_eq!(string("-1 div 0"), "-Infinity");
    assert_eq!(string("0 div 0"), "NaN");
    assert_eq!(string("2.50 * 2"), "5");
    assert_eq!(string("0.5"), "0.5");
    assert_eq!(string("-0"), "0");
}

#[test]
fn test_nan_comparisons() {
    let tree = NativeTree::new();
    let root = tree.root();
    assert_eq!(tree.evaluate("number('x') = number('x')", root).unwrap(), Value::Boolean(false));
    assert_eq!(tree.evaluate("number('x') != 1", root).unwrap(), Value::Boolean(true));
    assert_eq!(tree.evaluate("'' = /nothing", root).unwrap(), Value::Boolean(false));
}

#[test]
fn test_string_functions_at_the_edges() {
    let tree = NativeTree::new();
    let root = tree.root();
    let eval = |q: &str| tree.evaluate(q, root).unwrap();
    assert_eq!(eval("substring('12345', 1.5, 2.6)"), Value::String("234".into()));
    assert_eq!(eval("substring('12345', 0, 3)"), Value::String("12".into()));
    assert_eq!(eval("substring('12345', 0 div 0, 3)"), Value::String(String::new()));
    assert_eq!(eval("normalize-space('  a \n b  ')"), Value::String("a b".into()));
    assert_eq!(eval("string-length('héllo')"), Value::Number(5.0));
    assert_eq!(eval("translate('bar', 'abc', 'AB')"), Value::String("BAr".into()));
}

// ============================================================================
// RANDOMIZED NAMES
// ============================================================================

proptest! {
    #[test]
    fn prop_ascii_ncnames_are_accepted(name in "[A-Za-z_][A-Za-z0-9._-]{0,12}") {
        prop_assert!(is_ncname(&name));
        let mut tree = NativeTree::new();
        prop_assert!(tree.create_element(None, None, &name).is_ok());
    }

    #[test]
    fn prop_colons_are_not_ncnames(left in "[a-z]{1,4}", right in "[a-z]{1,4}") {
        let name = format!("{left}:{right}");
        prop_assert!(!is_ncname(&name));
        prop_assert!(is_qname(&name));
        let mut tree = NativeTree::new();
        prop_assert!(matches!(
            tree.create_element(None, None, &name),
            Err(NativeError::InvalidName(_))
        ));
    }
}
