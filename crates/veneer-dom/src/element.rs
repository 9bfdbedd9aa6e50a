//! Element and attribute API

use veneer_native::{NativeId, NativeName, NativeTree};

use crate::coercion::{uncoerce_name, validate_and_extract, validate_name, with_coercion};
use crate::collection::{Filter, HtmlCollection, NamedNodeMap};
use crate::error::{DomError, DomResult};
use crate::namespace;
use crate::node::{Node, NodeKind};
use crate::token_list::TokenList;

impl Node {
    fn require_element(&self) -> DomResult<()> {
        if self.is_element() {
            Ok(())
        } else {
            Err(DomError::Type(format!("{:?} nodes have no attributes", self.kind())))
        }
    }

    /// HTML-namespace elements look attributes up case-insensitively
    fn attribute_lookup_name(&self, tree: &NativeTree, qualified_name: &str) -> String {
        if is_html_element(tree, self.native()) {
            qualified_name.to_ascii_lowercase()
        } else {
            qualified_name.to_string()
        }
    }

    /// Live attribute map
    pub fn attributes(&self) -> NamedNodeMap {
        NamedNodeMap::new(self)
    }

    pub fn has_attributes(&self) -> bool {
        self.read(|tree, id| tree.attribute_count(id) > 0)
    }

    /// Qualified names of all attributes, in order
    pub fn get_attribute_names(&self) -> Vec<String> {
        self.read(|tree, id| {
            tree.attributes(id)
                .into_iter()
                .filter_map(|attr| tree.name(attr).map(qualified))
                .collect()
        })
    }

    pub fn get_attribute(&self, qualified_name: &str) -> Option<String> {
        self.read(|tree, id| {
            let name = self.attribute_lookup_name(tree, qualified_name);
            let attr = find_by_qualified(tree, id, &name)?;
            tree.attribute_value(attr).map(str::to_string)
        })
    }

    pub fn get_attribute_ns(&self, namespace: Option<&str>, local_name: &str) -> Option<String> {
        self.read(|tree, id| {
            let attr = find_by_ns(tree, id, namespace, local_name)?;
            tree.attribute_value(attr).map(str::to_string)
        })
    }

    pub fn has_attribute(&self, qualified_name: &str) -> bool {
        self.read(|tree, id| {
            let name = self.attribute_lookup_name(tree, qualified_name);
            find_by_qualified(tree, id, &name).is_some()
        })
    }

    pub fn has_attribute_ns(&self, namespace: Option<&str>, local_name: &str) -> bool {
        self.read(|tree, id| find_by_ns(tree, id, namespace, local_name).is_some())
    }

    /// Set an attribute by qualified name, creating it in no namespace
    pub fn set_attribute(&self, qualified_name: &str, value: &str) -> DomResult<()> {
        self.require_element()?;
        validate_name(qualified_name)?;
        let doc = self.owner()?;
        let (name, existing) = {
            let tree = doc.tree();
            let name = self.attribute_lookup_name(&tree, qualified_name);
            let existing = find_by_qualified(&tree, self.native(), &name);
            (name, existing)
        };
        match existing {
            Some(attr) => doc
                .tree_mut()
                .set_attribute_value(attr, value)
                .map_err(DomError::invariant),
            None => with_coercion(&name, |local| {
                doc.tree_mut().set_attribute(self.native(), None, None, local, value)
            })
            .map(drop),
        }
    }

    pub fn set_attribute_ns(&self, namespace: Option<&str>, qualified_name: &str, value: &str) -> DomResult<()> {
        self.require_element()?;
        let name = validate_and_extract(namespace, qualified_name)?;
        let doc = self.owner()?;
        let existing = find_by_ns(&doc.tree(), self.native(), name.namespace.as_deref(), &name.local_name);
        match existing {
            Some(attr) => doc
                .tree_mut()
                .set_attribute_value(attr, value)
                .map_err(DomError::invariant),
            None => with_coercion(&name.local_name, |local| {
                doc.tree_mut().set_attribute(
                    self.native(),
                    name.namespace.as_deref(),
                    name.prefix.as_deref(),
                    local,
                    value,
                )
            })
            .map(drop),
        }
    }

    pub fn remove_attribute(&self, qualified_name: &str) -> DomResult<()> {
        self.require_element()?;
        let doc = self.owner()?;
        let existing = {
            let tree = doc.tree();
            let name = self.attribute_lookup_name(&tree, qualified_name);
            find_by_qualified(&tree, self.native(), &name)
        };
        match existing {
            Some(attr) => doc.tree_mut().detach_attribute(attr).map_err(DomError::invariant),
            None => Ok(()),
        }
    }

    pub fn remove_attribute_ns(&self, namespace: Option<&str>, local_name: &str) -> DomResult<()> {
        self.require_element()?;
        let doc = self.owner()?;
        let namespace = namespace.filter(|ns| !ns.is_empty());
        let existing = find_by_ns(&doc.tree(), self.native(), namespace, local_name);
        match existing {
            Some(attr) => doc.tree_mut().detach_attribute(attr).map_err(DomError::invariant),
            None => Ok(()),
        }
    }

    /// Add or remove a boolean attribute; returns whether it is now present
    pub fn toggle_attribute(&self, qualified_name: &str, force: Option<bool>) -> DomResult<bool> {
        self.require_element()?;
        validate_name(qualified_name)?;
        let present = self.has_attribute(qualified_name);
        match (present, force) {
            (false, Some(false)) => Ok(false),
            (false, _) => self.set_attribute(qualified_name, "").map(|_| true),
            (true, Some(true)) => Ok(true),
            (true, _) => self.remove_attribute(qualified_name).map(|_| false),
        }
    }

    pub fn get_attribute_node(&self, qualified_name: &str) -> Option<Node> {
        self.related(|tree, id| {
            let name = self.attribute_lookup_name(tree, qualified_name);
            find_by_qualified(tree, id, &name)
        })
    }

    pub fn get_attribute_node_ns(&self, namespace: Option<&str>, local_name: &str) -> Option<Node> {
        self.related(|tree, id| find_by_ns(tree, id, namespace, local_name))
    }

    /// Attach an attribute node, returning the one it replaced
    pub fn set_attribute_node(&self, attr: &Node) -> DomResult<Option<Node>> {
        self.require_element()?;
        if attr.kind() != NodeKind::Attribute {
            return Err(DomError::Type("set_attribute_node requires an attribute".into()));
        }
        let doc = self.owner()?;
        if !doc.owns(attr) {
            return Err(DomError::WrongDocument);
        }
        let owner = doc.tree().owner_element(attr.native());
        match owner {
            Some(owner) if owner == self.native() => return Ok(Some(attr.clone())),
            Some(_) => return Err(DomError::InUseAttribute),
            None => {}
        }
        let replaced = doc
            .tree_mut()
            .attach_attribute(self.native(), attr.native())
            .map_err(DomError::invariant)?;
        replaced.map(|old| doc.resolve(old)).transpose()
    }

    pub fn remove_attribute_node(&self, attr: &Node) -> DomResult<Node> {
        self.require_element()?;
        let doc = self.owner()?;
        let owner = doc.tree().owner_element(attr.native());
        if !doc.owns(attr) || owner != Some(self.native()) {
            return Err(DomError::NotFound("attribute is not owned by this element"));
        }
        doc.tree_mut()
            .detach_attribute(attr.native())
            .map_err(DomError::invariant)?;
        Ok(attr.clone())
    }

    pub fn id(&self) -> String {
        self.get_attribute_ns(None, "id").unwrap_or_default()
    }

    pub fn set_id(&self, id: &str) -> DomResult<()> {
        self.set_attribute("id", id)
    }

    pub fn class_name(&self) -> String {
        self.get_attribute_ns(None, "class").unwrap_or_default()
    }

    pub fn set_class_name(&self, class: &str) -> DomResult<()> {
        self.set_attribute("class", class)
    }

    /// Token view over the `class` attribute
    pub fn class_list(&self) -> TokenList {
        TokenList::new(self, "class")
    }

    // ------------------------------------------------------------------
    // Attr nodes
    // ------------------------------------------------------------------

    /// Attribute value
    pub fn value(&self) -> Option<String> {
        self.read(|tree, id| tree.attribute_value(id).map(str::to_string))
    }

    pub fn set_value(&self, value: &str) -> DomResult<()> {
        if self.kind() != NodeKind::Attribute {
            return Err(DomError::Type("only attributes carry a value".into()));
        }
        self.owner()?
            .tree_mut()
            .set_attribute_value(self.native(), value)
            .map_err(DomError::invariant)
    }

    /// Element an attribute is attached to
    pub fn owner_element(&self) -> Option<Node> {
        self.related(|tree, id| tree.owner_element(id))
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn get_elements_by_tag_name(&self, qualified_name: &str) -> HtmlCollection {
        HtmlCollection::new(self, Filter::TagName(qualified_name.to_string()))
    }

    pub fn get_elements_by_tag_name_ns(&self, namespace: Option<&str>, local_name: &str) -> HtmlCollection {
        HtmlCollection::new(
            self,
            Filter::TagNameNs {
                namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
                local_name: local_name.to_string(),
            },
        )
    }

    /// Elements carrying every class in the whitespace-separated list
    pub fn get_elements_by_class_name(&self, class_names: &str) -> HtmlCollection {
        let mut classes: Vec<String> = Vec::new();
        for class in class_names.split_ascii_whitespace() {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        }
        HtmlCollection::new(self, Filter::ClassNames(classes))
    }

    /// First descendant element whose `id` is `id`
    pub fn get_element_by_id(&self, id: &str) -> Option<Node> {
        if id.is_empty() {
            return None;
        }
        self.related(|tree, root| {
            tree.descendants(root).find(|&d| {
                find_by_ns(tree, d, None, "id").is_some_and(|attr| tree.attribute_value(attr) == Some(id))
            })
        })
    }
}

pub(crate) fn is_html_element(tree: &NativeTree, id: NativeId) -> bool {
    crate::node::is_element(tree, id)
        && tree
            .name(id)
            .is_some_and(|name| name.namespace.as_deref() == Some(namespace::HTML))
}

/// `prefix:local` with the local name uncoerced
pub(crate) fn qualified(name: &NativeName) -> String {
    let local = uncoerce_name(&name.local);
    match &name.prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.into_owned(),
    }
}

fn qualified_eq(name: &NativeName, qualified_name: &str) -> bool {
    let local = uncoerce_name(&name.local);
    match &name.prefix {
        Some(prefix) => qualified_name
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .is_some_and(|rest| rest == local),
        None => local == qualified_name,
    }
}

pub(crate) fn find_by_qualified(tree: &NativeTree, element: NativeId, qualified_name: &str) -> Option<NativeId> {
    tree.attributes(element)
        .into_iter()
        .find(|&attr| tree.name(attr).is_some_and(|name| qualified_eq(name, qualified_name)))
}

pub(crate) fn find_by_ns(
    tree: &NativeTree,
    element: NativeId,
    namespace: Option<&str>,
    local_name: &str,
) -> Option<NativeId> {
    let namespace = namespace.filter(|ns| !ns.is_empty());
    tree.attributes(element).into_iter().find(|&attr| {
        tree.name(attr).is_some_and(|name| {
            name.namespace.as_deref() == namespace && uncoerce_name(&name.local) == local_name
        })
    })
}

#[cfg(test)]
mod tests {
    use crate::Document;

    #[test]
    fn test_colon_attribute_is_stored_coerced() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        div.set_attribute("test:test", "v").unwrap();
        assert_eq!(div.get_attribute("test:test"), Some("v".into()));
        assert_eq!(div.get_attribute_names(), ["test:test"]);
        let stored = div.read(|tree, id| tree.attributes(id).iter().map(|&a| tree.name(a).unwrap().local.clone()).collect::<Vec<_>>());
        assert_eq!(stored, ["testU00003Atest"]);
    }

    #[test]
    fn test_case_insensitive_lookup_on_html_elements() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        div.set_attribute("DATA-X", "1").unwrap();
        assert_eq!(div.get_attribute("data-x"), Some("1".into()));
        assert!(div.has_attribute("Data-X"));

        let svg = doc.create_element_ns(Some(crate::namespace::SVG), "svg").unwrap();
        svg.set_attribute("viewBox", "0 0 1 1").unwrap();
        assert_eq!(svg.get_attribute("viewBox"), Some("0 0 1 1".into()));
        assert_eq!(svg.get_attribute("viewbox"), None);
    }

    #[test]
    fn test_namespaced_attributes() {
        let doc = Document::new();
        let a = doc.create_element("a").unwrap();
        a.set_attribute_ns(Some(crate::namespace::XLINK), "xlink:href", "#x").unwrap();
        assert_eq!(a.get_attribute("xlink:href"), Some("#x".into()));
        assert_eq!(a.get_attribute_ns(Some(crate::namespace::XLINK), "href"), Some("#x".into()));
        a.remove_attribute_ns(Some(crate::namespace::XLINK), "href").unwrap();
        assert!(!a.has_attributes());
    }

    #[test]
    fn test_toggle_attribute() {
        let doc = Document::new();
        let input = doc.create_element("input").unwrap();
        assert_eq!(input.toggle_attribute("hidden", None), Ok(true));
        assert_eq!(input.get_attribute("hidden"), Some(String::new()));
        assert_eq!(input.toggle_attribute("hidden", Some(true)), Ok(true));
        assert_eq!(input.toggle_attribute("hidden", None), Ok(false));
        assert_eq!(input.toggle_attribute("hidden", Some(false)), Ok(false));
        assert!(input.toggle_attribute("a b", None).is_err());
    }

    #[test]
    fn test_attribute_nodes() {
        let doc = Document::new();
        let first = doc.create_element("p").unwrap();
        let second = doc.create_element("p").unwrap();
        let attr = doc.create_attribute("title").unwrap();
        attr.set_value("hello").unwrap();

        assert_eq!(first.set_attribute_node(&attr), Ok(None));
        assert_eq!(attr.owner_element(), Some(first.clone()));
        assert_eq!(first.get_attribute_node("title"), Some(attr.clone()));
        assert_eq!(second.set_attribute_node(&attr).map_err(|e| e.name()), Err("InUseAttributeError"));

        let replacement = doc.create_attribute("title").unwrap();
        assert_eq!(first.set_attribute_node(&replacement), Ok(Some(attr.clone())));
        assert_eq!(attr.owner_element(), None);

        assert_eq!(first.remove_attribute_node(&attr).map_err(|e| e.name()), Err("NotFoundError"));
        assert_eq!(first.remove_attribute_node(&replacement), Ok(replacement.clone()));
    }

    #[test]
    fn test_id_and_class() {
        let doc = Document::new_html().unwrap();
        let body = doc.body().unwrap();
        let p = doc.create_element("p").unwrap();
        p.set_id("intro").unwrap();
        p.set_class_name("a b").unwrap();
        body.append_child(&p).unwrap();
        assert_eq!(doc.get_element_by_id("intro"), Some(p.clone()));
        assert_eq!(p.class_name(), "a b");
        assert_eq!(doc.get_element_by_id(""), None);
    }
}
