//! DOMTokenList
//!
//! Ordered, duplicate-free token view over one attribute (`classList`).
//! The set is parsed from the attribute on every access and written back
//! after each change.

use std::fmt;
use std::rc::Weak;

use veneer_native::NativeId;

use crate::document::DocumentInner;
use crate::element::find_by_ns;
use crate::error::{DomError, DomResult};
use crate::node::Node;

pub struct TokenList {
    doc: Weak<DocumentInner>,
    element: NativeId,
    attribute: &'static str,
}

impl TokenList {
    pub(crate) fn new(element: &Node, attribute: &'static str) -> Self {
        Self {
            doc: element.0.doc.clone(),
            element: element.native(),
            attribute,
        }
    }

    /// Raw attribute value, `None` when the attribute is absent
    fn raw(&self) -> Option<String> {
        let doc = self.doc.upgrade()?;
        let tree = doc.tree();
        let attr = find_by_ns(&tree, self.element, None, self.attribute)?;
        tree.attribute_value(attr).map(str::to_string)
    }

    fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        for token in self.raw().unwrap_or_default().split_ascii_whitespace() {
            if !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
        tokens
    }

    fn update(&self, tokens: &[String]) -> DomResult<()> {
        if tokens.is_empty() && self.raw().is_none() {
            return Ok(());
        }
        self.set_value(&tokens.join(" "))
    }

    fn element(&self) -> DomResult<Node> {
        let doc = self.doc.upgrade().ok_or_else(DomError::detached)?;
        doc.resolve(self.element)
    }

    pub fn len(&self) -> usize {
        self.tokens().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens().is_empty()
    }

    pub fn item(&self, index: usize) -> Option<String> {
        self.tokens().into_iter().nth(index)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens().iter().any(|t| t == token)
    }

    /// Attribute value as stored
    pub fn value(&self) -> String {
        self.raw().unwrap_or_default()
    }

    pub fn set_value(&self, value: &str) -> DomResult<()> {
        self.element()?.set_attribute(self.attribute, value)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.tokens()
    }

    pub fn iter(&self) -> std::vec::IntoIter<String> {
        self.tokens().into_iter()
    }

    pub fn add(&self, tokens: &[&str]) -> DomResult<()> {
        tokens.iter().try_for_each(|t| validate_token(t))?;
        let mut set = self.tokens();
        for token in tokens {
            if !set.iter().any(|t| t == token) {
                set.push(token.to_string());
            }
        }
        self.update(&set)
    }

    pub fn remove(&self, tokens: &[&str]) -> DomResult<()> {
        tokens.iter().try_for_each(|t| validate_token(t))?;
        let mut set = self.tokens();
        set.retain(|t| !tokens.contains(&t.as_str()));
        self.update(&set)
    }

    /// Flip a token; `force` pins the outcome. Returns whether it is present.
    pub fn toggle(&self, token: &str, force: Option<bool>) -> DomResult<bool> {
        validate_token(token)?;
        let mut set = self.tokens();
        let present = set.iter().any(|t| t == token);
        match (present, force) {
            (true, Some(true)) => Ok(true),
            (true, _) => {
                set.retain(|t| t != token);
                self.update(&set).map(|_| false)
            }
            (false, Some(false)) => Ok(false),
            (false, _) => {
                set.push(token.to_string());
                self.update(&set).map(|_| true)
            }
        }
    }

    /// Swap `token` for `new_token` in place; false when `token` is absent
    pub fn replace(&self, token: &str, new_token: &str) -> DomResult<bool> {
        validate_token(token)?;
        validate_token(new_token)?;
        let set = self.tokens();
        if !set.iter().any(|t| t == token) {
            return Ok(false);
        }
        let mut replaced: Vec<String> = Vec::with_capacity(set.len());
        for t in set {
            let t = if t == token { new_token.to_string() } else { t };
            if !replaced.contains(&t) {
                replaced.push(t);
            }
        }
        self.update(&replaced).map(|_| true)
    }

    /// `class` defines no supported tokens
    pub fn supports(&self, token: &str) -> DomResult<bool> {
        Err(DomError::Type(format!(
            "{} attribute has no supported tokens (asked about {token:?})",
            self.attribute
        )))
    }
}

impl fmt::Display for TokenList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value())
    }
}

fn validate_token(token: &str) -> DomResult<()> {
    if token.is_empty() {
        return Err(DomError::Syntax("token must not be empty".into()));
    }
    if token.chars().any(|c| c.is_ascii_whitespace()) {
        return Err(DomError::InvalidCharacter(token.to_string()));
    }
    Ok(())
}
