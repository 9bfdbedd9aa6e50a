//! Name validation and coercion
//!
//! DOM names follow the XML `Name` / `QName` productions, but the native
//! tree only stores NCNames. Names it refuses are stored in a coerced form
//! where every offending code point becomes `U` followed by six uppercase
//! hex digits (`test:test` is stored as `testU00003Atest`). Any sequence in
//! the input that already looks like such a token has its `U` escaped as
//! `U000055` first, so [`uncoerce_name`] always recovers the original.

use std::borrow::Cow;

use veneer_native::name::{is_name, is_name_char, is_name_start_char, is_qname};
use veneer_native::NativeError;

use crate::error::{DomError, DomResult};
use crate::namespace;

const TOKEN_DIGITS: usize = 6;

/// Result of "validate and extract"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local_name: String,
}

/// Check a name against the XML `Name` production
pub fn validate_name(name: &str) -> DomResult<()> {
    if is_name(name) {
        Ok(())
    } else {
        Err(DomError::InvalidCharacter(name.to_string()))
    }
}

/// Split and check a namespaced qualified name
pub fn validate_and_extract(namespace: Option<&str>, qualified_name: &str) -> DomResult<QualifiedName> {
    let namespace = namespace.filter(|ns| !ns.is_empty());
    if !is_qname(qualified_name) {
        return Err(DomError::InvalidCharacter(qualified_name.to_string()));
    }
    let (prefix, local_name) = match qualified_name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qualified_name),
    };

    if prefix.is_some() && namespace.is_none() {
        return Err(DomError::Namespace("prefix requires a namespace"));
    }
    if prefix == Some("xml") && namespace != Some(namespace::XML) {
        return Err(DomError::Namespace("the xml prefix is reserved for the XML namespace"));
    }
    let is_xmlns = qualified_name == "xmlns" || prefix == Some("xmlns");
    if is_xmlns && namespace != Some(namespace::XMLNS) {
        return Err(DomError::Namespace("xmlns names require the XMLNS namespace"));
    }
    if namespace == Some(namespace::XMLNS) && !is_xmlns {
        return Err(DomError::Namespace("the XMLNS namespace requires an xmlns name"));
    }

    Ok(QualifiedName {
        namespace: namespace.map(str::to_string),
        prefix: prefix.map(str::to_string),
        local_name: local_name.to_string(),
    })
}

/// Turn any string into something the native tree accepts
///
/// Returns the input unchanged when no character needs replacing and it
/// contains nothing that could be mistaken for a token.
pub fn coerce_name(name: &str) -> Cow<'_, str> {
    let chars: Vec<char> = name.chars().collect();
    let clean = chars
        .iter()
        .enumerate()
        .all(|(i, &c)| accepted_at(i, c) && !token_at(&chars, i));
    if clean {
        return Cow::Borrowed(name);
    }

    let mut out = String::with_capacity(name.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        if token_at(&chars, i) {
            push_token(&mut out, 'U');
        } else if accepted_at(i, c) {
            out.push(c);
        } else {
            push_token(&mut out, c);
        }
    }
    Cow::Owned(out)
}

/// Reverse [`coerce_name`]
pub fn uncoerce_name(name: &str) -> Cow<'_, str> {
    if !name.contains('U') {
        return Cow::Borrowed(name);
    }
    let chars: Vec<char> = name.chars().collect();
    if !(0..chars.len()).any(|i| token_at(&chars, i)) {
        return Cow::Borrowed(name);
    }

    let mut out = String::with_capacity(name.len());
    let mut i = 0;
    while i < chars.len() {
        if token_at(&chars, i) {
            let hex: String = chars[i + 1..=i + TOKEN_DIGITS].iter().collect();
            if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                out.push(c);
                i += TOKEN_DIGITS + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    Cow::Owned(out)
}

/// Whether storing `name` must go through coercion even if the native tree
/// would take it verbatim
pub(crate) fn has_token_lookalike(name: &str) -> bool {
    if !name.contains('U') {
        return false;
    }
    let chars: Vec<char> = name.chars().collect();
    (0..chars.len()).any(|i| token_at(&chars, i))
}

/// Run a native operation with `name`, retrying with the coerced form when
/// the native tree rejects it
pub fn with_coercion<T>(name: &str, mut attempt: impl FnMut(&str) -> Result<T, NativeError>) -> DomResult<T> {
    if !has_token_lookalike(name) {
        match attempt(name) {
            Ok(value) => return Ok(value),
            Err(NativeError::InvalidName(_)) => {}
            Err(err) => return Err(DomError::invariant(err)),
        }
    }
    let coerced = coerce_name(name);
    tracing::trace!(name, coerced = %coerced, "storing coerced name");
    attempt(&coerced).map_err(DomError::invariant)
}

fn accepted_at(index: usize, c: char) -> bool {
    if index == 0 {
        is_name_start_char(c)
    } else {
        is_name_char(c)
    }
}

fn token_at(chars: &[char], index: usize) -> bool {
    chars[index] == 'U'
        && chars.len() > index + TOKEN_DIGITS
        && chars[index + 1..=index + TOKEN_DIGITS]
            .iter()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(c))
}

fn push_token(out: &mut String, c: char) {
    use std::fmt::Write;
    let _ = write!(out, "U{:06X}", c as u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_colon_is_coerced() {
        assert_eq!(coerce_name("test:test"), "testU00003Atest");
        assert_eq!(uncoerce_name("testU00003Atest"), "test:test");
    }

    #[test]
    fn test_leading_digit() {
        assert_eq!(coerce_name("1abc"), "U000031abc");
        assert_eq!(uncoerce_name("U000031abc"), "1abc");
    }

    #[test]
    fn test_clean_names_borrowed() {
        assert!(matches!(coerce_name("data-foo"), Cow::Borrowed(_)));
        assert!(matches!(uncoerce_name("Upper"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_lookalike_tokens_survive() {
        let coerced = coerce_name("aU00003Ab");
        assert_eq!(coerced, "aU00005500003Ab");
        assert_eq!(uncoerce_name(&coerced), "aU00003Ab");
        assert!(has_token_lookalike("aU00003Ab"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("foo:bar").is_ok());
        assert!(validate_name("x-1").is_ok());
        assert_eq!(validate_name("1x"), Err(DomError::InvalidCharacter("1x".into())));
        assert!(validate_name("").is_err());
        assert!(validate_name("a b").is_err());
    }

    #[test]
    fn test_validate_and_extract() {
        let q = validate_and_extract(Some(namespace::SVG), "svg:rect").unwrap();
        assert_eq!(q.prefix.as_deref(), Some("svg"));
        assert_eq!(q.local_name, "rect");

        assert_eq!(
            validate_and_extract(Some(""), "a:b").map_err(|e| e.name()),
            Err("NamespaceError")
        );
        assert!(validate_and_extract(Some(namespace::HTML), "xml:lang").is_err());
        assert!(validate_and_extract(Some(namespace::XML), "xml:lang").is_ok());
        assert!(validate_and_extract(Some(namespace::HTML), "xmlns").is_err());
        assert!(validate_and_extract(Some(namespace::XMLNS), "xmlns:x").is_ok());
        assert!(validate_and_extract(Some(namespace::XMLNS), "foo").is_err());
        assert_eq!(
            validate_and_extract(None, "a:b:c").map_err(|e| e.name()),
            Err("InvalidCharacterError")
        );
        assert_eq!(validate_and_extract(Some(""), "p").unwrap().namespace, None);
    }

    proptest! {
        #[test]
        fn prop_round_trip(name in "\\PC{1,24}") {
            let coerced = coerce_name(&name);
            prop_assert!(veneer_native::name::is_ncname(&coerced));
            prop_assert_eq!(uncoerce_name(&coerced), name.as_str());
        }

        #[test]
        fn prop_accepted_names_unchanged(name in "[a-z_][a-z0-9._-]{0,16}") {
            prop_assert_eq!(coerce_name(&name), name.as_str());
        }

        #[test]
        fn prop_offending_characters_anywhere(
            head in "[a-z]{0,4}",
            bad in proptest::collection::vec(prop_oneof![Just(':'), Just(' '), Just('<'), Just('"'), Just('\u{2028}')], 1..4),
            tail in "[a-z]{0,4}",
        ) {
            let name: String = head.chars().chain(bad).chain(tail.chars()).collect();
            let coerced = coerce_name(&name);
            prop_assert_ne!(coerced.as_ref(), name.as_str());
            prop_assert_eq!(uncoerce_name(&coerced), name.as_str());
        }
    }
}
