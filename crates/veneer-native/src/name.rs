//! XML name character classes
//!
//! The native tree accepts NCNames only (XML 1.0 fifth edition `Name`
//! without `:`). The `Name` production itself is exposed as well so callers
//! that sit above the tree can validate against the wider grammar.

/// `NameStartChar` minus `:`
pub fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z' | '_'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// `NameChar` minus `:`
pub fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Checks the `NCName` production
pub fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

/// Checks the `Name` production (colons allowed anywhere)
pub fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == ':' || is_name_start_char(first) => {
            chars.all(|c| c == ':' || is_name_char(c))
        }
        _ => false,
    }
}

/// Checks the `QName` production (`NCName` or `NCName:NCName`)
pub fn is_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
        None => is_ncname(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ncname() {
        assert!(is_ncname("div"));
        assert!(is_ncname("_x-1.2"));
        assert!(is_ncname("ünïcode"));
        assert!(!is_ncname(""));
        assert!(!is_ncname("1abc"));
        assert!(!is_ncname("a:b"));
        assert!(!is_ncname("a b"));
    }

    #[test]
    fn test_name_and_qname() {
        assert!(is_name("a:b:c"));
        assert!(is_name(":x"));
        assert!(!is_name("-x"));
        assert!(is_qname("svg:rect"));
        assert!(!is_qname("a:b:c"));
        assert!(!is_qname(":x"));
        assert!(!is_qname("x:"));
    }
}
