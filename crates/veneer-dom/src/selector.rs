//! Selector to path-query conversion
//!
//! CSS selectors are parsed into a small AST and rewritten as a predicate
//! over the candidate element, so `query_selector_all` becomes
//! `descendant::*[predicate]` against the native query evaluator.
//! Combinators are read right to left: `a > b` is "b whose parent is an a".
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `=`, `~=`, `|=`, `^=`, `$=`, `*=`), the four
//! combinators, selector lists, and the `:first-child`, `:last-child`,
//! `:only-child`, `:empty`, `:root`, `:nth-child()`, `:nth-last-child()`
//! and `:not()` pseudo-classes. Anything else that parses is reported as
//! [`SelectorError::Unsupported`].

use crate::coercion::coerce_name;
use crate::namespace;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("invalid selector at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unsupported selector feature {0}")]
    Unsupported(String),
}

/// Query selecting every matching descendant of the context node
pub fn to_query(selectors: &str) -> Result<String, SelectorError> {
    Ok(format!("descendant::*[{}]", to_predicate(selectors)?))
}

/// Predicate that holds for an element matching `selectors`
pub fn to_predicate(selectors: &str) -> Result<String, SelectorError> {
    let list = Parser::new(selectors).parse_list()?;
    selector_list(&list)
}

// ----------------------------------------------------------------------
// AST
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    /// `None` for `*` or an omitted type selector
    tag: Option<String>,
    simples: Vec<Simple>,
}

#[derive(Debug, Clone, PartialEq)]
enum Simple {
    Id(String),
    Class(String),
    Attribute { name: String, test: Option<(AttrOp, String)> },
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    Root,
    NthChild { a: i64, b: i64, from_end: bool },
    Not(Vec<Complex>),
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

// ----------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

type ParseResult<T> = Result<T, SelectorError>;

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(SelectorError::Syntax {
            offset: self.pos,
            message: message.into(),
        })
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> ParseResult<()> {
        if self.eat(c) {
            Ok(())
        } else {
            self.error(format!("expected {c:?}"))
        }
    }

    /// Skip whitespace; true if any was skipped
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0C')) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> ParseResult<Vec<Complex>> {
        let mut list = Vec::new();
        self.skip_whitespace();
        loop {
            list.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(list),
                Some(',') => {
                    self.pos += 1;
                    self.skip_whitespace();
                }
                Some(other) => return self.error(format!("unexpected {other:?}")),
            }
        }
    }

    /// Selector list inside `:not(...)`
    fn parse_nested_list(&mut self) -> ParseResult<Vec<Complex>> {
        let mut list = Vec::new();
        self.skip_whitespace();
        loop {
            list.push(self.parse_complex()?);
            self.skip_whitespace();
            if self.eat(',') {
                self.skip_whitespace();
                continue;
            }
            self.expect(')')?;
            return Ok(list);
        }
    }

    fn parse_complex(&mut self) -> ParseResult<Complex> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_whitespace = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                Some(',') | Some(')') | None => break,
                Some(_) if had_whitespace => Combinator::Descendant,
                Some(other) => return self.error(format!("unexpected {other:?}")),
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_whitespace();
            }
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> ParseResult<Compound> {
        let start = self.pos;
        let mut compound = Compound::default();

        if self.peek() == Some('|') {
            self.pos += 1;
            self.type_name()?;
            compound.simples.push(Simple::Unsupported("namespace prefix".into()));
        } else if self.eat('*') {
            if self.peek() == Some('|') && self.peek_at(1) != Some('=') {
                self.pos += 1;
                self.type_name()?;
                compound.simples.push(Simple::Unsupported("namespace prefix".into()));
            }
        } else if self.starts_ident() {
            let name = self.ident()?;
            if self.peek() == Some('|') && self.peek_at(1) != Some('=') {
                self.pos += 1;
                self.type_name()?;
                compound.simples.push(Simple::Unsupported("namespace prefix".into()));
            } else {
                compound.tag = Some(name);
            }
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.name()?;
                    compound.simples.push(Simple::Id(id));
                }
                Some('.') => {
                    self.pos += 1;
                    let class = self.ident()?;
                    compound.simples.push(Simple::Class(class));
                }
                Some('[') => {
                    self.pos += 1;
                    let attribute = self.attribute()?;
                    compound.simples.push(attribute);
                }
                Some(':') => {
                    self.pos += 1;
                    let pseudo = self.pseudo()?;
                    compound.simples.push(pseudo);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return self.error("expected a selector");
        }
        Ok(compound)
    }

    /// Type name after a namespace bar
    fn type_name(&mut self) -> ParseResult<()> {
        if self.eat('*') {
            return Ok(());
        }
        self.ident().map(drop)
    }

    fn attribute(&mut self) -> ParseResult<Simple> {
        self.skip_whitespace();
        let mut unsupported = None;
        let mut name = if self.eat('*') {
            self.expect('|')?;
            unsupported = Some("namespace prefix".to_string());
            self.ident()?
        } else if self.eat('|') {
            unsupported = Some("namespace prefix".to_string());
            self.ident()?
        } else {
            self.ident()?
        };
        if self.peek() == Some('|') && self.peek_at(1) != Some('=') {
            self.pos += 1;
            unsupported = Some("namespace prefix".to_string());
            name = self.ident()?;
        }
        self.skip_whitespace();

        if self.eat(']') {
            return Ok(unsupported.map_or(Simple::Attribute { name, test: None }, Simple::Unsupported));
        }

        let op = match self.peek() {
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) if self.peek_at(1) == Some('=') => {
                self.pos += 2;
                match c {
                    '~' => AttrOp::Includes,
                    '|' => AttrOp::DashMatch,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Substring,
                }
            }
            _ => return self.error("expected an attribute operator"),
        };
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                self.string(quote)?
            }
            _ => self.ident()?,
        };
        self.skip_whitespace();
        if self.starts_ident() {
            let flag = self.ident()?;
            match flag.to_ascii_lowercase().as_str() {
                "s" => {}
                "i" => unsupported = Some("case-insensitive attribute matching".to_string()),
                _ => return self.error(format!("unknown attribute flag {flag:?}")),
            }
            self.skip_whitespace();
        }
        self.expect(']')?;
        Ok(unsupported.map_or(
            Simple::Attribute {
                name,
                test: Some((op, value)),
            },
            Simple::Unsupported,
        ))
    }

    fn pseudo(&mut self) -> ParseResult<Simple> {
        if self.eat(':') {
            let name = self.ident()?;
            if self.eat('(') {
                self.skip_arguments()?;
            }
            return Ok(Simple::Unsupported(format!("::{name}")));
        }
        let name = self.ident()?.to_ascii_lowercase();
        if self.eat('(') {
            return match name.as_str() {
                "not" => Ok(Simple::Not(self.parse_nested_list()?)),
                "nth-child" | "nth-last-child" => {
                    let start = self.pos;
                    let argument = self.skip_arguments()?;
                    let Some((a, b)) = parse_nth(&argument) else {
                        self.pos = start;
                        return self.error(format!("malformed an+b argument {argument:?}"));
                    };
                    Ok(Simple::NthChild {
                        a,
                        b,
                        from_end: name == "nth-last-child",
                    })
                }
                _ => {
                    self.skip_arguments()?;
                    Ok(Simple::Unsupported(format!(":{name}()")))
                }
            };
        }
        Ok(match name.as_str() {
            "first-child" => Simple::FirstChild,
            "last-child" => Simple::LastChild,
            "only-child" => Simple::OnlyChild,
            "empty" => Simple::Empty,
            "root" => Simple::Root,
            _ => Simple::Unsupported(format!(":{name}")),
        })
    }

    /// Consume up to the matching `)`, returning what was skipped
    fn skip_arguments(&mut self) -> ParseResult<String> {
        let mut depth = 1;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
                _ => {}
            }
            text.push(c);
        }
        self.error("unterminated parenthesis")
    }

    fn starts_ident(&self) -> bool {
        let name_start = |c: char| c.is_ascii_alphabetic() || c == '_' || !c.is_ascii();
        match self.peek() {
            Some('-') => matches!(self.peek_at(1), Some(c) if name_start(c) || c == '-' || c == '\\'),
            Some('\\') => self.peek_at(1).is_some_and(|c| c != '\n'),
            Some(c) => name_start(c),
            None => false,
        }
    }

    fn ident(&mut self) -> ParseResult<String> {
        if !self.starts_ident() {
            return self.error("expected an identifier");
        }
        self.name()
    }

    /// Run of name characters and escapes
    fn name(&mut self) -> ParseResult<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.escape()?);
            } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii() {
                self.pos += 1;
                out.push(c);
            } else {
                break;
            }
        }
        if out.is_empty() {
            return self.error("expected a name");
        }
        Ok(out)
    }

    /// After a backslash
    fn escape(&mut self) -> ParseResult<char> {
        let Some(c) = self.peek() else {
            return Ok('\u{FFFD}');
        };
        if c == '\n' {
            return self.error("newline cannot be escaped here");
        }
        if !c.is_ascii_hexdigit() {
            self.pos += 1;
            return Ok(c);
        }
        let mut hex = String::new();
        while hex.len() < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            hex.extend(self.peek());
            self.pos += 1;
        }
        if self.peek().is_some_and(|c| matches!(c, ' ' | '\t' | '\n')) {
            self.pos += 1;
        }
        let code = u32::from_str_radix(&hex, 16).unwrap_or(0);
        Ok(match char::from_u32(code) {
            Some('\0') | None => '\u{FFFD}',
            Some(c) => c,
        })
    }

    /// After the opening quote
    fn string(&mut self, quote: char) -> ParseResult<String> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return self.error("unterminated string"),
                Some('\n') => return self.error("newline in string"),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    if self.eat('\n') {
                        continue;
                    }
                    out.push(self.escape()?);
                }
                Some(c) => {
                    self.pos += 1;
                    out.push(c);
                }
            }
        }
    }
}

/// `an+b` microsyntax
fn parse_nth(argument: &str) -> Option<(i64, i64)> {
    let compact: String = argument
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match compact.as_str() {
        "odd" => return Some((2, 1)),
        "even" => return Some((2, 0)),
        _ => {}
    }
    let Some((a, b)) = compact.split_once('n') else {
        return compact.parse().ok().map(|b| (0, b));
    };
    let a = match a {
        "" | "+" => 1,
        "-" => -1,
        digits => digits.parse().ok()?,
    };
    let b = match b {
        "" => 0,
        signed if signed.starts_with('+') || signed.starts_with('-') => signed.parse().ok()?,
        _ => return None,
    };
    Some((a, b))
}

// ----------------------------------------------------------------------
// Conversion
// ----------------------------------------------------------------------

fn selector_list(list: &[Complex]) -> Result<String, SelectorError> {
    let parts = list.iter().map(complex).collect::<Result<Vec<_>, _>>()?;
    Ok(match parts.as_slice() {
        [single] => single.clone(),
        _ => parts.iter().map(|p| format!("({p})")).collect::<Vec<_>>().join(" or "),
    })
}

fn complex(selector: &Complex) -> Result<String, SelectorError> {
    let mut compounds = selector.compounds.iter();
    let Some(first) = compounds.next() else {
        return Ok("false()".to_string());
    };
    let mut predicate = compound(first)?;
    for (combinator, next) in selector.combinators.iter().zip(compounds) {
        let relation = match combinator {
            Combinator::Descendant => format!("ancestor::*[{predicate}]"),
            Combinator::Child => format!("parent::*[{predicate}]"),
            Combinator::NextSibling => format!("preceding-sibling::*[1][{predicate}]"),
            Combinator::SubsequentSibling => format!("preceding-sibling::*[{predicate}]"),
        };
        predicate = format!("({}) and {relation}", compound(next)?);
    }
    Ok(predicate)
}

fn compound(selector: &Compound) -> Result<String, SelectorError> {
    let mut parts = Vec::new();
    if let Some(tag) = &selector.tag {
        parts.push(case_split(tag, |name| format!("local-name()={}", literal(name))));
    }
    for simple in &selector.simples {
        parts.push(match simple {
            Simple::Id(id) => format!("@id={}", literal(id)),
            Simple::Class(class) => format!(
                "contains(concat(' ', normalize-space(@class), ' '), {})",
                literal(&format!(" {class} "))
            ),
            Simple::Attribute { name, test } => case_split(name, |stored| attribute_test(stored, test.as_ref())),
            Simple::FirstChild => "not(preceding-sibling::*)".to_string(),
            Simple::LastChild => "not(following-sibling::*)".to_string(),
            Simple::OnlyChild => "not(preceding-sibling::*) and not(following-sibling::*)".to_string(),
            Simple::Empty => "not(*) and not(text()[string-length(.) > 0])".to_string(),
            Simple::Root => "not(parent::*) and boolean(..)".to_string(),
            Simple::NthChild { a, b, from_end } => {
                let axis = if *from_end { "following-sibling" } else { "preceding-sibling" };
                nth(&format!("(count({axis}::*) + 1)"), *a, *b)
            }
            Simple::Not(list) => {
                if list.iter().any(|c| !c.combinators.is_empty()) {
                    return Err(SelectorError::Unsupported("combinators inside :not()".into()));
                }
                format!("not({})", selector_list(list)?)
            }
            Simple::Unsupported(feature) => return Err(SelectorError::Unsupported(feature.clone())),
        });
    }
    Ok(match parts.len() {
        0 => "true()".to_string(),
        1 => parts.remove(0),
        _ => parts.iter().map(|p| format!("({p})")).collect::<Vec<_>>().join(" and "),
    })
}

/// Names match case-insensitively on HTML elements and exactly elsewhere
fn case_split(name: &str, test: impl Fn(&str) -> String) -> String {
    let lower = name.to_ascii_lowercase();
    if lower == name {
        return test(&coerce_name(name));
    }
    let html = literal(namespace::HTML);
    format!(
        "(namespace-uri()={html} and {}) or (namespace-uri()!={html} and {})",
        test(&coerce_name(&lower)),
        test(&coerce_name(name))
    )
}

fn attribute_test(stored: &str, test: Option<&(AttrOp, String)>) -> String {
    let attr = format!("@{stored}");
    let Some((op, value)) = test else {
        return attr;
    };
    let lit = literal(value);
    match op {
        AttrOp::Equals => format!("{attr}={lit}"),
        AttrOp::Includes if value.is_empty() || value.chars().any(char::is_whitespace) => "false()".to_string(),
        AttrOp::Includes => format!(
            "contains(concat(' ', normalize-space({attr}), ' '), {})",
            literal(&format!(" {value} "))
        ),
        AttrOp::DashMatch => format!("{attr}={lit} or starts-with({attr}, {})", literal(&format!("{value}-"))),
        AttrOp::Prefix | AttrOp::Suffix | AttrOp::Substring if value.is_empty() => "false()".to_string(),
        AttrOp::Prefix => format!("starts-with({attr}, {lit})"),
        AttrOp::Substring => format!("contains({attr}, {lit})"),
        AttrOp::Suffix => format!("substring({attr}, string-length({attr}) - string-length({lit}) + 1) = {lit}"),
    }
}

/// Position `p` satisfies `p = a*n + b` for some n >= 0
fn nth(position: &str, a: i64, b: i64) -> String {
    if a == 0 {
        return format!("{position} = {b}");
    }
    format!("({position} - {b}) mod {a} = 0 and ({position} - {b}) div {a} >= 0")
}

/// Quote a string for the query language, which has no escapes
fn literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax(selector: &str) -> bool {
        matches!(to_predicate(selector), Err(SelectorError::Syntax { .. }))
    }

    fn unsupported(selector: &str) -> bool {
        matches!(to_predicate(selector), Err(SelectorError::Unsupported(_)))
    }

    #[test]
    fn test_simple_selectors() {
        assert_eq!(to_predicate("div").unwrap(), "local-name()='div'");
        assert_eq!(to_predicate("*").unwrap(), "true()");
        assert_eq!(to_predicate("#main").unwrap(), "@id='main'");
        assert_eq!(
            to_query("p.note").unwrap(),
            "descendant::*[(local-name()='p') and (contains(concat(' ', normalize-space(@class), ' '), ' note '))]"
        );
    }

    #[test]
    fn test_combinators_read_right_to_left() {
        assert_eq!(
            to_predicate("ul > li").unwrap(),
            "(local-name()='li') and parent::*[local-name()='ul']"
        );
        assert_eq!(
            to_predicate("h1 + p").unwrap(),
            "(local-name()='p') and preceding-sibling::*[1][local-name()='h1']"
        );
        assert_eq!(
            to_predicate("a b").unwrap(),
            "(local-name()='b') and ancestor::*[local-name()='a']"
        );
    }

    #[test]
    fn test_lists_and_not() {
        assert_eq!(
            to_predicate("a, b").unwrap(),
            "(local-name()='a') or (local-name()='b')"
        );
        assert_eq!(to_predicate(":not(.x)").unwrap(), "not(contains(concat(' ', normalize-space(@class), ' '), ' x '))");
    }

    #[test]
    fn test_mixed_case_names() {
        let predicate = to_predicate("foreignObject").unwrap();
        assert!(predicate.contains("local-name()='foreignobject'"));
        assert!(predicate.contains("local-name()='foreignObject'"));
    }

    #[test]
    fn test_colon_attribute_is_coerced() {
        assert_eq!(to_predicate("[test\\:test]").unwrap(), "@testU00003Atest");
    }

    #[test]
    fn test_literal_quoting() {
        assert_eq!(literal("a"), "'a'");
        assert_eq!(literal("it's"), "\"it's\"");
        assert_eq!(literal("'\""), "concat('', \"'\", '\"')");
    }

    #[test]
    fn test_nth() {
        assert_eq!(parse_nth("odd"), Some((2, 1)));
        assert_eq!(parse_nth("-n + 3"), Some((-1, 3)));
        assert_eq!(parse_nth("4"), Some((0, 4)));
        assert_eq!(parse_nth("2n1"), None);
        assert!(syntax(":nth-child(x)"));
    }

    #[test]
    fn test_errors() {
        assert!(syntax(""));
        assert!(syntax("div >"));
        assert!(syntax("[a=]"));
        assert!(syntax("a,"));
        assert!(syntax("#"));
        assert!(syntax("[a='x"));
        assert!(unsupported("a:hover"));
        assert!(unsupported("p::before"));
        assert!(unsupported("svg|rect"));
        assert!(unsupported("[a=b i]"));
        assert!(unsupported(":not(a b)"));
        assert!(unsupported(":has(> img)"));
    }
}
