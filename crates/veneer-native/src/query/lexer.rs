//! Path-query tokenizer

use super::QueryError;
use crate::name::{is_name_char, is_name_start_char};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Dot,
    DotDot,
    ColonColon,
    Pipe,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// `*` in operator position
    Multiply,
    And,
    Or,
    Div,
    Mod,
    /// `*` as a name test
    Star,
    /// `prefix:*`
    PrefixStar(String),
    Name(String),
    Literal(String),
    Number(f64),
}

impl Token {
    /// Whether a following `*` or operator-like name is an operator
    fn ends_operand(&self) -> bool {
        !matches!(
            self,
            Token::At
                | Token::ColonColon
                | Token::LParen
                | Token::LBracket
                | Token::Comma
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
                | Token::Multiply
                | Token::And
                | Token::Or
                | Token::Div
                | Token::Mod
        )
    }
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, QueryError> {
    let mut tokens: Vec<(usize, Token)> = Vec::new();
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let operator_position = tokens.last().is_some_and(|(_, t)| t.ends_operand());
        let peek = chars.get(i + 1).map(|&(_, c)| c);

        let token = match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '/' if peek == Some('/') => {
                i += 2;
                Token::DoubleSlash
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '@' => {
                i += 1;
                Token::At
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '|' => {
                i += 1;
                Token::Pipe
            }
            '+' => {
                i += 1;
                Token::Plus
            }
            '-' => {
                i += 1;
                Token::Minus
            }
            '=' => {
                i += 1;
                Token::Eq
            }
            '!' if peek == Some('=') => {
                i += 2;
                Token::NotEq
            }
            '<' if peek == Some('=') => {
                i += 2;
                Token::Le
            }
            '<' => {
                i += 1;
                Token::Lt
            }
            '>' if peek == Some('=') => {
                i += 2;
                Token::Ge
            }
            '>' => {
                i += 1;
                Token::Gt
            }
            ':' if peek == Some(':') => {
                i += 2;
                Token::ColonColon
            }
            '*' => {
                i += 1;
                if operator_position { Token::Multiply } else { Token::Star }
            }
            '.' if peek == Some('.') => {
                i += 2;
                Token::DotDot
            }
            '.' if !peek.is_some_and(|c| c.is_ascii_digit()) => {
                i += 1;
                Token::Dot
            }
            '"' | '\'' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].1 != c {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(QueryError::syntax(offset, "unterminated string literal"));
                }
                let literal: String = chars[start..end].iter().map(|&(_, c)| c).collect();
                i = end + 1;
                Token::Literal(literal)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| QueryError::syntax(offset, "malformed number"))?;
                Token::Number(number)
            }
            c if is_name_start_char(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i].1) {
                    i += 1;
                }
                let mut name: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                let colon = chars.get(i).map(|&(_, c)| c) == Some(':');
                let after = chars.get(i + 1).map(|&(_, c)| c);
                if operator_position {
                    match name.as_str() {
                        "and" => Token::And,
                        "or" => Token::Or,
                        "div" => Token::Div,
                        "mod" => Token::Mod,
                        _ => return Err(QueryError::syntax(offset, format!("unexpected name {name:?}"))),
                    }
                } else if colon && after == Some('*') {
                    i += 2;
                    Token::PrefixStar(name)
                } else if colon && after.is_some_and(is_name_start_char) {
                    i += 1;
                    let local_start = i;
                    while i < chars.len() && is_name_char(chars[i].1) {
                        i += 1;
                    }
                    name.push(':');
                    name.extend(chars[local_start..i].iter().map(|&(_, c)| c));
                    Token::Name(name)
                } else {
                    Token::Name(name)
                }
            }
            other => return Err(QueryError::syntax(offset, format!("unexpected character {other:?}"))),
        };
        tokens.push((offset, token));
    }

    Ok(tokens)
}
