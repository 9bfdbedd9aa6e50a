//! veneer HTML load path
//!
//! Turns bytes or text into a [`veneer_dom::Document`] using html5ever's
//! tree builder. Encoding is sniffed from the byte order mark, a declared
//! label or a `<meta charset>` prescan.

pub mod encoding;
mod error;
mod options;
mod parser;

pub use encoding::{Confidence, Encoding};
pub use error::{ParseError, ParseResult};
pub use options::ParseOptions;
pub use parser::{HtmlParser, Parsed};

use veneer_dom::Document;

/// Parse an HTML string with default options
pub fn parse(html: &str) -> ParseResult<Document> {
    HtmlParser::new().parse(html)
}

/// Parse HTML bytes with default options
pub fn parse_bytes(bytes: &[u8]) -> ParseResult<Parsed> {
    HtmlParser::new().parse_bytes(bytes)
}
