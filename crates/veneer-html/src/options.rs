//! Parser configuration

/// Options for [`HtmlParser`](crate::HtmlParser)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Encoding label supplied by the caller (a transport header, say).
    /// A byte order mark still wins over it.
    pub declared_encoding: Option<String>,
    /// Parse `<noscript>` content as raw text, as a browser with scripting does
    pub scripting_enabled: bool,
    /// Ask html5ever for detailed parse error messages
    pub exact_errors: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            declared_encoding: None,
            scripting_enabled: true,
            exact_errors: false,
        }
    }
}

impl ParseOptions {
    pub fn with_encoding(label: &str) -> Self {
        Self {
            declared_encoding: Some(label.to_string()),
            ..Self::default()
        }
    }
}
