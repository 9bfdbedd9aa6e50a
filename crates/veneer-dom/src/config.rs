//! Serializer configuration

/// Output options, set document-wide with
/// [`Document::set_serializer_config`](crate::Document::set_serializer_config)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerConfig {
    /// Put block-level elements on their own indented lines
    pub pretty_print: bool,
    /// Indentation unit used when pretty printing
    pub indent: String,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            pretty_print: false,
            indent: "  ".to_string(),
        }
    }
}

impl SerializerConfig {
    /// Pretty printing with the default indent
    pub fn pretty() -> Self {
        Self {
            pretty_print: true,
            ..Self::default()
        }
    }
}
