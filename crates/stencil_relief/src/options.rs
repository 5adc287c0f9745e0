//! Parser options.

use stencil_carton::String;

/// Parser options
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Delimiters for raw output (default: `{{`, `}}`)
    pub raw_delimiters: (String, String),
    /// Delimiters for HTML-escaped output (default: `{!!`, `!!}`)
    pub escaped_delimiters: (String, String),
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            raw_delimiters: (String::from("{{"), String::from("}}")),
            escaped_delimiters: (String::from("{!!"), String::from("!!}")),
        }
    }
}
