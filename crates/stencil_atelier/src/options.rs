//! Render options.

use stencil_relief::ParserOptions;

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Render options
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Treat template syntax errors as fatal
    pub strict: bool,
    /// Maximum nesting of includes and layouts
    pub max_depth: usize,
    /// Interpolation delimiters
    pub parser: ParserOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_depth: DEFAULT_MAX_DEPTH,
            parser: ParserOptions::default(),
        }
    }
}

impl RenderOptions {
    /// Options that reject templates with syntax errors instead of logging
    /// them and rendering what was recovered.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_lenient() {
        assert!(!RenderOptions::default().strict);
        assert!(RenderOptions::strict().strict);
        assert_eq!(RenderOptions::strict().max_depth, DEFAULT_MAX_DEPTH);
    }
}
