//! Compiler errors reported while tokenizing and parsing templates.

use serde::{Deserialize, Serialize};

use crate::ast::SourceLocation;

/// Structural error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    /// A block directive was never closed
    UnclosedBlock = 0,
    /// A closing directive without a matching opener
    UnexpectedCloser = 1,
    /// A second `@else` inside the same `@if`
    DuplicateElse = 2,
    /// `@name(` without the matching `)`
    UnclosedDirectiveArgs = 3,
    /// `{{` or `{!!` without its closing delimiter
    UnclosedInterpolation = 4,
    /// `@foreach` header not of the form `expr as $item` or `expr as $key => $item`
    InvalidForeachHeader = 5,
    /// A directive that needs an argument list was written without one
    MissingDirectiveArgs = 6,
}

impl ErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnclosedBlock => "Block directive is never closed.",
            Self::UnexpectedCloser => "Closing directive has no matching opening directive.",
            Self::DuplicateElse => "Only one @else is allowed per @if.",
            Self::UnclosedDirectiveArgs => "Directive arguments are missing a closing parenthesis.",
            Self::UnclosedInterpolation => "Interpolation is missing its closing delimiter.",
            Self::InvalidForeachHeader => "Expected `@foreach(expr as $item)` or `@foreach(expr as $key => $item)`.",
            Self::MissingDirectiveArgs => "Directive requires an argument list.",
        }
    }
}

/// Error produced by the parser, with the location it refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct CompilerError {
    pub code: ErrorCode,
    pub loc: Option<SourceLocation>,
    pub message: std::string::String,
}

impl CompilerError {
    pub fn new(code: ErrorCode, loc: Option<SourceLocation>) -> Self {
        Self {
            code,
            loc,
            message: code.message().into(),
        }
    }

    /// Create an error whose message names the offending directive.
    pub fn with_detail(code: ErrorCode, loc: Option<SourceLocation>, detail: &str) -> Self {
        Self {
            code,
            loc,
            message: format!("{} ({})", code.message(), detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;

    #[test]
    fn test_error_messages() {
        assert!(!ErrorCode::UnclosedBlock.message().is_empty());
        assert!(!ErrorCode::InvalidForeachHeader.message().is_empty());
    }

    #[test]
    fn test_detail_in_display() {
        let loc = SourceLocation::new(Position::new(0, 1, 1), Position::new(4, 1, 5));
        let err = CompilerError::with_detail(ErrorCode::UnclosedBlock, Some(loc), "@if");
        assert_eq!(err.to_string(), "Block directive is never closed. (@if)");
        assert_eq!(err.loc.map(|l| l.start.line), Some(1));
    }
}
