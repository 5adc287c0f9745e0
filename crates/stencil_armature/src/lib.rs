//! Armature - The structural parser framework for Stencil templates.
//!
//! ## Name Origin
//!
//! An **armature** is the internal frame a sculptor builds before adding
//! clay. This crate builds that frame for a template: the tokenizer finds the
//! directives and interpolations, the expression parser shapes their
//! arguments, and the template parser joins everything into a nested tree.

pub mod expression;
pub mod parser;
pub mod tokenizer;

pub use expression::{parse_expression, parse_foreach_header, ExprError, ForEachHeader};
pub use parser::{parse, parse_with_options, Parser};
pub use tokenizer::{DirectiveKind, Span, Token, Tokenizer};
