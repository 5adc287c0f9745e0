//! Relief - The sculptured AST surface for Stencil templates.
//!
//! ## Name Origin
//!
//! A **relief** is a sculpture that rises from a flat surface. This crate is
//! the shape a template takes once it is lifted off the page: node and
//! expression trees, source locations, and the errors found while carving them.

pub mod ast;
pub mod errors;
pub mod options;
pub mod value;

pub use ast::*;
pub use errors::{CompilerError, ErrorCode};
pub use options::ParserOptions;
pub use value::{Map, Number, Value};
