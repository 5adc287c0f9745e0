//! Atelier - The rendering workshop for Stencil templates.
//!
//! ## Name Origin
//!
//! An **atelier** is the workshop where a piece is finished. Parsed
//! templates come in from the armature; here their expressions are
//! evaluated, their blocks expanded, includes pulled in and layouts wrapped
//! around them until only output text is left.
//!
//! ## Pipeline
//!
//! - [`Renderer`] loads a view, parses it once and caches the AST
//! - the layout resolver splits sections from the body and walks up the
//!   `@extends` chain
//! - directives render as the AST is walked, calling the [`Evaluator`] for
//!   expressions and conditions

pub mod collaborators;
pub mod condition;
pub mod context;
pub mod errors;
pub mod expression;
pub mod functions;
pub mod layout;
pub mod options;
pub mod render;
pub mod resolver;

pub use collaborators::{
    AssetResolver, CsrfProvider, EmptySession, FileViewLoader, LoadError, MemorySession,
    MemoryViewLoader, NoAssets, NoCsrf, SessionStore, StaticAssetResolver, TokenCsrf, ViewLoader,
    ViewSource,
};
pub use condition::{is_numeric, is_truthy, loose_eq, strict_eq};
pub use context::Context;
pub use errors::RenderError;
pub use expression::{to_output, Evaluator};
pub use functions::{FunctionError, FunctionRegistry, FunctionResult};
pub use options::RenderOptions;
pub use render::Renderer;
pub use resolver::resolve_variable;
