//! # Stencil
//!
//! Directive-based HTML templates written in Rust.
//!
//! This crate re-exports all Stencil sub-crates for unified documentation.
//!
//! ## Crates
//!
//! - [`carton`] - Shared collections, hashing and HTML escaping
//! - [`relief`] - Template AST, source locations and compiler errors
//! - [`armature`] - Tokenizer, expression parser and template parser
//! - [`atelier`] - Evaluation, layouts and rendering

/// Shared collections, hashing and HTML escaping.
pub use stencil_carton as carton;

/// Template AST, source locations and compiler errors.
pub use stencil_relief as relief;

/// Tokenizer, expression parser and template parser.
pub use stencil_armature as armature;

/// Evaluation, layouts and rendering.
pub use stencil_atelier as atelier;

pub use stencil_atelier::{Context, RenderError, RenderOptions, Renderer};
