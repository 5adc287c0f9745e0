//! Carton - The artist's toolbox for Stencil.
//!
//! This crate holds the small shared utilities every other Stencil crate
//! reaches for, much like a carton (artist's portfolio case) holds the
//! essential tools an artist needs before starting work.
//!
//! # Modules
//!
//! - **hash**: content hashing for the template cache
//! - **escape**: HTML escaping for `{!! !!}` output and generated markup
//!
//! # Example
//!
//! ```
//! use stencil_carton::{escape_html, FxHashMap, String};
//!
//! let mut views: FxHashMap<String, &str> = FxHashMap::default();
//! views.insert(String::from("welcome"), "<b>hi</b>");
//! assert_eq!(escape_html(views["welcome"]), "&lt;b&gt;hi&lt;/b&gt;");
//! ```

pub mod escape;
pub mod hash;

// Re-export compact_str::CompactString for convenience
pub use compact_str::CompactString;
pub use compact_str::CompactString as String;

// Re-export smallvec for stack-optimized collections
pub use smallvec::SmallVec;

// Re-export rustc-hash for fast hash maps/sets
pub use rustc_hash::FxHashMap;

pub use escape::escape_html;
pub use hash::hash_str;
