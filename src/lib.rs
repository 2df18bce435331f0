//! EPUB CFI Library
//!
//! Parses, resolves, generates and orders EPUB Canonical Fragment
//! Identifiers. The `epubcfi` binary in main.rs is a thin command-line
//! front end over these modules.
//!
//! # Modules
//!
//! - `cfi`: CFI parsing, resolution, generation and comparison
//! - `dom`: The document tree abstraction CFIs are resolved against
//! - `config`: Environment-driven options
//! - `error`: Error types

pub mod cfi;
pub mod config;
pub mod dom;
pub mod error;

pub use cfi::{Cfi, ParseOptions, ParsedCfi, ResolveOptions, Resolved, ResolvedLocation};
pub use dom::{DocumentTree, NodeKind, Tree};
pub use error::{CfiError, FetchError, ParseError, Result};
