//! CFI (Canonical Fragment Identifier) module for EPUB
//!
//! This module provides parsing, resolution, generation, and comparison of
//! EPUB CFI strings.
//!
//! # Overview
//!
//! EPUB CFI is a standardized way to reference specific locations within EPUB publications.
//! It uses a path-based syntax similar to XPath but designed specifically for EPUBs.
//!
//! # Example CFI
//!
//! ```text
//! epubcfi(/6/4[chap01ref]!/4[body01]/10[para05]/3:10)
//!         │  │           │ │         │          │ └── character offset 10
//!         │  │           │ │         │          └──── text position (odd = text)
//!         │  │           │ │         └─────────────── element with ID assertion
//!         │  │           │ └───────────────────────── body
//!         │  │           └─────────────────────────── document hop (into content doc)
//!         │  └─────────────────────────────────────── spine itemref with ID
//!         └────────────────────────────────────────── spine element
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use epubcfi::cfi::{Cfi, ResolveOptions, Resolved};
//! use epubcfi::dom::Tree;
//!
//! let chapter = Tree::parse(xhtml)?;
//! let cfi = Cfi::parse("epubcfi(/6/4!/4/2/1:42)")?;
//!
//! // Resolve the last Part against an already loaded chapter
//! if let Resolved::Location(loc) = cfi.resolve_last(&chapter, &ResolveOptions::default())? {
//!     println!("{:?} at {:?}", loc.node, loc.offset);
//! }
//!
//! // Compare CFIs
//! let a = Cfi::parse("epubcfi(/6/4!/4/2/1:10)")?;
//! let b = Cfi::parse("epubcfi(/6/4!/4/2/1:20)")?;
//! assert!(a.compare(&b).is_lt());
//! ```

mod assertion;
mod comparator;
mod escape;
mod fetch;
mod generator;
mod parser;
mod resolver;
mod sibling;
mod types;
mod uri;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dom::DocumentTree;
use crate::error::{CfiError, Result};

// Re-export main types
pub use types::{
    ParsedCfi, Part, Path, Range, SideBias, Spatial, Step, TextLocationAssertion,
};

// Re-export parser functions
pub use parser::{parse, parse_with, ParseOptions};

pub use escape::{escape, is_reserved, ESCAPE_CHAR, RESERVED};

pub use sibling::{child_at_index, index_of_child, ChildAt, ChildIndex};

pub use resolver::{
    resolve_last, resolve_node, resolve_part, to_node_range, RelativeToNode, ResolveOptions,
    Resolved, ResolvedLocation,
};

pub use assertion::correct_offset;

// Re-export comparator functions
pub use comparator::{
    compare, compare_parts, compare_path, compare_strings, is_after, is_before, is_in_range, sort,
};

// Re-export generator
pub use generator::{generate, generate_chain, generate_part, generate_range, generate_steps, GenerateTarget};

pub use uri::resolve_uri;

pub use fetch::{load_last_document, resolve, DocumentFetcher};

/// A parsed CFI together with the options it was parsed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cfi {
    parsed: ParsedCfi,
    #[serde(skip)]
    options: ParseOptions,
}

impl Cfi {
    /// Wrap an already parsed (or deserialized) CFI
    pub fn new(parsed: ParsedCfi) -> Self {
        Self {
            parsed,
            options: ParseOptions::default(),
        }
    }

    /// Parse with default options (stricter, ranges kept)
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_with(input, ParseOptions::default())
    }

    pub fn parse_with(input: &str, options: ParseOptions) -> Result<Self> {
        let parsed = parse_with(input, options)?;
        Ok(Self { parsed, options })
    }

    /// An owned copy of the parsed form
    pub fn get(&self) -> ParsedCfi {
        self.parsed.clone()
    }

    pub fn parsed(&self) -> &ParsedCfi {
        &self.parsed
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    pub fn is_range(&self) -> bool {
        matches!(self.parsed, ParsedCfi::Range(_))
    }

    /// The full start location (the location itself for non-ranges)
    pub fn from(&self) -> Path {
        match self.parsed {
            ParsedCfi::Location(ref path) => path.clone(),
            ParsedCfi::Range(ref range) => range.from_path(),
        }
    }

    /// The full end location (the location itself for non-ranges)
    pub fn to(&self) -> Path {
        match self.parsed {
            ParsedCfi::Location(ref path) => path.clone(),
            ParsedCfi::Range(ref range) => range.to_path(),
        }
    }

    /// Reading-order comparison
    pub fn compare(&self, other: &Cfi) -> Ordering {
        compare(&self.parsed, &other.parsed)
    }

    /// Resolve Part `index` against the document it addresses
    pub fn resolve_part<T: DocumentTree>(
        &self,
        index: usize,
        tree: &T,
        opts: &ResolveOptions,
    ) -> Result<ResolvedLocation<T::Node>> {
        resolve_part(&self.parsed, index, tree, opts)
    }

    /// Resolve the final Part against the last document of the chain
    pub fn resolve_last<T: DocumentTree>(&self, tree: &T, opts: &ResolveOptions) -> Result<Resolved<T::Node>> {
        resolve_last(&self.parsed, tree, opts)
    }

    /// The link followed out of Part `index`
    pub fn resolve_uri<T: DocumentTree>(&self, index: usize, tree: &T, opts: &ResolveOptions) -> Result<String> {
        let location = self.resolve_part(index, tree, opts)?;
        resolve_uri(tree, location.node)
    }

    /// Follow every document hop starting from `start`
    pub async fn load_last_document<F: DocumentFetcher>(
        &self,
        start: F::Document,
        fetcher: Option<&F>,
        opts: &ResolveOptions,
    ) -> Result<F::Document> {
        fetch::load_last_document(&self.parsed, start, fetcher, opts).await
    }

    /// Follow every document hop, then resolve in the last document
    pub async fn resolve<F: DocumentFetcher>(
        &self,
        start: F::Document,
        fetcher: Option<&F>,
        opts: &ResolveOptions,
    ) -> Result<(F::Document, Resolved<<F::Document as DocumentTree>::Node>)> {
        fetch::resolve(&self.parsed, start, fetcher, opts).await
    }
}

impl FromStr for Cfi {
    type Err = CfiError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parsed)
    }
}
