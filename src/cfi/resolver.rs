//! CFI resolution
//!
//! Walks the steps of one Part against a document tree and produces a
//! [`ResolvedLocation`] holding a handle into that tree.

use serde::{Deserialize, Serialize};

use super::assertion::correct_offset;
use super::sibling::{child_at_index, keeps_offset};
use super::types::{ParsedCfi, Part, Path, SideBias, Spatial, Step, TextLocationAssertion};
use crate::dom::{Boundary, DocumentTree, NodeRange};
use crate::error::{CfiError, Result};

/// Resolve-time options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Disable the ID shortcut and descend purely by index
    pub ignore_ids: bool,
    /// Resolve ranges into a [`NodeRange`] instead of two locations
    pub range: bool,
}

/// Position of a virtual sentinel relative to its anchor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeToNode {
    Before,
    After,
}

/// A concrete location inside a tree
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation<N> {
    pub node: N,
    pub offset: Option<u32>,
    /// Set when the location is a sentinel before/after `node`
    pub relative_to_node: Option<RelativeToNode>,
    pub text_location_assertion: Option<TextLocationAssertion>,
    pub side_bias: Option<SideBias>,
    pub temporal: Option<f64>,
    pub spatial: Option<Spatial>,
}

impl<N: Copy> ResolvedLocation<N> {
    fn new(node: N, offset: Option<u32>) -> Self {
        Self {
            node,
            offset,
            relative_to_node: None,
            text_location_assertion: None,
            side_bias: None,
            temporal: None,
            spatial: None,
        }
    }

    /// Copy the terminal fields of `step` onto this location
    fn carry(mut self, step: &Step) -> Self {
        self.text_location_assertion = step.text_location_assertion.clone();
        self.side_bias = step.side_bias;
        self.temporal = step.temporal;
        self.spatial = step.spatial;
        self
    }

    /// The range boundary denoted by this location
    pub fn boundary(&self) -> Boundary<N> {
        match (self.relative_to_node, self.offset) {
            (Some(RelativeToNode::Before), _) => Boundary::Before(self.node),
            (Some(RelativeToNode::After), _) => Boundary::After(self.node),
            (None, Some(offset)) => Boundary::At(self.node, offset as usize),
            (None, None) => match self.side_bias {
                Some(SideBias::After) => Boundary::After(self.node),
                _ => Boundary::Before(self.node),
            },
        }
    }
}

/// Result of resolving the final Part of a CFI
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<N> {
    Location(ResolvedLocation<N>),
    Range {
        from: ResolvedLocation<N>,
        to: ResolvedLocation<N>,
    },
    NativeRange(NodeRange<N>),
}

impl<N: Copy> Resolved<N> {
    /// The single location, or the start of a range
    pub fn start_node(&self) -> Option<N> {
        match self {
            Resolved::Location(loc) => Some(loc.node),
            Resolved::Range { from, .. } => Some(from.node),
            Resolved::NativeRange(range) => range.start().map(|b| b.node()),
        }
    }
}

/// Element where resolution of a Part begins
pub(crate) fn start_node<T: DocumentTree>(tree: &T, part_index: usize) -> Result<T::Node> {
    let document_element = tree.document_element().ok_or_else(|| {
        CfiError::ResolutionFailure("document has no element child".to_string())
    })?;
    if part_index == 0 && !tree.has_tag(document_element, "package") {
        if let Some(package) = find_descendant(tree, document_element, "package") {
            return Ok(package);
        }
    }
    Ok(document_element)
}

fn find_descendant<T: DocumentTree>(tree: &T, node: T::Node, name: &str) -> Option<T::Node> {
    for child in tree.children(node) {
        if tree.has_tag(child, name) {
            return Some(child);
        }
        if let Some(found) = find_descendant(tree, child, name) {
            return Some(found);
        }
    }
    None
}

/// Resolve the steps of one Part against `tree`.
///
/// `part_index` selects the starting element: the `package` element for the
/// first Part when present, the document element otherwise.
pub fn resolve_node<T: DocumentTree>(
    part_index: usize,
    steps: &[Step],
    tree: &T,
    opts: &ResolveOptions,
) -> Result<ResolvedLocation<T::Node>> {
    let last = steps
        .last()
        .ok_or_else(|| CfiError::ResolutionFailure("empty part".to_string()))?;

    let mut current = start_node(tree, part_index)?;
    let mut remaining = steps;

    if !opts.ignore_ids {
        if let Some((i, id)) = steps
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, step)| step.node_id.as_deref().map(|id| (i, id)))
        {
            match tree.element_by_id(id) {
                Some(node) => {
                    tracing::debug!(id = %id, step = i, "Resolving from ID shortcut");
                    current = node;
                    remaining = &steps[i + 1..];
                }
                None => {
                    tracing::debug!(id = %id, "ID not found, resolving by index");
                }
            }
        }
    }

    if remaining.is_empty() {
        // the ID step was the last one
        let offset = if keeps_offset(tree, current) { last.offset } else { None };
        return Ok(ResolvedLocation::new(current, offset).carry(last));
    }

    let mut location = ResolvedLocation::new(current, None);
    for step in remaining {
        let child = child_at_index(tree, current, step.node_index, step.offset, step.side_bias);
        location = ResolvedLocation::new(child.node, child.offset);

        if let Some(relative) = child.relative_to_node {
            tracing::debug!(
                node_index = step.node_index,
                relative = ?relative,
                "Step resolved to a virtual position"
            );
            location.relative_to_node = Some(relative);
            return Ok(location.carry(last));
        }

        if let Some(ref assertion) = step.text_location_assertion {
            if let Some(offset) = location.offset {
                let (node, offset) = correct_offset(tree, location.node, offset, assertion, step.side_bias);
                location.node = node;
                location.offset = Some(offset);
            }
        }

        current = location.node;
    }

    Ok(location.carry(last))
}

/// Build a native range spanning two resolved locations
pub fn to_node_range<T: DocumentTree>(
    tree: &T,
    from: &ResolvedLocation<T::Node>,
    to: &ResolvedLocation<T::Node>,
) -> NodeRange<T::Node> {
    let mut range = tree.create_range();
    range.set_start(from.boundary());
    range.set_end(to.boundary());
    range
}

/// The Parts a CFI walks through; for a range, the shared prefix
pub(crate) fn parts(parsed: &ParsedCfi) -> &[Part] {
    match parsed {
        ParsedCfi::Location(path) => &path.parts,
        ParsedCfi::Range(range) => &range.common_parts.parts,
    }
}

fn last_steps(path: &Path) -> &[Step] {
    path.parts.last().map(|p| p.steps.as_slice()).unwrap_or_default()
}

/// Resolve Part `index` of a CFI against the document it addresses
pub fn resolve_part<T: DocumentTree>(
    parsed: &ParsedCfi,
    index: usize,
    tree: &T,
    opts: &ResolveOptions,
) -> Result<ResolvedLocation<T::Node>> {
    let all = parts(parsed);
    let part = all.get(index).ok_or_else(|| {
        CfiError::ResolutionFailure(format!(
            "part index {} out of bounds ({} parts)",
            index,
            all.len()
        ))
    })?;
    resolve_node(index, &part.steps, tree, opts)
}

/// Resolve the final Part of a CFI against the last document.
///
/// A range yields both endpoints, or a [`NodeRange`] when `opts.range` is set.
pub fn resolve_last<T: DocumentTree>(
    parsed: &ParsedCfi,
    tree: &T,
    opts: &ResolveOptions,
) -> Result<Resolved<T::Node>> {
    let index = parts(parsed)
        .len()
        .checked_sub(1)
        .ok_or_else(|| CfiError::ResolutionFailure("CFI has no parts".to_string()))?;

    match parsed {
        ParsedCfi::Location(_) => resolve_part(parsed, index, tree, opts).map(Resolved::Location),
        ParsedCfi::Range(range) => {
            let from = resolve_node(index, last_steps(&range.from_path()), tree, opts)?;
            let to = resolve_node(index, last_steps(&range.to_path()), tree, opts)?;
            if opts.range {
                Ok(Resolved::NativeRange(to_node_range(tree, &from, &to)))
            } else {
                Ok(Resolved::Range { from, to })
            }
        }
    }
}
