//! Sibling indexing
//!
//! CFI indices interleave elements and text. Elements take even slots and
//! the odd slots between them stand for text, whether or not a text node is
//! actually present:
//!
//! ```text
//! children:  <a/>  <b/>  "c"      <a/> "x" "y" <b/>
//! index:       2     4    5         2   3   3   4
//! ```
//!
//! An element right after another element (or first) skips the implied
//! empty text slot and consumes two indices; after text it consumes one.
//! Adjacent text and CDATA nodes share a single index, and offsets count
//! across the whole run. The same walk is used for generation and
//! resolution so both directions always agree.

use super::resolver::RelativeToNode;
use super::types::SideBias;
use crate::dom::{DocumentTree, NodeKind};
use crate::error::{CfiError, Result};

/// A child's CFI index and its run-relative offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildIndex {
    pub node_index: u32,
    pub offset: Option<u32>,
}

/// A child located from a CFI index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildAt<N> {
    pub node: N,
    pub offset: Option<u32>,
    pub relative_to_node: Option<RelativeToNode>,
}

/// Character length used for offsets
pub(crate) fn text_len<T: DocumentTree>(tree: &T, node: T::Node) -> u32 {
    tree.text(node).map(|t| t.chars().count() as u32).unwrap_or(0)
}

/// Whether an element passes its offset through untouched
pub(crate) fn keeps_offset<T: DocumentTree>(tree: &T, node: T::Node) -> bool {
    tree.has_tag(node, "img")
}

/// Compute the CFI index of `target` among `children`.
///
/// For text and CDATA targets the returned offset includes the length of
/// every preceding node in the same text run.
pub fn index_of_child<T: DocumentTree>(
    tree: &T,
    children: &[T::Node],
    target: T::Node,
    offset: Option<u32>,
) -> Result<ChildIndex> {
    let mut index = 0u32;
    let mut prev_text = false;
    let mut run_len = 0u32;

    for &child in children {
        let kind = tree.node_kind(child);
        match kind {
            NodeKind::Element => {
                index += if prev_text { 1 } else { 2 };
                prev_text = false;
                run_len = 0;
            }
            NodeKind::Text | NodeKind::CData => {
                if !prev_text {
                    index += 1;
                    run_len = 0;
                }
            }
            NodeKind::Other => continue,
        }

        if child == target {
            let offset = match kind {
                NodeKind::Element if keeps_offset(tree, child) => offset,
                NodeKind::Element => None,
                _ => match (offset, run_len) {
                    (None, 0) => None,
                    (offset, preceding) => Some(preceding + offset.unwrap_or(0)),
                },
            };
            return Ok(ChildIndex {
                node_index: index,
                offset,
            });
        }

        if kind.is_text_like() {
            run_len += text_len(tree, child);
            prev_text = true;
        }
    }

    Err(CfiError::ResolutionFailure(format!(
        "node {:?} not found among its parent's children",
        target
    )))
}

/// Find the child addressed by `node_index` under `parent`.
///
/// Index 0 yields a before-first sentinel and indices past the last slot an
/// after-last sentinel. An odd index falling on the implied empty text
/// between two elements resolves to "before" the following element.
pub fn child_at_index<T: DocumentTree>(
    tree: &T,
    parent: T::Node,
    node_index: u32,
    offset: Option<u32>,
    bias: Option<SideBias>,
) -> ChildAt<T::Node> {
    let children = tree.children(parent);
    let addressable = |&&n: &&T::Node| tree.node_kind(n) != NodeKind::Other;

    if node_index == 0 {
        return ChildAt {
            node: children.iter().find(addressable).copied().unwrap_or(parent),
            offset: None,
            relative_to_node: Some(RelativeToNode::Before),
        };
    }

    let mut index = 0u32;
    let mut prev_text = false;

    for (i, &child) in children.iter().enumerate() {
        match tree.node_kind(child) {
            NodeKind::Element => {
                index += if prev_text { 1 } else { 2 };
                prev_text = false;
                if index == node_index {
                    let offset = if keeps_offset(tree, child) { offset } else { None };
                    return ChildAt {
                        node: child,
                        offset,
                        relative_to_node: None,
                    };
                }
                if index > node_index {
                    return ChildAt {
                        node: child,
                        offset: None,
                        relative_to_node: Some(RelativeToNode::Before),
                    };
                }
            }
            NodeKind::Text | NodeKind::CData => {
                if prev_text {
                    continue;
                }
                index += 1;
                prev_text = true;
                if index == node_index {
                    let run = text_run(tree, &children[i..]);
                    let (node, offset) = match offset {
                        Some(offset) => locate_in_run(tree, &run, offset, bias)
                            .map(|(node, local)| (node, Some(local)))
                            .unwrap_or((child, Some(offset))),
                        None => (child, None),
                    };
                    return ChildAt {
                        node,
                        offset,
                        relative_to_node: None,
                    };
                }
            }
            NodeKind::Other => {}
        }
    }

    ChildAt {
        node: children.iter().rev().find(addressable).copied().unwrap_or(parent),
        offset: None,
        relative_to_node: Some(RelativeToNode::After),
    }
}

/// The contiguous text/CDATA nodes at the start of `siblings`.
/// Non-addressable nodes (comments) do not break a run.
pub(crate) fn text_run<T: DocumentTree>(tree: &T, siblings: &[T::Node]) -> Vec<T::Node> {
    siblings
        .iter()
        .copied()
        .filter(|&n| tree.node_kind(n) != NodeKind::Other)
        .take_while(|&n| tree.is_text_like(n))
        .collect()
}

/// Map a run-relative offset onto one node of the run.
///
/// An offset equal to a node's length sits on the boundary with the next
/// node; it stays in the earlier node only with a `before` bias or when no
/// node follows. Returns `None` when the offset lies past the end of the run.
pub(crate) fn locate_in_run<T: DocumentTree>(
    tree: &T,
    run: &[T::Node],
    offset: u32,
    bias: Option<SideBias>,
) -> Option<(T::Node, u32)> {
    let mut remaining = offset;
    for (i, &node) in run.iter().enumerate() {
        let len = text_len(tree, node);
        let is_last = i + 1 == run.len();
        if remaining < len || (remaining == len && (is_last || bias == Some(SideBias::Before))) {
            return Some((node, remaining));
        }
        remaining -= len;
    }
    None
}
