//! Document tree abstraction
//!
//! CFI resolution and generation never parse markup themselves. They walk a
//! caller-owned tree through [`DocumentTree`], holding only copyable node
//! handles, so resolved locations borrow the tree rather than clone it.
//!
//! Two providers ship with the crate:
//! - [`xml`]: zero-copy trees straight from `roxmltree::Document`
//! - [`arena`]: an owned, editable [`Tree`] suitable for fetched documents

use std::borrow::Cow;
use std::fmt;

pub mod arena;
pub mod xml;

pub use arena::{NodeId, Tree};

/// Node discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    CData,
    /// Document root, comments, processing instructions
    Other,
}

impl NodeKind {
    /// Text and CDATA nodes are addressed identically
    pub fn is_text_like(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::CData)
    }
}

/// A tree of markup nodes addressed through copyable handles
pub trait DocumentTree {
    /// Non-owning node handle
    type Node: Copy + Eq + fmt::Debug;

    /// The document node (parent of the document element)
    fn root_node(&self) -> Self::Node;

    fn node_kind(&self, node: Self::Node) -> NodeKind;

    /// Children in document order
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    fn previous_sibling(&self, node: Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node>;

    /// Local tag name, `None` for non-elements
    fn tag_name(&self, node: Self::Node) -> Option<&str>;

    /// Attribute lookup; prefixed names such as `xlink:href` are supported
    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;

    /// Character content of text and CDATA nodes
    fn text(&self, node: Self::Node) -> Option<&str>;

    /// Find the element carrying `id`
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    /// Decode markup character references (`&amp;` -> `&`)
    fn decode_entities<'s>(&self, text: &'s str) -> Cow<'s, str> {
        html_escape::decode_html_entities(text)
    }

    /// First element child of the document node
    fn document_element(&self) -> Option<Self::Node> {
        self.children(self.root_node())
            .into_iter()
            .find(|&child| self.node_kind(child) == NodeKind::Element)
    }

    fn is_element(&self, node: Self::Node) -> bool {
        self.node_kind(node) == NodeKind::Element
    }

    fn is_text_like(&self, node: Self::Node) -> bool {
        self.node_kind(node).is_text_like()
    }

    /// The `id` attribute of an element
    fn id(&self, node: Self::Node) -> Option<&str> {
        self.attribute(node, "id")
    }

    /// Whether the node is an element with the given local name
    fn has_tag(&self, node: Self::Node, name: &str) -> bool {
        self.tag_name(node) == Some(name)
    }

    /// An empty native range over this tree
    fn create_range(&self) -> NodeRange<Self::Node> {
        NodeRange::new()
    }
}

/// One end of a [`NodeRange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary<N> {
    /// Immediately before the node
    Before(N),
    /// Inside the node at a character offset
    At(N, usize),
    /// Immediately after the node
    After(N),
}

impl<N: Copy> Boundary<N> {
    pub fn node(&self) -> N {
        match *self {
            Boundary::Before(node) | Boundary::At(node, _) | Boundary::After(node) => node,
        }
    }
}

/// A span between two boundaries in one tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRange<N> {
    start: Option<Boundary<N>>,
    end: Option<Boundary<N>>,
}

impl<N: Copy> NodeRange<N> {
    pub fn new() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub fn set_start(&mut self, boundary: Boundary<N>) {
        self.start = Some(boundary);
    }

    pub fn set_end(&mut self, boundary: Boundary<N>) {
        self.end = Some(boundary);
    }

    pub fn start(&self) -> Option<Boundary<N>> {
        self.start
    }

    pub fn end(&self) -> Option<Boundary<N>> {
        self.end
    }

    /// True until both ends have been set
    pub fn is_empty(&self) -> bool {
        self.start.is_none() || self.end.is_none()
    }
}

impl<N: Copy> Default for NodeRange<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Tree`] whose text nodes hold raw markup, decoded on demand
#[cfg(test)]
pub(crate) struct RawText(pub Tree);

#[cfg(test)]
impl DocumentTree for RawText {
    type Node = NodeId;

    fn root_node(&self) -> NodeId {
        self.0.root_node()
    }

    fn node_kind(&self, node: NodeId) -> NodeKind {
        self.0.node_kind(node)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.0.children(node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.0.parent(node)
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.0.previous_sibling(node)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.0.next_sibling(node)
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.0.tag_name(node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.0.attribute(node, name)
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        self.0.text(node)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.0.element_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_starts_empty() {
        let tree = Tree::parse("<html><body><p>hi</p></body></html>").unwrap();
        let mut range = tree.create_range();
        assert!(range.is_empty());

        let body = tree.document_element().unwrap();
        range.set_start(Boundary::Before(body));
        range.set_end(Boundary::At(body, 0));
        assert!(!range.is_empty());
        assert_eq!(range.start().map(|b| b.node()), Some(body));
    }

    #[test]
    fn test_default_entity_decoding() {
        let tree = RawText(Tree::new());
        assert_eq!(tree.decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
    }
}
