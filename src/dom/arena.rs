//! Owned arena tree
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]. Unlike
//! roxmltree documents the tree owns its data, can hold adjacent text and
//! CDATA siblings, and can be edited after a CFI was generated.

use std::borrow::Cow;

use super::{DocumentTree, NodeKind};

/// Index of a node inside a [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    CData(String),
    Other,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An owned, editable document tree
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeEntry>,
}

impl Tree {
    /// An empty tree holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeEntry {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse XML into an owned tree
    pub fn parse(xml: &str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(xml)?;
        let mut tree = Self::new();
        let root = tree.root_node();
        for child in doc.root().children() {
            tree.import(root, child);
        }
        Ok(tree)
    }

    fn import(&mut self, parent: NodeId, node: roxmltree::Node) {
        match node.node_type() {
            roxmltree::NodeType::Element => {
                let attributes = node
                    .attributes()
                    .map(|attr| {
                        let name = match attr.namespace().and_then(|uri| node.lookup_prefix(uri)) {
                            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, attr.name()),
                            _ => attr.name().to_string(),
                        };
                        (name, attr.value().to_string())
                    })
                    .collect();
                let id = self.push(
                    parent,
                    NodeData::Element {
                        name: node.tag_name().name().to_string(),
                        attributes,
                    },
                );
                for child in node.children() {
                    self.import(id, child);
                }
            }
            roxmltree::NodeType::Text => {
                self.push(parent, NodeData::Text(node.text().unwrap_or_default().to_string()));
            }
            _ => {
                self.push(parent, NodeData::Other);
            }
        }
    }

    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append an element under `parent`
    pub fn append_element(&mut self, parent: NodeId, name: &str, attributes: &[(&str, &str)]) -> NodeId {
        let attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.push(
            parent,
            NodeData::Element {
                name: name.to_string(),
                attributes,
            },
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeData::Text(text.to_string()))
    }

    pub fn append_cdata(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeData::CData(text.to_string()))
    }

    pub fn append_comment(&mut self, parent: NodeId) -> NodeId {
        self.push(parent, NodeData::Other)
    }

    /// Replace the content of a text or CDATA node
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        match self.nodes[node.0].data {
            NodeData::Text(ref mut content) | NodeData::CData(ref mut content) => {
                *content = text.to_string();
            }
            _ => {}
        }
    }

    /// Split a text node at character `at`, returning the new right half.
    ///
    /// Returns `None` for non-text nodes or when `at` is past the end.
    pub fn split_text(&mut self, node: NodeId, at: usize) -> Option<NodeId> {
        let (left, right, cdata) = match self.nodes.get(node.0)?.data {
            NodeData::Text(ref content) => split_chars(content, at).map(|(l, r)| (l, r, false))?,
            NodeData::CData(ref content) => split_chars(content, at).map(|(l, r)| (l, r, true))?,
            _ => return None,
        };
        let parent = self.nodes[node.0].parent?;
        self.set_text(node, &left);

        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            data: if cdata { NodeData::CData(right) } else { NodeData::Text(right) },
            parent: Some(parent),
            children: Vec::new(),
        });
        let siblings = &mut self.nodes[parent.0].children;
        let position = siblings.iter().position(|&c| c == node)?;
        siblings.insert(position + 1, id);
        Some(id)
    }

    /// First element with the given local name, in document order
    pub fn find_by_tag(&self, name: &str) -> Option<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .find(|&id| self.tag_name(id) == Some(name))
    }

    fn sibling(&self, node: NodeId, delta: isize) -> Option<NodeId> {
        let parent = self.nodes.get(node.0)?.parent?;
        let siblings = &self.nodes[parent.0].children;
        let position = siblings.iter().position(|&c| c == node)?;
        let target = position.checked_add_signed(delta)?;
        siblings.get(target).copied()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

fn split_chars(content: &str, at: usize) -> Option<(String, String)> {
    let byte = match content.char_indices().nth(at) {
        Some((byte, _)) => byte,
        None if content.chars().count() == at => content.len(),
        None => return None,
    };
    Some((content[..byte].to_string(), content[byte..].to_string()))
}

impl DocumentTree for Tree {
    type Node = NodeId;

    fn root_node(&self) -> NodeId {
        NodeId(0)
    }

    fn node_kind(&self, node: NodeId) -> NodeKind {
        match self.nodes.get(node.0).map(|n| &n.data) {
            Some(NodeData::Element { .. }) => NodeKind::Element,
            Some(NodeData::Text(_)) => NodeKind::Text,
            Some(NodeData::CData(_)) => NodeKind::CData,
            _ => NodeKind::Other,
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling(node, -1)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling(node, 1)
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match self.nodes.get(node.0)?.data {
            NodeData::Element { ref name, .. } => Some(name),
            _ => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.nodes.get(node.0)?.data {
            NodeData::Element { ref attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match self.nodes.get(node.0)?.data {
            NodeData::Text(ref content) | NodeData::CData(ref content) => Some(content),
            _ => None,
        }
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .find(|&node| self.attribute(node, "id") == Some(id))
    }

    /// Text is stored as character content, already decoded by the parser
    fn decode_entities<'s>(&self, text: &'s str) -> Cow<'s, str> {
        Cow::Borrowed(text)
    }
}
