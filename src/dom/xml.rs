//! `DocumentTree` over borrowed `roxmltree` documents
//!
//! roxmltree already resolves entities and merges CDATA into text nodes, so
//! every character node reports [`NodeKind::Text`] and decoding is a no-op.

use std::borrow::Cow;

use roxmltree::{Document, NodeId, NodeType};

use super::{DocumentTree, NodeKind};

impl<'input> DocumentTree for Document<'input> {
    type Node = NodeId;

    fn root_node(&self) -> NodeId {
        Document::root(self).id()
    }

    fn node_kind(&self, node: NodeId) -> NodeKind {
        match self.get_node(node).map(|n| n.node_type()) {
            Some(NodeType::Element) => NodeKind::Element,
            Some(NodeType::Text) => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.get_node(node)
            .map(|n| n.children().map(|child| child.id()).collect())
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get_node(node)?.parent().map(|p| p.id())
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.get_node(node)?.prev_sibling().map(|s| s.id())
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.get_node(node)?.next_sibling().map(|s| s.id())
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        let node = self.get_node(node)?;
        node.is_element().then(|| node.tag_name().name())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        let node = self.get_node(node)?;
        match name.split_once(':') {
            Some((prefix, local)) => {
                let uri = node.lookup_namespace_uri(Some(prefix))?;
                node.attribute((uri, local))
            }
            None => node.attribute(name),
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        let node = self.get_node(node)?;
        if node.is_text() {
            node.text()
        } else {
            None
        }
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants()
            .find(|n| n.is_element() && n.attribute("id") == Some(id))
            .map(|n| n.id())
    }

    fn decode_entities<'s>(&self, text: &'s str) -> Cow<'s, str> {
        Cow::Borrowed(text)
    }
}
