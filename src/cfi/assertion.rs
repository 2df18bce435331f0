//! Text location assertion correction
//!
//! A CFI may carry the text expected around its offset. When the document
//! changed after the CFI was created, the offset is moved to the nearest
//! place where that text still occurs. Correction is best effort: on any
//! inconsistency the original location is kept.

use regex::Regex;

use super::sibling::text_run;
use super::types::{SideBias, TextLocationAssertion};
use crate::dom::{DocumentTree, NodeKind};

/// The decoded content of a contiguous run of text nodes.
///
/// Lengths and offsets are in stored characters, the coordinates CFIs use.
/// `positions` maps each decoded character of `text` back to its stored
/// run offset, with one trailing entry for the end of the run.
struct MergedRun<N> {
    nodes: Vec<N>,
    lengths: Vec<usize>,
    text: String,
    positions: Vec<usize>,
}

impl<N: Copy + PartialEq> MergedRun<N> {
    fn collect<T: DocumentTree<Node = N>>(tree: &T, node: N) -> Option<Self> {
        let parent = tree.parent(node)?;
        let siblings = tree.children(parent);
        let mut start = siblings.iter().position(|&n| n == node)?;
        while start > 0 {
            let prev = siblings[start - 1];
            match tree.node_kind(prev) {
                NodeKind::Text | NodeKind::CData | NodeKind::Other => start -= 1,
                NodeKind::Element => break,
            }
        }

        let nodes = text_run(tree, &siblings[start..]);
        let mut lengths = Vec::with_capacity(nodes.len());
        let mut text = String::new();
        let mut positions = Vec::new();
        let mut base = 0;
        for &n in &nodes {
            let stored = tree.text(n).unwrap_or_default();
            let len = decode_mapped(tree, stored, base, &mut text, &mut positions);
            lengths.push(len);
            base += len;
        }
        positions.push(base);
        Some(Self {
            nodes,
            lengths,
            text,
            positions,
        })
    }

    /// Run-relative offset of a node-local offset
    fn merged_offset(&self, node: N, local: usize) -> Option<usize> {
        let i = self.nodes.iter().position(|&n| n == node)?;
        Some(self.lengths[..i].iter().sum::<usize>() + local)
    }

    /// Stored run offset of a decoded character position
    fn stored_offset(&self, decoded: usize) -> Option<usize> {
        self.positions.get(decoded).copied()
    }

    /// Node-local position of a run-relative offset
    fn split_offset(&self, merged: usize, bias: Option<SideBias>) -> Option<(N, usize)> {
        let mut remaining = merged;
        for (i, (&node, &len)) in self.nodes.iter().zip(&self.lengths).enumerate() {
            let is_last = i + 1 == self.nodes.len();
            if remaining < len || (remaining == len && (is_last || bias == Some(SideBias::Before))) {
                return Some((node, remaining));
            }
            remaining = remaining.checked_sub(len)?;
        }
        None
    }
}

/// Longest entity reference considered, `&` and `;` included
const MAX_ENTITY_LEN: usize = 32;

/// Decode `stored` into `text`, recording the stored offset of every decoded
/// character. Returns the stored length in characters.
fn decode_mapped<T: DocumentTree>(
    tree: &T,
    stored: &str,
    base: usize,
    text: &mut String,
    positions: &mut Vec<usize>,
) -> usize {
    let mut at = base;
    let mut rest = stored;
    while let Some(ch) = rest.chars().next() {
        if ch == '&' {
            if let Some(end) = rest.find(';').filter(|&end| end < MAX_ENTITY_LEN) {
                let reference = &rest[..=end];
                let decoded = tree.decode_entities(reference);
                if decoded != reference {
                    for c in decoded.chars() {
                        text.push(c);
                        positions.push(at);
                    }
                    at += reference.chars().count();
                    rest = &rest[end + 1..];
                    continue;
                }
            }
        }
        text.push(ch);
        positions.push(at);
        at += 1;
        rest = &rest[ch.len_utf8()..];
    }
    at - base
}

/// Pattern for an assertion and the number of characters before the
/// addressed position within a match
fn assertion_pattern(assertion: &TextLocationAssertion) -> Option<(Regex, usize)> {
    let (pattern, lead) = match assertion {
        TextLocationAssertion::Plain(text) => (regex::escape(text), 0),
        TextLocationAssertion::Context { pre, post } => (
            format!(
                "(?s){}.{}",
                regex::escape(pre),
                regex::escape(post.as_deref().unwrap_or_default())
            ),
            pre.chars().count(),
        ),
    };
    Regex::new(&pattern).ok().map(|re| (re, lead))
}

/// Character positions of every match, adjusted to the addressed character
fn match_positions(text: &str, re: &Regex, lead: usize) -> Vec<usize> {
    re.find_iter(text)
        .map(|m| text[..m.start()].chars().count() + lead)
        .collect()
}

/// The candidate closest to `target`; the first one wins ties
fn closest(candidates: &[usize], target: usize) -> Option<usize> {
    let mut best: Option<usize> = None;
    for &candidate in candidates {
        let better = match best {
            Some(current) => candidate.abs_diff(target) < current.abs_diff(target),
            None => true,
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Move `(node, offset)` to the assertion match nearest the original offset.
///
/// Returns the input unchanged when the node is not text, no match exists,
/// or the corrected offset cannot be mapped back onto the text run.
pub fn correct_offset<T: DocumentTree>(
    tree: &T,
    node: T::Node,
    offset: u32,
    assertion: &TextLocationAssertion,
    bias: Option<SideBias>,
) -> (T::Node, u32) {
    let unchanged = (node, offset);
    if !tree.is_text_like(node) {
        return unchanged;
    }

    let Some(run) = MergedRun::collect(tree, node) else {
        return unchanged;
    };
    let Some(original) = run.merged_offset(node, offset as usize) else {
        return unchanged;
    };
    let Some((re, lead)) = assertion_pattern(assertion) else {
        return unchanged;
    };

    let candidates: Vec<usize> = match_positions(&run.text, &re, lead)
        .into_iter()
        .filter_map(|decoded| run.stored_offset(decoded))
        .collect();
    let Some(best) = closest(&candidates, original) else {
        tracing::debug!(offset, "Text assertion not found, keeping offset");
        return unchanged;
    };

    match run.split_offset(best, bias) {
        Some((corrected, local)) => {
            if best != original {
                tracing::debug!(from = original, to = best, "Corrected offset from text assertion");
            }
            (corrected, local as u32)
        }
        None => {
            tracing::debug!(offset = best, "Corrected offset outside text run, keeping original");
            unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{RawText, Tree};

    fn context(pre: &str, post: &str) -> TextLocationAssertion {
        TextLocationAssertion::Context {
            pre: pre.to_string(),
            post: Some(post.to_string()),
        }
    }

    fn paragraph(texts: &[&str]) -> (Tree, Vec<crate::dom::NodeId>) {
        let mut tree = Tree::new();
        let root = tree.root_node();
        let p = tree.append_element(root, "p", &[]);
        let nodes = texts.iter().map(|t| tree.append_text(p, t)).collect();
        (tree, nodes)
    }

    #[test]
    fn test_closest_prefers_first_on_tie() {
        assert_eq!(closest(&[2, 8], 5), Some(2));
        assert_eq!(closest(&[2, 7], 5), Some(7));
        assert_eq!(closest(&[], 5), None);
    }

    #[test]
    fn test_correct_shifted_text() {
        // "abc" was inserted before the asserted text
        let (tree, nodes) = paragraph(&["abcyes sir, indeed"]);
        let (node, offset) = correct_offset(&tree, nodes[0], 4, &context("yes", "sir"), None);
        assert_eq!(node, nodes[0]);
        assert_eq!(offset, 6);
    }

    #[test]
    fn test_correct_picks_nearest_match() {
        let (tree, nodes) = paragraph(&["ab.cd ab.cd ab.cd"]);
        let (_, offset) = correct_offset(&tree, nodes[0], 13, &context("ab", "cd"), None);
        assert_eq!(offset, 14);
    }

    #[test]
    fn test_correct_across_text_nodes() {
        let (tree, nodes) = paragraph(&["hello ", "wonderful ", "world"]);
        let assertion = TextLocationAssertion::Plain("world".to_string());
        let (node, offset) = correct_offset(&tree, nodes[0], 2, &assertion, None);
        assert_eq!(node, nodes[2]);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_no_match_keeps_original() {
        let (tree, nodes) = paragraph(&["nothing here"]);
        let assertion = TextLocationAssertion::Plain("absent".to_string());
        assert_eq!(correct_offset(&tree, nodes[0], 3, &assertion, None), (nodes[0], 3));
    }

    #[test]
    fn test_boundary_respects_bias() {
        let (tree, nodes) = paragraph(&["abc", "def"]);
        let assertion = TextLocationAssertion::Plain("def".to_string());
        assert_eq!(correct_offset(&tree, nodes[0], 0, &assertion, None), (nodes[1], 0));
        assert_eq!(
            correct_offset(&tree, nodes[0], 0, &assertion, Some(SideBias::Before)),
            (nodes[0], 3)
        );
    }

    #[test]
    fn test_parsed_entities_keep_stored_offsets() {
        let tree = Tree::parse("<html><body><p>a &amp;lt; b XY</p></body></html>").unwrap();
        let p = tree.find_by_tag("p").unwrap();
        let text = tree.children(p)[0];
        let assertion = TextLocationAssertion::Plain("XY".to_string());
        assert_eq!(correct_offset(&tree, text, 9, &assertion, None), (text, 9));
        assert_eq!(correct_offset(&tree, text, 2, &assertion, None), (text, 9));
    }

    #[test]
    fn test_raw_entities_map_back_to_stored_offsets() {
        let mut raw = Tree::new();
        let root = raw.root_node();
        let p = raw.append_element(root, "p", &[]);
        let text = raw.append_text(p, "fish &amp; chips &amp; peas");
        let tree = RawText(raw);

        let assertion = TextLocationAssertion::Plain("peas".to_string());
        assert_eq!(correct_offset(&tree, text, 0, &assertion, None), (text, 23));
        let (_, offset) = correct_offset(&tree, text, 0, &context("fish", "&"), None);
        assert_eq!(offset, 4);
    }

    #[test]
    fn test_run_continues_across_comment() {
        let mut tree = Tree::new();
        let root = tree.root_node();
        let p = tree.append_element(root, "p", &[]);
        let hello = tree.append_text(p, "hello ");
        tree.append_comment(p);
        let world = tree.append_text(p, "world");

        let assertion = TextLocationAssertion::Plain("world".to_string());
        assert_eq!(correct_offset(&tree, hello, 1, &assertion, None), (world, 0));
        let assertion = TextLocationAssertion::Plain("llo".to_string());
        assert_eq!(correct_offset(&tree, world, 3, &assertion, None), (hello, 2));
    }
}
