//! CFI Generator
//!
//! Generates CFI strings from document positions. This is the inverse of
//! resolution: every step is computed with the same sibling indexing rule
//! the resolver uses to descend.

use super::sibling::index_of_child;
use super::types::*;
use crate::dom::DocumentTree;
use crate::error::{CfiError, Result};

/// A node in one document of a multi-document chain
#[derive(Debug)]
pub struct GenerateTarget<'a, T: DocumentTree> {
    pub tree: &'a T,
    pub node: T::Node,
    pub offset: Option<u32>,
}

impl<'a, T: DocumentTree> GenerateTarget<'a, T> {
    pub fn new(tree: &'a T, node: T::Node, offset: Option<u32>) -> Self {
        Self { tree, node, offset }
    }
}

/// Compute the steps addressing `node` (and `offset`) in `tree`.
///
/// The walk climbs until the parent is the document element, or stops at
/// a `package` element so that spine references stay package-relative.
pub fn generate_steps<T: DocumentTree>(tree: &T, node: T::Node, offset: Option<u32>) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    let mut current = node;
    let mut offset = offset;

    while let Some(parent) = tree.parent(current) {
        if !tree.is_element(parent) {
            break;
        }

        let children = tree.children(parent);
        let index = index_of_child(tree, &children, current, offset.take())?;

        let mut step = Step::new(index.node_index);
        step.offset = index.offset;
        if tree.is_element(current) {
            step.node_id = tree.id(current).map(str::to_string);
        }
        steps.push(step);

        if tree.has_tag(parent, "package") || tree.document_element() == Some(parent) {
            break;
        }
        current = parent;
    }

    if steps.is_empty() {
        return Err(CfiError::ResolutionFailure(format!(
            "node {:?} has no addressable position",
            node
        )));
    }
    steps.reverse();
    Ok(steps)
}

/// Generate the path segment for one Part, e.g. `/4[body01]/10/3:5`
pub fn generate_part<T: DocumentTree>(tree: &T, node: T::Node, offset: Option<u32>) -> Result<String> {
    Ok(Part::new(generate_steps(tree, node, offset)?).to_string())
}

/// Generate a complete single-document CFI
pub fn generate<T: DocumentTree>(tree: &T, node: T::Node, offset: Option<u32>) -> Result<String> {
    Ok(format!("epubcfi({})", generate_part(tree, node, offset)?))
}

/// Generate a CFI chaining one Part per target, joined by `!`
pub fn generate_chain<T: DocumentTree>(targets: &[GenerateTarget<'_, T>]) -> Result<String> {
    if targets.is_empty() {
        return Err(CfiError::ResolutionFailure("no targets to generate".to_string()));
    }
    let parts = targets
        .iter()
        .map(|t| generate_part(t.tree, t.node, t.offset))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("epubcfi({})", parts.join("!")))
}

/// Generate a simple range CFI between two positions of the same document.
///
/// The shared prefix is the longest run of equal steps, never including
/// the final step of either endpoint.
pub fn generate_range<T: DocumentTree>(
    tree: &T,
    from: (T::Node, Option<u32>),
    to: (T::Node, Option<u32>),
) -> Result<String> {
    let from_steps = generate_steps(tree, from.0, from.1)?;
    let to_steps = generate_steps(tree, to.0, to.1)?;

    let common_len = from_steps
        .iter()
        .zip(to_steps.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(from_steps.len() - 1)
        .min(to_steps.len() - 1);

    if common_len == 0 {
        return Err(CfiError::ResolutionFailure(
            "range endpoints share no common ancestor below the root".to_string(),
        ));
    }

    let range = Range {
        common_parts: Path::new(vec![Part::new(from_steps[..common_len].to_vec())]),
        from_suffix: from_steps[common_len..].to_vec(),
        to_suffix: to_steps[common_len..].to_vec(),
    };
    Ok(ParsedCfi::Range(range).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfi::parser::parse;
    use crate::cfi::resolver::{resolve_node, ResolveOptions};
    use crate::dom::{NodeId, Tree};

    const CHAPTER: &str = r#"<html><head><title>t</title></head><body id="body01"><p>first</p><p id="para02">xxx<em>yyy</em>0123456789</p><img id="svgimg" src="a.png"/></body></html>"#;

    fn last_steps(cfi: &str) -> Vec<Step> {
        match parse(cfi).unwrap() {
            ParsedCfi::Location(path) => path.parts.last().unwrap().steps.clone(),
            ParsedCfi::Range(_) => panic!("expected a location"),
        }
    }

    fn all_nodes(tree: &Tree, node: NodeId, out: &mut Vec<NodeId>) {
        for child in tree.children(node) {
            out.push(child);
            all_nodes(tree, child, out);
        }
    }

    #[test]
    fn test_generate_text_position() {
        let tree = Tree::parse(CHAPTER).unwrap();
        let para = tree.element_by_id("para02").unwrap();
        let text = tree.children(para)[2];
        assert_eq!(
            generate(&tree, text, Some(4)).unwrap(),
            "epubcfi(/4[body01]/4[para02]/3:4)"
        );
    }

    #[test]
    fn test_generate_img_offset() {
        let tree = Tree::parse(CHAPTER).unwrap();
        let img = tree.element_by_id("svgimg").unwrap();
        assert_eq!(generate(&tree, img, Some(3)).unwrap(), "epubcfi(/4[body01]/6[svgimg]:3)");
    }

    #[test]
    fn test_generate_document_element_fails() {
        let tree = Tree::parse(CHAPTER).unwrap();
        let html = tree.document_element().unwrap();
        assert!(generate(&tree, html, None).is_err());
    }

    #[test]
    fn test_round_trip_every_node() {
        let tree = Tree::parse(CHAPTER).unwrap();
        let html = tree.document_element().unwrap();
        let mut nodes = Vec::new();
        all_nodes(&tree, html, &mut nodes);

        for ignore_ids in [false, true] {
            let opts = ResolveOptions { ignore_ids, range: false };
            for &node in &nodes {
                let offset = if tree.is_text_like(node) { Some(1) } else { None };
                let cfi = generate(&tree, node, offset).unwrap();
                let loc = resolve_node(0, &last_steps(&cfi), &tree, &opts).unwrap();
                assert_eq!(loc.node, node, "{}", cfi);
                assert_eq!(loc.offset, offset, "{}", cfi);
            }
        }
    }

    #[test]
    fn test_round_trip_merged_text_run() {
        let mut tree = Tree::new();
        let root = tree.root_node();
        let body = tree.append_element(root, "body", &[]);
        let p = tree.append_element(body, "p", &[]);
        tree.append_text(p, "abc");
        let second = tree.append_cdata(p, "defg");

        let cfi = generate(&tree, second, Some(2)).unwrap();
        assert_eq!(cfi, "epubcfi(/2/1:5)");
        let loc = resolve_node(0, &last_steps(&cfi), &tree, &ResolveOptions::default()).unwrap();
        assert_eq!((loc.node, loc.offset), (second, Some(2)));
    }

    #[test]
    fn test_round_trip_across_comment() {
        let mut tree = Tree::new();
        let root = tree.root_node();
        let body = tree.append_element(root, "body", &[]);
        let p = tree.append_element(body, "p", &[]);
        let first = tree.append_text(p, "abc");
        tree.append_comment(p);
        let second = tree.append_text(p, "defg");

        let cfi = generate(&tree, second, Some(1)).unwrap();
        assert_eq!(cfi, "epubcfi(/2/1:4)");
        let loc = resolve_node(0, &last_steps(&cfi), &tree, &ResolveOptions::default()).unwrap();
        assert_eq!((loc.node, loc.offset), (second, Some(1)));

        let cfi = generate(&tree, first, Some(2)).unwrap();
        let loc = resolve_node(0, &last_steps(&cfi), &tree, &ResolveOptions::default()).unwrap();
        assert_eq!((loc.node, loc.offset), (first, Some(2)));
    }

    #[test]
    fn test_escaped_id_round_trip() {
        let mut tree = Tree::new();
        let root = tree.root_node();
        let body = tree.append_element(root, "body", &[]);
        let target = tree.append_element(body, "p", &[("id", "!/foo^[]")]);

        let cfi = generate(&tree, target, None).unwrap();
        assert_eq!(cfi, "epubcfi(/2[!/foo^^^[^]])");
        let steps = last_steps(&cfi);
        assert_eq!(steps[0].node_id.as_deref(), Some("!/foo^[]"));

        let loc = resolve_node(0, &steps, &tree, &ResolveOptions::default()).unwrap();
        assert_eq!(loc.node, target);
    }

    #[test]
    fn test_generate_stops_at_package() {
        let opf = r#"<package><metadata/><manifest><item id="c1" href="c1.xhtml"/></manifest><spine><itemref id="ref1" idref="c1"/></spine></package>"#;
        let tree = Tree::parse(opf).unwrap();
        let itemref = tree.element_by_id("ref1").unwrap();
        assert_eq!(generate(&tree, itemref, None).unwrap(), "epubcfi(/6/2[ref1])");
    }

    #[test]
    fn test_generate_chain() {
        let opf = Tree::parse(r#"<package><metadata/><manifest/><spine><itemref idref="c1"/><itemref id="r2" idref="c2"/></spine></package>"#).unwrap();
        let chapter = Tree::parse(CHAPTER).unwrap();
        let itemref = opf.element_by_id("r2").unwrap();
        let para = chapter.element_by_id("para02").unwrap();

        let targets = [
            GenerateTarget::new(&opf, itemref, None),
            GenerateTarget::new(&chapter, para, None),
        ];
        assert_eq!(
            generate_chain(&targets).unwrap(),
            "epubcfi(/6/4[r2]!/4[body01]/4[para02])"
        );
        assert!(generate_chain::<Tree>(&[]).is_err());
    }

    #[test]
    fn test_generate_range() {
        let tree = Tree::parse(CHAPTER).unwrap();
        let para = tree.element_by_id("para02").unwrap();
        let children = tree.children(para);

        let cfi = generate_range(&tree, (children[0], Some(1)), (children[2], Some(6))).unwrap();
        assert_eq!(cfi, "epubcfi(/4[body01]/4[para02],/1:1,/3:6)");

        match parse(&cfi).unwrap() {
            ParsedCfi::Range(range) => {
                assert_eq!(range.from_suffix, vec![Step::new(1).at_offset(1)]);
                assert_eq!(range.to_suffix, vec![Step::new(3).at_offset(6)]);
            }
            other => panic!("expected a range, got {:?}", other),
        }
    }
}
