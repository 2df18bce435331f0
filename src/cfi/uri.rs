//! Cross-document links
//!
//! A non-final Part addresses an element that references the next
//! document. This module reads that reference off the element.

use crate::dom::DocumentTree;
use crate::error::{CfiError, Result};

/// Extract the next-document URI from a resolved element.
///
/// - `itemref` inside `spine`: `href` of the manifest item named by `idref`
/// - `iframe`, `embed`: `src`
/// - `object`: `data`
/// - `image`, `use`: `xlink:href`
pub fn resolve_uri<T: DocumentTree>(tree: &T, node: T::Node) -> Result<String> {
    let tag = tree.tag_name(node).unwrap_or_default();
    let missing = |what: &str| CfiError::LinkNotFound(format!("<{}> has no {}", tag, what));

    let uri = match tag {
        "itemref" if tree.parent(node).is_some_and(|p| tree.has_tag(p, "spine")) => {
            let idref = tree.attribute(node, "idref").ok_or_else(|| missing("idref"))?;
            let item = tree
                .element_by_id(idref)
                .ok_or_else(|| CfiError::LinkNotFound(format!("no manifest item '{}'", idref)))?;
            tree.attribute(item, "href").ok_or_else(|| missing("href"))?
        }
        "iframe" | "embed" => tree.attribute(node, "src").ok_or_else(|| missing("src"))?,
        "object" => tree.attribute(node, "data").ok_or_else(|| missing("data"))?,
        "image" | "use" => tree
            .attribute(node, "xlink:href")
            .ok_or_else(|| missing("xlink:href"))?,
        _ => {
            return Err(CfiError::LinkNotFound(format!(
                "<{}> does not reference another document",
                tag
            )))
        }
    };

    tracing::debug!(tag, uri, "Resolved document link");
    Ok(uri.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Tree;

    #[test]
    fn test_spine_itemref() {
        let tree = Tree::parse(
            r#"<package><manifest><item id="c1" href="text/c1.xhtml"/></manifest><spine><itemref id="r1" idref="c1"/></spine></package>"#,
        )
        .unwrap();
        let itemref = tree.element_by_id("r1").unwrap();
        assert_eq!(resolve_uri(&tree, itemref).unwrap(), "text/c1.xhtml");
    }

    #[test]
    fn test_embedded_content() {
        let tree = Tree::parse(
            r#"<body xmlns:xlink="http://www.w3.org/1999/xlink"><iframe id="f" src="f.xhtml"/><embed id="e" src="e.svg"/><object id="o" data="o.svg"/><svg><image id="i" xlink:href="i.svg"/><use id="u" xlink:href="sprites.svg"/></svg></body>"#,
        )
        .unwrap();
        let uri = |id| resolve_uri(&tree, tree.element_by_id(id).unwrap()).unwrap();
        assert_eq!(uri("f"), "f.xhtml");
        assert_eq!(uri("e"), "e.svg");
        assert_eq!(uri("o"), "o.svg");
        assert_eq!(uri("i"), "i.svg");
        assert_eq!(uri("u"), "sprites.svg");
    }

    #[test]
    fn test_unlinked_element() {
        let tree = Tree::parse(r#"<body><p id="p">x</p><iframe id="f"/></body>"#).unwrap();
        for id in ["p", "f"] {
            let result = resolve_uri(&tree, tree.element_by_id(id).unwrap());
            assert!(matches!(result, Err(CfiError::LinkNotFound(_))));
        }
    }

    #[test]
    fn test_itemref_outside_spine() {
        let tree = Tree::parse(r#"<package><itemref id="r" idref="c1"/><item id="c1" href="x"/></package>"#).unwrap();
        let result = resolve_uri(&tree, tree.element_by_id("r").unwrap());
        assert!(matches!(result, Err(CfiError::LinkNotFound(_))));
    }
}
