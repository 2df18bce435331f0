//! Document hops
//!
//! Every Part before the last addresses a link to another document. The
//! hops are followed one at a time: resolve the Part, read the link, then
//! await the fetcher for the next document.

use async_trait::async_trait;

use super::resolver::{parts, resolve_last, resolve_node, ResolveOptions, Resolved};
use super::types::ParsedCfi;
use super::uri::resolve_uri;
use crate::dom::DocumentTree;
use crate::error::{FetchError, Result};

/// Retrieves the document behind a URI
///
/// Implementations own transport, caching and cancellation.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    type Document: DocumentTree + Send;

    async fn fetch(&self, uri: &str) -> std::result::Result<Self::Document, FetchError>;
}

/// Follow every document hop of `parsed`, starting from `start`.
///
/// Returns `start` untouched when the CFI addresses a single document.
/// A hop without a fetcher fails with a transport error.
pub async fn load_last_document<F: DocumentFetcher>(
    parsed: &ParsedCfi,
    start: F::Document,
    fetcher: Option<&F>,
    opts: &ResolveOptions,
) -> Result<F::Document> {
    let all = parts(parsed);
    let hops = all.len().saturating_sub(1);
    let mut document = start;

    for (i, part) in all.iter().take(hops).enumerate() {
        let uri = {
            let location = resolve_node(i, &part.steps, &document, opts)?;
            resolve_uri(&document, location.node)?
        };

        let fetcher = fetcher.ok_or_else(|| FetchError::Missing(uri.clone()))?;
        tracing::debug!(part = i, uri = %uri, "Fetching linked document");
        document = fetcher.fetch(&uri).await?;
    }

    Ok(document)
}

/// Follow every hop, then resolve the final Part in the last document
pub async fn resolve<F: DocumentFetcher>(
    parsed: &ParsedCfi,
    start: F::Document,
    fetcher: Option<&F>,
    opts: &ResolveOptions,
) -> Result<(F::Document, Resolved<<F::Document as DocumentTree>::Node>)> {
    let document = load_last_document(parsed, start, fetcher, opts).await?;
    let resolved = resolve_last(parsed, &document, opts)?;
    Ok((document, resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfi::parser::parse;
    use crate::dom::Tree;
    use crate::error::CfiError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OPF: &str = r#"<package><metadata/><manifest><item id="c1" href="c1.xhtml"/><item id="c2" href="c2.xhtml"/></manifest><spine><itemref idref="c1"/><itemref idref="c2"/></spine></package>"#;

    struct MapFetcher {
        documents: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl MapFetcher {
        fn new(documents: &[(&str, &str)]) -> Self {
            Self {
                documents: documents
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentFetcher for MapFetcher {
        type Document = Tree;

        async fn fetch(&self, uri: &str) -> std::result::Result<Tree, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let xml = self
                .documents
                .get(uri)
                .ok_or_else(|| FetchError::NotFound(uri.to_string()))?;
            Tree::parse(xml).map_err(|e| FetchError::Rejected {
                uri: uri.to_string(),
                reason: e.to_string(),
            })
        }
    }

    fn fetcher() -> MapFetcher {
        MapFetcher::new(&[
            ("c1.xhtml", r#"<html><head/><body><p>one</p></body></html>"#),
            ("c2.xhtml", r#"<html><head/><body><p>two</p><p id="x">three</p></body></html>"#),
        ])
    }

    #[tokio::test]
    async fn test_follows_spine_hop() {
        let fetcher = fetcher();
        let parsed = parse("epubcfi(/6/4!/4/4/1:2)").unwrap();
        let start = Tree::parse(OPF).unwrap();

        let (document, resolved) = resolve(&parsed, start, Some(&fetcher), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        match resolved {
            Resolved::Location(loc) => {
                assert_eq!(document.text(loc.node), Some("three"));
                assert_eq!(loc.offset, Some(2));
            }
            other => panic!("expected a location, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_document_needs_no_fetcher() {
        let parsed = parse("epubcfi(/6/2)").unwrap();
        let start = Tree::parse(OPF).unwrap();
        let document = load_last_document::<MapFetcher>(&parsed, start, None, &ResolveOptions::default())
            .await
            .unwrap();
        assert!(document.find_by_tag("spine").is_some());
    }

    #[tokio::test]
    async fn test_missing_fetcher_is_transport_failure() {
        let parsed = parse("epubcfi(/6/2!/4/2)").unwrap();
        let start = Tree::parse(OPF).unwrap();
        let result = load_last_document::<MapFetcher>(&parsed, start, None, &ResolveOptions::default()).await;
        assert!(matches!(
            result,
            Err(CfiError::TransportFailure(FetchError::Missing(ref uri))) if uri == "c1.xhtml"
        ));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let fetcher = MapFetcher::new(&[]);
        let parsed = parse("epubcfi(/6/2!/4/2)").unwrap();
        let start = Tree::parse(OPF).unwrap();
        let result = load_last_document(&parsed, start, Some(&fetcher), &ResolveOptions::default()).await;
        assert!(matches!(
            result,
            Err(CfiError::TransportFailure(FetchError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_unlinked_hop_fails() {
        let fetcher = fetcher();
        let parsed = parse("epubcfi(/6/4!/4/2!/2)").unwrap();
        let start = Tree::parse(OPF).unwrap();
        let result = load_last_document(&parsed, start, Some(&fetcher), &ResolveOptions::default()).await;
        assert!(matches!(result, Err(CfiError::LinkNotFound(_))));
    }
}
