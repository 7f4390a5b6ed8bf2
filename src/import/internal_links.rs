use std::sync::Arc;

use async_trait::async_trait;

use super::{ImportStage, StageContext};
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::toc::TocExtractor;

/// Elements the editor treats as blocks, and so can carry a link target.
const LINK_TARGET_BLOCKS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "ol", "ul", "li", "blockquote", "pre", "hr", "table",
];

const FOOTNOTE_CLASSES: &[&str] = &["footnote-reference", "footnote-item", "footnote-back-link"];

/// Keeps same-document links working in the editor.
///
/// The editor drops `id` attributes but keeps `data-internal-id` on blocks,
/// so every id moves to its nearest block. Heading targets are then renamed
/// after the heading text, as the table of contents names them, and links
/// are rewritten to match.
pub struct InternalLinks {
    toc: Arc<dyn TocExtractor>,
}

impl InternalLinks {
    pub fn new(toc: Arc<dyn TocExtractor>) -> Self {
        Self { toc }
    }
}

fn in_footnote_markup(doc: &Document, id: NodeId) -> bool {
    doc.closest(id, |d, n| FOOTNOTE_CLASSES.iter().any(|c| d.has_class(n, c)))
        .is_some()
}

#[async_trait]
impl ImportStage for InternalLinks {
    fn name(&self) -> &'static str {
        "internal-links"
    }

    async fn apply(&self, mut doc: Document, _ctx: &StageContext) -> Result<Document> {
        let with_ids: Vec<_> = doc
            .descendants(doc.body())
            .into_iter()
            .filter(|&n| doc.element_id(n).is_some() && !in_footnote_markup(&doc, n))
            .collect();
        if with_ids.is_empty() {
            return Ok(doc);
        }

        for node in with_ids {
            let Some(value) = doc.element_id(node).map(str::to_string) else {
                continue;
            };
            doc.remove_attr(node, "id");
            if let Some(block) = doc.closest(node, |d, n| d.tag(n).is_some_and(|t| LINK_TARGET_BLOCKS.contains(&t))) {
                doc.set_attr(block, "data-internal-id", value);
            }
        }

        let readable = self.toc.extract(&doc).readable_ids();
        if readable.is_empty() {
            return Ok(doc);
        }

        for node in doc.descendants(doc.body()) {
            if let Some(target) = doc.get_attr(node, "href").and_then(|h| h.strip_prefix('#'))
                && doc.is_tag(node, "a")
                && let Some(anchor) = readable.get(target)
            {
                let href = format!("#{anchor}");
                doc.set_attr(node, "href", href);
            }
            if let Some(internal) = doc.get_attr(node, "data-internal-id")
                && let Some(anchor) = readable.get(internal)
            {
                let anchor = anchor.clone();
                doc.set_attr(node, "data-internal-id", anchor);
            }
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toc::HeadingToc;

    async fn run(html: &str) -> String {
        let ctx = StageContext {
            document_id: "doc".to_string(),
        };
        let stage = InternalLinks::new(Arc::new(HeadingToc));
        stage.apply(Document::parse(html), &ctx).await.unwrap().to_html()
    }

    #[tokio::test]
    async fn test_heading_links_rewritten() {
        let html = concat!(
            r#"<h1 id="h.abc123"><span>Getting Started</span></h1>"#,
            r##"<p>See <a href="#h.abc123">above</a>.</p>"##,
        );
        assert_eq!(
            run(html).await,
            concat!(
                r#"<h1 data-internal-id="Getting_Started"><span>Getting Started</span></h1>"#,
                r##"<p>See <a href="#Getting_Started">above</a>.</p>"##,
            )
        );
    }

    #[tokio::test]
    async fn test_inline_ids_move_to_block() {
        let html = r##"<p>Text <a id="bookmark1"></a>here</p><p><a href="#bookmark1">jump</a></p>"##;
        assert_eq!(
            run(html).await,
            r##"<p data-internal-id="bookmark1">Text <a></a>here</p><p><a href="#bookmark1">jump</a></p>"##
        );
    }

    #[tokio::test]
    async fn test_footnote_ids_untouched() {
        let html = r#"<p>x<span class="footnote-reference" id="fnrefa"><sup>[1]</sup></span></p>"#;
        assert_eq!(run(html).await, html);
    }

    #[tokio::test]
    async fn test_external_links_untouched() {
        let html = r#"<h2 id="h.x">Title</h2><p><a href="https://example.com/#h.x">out</a></p>"#;
        assert!(run(html).await.contains(r#"href="https://example.com/#h.x""#));
    }
}
