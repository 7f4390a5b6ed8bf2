use async_trait::async_trait;

use super::{ImportStage, StageContext};
use crate::dom::Document;
use crate::error::Result;

/// Removes comment threads: the `[a]` markers in the text and the boxes at
/// the end of the document that hold the comments themselves.
pub struct StripComments;

#[async_trait]
impl ImportStage for StripComments {
    fn name(&self) -> &'static str {
        "strip-comments"
    }

    async fn apply(&self, mut doc: Document, _ctx: &StageContext) -> Result<Document> {
        let markers: Vec<_> = doc
            .query(r#"sup a[id^="cmnt_ref"]"#)?
            .into_iter()
            .filter_map(|a| doc.closest(a, |d, n| d.is_tag(n, "sup")))
            .collect();
        for sup in markers {
            if doc.is_attached(sup) {
                doc.remove(sup);
            }
        }

        // Only the box nearest to each remaining comment anchor goes.
        let threads: Vec<_> = doc
            .query(r#"a[id^="cmnt"]"#)?
            .into_iter()
            .filter_map(|a| doc.closest(a, |d, n| d.is_tag(n, "div")))
            .collect();
        for div in threads {
            if doc.is_attached(div) {
                doc.remove(div);
            }
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_comments_removed() {
        let doc = Document::parse(concat!(
            r##"<p>Text<sup><a href="#cmnt1" id="cmnt_ref1">[a]</a></sup> more</p>"##,
            r##"<div><p><a href="#cmnt_ref1" id="cmnt1">[a]</a>Comment body</p></div>"##,
            r#"<div><p>Keep me</p></div>"#,
        ));
        let ctx = StageContext {
            document_id: "doc".to_string(),
        };
        let doc = StripComments.apply(doc, &ctx).await.unwrap();
        assert_eq!(doc.to_html(), "<p>Text more</p><div><p>Keep me</p></div>");
    }

    #[tokio::test]
    async fn test_wrapper_div_survives() {
        let doc = Document::parse(concat!(
            r#"<div class="doc"><p>Body</p>"#,
            r##"<div><p><a href="#cmnt_ref1" id="cmnt1">[a]</a>Comment body</p></div></div>"##,
        ));
        let ctx = StageContext {
            document_id: "doc".to_string(),
        };
        let doc = StripComments.apply(doc, &ctx).await.unwrap();
        assert_eq!(doc.to_html(), r#"<div class="doc"><p>Body</p></div>"#);
    }

    #[tokio::test]
    async fn test_footnote_sups_kept() {
        let html = r##"<p>x<sup><a href="#ftnt1" id="ftnt_ref1">[1]</a></sup></p>"##;
        let ctx = StageContext {
            document_id: "doc".to_string(),
        };
        let doc = StripComments.apply(Document::parse(html), &ctx).await.unwrap();
        assert_eq!(doc.to_html(), html);
    }
}
