use async_trait::async_trait;

use super::{ImportStage, StageContext};
use crate::dom::Document;
use crate::error::Result;

/// Removes blank top-level paragraphs. The export uses them for spacing,
/// which doubles up with the editor's own paragraph margins.
pub struct EmptyParagraphs;

#[async_trait]
impl ImportStage for EmptyParagraphs {
    fn name(&self) -> &'static str {
        "empty-paragraphs"
    }

    async fn apply(&self, mut doc: Document, _ctx: &StageContext) -> Result<Document> {
        let empty: Vec<_> = doc
            .query("body > p")?
            .into_iter()
            .filter(|&p| {
                doc.text(p).trim().is_empty()
                    && !doc.descendants(p).into_iter().any(|d| doc.is_tag(d, "img"))
            })
            .collect();
        for p in empty {
            doc.remove(p);
        }
        Ok(doc)
    }
}
