use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use super::{ImportStage, StageContext};
use crate::dom::Document;
use crate::error::Result;
use crate::upload::ImageUploader;

/// Copies images served from the exporter's asset host into permanent
/// storage. Those URLs expire, so a document that kept them would lose its
/// images.
pub struct RehostImages {
    uploader: Arc<dyn ImageUploader>,
    host_pattern: String,
}

impl RehostImages {
    pub fn new(uploader: Arc<dyn ImageUploader>, host_pattern: impl Into<String>) -> Self {
        Self {
            uploader,
            host_pattern: host_pattern.into(),
        }
    }
}

#[async_trait]
impl ImportStage for RehostImages {
    fn name(&self) -> &'static str {
        "rehost-images"
    }

    async fn apply(&self, mut doc: Document, ctx: &StageContext) -> Result<Document> {
        let images: Vec<_> = doc
            .elements_by_tag("img")
            .into_iter()
            .filter_map(|id| {
                let src = doc.get_attr(id, "src")?;
                src.contains(&self.host_pattern).then(|| (id, src.to_string()))
            })
            .collect();
        if images.is_empty() {
            return Ok(doc);
        }

        let mut sources: Vec<&str> = images.iter().map(|(_, src)| src.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();

        let moved = join_all(sources.iter().map(|src| self.uploader.move_to_permanent_storage(src))).await;
        let mut rehosted = HashMap::new();
        for (src, result) in sources.iter().zip(moved) {
            match result {
                Ok(url) => {
                    rehosted.insert(src.to_string(), url);
                }
                Err(e) => tracing::warn!(document = %ctx.document_id, src = %src, error = %e, "could not rehost image"),
            }
        }

        for (id, src) in &images {
            if let Some(url) = rehosted.get(src) {
                doc.set_attr(*id, "src", url.as_str());
            }
        }
        tracing::debug!(rehosted = rehosted.len(), total = sources.len(), "rehosted images");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Prefixing;

    #[async_trait]
    impl ImageUploader for Prefixing {
        async fn upload_image(&self, _bytes: Vec<u8>) -> Result<String> {
            Err(Error::Upload("unused".to_string()))
        }

        async fn move_to_permanent_storage(&self, url: &str) -> Result<String> {
            if url.contains("broken") {
                return Err(Error::Upload("rejected".to_string()));
            }
            Ok(format!("https://cdn.test/{}", url.rsplit('/').next().unwrap_or_default()))
        }
    }

    fn ctx() -> StageContext {
        StageContext {
            document_id: "doc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_only_matching_hosts_rehosted() {
        let doc = Document::parse(concat!(
            r#"<img src="https://lh3.googleusercontent.com/a1">"#,
            r#"<img src="https://example.com/b2">"#,
            r#"<img src="https://lh3.googleusercontent.com/broken">"#,
        ));
        let stage = RehostImages::new(Arc::new(Prefixing), "googleusercontent");
        let doc = stage.apply(doc, &ctx()).await.unwrap();
        assert_eq!(
            doc.to_html(),
            concat!(
                r#"<img src="https://cdn.test/a1">"#,
                r#"<img src="https://example.com/b2">"#,
                r#"<img src="https://lh3.googleusercontent.com/broken">"#,
            )
        );
    }
}
