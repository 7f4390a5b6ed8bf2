//! Import of documents exported from Google Docs.
//!
//! An export is valid HTML but full of word-processor artifacts: comment
//! threads, images "cropped" with CSS, styled spans instead of `<strong>`,
//! flat lists faking nesting with margins, redirect-wrapped links. The
//! [`ImportPipeline`] runs a fixed sequence of [`ImportStage`]s over the
//! parsed document and hands back editor markup.
//!
//! Stages run strictly in order and each owns the [`Document`] while it
//! runs. Every stage is a no-op on input that lacks its pattern.

mod comments;
mod crop;
mod footnotes;
mod formatting;
mod internal_links;
mod lists;
mod paragraphs;
mod redirects;
mod rehost;

pub use comments::StripComments;
pub use crop::{CropDescriptor, CropImages, CropReport};
pub use footnotes::ConvertFootnotes;
pub use formatting::TextFormatting;
pub use internal_links::InternalLinks;
pub use lists::{NestedLists, normalize_levels};
pub use paragraphs::EmptyParagraphs;
pub use redirects::UnwrapRedirects;
pub use rehost::RehostImages;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::dispatch::Converter;
use crate::dom::Document;
use crate::envelope::ContentEnvelope;
use crate::error::Result;
use crate::toc::HeadingToc;
use crate::upload::{ImageFetcher, ImageUploader};

/// Input to [`ImportPipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub html: String,
    /// The document the import is attached to.
    #[serde(rename = "postId")]
    pub document_id: String,
}

/// Per-run information available to every stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub document_id: String,
}

/// One named transform of the import pipeline.
#[async_trait]
pub trait ImportStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, doc: Document, ctx: &StageContext) -> Result<Document>;
}

/// Final pass: sanitize into markup the editor accepts.
pub struct EditorMarkup {
    converter: Arc<Converter>,
}

impl EditorMarkup {
    pub fn new(converter: Arc<Converter>) -> Self {
        Self { converter }
    }
}

#[async_trait]
impl ImportStage for EditorMarkup {
    fn name(&self) -> &'static str {
        "editor-markup"
    }

    async fn apply(&self, doc: Document, _ctx: &StageContext) -> Result<Document> {
        let markup = self
            .converter
            .to_editor_markup(&ContentEnvelope::Html(doc.to_html()));
        Ok(Document::parse(&markup))
    }
}

/// Sequential runner for import stages.
pub struct ImportPipeline {
    stages: Vec<Box<dyn ImportStage>>,
}

impl ImportPipeline {
    /// The standard Google Docs pipeline.
    ///
    /// Order matters: footnotes must be rebuilt before ids are moved by the
    /// internal-link stage, and lists must be re-nested while the empty
    /// paragraphs that separate list groups are still present.
    pub fn new(
        converter: Arc<Converter>,
        uploader: Arc<dyn ImageUploader>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let import = converter.config().import.clone();
        Self::with_stages(vec![
            Box::new(RehostImages::new(uploader.clone(), import.asset_host_pattern)),
            Box::new(StripComments),
            Box::new(CropImages::new(fetcher, uploader)),
            Box::new(TextFormatting),
            Box::new(ConvertFootnotes),
            Box::new(InternalLinks::new(Arc::new(HeadingToc))),
            Box::new(UnwrapRedirects::new(import.redirect_prefix)),
            Box::new(NestedLists),
            Box::new(EmptyParagraphs),
            Box::new(EditorMarkup::new(converter)),
        ])
    }

    pub fn with_stages(stages: Vec<Box<dyn ImportStage>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over `request.html` and return the result.
    pub async fn run(&self, request: ImportRequest) -> Result<String> {
        let ctx = StageContext {
            document_id: request.document_id,
        };
        let mut doc = Document::parse(&request.html);

        for stage in &self.stages {
            let span = tracing::debug_span!("import_stage", stage = stage.name(), document = %ctx.document_id);
            doc = stage.apply(doc, &ctx).instrument(span).await?;
        }

        Ok(doc.to_html())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::NoopUploader;

    struct Failing;

    #[async_trait]
    impl ImageFetcher for Failing {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(crate::Error::Fetch {
                url: url.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    struct Append(&'static str);

    #[async_trait]
    impl ImportStage for Append {
        fn name(&self) -> &'static str {
            "append"
        }

        async fn apply(&self, mut doc: Document, _ctx: &StageContext) -> Result<Document> {
            let body = doc.body();
            doc.append_html(body, self.0);
            Ok(doc)
        }
    }

    fn pipeline() -> ImportPipeline {
        ImportPipeline::new(Arc::new(Converter::default()), Arc::new(NoopUploader), Arc::new(Failing))
    }

    #[test]
    fn test_default_stage_order() {
        assert_eq!(
            pipeline().stage_names(),
            [
                "rehost-images",
                "strip-comments",
                "crop-images",
                "text-formatting",
                "footnotes",
                "internal-links",
                "redirects",
                "nested-lists",
                "empty-paragraphs",
                "editor-markup",
            ]
        );
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let pipeline = ImportPipeline::with_stages(vec![Box::new(Append("<p>a</p>")), Box::new(Append("<p>b</p>"))]);
        let request = ImportRequest {
            html: String::new(),
            document_id: "doc".to_string(),
        };
        assert_eq!(pipeline.run(request).await.unwrap(), "<p>a</p><p>b</p>");
    }

    #[tokio::test]
    async fn test_plain_document_passes_through() {
        let request = ImportRequest {
            html: "<html><body><p>Hello <b>world</b></p></body></html>".to_string(),
            document_id: "doc".to_string(),
        };
        assert_eq!(pipeline().run(request).await.unwrap(), "<p>Hello <b>world</b></p>");
    }

    #[test]
    fn test_request_wire_names() {
        let request: ImportRequest = serde_json::from_str(r#"{"html": "<p>x</p>", "postId": "abc"}"#).unwrap();
        assert_eq!(request.document_id, "abc");
    }
}
