//! The format dispatcher.
//!
//! [`Converter`] is the single entry point for turning a stored document
//! into HTML, Markdown or editor markup. It is built once from a
//! [`ConversionConfig`] and shared by reference.
//!
//! | format | HTML | Markdown | editor markup |
//! |---|---|---|---|
//! | html | sanitize (optional), math | html → md | sanitize |
//! | ckEditorMarkup | sanitize, trim, math | sanitize, html → md | as is |
//! | draftJS | blocks → html, math | blocks → html → md | blocks → html |
//! | markdown | render, math | as is | render |

use std::sync::Arc;

use crate::blocks::block_doc_to_html_with;
use crate::config::ConversionConfig;
use crate::dom::Document;
use crate::envelope::ContentEnvelope;
use crate::markdown::{MarkdownRenderer, html_to_markdown};
use crate::math::{MathEngine, MathRendering, MathReport, MathStage};
use crate::sanitize::Sanitizer;

/// Editor-only widgets that never belong in rendered output.
const EDITOR_ONLY_CLASSES: &[&str] = &["dialogue-message-input-wrapper", "dialogue-message-input"];

/// Options for [`Converter::to_html`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Sanitize raw HTML input. Editor markup is always sanitized.
    pub sanitize: bool,
    /// Leave TeX unrendered.
    pub skip_math: bool,
}

/// Converts content envelopes between formats.
#[derive(Clone)]
pub struct Converter {
    config: ConversionConfig,
    sanitizer: Sanitizer,
    renderer: MarkdownRenderer,
    math: MathStage,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        let math = MathStage::new(&config);
        Self::build(config, math)
    }

    /// Converter with a custom math engine.
    pub fn with_math_engine(config: ConversionConfig, engine: Arc<dyn MathEngine>) -> Self {
        let math = MathStage::with_engine(&config, engine);
        Self::build(config, math)
    }

    fn build(config: ConversionConfig, math: MathStage) -> Self {
        Self {
            renderer: MarkdownRenderer::new(&config),
            sanitizer: Sanitizer::default(),
            config,
            math,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Render a document to display HTML.
    pub async fn to_html(&self, envelope: &ContentEnvelope, options: HtmlOptions) -> String {
        self.to_html_with_report(envelope, options).await.html
    }

    /// Like [`Converter::to_html`], also reporting what the math stage did.
    pub async fn to_html_with_report(
        &self,
        envelope: &ContentEnvelope,
        options: HtmlOptions,
    ) -> MathRendering {
        let html = match envelope {
            ContentEnvelope::Html(html) if options.sanitize => self.sanitizer.sanitize(html),
            ContentEnvelope::Html(html) => html.clone(),
            ContentEnvelope::EditorMarkup(markup) => self.editor_markup_to_html(markup),
            ContentEnvelope::Blocks(doc) => block_doc_to_html_with(doc, &self.config),
            ContentEnvelope::Markdown(markdown) => self.renderer.render(markdown),
        };

        if options.skip_math {
            return MathRendering {
                html,
                report: MathReport::default(),
            };
        }
        self.math.render(&html).await
    }

    /// Convert a document to Markdown.
    pub fn to_markdown(&self, envelope: &ContentEnvelope) -> String {
        match envelope {
            ContentEnvelope::Markdown(markdown) => markdown.clone(),
            ContentEnvelope::Html(html) => html_to_markdown(html),
            ContentEnvelope::EditorMarkup(markup) => html_to_markdown(&self.sanitizer.sanitize(markup)),
            ContentEnvelope::Blocks(doc) => html_to_markdown(&block_doc_to_html_with(doc, &self.config)),
        }
    }

    /// Convert a document to markup the rich-text editor can load. TeX is
    /// left as `math-tex` source for the editor to render.
    pub fn to_editor_markup(&self, envelope: &ContentEnvelope) -> String {
        match envelope {
            ContentEnvelope::Html(html) => self.sanitizer.sanitize(html),
            ContentEnvelope::EditorMarkup(markup) => markup.clone(),
            ContentEnvelope::Blocks(doc) => block_doc_to_html_with(doc, &self.config),
            ContentEnvelope::Markdown(markdown) => self.renderer.render(markdown),
        }
    }

    /// Render Markdown without typesetting math.
    pub fn markdown_to_html(&self, markdown: &str) -> String {
        self.renderer.render(markdown)
    }

    fn editor_markup_to_html(&self, markup: &str) -> String {
        let mut doc = Document::parse(markup);
        self.sanitizer.sanitize_document(&mut doc);

        let editor_only: Vec<_> = doc
            .descendants(doc.body())
            .into_iter()
            .filter(|&id| EDITOR_ONLY_CLASSES.iter().any(|class| doc.has_class(id, class)))
            .collect();
        for id in editor_only {
            doc.remove(id);
        }
        doc.trim_empty_edges();

        // A single pass can leave markup that reparses differently.
        self.sanitizer.sanitize(&doc.to_html())
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConversionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockDocument;
    use serde_json::json;

    fn converter() -> Converter {
        Converter::default()
    }

    #[tokio::test]
    async fn test_html_sanitized_only_when_asked() {
        let env = ContentEnvelope::Html("<p>a<script>x</script></p>".to_string());
        let options = HtmlOptions {
            sanitize: false,
            skip_math: true,
        };
        assert_eq!(converter().to_html(&env, options).await, "<p>a<script>x</script></p>");

        let options = HtmlOptions {
            sanitize: true,
            skip_math: true,
        };
        assert_eq!(converter().to_html(&env, options).await, "<p>a</p>");
    }

    #[tokio::test]
    async fn test_editor_markup_sanitized_and_trimmed() {
        let env = ContentEnvelope::EditorMarkup(
            r#"<p></p><p onclick="x()">body</p><div class="dialogue-message-input-wrapper">draft</div><br>"#
                .to_string(),
        );
        let options = HtmlOptions {
            sanitize: false,
            skip_math: true,
        };
        assert_eq!(converter().to_html(&env, options).await, "<p>body</p>");
    }

    #[tokio::test]
    async fn test_markdown_to_html() {
        let env = ContentEnvelope::Markdown("# Title\n\ntext".to_string());
        let options = HtmlOptions {
            skip_math: true,
            ..Default::default()
        };
        assert_eq!(converter().to_html(&env, options).await, "<h1>Title</h1>\n<p>text</p>");
    }

    #[test]
    fn test_to_markdown_routes() {
        let c = converter();
        assert_eq!(c.to_markdown(&ContentEnvelope::Markdown("*x*".into())), "*x*");
        assert_eq!(c.to_markdown(&ContentEnvelope::Html("<p><i>x</i></p>".into())), "*x*");
        assert_eq!(
            c.to_markdown(&ContentEnvelope::EditorMarkup("<p>a<script>b</script></p>".into())),
            "a"
        );
        let doc = BlockDocument::from_value(json!({
            "blocks": [{"key": "a", "text": "hello", "type": "header-one"}],
            "entityMap": {}
        }))
        .unwrap();
        assert_eq!(c.to_markdown(&ContentEnvelope::Blocks(doc)), "# hello");
    }

    #[test]
    fn test_to_editor_markup_routes() {
        let c = converter();
        assert_eq!(
            c.to_editor_markup(&ContentEnvelope::Html(r#"<p style="x">a</p>"#.into())),
            "<p>a</p>"
        );
        assert_eq!(
            c.to_editor_markup(&ContentEnvelope::EditorMarkup("<p>raw</p>".into())),
            "<p>raw</p>"
        );
        assert_eq!(
            c.to_editor_markup(&ContentEnvelope::Markdown("$x$".into())),
            r#"<p><span class="math-tex">\(x\)</span></p>"#
        );
    }
}
