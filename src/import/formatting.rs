use async_trait::async_trait;

use super::{ImportStage, StageContext};
use crate::dom::Document;
use crate::dom::style::{parse_inline_style, style_value};
use crate::error::Result;

/// Turns bold and italic expressed as span styles into `<strong>` and
/// `<i>`, which the sanitizer keeps and the styles it drops.
pub struct TextFormatting;

#[async_trait]
impl ImportStage for TextFormatting {
    fn name(&self) -> &'static str {
        "text-formatting"
    }

    async fn apply(&self, mut doc: Document, _ctx: &StageContext) -> Result<Document> {
        for span in doc.elements_by_tag("span") {
            let Some(style) = doc.get_attr(span, "style") else {
                continue;
            };
            let declarations = parse_inline_style(style);
            let italic = style_value(&declarations, "font-style") == Some("italic");
            let bold = matches!(style_value(&declarations, "font-weight"), Some("700" | "bold"));

            if bold {
                let strong = doc.new_element("strong", &[]);
                doc.wrap(span, strong);
            }
            if italic {
                let outer = doc.parent(span);
                let target = if bold { outer } else { span };
                let i = doc.new_element("i", &[]);
                doc.wrap(target, i);
            }
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(html: &str) -> String {
        let ctx = StageContext {
            document_id: "doc".to_string(),
        };
        TextFormatting.apply(Document::parse(html), &ctx).await.unwrap().to_html()
    }

    #[tokio::test]
    async fn test_bold_and_italic() {
        assert_eq!(
            run(r#"<p><span style="font-weight:700">b</span></p>"#).await,
            r#"<p><strong><span style="font-weight:700">b</span></strong></p>"#
        );
        assert_eq!(
            run(r#"<p><span style="font-style:italic">i</span></p>"#).await,
            r#"<p><i><span style="font-style:italic">i</span></i></p>"#
        );
    }

    #[tokio::test]
    async fn test_both() {
        assert_eq!(
            run(r#"<span style="font-style: italic; font-weight: bold">x</span>"#).await,
            r#"<i><strong><span style="font-style: italic; font-weight: bold">x</span></strong></i>"#
        );
    }

    #[tokio::test]
    async fn test_normal_weight_untouched() {
        let html = r#"<p><span style="font-weight:400">n</span></p>"#;
        assert_eq!(run(html).await, html);
    }
}
