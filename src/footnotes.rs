//! Canonical footnote markup, shared by the Markdown renderer and the
//! import pipeline.
//!
//! A reference is a `span.footnote-reference` around a numbered link; each
//! note is an `li.footnote-item` holding a back link and a
//! `div.footnote-content`, and all notes live in one
//! `ol.footnote-section` at the end of the document.

use crate::dom::escape_attr;

pub(crate) const SECTION_OPEN: &str = r#"<ol class="footnote-section footnotes" data-footnote-section="" role="doc-endnotes">"#;
pub(crate) const SECTION_CLOSE: &str = "</ol>";

/// Markup for a reference to footnote `id`, displayed as `[index]`.
pub(crate) fn reference_html(id: &str, index: usize) -> String {
    let id = escape_attr(id);
    format!(
        r##"<span class="footnote-reference" data-footnote-reference="" data-footnote-id="{id}" data-footnote-index="{index}" role="doc-noteref" id="fnref{id}"><sup><a href="#fn{id}">[{index}]</a></sup></span>"##
    )
}

/// Markup for one footnote. `content_html` is inserted as-is.
pub(crate) fn item_html(id: &str, index: usize, content_html: &str) -> String {
    let id = escape_attr(id);
    format!(
        concat!(
            r#"<li class="footnote-item" data-footnote-item="" data-footnote-id="{id}" data-footnote-index="{index}" role="doc-endnote" id="fn{id}">"#,
            r##"<span class="footnote-back-link" data-footnote-back-link="" data-footnote-id="{id}"><sup><strong><a href="#fnref{id}">^</a></strong></sup></span>"##,
            r#"<div class="footnote-content" data-footnote-content="" data-footnote-id="{id}" role="doc-endnote">{content}</div>"#,
            "</li>"
        ),
        id = id,
        index = index,
        content = content_html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn test_reference_shape() {
        let html = reference_html("a1", 2);
        let doc = Document::parse(&html);
        let span = doc.query("span.footnote-reference").unwrap()[0];
        assert_eq!(doc.get_attr(span, "data-footnote-id"), Some("a1"));
        assert_eq!(doc.get_attr(span, "id"), Some("fnrefa1"));
        assert_eq!(doc.text(span), "[2]");
    }

    #[test]
    fn test_item_shape() {
        let html = format!("{SECTION_OPEN}{}{SECTION_CLOSE}", item_html("a1", 1, "<p>Note</p>"));
        let doc = Document::parse(&html);
        let item = doc.query("ol.footnote-section > li.footnote-item").unwrap()[0];
        assert_eq!(doc.get_attr(item, "id"), Some("fna1"));
        let content = doc.query("div.footnote-content > p").unwrap();
        assert_eq!(doc.text(content[0]), "Note");
    }
}
