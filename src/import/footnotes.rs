//! Footnotes in the editor's format.
//!
//! An export links `<sup><a id="ftnt_ref1" href="#ftnt1">[1]</a></sup>` in
//! the text to a `<div>` at the end holding `<a id="ftnt1">[1]</a>` and the
//! note. Matched pairs are rebuilt as reference spans and footnote items in
//! one section at the end of the body. References without a note are left
//! alone.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{ImportStage, StageContext};
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::footnotes::{SECTION_CLOSE, SECTION_OPEN, item_html, reference_html};

static DEFINITION_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ftnt(\d+)$").expect("static regex"));
static REFERENCE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ftnt_ref(\d+)$").expect("static regex"));

pub struct ConvertFootnotes;

struct Definition {
    anchor: NodeId,
    container: NodeId,
    id: String,
}

/// Stable id for note `index` of a document, so that importing the same
/// export twice gives the same markup.
fn footnote_id(document_id: &str, index: usize) -> String {
    let digest = sha1_smol::Sha1::from(format!("{document_id}:{index}")).digest().to_string();
    digest[..10].to_string()
}

fn numbered_anchors(doc: &Document, pattern: &Regex) -> Vec<(usize, NodeId)> {
    doc.elements_by_tag("a")
        .into_iter()
        .filter_map(|a| {
            let caps = pattern.captures(doc.get_attr(a, "id")?)?;
            Some((caps[1].parse().ok()?, a))
        })
        .collect()
}

#[async_trait]
impl ImportStage for ConvertFootnotes {
    fn name(&self) -> &'static str {
        "footnotes"
    }

    async fn apply(&self, mut doc: Document, ctx: &StageContext) -> Result<Document> {
        let mut definitions = BTreeMap::new();
        for (index, anchor) in numbered_anchors(&doc, &DEFINITION_ID) {
            let container = doc
                .closest(anchor, |d, n| d.is_tag(n, "div"))
                .or_else(|| doc.closest(anchor, |d, n| d.is_block(n)))
                .unwrap_or(anchor);
            definitions.insert(
                index,
                Definition {
                    anchor,
                    container,
                    id: footnote_id(&ctx.document_id, index),
                },
            );
        }
        if definitions.is_empty() {
            return Ok(doc);
        }

        for (index, anchor) in numbered_anchors(&doc, &REFERENCE_ID) {
            let Some(definition) = definitions.get(&index) else {
                continue;
            };
            let target = doc.closest(anchor, |d, n| d.is_tag(n, "sup")).unwrap_or(anchor);
            let reference = doc.create_from_html(&reference_html(&definition.id, index));
            doc.replace_with(target, reference);
        }

        let mut section = String::from(SECTION_OPEN);
        for (&index, definition) in &definitions {
            let content = take_content(&mut doc, definition);
            section.push_str(&item_html(&definition.id, index, &content));
        }
        section.push_str(SECTION_CLOSE);

        let body = doc.body();
        let inserted = doc.append_html(body, &section);
        if let Some(&section) = inserted.first() {
            remove_stub_rule(&mut doc, section);
        }
        tracing::debug!(count = definitions.len(), "converted footnotes");
        Ok(doc)
    }
}

/// Detach a note from the body and return its content as HTML, without the
/// numbered anchor and with lists flattened into paragraphs.
fn take_content(doc: &mut Document, definition: &Definition) -> String {
    let next = doc.next_sibling(definition.anchor);
    doc.remove(definition.anchor);
    if let Some(text) = doc.text_content(next)
        && let Some(rest) = text.strip_prefix('\u{a0}')
    {
        let rest = rest.to_string();
        doc.set_text(next, &rest);
    }

    let container = definition.container;
    for list in doc.descendants(container) {
        if !(doc.is_tag(list, "ul") || doc.is_tag(list, "ol")) {
            continue;
        }
        for item in doc.child_ids(list) {
            if !doc.is_tag(item, "li") {
                continue;
            }
            let p = doc.new_element("p", &[]);
            doc.reparent_children(item, p);
            doc.insert_before(list, p);
        }
        doc.remove(list);
    }

    let content = if definition.container == definition.anchor {
        String::new()
    } else {
        doc.inner_html(container)
    };
    doc.remove(container);
    content
}

/// The export separates notes from the text with an `<hr>`; drop the
/// nearest one before the section.
fn remove_stub_rule(doc: &mut Document, section: NodeId) {
    let mut current = doc.prev_sibling(section);
    while current.is_some() {
        if doc.is_tag(current, "hr") {
            doc.remove(current);
            return;
        }
        current = doc.prev_sibling(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> StageContext {
        StageContext {
            document_id: "doc".to_string(),
        }
    }

    const EXPORT: &str = concat!(
        r##"<p>Claim<sup><a href="#ftnt1" id="ftnt_ref1">[1]</a></sup> and more<sup><a href="#ftnt9" id="ftnt_ref9">[9]</a></sup>.</p>"##,
        r##"<hr class="c1"><div><p><a href="#ftnt_ref1" id="ftnt1">[1]</a><span>&nbsp;Source one.</span></p></div>"##,
    );

    #[tokio::test]
    async fn test_pairs_rebuilt() {
        let doc = ConvertFootnotes.apply(Document::parse(EXPORT), &ctx()).await.unwrap();
        let id = footnote_id("doc", 1);

        let refs = doc.query("span.footnote-reference").unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(doc.get_attr(refs[0], "data-footnote-id"), Some(id.as_str()));
        assert_eq!(doc.text(refs[0]), "[1]");

        let items = doc.query("ol.footnote-section > li.footnote-item").unwrap();
        assert_eq!(items.len(), 1);
        let content = doc.query("div.footnote-content").unwrap()[0];
        assert_eq!(doc.text(content).trim(), "Source one.");
        assert!(doc.query("hr").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_reference_kept() {
        let doc = ConvertFootnotes.apply(Document::parse(EXPORT), &ctx()).await.unwrap();
        assert!(doc.to_html().contains(r##"<a href="#ftnt9" id="ftnt_ref9">[9]</a>"##));
    }

    #[tokio::test]
    async fn test_lists_in_notes_flattened() {
        let html = concat!(
            r##"<p>x<sup><a href="#ftnt1" id="ftnt_ref1">[1]</a></sup></p>"##,
            r##"<div><p><a href="#ftnt_ref1" id="ftnt1">[1]</a> Intro</p><ul><li>one</li><li>two</li></ul></div>"##,
        );
        let doc = ConvertFootnotes.apply(Document::parse(html), &ctx()).await.unwrap();
        let content = doc.query("div.footnote-content").unwrap()[0];
        assert_eq!(doc.inner_html(content), "<p> Intro</p><p>one</p><p>two</p>");
    }

    #[tokio::test]
    async fn test_only_rule_before_notes_removed() {
        let html = concat!(
            "<p>Part one</p><hr>",
            r##"<p>Claim<sup><a href="#ftnt1" id="ftnt_ref1">[1]</a></sup></p><hr>"##,
            r##"<div><p><a href="#ftnt_ref1" id="ftnt1">[1]</a> Note.</p></div>"##,
        );
        let doc = ConvertFootnotes.apply(Document::parse(html), &ctx()).await.unwrap();
        let rules = doc.query("hr").unwrap();
        assert_eq!(rules.len(), 1);
        let after = doc.next_element_sibling(rules[0]);
        assert!(doc.text(after).starts_with("Claim"));
        assert!(doc.is_tag(doc.next_element_sibling(after), "ol"));
    }

    #[tokio::test]
    async fn test_no_footnotes_no_section() {
        let html = "<p>plain</p><hr><p>after</p>";
        let doc = ConvertFootnotes.apply(Document::parse(html), &ctx()).await.unwrap();
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn test_ids_are_stable() {
        assert_eq!(footnote_id("a", 1), footnote_id("a", 1));
        assert_ne!(footnote_id("a", 1), footnote_id("a", 2));
        assert_eq!(footnote_id("a", 1).len(), 10);
    }
}
