//! Legacy block documents (the Draft.js raw content model).
//!
//! A [`BlockDocument`] is a flat list of blocks, each a line of text with a
//! type, a nesting depth and ranges of inline styles and entities. Ranges
//! are measured in UTF-16 code units, as the old editor measured them.
//!
//! Rendering goes through [`preprocess_latex`] first, then block by block:
//! consecutive code blocks share one `<pre>`, list items are nested by
//! depth, and the result is trimmed and passed through the spoiler merger.

mod latex;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConversionConfig;
use crate::dom::{Document, escape_attr, escape_text};
use crate::spoilers::merge_spoiler_groups;

pub use latex::preprocess_latex;
use latex::{MATH_BLOCK, MATH_ENTITY};

/// Inline styles in nesting order, outermost first.
const INLINE_STYLES: &[(&str, &str)] = &[
    ("BOLD", "strong"),
    ("ITALIC", "em"),
    ("UNDERLINE", "u"),
    ("STRIKETHROUGH", "s"),
    ("CODE", "code"),
    ("SUBSCRIPT", "sub"),
    ("SUPERSCRIPT", "sup"),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDocument {
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub entity_map: BTreeMap<String, Entity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Block {
    pub key: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub depth: usize,
    pub inline_style_ranges: Vec<StyleRange>,
    pub entity_ranges: Vec<EntityRange>,
    pub data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleRange {
    pub offset: usize,
    pub length: usize,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRange {
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub length: usize,
    pub key: EntityKey,
}

/// Entity map keys are strings, but ranges refer to them by number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    Index(u64),
    Name(String),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Index(i) => write!(f, "{i}"),
            EntityKey::Name(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub mutability: String,
    #[serde(default)]
    pub data: Value,
}

impl BlockDocument {
    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn entity(&self, key: &EntityKey) -> Option<&Entity> {
        self.entity_map.get(&key.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Render a block document to HTML with the default configuration.
pub fn block_doc_to_html(doc: &BlockDocument) -> String {
    block_doc_to_html_with(doc, &ConversionConfig::default())
}

pub fn block_doc_to_html_with(doc: &BlockDocument, config: &ConversionConfig) -> String {
    let doc = preprocess_latex(doc);
    let html = BlockRenderer::new(&doc, &config.spoiler_class).render();

    let mut dom = Document::parse(&html);
    dom.trim_empty_edges();
    merge_spoiler_groups(&mut dom, &config.spoiler_class, &config.spoiler_group_class);
    dom.to_html()
}

struct OpenList {
    tag: &'static str,
    item_open: bool,
}

struct BlockRenderer<'a> {
    doc: &'a BlockDocument,
    spoiler_class: &'a str,
    out: String,
    lists: Vec<OpenList>,
    code_lines: Vec<&'a str>,
}

impl<'a> BlockRenderer<'a> {
    fn new(doc: &'a BlockDocument, spoiler_class: &'a str) -> Self {
        Self {
            doc,
            spoiler_class,
            out: String::new(),
            lists: Vec::new(),
            code_lines: Vec::new(),
        }
    }

    fn render(mut self) -> String {
        for block in &self.doc.blocks {
            let kind = block.kind.as_str();
            if kind != "code-block" {
                self.flush_code();
            }
            if let Some(tag) = list_tag(kind) {
                let content = self.inline(block);
                self.push_list_item(tag, block.depth, &content);
                continue;
            }
            self.close_lists();

            match kind {
                "code-block" => self.code_lines.push(&block.text),
                "header-one" | "header-two" | "header-three" | "header-four" | "header-five"
                | "header-six" => {
                    let tag = heading_tag(kind);
                    let content = self.inline(block);
                    self.out.push_str(&format!("<{tag}>{content}</{tag}>"));
                }
                "blockquote" => {
                    let content = self.inline(block);
                    self.out.push_str(&format!("<blockquote>{content}</blockquote>"));
                }
                "atomic" => self.push_atomic(block),
                MATH_BLOCK => {
                    let tex = block.data.get("tex").and_then(Value::as_str).unwrap_or("");
                    self.out.push_str(&format!("<p>{}</p>", math_span(tex, true)));
                }
                "spoiler" => {
                    let content = self.inline(block);
                    self.out.push_str(&format!(
                        "<p class=\"{}\">{content}</p>",
                        escape_attr(self.spoiler_class)
                    ));
                }
                _ => {
                    let content = self.inline(block);
                    self.out.push_str(&format!("<p>{content}</p>"));
                }
            }
        }
        self.flush_code();
        self.close_lists();
        self.out
    }

    fn flush_code(&mut self) {
        if self.code_lines.is_empty() {
            return;
        }
        let code = self.code_lines.join("\n");
        self.out
            .push_str(&format!("<pre><code>{}</code></pre>", escape_text(&code)));
        self.code_lines.clear();
    }

    fn push_list_item(&mut self, tag: &'static str, depth: usize, content: &str) {
        // Deeper than one level below the current list means one level.
        let depth = depth.min(self.lists.len());
        while self.lists.len() > depth + 1 {
            self.close_list();
        }
        if self.lists.len() == depth + 1 && self.lists.last().is_some_and(|l| l.tag != tag) {
            self.close_list();
        }

        if self.lists.len() == depth + 1 {
            if self.lists.last().is_some_and(|l| l.item_open) {
                self.out.push_str("</li>");
            }
        } else {
            self.out.push_str(&format!("<{tag}>"));
            self.lists.push(OpenList {
                tag,
                item_open: false,
            });
        }

        self.out.push_str("<li>");
        self.out.push_str(content);
        if let Some(list) = self.lists.last_mut() {
            list.item_open = true;
        }
    }

    fn close_list(&mut self) {
        if let Some(list) = self.lists.pop() {
            if list.item_open {
                self.out.push_str("</li>");
            }
            self.out.push_str(&format!("</{}>", list.tag));
        }
    }

    fn close_lists(&mut self) {
        while !self.lists.is_empty() {
            self.close_list();
        }
    }

    fn push_atomic(&mut self, block: &Block) {
        let Some(entity) = block
            .entity_ranges
            .first()
            .and_then(|range| self.doc.entity(&range.key))
        else {
            return;
        };
        if entity.kind.eq_ignore_ascii_case("IMAGE") {
            self.out
                .push_str(&format!("<figure>{}</figure>", image_tag(&entity.data)));
        }
    }

    /// Inline markup for a block's text, styles and entities.
    fn inline(&self, block: &Block) -> String {
        let chars: Vec<char> = block.text.chars().collect();
        let mut utf16_starts = Vec::with_capacity(chars.len());
        let mut position = 0;
        for c in &chars {
            utf16_starts.push(position);
            position += c.len_utf16();
        }
        let to_char = |offset: usize| utf16_starts.partition_point(|&start| start < offset);
        let span =
            |offset: usize, length: usize| to_char(offset)..to_char(offset.saturating_add(length));

        let mut styles = vec![0u8; chars.len()];
        for range in &block.inline_style_ranges {
            let Some(bit) = INLINE_STYLES
                .iter()
                .position(|(name, _)| *name == range.style)
            else {
                continue;
            };
            for mask in &mut styles[span(range.offset, range.length)] {
                *mask |= 1 << bit;
            }
        }

        let mut entities: Vec<Option<usize>> = vec![None; chars.len()];
        for (n, range) in block.entity_ranges.iter().enumerate() {
            for slot in &mut entities[span(range.offset, range.length)] {
                *slot = Some(n);
            }
        }

        let mut out = String::new();
        let mut i = 0;
        while i < chars.len() {
            let current = entities[i];
            let mut j = i;
            while j < chars.len() && entities[j] == current {
                j += 1;
            }

            let entity = current.and_then(|n| self.doc.entity(&block.entity_ranges[n].key));
            match entity {
                Some(e) if e.kind == MATH_ENTITY => {
                    let tex = e.data.get("tex").and_then(Value::as_str).unwrap_or("");
                    let display = e.data.get("display").and_then(Value::as_bool).unwrap_or(false);
                    out.push_str(&math_span(tex, display));
                }
                Some(e) if e.kind.eq_ignore_ascii_case("IMAGE") => {
                    out.push_str(&image_tag(&e.data));
                }
                Some(e) if e.kind.eq_ignore_ascii_case("LINK") => {
                    let href = ["url", "href"]
                        .iter()
                        .find_map(|k| e.data.get(*k).and_then(Value::as_str))
                        .unwrap_or("");
                    out.push_str(&format!("<a href=\"{}\">", escape_attr(href)));
                    out.push_str(&styled_text(&chars[i..j], &styles[i..j]));
                    out.push_str("</a>");
                }
                _ => out.push_str(&styled_text(&chars[i..j], &styles[i..j])),
            }
            i = j;
        }
        out
    }
}

fn styled_text(chars: &[char], styles: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let mask = styles[i];
        let mut j = i;
        while j < chars.len() && styles[j] == mask {
            j += 1;
        }
        let tags: Vec<&str> = INLINE_STYLES
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, (_, tag))| *tag)
            .collect();

        for tag in &tags {
            out.push_str(&format!("<{tag}>"));
        }
        let text: String = chars[i..j].iter().collect();
        out.push_str(&escape_text(&text).replace('\n', "<br>"));
        for tag in tags.iter().rev() {
            out.push_str(&format!("</{tag}>"));
        }
        i = j;
    }
    out
}

fn math_span(tex: &str, display: bool) -> String {
    let (open, close) = if display { (r"\[", r"\]") } else { (r"\(", r"\)") };
    format!(
        r#"<span class="math-tex">{open}{}{close}</span>"#,
        escape_text(tex)
    )
}

fn image_tag(data: &Value) -> String {
    let src = data.get("src").and_then(Value::as_str).unwrap_or("");
    match data.get("alt").and_then(Value::as_str) {
        Some(alt) => format!("<img src=\"{}\" alt=\"{}\">", escape_attr(src), escape_attr(alt)),
        None => format!("<img src=\"{}\">", escape_attr(src)),
    }
}

fn list_tag(kind: &str) -> Option<&'static str> {
    match kind {
        "unordered-list-item" => Some("ul"),
        "ordered-list-item" => Some("ol"),
        _ => None,
    }
}

fn heading_tag(kind: &str) -> &'static str {
    match kind {
        "header-one" => "h1",
        "header-two" => "h2",
        "header-three" => "h3",
        "header-four" => "h4",
        "header-five" => "h5",
        _ => "h6",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: Value) -> String {
        block_doc_to_html(&BlockDocument::from_value(value).unwrap())
    }

    fn block(kind: &str, text: &str) -> Value {
        json!({"key": "k", "text": text, "type": kind, "depth": 0,
               "inlineStyleRanges": [], "entityRanges": [], "data": {}})
    }

    #[test]
    fn test_paragraph_with_styles() {
        let html = render(json!({
            "blocks": [{"key": "a", "text": "bold and italic", "type": "unstyled",
                "inlineStyleRanges": [
                    {"offset": 0, "length": 4, "style": "BOLD"},
                    {"offset": 9, "length": 6, "style": "ITALIC"}
                ]}],
            "entityMap": {}
        }));
        assert_eq!(html, "<p><strong>bold</strong> and <em>italic</em></p>");
    }

    #[test]
    fn test_utf16_offsets() {
        // The emoji is two UTF-16 code units.
        let html = render(json!({
            "blocks": [{"key": "a", "text": "😀 hi", "type": "unstyled",
                "inlineStyleRanges": [{"offset": 3, "length": 2, "style": "BOLD"}]}],
            "entityMap": {}
        }));
        assert_eq!(html, "<p>😀 <strong>hi</strong></p>");
    }

    #[test]
    fn test_ranges_past_end_are_clamped() {
        let html = render(json!({
            "blocks": [{"key": "a", "text": "hello", "type": "unstyled",
                "inlineStyleRanges": [
                    {"offset": u64::MAX, "length": 2, "style": "ITALIC"},
                    {"offset": 3, "length": u64::MAX, "style": "BOLD"}
                ],
                "entityRanges": [{"offset": u64::MAX, "length": u64::MAX, "key": 0}]}],
            "entityMap": {"0": {"type": "LINK", "data": {"url": "https://example.com"}}}
        }));
        assert_eq!(html, "<p>hel<strong>lo</strong></p>");
    }

    #[test]
    fn test_link_entity() {
        let html = render(json!({
            "blocks": [{"key": "a", "text": "see here", "type": "unstyled",
                "entityRanges": [{"offset": 4, "length": 4, "key": 0}]}],
            "entityMap": {"0": {"type": "LINK", "mutability": "MUTABLE",
                "data": {"url": "https://example.com/?a=1&b=2"}}}
        }));
        assert_eq!(
            html,
            r#"<p>see <a href="https://example.com/?a=1&amp;b=2">here</a></p>"#
        );
    }

    #[test]
    fn test_headings_and_quote() {
        let html = render(json!({
            "blocks": [block("header-two", "Title"), block("blockquote", "quoted")],
            "entityMap": {}
        }));
        assert_eq!(html, "<h2>Title</h2><blockquote>quoted</blockquote>");
    }

    #[test]
    fn test_code_blocks_merged() {
        let html = render(json!({
            "blocks": [block("code-block", "a < b"), block("code-block", "c"), block("unstyled", "d")],
            "entityMap": {}
        }));
        assert_eq!(html, "<pre><code>a &lt; b\nc</code></pre><p>d</p>");
    }

    #[test]
    fn test_nested_lists() {
        let mut nested = block("unordered-list-item", "b");
        nested["depth"] = json!(1);
        let html = render(json!({
            "blocks": [
                block("unordered-list-item", "a"),
                nested,
                block("unordered-list-item", "c"),
                block("ordered-list-item", "d")
            ],
            "entityMap": {}
        }));
        assert_eq!(
            html,
            "<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul><ol><li>d</li></ol>"
        );
    }

    #[test]
    fn test_inline_and_display_math() {
        let html = render(json!({
            "blocks": [
                {"key": "a", "text": "x is  ", "type": "unstyled",
                 "entityRanges": [{"offset": 5, "length": 1, "key": 0}]},
                {"key": "b", "text": " ", "type": "atomic", "data": {"mathjax": true, "teX": "y<1"}}
            ],
            "entityMap": {"0": {"type": "INLINETEX", "data": {"teX": "x"}}}
        }));
        assert_eq!(
            html,
            concat!(
                r#"<p>x is <span class="math-tex">\(x\)</span></p>"#,
                r#"<p><span class="math-tex">\[y&lt;1\]</span></p>"#
            )
        );
    }

    #[test]
    fn test_atomic_image() {
        let html = render(json!({
            "blocks": [{"key": "a", "text": " ", "type": "atomic",
                "entityRanges": [{"offset": 0, "length": 1, "key": 0}]}],
            "entityMap": {"0": {"type": "IMAGE", "data": {"src": "https://e.com/a.png"}}}
        }));
        assert_eq!(html, r#"<figure><img src="https://e.com/a.png"></figure>"#);
    }

    #[test]
    fn test_soft_newline_and_trim() {
        let html = render(json!({
            "blocks": [block("unstyled", ""), block("unstyled", "a\nb"), block("unstyled", "")],
            "entityMap": {}
        }));
        assert_eq!(html, "<p>a<br>b</p>");
    }

    #[test]
    fn test_spoiler_blocks_grouped() {
        let html = render(json!({
            "blocks": [block("spoiler", "a"), block("spoiler", "b")],
            "entityMap": {}
        }));
        assert_eq!(
            html,
            r#"<div class="spoilers"><p class="spoiler-v2">a</p><p class="spoiler-v2">b</p></div>"#
        );
    }
}
