//! End-to-end conversions through the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use palimpsest::dom::Document;
use palimpsest::markdown::{html_to_markdown, markdown_to_html};
use palimpsest::math::{Formula, FormulaError, MathEngine};
use palimpsest::spoilers::merge_spoilers;
use palimpsest::{ContentEnvelope, ContentFormat, ConversionConfig, Converter, HtmlOptions, truncate_html};

const ESSAY: &str = include_str!("fixtures/essay.md");

fn words(html: &str) -> Vec<String> {
    let doc = Document::parse(html);
    doc.descendants(doc.body())
        .into_iter()
        .filter_map(|id| doc.text_content(id))
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect()
}

/// Engine that never answers in time.
struct SlowEngine;

#[async_trait]
impl MathEngine for SlowEngine {
    async fn typeset(&self, formulas: Vec<Formula>) -> Vec<Result<String, FormulaError>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        formulas.into_iter().map(|f| Ok(f.source)).collect()
    }
}

/// Engine that rejects everything.
struct RejectingEngine;

#[async_trait]
impl MathEngine for RejectingEngine {
    async fn typeset(&self, formulas: Vec<Formula>) -> Vec<Result<String, FormulaError>> {
        formulas
            .into_iter()
            .map(|f| {
                Err(FormulaError {
                    id: f.id,
                    source: f.source,
                    errors: vec!["Undefined control sequence".to_string()],
                })
            })
            .collect()
    }
}

// ============================================================================
// Envelopes
// ============================================================================

#[test]
fn test_envelope_formats() {
    for (json, format) in [
        (r#"{"type": "html", "data": "<p>x</p>"}"#, ContentFormat::Html),
        (r#"{"type": "markdown", "data": "x"}"#, ContentFormat::Markdown),
        (r#"{"type": "ckEditorMarkup", "data": "<p>x</p>"}"#, ContentFormat::EditorMarkup),
        (r#"{"type": "draftJS", "data": {"blocks": [], "entityMap": {}}}"#, ContentFormat::Blocks),
    ] {
        assert_eq!(ContentEnvelope::from_json(json).unwrap().format(), format);
    }
}

#[test]
fn test_unknown_format_rejected() {
    let err = ContentEnvelope::from_json(r#"{"type": "rtf", "data": "x"}"#).unwrap_err();
    assert!(err.to_string().contains("rtf"));
}

#[test]
fn test_block_data_as_json_string() {
    let json = r#"{"type": "draftJS", "data": "{\"blocks\": [{\"key\": \"a\", \"text\": \"quoted\", \"type\": \"blockquote\"}], \"entityMap\": {}}"}"#;
    let envelope = ContentEnvelope::from_json(json).unwrap();
    assert_eq!(Converter::default().to_markdown(&envelope), "> quoted");
}

// ============================================================================
// Markdown and HTML
// ============================================================================

#[test]
fn test_html_markdown_html_keeps_words() {
    let html = concat!(
        "<h2>Heading</h2>",
        "<p>One <strong>two</strong> <em>three</em> <a href=\"https://example.com\">four</a></p>",
        "<ul><li>five</li><li>six <code>seven</code></li></ul>",
        "<blockquote><p>eight nine</p></blockquote>",
    );
    let back = markdown_to_html(&html_to_markdown(html));
    assert_eq!(words(&back), words(html));
}

#[test]
fn test_sub_and_superscript_survive_markdown() {
    let html = "<p>H<sub>2</sub>O and x<sup>2</sup></p>";
    let markdown = html_to_markdown(html);
    assert_eq!(markdown, "H~2~O and x^2^");
    assert_eq!(markdown_to_html(&markdown), html);
}

#[test]
fn test_essay_renders_every_construct() {
    let html = markdown_to_html(ESSAY);
    let doc = Document::parse(&html);

    assert_eq!(doc.elements_by_tag("h2").len(), 2);
    assert_eq!(doc.elements_by_tag("table").len(), 1);
    assert!(!doc.query("div.spoiler-v2").unwrap().is_empty());
    assert!(!doc.query("div.detailsBlock > div.detailsBlockTitle").unwrap().is_empty());
    assert!(doc.query("span.math-tex").unwrap().len() >= 3);
    assert!(html.contains(r#"href="https://example.com/notes""#));
}

#[tokio::test]
async fn test_markdown_math_typeset() {
    let converter = Converter::default();
    let envelope = ContentEnvelope::Markdown("Area is $\\pi r^2$.".to_string());
    let rendering = converter.to_html_with_report(&envelope, HtmlOptions::default()).await;

    assert_eq!(rendering.report.rendered, 1);
    assert!(!rendering.report.timed_out);
    assert!(rendering.html.contains("<math"));
}

#[tokio::test]
async fn test_rejected_formula_replaced_by_message() {
    let converter = Converter::with_math_engine(ConversionConfig::default(), Arc::new(RejectingEngine));
    let envelope = ContentEnvelope::Html(r#"<p><span class="math-tex">\(\nope\)</span></p>"#.to_string());
    let rendering = converter.to_html_with_report(&envelope, HtmlOptions::default()).await;

    assert_eq!(rendering.report.errors.len(), 1);
    assert!(rendering.html.contains(r"Invalid LaTeX $\nope: Undefined control sequence"));
}

#[tokio::test]
async fn test_math_timeout_returns_input() {
    let config = ConversionConfig {
        math_timeout_ms: 50,
        ..ConversionConfig::default()
    };
    let converter = Converter::with_math_engine(config, Arc::new(SlowEngine));
    let html = r#"<p>before <span class="math-tex">\(x^2\)</span> after</p>"#;
    let rendering = converter
        .to_html_with_report(&ContentEnvelope::Html(html.to_string()), HtmlOptions::default())
        .await;

    assert!(rendering.report.timed_out);
    assert_eq!(rendering.html, html);
}

#[tokio::test]
async fn test_skip_math_leaves_source() {
    let converter = Converter::with_math_engine(ConversionConfig::default(), Arc::new(SlowEngine));
    let options = HtmlOptions {
        skip_math: true,
        ..HtmlOptions::default()
    };
    let html = converter
        .to_html(&ContentEnvelope::Markdown("$x$".to_string()), options)
        .await;
    assert_eq!(html, r#"<p><span class="math-tex">\(x\)</span></p>"#);
}

// ============================================================================
// Spoilers and truncation
// ============================================================================

#[test]
fn test_five_adjacent_spoilers_share_one_group() {
    let html = r#"<p class="spoiler-v2">1</p>"#.repeat(5);
    let merged = merge_spoilers(&html);
    let doc = Document::parse(&merged);

    let groups = doc.query("div.spoilers").unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(doc.element_children(groups[0]).count(), 5);
}

#[test]
fn test_truncate_rendered_markdown() {
    let html = markdown_to_html("First paragraph has five words.\n\nSecond one is cut here.\n\nThird is gone.");
    let short = truncate_html(&html, 8, "…");

    assert_eq!(words(&short.replace('…', "")).len(), 8);
    assert!(short.contains("Second one is…"));
    assert!(!short.contains("Third"));
}
