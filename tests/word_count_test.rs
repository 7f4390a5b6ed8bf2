//! Word counts across every stored format.

use palimpsest::{ContentEnvelope, Converter};

const ESSAY: &str = include_str!("fixtures/essay.md");

fn count(json: &str) -> usize {
    let envelope = ContentEnvelope::from_json(json).unwrap();
    Converter::default().word_count(&envelope)
}

#[test]
fn test_one_paragraph_in_each_format() {
    assert_eq!(
        count(r#"{"type": "html", "data": "<div><p>A sample piece of content</p></div>"}"#),
        5
    );
    assert_eq!(
        count(r#"{"type": "ckEditorMarkup", "data": "<div><p>A sample piece of content</p></div>"}"#),
        5
    );
    assert_eq!(
        count(
            r#"{"type": "draftJS", "data": {
                "blocks": [{"key": "a1", "text": "A sample piece of content", "type": "unstyled"}],
                "entityMap": {}
            }}"#
        ),
        5
    );
    assert_eq!(count(r#"{"type": "markdown", "data": "A sample piece of content"}"#), 5);
}

#[test]
fn test_out_of_range_offsets_still_count() {
    assert_eq!(
        count(
            r#"{"type": "draftJS", "data": {
                "blocks": [{"key": "a1", "text": "two words", "type": "unstyled",
                    "inlineStyleRanges": [{"offset": 18446744073709551615, "length": 2, "style": "BOLD"}],
                    "entityRanges": [{"offset": 4, "length": 18446744073709551615, "key": 0}]}],
                "entityMap": {"0": {"type": "LINK", "data": {"url": "https://example.com"}}}
            }}"#
        ),
        2
    );
}

#[test]
fn test_null_data_counts_zero() {
    assert_eq!(count(r#"{"type": "markdown", "data": null}"#), 0);
    assert_eq!(count(r#"{"type": "draftJS", "data": null}"#), 0);
}

#[test]
fn test_markdown_footnotes_not_counted() {
    let envelope = ContentEnvelope::Markdown(
        "A sample piece of content[^1] that has simple footnotes[^2]\n\n[^1]: First footnote\n\n[^2]:\n\n  Second footnote"
            .to_string(),
    );
    assert_eq!(Converter::default().word_count(&envelope), 9);
}

#[test]
fn test_appendix_not_counted() {
    let converter = Converter::default();
    let body = "Some words here.\n\nSection 1\n=========\n\nMore words.\n\n";
    let with_appendix = format!("{body}Appendix 1\n==========\n\nLorem ipsum dolor sit amet.");

    assert_eq!(
        converter.word_count(&ContentEnvelope::Markdown(body.to_string())),
        converter.word_count(&ContentEnvelope::Markdown(with_appendix))
    );
}

#[test]
fn test_essay_appendix_and_footnotes_dropped() {
    let converter = Converter::default();
    let essay = converter.word_count(&ContentEnvelope::Markdown(ESSAY.to_string()));
    let renamed = converter.word_count(&ContentEnvelope::Markdown(
        ESSAY.replace("## Appendix: terms", "## Terms"),
    ));

    assert!(essay > 100, "essay counted {essay} words");
    assert!(renamed > essay);
}
