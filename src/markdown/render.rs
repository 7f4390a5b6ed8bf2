//! Markdown → HTML rendering.
//!
//! Built on `pulldown-cmark`'s event stream. The parser's events are
//! rewritten before they reach the HTML writer:
//!
//! - bare URLs and `www.` hosts in text become links
//! - `~x~` / `^x^` inside words become `<sub>` / `<sup>`
//! - `$x$` / `$$x$$` become `math-tex` spans holding `\(x\)` / `\[x\]`
//! - footnote references become reference spans, and definitions are
//!   pulled out of the flow and written as one footnote section at the end
//!
//! Container syntax (`::: spoiler`, `+++ Title`) is expanded beforehand by
//! [`super::containers`].

use std::sync::LazyLock;

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream, html};
use regex::Regex;

use crate::config::ConversionConfig;
use crate::dom::{Document, escape_text};
use crate::footnotes;

use super::containers::expand_containers;

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:https?://|www\.)[^\s<>"'`]+"#).expect("static regex")
});

/// Render Markdown with the default configuration.
pub fn markdown_to_html(markdown: &str) -> String {
    MarkdownRenderer::default().render(markdown)
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_MATH
        | Options::ENABLE_SUPERSCRIPT
        | Options::ENABLE_SUBSCRIPT
}

/// Markdown renderer with the site's extensions.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    spoiler_class: String,
    linkify: bool,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(&ConversionConfig::default())
    }
}

impl MarkdownRenderer {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            spoiler_class: config.spoiler_class.clone(),
            linkify: true,
        }
    }

    /// Turn bare URL autodetection on or off.
    pub fn with_linkify(mut self, linkify: bool) -> Self {
        self.linkify = linkify;
        self
    }

    /// Render `markdown` to an HTML fragment with empty leading and
    /// trailing paragraphs removed.
    pub fn render(&self, markdown: &str) -> String {
        let source = expand_containers(markdown, &self.spoiler_class);
        let parser = TextMergeStream::new(Parser::new_ext(&source, options()));

        let mut body: Vec<Event<'_>> = Vec::new();
        let mut notes = FootnoteCollector::default();
        let mut definition: Option<(String, Vec<Event<'_>>)> = None;
        let mut link_depth = 0usize;
        let mut code_depth = 0usize;

        for event in parser {
            match event {
                Event::Start(Tag::FootnoteDefinition(label)) => {
                    definition = Some((label.to_string(), Vec::new()));
                    continue;
                }
                Event::End(TagEnd::FootnoteDefinition) => {
                    if let Some((label, events)) = definition.take() {
                        notes.define(label, events);
                    }
                    continue;
                }
                _ => {}
            }

            let target = match definition.as_mut() {
                Some((_, events)) => events,
                None => &mut body,
            };

            match event {
                Event::Start(tag @ (Tag::Link { .. } | Tag::Image { .. })) => {
                    link_depth += 1;
                    target.push(Event::Start(tag));
                }
                Event::End(end @ (TagEnd::Link | TagEnd::Image)) => {
                    link_depth = link_depth.saturating_sub(1);
                    target.push(Event::End(end));
                }
                Event::Start(tag @ Tag::CodeBlock(_)) => {
                    code_depth += 1;
                    target.push(Event::Start(tag));
                }
                Event::End(TagEnd::CodeBlock) => {
                    code_depth = code_depth.saturating_sub(1);
                    target.push(Event::End(TagEnd::CodeBlock));
                }
                Event::Text(text) if code_depth == 0 => {
                    push_text(text, self.linkify && link_depth == 0, target);
                }
                Event::InlineMath(source) => {
                    target.push(math_span(&source, false));
                }
                Event::DisplayMath(source) => {
                    target.push(math_span(&source, true));
                }
                Event::FootnoteReference(label) => {
                    let index = notes.reference(&label);
                    target.push(Event::InlineHtml(CowStr::from(footnotes::reference_html(
                        &label, index,
                    ))));
                }
                other => target.push(other),
            }
        }

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, body.into_iter());
        out.push_str(&notes.render());

        let mut doc = Document::parse(&out);
        doc.trim_empty_edges();
        doc.to_html()
    }
}

fn math_span(source: &str, display: bool) -> Event<'static> {
    let (open, close) = if display { (r"\[", r"\]") } else { (r"\(", r"\)") };
    Event::InlineHtml(CowStr::from(format!(
        r#"<span class="math-tex">{open}{}{close}</span>"#,
        escape_text(source)
    )))
}

/// Push a text event, expanding the sub/superscript markers the parser
/// leaves alone inside words and optionally autolinking.
fn push_text<'a>(text: CowStr<'a>, autolink: bool, out: &mut Vec<Event<'a>>) {
    let emit = |piece: CowStr<'a>, out: &mut Vec<Event<'a>>| {
        if autolink {
            linkify(piece, out);
        } else {
            out.push(Event::Text(piece));
        }
    };

    if !text.contains(['~', '^']) {
        emit(text, out);
        return;
    }

    let mut last = 0;
    let mut i = 0;
    let bytes = text.as_bytes();
    while i < bytes.len() {
        let marker = bytes[i];
        if marker != b'~' && marker != b'^' {
            i += 1;
            continue;
        }
        // A doubled marker never opens a script.
        if bytes.get(i + 1) == Some(&marker) {
            i += 2;
            continue;
        }
        let Some(close) = script_end(&text, i) else {
            i += 1;
            continue;
        };
        if i > last {
            emit(CowStr::from(text[last..i].to_string()), out);
        }
        let tag = if marker == b'~' { "sub" } else { "sup" };
        out.push(Event::InlineHtml(CowStr::from(format!("<{tag}>"))));
        out.push(Event::Text(CowStr::from(text[i + 1..close].to_string())));
        out.push(Event::InlineHtml(CowStr::from(format!("</{tag}>"))));
        i = close + 1;
        last = i;
    }
    if last == 0 {
        emit(text, out);
    } else if last < text.len() {
        emit(CowStr::from(text[last..].to_string()), out);
    }
}

/// Byte index of the marker closing the script opened at `open`. The
/// content must be non-empty and free of whitespace.
fn script_end(text: &str, open: usize) -> Option<usize> {
    let marker = char::from(text.as_bytes()[open]);
    for (offset, c) in text[open + 1..].char_indices() {
        if c == marker {
            let close = open + 1 + offset;
            let doubled = text[close + 1..].starts_with(marker);
            return (offset > 0 && !doubled).then_some(close);
        }
        if c.is_whitespace() {
            return None;
        }
    }
    None
}

/// Split a text event around bare URLs, emitting autolinks.
fn linkify<'a>(text: CowStr<'a>, out: &mut Vec<Event<'a>>) {
    if !text.contains("://") && !text.contains("www.") {
        out.push(Event::Text(text));
        return;
    }

    let mut last = 0;
    for found in BARE_URL.find_iter(&text) {
        let url = trim_url(found.as_str());
        let dest = match url.strip_prefix("www.") {
            // A `www.` host needs at least one more label.
            Some(host) if !host.contains('.') => continue,
            Some(_) => format!("http://{url}"),
            None if url.is_empty() => continue,
            None => url.to_string(),
        };
        let start = found.start();
        if start > last {
            out.push(Event::Text(CowStr::from(text[last..start].to_string())));
        }
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(dest),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        out.push(Event::Text(CowStr::from(url.to_string())));
        out.push(Event::End(TagEnd::Link));
        last = start + url.len();
    }
    if last == 0 {
        out.push(Event::Text(text));
    } else if last < text.len() {
        out.push(Event::Text(CowStr::from(text[last..].to_string())));
    }
}

/// Drop trailing punctuation that usually ends the sentence rather than
/// the URL. A closing paren is kept when it balances one in the URL.
fn trim_url(url: &str) -> &str {
    let mut end = url.len();
    while let Some(c) = url[..end].chars().next_back() {
        let strip = match c {
            '.' | ',' | ';' | ':' | '!' | '?' => true,
            ')' => {
                let candidate = &url[..end];
                candidate.matches('(').count() < candidate.matches(')').count()
            }
            _ => false,
        };
        if !strip {
            break;
        }
        end -= c.len_utf8();
    }
    &url[..end]
}

/// Footnote definitions pulled out of the event stream, numbered by first
/// reference.
#[derive(Default)]
struct FootnoteCollector<'a> {
    referenced: Vec<String>,
    definitions: Vec<(String, Vec<Event<'a>>)>,
}

impl<'a> FootnoteCollector<'a> {
    fn reference(&mut self, label: &str) -> usize {
        match self.referenced.iter().position(|l| l == label) {
            Some(pos) => pos + 1,
            None => {
                self.referenced.push(label.to_string());
                self.referenced.len()
            }
        }
    }

    fn define(&mut self, label: String, events: Vec<Event<'a>>) {
        if !self.definitions.iter().any(|(l, _)| *l == label) {
            self.definitions.push((label, events));
        }
    }

    fn render(mut self) -> String {
        if self.definitions.is_empty() {
            return String::new();
        }

        let mut order = self.referenced.clone();
        for (label, _) in &self.definitions {
            if !order.contains(label) {
                order.push(label.clone());
            }
        }

        let mut out = String::from(footnotes::SECTION_OPEN);
        for (i, label) in order.iter().enumerate() {
            let Some(pos) = self.definitions.iter().position(|(l, _)| l == label) else {
                continue;
            };
            let (_, events) = self.definitions.swap_remove(pos);
            let mut content = String::new();
            html::push_html(&mut content, events.into_iter());
            out.push_str(&footnotes::item_html(label, i + 1, content.trim()));
        }
        out.push_str(footnotes::SECTION_CLOSE);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_paragraph() {
        assert_eq!(markdown_to_html("hello *world*"), "<p>hello <em>world</em></p>");
    }

    #[test]
    fn test_sub_and_superscript() {
        assert_eq!(
            markdown_to_html("H~2~O and x^2^"),
            "<p>H<sub>2</sub>O and x<sup>2</sup></p>"
        );
    }

    #[test]
    fn test_intraword_scripts() {
        assert_eq!(markdown_to_html("H~2~O"), "<p>H<sub>2</sub>O</p>");
        assert_eq!(markdown_to_html("x^2^"), "<p>x<sup>2</sup></p>");
        assert_eq!(markdown_to_html("*CO~2~*"), "<p><em>CO<sub>2</sub></em></p>");
    }

    #[test]
    fn test_scripts_need_unbroken_content() {
        assert_eq!(markdown_to_html("~5 to ~10"), "<p>~5 to ~10</p>");
        assert_eq!(markdown_to_html("2 ^ 3 and 4 ^ 5"), "<p>2 ^ 3 and 4 ^ 5</p>");
        assert_eq!(markdown_to_html("x^^"), "<p>x^^</p>");
    }

    #[test]
    fn test_strikethrough() {
        assert_eq!(markdown_to_html("~~gone~~"), "<p><del>gone</del></p>");
    }

    #[test]
    fn test_inline_math() {
        assert_eq!(
            markdown_to_html("area $\\pi r^2$ here"),
            r#"<p>area <span class="math-tex">\(\pi r^2\)</span> here</p>"#
        );
    }

    #[test]
    fn test_display_math() {
        let html = markdown_to_html("$$x < y$$");
        assert_eq!(html, r#"<p><span class="math-tex">\[x &lt; y\]</span></p>"#);
    }

    #[test]
    fn test_linkify() {
        assert_eq!(
            markdown_to_html("see https://example.com/a."),
            r#"<p>see <a href="https://example.com/a">https://example.com/a</a>.</p>"#
        );
    }

    #[test]
    fn test_linkify_www_host() {
        assert_eq!(
            markdown_to_html("go to www.example.com/docs, then"),
            r#"<p>go to <a href="http://www.example.com/docs">www.example.com/docs</a>, then</p>"#
        );
        assert_eq!(markdown_to_html("www. alone"), "<p>www. alone</p>");
    }

    #[test]
    fn test_no_linkify_inside_links_or_code() {
        assert_eq!(
            markdown_to_html("[https://a.com](https://b.com) `https://c.com`"),
            r#"<p><a href="https://b.com">https://a.com</a> <code>https://c.com</code></p>"#
        );
    }

    #[test]
    fn test_trim_url() {
        assert_eq!(trim_url("https://e.com/x),"), "https://e.com/x");
        assert_eq!(trim_url("https://e.com/wiki/A_(b)"), "https://e.com/wiki/A_(b)");
    }

    #[test]
    fn test_footnotes_collected_at_end() {
        let html = markdown_to_html("Text[^a] more[^b]\n\n[^b]: Second\n\n[^a]: First\n");
        let doc = Document::parse(&html);
        let refs = doc.query("span.footnote-reference").unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(doc.get_attr(refs[0], "data-footnote-id"), Some("a"));
        assert_eq!(doc.get_attr(refs[0], "data-footnote-index"), Some("1"));

        let items = doc.query("ol.footnote-section > li.footnote-item").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(doc.get_attr(items[0], "data-footnote-id"), Some("a"));
        let contents = doc.query(".footnote-content").unwrap();
        assert_eq!(doc.text(contents[0]), "First");
        assert_eq!(doc.text(contents[1]), "Second");
    }

    #[test]
    fn test_spoiler_container() {
        let html = markdown_to_html("::: spoiler\nhidden\n:::");
        let doc = Document::parse(&html);
        let inner = doc.query("div.spoiler-v2 > p").unwrap();
        assert_eq!(doc.text(inner[0]), "hidden");
    }

    #[test]
    fn test_details_container() {
        let html = markdown_to_html("+++ More\nbody\n+++");
        let doc = Document::parse(&html);
        let title = doc.query(".detailsBlock > .detailsBlockTitle").unwrap();
        assert_eq!(doc.text(title[0]), "More");
        let body = doc.query(".detailsBlockContent > p").unwrap();
        assert_eq!(doc.text(body[0]), "body");
    }

    #[test]
    fn test_table() {
        let html = markdown_to_html("| a | b |\n| --- | --- |\n| 1 | 2 |");
        let doc = Document::parse(&html);
        assert_eq!(doc.query("table td").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_edges_trimmed() {
        assert_eq!(markdown_to_html("<p></p>\n\ntext\n\n<br>"), "<p>text</p>");
    }
}
