//! Approximate word counts that leave out footnotes and appendices.
//!
//! The estimate is refined in steps, keeping the best count so far:
//!
//! 1. convert to Markdown and count whitespace-separated tokens
//! 2. cut everything from the first footnote definition on, unless that
//!    would remove implausibly much of the document
//! 3. render to HTML, cut everything from the first heading mentioning an
//!    appendix, convert back to Markdown and count again

use std::sync::LazyLock;

use regex::Regex;

use crate::dispatch::Converter;
use crate::dom::Document;
use crate::envelope::ContentEnvelope;
use crate::markdown::html_to_markdown;

/// Either footnote syntax, at the start of a line: the numbered-list form
/// `1.  ^**[^](#…` written by the editor, or a `[^1]:` definition.
static FOOTNOTE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^1\. {2}\^\*\*\[\^\]\(#|^\[\^1\]:").expect("static regex")
});

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

impl Converter {
    /// Estimate the number of words in a document, excluding footnotes and
    /// appendices. Never fails; the worst case is the raw token count.
    pub fn word_count(&self, envelope: &ContentEnvelope) -> usize {
        let markdown = self.to_markdown(envelope);
        let best = count_words(&markdown);
        if best == 0 {
            return 0;
        }

        let without_footnotes = match FOOTNOTE_START.find(&markdown) {
            Some(found) => &markdown[..found.start()],
            None => markdown.as_str(),
        };
        let count = count_words(without_footnotes);
        let threshold = best as f64 * self.config().footnote_guard_ratio;
        if (count as f64) < threshold {
            tracing::warn!(
                before = best,
                after = count,
                "footnote removal dropped too many words, keeping full count"
            );
            return best;
        }

        let html = self.markdown_to_html(without_footnotes);
        let mut doc = Document::parse(&html);
        if !strip_appendix(&mut doc) {
            tracing::debug!(words = count, "no appendix heading found");
        }
        count_words(&html_to_markdown(&doc.to_html()))
    }
}

/// Remove the first heading whose text mentions an appendix, together with
/// everything after it. Returns false if there is no such heading.
fn strip_appendix(doc: &mut Document) -> bool {
    let body = doc.body();
    let Some(heading) = doc.descendants(body).into_iter().find(|&id| {
        doc.tag(id).is_some_and(|t| HEADINGS.contains(&t))
            && doc.text(id).to_lowercase().contains("appendix")
    }) else {
        return false;
    };

    doc.remove_following(heading);
    doc.remove(heading);
    true
}
