//! Word-based truncation for plain text and HTML previews.

use crate::dom::Document;

/// Byte offset just past the `n`th whitespace-separated word of `text`,
/// or `None` if it has fewer words.
fn word_end(text: &str, n: usize) -> Option<usize> {
    if n == 0 {
        return Some(0);
    }
    let mut seen = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                seen += 1;
                if seen == n {
                    return Some(i);
                }
            }
            in_word = false;
        } else {
            in_word = true;
        }
    }
    (in_word && seen + 1 == n).then_some(text.len())
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keep the first `max_words` words of `text` and append `suffix`. Text
/// that already fits is returned unchanged.
pub fn truncate_words(text: &str, max_words: usize, suffix: &str) -> String {
    if word_count(text) <= max_words {
        return text.to_string();
    }
    let end = word_end(text, max_words).unwrap_or(text.len());
    format!("{}{suffix}", &text[..end])
}

/// Keep the first `max_words` words of an HTML fragment. Everything after
/// the cut is removed, open elements are closed, and `suffix` is placed at
/// the end of the innermost block that was cut.
pub fn truncate_html(html: &str, max_words: usize, suffix: &str) -> String {
    let mut doc = Document::parse(html);
    let body = doc.body();
    let texts: Vec<_> = doc
        .descendants(body)
        .into_iter()
        .filter(|&id| doc.is_text(id))
        .collect();

    let total: usize = texts
        .iter()
        .map(|&id| doc.text_content(id).map_or(0, word_count))
        .sum();
    if total <= max_words {
        return html.to_string();
    }

    let mut seen = 0;
    for id in texts {
        let text = doc.text_content(id).unwrap_or_default().to_string();
        let words = word_count(&text);
        if seen + words < max_words {
            seen += words;
            continue;
        }

        let end = word_end(&text, max_words - seen).unwrap_or(text.len());
        doc.set_text(id, &text[..end]);
        doc.remove_following(id);

        let block = doc
            .ancestors(id)
            .find(|&a| a == body || doc.is_block(a))
            .unwrap_or(body);
        doc.append_text(block, suffix);
        break;
    }
    doc.to_html()
}
