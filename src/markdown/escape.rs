//! Markdown escaping utilities.
//!
//! These functions handle escaping special Markdown characters and calculating
//! appropriate fence/tick lengths for code blocks and inline code.

use std::sync::LazyLock;

use regex::Regex;

static ESCAPED_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"\\([ \\!"#$%&'()*+,./:;<=>?@\[\]^_`{|}~-])"##).expect("static regex")
});

/// Escape special Markdown characters in text.
///
/// Besides the CommonMark specials (`\`, `*`, `_`, `[`, `]`, `` ` ``, `<`,
/// `>`, `|`, `!` before `[`), this escapes the characters that the renderer's
/// extensions give meaning to: `~` and `^` (sub/superscript) and `$` (math).
/// Block markers (`#`, `-`, `+`, `=`, `1.`) are escaped only at line start.
///
/// # Examples
///
/// ```
/// use palimpsest::markdown::escape_markdown;
///
/// assert_eq!(escape_markdown("*bold*"), "\\*bold\\*");
/// assert_eq!(escape_markdown("costs $5"), "costs \\$5");
/// ```
pub fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 10);
    let mut chars = text.chars().peekable();
    let mut at_line_start = true;

    while let Some(c) = chars.next() {
        match c {
            '\\' => result.push_str("\\\\"),
            '*' | '_' | '[' | ']' | '`' | '|' | '<' | '>' | '~' | '^' | '$' => {
                result.push('\\');
                result.push(c);
            }
            '#' | '-' | '+' | '=' if at_line_start => {
                result.push('\\');
                result.push(c);
            }
            '!' if chars.peek() == Some(&'[') => {
                result.push('\\');
                result.push(c);
            }
            '0'..='9' if at_line_start => {
                result.push(c);
                while let Some(&d) = chars.peek()
                    && d.is_ascii_digit()
                {
                    result.push(d);
                    chars.next();
                }
                if let Some(&next) = chars.peek()
                    && (next == '.' || next == ')')
                {
                    result.push('\\');
                    result.push(next);
                    chars.next();
                }
                at_line_start = false;
                continue;
            }
            _ => result.push(c),
        }
        at_line_start = c == '\n';
    }

    result
}

/// Remove backslash escapes in front of ASCII punctuation.
///
/// ```
/// use palimpsest::markdown::unescape_markdown;
///
/// assert_eq!(unescape_markdown(r"x\_1 \+ y\^2"), "x_1 + y^2");
/// ```
pub fn unescape_markdown(text: &str) -> String {
    ESCAPED_PUNCTUATION.replace_all(text, "$1").into_owned()
}

/// Calculate the minimum fence length needed for a code block.
///
/// Returns the smallest number of fence characters (at least 3) that
/// doesn't appear as a run in the content.
///
/// ```
/// use palimpsest::markdown::calculate_fence_length;
///
/// assert_eq!(calculate_fence_length("let x = 1;", '`'), 3);
/// assert_eq!(calculate_fence_length("```rust\ncode\n```", '`'), 4);
/// ```
pub fn calculate_fence_length(content: &str, fence_char: char) -> usize {
    longest_run(content, fence_char).max(2) + 1
}

/// Calculate the minimum backtick count needed for inline code.
///
/// ```
/// use palimpsest::markdown::calculate_inline_code_ticks;
///
/// assert_eq!(calculate_inline_code_ticks("code"), 1);
/// assert_eq!(calculate_inline_code_ticks("code with ` backtick"), 2);
/// ```
pub fn calculate_inline_code_ticks(content: &str) -> usize {
    longest_run(content, '`') + 1
}

fn longest_run(content: &str, target: char) -> usize {
    let mut max_run = 0;
    let mut current_run = 0;

    for c in content.chars() {
        if c == target {
            current_run += 1;
            max_run = max_run.max(current_run);
        } else {
            current_run = 0;
        }
    }

    max_run
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_backslash() {
        assert_eq!(escape_markdown("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_escape_emphasis() {
        assert_eq!(escape_markdown("*bold*"), "\\*bold\\*");
        assert_eq!(escape_markdown("_italic_"), "\\_italic\\_");
    }

    #[test]
    fn test_escape_heading_at_line_start() {
        assert_eq!(escape_markdown("# heading"), "\\# heading");
        assert_eq!(escape_markdown("not # heading"), "not # heading");
        assert_eq!(escape_markdown("line\n# heading"), "line\n\\# heading");
    }

    #[test]
    fn test_escape_list_markers_at_line_start() {
        assert_eq!(escape_markdown("- item"), "\\- item");
        assert_eq!(escape_markdown("1. item"), "1\\. item");
        assert_eq!(escape_markdown("2024 was"), "2024 was");
        assert_eq!(escape_markdown("a - b"), "a - b");
    }

    #[test]
    fn test_escape_extension_characters() {
        assert_eq!(escape_markdown("H~2~O x^2^"), "H\\~2\\~O x\\^2\\^");
        assert_eq!(escape_markdown("$x$"), "\\$x\\$");
    }

    #[test]
    fn test_escape_image_start() {
        assert_eq!(escape_markdown("![alt]"), "\\!\\[alt\\]");
        assert_eq!(escape_markdown("! not image"), "! not image");
    }

    #[test]
    fn test_unescape_round_trip() {
        let text = r"a*b_c [d] `e` #f ~g^ $h";
        assert_eq!(unescape_markdown(&escape_markdown(text)), text);
    }

    #[test]
    fn test_unescape_leaves_letters_alone() {
        assert_eq!(unescape_markdown(r"\alpha \( \)"), r"\alpha ( )");
    }

    #[test]
    fn test_fence_length() {
        assert_eq!(calculate_fence_length("``", '`'), 3);
        assert_eq!(calculate_fence_length("```", '`'), 4);
        assert_eq!(calculate_fence_length("`` and ```", '`'), 4);
    }

    #[test]
    fn test_inline_code_ticks() {
        assert_eq!(calculate_inline_code_ticks("`"), 2);
        assert_eq!(calculate_inline_code_ticks("``"), 3);
    }
}
