//! Block container syntax, expanded to raw HTML before parsing.
//!
//! ```text
//! ::: spoiler        +++ Title
//! hidden text        body
//! :::                +++
//! ```
//!
//! Markdown between the opening and closing lines is still parsed, since
//! each raw HTML line is followed by a blank line.

use crate::dom::escape_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Spoiler,
    Details,
}

/// Replace container fences with HTML wrappers. Lines inside fenced code
/// blocks are left alone; containers left open are closed at the end.
pub(crate) fn expand_containers(markdown: &str, spoiler_class: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut open: Vec<Container> = Vec::new();
    let mut code_fence: Option<(char, usize)> = None;

    for line in markdown.lines() {
        let trimmed = line.trim();

        if let Some((fence_char, len)) = code_fence {
            if trimmed.len() >= len && trimmed.chars().all(|c| c == fence_char) {
                code_fence = None;
            }
            out.push_str(line);
            out.push('\n');
            continue;
        }
        if let Some(fence) = fence_marker(trimmed) {
            code_fence = Some(fence);
            out.push_str(line);
            out.push('\n');
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix(":::") {
            let name = rest.trim();
            if name == "spoiler" {
                open.push(Container::Spoiler);
                out.push_str(&format!("<div class=\"{}\">\n\n", escape_text(spoiler_class)));
                continue;
            }
            if name.is_empty() && close(&mut open, Container::Spoiler, &mut out) {
                continue;
            }
        }

        if let Some(rest) = trimmed.strip_prefix("+++") {
            let title = rest.trim();
            if !title.is_empty() {
                open.push(Container::Details);
                out.push_str(&format!(
                    "<div class=\"detailsBlock\"><div class=\"detailsBlockTitle\">{}</div><div class=\"detailsBlockContent\">\n\n",
                    escape_text(title)
                ));
                continue;
            }
            if close(&mut open, Container::Details, &mut out) {
                continue;
            }
        }

        out.push_str(line);
        out.push('\n');
    }

    while let Some(container) = open.pop() {
        push_close(container, &mut out);
    }
    out
}

/// Close the innermost container of `kind`, along with anything opened
/// after it. Returns false if no such container is open.
fn close(open: &mut Vec<Container>, kind: Container, out: &mut String) -> bool {
    let Some(position) = open.iter().rposition(|&c| c == kind) else {
        return false;
    };
    while open.len() > position {
        if let Some(container) = open.pop() {
            push_close(container, out);
        }
    }
    true
}

fn push_close(container: Container, out: &mut String) {
    match container {
        Container::Spoiler => out.push_str("\n</div>\n\n"),
        Container::Details => out.push_str("\n</div></div>\n\n"),
    }
}

fn fence_marker(line: &str) -> Option<(char, usize)> {
    ['`', '~'].into_iter().find_map(|fence_char| {
        let run = line.chars().take_while(|&c| c == fence_char).count();
        (run >= 3).then_some((fence_char, run))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spoiler_container() {
        let out = expand_containers("::: spoiler\nsecret\n:::\nafter", "spoiler-v2");
        assert_eq!(out, "<div class=\"spoiler-v2\">\n\nsecret\n\n</div>\n\nafter\n");
    }

    #[test]
    fn test_details_container() {
        let out = expand_containers("+++ A <b>\nbody\n+++", "spoiler-v2");
        assert!(out.starts_with(
            "<div class=\"detailsBlock\"><div class=\"detailsBlockTitle\">A &lt;b&gt;</div>"
        ));
        assert!(out.ends_with("body\n\n</div></div>\n\n"));
    }

    #[test]
    fn test_unclosed_container_closed_at_end() {
        let out = expand_containers("::: spoiler\nsecret", "spoiler-v2");
        assert!(out.ends_with("</div>\n\n"));
    }

    #[test]
    fn test_fenced_code_untouched() {
        let src = "```\n::: spoiler\n```";
        assert_eq!(expand_containers(src, "spoiler-v2"), "```\n::: spoiler\n```\n");
    }

    #[test]
    fn test_stray_closer_kept() {
        assert_eq!(expand_containers(":::", "spoiler-v2"), ":::\n");
    }
}
