//! Table-of-contents extraction.
//!
//! Headings get readable anchors derived from their text. The import
//! pipeline uses these anchors to turn the opaque ids of a foreign document
//! into ids that survive later edits.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::dom::{Document, NodeId};

/// Anchors that would collide with page-level targets.
const RESERVED_ANCHORS: &[&str] = &["top", "comments"];

/// Level given to a paragraph that is entirely bold text. It sorts below
/// every real heading.
const BOLD_PARAGRAPH_LEVEL: u8 = 7;

/// One heading in a table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocSection {
    pub title: String,
    pub anchor: String,
    /// Compressed level: the highest heading level in use is 1.
    pub level: u8,
    /// The heading's `data-internal-id`, if it had one.
    pub internal_id: Option<String>,
}

/// Headings of a document, plus the document with anchors added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOfContents {
    pub html: String,
    pub sections: Vec<TocSection>,
}

impl TableOfContents {
    /// Map from internal id to readable anchor.
    pub fn readable_ids(&self) -> HashMap<String, String> {
        self.sections
            .iter()
            .filter_map(|s| Some((s.internal_id.clone()?, s.anchor.clone())))
            .collect()
    }
}

/// Builds a table of contents for a document.
pub trait TocExtractor: Send + Sync {
    fn extract(&self, doc: &Document) -> TableOfContents;
}

/// Table of contents from `h1`–`h6` and whole-paragraph bold text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingToc;

impl TocExtractor for HeadingToc {
    fn extract(&self, doc: &Document) -> TableOfContents {
        let mut doc = doc.clone();
        let mut used = HashSet::new();
        let mut sections = Vec::new();

        for id in doc.descendants(doc.body()) {
            let Some(level) = heading_level(&doc, id) else {
                continue;
            };
            let title = heading_text(&doc, id);
            if title.trim().is_empty() {
                continue;
            }
            let anchor = title_to_anchor(&title, &used);
            used.insert(anchor.clone());
            doc.set_attr(id, "id", anchor.as_str());
            sections.push(TocSection {
                internal_id: doc.get_attr(id, "data-internal-id").map(str::to_string),
                title,
                anchor,
                level,
            });
        }

        let levels: BTreeSet<u8> = sections.iter().map(|s| s.level).collect();
        for section in &mut sections {
            let rank = levels.iter().position(|&l| l == section.level).unwrap_or(0);
            section.level = rank as u8 + 1;
        }

        TableOfContents {
            html: doc.to_html(),
            sections,
        }
    }
}

fn heading_level(doc: &Document, id: NodeId) -> Option<u8> {
    match doc.tag(id)? {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        "p" if is_bold_paragraph(doc, id) => Some(BOLD_PARAGRAPH_LEVEL),
        _ => None,
    }
}

/// A paragraph whose only content is one `<strong>` or `<b>`.
fn is_bold_paragraph(doc: &Document, id: NodeId) -> bool {
    let mut content = doc
        .children(id)
        .filter(|&c| doc.text_content(c).is_none_or(|t| !t.trim().is_empty()));
    match (content.next(), content.next()) {
        (Some(only), None) => doc.is_tag(only, "strong") || doc.is_tag(only, "b"),
        _ => false,
    }
}

fn heading_text(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    for node in doc.descendants(id) {
        if doc.ancestors(node).take_while(|&a| a != id).any(|a| doc.is_tag(a, "style")) {
            continue;
        }
        if let Some(text) = doc.text_content(node) {
            out.push_str(text);
        }
    }
    out
}

/// Turn heading text into an anchor that is unique among `used`.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`. Taken or reserved
/// anchors get the smallest free numeric suffix.
///
/// ```
/// use std::collections::HashSet;
/// use palimpsest::toc::title_to_anchor;
///
/// let mut used = HashSet::new();
/// assert_eq!(title_to_anchor("My Idea!", &used), "My_Idea_");
/// used.insert("My_Idea_".to_string());
/// assert_eq!(title_to_anchor("My Idea!", &used), "My_Idea_1");
/// assert_eq!(title_to_anchor("top", &used), "top1");
/// ```
pub fn title_to_anchor(title: &str, used: &HashSet<String>) -> String {
    let anchor: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if !used.contains(&anchor) && !RESERVED_ANCHORS.contains(&anchor.as_str()) {
        return anchor;
    }
    (1..)
        .map(|n| format!("{anchor}{n}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or(anchor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> TableOfContents {
        HeadingToc.extract(&Document::parse(html))
    }

    #[test]
    fn test_anchor_characters() {
        assert_eq!(title_to_anchor("Hello, World", &HashSet::new()), "Hello__World");
        assert_eq!(title_to_anchor("a_b-c", &HashSet::new()), "a_b_c");
    }

    #[test]
    fn test_reserved_anchor() {
        assert_eq!(title_to_anchor("comments", &HashSet::new()), "comments1");
    }

    #[test]
    fn test_sections_and_levels() {
        let toc = extract("<h1>Intro</h1><p>x</p><h3>Detail</h3><h3>Detail</h3>");
        let anchors: Vec<_> = toc.sections.iter().map(|s| s.anchor.as_str()).collect();
        assert_eq!(anchors, ["Intro", "Detail", "Detail1"]);
        let levels: Vec<_> = toc.sections.iter().map(|s| s.level).collect();
        assert_eq!(levels, [1, 2, 2]);
        assert!(toc.html.contains(r#"<h3 id="Detail1">Detail</h3>"#));
    }

    #[test]
    fn test_empty_headings_skipped() {
        let toc = extract("<h2> </h2><h2>Real</h2>");
        assert_eq!(toc.sections.len(), 1);
        assert_eq!(toc.sections[0].level, 1);
    }

    #[test]
    fn test_bold_paragraph_is_lowest_level() {
        let toc = extract("<h2>Part</h2><p><strong>Aside</strong></p><p><strong>a</strong> b</p>");
        let found: Vec<_> = toc.sections.iter().map(|s| (s.title.as_str(), s.level)).collect();
        assert_eq!(found, [("Part", 1), ("Aside", 2)]);
    }

    #[test]
    fn test_style_text_ignored() {
        let toc = extract("<h1><style>.x{}</style>Title</h1>");
        assert_eq!(toc.sections[0].title, "Title");
    }

    #[test]
    fn test_readable_ids() {
        let toc = extract(r#"<h1 data-internal-id="h.abc">Start Here</h1><h2>Other</h2>"#);
        let ids = toc.readable_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids["h.abc"], "Start_Here");
    }
}
