//! Nested lists from flat, indentation-tagged lists.
//!
//! An export never nests lists. Each indentation level is a separate
//! sibling `<ul>`/`<ol>` with a class like `lst-kix_gwukp0509sil-1`, where
//! the trailing number is the level. A run of such lists with nothing in
//! between forms one group, which is rebuilt into real nesting.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{ImportStage, StageContext};
use crate::dom::{Document, NodeId, Selector};
use crate::error::Result;

static LIST_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"lst-([a-z_0-9]+)-(\d+)").expect("static regex"));
static EXPORTED_LIST: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"ul[class*="lst-"], ol[class*="lst-"]"#).expect("static selector")
});

pub struct NestedLists;

/// Levels the editor can represent: a group starts at level 0 and goes at
/// most one level deeper per list.
///
/// ```
/// use palimpsest::import::normalize_levels;
///
/// assert_eq!(normalize_levels(&[0, 2, 1, 5, 0]), [0, 1, 1, 2, 0]);
/// ```
pub fn normalize_levels(levels: &[usize]) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::with_capacity(levels.len());
    for &level in levels {
        let level = match out.last() {
            None => 0,
            Some(&prev) => level.min(prev + 1),
        };
        out.push(level);
    }
    out
}

fn is_list(doc: &Document, id: NodeId) -> bool {
    doc.is_tag(id, "ul") || doc.is_tag(id, "ol")
}

fn list_level(doc: &Document, id: NodeId) -> Option<usize> {
    doc.element_classes(id)
        .iter()
        .filter(|c| c.starts_with("lst-"))
        .find_map(|c| LIST_CLASS.captures(c)?[2].parse().ok())
}

/// Previous sibling, ignoring whitespace-only text.
fn prev_content_sibling(doc: &Document, id: NodeId) -> NodeId {
    let mut prev = doc.prev_sibling(id);
    while doc.text_content(prev).is_some_and(|t| t.trim().is_empty()) {
        prev = doc.prev_sibling(prev);
    }
    prev
}

fn list_groups(doc: &Document) -> Vec<Vec<(NodeId, usize)>> {
    let mut groups: Vec<Vec<(NodeId, usize)>> = Vec::new();
    let mut last_list = NodeId::NONE;

    for list in doc.select_within(doc.body(), &EXPORTED_LIST) {
        let continues = last_list.is_some() && prev_content_sibling(doc, list) == last_list;
        if !continues {
            groups.push(Vec::new());
        }
        last_list = list;

        if let (Some(level), Some(group)) = (list_level(doc, list), groups.last_mut()) {
            group.push((list, level));
        }
    }
    groups.retain(|g| !g.is_empty());
    groups
}

fn nest_group(doc: &mut Document, group: &[(NodeId, usize)]) {
    let raw: Vec<usize> = group.iter().map(|&(_, level)| level).collect();
    let levels = normalize_levels(&raw);

    for i in 1..group.len() {
        let (list, level) = (group[i].0, levels[i]);
        let (prev, prev_level) = (group[i - 1].0, levels[i - 1]);

        if level == prev_level + 1 {
            let last_item = doc.last_element_child(prev);
            if doc.is_tag(last_item, "li") {
                doc.append(last_item, list);
            }
        } else {
            let mut ancestor = prev;
            for _ in 0..prev_level - level {
                match doc.closest(doc.parent(ancestor), is_list) {
                    Some(outer) => ancestor = outer,
                    None => break,
                }
            }
            doc.detach(list);
            doc.insert_after(ancestor, list);
        }
    }
}

#[async_trait]
impl ImportStage for NestedLists {
    fn name(&self) -> &'static str {
        "nested-lists"
    }

    async fn apply(&self, mut doc: Document, _ctx: &StageContext) -> Result<Document> {
        for group in list_groups(&doc) {
            nest_group(&mut doc, &group);
        }
        Ok(doc)
    }
}
