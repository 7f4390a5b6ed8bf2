//! Grouping of adjacent spoiler blocks.
//!
//! Each spoiler block is revealed separately unless it shares a wrapper with
//! its neighbours, so runs of consecutive spoiler elements are moved into a
//! single group container.

use crate::config::ConversionConfig;
use crate::dom::{Document, NodeId};

/// Wrap runs of `spoiler-v2` elements in `<div class="spoilers">`.
pub fn merge_spoilers(html: &str) -> String {
    let config = ConversionConfig::default();
    let mut doc = Document::parse(html);
    merge_spoiler_groups(&mut doc, &config.spoiler_class, &config.spoiler_group_class);
    doc.to_html()
}

/// Wrap every run of `spoiler_class` elements in a `group_class` div.
///
/// An element continues the current run only when its immediately
/// preceding sibling node (text included) carries the spoiler class.
pub fn merge_spoiler_groups(doc: &mut Document, spoiler_class: &str, group_class: &str) {
    let mut groups: Vec<Vec<NodeId>> = Vec::new();
    let mut current: Vec<NodeId> = Vec::new();

    for id in doc.descendants(doc.root()) {
        if !doc.has_class(id, spoiler_class) {
            continue;
        }
        let prev = doc.prev_sibling(id);
        let continues = prev.is_some() && doc.has_class(prev, spoiler_class);
        if !continues && !current.is_empty() {
            groups.push(std::mem::take(&mut current));
        }
        current.push(id);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    for group in groups {
        let Some(&first) = group.first() else {
            continue;
        };
        let wrapper = doc.new_element("div", &[("class", group_class)]);
        doc.insert_before(first, wrapper);
        for member in group {
            doc.append(wrapper, member);
        }
    }
}
