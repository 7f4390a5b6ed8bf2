//! HTML serialization for [`Document`].
//!
//! Follows the HTML fragment serialization algorithm closely enough that
//! reparsing the output yields the same tree: void elements have no end
//! tag, raw-text elements are written verbatim, and text and attribute
//! values are escaped.

use html5ever::ns;

use super::arena::{Document, NodeData, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Escape text for use in HTML element content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for use in a double-quoted attribute value.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

impl Document {
    /// Serialize the content of `<body>`: the canonical string form of a
    /// document throughout the crate.
    pub fn to_html(&self) -> String {
        self.inner_html(self.body())
    }

    /// Serialize the children of a node.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self.tag(id).is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t));
        for child in self.children(id) {
            self.write_node(child, raw, &mut out);
        }
        out
    }

    /// Serialize a node including its own tags.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .tag(self.parent(id))
            .is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t));
        self.write_node(id, raw, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, raw_parent: bool, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.data {
            NodeData::Document => {
                for child in self.children(id) {
                    self.write_node(child, false, out);
                }
            }
            NodeData::Text(text) => {
                if raw_parent {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Doctype { name, .. } => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Element { name, attrs, .. } => {
                let tag = name.local.as_ref();
                out.push('<');
                out.push_str(tag);
                for attr in attrs {
                    out.push(' ');
                    match &attr.name.prefix {
                        Some(prefix) => {
                            out.push_str(prefix.as_ref());
                            out.push(':');
                        }
                        None if attr.name.ns == ns!(xml) => out.push_str("xml:"),
                        None => {}
                    }
                    out.push_str(attr.name.local.as_ref());
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&attr.value));
                    out.push('"');
                }
                out.push('>');

                if name.ns == ns!(html) && is_void_element(tag) {
                    return;
                }

                let raw = name.ns == ns!(html) && RAW_TEXT_ELEMENTS.contains(&tag);
                // The parser drops one newline directly after these start tags.
                if matches!(tag, "pre" | "textarea" | "listing")
                    && let Some(first) = self.text_content(self.first_child(id))
                    && first.starts_with('\n')
                {
                    out.push('\n');
                }
                for child in self.children(id) {
                    self.write_node(child, raw, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}
