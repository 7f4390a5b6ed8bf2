//! Parsed HTML documents.
//!
//! Every converter and transform in the crate works on a [`Document`]: an
//! arena DOM built by html5ever, queried with CSS selectors and written back
//! out with [`Document::to_html`].
//!
//! - [`arena`]: node storage and tree mutation
//! - [`select`]: CSS selector matching
//! - [`serialize`]: HTML output and escaping
//! - [`style`]: inline `style` attribute parsing

mod arena;
mod select;
mod serialize;
pub mod style;
mod tree_sink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

pub use arena::{Attribute, ChildrenIter, Document, Node, NodeData, NodeId, html_name};
pub use select::Selector;
pub use serialize::{escape_attr, escape_text, is_void_element};
pub use tree_sink::DocumentSink;

/// Block-level elements as far as document structure is concerned.
pub const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "dialog", "dd", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hgroup", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "ul",
];

impl Document {
    /// Parse an HTML document or fragment.
    ///
    /// Fragments are placed inside an implied `<body>`, so [`Document::to_html`]
    /// gives back the fragment.
    pub fn parse(html: &str) -> Self {
        parse_document(DocumentSink::new(), ParseOpts::default())
            .from_utf8()
            .one(html.as_bytes())
            .into_document()
    }

    /// Parse `html` and append copies of its body content to `parent`.
    /// Returns the ids of the inserted top-level nodes.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let fragment = Document::parse(html);
        let body = fragment.body();
        let mut inserted = Vec::new();
        for child in fragment.children(body) {
            let copy = self.import_node(&fragment, child);
            self.append(parent, copy);
            inserted.push(copy);
        }
        inserted
    }

    /// Parse `html` and return a detached copy of its first top-level element.
    pub fn create_from_html(&mut self, html: &str) -> NodeId {
        let fragment = Document::parse(html);
        let body = fragment.body();
        match fragment.element_children(body).next() {
            Some(first) => self.import_node(&fragment, first),
            None => NodeId::NONE,
        }
    }

    pub fn is_block(&self, id: NodeId) -> bool {
        self.tag(id).is_some_and(|t| BLOCK_TAGS.contains(&t))
    }

    /// Remove empty paragraphs, `<br>`s and blank text from the start of the
    /// body, then from the end, stopping at the first real content.
    pub fn trim_empty_edges(&mut self) {
        let body = self.body();
        loop {
            let first = self.first_child(body);
            if first.is_none() || !self.is_empty_edge(first) {
                break;
            }
            self.remove(first);
        }
        loop {
            let last = self.last_child(body);
            if last.is_none() || !self.is_empty_edge(last) {
                break;
            }
            self.remove(last);
        }
    }

    /// Remove everything that follows `id` in document order, leaving `id`
    /// and its ancestors in place.
    pub fn remove_following(&mut self, id: NodeId) {
        let body = self.body();
        let mut current = id;
        while current.is_some() && current != body {
            loop {
                let next = self.next_sibling(current);
                if next.is_none() {
                    break;
                }
                self.remove(next);
            }
            current = self.parent(current);
        }
    }

    fn is_empty_edge(&self, id: NodeId) -> bool {
        if let Some(text) = self.text_content(id) {
            return text.trim().is_empty();
        }
        match self.tag(id) {
            Some("br") => true,
            Some("p") => {
                self.text(id).trim().is_empty()
                    && self
                        .descendants(id)
                        .into_iter()
                        .all(|d| !self.is_element(d) || self.is_tag(d, "br"))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_round_trip() {
        let doc = Document::parse("<p>one</p><p>two</p>");
        assert_eq!(doc.to_html(), "<p>one</p><p>two</p>");
    }

    #[test]
    fn test_head_content_is_not_body() {
        let doc = Document::parse("<html><head><style>p{}</style></head><body><p>x</p></body></html>");
        assert_eq!(doc.to_html(), "<p>x</p>");
    }

    #[test]
    fn test_trim_empty_edges() {
        let mut doc = Document::parse("<p> </p><br>\n<p>a</p><p></p><p>b</p><p><br></p>\n");
        doc.trim_empty_edges();
        assert_eq!(doc.to_html(), "<p>a</p><p></p><p>b</p>");
    }

    #[test]
    fn test_trim_keeps_image_paragraph() {
        let mut doc = Document::parse(r#"<p><img src="a.png"></p><p></p>"#);
        doc.trim_empty_edges();
        assert_eq!(doc.to_html(), r#"<p><img src="a.png"></p>"#);
    }

    #[test]
    fn test_create_from_html() {
        let mut doc = Document::parse("<div></div>");
        let div = doc.find_by_tag("div").unwrap();
        let span = doc.create_from_html(r#"<span class="x">[1]</span>"#);
        doc.append(div, span);
        assert_eq!(doc.to_html(), r#"<div><span class="x">[1]</span></div>"#);
    }
}
