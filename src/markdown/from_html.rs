//! HTML → Markdown conversion.
//!
//! Walks a parsed [`Document`] and writes Markdown the renderer in
//! [`super::render`] understands: footnotes as `[^id]`, `~sub~`, `^sup^`,
//! math spans kept verbatim, spoiler containers (`::: spoiler`) and
//! collapsible sections (`+++ Title`).

use crate::dom::{Document, NodeData, NodeId};

use super::escape::{calculate_fence_length, calculate_inline_code_ticks, escape_markdown, unescape_markdown};

const SKIPPED_TAGS: &[&str] = &["style", "script", "head", "title", "noscript", "template", "iframe"];

const MISSING_FOOTNOTE_ID: &str = "MISSING-ID";

/// Convert an HTML fragment to Markdown.
pub fn html_to_markdown(html: &str) -> String {
    let doc = Document::parse(html);
    let mut ctx = WriteContext::new(&doc);
    ctx.walk_children(doc.body());
    ctx.finish()
}

/// Tracks list context for numbering.
#[derive(Debug, Clone)]
struct ListContext {
    is_ordered: bool,
    counter: usize,
    items: usize,
    is_tight: bool,
}

/// Streaming Markdown writer over a document.
struct WriteContext<'a> {
    doc: &'a Document,
    output: String,
    line_prefix: String,
    list_stack: Vec<ListContext>,
    at_line_start: bool,
    pending_newline: bool,
}

impl<'a> WriteContext<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            output: String::new(),
            line_prefix: String::new(),
            list_stack: Vec::new(),
            at_line_start: true,
            pending_newline: false,
        }
    }

    fn finish(self) -> String {
        self.output.trim().to_string()
    }

    fn ensure_line_started(&mut self) {
        if self.at_line_start {
            self.output.push_str(&self.line_prefix);
            self.at_line_start = false;
        }
    }

    fn write_newline(&mut self) {
        let trimmed = self.output.trim_end_matches(' ').len();
        self.output.truncate(trimmed);
        self.output.push('\n');
        self.at_line_start = true;
    }

    fn write_hard_break(&mut self) {
        self.ensure_line_started();
        self.output.push('\\');
        self.write_newline();
    }

    /// End the current line and emit an empty one carrying the prefix.
    fn write_blank_line(&mut self) {
        if !self.at_line_start {
            self.write_newline();
        }
        self.output.push_str(self.line_prefix.trim_end());
        self.write_newline();
    }

    fn start_block(&mut self) {
        if self.pending_newline {
            self.write_blank_line();
            self.pending_newline = false;
        }
        self.ensure_line_started();
    }

    fn end_block(&mut self) {
        self.pending_newline = true;
    }

    /// Write pre-rendered Markdown, re-applying the line prefix after
    /// each embedded newline.
    fn write_raw(&mut self, markdown: &str) {
        for (i, line) in markdown.split('\n').enumerate() {
            if i > 0 {
                self.write_newline();
            }
            if !line.is_empty() {
                self.ensure_line_started();
                self.output.push_str(line);
            }
        }
    }

    fn write_space(&mut self) {
        if self.at_line_start || self.output.is_empty() || self.output.ends_with(char::is_whitespace) {
            return;
        }
        self.output.push(' ');
    }

    fn write_text(&mut self, text: &str) {
        let has_leading = text.starts_with(char::is_whitespace);
        let has_trailing = text.ends_with(char::is_whitespace);

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            if !text.is_empty() {
                self.write_space();
            }
            return;
        }

        if has_leading {
            self.write_space();
        }
        self.ensure_line_started();
        self.output.push_str(&escape_markdown(&words.join(" ")));
        if has_trailing {
            self.write_space();
        }
    }

    /// Render the children of `id` into a separate buffer.
    fn capture_children(&mut self, id: NodeId) -> String {
        let saved_output = std::mem::take(&mut self.output);
        let saved_prefix = std::mem::take(&mut self.line_prefix);
        let saved_lists = std::mem::take(&mut self.list_stack);
        let saved_start = std::mem::replace(&mut self.at_line_start, false);
        let saved_pending = std::mem::replace(&mut self.pending_newline, false);

        self.walk_children(id);

        let captured = std::mem::replace(&mut self.output, saved_output);
        self.line_prefix = saved_prefix;
        self.list_stack = saved_lists;
        self.at_line_start = saved_start;
        self.pending_newline = saved_pending;
        captured
    }

    /// Write the element's content between two delimiters, keeping
    /// surrounding whitespace outside them.
    fn write_delimited(&mut self, id: NodeId, open: &str, close: &str) {
        let content = self.capture_children(id);
        let text = self.doc.text(id);
        let trimmed = content.trim();

        if text.starts_with(char::is_whitespace) {
            self.write_space();
        }
        if !trimmed.is_empty() {
            self.write_raw(&format!("{open}{trimmed}{close}"));
        }
        if text.ends_with(char::is_whitespace) {
            self.write_space();
        }
    }

    fn walk_children(&mut self, id: NodeId) {
        for child in self.doc.children(id) {
            self.walk_node(child);
        }
    }

    fn walk_node(&mut self, id: NodeId) {
        let doc = self.doc;
        let Some(node) = doc.get(id) else {
            return;
        };

        let tag = match &node.data {
            NodeData::Text(text) => {
                self.write_text(text);
                return;
            }
            NodeData::Element { name, .. } => name.local.as_ref(),
            _ => return,
        };

        if SKIPPED_TAGS.contains(&tag) || self.write_classed(id, tag) {
            return;
        }

        match tag {
            "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "aside"
            | "figure" | "figcaption" | "details" | "summary" | "address" | "caption" | "dl"
            | "dt" | "dd" | "nav" => {
                self.start_block();
                self.walk_children(id);
                self.end_block();
            }

            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = usize::from(tag.as_bytes()[1] - b'0');
                let content = self.capture_children(id);
                let content = content.split_whitespace().collect::<Vec<_>>().join(" ");
                self.start_block();
                self.output.push_str(&"#".repeat(level));
                self.output.push(' ');
                self.output.push_str(content.trim_end_matches('\\'));
                self.end_block();
            }

            "sub" => self.write_delimited(id, "~", "~"),
            "sup" => self.write_delimited(id, "^", "^"),
            "i" => self.write_delimited(id, "*", "*"),
            "em" | "cite" | "var" => self.write_delimited(id, "_", "_"),
            "strong" | "b" => self.write_delimited(id, "**", "**"),
            "s" | "del" | "strike" => self.write_delimited(id, "~~", "~~"),

            "code" | "kbd" | "samp" | "tt" => {
                let content = self.doc.text(id);
                if content.is_empty() {
                    return;
                }
                let ticks = "`".repeat(calculate_inline_code_ticks(&content));
                let spacer = if content.starts_with('`') || content.ends_with('`') {
                    " "
                } else {
                    ""
                };
                self.ensure_line_started();
                self.output
                    .push_str(&format!("{ticks}{spacer}{content}{spacer}{ticks}"));
            }

            "pre" => self.write_code_block(id),

            "a" => {
                let href = self.doc.get_attr(id, "href").unwrap_or("").trim();
                if href.is_empty() {
                    self.walk_children(id);
                    return;
                }
                let content = self.capture_children(id);
                let content = content.trim();
                if content.is_empty() {
                    return;
                }
                let href = if href.contains([' ', '(', ')']) {
                    format!("<{href}>")
                } else {
                    href.to_string()
                };
                let title = match self.doc.get_attr(id, "title") {
                    Some(t) if !t.is_empty() => format!(" \"{}\"", t.replace('"', "\\\"")),
                    _ => String::new(),
                };
                self.write_raw(&format!("[{content}]({href}{title})"));
            }

            "img" => {
                let src = self.doc.get_attr(id, "src").unwrap_or("");
                if src.is_empty() {
                    return;
                }
                let alt = escape_markdown(self.doc.get_attr(id, "alt").unwrap_or(""));
                self.ensure_line_started();
                self.output.push_str(&format!("![{alt}]({src})"));
            }

            "br" => self.write_hard_break(),

            "hr" => {
                self.start_block();
                self.output.push_str("* * *");
                self.end_block();
            }

            "ul" | "ol" => self.write_list(id, tag == "ol"),
            "li" => self.write_list_item(id),

            "blockquote" => {
                if self.pending_newline {
                    self.write_blank_line();
                    self.pending_newline = false;
                }
                if !self.at_line_start {
                    self.write_newline();
                }
                let old_prefix = self.line_prefix.clone();
                self.line_prefix.push_str("> ");
                self.walk_children(id);
                self.line_prefix = old_prefix;
                self.end_block();
            }

            "table" => self.write_table(id),

            _ if self.doc.is_block(id) => {
                self.start_block();
                self.walk_children(id);
                self.end_block();
            }

            _ => self.walk_children(id),
        }
    }

    /// Class-driven rules, which take priority over tag rules. Returns true
    /// if the element was handled.
    fn write_classed(&mut self, id: NodeId, tag: &str) -> bool {
        let doc = self.doc;
        let has = |class: &str| doc.has_class(id, class);

        if has("footnote-reference") {
            let footnote_id = self.footnote_id(id);
            self.ensure_line_started();
            self.output.push_str(&format!("[^{footnote_id}]"));
        } else if has("footnote-item") {
            self.write_footnote_item(id);
        } else if has("footnote-back-link") {
            // Rendered implicitly by the footnote syntax.
        } else if has("footnote-section") || has("footnotes") || has("spoilers") || has("detailsBlockContent") {
            self.walk_children(id);
        } else if tag == "span" && has("math-tex") {
            let content = self.capture_children(id);
            self.ensure_line_started();
            self.output.push_str(&unescape_math_interior(&content));
        } else if has("detailsBlockTitle") {
            let title = self.capture_children(id);
            let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
            self.start_block();
            self.output.push_str("+++ ");
            self.output.push_str(&title);
            self.end_block();
        } else if has("detailsBlock") {
            self.start_block();
            self.walk_children(id);
            self.end_block();
            self.start_block();
            self.output.push_str("+++");
            self.end_block();
        } else if has("spoiler-v2") {
            self.start_block();
            self.output.push_str("::: spoiler");
            self.end_block();
            self.start_block();
            self.walk_children(id);
            self.end_block();
            self.start_block();
            self.output.push_str(":::");
            self.end_block();
        } else {
            return false;
        }
        true
    }

    fn footnote_id(&self, id: NodeId) -> String {
        std::iter::once(id)
            .chain(self.doc.descendants(id))
            .find_map(|n| self.doc.get_attr(n, "data-footnote-id"))
            .filter(|v| !v.is_empty())
            .unwrap_or(MISSING_FOOTNOTE_ID)
            .to_string()
    }

    fn write_footnote_item(&mut self, id: NodeId) {
        let footnote_id = self
            .doc
            .get_attr(id, "data-footnote-id")
            .filter(|v| !v.is_empty())
            .unwrap_or(MISSING_FOOTNOTE_ID)
            .to_string();
        let content_root = self
            .doc
            .descendants(id)
            .into_iter()
            .find(|&d| self.doc.has_class(d, "footnote-content"))
            .unwrap_or(id);

        let content = self.capture_children(content_root);
        let content = content
            .trim()
            .lines()
            .enumerate()
            .map(|(i, line)| {
                if i == 0 || line.is_empty() {
                    line.to_string()
                } else {
                    format!("    {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        self.start_block();
        self.write_raw(&format!("[^{footnote_id}]: {content}"));
        self.end_block();
    }

    fn is_tight_list(&self, list: NodeId) -> bool {
        self.doc.element_children(list).all(|item| {
            self.doc
                .element_children(item)
                .filter(|&c| self.doc.is_tag(c, "p"))
                .count()
                <= 1
        })
    }

    fn write_list(&mut self, id: NodeId, is_ordered: bool) {
        // Items start their own lines, so only the separating blank line is
        // written here.
        if self.pending_newline {
            self.write_blank_line();
            self.pending_newline = false;
        }
        let start = self
            .doc
            .get_attr(id, "start")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1);
        let is_tight = self.is_tight_list(id);
        self.list_stack.push(ListContext {
            is_ordered,
            counter: start.saturating_sub(1),
            items: 0,
            is_tight,
        });
        self.walk_children(id);
        self.list_stack.pop();
        self.end_block();
    }

    fn write_list_item(&mut self, id: NodeId) {
        let Some(ctx) = self.list_stack.last_mut() else {
            self.start_block();
            self.walk_children(id);
            self.end_block();
            return;
        };
        let first = ctx.items == 0;
        ctx.items += 1;
        ctx.counter += 1;
        let bullet = if ctx.is_ordered {
            format!("{}. ", ctx.counter)
        } else {
            "- ".to_string()
        };
        let is_tight = ctx.is_tight;

        if !is_tight && !first {
            self.write_blank_line();
        } else if !self.at_line_start {
            self.write_newline();
        }
        self.pending_newline = false;

        self.ensure_line_started();
        self.output.push_str(&bullet);

        let old_prefix = self.line_prefix.clone();
        self.line_prefix.push_str(&" ".repeat(bullet.len()));
        self.walk_children(id);
        self.line_prefix = old_prefix;
        self.pending_newline = false;
    }

    fn write_code_block(&mut self, id: NodeId) {
        let text = self.doc.text(id);
        let text = text.strip_suffix('\n').unwrap_or(&text);
        let lang = self
            .doc
            .descendants(id)
            .into_iter()
            .filter(|&d| self.doc.is_tag(d, "code"))
            .flat_map(|d| self.doc.element_classes(d).to_vec())
            .find_map(|c| c.strip_prefix("language-").map(str::to_string))
            .unwrap_or_default();
        let fence = "`".repeat(calculate_fence_length(text, '`'));

        self.start_block();
        self.output.push_str(&fence);
        self.output.push_str(&lang);
        for line in text.split('\n') {
            self.output.push('\n');
            self.at_line_start = true;
            self.ensure_line_started();
            self.output.push_str(line);
        }
        self.write_newline();
        self.ensure_line_started();
        self.output.push_str(&fence);
        self.end_block();
    }

    fn write_table(&mut self, table: NodeId) {
        let rows: Vec<NodeId> = self
            .doc
            .descendants(table)
            .into_iter()
            .filter(|&r| {
                self.doc.is_tag(r, "tr")
                    && self.doc.closest(r, |d, n| d.is_tag(n, "table")) == Some(table)
            })
            .collect();

        let mut cells: Vec<Vec<String>> = Vec::new();
        for row in rows {
            let row_cells: Vec<NodeId> = self
                .doc
                .element_children(row)
                .filter(|&c| self.doc.is_tag(c, "td") || self.doc.is_tag(c, "th"))
                .collect();
            let texts = row_cells
                .into_iter()
                .map(|cell| {
                    self.capture_children(cell)
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            cells.push(texts);
        }

        let columns = cells.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }

        self.start_block();
        for (i, row) in cells.iter().enumerate() {
            if i > 0 {
                self.write_newline();
                self.ensure_line_started();
            }
            let mut line = String::from("|");
            for col in 0..columns {
                line.push(' ');
                line.push_str(row.get(col).map(String::as_str).unwrap_or(""));
                line.push_str(" |");
            }
            self.output.push_str(&line);
            if i == 0 {
                self.write_newline();
                self.ensure_line_started();
                self.output.push('|');
                self.output.push_str(&" --- |".repeat(columns));
            }
        }
        self.end_block();
    }
}

/// Keep the math delimiters (first and last three characters) and strip
/// Markdown escapes from the formula between them.
fn unescape_math_interior(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() < 6 {
        return content.to_string();
    }
    let head: String = chars[..3].iter().collect();
    let interior: String = chars[3..chars.len() - 3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}{}{tail}", unescape_markdown(&interior))
}
