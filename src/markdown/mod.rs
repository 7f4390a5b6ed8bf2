//! Markdown in both directions.
//!
//! - [`escape`]: escaping and fence/tick length helpers
//! - [`from_html`]: HTML → Markdown
//! - [`render`]: Markdown → HTML (pulldown-cmark plus extensions)
//!
//! ## Design Notes
//!
//! The two directions agree on a few non-CommonMark constructs so that a
//! document survives a round trip:
//!
//! - **Footnotes**: `[^id]` references and `[^id]: text` definitions map to
//!   `span.footnote-reference` and `li.footnote-item` markup
//! - **Sub/superscript**: `~x~` and `^x^`
//! - **Math**: `math-tex` spans are written out verbatim (`\(x\)`), so the
//!   formula source is what ends up in the Markdown
//! - **Containers**: `::: spoiler … :::` and `+++ Title … +++`

mod containers;
mod escape;
mod from_html;
mod render;

pub use escape::{calculate_fence_length, calculate_inline_code_ticks, escape_markdown, unescape_markdown};
pub use from_html::html_to_markdown;
pub use render::{MarkdownRenderer, markdown_to_html};
