//! # palimpsest
//!
//! Conversion of user-authored rich text between HTML, Markdown, the
//! rich-text editor's markup and legacy Draft.js block JSON, plus import of
//! documents exported from Google Docs.
//!
//! ## Features
//!
//! - Sanitize untrusted HTML against fixed allow-lists
//! - HTML to Markdown and back, with footnotes, spoilers, math and tables
//! - Legacy block documents to HTML, including their TeX conventions
//! - Server-side TeX typesetting to MathML, bounded by a timeout
//! - Word counts that leave out footnotes and appendices
//! - A staged pipeline that turns a Google Docs export into editor markup
//!
//! ## Quick Start
//!
//! ```
//! use palimpsest::{ContentEnvelope, Converter};
//!
//! let converter = Converter::default();
//! let doc = ContentEnvelope::from_json(r#"{"type": "html", "data": "<p>Hello <em>there</em></p>"}"#).unwrap();
//!
//! assert_eq!(converter.to_markdown(&doc), "Hello _there_");
//! assert_eq!(converter.word_count(&doc), 2);
//! ```
//!
//! Rendering HTML is async because math goes through a [`math::MathEngine`]:
//!
//! ```
//! use palimpsest::{ContentEnvelope, Converter, HtmlOptions};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let converter = Converter::default();
//! let doc = ContentEnvelope::Markdown("Some *emphasis*".to_string());
//! let html = converter.to_html(&doc, HtmlOptions::default()).await;
//! assert_eq!(html, "<p>Some <em>emphasis</em></p>");
//! # });
//! ```

pub mod blocks;
pub mod config;
pub mod dispatch;
pub mod dom;
pub mod envelope;
pub mod error;
mod footnotes;
pub mod import;
pub mod markdown;
pub mod math;
pub mod sanitize;
pub mod spoilers;
pub mod toc;
pub mod truncate;
pub mod upload;
mod word_count;

pub use config::{ConversionConfig, ImportConfig};
pub use dispatch::{Converter, HtmlOptions};
pub use envelope::{ContentEnvelope, ContentFormat};
pub use error::{Error, Result};
pub use import::{ImportPipeline, ImportRequest};
pub use sanitize::{Sanitizer, sanitize};
pub use truncate::{truncate_html, truncate_words};
