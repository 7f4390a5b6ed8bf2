//! TeX typesetting for HTML fragments.
//!
//! [`MathStage`] finds formulas in a fragment, hands them to a
//! [`MathEngine`] in one batch and splices the engine's markup back in.
//! Formulas come from two places:
//!
//! - `span.math-tex` wrappers, as produced by the editor and the Markdown
//!   renderer
//! - raw delimiters in text (`\(…\)`, `\[…\]`, `$$…$$`), which are first
//!   given a wrapper of their own
//!
//! Wrappers that already contain a `<math>` element are skipped, so running
//! the stage twice is harmless. A formula the engine rejects is replaced by
//! an `Invalid LaTeX` message; if the engine does not answer within the
//! configured timeout the fragment is returned untouched.

mod latex;

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use memchr::memmem;
use regex::Regex;

use crate::config::ConversionConfig;
use crate::dom::{Document, NodeId};

pub use latex::LatexEngine;

const SKIPPED_ANCESTORS: &[&str] = &["code", "pre", "script", "style", "textarea", "math"];

static TEXT_DELIMITERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\\\((.+?)\\\)|\\\[(.+?)\\\]|\$\$(.+?)\$\$").expect("static regex")
});

/// One formula handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    pub id: usize,
    pub source: String,
    pub display: bool,
}

/// A formula the engine could not typeset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaError {
    pub id: usize,
    pub source: String,
    pub errors: Vec<String>,
}

impl FormulaError {
    /// Text shown in place of the formula.
    pub fn message(&self) -> String {
        format!("Invalid LaTeX ${}: {}", self.source, self.errors.join(", "))
    }
}

/// Typesets a batch of formulas. Results are returned in input order.
#[async_trait]
pub trait MathEngine: Send + Sync {
    async fn typeset(&self, formulas: Vec<Formula>) -> Vec<Result<String, FormulaError>>;
}

/// What happened during one [`MathStage::render`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MathReport {
    pub rendered: usize,
    pub errors: Vec<FormulaError>,
    pub timed_out: bool,
}

#[derive(Debug, Clone)]
pub struct MathRendering {
    pub html: String,
    pub report: MathReport,
}

/// Math rendering pass over HTML fragments.
#[derive(Clone)]
pub struct MathStage {
    engine: Arc<dyn MathEngine>,
    timeout: Duration,
}

impl MathStage {
    /// Stage using the built-in [`LatexEngine`].
    pub fn new(config: &ConversionConfig) -> Self {
        Self::with_engine(config, Arc::new(LatexEngine))
    }

    pub fn with_engine(config: &ConversionConfig, engine: Arc<dyn MathEngine>) -> Self {
        Self {
            engine,
            timeout: config.math_timeout(),
        }
    }

    /// Typeset every formula in `html`.
    pub async fn render(&self, html: &str) -> MathRendering {
        let mut report = MathReport::default();
        if !may_contain_math(html) {
            return MathRendering {
                html: html.to_string(),
                report,
            };
        }

        let mut doc = Document::parse(html);
        wrap_text_formulas(&mut doc);
        let (wrappers, formulas) = collect_formulas(&doc);
        if formulas.is_empty() {
            return MathRendering {
                html: doc.to_html(),
                report,
            };
        }

        tracing::debug!(count = formulas.len(), "typesetting formulas");
        let results = match tokio::time::timeout(self.timeout, self.engine.typeset(formulas)).await {
            Ok(results) => results,
            Err(_) => {
                tracing::error!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "timed out typesetting math in html: {html}"
                );
                report.timed_out = true;
                return MathRendering {
                    html: html.to_string(),
                    report,
                };
            }
        };

        for (wrapper, result) in wrappers.into_iter().zip(results) {
            match result {
                Ok(markup) => {
                    doc.remove_children(wrapper);
                    doc.append_html(wrapper, &markup);
                    report.rendered += 1;
                }
                Err(error) => {
                    tracing::warn!(id = error.id, source = %error.source, "invalid LaTeX");
                    doc.set_text(wrapper, &error.message());
                    report.errors.push(error);
                }
            }
        }

        MathRendering {
            html: doc.to_html(),
            report,
        }
    }
}

fn may_contain_math(html: &str) -> bool {
    let bytes = html.as_bytes();
    [&b"math-tex"[..], b"\\(", b"\\[", b"$$"]
        .iter()
        .any(|needle| memmem::find(bytes, needle).is_some())
}

fn in_skipped_context(doc: &Document, id: NodeId) -> bool {
    doc.closest(id, |d, n| {
        d.tag(n).is_some_and(|t| SKIPPED_ANCESTORS.contains(&t)) || d.has_class(n, "math-tex")
    })
    .is_some()
}

/// Give every delimited formula found in plain text a `math-tex` wrapper.
fn wrap_text_formulas(doc: &mut Document) {
    let candidates: Vec<NodeId> = doc
        .descendants(doc.body())
        .into_iter()
        .filter(|&id| {
            doc.text_content(id)
                .is_some_and(|t| TEXT_DELIMITERS.is_match(t))
                && !in_skipped_context(doc, id)
        })
        .collect();

    for text_node in candidates {
        let Some(text) = doc.text_content(text_node).map(str::to_string) else {
            continue;
        };
        let mut last = 0;
        for found in TEXT_DELIMITERS.find_iter(&text) {
            if found.start() > last {
                let before = doc.create_text(text[last..found.start()].to_string());
                doc.insert_before(text_node, before);
            }
            let wrapper = doc.new_element("span", &[("class", "math-tex")]);
            doc.append_text(wrapper, found.as_str());
            doc.insert_before(text_node, wrapper);
            last = found.end();
        }
        if last < text.len() {
            let after = doc.create_text(text[last..].to_string());
            doc.insert_before(text_node, after);
        }
        doc.remove(text_node);
    }
}

/// Wrappers still holding TeX source, and the formulas they contain.
fn collect_formulas(doc: &Document) -> (Vec<NodeId>, Vec<Formula>) {
    let mut wrappers = Vec::new();
    let mut formulas = Vec::new();

    for id in doc.descendants(doc.body()) {
        if !doc.is_tag(id, "span") || !doc.has_class(id, "math-tex") {
            continue;
        }
        if doc.descendants(id).into_iter().any(|d| doc.is_tag(d, "math")) {
            continue;
        }
        let (source, display) = split_delimiters(&doc.text(id));
        if source.trim().is_empty() {
            continue;
        }
        formulas.push(Formula {
            id: formulas.len(),
            source,
            display,
        });
        wrappers.push(id);
    }

    (wrappers, formulas)
}

/// Strip the math delimiters from a wrapper's text.
fn split_delimiters(text: &str) -> (String, bool) {
    let text = text.trim();
    let pairs: [(&str, &str, bool); 4] = [
        (r"\(", r"\)", false),
        (r"\[", r"\]", true),
        ("$$", "$$", true),
        ("$", "$", false),
    ];
    for (open, close, display) in pairs {
        if text.len() >= open.len() + close.len()
            && let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close))
        {
            return (inner.trim().to_string(), display);
        }
    }
    (text.to_string(), false)
}
