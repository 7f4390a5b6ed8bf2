//! Allow-list sanitizer for untrusted HTML.
//!
//! Anything not explicitly permitted by [`policy`] is removed: disallowed
//! tags are unwrapped (their text survives), non-text tags such as
//! `<script>` disappear with their content, and attributes, classes and
//! style declarations are filtered per tag. The sanitizer never fails; the
//! worst case is an empty string.

pub mod policy;

use std::sync::LazyLock;

use regex::Regex;

use crate::dom::style::{parse_inline_style, serialize_style};
use crate::dom::{Attribute, Document, NodeData, NodeId};
use policy::{
    ALLOWED_ATTRIBUTES, ALLOWED_CLASSES, ALLOWED_IFRAME_HOSTS, ALLOWED_SCHEMES, ALLOWED_STYLES,
    ALLOWED_TAGS, GLOBAL_ATTRIBUTES, NON_TEXT_TAGS, URL_ATTRIBUTES,
};

/// Reparsing sanitized markup can still restructure it (implied end tags,
/// foster parenting), so the pass is repeated until the output is stable.
const MAX_PASSES: usize = 4;

static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.\-]*):").expect("static regex"));

/// Sanitize `html` with the default policy.
pub fn sanitize(html: &str) -> String {
    Sanitizer::default().sanitize(html)
}

/// HTML sanitizer with a fixed allow-list policy.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    iframe_hosts: Vec<String>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            iframe_hosts: ALLOWED_IFRAME_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl Sanitizer {
    /// Additionally allow iframes from `host`.
    pub fn allow_iframe_host(mut self, host: &str) -> Self {
        self.iframe_hosts.push(host.to_ascii_lowercase());
        self
    }

    /// Sanitize an HTML fragment. `sanitize(sanitize(x)) == sanitize(x)`.
    pub fn sanitize(&self, html: &str) -> String {
        let mut current = self.pass(html);
        for _ in 1..MAX_PASSES {
            let next = self.pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Sanitize a document in place.
    pub fn sanitize_document(&self, doc: &mut Document) {
        let body = doc.body();
        self.clean_children(doc, body);
    }

    fn pass(&self, html: &str) -> String {
        let mut doc = Document::parse(html);
        self.sanitize_document(&mut doc);
        doc.to_html()
    }

    fn clean_children(&self, doc: &mut Document, parent: NodeId) {
        for child in doc.child_ids(parent) {
            let tag = match doc.get(child).map(|n| &n.data) {
                Some(NodeData::Text(_)) => continue,
                Some(NodeData::Element { name, .. }) => name.local.to_ascii_lowercase(),
                _ => {
                    doc.remove(child);
                    continue;
                }
            };

            if NON_TEXT_TAGS.contains(&&*tag) {
                doc.remove(child);
            } else if !ALLOWED_TAGS.contains(&&*tag) {
                self.clean_children(doc, child);
                doc.unwrap(child);
            } else {
                self.clean_attributes(doc, child, &tag);
                self.clean_children(doc, child);
            }
        }
    }

    fn clean_attributes(&self, doc: &mut Document, id: NodeId, tag: &str) {
        let allowed = ALLOWED_ATTRIBUTES.get(tag);
        let mut kept = Vec::new();

        for attr in doc.attrs(id) {
            let name = attr.name.local.as_ref();
            let permitted = attr.name.prefix.is_none()
                && (GLOBAL_ATTRIBUTES.contains(&name)
                    || allowed.is_some_and(|list| list.contains(&name)));
            if !permitted {
                continue;
            }

            let value = match name {
                "class" => filter_classes(tag, &attr.value),
                "style" => filter_styles(tag, &attr.value),
                "srcset" => filter_srcset(&attr.value),
                "src" if tag == "iframe" => self.filter_iframe_src(&attr.value),
                _ if URL_ATTRIBUTES.contains(&name) => filter_url(&attr.value),
                _ => Some(attr.value.clone()),
            };

            if let Some(value) = value {
                kept.push(Attribute {
                    name: attr.name.clone(),
                    value,
                });
            }
        }

        doc.replace_attrs(id, kept);
    }

    fn filter_iframe_src(&self, value: &str) -> Option<String> {
        let url = filter_url(value)?;
        let host = url_host(&url)?;
        self.iframe_hosts
            .iter()
            .any(|allowed| *allowed == host)
            .then_some(url)
    }
}

fn filter_classes(tag: &str, value: &str) -> Option<String> {
    let classes: Vec<&str> = match ALLOWED_CLASSES.get(tag) {
        Some(allowed) => value
            .split_whitespace()
            .filter(|c| allowed.contains(c))
            .collect(),
        None => value.split_whitespace().collect(),
    };
    (!classes.is_empty()).then(|| classes.join(" "))
}

fn filter_styles(tag: &str, value: &str) -> Option<String> {
    let rules = ALLOWED_STYLES.get(tag)?;
    let kept: Vec<_> = parse_inline_style(value)
        .into_iter()
        .filter(|decl| {
            rules
                .iter()
                .any(|(property, rule)| *property == decl.property && rule.accepts(&decl.value))
        })
        .collect();
    (!kept.is_empty()).then(|| serialize_style(&kept))
}

fn filter_srcset(value: &str) -> Option<String> {
    let candidates: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = filter_url(parts.next()?)?;
            let descriptor: Vec<&str> = parts.collect();
            Some(if descriptor.is_empty() {
                url
            } else {
                format!("{url} {}", descriptor.join(" "))
            })
        })
        .collect();
    (!candidates.is_empty()).then(|| candidates.join(", "))
}

/// Accept relative URLs, fragments and the allowed schemes.
fn filter_url(value: &str) -> Option<String> {
    let cleaned: String = value.chars().filter(|c| !c.is_ascii_control()).collect();
    let cleaned = cleaned.trim();
    // Browsers ignore whitespace inside the scheme, so check without it.
    let compact: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    match URL_SCHEME.captures(&compact) {
        Some(caps) => {
            let scheme = caps[1].to_ascii_lowercase();
            ALLOWED_SCHEMES
                .contains(&scheme.as_str())
                .then(|| cleaned.to_string())
        }
        None => Some(cleaned.to_string()),
    }
}

fn url_host(url: &str) -> Option<String> {
    let rest = match url.find("//") {
        Some(pos) if url[..pos].chars().all(|c| c.is_ascii_alphanumeric() || c == ':') => &url[pos + 2..],
        _ => return None,
    };
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit('@').next()?;
    let host = host_port.split(':').next()?;
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}
