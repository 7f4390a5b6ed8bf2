use async_trait::async_trait;
use percent_encoding::percent_decode_str;

use super::{ImportStage, StageContext};
use crate::dom::Document;
use crate::error::Result;

/// Replaces click-tracking redirects (`https://www.google.com/url?q=<dest>&sa=…`)
/// with their destination.
pub struct UnwrapRedirects {
    prefix: String,
}

impl UnwrapRedirects {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// The destination of a redirect link, or `None` if `href` is not one.
    pub fn destination(&self, href: &str) -> Option<String> {
        let query = href.strip_prefix(self.prefix.as_str())?;
        let target = query.split('&').next().unwrap_or_default();
        if target.is_empty() || target.contains(char::is_whitespace) {
            return None;
        }
        Some(percent_decode_str(target).decode_utf8_lossy().into_owned())
    }
}

#[async_trait]
impl ImportStage for UnwrapRedirects {
    fn name(&self) -> &'static str {
        "redirects"
    }

    async fn apply(&self, mut doc: Document, _ctx: &StageContext) -> Result<Document> {
        for a in doc.elements_by_tag("a") {
            if let Some(dest) = doc.get_attr(a, "href").and_then(|href| self.destination(href)) {
                doc.set_attr(a, "href", dest);
            }
        }
        Ok(doc)
    }
}
