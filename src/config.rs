//! Conversion configuration.
//!
//! A [`ConversionConfig`] is built once at startup (or deserialized from a
//! JSON file by the CLI) and handed to a [`crate::Converter`], which keeps it
//! for its whole lifetime. Nothing in the crate reads configuration from
//! global state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by every conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversionConfig {
    /// Upper bound on a single math typesetting call, in milliseconds.
    pub math_timeout_ms: u64,
    /// Class carried by individual spoiler blocks.
    pub spoiler_class: String,
    /// Class of the wrapper that groups adjacent spoiler blocks.
    pub spoiler_group_class: String,
    /// A footnote-stripped word count is accepted only if it keeps more
    /// than this fraction of the best count so far.
    pub footnote_guard_ratio: f64,
    pub import: ImportConfig,
}

impl ConversionConfig {
    pub fn math_timeout(&self) -> Duration {
        Duration::from_millis(self.math_timeout_ms)
    }

    /// Parse a configuration from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            math_timeout_ms: 10_000,
            spoiler_class: "spoiler-v2".to_string(),
            spoiler_group_class: "spoilers".to_string(),
            footnote_guard_ratio: 0.4,
            import: ImportConfig::default(),
        }
    }
}

/// Settings for the external-document import pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportConfig {
    /// Images whose source contains this string are re-hosted.
    pub asset_host_pattern: String,
    /// Links starting with this prefix are tracking redirects whose `q`
    /// parameter holds the real destination.
    pub redirect_prefix: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            asset_host_pattern: "googleusercontent".to_string(),
            redirect_prefix: "https://www.google.com/url?q=".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConversionConfig::default();
        assert_eq!(config.math_timeout(), Duration::from_secs(10));
        assert_eq!(config.spoiler_class, "spoiler-v2");
        assert_eq!(config.import.asset_host_pattern, "googleusercontent");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            ConversionConfig::from_json(r#"{"mathTimeoutMs": 250, "import": {"assetHostPattern": "example.org"}}"#)
                .unwrap();
        assert_eq!(config.math_timeout_ms, 250);
        assert_eq!(config.footnote_guard_ratio, 0.4);
        assert_eq!(config.import.asset_host_pattern, "example.org");
        assert_eq!(config.import.redirect_prefix, "https://www.google.com/url?q=");
    }
}
