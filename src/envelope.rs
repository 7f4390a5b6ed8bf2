//! The `{type, data}` content envelope.
//!
//! Stored documents carry their format next to their data. The envelope is
//! validated once, when it is built: an unknown `type` is
//! [`Error::UnrecognizedFormat`], and data of the wrong shape for its type
//! is [`Error::InvalidEnvelope`]. Everything downstream can then match on
//! [`ContentEnvelope`] without re-checking.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::blocks::BlockDocument;
use crate::error::{Error, Result};

/// The serialized formats a document can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFormat {
    Html,
    Markdown,
    /// HTML produced by the rich-text editor.
    EditorMarkup,
    /// Legacy Draft.js block JSON.
    Blocks,
}

impl ContentFormat {
    pub const ALL: [ContentFormat; 4] = [
        ContentFormat::Html,
        ContentFormat::Markdown,
        ContentFormat::EditorMarkup,
        ContentFormat::Blocks,
    ];

    /// Wire name of the format.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFormat::Html => "html",
            ContentFormat::Markdown => "markdown",
            ContentFormat::EditorMarkup => "ckEditorMarkup",
            ContentFormat::Blocks => "draftJS",
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ContentFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| Error::UnrecognizedFormat(s.to_string()))
    }
}

/// A document together with its format.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentEnvelope {
    Html(String),
    Markdown(String),
    EditorMarkup(String),
    Blocks(BlockDocument),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl ContentEnvelope {
    /// Build an envelope from its wire parts. `null` data is the empty
    /// document; block data may be an object or a JSON string.
    pub fn from_parts(kind: &str, data: Value) -> Result<Self> {
        let format: ContentFormat = kind.parse()?;
        let invalid = |reason: String| Error::InvalidEnvelope {
            format: format.to_string(),
            reason,
        };

        match format {
            ContentFormat::Blocks => {
                let doc = match data {
                    Value::Null => BlockDocument::default(),
                    Value::String(s) if s.trim().is_empty() => BlockDocument::default(),
                    Value::String(s) => serde_json::from_str(&s).map_err(|e| invalid(e.to_string()))?,
                    value @ Value::Object(_) => {
                        serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?
                    }
                    other => return Err(invalid(format!("expected an object, got {}", json_kind(&other)))),
                };
                Ok(ContentEnvelope::Blocks(doc))
            }
            _ => {
                let text = match data {
                    Value::Null => String::new(),
                    Value::String(s) => s,
                    other => return Err(invalid(format!("expected a string, got {}", json_kind(&other)))),
                };
                Ok(Self::from_text_unchecked(format, text))
            }
        }
    }

    /// Parse a `{"type": …, "data": …}` object.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_str(json)?;
        Self::from_parts(&raw.kind, raw.data)
    }

    /// Build an envelope from a document's raw text; block documents are
    /// parsed as JSON.
    pub fn from_text(format: ContentFormat, text: &str) -> Result<Self> {
        match format {
            ContentFormat::Blocks => Self::from_parts(format.as_str(), Value::String(text.to_string())),
            _ => Ok(Self::from_text_unchecked(format, text.to_string())),
        }
    }

    fn from_text_unchecked(format: ContentFormat, text: String) -> Self {
        match format {
            ContentFormat::Html => ContentEnvelope::Html(text),
            ContentFormat::Markdown => ContentEnvelope::Markdown(text),
            ContentFormat::EditorMarkup => ContentEnvelope::EditorMarkup(text),
            ContentFormat::Blocks => ContentEnvelope::Blocks(BlockDocument::default()),
        }
    }

    pub fn format(&self) -> ContentFormat {
        match self {
            ContentEnvelope::Html(_) => ContentFormat::Html,
            ContentEnvelope::Markdown(_) => ContentFormat::Markdown,
            ContentEnvelope::EditorMarkup(_) => ContentFormat::EditorMarkup,
            ContentEnvelope::Blocks(_) => ContentFormat::Blocks,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ContentEnvelope::Html(s) | ContentEnvelope::Markdown(s) | ContentEnvelope::EditorMarkup(s) => {
                s.trim().is_empty()
            }
            ContentEnvelope::Blocks(doc) => doc.is_empty(),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Serialize for ContentEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ContentEnvelope", 2)?;
        state.serialize_field("type", self.format().as_str())?;
        match self {
            ContentEnvelope::Html(s) | ContentEnvelope::Markdown(s) | ContentEnvelope::EditorMarkup(s) => {
                state.serialize_field("data", s)?
            }
            ContentEnvelope::Blocks(doc) => state.serialize_field("data", doc)?,
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for ContentEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawEnvelope::deserialize(deserializer)?;
        ContentEnvelope::from_parts(&raw.kind, raw.data).map_err(serde::de::Error::custom)
    }
}
