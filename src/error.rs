//! Error types for conversion and import operations.

use thiserror::Error;

/// Errors that can occur while converting or importing a document.
///
/// Per-item failures (a single formula, a single image) are not errors at
/// this level: they are collected into reports by the stage that produced
/// them and the document is still returned.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized content format: {0}")]
    UnrecognizedFormat(String),

    #[error("Invalid {format} envelope: {reason}")]
    InvalidEnvelope { format: String, reason: String },

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Upload failed: {0}")]
    Upload(String),
}

pub type Result<T> = std::result::Result<T, Error>;
