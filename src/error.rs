use std::path::PathBuf;
use thiserror::Error;

/// The main error type for detset operations.
///
/// Malformed per-instance geometry (bad polygons, bad RLE) never surfaces
/// here: it is degraded to an ignored instance during loading. Everything in
/// this enum is a construction-time or configuration failure.
#[derive(Debug, Error)]
pub enum DetError {
    #[error("box type '{name}' has been registered")]
    Conflict { name: String },

    #[error("box type {0} hasn't been registered")]
    NotRegistered(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{what} length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse XML annotation {path}: {message}")]
    XmlParse { path: PathBuf, message: String },

    #[error("Failed to parse JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse YAML from {path}: {source}")]
    YamlParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read image dimensions from {path}: {source}")]
    ImageSize {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("no proposals found for image key '{key}'")]
    MissingProposal { key: String },

    #[error("record serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("dataset is not initialized; call full_init() first")]
    NotInitialized,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
