//! Errors for reading and writing persisted models.

use thiserror::Error;

use super::native::ModelType;
use super::text::ParseError;
use crate::model::ModelError;

/// Errors raised while loading a model from bytes or a file.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Magic bytes do not match.
    #[error("not a model file (bad magic bytes)")]
    NotAModel,

    #[error("unsupported format version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("unknown model type tag {0}")]
    UnknownModelType(u8),

    #[error("file is truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("checksum mismatch: header says {expected:#010x}, payload hashes to {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("corrupt payload: {0}")]
    CorruptPayload(#[source] postcard::Error),

    #[error("file holds a {found} model, expected {expected}")]
    TypeMismatch { expected: ModelType, found: ModelType },

    /// Decoded parts do not form a valid model.
    #[error("invalid model: {0}")]
    InvalidModel(#[from] ModelError),

    /// Decoded data is inconsistent (lengths, header fields).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("text model: {0}")]
    Parse(#[from] ParseError),

    #[error("object dump has format {found:?}, expected {expected:?}")]
    UnknownFormat { expected: &'static str, found: String },

    #[error("object dump holds {found:?}, expected {expected:?}")]
    ObjectTypeMismatch { expected: &'static str, found: String },
}

/// Errors raised while saving a model.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding failed: {0}")]
    Encoding(#[source] postcard::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The model cannot be expressed in the target format.
    #[error("cannot write model: {0}")]
    Unsupported(String),
}
