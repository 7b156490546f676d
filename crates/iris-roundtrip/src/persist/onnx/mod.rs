//! ONNX export and inference for random forests.
//!
//! - [`proto`]: prost messages for the `onnx.proto` subset in use
//! - [`export`]: [`RandomForestModel`](crate::model::RandomForestModel) to a
//!   `TreeEnsembleClassifier` graph
//! - [`runtime`]: [`OnnxSession`], a validating evaluator for such graphs

pub mod export;
pub mod proto;
pub mod runtime;

use thiserror::Error;

use crate::model::PredictError;

pub use export::{export_random_forest, save_onnx, to_onnx_bytes};
pub use runtime::{OnnxOutputs, OnnxSession};

/// Domain of the ONNX-ML operators.
pub const ML_DOMAIN: &str = "ai.onnx.ml";
/// IR version written on export.
pub const IR_VERSION: i64 = 7;
/// Default-domain opset written on export.
pub const OPSET_VERSION: i64 = 12;
/// `ai.onnx.ml` opset written on export.
pub const ML_OPSET_VERSION: i64 = 1;

pub const INPUT_NAME: &str = "float_input";
pub const LABEL_OUTPUT: &str = "output_label";
pub const PROBABILITY_OUTPUT: &str = "output_probability";

/// Errors from exporting, decoding, validating or running an ONNX model.
#[derive(Debug, Error)]
pub enum OnnxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protobuf decoding failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("unsupported IR version {0}")]
    UnsupportedIrVersion(i64),

    #[error("missing opset import for domain {0:?}")]
    MissingOpset(&'static str),

    #[error("unsupported opset {version} for domain {domain:?}")]
    UnsupportedOpset { domain: String, version: i64 },

    #[error("model has no graph")]
    MissingGraph,

    #[error("graph must hold exactly one node, found {0}")]
    NodeCount(usize),

    #[error("unsupported operator {domain}::{op_type}")]
    UnsupportedOperator { domain: String, op_type: String },

    #[error("missing attribute {0}")]
    MissingAttribute(&'static str),

    #[error("unsupported value for attribute {name}: {value}")]
    UnsupportedAttribute { name: String, value: String },

    #[error("attribute {name} has {actual} entries, expected {expected}")]
    AttributeLength { name: &'static str, expected: usize, actual: usize },

    #[error("invalid tree ensemble: {0}")]
    InvalidEnsemble(String),

    #[error("graph inputs and outputs do not match the node: {0}")]
    InvalidIo(String),

    #[error("cannot export model: {0}")]
    Export(String),

    #[error(transparent)]
    Predict(#[from] PredictError),
}
