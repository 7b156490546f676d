//! Harness errors: fatal failures and validation mismatches.

use std::error::Error as _;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::DatasetError;
use crate::model::{ConfigError, PredictError};
use crate::persist::{OnnxError, ReadError, WriteError};
use crate::training::TrainError;

/// A check that ran to completion and failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationFailure {
    #[error("{context}: predicted {predicted:?}, expected {expected:?}")]
    FixtureMismatch { context: String, expected: Vec<u32>, predicted: Vec<u32> },

    #[error("{format} reload predicted {reloaded:?}, model before saving predicted {original:?}")]
    LabelMismatch { format: String, original: Vec<u32>, reloaded: Vec<u32> },

    #[error("{format} reload changed class probabilities (max difference {max_diff:e})")]
    ProbabilityMismatch { format: String, max_diff: f32 },

    #[error("{split} accuracy {accuracy:.4} is not above {bound}")]
    AccuracyBelowBound { split: &'static str, accuracy: f64, bound: f64 },
}

/// Everything a command can fail with.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to load the dataset")]
    Dataset(#[from] DatasetError),

    #[error("invalid training configuration")]
    Config(#[from] ConfigError),

    #[error("training failed")]
    Train(#[from] TrainError),

    #[error("failed to load model")]
    Read(#[from] ReadError),

    #[error("failed to save model")]
    Write(#[from] WriteError),

    #[error("onnx model error")]
    Onnx(#[from] OnnxError),

    #[error("prediction failed")]
    Predict(#[from] PredictError),

    #[error("cannot create model directory {}", path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),
}

impl HarnessError {
    /// Process exit code: 1 for validation mismatches, 2 for fatal errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            HarnessError::Validation(_) => 1,
            _ => 2,
        }
    }

    /// The error and its causes, one per line. Causes whose text is already
    /// part of the previous line are skipped.
    pub fn chain(&self) -> Vec<String> {
        let mut lines = vec![self.to_string()];
        let mut source = self.source();
        while let Some(cause) = source {
            let message = cause.to_string();
            if lines.last().is_none_or(|last| !last.contains(&message)) {
                lines.push(message);
            }
            source = cause.source();
        }
        lines
    }
}
