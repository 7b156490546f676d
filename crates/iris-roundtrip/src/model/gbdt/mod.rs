//! Gradient boosted decision trees: configuration and the fitted model.

mod config;
mod model;
mod params;

pub use config::{ConfigError, EvalMetric, GBDTConfig};
pub use model::GBDTModel;
pub use params::{ParamValidationError, RegularizationParams, SamplingParams, TreeParams};
