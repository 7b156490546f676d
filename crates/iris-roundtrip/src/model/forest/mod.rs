//! Random forest: configuration and the fitted model.

mod config;
mod model;

pub use config::RandomForestConfig;
pub use model::RandomForestModel;
