//! Random forest training.

pub mod trainer;

pub use trainer::{MaxFeatures, RandomForestParams, RandomForestTrainer};
