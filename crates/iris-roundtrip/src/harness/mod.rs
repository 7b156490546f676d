//! Train and check commands for each backend.
//!
//! A train command loads Iris, fits the backend's preset, checks accuracy
//! and the reference fixture, saves every artifact and verifies that each
//! reload predicts the same labels. A check command reloads the artifacts
//! and checks the fixture only.
//!
//! Exit codes: 0 on success, 1 on a validation mismatch, 2 on any other error.

pub mod backend;
pub mod commands;
pub mod error;
pub mod evaluate;
pub mod layout;
pub mod report;
pub mod verify;

pub use backend::{lightgbm_preset, random_forest_preset, xgboost_preset, Artifact, Backend};
pub use commands::{check, main_check, main_train, train};
pub use error::{HarnessError, ValidationFailure};
pub use evaluate::{evaluate, Evaluation, MIN_ACCURACY};
pub use layout::{ModelLayout, DEFAULT_ROOT};
pub use verify::verify_reload;
