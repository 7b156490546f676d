//! Gradient Boosted Decision Tree (GBDT) training module.
//!
//! - [`expansion`] - Expansion strategies (depth-wise, leaf-wise)
//! - [`grower`] - Tree growing orchestration
//! - [`split`] - Gain computation and exact split finding
//! - [`trainer`] - GBDT training loop

pub mod expansion;
pub mod grower;
pub mod split;
pub mod trainer;

pub use expansion::{GrowthState, GrowthStrategy, NodeCandidate};
pub use grower::{GrowerParams, TreeGrower};
pub use split::{ExactSplitter, GainParams, SplitInfo};
pub use trainer::{GBDTParams, GBDTTrainer};
