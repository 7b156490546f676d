//! Train, persist, reload and verify tree-ensemble classifiers on Iris.
//!
//! # Modules
//!
//! - [`data`]: the bundled Iris table and the seeded train/test split
//! - [`repr`]: tree and forest representation shared by every model
//! - [`training`]: gradient boosting and random forest trainers
//! - [`model`]: [`GBDTModel`](model::GBDTModel),
//!   [`RandomForestModel`](model::RandomForestModel) and the
//!   [`Classifier`](model::Classifier) capability
//! - [`persist`]: native binary, LightGBM text, JSON object and ONNX formats
//! - [`harness`]: the train and check commands
//!
//! # Example
//!
//! ```no_run
//! use iris_roundtrip::data::load_iris_split;
//! use iris_roundtrip::fixture::ReferenceFixture;
//! use iris_roundtrip::harness::xgboost_preset;
//! use iris_roundtrip::model::{Classifier, GBDTModel};
//! use iris_roundtrip::persist::SerializableModel;
//!
//! let split = load_iris_split()?;
//! let model = GBDTModel::train(&split.train, &xgboost_preset()?, &[])?;
//! let bytes = model.to_native_bytes()?;
//! let reloaded = GBDTModel::from_native_bytes(&bytes)?;
//!
//! let fixture = ReferenceFixture::iris();
//! assert_eq!(reloaded.predict(fixture.features())?, fixture.expected());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod data;
pub mod fixture;
pub mod harness;
pub mod logging;
pub mod model;
pub mod persist;
pub mod repr;
pub mod training;
pub mod utils;

pub use utils::Parallelism;
