//! Model persistence.
//!
//! | Format | Module | Models |
//! |---|---|---|
//! | native binary (`.bst`) | [`native`] | [`GBDTModel`], [`RandomForestModel`] |
//! | LightGBM text (`.txt`) | [`text`] | [`GBDTModel`] |
//! | JSON object dump (`.joblib`) | [`object`] | [`GBDTModel`], [`RandomForestModel`] |
//! | ONNX (`.onnx`) | [`onnx`] | [`RandomForestModel`] export, [`onnx::OnnxSession`] inference |
//!
//! Writers never create parent directories. Every reader validates the
//! decoded trees and metadata before returning a model.
//!
//! [`GBDTModel`]: crate::model::GBDTModel
//! [`RandomForestModel`]: crate::model::RandomForestModel

mod convert;
pub mod error;
pub mod native;
pub mod object;
pub mod onnx;
pub mod payload;
pub mod schema;
pub mod text;

pub use error::{ReadError, WriteError};
pub use native::{ModelType, SerializableModel};
pub use object::ObjectModel;
pub use onnx::{OnnxError, OnnxSession};
pub use text::{load_text, parse_text, save_text, write_text, ParseError};
