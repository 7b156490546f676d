//! JSON object dump (`.joblib`).
//!
//! A generic envelope around a model schema:
//!
//! ```json
//! {"format": "iris-roundtrip.object", "version": 1,
//!  "type_name": "RandomForestClassifier", "crc32": 1234, "object": {...}}
//! ```
//!
//! The checksum covers the compact encoding of `object`. `serde_json::Value`
//! keeps object keys sorted, so that encoding is canonical.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ReadError, WriteError};
use super::schema::{GBDTModelSchema, RandomForestModelSchema};
use crate::model::{GBDTModel, RandomForestModel};

/// Format name written to every envelope.
pub const OBJECT_FORMAT: &str = "iris-roundtrip.object";

/// Current envelope version.
pub const OBJECT_VERSION: u32 = 1;

/// The outer JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEnvelope {
    pub format: String,
    pub version: u32,
    pub type_name: String,
    pub crc32: u32,
    pub object: Value,
}

impl ObjectEnvelope {
    /// Wrap `object`, computing its checksum.
    pub fn wrap(type_name: &str, object: Value) -> Result<Self, serde_json::Error> {
        let crc32 = object_checksum(&object)?;
        Ok(ObjectEnvelope {
            format: OBJECT_FORMAT.to_string(),
            version: OBJECT_VERSION,
            type_name: type_name.to_string(),
            crc32,
            object,
        })
    }

    /// Check format, version, type name and checksum, then return the object.
    pub fn unwrap_checked(self, type_name: &'static str) -> Result<Value, ReadError> {
        if self.format != OBJECT_FORMAT {
            return Err(ReadError::UnknownFormat { expected: OBJECT_FORMAT, found: self.format });
        }
        if self.version != OBJECT_VERSION {
            return Err(ReadError::UnsupportedVersion {
                major: u16::try_from(self.version).unwrap_or(u16::MAX),
                minor: 0,
            });
        }
        if self.type_name != type_name {
            return Err(ReadError::ObjectTypeMismatch {
                expected: type_name,
                found: self.type_name,
            });
        }
        let actual = object_checksum(&self.object)?;
        if actual != self.crc32 {
            return Err(ReadError::ChecksumMismatch { expected: self.crc32, actual });
        }
        Ok(self.object)
    }
}

fn object_checksum(object: &Value) -> Result<u32, serde_json::Error> {
    Ok(crc32fast::hash(&serde_json::to_vec(object)?))
}

/// Models that can be stored as a JSON object dump.
pub trait ObjectModel: Sized {
    /// Serialized form of the model.
    type Schema: Serialize + DeserializeOwned;

    /// Type name recorded in the envelope.
    const TYPE_NAME: &'static str;

    fn to_schema(&self) -> Self::Schema;

    fn from_schema(schema: Self::Schema) -> Result<Self, ReadError>;

    fn to_object_bytes(&self) -> Result<Vec<u8>, WriteError> {
        let object = serde_json::to_value(self.to_schema())?;
        let envelope = ObjectEnvelope::wrap(Self::TYPE_NAME, object)?;
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn from_object_bytes(bytes: &[u8]) -> Result<Self, ReadError> {
        let envelope: ObjectEnvelope = serde_json::from_slice(bytes)?;
        let object = envelope.unwrap_checked(Self::TYPE_NAME)?;
        Self::from_schema(serde_json::from_value(object)?)
    }

    /// Write the model to `path`. The parent directory must exist.
    fn save_object(&self, path: impl AsRef<Path>) -> Result<(), WriteError> {
        let path = path.as_ref();
        let bytes = self.to_object_bytes()?;
        std::fs::write(path, &bytes)?;
        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            type_name = Self::TYPE_NAME,
            "saved object dump"
        );
        Ok(())
    }

    fn load_object(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let model = Self::from_object_bytes(&bytes)?;
        tracing::debug!(path = %path.display(), type_name = Self::TYPE_NAME, "loaded object dump");
        Ok(model)
    }
}

impl ObjectModel for RandomForestModel {
    type Schema = RandomForestModelSchema;
    const TYPE_NAME: &'static str = RandomForestModelSchema::TYPE_NAME;

    fn to_schema(&self) -> Self::Schema {
        self.into()
    }

    fn from_schema(schema: Self::Schema) -> Result<Self, ReadError> {
        schema.try_into()
    }
}

impl ObjectModel for GBDTModel {
    type Schema = GBDTModelSchema;
    const TYPE_NAME: &'static str = GBDTModelSchema::TYPE_NAME;

    fn to_schema(&self) -> Self::Schema {
        self.into()
    }

    fn from_schema(schema: Self::Schema) -> Result<Self, ReadError> {
        schema.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classifier, ModelMeta};
    use crate::repr::{Forest, Tree, VectorLeaf};
    use ndarray::array;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn forest_model() -> RandomForestModel {
        let tree = Tree::new(
            vec![2, 0, 0],
            vec![2.45, 0.0, 0.0],
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![
                VectorLeaf::default(),
                VectorLeaf::new(vec![1.0, 0.0, 0.0]),
                VectorLeaf::new(vec![0.0, 0.3, 0.7]),
            ],
        );
        let mut forest = Forest::new(3);
        forest.push_tree(tree, 0);
        let attributes = BTreeMap::from([("n_estimators".to_string(), "1".to_string())]);
        RandomForestModel::from_parts(forest, ModelMeta::for_multiclass(4, 3), attributes).unwrap()
    }

    #[test]
    fn envelope_fields() {
        let bytes = forest_model().to_object_bytes().unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["format"], OBJECT_FORMAT);
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["type_name"], "RandomForestClassifier");
        assert!(doc["object"]["forest"]["trees"].is_array());
    }

    #[test]
    fn reload_keeps_probabilities() {
        let model = forest_model();
        let back = RandomForestModel::from_object_bytes(&model.to_object_bytes().unwrap()).unwrap();
        assert_eq!(back, model);
        let x = array![[1.0f32, 1.0, 1.0, 1.0], [1.0, 1.0, 5.0, 1.0]];
        assert_eq!(back.predict_proba(x.view()).unwrap(), model.predict_proba(x.view()).unwrap());
    }

    #[test]
    fn rejects_tampered_object() {
        let bytes = forest_model().to_object_bytes().unwrap();
        let mut doc: Value = serde_json::from_slice(&bytes).unwrap();
        doc["object"]["attributes"]["n_estimators"] = json!("2");
        let tampered = serde_json::to_vec(&doc).unwrap();
        assert!(matches!(
            RandomForestModel::from_object_bytes(&tampered),
            Err(ReadError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn rejects_wrong_type_and_format() {
        let bytes = forest_model().to_object_bytes().unwrap();
        assert!(matches!(
            GBDTModel::from_object_bytes(&bytes),
            Err(ReadError::ObjectTypeMismatch { expected: "GradientBoostingClassifier", .. })
        ));

        let mut doc: Value = serde_json::from_slice(&bytes).unwrap();
        doc["format"] = json!("pickle");
        let other = serde_json::to_vec(&doc).unwrap();
        assert!(matches!(
            RandomForestModel::from_object_bytes(&other),
            Err(ReadError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn rejects_truncated_json() {
        let bytes = forest_model().to_object_bytes().unwrap();
        let cut = &bytes[..bytes.len() / 2];
        assert!(matches!(RandomForestModel::from_object_bytes(cut), Err(ReadError::Json(_))));
    }
}
