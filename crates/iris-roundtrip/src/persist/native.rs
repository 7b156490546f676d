//! Native binary model format.
//!
//! ```text
//! offset  size  field
//!      0     4  magic "IRRT"
//!      4     2  version major (LE)
//!      6     2  version minor (LE)
//!      8     1  model type
//!      9     1  flags
//!     10     2  reserved (zero)
//!     12     8  payload size (LE)
//!     20     4  CRC32 of the payload (LE)
//!     24     4  number of features (LE)
//!     28     4  number of classes (LE)
//!     32     …  postcard-encoded [`Payload`]
//! ```

use std::fmt;
use std::path::Path;

use super::error::{ReadError, WriteError};
use super::payload::{Payload, TaskPayload};
use crate::model::{GBDTModel, RandomForestModel};

/// Magic bytes at the start of every native file.
pub const MAGIC: [u8; 4] = *b"IRRT";

/// Readers accept any minor version of the current major version.
pub const CURRENT_VERSION_MAJOR: u16 = 1;
pub const CURRENT_VERSION_MINOR: u16 = 0;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 32;

/// Header flag: trees carry gain and cover statistics.
pub const FLAG_NODE_STATS: u8 = 0b0000_0001;

/// Kind of model stored in a native file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModelType {
    Gbdt = 0,
    RandomForest = 1,
}

impl TryFrom<u8> for ModelType {
    type Error = ReadError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(ModelType::Gbdt),
            1 => Ok(ModelType::RandomForest),
            other => Err(ReadError::UnknownModelType(other)),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Gbdt => f.write_str("gbdt"),
            ModelType::RandomForest => f.write_str("random forest"),
        }
    }
}

/// Decoded file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u16,
    pub version_minor: u16,
    pub model_type: ModelType,
    pub flags: u8,
    pub payload_size: u64,
    pub checksum: u32,
    pub n_features: u32,
    pub n_classes: u32,
}

impl FormatHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&MAGIC);
        out[4..6].copy_from_slice(&self.version_major.to_le_bytes());
        out[6..8].copy_from_slice(&self.version_minor.to_le_bytes());
        out[8] = self.model_type as u8;
        out[9] = self.flags;
        out[12..20].copy_from_slice(&self.payload_size.to_le_bytes());
        out[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        out[24..28].copy_from_slice(&self.n_features.to_le_bytes());
        out[28..32].copy_from_slice(&self.n_classes.to_le_bytes());
        out
    }

    /// Parse and check the fixed-size header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReadError> {
        if bytes.len() < HEADER_SIZE {
            // A short file that does not even start with the magic is not ours.
            if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
                return Err(ReadError::NotAModel);
            }
            return Err(ReadError::Truncated { expected: HEADER_SIZE, actual: bytes.len() });
        }
        if bytes[0..4] != MAGIC {
            return Err(ReadError::NotAModel);
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let mut size = [0u8; 8];
        size.copy_from_slice(&bytes[12..20]);

        let version_major = u16_at(4);
        let version_minor = u16_at(6);
        if version_major != CURRENT_VERSION_MAJOR {
            return Err(ReadError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        Ok(Self {
            version_major,
            version_minor,
            model_type: ModelType::try_from(bytes[8])?,
            flags: bytes[9],
            payload_size: u64::from_le_bytes(size),
            checksum: u32_at(20),
            n_features: u32_at(24),
            n_classes: u32_at(28),
        })
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Encode a payload with its header.
pub fn encode(model_type: ModelType, payload: &Payload) -> Result<Vec<u8>, WriteError> {
    let Payload::V1(v1) = payload;
    let body = postcard::to_allocvec(payload).map_err(WriteError::Encoding)?;
    let has_stats = v1.forest.trees.iter().any(|t| t.gains.is_some());
    let header = FormatHeader {
        version_major: CURRENT_VERSION_MAJOR,
        version_minor: CURRENT_VERSION_MINOR,
        model_type,
        flags: if has_stats { FLAG_NODE_STATS } else { 0 },
        payload_size: body.len() as u64,
        checksum: crc32fast::hash(&body),
        n_features: v1.metadata.num_features,
        n_classes: task_classes(v1.metadata.task),
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode and verify a native file: header, size, checksum, payload and
/// header/payload agreement.
pub fn decode(bytes: &[u8]) -> Result<(FormatHeader, Payload), ReadError> {
    let header = FormatHeader::from_bytes(bytes)?;
    let body = &bytes[HEADER_SIZE..];
    let expected = HEADER_SIZE as u64 + header.payload_size;
    if (bytes.len() as u64) < expected {
        return Err(ReadError::Truncated {
            expected: usize::try_from(expected).unwrap_or(usize::MAX),
            actual: bytes.len(),
        });
    }
    if body.len() as u64 != header.payload_size {
        return Err(ReadError::Validation(format!(
            "{} trailing bytes after payload",
            body.len() as u64 - header.payload_size
        )));
    }

    let actual = crc32fast::hash(body);
    if actual != header.checksum {
        return Err(ReadError::ChecksumMismatch { expected: header.checksum, actual });
    }

    let payload: Payload = postcard::from_bytes(body).map_err(ReadError::CorruptPayload)?;
    let Payload::V1(v1) = &payload;
    if v1.metadata.num_features != header.n_features
        || task_classes(v1.metadata.task) != header.n_classes
    {
        return Err(ReadError::Validation(format!(
            "header describes {} features and {} classes, payload {} and {}",
            header.n_features,
            header.n_classes,
            v1.metadata.num_features,
            task_classes(v1.metadata.task),
        )));
    }
    Ok((header, payload))
}

fn task_classes(task: TaskPayload) -> u32 {
    match task {
        TaskPayload::Regression => 0,
        TaskPayload::BinaryClassification => 2,
        TaskPayload::MulticlassClassification { n_classes } => n_classes,
    }
}

// =============================================================================
// SerializableModel
// =============================================================================

/// Models that can be stored in the native binary format.
pub trait SerializableModel: Sized {
    /// Model type tag written to the header.
    const MODEL_TYPE: ModelType;

    fn to_payload(&self) -> Payload;

    fn from_payload(payload: Payload) -> Result<Self, ReadError>;

    fn to_native_bytes(&self) -> Result<Vec<u8>, WriteError> {
        encode(Self::MODEL_TYPE, &self.to_payload())
    }

    /// Decode a model, rejecting files that hold a different model type.
    fn from_native_bytes(bytes: &[u8]) -> Result<Self, ReadError> {
        let (header, payload) = decode(bytes)?;
        if header.model_type != Self::MODEL_TYPE {
            return Err(ReadError::TypeMismatch {
                expected: Self::MODEL_TYPE,
                found: header.model_type,
            });
        }
        Self::from_payload(payload)
    }

    /// Write the model to `path`. The parent directory must exist.
    fn save_native(&self, path: impl AsRef<Path>) -> Result<(), WriteError> {
        let path = path.as_ref();
        let bytes = self.to_native_bytes()?;
        std::fs::write(path, &bytes)?;
        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            model = %Self::MODEL_TYPE,
            "saved native model"
        );
        Ok(())
    }

    fn load_native(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let model = Self::from_native_bytes(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            model = %Self::MODEL_TYPE,
            "loaded native model"
        );
        Ok(model)
    }
}

impl SerializableModel for GBDTModel {
    const MODEL_TYPE: ModelType = ModelType::Gbdt;

    fn to_payload(&self) -> Payload {
        Payload::from(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, ReadError> {
        GBDTModel::try_from(payload)
    }
}

impl SerializableModel for RandomForestModel {
    const MODEL_TYPE: ModelType = ModelType::RandomForest;

    fn to_payload(&self) -> Payload {
        Payload::from(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, ReadError> {
        RandomForestModel::try_from(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::payload::{ForestPayload, ModelMetadata, PayloadV1, TreePayload};

    fn payload() -> Payload {
        Payload::V1(PayloadV1 {
            metadata: ModelMetadata {
                num_features: 2,
                task: TaskPayload::MulticlassClassification { n_classes: 2 },
                feature_names: None,
                class_names: None,
                feature_ranges: None,
                attributes: Vec::new(),
            },
            forest: ForestPayload {
                num_groups: 2,
                base_scores: vec![0.0, 0.0],
                tree_groups: vec![0],
                leaf_width: 1,
                trees: vec![TreePayload {
                    num_nodes: 1,
                    split_features: vec![0],
                    thresholds: vec![0.0],
                    left_children: vec![0],
                    right_children: vec![0],
                    default_left: vec![false],
                    is_leaf: vec![true],
                    leaf_values: vec![1.5],
                    gains: None,
                    covers: None,
                }],
            },
        })
    }

    #[test]
    fn header_roundtrip() {
        let header = FormatHeader {
            version_major: 1,
            version_minor: 3,
            model_type: ModelType::RandomForest,
            flags: FLAG_NODE_STATS,
            payload_size: 1234,
            checksum: 0xDEAD_BEEF,
            n_features: 4,
            n_classes: 3,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..4], b"IRRT");
        assert_eq!(FormatHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn encode_then_decode() {
        let bytes = encode(ModelType::Gbdt, &payload()).unwrap();
        let (header, decoded) = decode(&bytes).unwrap();
        assert_eq!(header.model_type, ModelType::Gbdt);
        assert_eq!(header.n_features, 2);
        assert_eq!(header.n_classes, 2);
        assert_eq!(header.flags, 0);
        assert_eq!(decoded, payload());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode(ModelType::Gbdt, &payload()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(ReadError::NotAModel)));
        assert!(matches!(decode(b"hi"), Err(ReadError::NotAModel)));
    }

    #[test]
    fn rejects_newer_major_version() {
        let mut bytes = encode(ModelType::Gbdt, &payload()).unwrap();
        bytes[4] = 2;
        assert!(matches!(decode(&bytes), Err(ReadError::UnsupportedVersion { major: 2, .. })));
    }

    #[test]
    fn rejects_unknown_model_type() {
        let mut bytes = encode(ModelType::Gbdt, &payload()).unwrap();
        bytes[8] = 9;
        assert!(matches!(decode(&bytes), Err(ReadError::UnknownModelType(9))));
    }

    #[test]
    fn rejects_truncation_and_corruption() {
        let bytes = encode(ModelType::Gbdt, &payload()).unwrap();
        assert!(matches!(decode(&bytes[..bytes.len() - 1]), Err(ReadError::Truncated { .. })));
        assert!(matches!(decode(&bytes[..20]), Err(ReadError::Truncated { expected: 32, .. })));

        let mut flipped = bytes.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0xFF;
        assert!(matches!(decode(&flipped), Err(ReadError::ChecksumMismatch { .. })));

        let mut extra = bytes;
        extra.push(0);
        assert!(matches!(decode(&extra), Err(ReadError::Validation(_))));
    }

    #[test]
    fn rejects_header_payload_disagreement() {
        let mut bytes = encode(ModelType::Gbdt, &payload()).unwrap();
        bytes[24] = 7;
        assert!(matches!(decode(&bytes), Err(ReadError::Validation(_))));
    }
}
