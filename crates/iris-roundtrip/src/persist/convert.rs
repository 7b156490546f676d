//! Conversion between runtime types and their stored forms.
//!
//! Runtime models convert into the postcard [`payload`](super::payload)
//! types and the JSON [`schema`](super::schema) types. The way back is
//! fallible: every length is checked before a [`Tree`] is assembled, and the
//! resulting model goes through `from_parts` validation.

use std::collections::BTreeMap;

use super::error::ReadError;
use super::payload::{ForestPayload, ModelMetadata, Payload, PayloadV1, TaskPayload, TreePayload};
use super::schema::{
    ForestSchema, GBDTModelSchema, LeafValuesSchema, ModelMetaSchema, RandomForestModelSchema,
    TaskKindSchema, TreeSchema,
};
use crate::model::{GBDTModel, ModelMeta, RandomForestModel, TaskKind};
use crate::repr::{Forest, LeafValue, ScalarLeaf, Tree, VectorLeaf};

// =============================================================================
// Leaf storage
// =============================================================================

/// Leaf types that can be stored in every format.
pub trait StoredLeaf: LeafValue {
    /// Width every leaf must have, when the type fixes it.
    const FIXED_WIDTH: Option<usize>;

    fn write_values(&self, out: &mut Vec<f32>);

    fn from_values(values: &[f32]) -> Self;

    /// Per-node values for the JSON schema.
    fn to_schema(values: &[Self]) -> LeafValuesSchema;

    fn from_schema(schema: LeafValuesSchema) -> Result<Vec<Self>, ReadError>;
}

impl StoredLeaf for ScalarLeaf {
    const FIXED_WIDTH: Option<usize> = Some(1);

    fn write_values(&self, out: &mut Vec<f32>) {
        out.push(self.0);
    }

    fn from_values(values: &[f32]) -> Self {
        ScalarLeaf(values.first().copied().unwrap_or_default())
    }

    fn to_schema(values: &[Self]) -> LeafValuesSchema {
        LeafValuesSchema::Scalar { values: values.iter().map(|v| v.0 as f64).collect() }
    }

    fn from_schema(schema: LeafValuesSchema) -> Result<Vec<Self>, ReadError> {
        match schema {
            LeafValuesSchema::Scalar { values } => {
                Ok(values.into_iter().map(|v| ScalarLeaf(v as f32)).collect())
            }
            LeafValuesSchema::Vector { .. } => {
                Err(ReadError::Validation("expected scalar leaf values, found vectors".to_string()))
            }
        }
    }
}

impl StoredLeaf for VectorLeaf {
    const FIXED_WIDTH: Option<usize> = None;

    fn write_values(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.values);
    }

    fn from_values(values: &[f32]) -> Self {
        VectorLeaf::new(values.to_vec())
    }

    fn to_schema(values: &[Self]) -> LeafValuesSchema {
        LeafValuesSchema::Vector {
            values: values
                .iter()
                .map(|leaf| leaf.values.iter().map(|&v| v as f64).collect())
                .collect(),
        }
    }

    fn from_schema(schema: LeafValuesSchema) -> Result<Vec<Self>, ReadError> {
        match schema {
            LeafValuesSchema::Vector { values } => Ok(values
                .into_iter()
                .map(|leaf| VectorLeaf::new(leaf.into_iter().map(|v| v as f32).collect()))
                .collect()),
            LeafValuesSchema::Scalar { .. } => {
                Err(ReadError::Validation("expected vector leaf values, found scalars".to_string()))
            }
        }
    }
}

fn check_len(what: &str, actual: usize, expected: usize) -> Result<(), ReadError> {
    if actual != expected {
        return Err(ReadError::Validation(format!(
            "{what} has {actual} entries, expected {expected}"
        )));
    }
    Ok(())
}

/// Assemble a tree after checking every per-node array.
#[allow(clippy::too_many_arguments)]
fn assemble_tree<L: StoredLeaf>(
    num_nodes: usize,
    split_indices: Vec<u32>,
    thresholds: Vec<f32>,
    left: Vec<u32>,
    right: Vec<u32>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<L>,
    gains: Option<Vec<f32>>,
    covers: Option<Vec<f32>>,
) -> Result<Tree<L>, ReadError> {
    if num_nodes == 0 {
        return Err(ReadError::Validation("tree has no nodes".to_string()));
    }
    check_len("split_indices", split_indices.len(), num_nodes)?;
    check_len("thresholds", thresholds.len(), num_nodes)?;
    check_len("left_children", left.len(), num_nodes)?;
    check_len("right_children", right.len(), num_nodes)?;
    check_len("default_left", default_left.len(), num_nodes)?;
    check_len("is_leaf", is_leaf.len(), num_nodes)?;
    check_len("leaf_values", leaf_values.len(), num_nodes)?;
    let mut tree = Tree::new(
        split_indices,
        thresholds,
        left,
        right,
        default_left,
        is_leaf,
        leaf_values,
    );
    if let Some(gains) = gains {
        check_len("gains", gains.len(), num_nodes)?;
        tree = tree.with_gains(gains);
    }
    if let Some(covers) = covers {
        check_len("covers", covers.len(), num_nodes)?;
        tree = tree.with_covers(covers);
    }
    Ok(tree)
}

// =============================================================================
// Payload conversions
// =============================================================================

impl From<TaskKind> for TaskPayload {
    fn from(task: TaskKind) -> Self {
        match task {
            TaskKind::Regression => TaskPayload::Regression,
            TaskKind::BinaryClassification => TaskPayload::BinaryClassification,
            TaskKind::MulticlassClassification { n_classes } => {
                TaskPayload::MulticlassClassification { n_classes: n_classes as u32 }
            }
        }
    }
}

impl From<TaskPayload> for TaskKind {
    fn from(task: TaskPayload) -> Self {
        match task {
            TaskPayload::Regression => TaskKind::Regression,
            TaskPayload::BinaryClassification => TaskKind::BinaryClassification,
            TaskPayload::MulticlassClassification { n_classes } => {
                TaskKind::MulticlassClassification { n_classes: n_classes as usize }
            }
        }
    }
}

fn metadata_to_payload(meta: &ModelMeta, attributes: &BTreeMap<String, String>) -> ModelMetadata {
    ModelMetadata {
        num_features: meta.n_features as u32,
        task: meta.task.into(),
        feature_names: meta.feature_names.clone(),
        class_names: meta.class_names.clone(),
        feature_ranges: meta.feature_ranges.clone(),
        attributes: attributes.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    }
}

fn metadata_from_payload(metadata: ModelMetadata) -> (ModelMeta, BTreeMap<String, String>) {
    let meta = ModelMeta {
        n_features: metadata.num_features as usize,
        task: metadata.task.into(),
        feature_names: metadata.feature_names,
        class_names: metadata.class_names,
        feature_ranges: metadata.feature_ranges,
    };
    (meta, metadata.attributes.into_iter().collect())
}

fn tree_to_payload<L: StoredLeaf>(tree: &Tree<L>) -> TreePayload {
    let mut leaf_values = Vec::new();
    for (value, &is_leaf) in tree.leaf_values().iter().zip(tree.leaf_flags()) {
        if is_leaf {
            value.write_values(&mut leaf_values);
        }
    }
    TreePayload {
        num_nodes: tree.leaf_flags().len() as u32,
        split_features: tree.split_indices().to_vec(),
        thresholds: tree.split_thresholds().to_vec(),
        left_children: tree.left_children().to_vec(),
        right_children: tree.right_children().to_vec(),
        default_left: tree.default_left_flags().to_vec(),
        is_leaf: tree.leaf_flags().to_vec(),
        leaf_values,
        gains: tree.gains().map(<[f32]>::to_vec),
        covers: tree.covers().map(<[f32]>::to_vec),
    }
}

fn tree_from_payload<L: StoredLeaf>(
    payload: TreePayload,
    leaf_width: usize,
) -> Result<Tree<L>, ReadError> {
    let num_nodes = payload.num_nodes as usize;
    check_len("is_leaf", payload.is_leaf.len(), num_nodes)?;
    let n_leaves = payload.is_leaf.iter().filter(|&&l| l).count();
    check_len("leaf_values", payload.leaf_values.len(), n_leaves * leaf_width)?;

    let mut chunks = payload.leaf_values.chunks(leaf_width.max(1));
    let mut leaf_values = Vec::with_capacity(num_nodes);
    for &is_leaf in &payload.is_leaf {
        let value = if is_leaf {
            chunks.next().map(L::from_values).unwrap_or_default()
        } else {
            L::default()
        };
        leaf_values.push(value);
    }

    assemble_tree(
        num_nodes,
        payload.split_features,
        payload.thresholds,
        payload.left_children,
        payload.right_children,
        payload.default_left,
        payload.is_leaf,
        leaf_values,
        payload.gains,
        payload.covers,
    )
}

fn forest_to_payload<L: StoredLeaf>(forest: &Forest<L>, leaf_width: usize) -> ForestPayload {
    ForestPayload {
        num_groups: forest.n_groups(),
        base_scores: forest.base_score().to_vec(),
        tree_groups: forest.tree_groups().to_vec(),
        leaf_width: leaf_width as u32,
        trees: forest.trees().map(tree_to_payload).collect(),
    }
}

fn forest_from_payload<L: StoredLeaf>(payload: ForestPayload) -> Result<Forest<L>, ReadError> {
    let leaf_width = payload.leaf_width as usize;
    if let Some(fixed) = L::FIXED_WIDTH {
        check_len("leaf width", leaf_width, fixed)?;
    }
    if leaf_width == 0 {
        return Err(ReadError::Validation("leaf width is zero".to_string()));
    }
    let trees = payload
        .trees
        .into_iter()
        .map(|t| tree_from_payload(t, leaf_width))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Forest::from_parts(trees, payload.tree_groups, payload.num_groups, payload.base_scores))
}

impl From<&GBDTModel> for Payload {
    fn from(model: &GBDTModel) -> Self {
        Payload::V1(PayloadV1 {
            metadata: metadata_to_payload(model.meta(), model.attributes()),
            forest: forest_to_payload(model.forest(), 1),
        })
    }
}

impl TryFrom<Payload> for GBDTModel {
    type Error = ReadError;

    fn try_from(payload: Payload) -> Result<Self, Self::Error> {
        let Payload::V1(v1) = payload;
        let forest = forest_from_payload::<ScalarLeaf>(v1.forest)?;
        let (meta, attributes) = metadata_from_payload(v1.metadata);
        Ok(GBDTModel::from_parts(forest, meta, attributes)?)
    }
}

impl From<&RandomForestModel> for Payload {
    fn from(model: &RandomForestModel) -> Self {
        Payload::V1(PayloadV1 {
            metadata: metadata_to_payload(model.meta(), model.attributes()),
            forest: forest_to_payload(model.forest(), model.meta().n_classes()),
        })
    }
}

impl TryFrom<Payload> for RandomForestModel {
    type Error = ReadError;

    fn try_from(payload: Payload) -> Result<Self, Self::Error> {
        let Payload::V1(v1) = payload;
        let forest = forest_from_payload::<VectorLeaf>(v1.forest)?;
        let (meta, attributes) = metadata_from_payload(v1.metadata);
        Ok(RandomForestModel::from_parts(forest, meta, attributes)?)
    }
}

// =============================================================================
// Schema conversions
// =============================================================================

impl From<&ModelMeta> for ModelMetaSchema {
    fn from(meta: &ModelMeta) -> Self {
        let (task, num_classes) = match meta.task {
            TaskKind::Regression => (TaskKindSchema::Regression, None),
            TaskKind::BinaryClassification => (TaskKindSchema::BinaryClassification, None),
            TaskKind::MulticlassClassification { n_classes } => {
                (TaskKindSchema::MulticlassClassification, Some(n_classes))
            }
        };
        ModelMetaSchema {
            task,
            num_features: meta.n_features,
            num_classes,
            feature_names: meta.feature_names.clone(),
            class_names: meta.class_names.clone(),
            feature_ranges: meta
                .feature_ranges
                .as_ref()
                .map(|r| r.iter().map(|&(lo, hi)| [lo as f64, hi as f64]).collect()),
        }
    }
}

impl TryFrom<ModelMetaSchema> for ModelMeta {
    type Error = ReadError;

    fn try_from(schema: ModelMetaSchema) -> Result<Self, Self::Error> {
        let task = match schema.task {
            TaskKindSchema::Regression => TaskKind::Regression,
            TaskKindSchema::BinaryClassification => TaskKind::BinaryClassification,
            TaskKindSchema::MulticlassClassification => match schema.num_classes {
                Some(n_classes) => TaskKind::MulticlassClassification { n_classes },
                None => {
                    return Err(ReadError::Validation(
                        "multiclass task without num_classes".to_string(),
                    ));
                }
            },
        };
        Ok(ModelMeta {
            n_features: schema.num_features,
            task,
            feature_names: schema.feature_names,
            class_names: schema.class_names,
            feature_ranges: schema
                .feature_ranges
                .map(|r| r.into_iter().map(|[lo, hi]| (lo as f32, hi as f32)).collect()),
        })
    }
}

fn to_f64(values: &[f32]) -> Vec<f64> {
    values.iter().map(|&v| v as f64).collect()
}

fn to_f32(values: Vec<f64>) -> Vec<f32> {
    values.into_iter().map(|v| v as f32).collect()
}

impl<L: StoredLeaf> From<&Tree<L>> for TreeSchema {
    fn from(tree: &Tree<L>) -> Self {
        TreeSchema {
            num_nodes: tree.leaf_flags().len() as u32,
            split_indices: tree.split_indices().to_vec(),
            thresholds: to_f64(tree.split_thresholds()),
            children_left: tree.left_children().to_vec(),
            children_right: tree.right_children().to_vec(),
            default_left: tree.default_left_flags().to_vec(),
            is_leaf: tree.leaf_flags().to_vec(),
            leaf_values: L::to_schema(tree.leaf_values()),
            gains: tree.gains().map(to_f64),
            covers: tree.covers().map(to_f64),
        }
    }
}

fn tree_from_schema<L: StoredLeaf>(schema: TreeSchema) -> Result<Tree<L>, ReadError> {
    assemble_tree(
        schema.num_nodes as usize,
        schema.split_indices,
        to_f32(schema.thresholds),
        schema.children_left,
        schema.children_right,
        schema.default_left,
        schema.is_leaf,
        L::from_schema(schema.leaf_values)?,
        schema.gains.map(to_f32),
        schema.covers.map(to_f32),
    )
}

impl<L: StoredLeaf> From<&Forest<L>> for ForestSchema {
    fn from(forest: &Forest<L>) -> Self {
        ForestSchema {
            trees: forest.trees().map(TreeSchema::from).collect(),
            tree_groups: forest.tree_groups().to_vec(),
            n_groups: forest.n_groups(),
            base_score: to_f64(forest.base_score()),
        }
    }
}

fn forest_from_schema<L: StoredLeaf>(schema: ForestSchema) -> Result<Forest<L>, ReadError> {
    let trees = schema
        .trees
        .into_iter()
        .map(tree_from_schema)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Forest::from_parts(trees, schema.tree_groups, schema.n_groups, to_f32(schema.base_score)))
}

impl From<&GBDTModel> for GBDTModelSchema {
    fn from(model: &GBDTModel) -> Self {
        GBDTModelSchema {
            meta: model.meta().into(),
            forest: model.forest().into(),
            attributes: model.attributes().clone(),
        }
    }
}

impl TryFrom<GBDTModelSchema> for GBDTModel {
    type Error = ReadError;

    fn try_from(schema: GBDTModelSchema) -> Result<Self, Self::Error> {
        let forest = forest_from_schema::<ScalarLeaf>(schema.forest)?;
        Ok(GBDTModel::from_parts(forest, schema.meta.try_into()?, schema.attributes)?)
    }
}

impl From<&RandomForestModel> for RandomForestModelSchema {
    fn from(model: &RandomForestModel) -> Self {
        RandomForestModelSchema {
            meta: model.meta().into(),
            forest: model.forest().into(),
            attributes: model.attributes().clone(),
        }
    }
}

impl TryFrom<RandomForestModelSchema> for RandomForestModel {
    type Error = ReadError;

    fn try_from(schema: RandomForestModelSchema) -> Result<Self, Self::Error> {
        let forest = forest_from_schema::<VectorLeaf>(schema.forest)?;
        Ok(RandomForestModel::from_parts(forest, schema.meta.try_into()?, schema.attributes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree<VectorLeaf> {
        Tree::new(
            vec![1, 0, 0],
            vec![0.75, 0.0, 0.0],
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![
                VectorLeaf::default(),
                VectorLeaf::new(vec![1.0, 0.0]),
                VectorLeaf::new(vec![0.25, 0.75]),
            ],
        )
        .with_gains(vec![0.5, 0.0, 0.0])
    }

    #[test]
    fn vector_tree_survives_payload() {
        let tree = stump();
        let payload = tree_to_payload(&tree);
        assert_eq!(payload.leaf_values, vec![1.0, 0.0, 0.25, 0.75]);
        let back: Tree<VectorLeaf> = tree_from_payload(payload, 2).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn vector_tree_survives_schema() {
        let tree = stump();
        let back: Tree<VectorLeaf> = tree_from_schema(TreeSchema::from(&tree)).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn short_arrays_are_rejected() {
        let mut payload = tree_to_payload(&stump());
        payload.thresholds.pop();
        assert!(matches!(
            tree_from_payload::<VectorLeaf>(payload, 2),
            Err(ReadError::Validation(_))
        ));

        let mut payload = tree_to_payload(&stump());
        payload.leaf_values.pop();
        assert!(matches!(
            tree_from_payload::<VectorLeaf>(payload, 2),
            Err(ReadError::Validation(_))
        ));
    }

    #[test]
    fn scalar_forest_needs_width_one() {
        let payload = ForestPayload {
            num_groups: 1,
            base_scores: vec![0.0],
            tree_groups: vec![],
            leaf_width: 2,
            trees: vec![],
        };
        assert!(forest_from_payload::<ScalarLeaf>(payload).is_err());
    }

    #[test]
    fn wrong_leaf_kind_in_schema() {
        let schema = LeafValuesSchema::Scalar { values: vec![1.0] };
        assert!(VectorLeaf::from_schema(schema).is_err());
    }
}
