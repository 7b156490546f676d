//! Random forest to ONNX `TreeEnsembleClassifier`.
//!
//! Every tree keeps its node numbering. Leaves carry one class weight per
//! class, the leaf probability divided by the number of trees, so the summed
//! scores are the forest's mean probabilities.

use std::path::Path;

use prost::Message;

use super::proto::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, StringStringEntryProto,
    ValueInfoProto, ELEM_TYPE_FLOAT, ELEM_TYPE_INT64,
};
use super::{
    OnnxError, INPUT_NAME, IR_VERSION, LABEL_OUTPUT, ML_DOMAIN, ML_OPSET_VERSION, OPSET_VERSION,
    PROBABILITY_OUTPUT,
};
use crate::model::{Classifier, RandomForestModel};
use crate::repr::TreeView;

/// Flattened per-node and per-leaf-class attribute arrays.
#[derive(Debug, Default)]
struct EnsembleArrays {
    nodes_treeids: Vec<i64>,
    nodes_nodeids: Vec<i64>,
    nodes_featureids: Vec<i64>,
    nodes_modes: Vec<&'static str>,
    nodes_values: Vec<f32>,
    nodes_truenodeids: Vec<i64>,
    nodes_falsenodeids: Vec<i64>,
    nodes_missing_value_tracks_true: Vec<i64>,
    nodes_hitrates: Vec<f32>,
    class_treeids: Vec<i64>,
    class_nodeids: Vec<i64>,
    class_ids: Vec<i64>,
    class_weights: Vec<f32>,
}

impl EnsembleArrays {
    fn from_model(model: &RandomForestModel) -> Self {
        let mut arrays = EnsembleArrays::default();
        let scale = model.n_trees() as f32;
        for (tree_id, tree) in model.forest().trees().enumerate() {
            let tree_id = tree_id as i64;
            for node in 0..tree.n_nodes() as u32 {
                arrays.nodes_treeids.push(tree_id);
                arrays.nodes_nodeids.push(node as i64);
                arrays.nodes_hitrates.push(1.0);
                if tree.is_leaf(node) {
                    arrays.nodes_featureids.push(0);
                    arrays.nodes_modes.push("LEAF");
                    arrays.nodes_values.push(0.0);
                    arrays.nodes_truenodeids.push(0);
                    arrays.nodes_falsenodeids.push(0);
                    arrays.nodes_missing_value_tracks_true.push(0);
                    for (class, &p) in tree.leaf_value(node).values.iter().enumerate() {
                        arrays.class_treeids.push(tree_id);
                        arrays.class_nodeids.push(node as i64);
                        arrays.class_ids.push(class as i64);
                        arrays.class_weights.push(p / scale);
                    }
                } else {
                    arrays.nodes_featureids.push(tree.split_index(node) as i64);
                    arrays.nodes_modes.push("BRANCH_LEQ");
                    arrays.nodes_values.push(tree.split_threshold(node));
                    arrays.nodes_truenodeids.push(tree.left_child(node) as i64);
                    arrays.nodes_falsenodeids.push(tree.right_child(node) as i64);
                    arrays.nodes_missing_value_tracks_true.push(tree.default_left(node) as i64);
                }
            }
        }
        arrays
    }

    fn into_attributes(self, n_classes: usize) -> Vec<AttributeProto> {
        vec![
            AttributeProto::ints("class_ids", self.class_ids),
            AttributeProto::ints("class_nodeids", self.class_nodeids),
            AttributeProto::ints("class_treeids", self.class_treeids),
            AttributeProto::floats("class_weights", self.class_weights),
            AttributeProto::ints("classlabels_int64s", (0..n_classes as i64).collect()),
            AttributeProto::ints("nodes_falsenodeids", self.nodes_falsenodeids),
            AttributeProto::ints("nodes_featureids", self.nodes_featureids),
            AttributeProto::floats("nodes_hitrates", self.nodes_hitrates),
            AttributeProto::ints(
                "nodes_missing_value_tracks_true",
                self.nodes_missing_value_tracks_true,
            ),
            AttributeProto::strings("nodes_modes", self.nodes_modes),
            AttributeProto::ints("nodes_nodeids", self.nodes_nodeids),
            AttributeProto::ints("nodes_treeids", self.nodes_treeids),
            AttributeProto::ints("nodes_truenodeids", self.nodes_truenodeids),
            AttributeProto::floats("nodes_values", self.nodes_values),
            AttributeProto::string("post_transform", "NONE"),
        ]
    }
}

fn metadata_props(model: &RandomForestModel) -> Result<Vec<StringStringEntryProto>, OnnxError> {
    let json =
        |v: &Vec<String>| serde_json::to_string(v).map_err(|e| OnnxError::Export(e.to_string()));
    let meta = model.meta();
    let mut props = Vec::new();
    if let Some(names) = &meta.feature_names {
        props.push(StringStringEntryProto {
            key: "feature_names".to_string(),
            value: json(names)?,
        });
    }
    if let Some(names) = &meta.class_names {
        props.push(StringStringEntryProto { key: "class_names".to_string(), value: json(names)? });
    }
    props.extend(
        model
            .attributes()
            .iter()
            .map(|(k, v)| StringStringEntryProto { key: k.clone(), value: v.clone() }),
    );
    Ok(props)
}

/// Build the ONNX model for a random forest.
pub fn export_random_forest(model: &RandomForestModel) -> Result<ModelProto, OnnxError> {
    if model.n_trees() == 0 {
        return Err(OnnxError::Export("forest has no trees".to_string()));
    }
    let n_features = model.n_features() as i64;
    let n_classes = model.n_classes();

    let node = NodeProto {
        input: vec![INPUT_NAME.to_string()],
        output: vec![LABEL_OUTPUT.to_string(), PROBABILITY_OUTPUT.to_string()],
        name: "TreeEnsembleClassifier".to_string(),
        op_type: "TreeEnsembleClassifier".to_string(),
        attribute: EnsembleArrays::from_model(model).into_attributes(n_classes),
        domain: ML_DOMAIN.to_string(),
        ..Default::default()
    };
    let graph = GraphProto {
        node: vec![node],
        name: "random_forest".to_string(),
        input: vec![ValueInfoProto::tensor(INPUT_NAME, ELEM_TYPE_FLOAT, &[None, Some(n_features)])],
        output: vec![
            ValueInfoProto::tensor(LABEL_OUTPUT, ELEM_TYPE_INT64, &[None]),
            ValueInfoProto::tensor(
                PROBABILITY_OUTPUT,
                ELEM_TYPE_FLOAT,
                &[None, Some(n_classes as i64)],
            ),
        ],
        ..Default::default()
    };

    Ok(ModelProto {
        ir_version: IR_VERSION,
        producer_name: env!("CARGO_PKG_NAME").to_string(),
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        model_version: 1,
        graph: Some(graph),
        opset_import: vec![
            OperatorSetIdProto { domain: String::new(), version: OPSET_VERSION },
            OperatorSetIdProto { domain: ML_DOMAIN.to_string(), version: ML_OPSET_VERSION },
        ],
        metadata_props: metadata_props(model)?,
        ..Default::default()
    })
}

/// Encoded protobuf bytes of [`export_random_forest`].
pub fn to_onnx_bytes(model: &RandomForestModel) -> Result<Vec<u8>, OnnxError> {
    Ok(export_random_forest(model)?.encode_to_vec())
}

/// Write the exported model to `path`. The parent directory must exist.
pub fn save_onnx(model: &RandomForestModel, path: impl AsRef<Path>) -> Result<(), OnnxError> {
    let path = path.as_ref();
    let bytes = to_onnx_bytes(model)?;
    std::fs::write(path, &bytes)?;
    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        trees = model.n_trees(),
        "exported onnx model"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelMeta;
    use crate::repr::{Forest, Tree, VectorLeaf};
    use std::collections::BTreeMap;

    fn two_tree_model() -> RandomForestModel {
        let stump = |threshold: f32, left: Vec<f32>, right: Vec<f32>| {
            Tree::new(
                vec![3, 0, 0],
                vec![threshold, 0.0, 0.0],
                vec![1, 0, 0],
                vec![2, 0, 0],
                vec![true, false, false],
                vec![false, true, true],
                vec![VectorLeaf::default(), VectorLeaf::new(left), VectorLeaf::new(right)],
            )
        };
        let mut forest = Forest::new(3);
        forest.push_tree(stump(0.8, vec![1.0, 0.0, 0.0], vec![0.0, 0.5, 0.5]), 0);
        forest.push_tree(stump(1.75, vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]), 0);
        let meta = ModelMeta::for_multiclass(4, 3)
            .with_class_names(vec!["setosa".into(), "versicolor".into(), "virginica".into()]);
        let params = BTreeMap::from([("n_estimators".into(), "2".into())]);
        RandomForestModel::from_parts(forest, meta, params).unwrap()
    }

    #[test]
    fn exports_expected_graph() {
        let proto = export_random_forest(&two_tree_model()).unwrap();
        assert_eq!(proto.ir_version, 7);
        assert_eq!(proto.opset_import.len(), 2);
        assert_eq!(proto.opset_import[1].domain, "ai.onnx.ml");

        let graph = proto.graph.unwrap();
        assert_eq!(graph.node.len(), 1);
        let node = &graph.node[0];
        assert_eq!(node.op_type, "TreeEnsembleClassifier");
        assert_eq!(node.output, vec!["output_label", "output_probability"]);
        assert_eq!(graph.input[0].tensor_type(), Some((ELEM_TYPE_FLOAT, vec![None, Some(4)])));
        assert_eq!(graph.output[1].tensor_type(), Some((ELEM_TYPE_FLOAT, vec![None, Some(3)])));

        let attr = |name: &str| node.attribute.iter().find(|a| a.name == name).unwrap();
        assert_eq!(attr("nodes_nodeids").ints.len(), 6);
        assert_eq!(attr("class_weights").floats.len(), 12);
        assert_eq!(attr("class_weights").floats[4], 0.25);
        assert_eq!(attr("nodes_modes").strings[0], b"BRANCH_LEQ");
        assert_eq!(attr("post_transform").s, b"NONE");

        assert!(proto
            .metadata_props
            .iter()
            .any(|p| p.key == "class_names" && p.value.contains("versicolor")));
    }
}
