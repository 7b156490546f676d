//! A validating evaluator for `TreeEnsembleClassifier` graphs.
//!
//! [`OnnxSession`] accepts graphs with one `ai.onnx.ml` tree-ensemble node and
//! rejects anything it cannot evaluate exactly: other operators, string class
//! labels, non-`NONE` post transforms and unknown attributes.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2};
use prost::Message;

use super::proto::{AttributeProto, GraphProto, ModelProto, NodeProto};
use super::{OnnxError, ML_DOMAIN};
use crate::model::classifier::check_features;
use crate::model::{Classifier, PredictError};
use crate::utils::{argmax, RowMatrix};

/// Comparison applied at a branch node; `true` takes the true branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchMode {
    Leq,
    Lt,
    Gte,
    Gt,
    Eq,
    Neq,
}

impl BranchMode {
    fn parse(mode: &str) -> Option<Self> {
        Some(match mode {
            "BRANCH_LEQ" => BranchMode::Leq,
            "BRANCH_LT" => BranchMode::Lt,
            "BRANCH_GTE" => BranchMode::Gte,
            "BRANCH_GT" => BranchMode::Gt,
            "BRANCH_EQ" => BranchMode::Eq,
            "BRANCH_NEQ" => BranchMode::Neq,
            _ => return None,
        })
    }

    #[inline]
    fn holds(self, value: f32, threshold: f32) -> bool {
        match self {
            BranchMode::Leq => value <= threshold,
            BranchMode::Lt => value < threshold,
            BranchMode::Gte => value >= threshold,
            BranchMode::Gt => value > threshold,
            BranchMode::Eq => value == threshold,
            BranchMode::Neq => value != threshold,
        }
    }
}

#[derive(Debug, Clone)]
enum EnsembleNode {
    Branch {
        feature: usize,
        threshold: f32,
        mode: BranchMode,
        if_true: usize,
        if_false: usize,
        missing_true: bool,
    },
    Leaf { weights: Vec<(usize, f32)> },
}

#[derive(Debug, Clone)]
struct EnsembleTree {
    nodes: Vec<EnsembleNode>,
    root: usize,
}

impl EnsembleTree {
    fn add_leaf_weights(&self, row: &[f32], scores: &mut [f32]) {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx] {
                EnsembleNode::Branch {
                    feature,
                    threshold,
                    mode,
                    if_true,
                    if_false,
                    missing_true,
                } => {
                    let value = row[*feature];
                    let go_true = if value.is_nan() && *missing_true {
                        true
                    } else {
                        mode.holds(value, *threshold)
                    };
                    idx = if go_true { *if_true } else { *if_false };
                }
                EnsembleNode::Leaf { weights } => {
                    for &(class, w) in weights {
                        scores[class] += w;
                    }
                    return;
                }
            }
        }
    }

    /// Every node reachable exactly once from the root.
    fn check_structure(&self, tree_id: i64) -> Result<(), OnnxError> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut seen[idx], true) {
                return Err(OnnxError::InvalidEnsemble(format!(
                    "tree {tree_id} has a cycle or shared node"
                )));
            }
            if let EnsembleNode::Branch { if_true, if_false, .. } = self.nodes[idx] {
                stack.push(if_true);
                stack.push(if_false);
            }
        }
        if seen.iter().any(|s| !s) {
            return Err(OnnxError::InvalidEnsemble(format!("tree {tree_id} has unreachable nodes")));
        }
        Ok(())
    }
}

/// Outputs of one run, named after the graph outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct OnnxOutputs {
    /// `output_label`: class label per row.
    pub labels: Array1<i64>,
    /// `output_probability`: per-class scores, `[n_rows, n_classes]`.
    pub probabilities: Array2<f32>,
}

/// A decoded and validated tree-ensemble classifier graph.
#[derive(Debug, Clone)]
pub struct OnnxSession {
    input_name: String,
    output_names: [String; 2],
    n_features: usize,
    class_labels: Vec<i64>,
    base_values: Vec<f32>,
    trees: Vec<EnsembleTree>,
    metadata: BTreeMap<String, String>,
}

const KNOWN_ATTRIBUTES: &[&str] = &[
    "base_values",
    "class_ids",
    "class_nodeids",
    "class_treeids",
    "class_weights",
    "classlabels_int64s",
    "classlabels_strings",
    "nodes_falsenodeids",
    "nodes_featureids",
    "nodes_hitrates",
    "nodes_missing_value_tracks_true",
    "nodes_modes",
    "nodes_nodeids",
    "nodes_treeids",
    "nodes_truenodeids",
    "nodes_values",
    "post_transform",
];

struct Attributes<'a>(HashMap<&'a str, &'a AttributeProto>);

impl<'a> Attributes<'a> {
    fn new(node: &'a NodeProto) -> Result<Self, OnnxError> {
        let mut map = HashMap::new();
        for attr in &node.attribute {
            if !KNOWN_ATTRIBUTES.contains(&attr.name.as_str()) {
                return Err(OnnxError::UnsupportedAttribute {
                    name: attr.name.clone(),
                    value: "unknown attribute".into(),
                });
            }
            map.insert(attr.name.as_str(), attr);
        }
        Ok(Attributes(map))
    }

    fn ints(&self, name: &'static str) -> Result<&'a [i64], OnnxError> {
        self.0.get(name).map(|a| a.ints.as_slice()).ok_or(OnnxError::MissingAttribute(name))
    }

    fn floats(&self, name: &'static str) -> Result<&'a [f32], OnnxError> {
        self.0.get(name).map(|a| a.floats.as_slice()).ok_or(OnnxError::MissingAttribute(name))
    }

    fn strings(&self, name: &'static str) -> Result<Vec<String>, OnnxError> {
        let attr = self.0.get(name).ok_or(OnnxError::MissingAttribute(name))?;
        Ok(attr.strings.iter().map(|s| String::from_utf8_lossy(s).into_owned()).collect())
    }

    fn string(&self, name: &'static str) -> Option<String> {
        self.0.get(name).map(|a| String::from_utf8_lossy(&a.s).into_owned())
    }

    fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

fn check_len<T>(name: &'static str, values: &[T], expected: usize) -> Result<(), OnnxError> {
    if values.len() != expected {
        return Err(OnnxError::AttributeLength { name, expected, actual: values.len() });
    }
    Ok(())
}

fn check_opsets(model: &ModelProto) -> Result<(), OnnxError> {
    if model.ir_version < 3 {
        return Err(OnnxError::UnsupportedIrVersion(model.ir_version));
    }
    let ml = model
        .opset_import
        .iter()
        .find(|o| o.domain == ML_DOMAIN)
        .ok_or(OnnxError::MissingOpset(ML_DOMAIN))?;
    // TreeEnsembleClassifier-1 and -3 share the list-valued attributes.
    if !(1..=3).contains(&ml.version) {
        return Err(OnnxError::UnsupportedOpset { domain: ml.domain.clone(), version: ml.version });
    }
    Ok(())
}

/// Input and output names and the feature count declared by the graph.
fn check_io(
    graph: &GraphProto,
    node: &NodeProto,
) -> Result<(String, [String; 2], Option<usize>), OnnxError> {
    let [input] = graph.input.as_slice() else {
        return Err(OnnxError::InvalidIo(format!(
            "expected one graph input, found {}",
            graph.input.len()
        )));
    };
    if node.input.as_slice() != [input.name.clone()] {
        return Err(OnnxError::InvalidIo(format!(
            "node reads {:?}, graph input is {:?}",
            node.input, input.name
        )));
    }
    let outputs: Vec<&str> = graph.output.iter().map(|o| o.name.as_str()).collect();
    let [label, proba] = node.output.as_slice() else {
        return Err(OnnxError::InvalidIo(format!(
            "node has {} outputs, expected 2",
            node.output.len()
        )));
    };
    if outputs != [label.as_str(), proba.as_str()] {
        return Err(OnnxError::InvalidIo(format!(
            "graph outputs {outputs:?} differ from node outputs {:?}",
            node.output
        )));
    }

    let n_features = match input.tensor_type() {
        Some((super::proto::ELEM_TYPE_FLOAT, dims)) if dims.len() == 2 => {
            dims[1].map(|d| d as usize)
        }
        _ => {
            return Err(OnnxError::InvalidIo(format!(
                "input {:?} must be a 2-d float tensor",
                input.name
            )));
        }
    };
    Ok((input.name.clone(), [label.clone(), proba.clone()], n_features))
}

impl OnnxSession {
    /// Decode and validate a serialized `ModelProto`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OnnxError> {
        let model = ModelProto::decode(bytes)?;
        Self::from_proto(&model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, OnnxError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let session = Self::from_bytes(&bytes)?;
        tracing::debug!(path = %path.display(), trees = session.trees.len(), "loaded onnx model");
        Ok(session)
    }

    /// Validate a decoded model.
    pub fn from_proto(model: &ModelProto) -> Result<Self, OnnxError> {
        check_opsets(model)?;
        let graph = model.graph.as_ref().ok_or(OnnxError::MissingGraph)?;
        let [node] = graph.node.as_slice() else {
            return Err(OnnxError::NodeCount(graph.node.len()));
        };
        if node.op_type != "TreeEnsembleClassifier" || node.domain != ML_DOMAIN {
            return Err(OnnxError::UnsupportedOperator {
                domain: node.domain.clone(),
                op_type: node.op_type.clone(),
            });
        }
        let (input_name, output_names, declared_features) = check_io(graph, node)?;

        let attrs = Attributes::new(node)?;
        if attrs.contains("classlabels_strings") {
            return Err(OnnxError::UnsupportedAttribute {
                name: "classlabels_strings".into(),
                value: "string class labels".into(),
            });
        }
        if let Some(transform) = attrs.string("post_transform") {
            if transform != "NONE" {
                return Err(OnnxError::UnsupportedAttribute {
                    name: "post_transform".into(),
                    value: transform,
                });
            }
        }

        let class_labels = attrs.ints("classlabels_int64s")?.to_vec();
        let n_classes = class_labels.len();
        if n_classes < 2 {
            return Err(OnnxError::InvalidEnsemble(format!("{n_classes} class labels")));
        }
        let base_values = match attrs.0.get("base_values") {
            Some(a) => {
                check_len("base_values", &a.floats, n_classes)?;
                a.floats.clone()
            }
            None => vec![0.0; n_classes],
        };

        let max_feature = attrs
            .ints("nodes_featureids")?
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
            .max(0) as usize;
        let n_features = declared_features.unwrap_or(max_feature + 1);
        let trees = build_trees(&attrs, n_features, n_classes)?;

        let metadata = model
            .metadata_props
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect();
        Ok(OnnxSession {
            input_name,
            output_names,
            n_features,
            class_labels,
            base_values,
            trees,
            metadata,
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Label and probability output names.
    pub fn output_names(&self) -> [&str; 2] {
        [&self.output_names[0], &self.output_names[1]]
    }

    pub fn class_labels(&self) -> &[i64] {
        &self.class_labels
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// `metadata_props` of the model.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    fn scores(&self, rows: &RowMatrix) -> Array2<f32> {
        let mut out = Array2::zeros((rows.n_rows(), self.class_labels.len()));
        for (r, mut out_row) in out.rows_mut().into_iter().enumerate() {
            let mut scores = self.base_values.clone();
            for tree in &self.trees {
                tree.add_leaf_weights(rows.row(r), &mut scores);
            }
            for (dst, src) in out_row.iter_mut().zip(scores) {
                *dst = src;
            }
        }
        out
    }

    /// Evaluate the graph on `features`.
    pub fn run(&self, features: ArrayView2<'_, f32>) -> Result<OnnxOutputs, OnnxError> {
        check_features(features, self.n_features)?;
        let probabilities = self.scores(&RowMatrix::from_view(features));
        let labels = probabilities
            .rows()
            .into_iter()
            .map(|row| self.class_labels[argmax(&row.to_vec())])
            .collect();
        Ok(OnnxOutputs { labels, probabilities })
    }
}

/// Resolve node and class arrays into per-tree structures, ordered by tree id.
fn build_trees(
    attrs: &Attributes<'_>,
    n_features: usize,
    n_classes: usize,
) -> Result<Vec<EnsembleTree>, OnnxError> {
    let node_ids = attrs.ints("nodes_nodeids")?;
    let n = node_ids.len();
    let tree_ids = attrs.ints("nodes_treeids")?;
    let feature_ids = attrs.ints("nodes_featureids")?;
    let modes = attrs.strings("nodes_modes")?;
    let values = attrs.floats("nodes_values")?;
    let true_ids = attrs.ints("nodes_truenodeids")?;
    let false_ids = attrs.ints("nodes_falsenodeids")?;
    check_len("nodes_treeids", tree_ids, n)?;
    check_len("nodes_featureids", feature_ids, n)?;
    check_len("nodes_modes", &modes, n)?;
    check_len("nodes_values", values, n)?;
    check_len("nodes_truenodeids", true_ids, n)?;
    check_len("nodes_falsenodeids", false_ids, n)?;
    let missing: Vec<i64> = match attrs.0.get("nodes_missing_value_tracks_true") {
        Some(a) if !a.ints.is_empty() => {
            check_len("nodes_missing_value_tracks_true", &a.ints, n)?;
            a.ints.clone()
        }
        _ => vec![0; n],
    };

    // tree id -> (node id -> local index)
    let mut index: BTreeMap<i64, HashMap<i64, usize>> = BTreeMap::new();
    for i in 0..n {
        let local = index.entry(tree_ids[i]).or_default();
        let next = local.len();
        if local.insert(node_ids[i], next).is_some() {
            return Err(OnnxError::InvalidEnsemble(format!(
                "duplicate node {} in tree {}",
                node_ids[i], tree_ids[i]
            )));
        }
    }
    let mut trees: BTreeMap<i64, Vec<EnsembleNode>> = BTreeMap::new();
    for i in 0..n {
        let tree_id = tree_ids[i];
        let local = &index[&tree_id];
        let node = if modes[i] == "LEAF" {
            EnsembleNode::Leaf { weights: Vec::new() }
        } else {
            let mode = BranchMode::parse(&modes[i]).ok_or_else(|| OnnxError::UnsupportedAttribute {
                name: "nodes_modes".into(),
                value: modes[i].clone(),
            })?;
            let feature = usize::try_from(feature_ids[i])
                .ok()
                .filter(|&f| f < n_features)
                .ok_or_else(|| {
                    OnnxError::InvalidEnsemble(format!(
                        "feature {} out of range in tree {tree_id}",
                        feature_ids[i]
                    ))
                })?;
            let child = |id: i64| {
                local.get(&id).copied().ok_or_else(|| {
                    OnnxError::InvalidEnsemble(format!(
                        "tree {tree_id} references missing node {id}"
                    ))
                })
            };
            EnsembleNode::Branch {
                feature,
                threshold: values[i],
                mode,
                if_true: child(true_ids[i])?,
                if_false: child(false_ids[i])?,
                missing_true: missing[i] != 0,
            }
        };
        trees.entry(tree_id).or_default().push(node);
    }

    let class_tree_ids = attrs.ints("class_treeids")?;
    let k = class_tree_ids.len();
    let class_node_ids = attrs.ints("class_nodeids")?;
    let class_ids = attrs.ints("class_ids")?;
    let class_weights = attrs.floats("class_weights")?;
    check_len("class_nodeids", class_node_ids, k)?;
    check_len("class_ids", class_ids, k)?;
    check_len("class_weights", class_weights, k)?;
    for j in 0..k {
        let (tree_id, node_id) = (class_tree_ids[j], class_node_ids[j]);
        let target = index
            .get(&tree_id)
            .and_then(|local| local.get(&node_id))
            .and_then(|&idx| trees.get_mut(&tree_id).map(|nodes| &mut nodes[idx]));
        let Some(EnsembleNode::Leaf { weights }) = target else {
            return Err(OnnxError::InvalidEnsemble(format!(
                "class weight {j} does not point at a leaf"
            )));
        };
        let class = usize::try_from(class_ids[j])
            .ok()
            .filter(|&c| c < n_classes)
            .ok_or_else(|| {
                OnnxError::InvalidEnsemble(format!("class id {} out of range", class_ids[j]))
            })?;
        weights.push((class, class_weights[j]));
    }

    trees
        .into_iter()
        .map(|(tree_id, nodes)| {
            let mut referenced = vec![false; nodes.len()];
            for node in &nodes {
                if let EnsembleNode::Branch { if_true, if_false, .. } = node {
                    referenced[*if_true] = true;
                    referenced[*if_false] = true;
                }
            }
            let roots: Vec<usize> = (0..nodes.len()).filter(|&i| !referenced[i]).collect();
            let [root] = roots.as_slice() else {
                return Err(OnnxError::InvalidEnsemble(format!(
                    "tree {tree_id} has {} roots",
                    roots.len()
                )));
            };
            let tree = EnsembleTree { nodes, root: *root };
            tree.check_structure(tree_id)?;
            Ok(tree)
        })
        .collect()
}

impl Classifier for OnnxSession {
    fn n_classes(&self) -> usize {
        self.class_labels.len()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, PredictError> {
        check_features(features, self.n_features)?;
        Ok(self.scores(&RowMatrix::from_view(features)))
    }

    /// The `output_label` values; labels must be non-negative.
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array1<u32>, PredictError> {
        let outputs = self.run(features).map_err(|e| match e {
            OnnxError::Predict(inner) => inner,
            other => PredictError::Evaluation(other.to_string()),
        })?;
        outputs
            .labels
            .iter()
            .map(|&l| {
                u32::try_from(l).map_err(|_| {
                    PredictError::Evaluation(format!("label {l} is not a class index"))
                })
            })
            .collect()
    }
}
