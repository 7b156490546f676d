//! LightGBM-compatible text model format.
//!
//! A line-based format with `key=value` pairs:
//! 1. **Header**: `num_class`, `num_tree_per_iteration`, `max_feature_idx`,
//!    objective, feature names and `[min:max]` feature infos
//! 2. **Trees**: one `Tree=N` block per tree, `end of trees`
//! 3. **Footer**: split-count feature importances and a `parameters:` section
//!
//! Internal nodes are numbered in breadth-first order; leaves are referenced
//! from the child arrays as `~leaf_index` (negative numbers). Splits send
//! `value <= threshold` left. The format has no base score, so it is folded
//! into the leaves of the first tree of each group on write.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use std::iter::Peekable;
use std::path::Path;
use std::str::Lines;

use thiserror::Error;

use super::error::{ReadError, WriteError};
use crate::model::{GBDTModel, ImportanceType, ModelMeta, TaskKind};
use crate::repr::{Forest, ScalarLeaf, Tree, TreeView};

// =============================================================================
// Error types
// =============================================================================

/// Error type for text model parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("array size mismatch for {field}: expected {expected}, got {actual}")]
    ArraySizeMismatch { field: &'static str, expected: usize, actual: usize },

    #[error("invalid tree format: {0}")]
    InvalidTreeFormat(String),

    #[error("unsupported model: {0}")]
    Unsupported(String),

    #[error("unexpected end of input: missing `end of trees`")]
    MissingEndOfTrees,
}

// =============================================================================
// Decision type bitfield
// =============================================================================

/// Missing value handling of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingType {
    /// Missing values are compared as zero.
    #[default]
    None,
    /// Zeros and missing values take the default direction.
    Zero,
    /// Missing values take the default direction.
    NaN,
}

/// Decoded `decision_type` entry.
///
/// Bit layout:
/// - Bit 0: categorical flag
/// - Bit 1: default left
/// - Bits 2-3: missing type (0 = None, 1 = Zero, 2 = NaN)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecisionType {
    pub is_categorical: bool,
    pub default_left: bool,
    pub missing_type: MissingType,
}

impl DecisionType {
    pub fn from_bits(value: i8) -> Self {
        let v = value as u8;
        DecisionType {
            is_categorical: v & 1 != 0,
            default_left: v & 2 != 0,
            missing_type: match (v >> 2) & 3 {
                1 => MissingType::Zero,
                2 => MissingType::NaN,
                _ => MissingType::None,
            },
        }
    }

    /// Numeric split with NaN as the missing marker.
    pub fn numeric_nan(default_left: bool) -> i8 {
        8 | if default_left { 2 } else { 0 }
    }
}

// =============================================================================
// Objective
// =============================================================================

/// Objective line of the header.
#[derive(Debug, Clone, PartialEq)]
pub enum TextObjective {
    Regression(String),
    Binary { sigmoid: f64 },
    Multiclass { num_class: usize },
    MulticlassOva { num_class: usize },
}

impl TextObjective {
    /// Parse strings such as `regression`, `binary sigmoid:1` or
    /// `multiclass num_class:3`.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.split_whitespace();
        let name = parts.next().unwrap_or("");
        let params: HashMap<&str, &str> = parts.filter_map(|p| p.split_once(':')).collect();
        let num_class = params.get("num_class").and_then(|v| v.parse().ok()).unwrap_or(2);

        match name {
            "binary" => TextObjective::Binary {
                sigmoid: params.get("sigmoid").and_then(|v| v.parse().ok()).unwrap_or(1.0),
            },
            "multiclass" | "softmax" => TextObjective::Multiclass { num_class },
            "multiclassova" | "ova" => TextObjective::MulticlassOva { num_class },
            other => TextObjective::Regression(other.to_string()),
        }
    }

    fn for_task(task: TaskKind) -> String {
        match task {
            TaskKind::Regression => "regression".to_string(),
            TaskKind::BinaryClassification => "binary sigmoid:1".to_string(),
            TaskKind::MulticlassClassification { n_classes } => {
                format!("multiclass num_class:{n_classes}")
            }
        }
    }
}

// =============================================================================
// Parsed structures
// =============================================================================

/// Parsed header section.
#[derive(Debug, Clone, Default)]
pub struct TextHeader {
    pub version: String,
    pub num_class: usize,
    pub num_tree_per_iteration: usize,
    pub max_feature_idx: usize,
    pub objective: Option<TextObjective>,
    pub average_output: bool,
    pub feature_names: Vec<String>,
    pub feature_infos: Vec<String>,
}

/// A parsed tree block.
#[derive(Debug, Clone, Default)]
pub struct TextTree {
    pub num_leaves: usize,
    pub num_cat: usize,
    pub split_feature: Vec<i32>,
    pub split_gain: Vec<f32>,
    pub threshold: Vec<f64>,
    pub decision_type: Vec<i8>,
    pub left_child: Vec<i32>,
    pub right_child: Vec<i32>,
    pub leaf_value: Vec<f64>,
    pub leaf_weight: Option<Vec<f64>>,
    pub internal_weight: Option<Vec<f64>>,
    pub is_linear: bool,
}

/// A parsed text model, before conversion.
#[derive(Debug, Clone, Default)]
pub struct TextModel {
    pub header: TextHeader,
    pub trees: Vec<TextTree>,
    pub parameters: BTreeMap<String, String>,
}

impl TextModel {
    /// Parse a model from a string.
    pub fn parse(content: &str) -> Result<Self, ParseError> {
        let mut lines = content.lines().peekable();
        let header = parse_header(&mut lines)?;

        let mut trees = Vec::new();
        let mut ended = false;
        while let Some(line) = lines.next() {
            let line = line.trim_end();
            if line.starts_with("Tree=") {
                trees.push(parse_tree(&mut lines)?);
            } else if line == "end of trees" {
                ended = true;
                break;
            }
        }
        if !ended {
            return Err(ParseError::MissingEndOfTrees);
        }

        let mut parameters = BTreeMap::new();
        let mut in_parameters = false;
        for line in lines {
            let line = line.trim_end();
            match line {
                "parameters:" => in_parameters = true,
                "end of parameters" => break,
                _ if in_parameters => {
                    let entry = line
                        .strip_prefix('[')
                        .and_then(|l| l.strip_suffix(']'))
                        .and_then(|l| l.split_once(": "));
                    if let Some((k, v)) = entry {
                        parameters.insert(k.to_string(), v.to_string());
                    }
                }
                _ => {}
            }
        }

        Ok(TextModel { header, trees, parameters })
    }

    /// Number of output groups.
    pub fn num_groups(&self) -> usize {
        self.header.num_tree_per_iteration.max(1)
    }

    pub fn num_features(&self) -> usize {
        self.header.max_feature_idx + 1
    }

    fn task(&self) -> Result<TaskKind, ParseError> {
        let groups = self.num_groups();
        match &self.header.objective {
            Some(TextObjective::Multiclass { num_class }) => {
                if *num_class != groups || self.header.num_class != groups {
                    return Err(ParseError::InvalidValue {
                        field: "num_tree_per_iteration",
                        message: format!("{groups} trees per iteration for {num_class} classes"),
                    });
                }
                Ok(TaskKind::MulticlassClassification { n_classes: *num_class })
            }
            Some(TextObjective::Binary { sigmoid }) if groups == 1 => {
                if *sigmoid != 1.0 {
                    return Err(ParseError::Unsupported(format!(
                        "binary objective with sigmoid:{sigmoid}"
                    )));
                }
                Ok(TaskKind::BinaryClassification)
            }
            Some(TextObjective::MulticlassOva { .. }) => {
                Err(ParseError::Unsupported("one-vs-all multiclass objective".to_string()))
            }
            Some(TextObjective::Regression(_)) | None if groups == 1 => Ok(TaskKind::Regression),
            _ => Err(ParseError::InvalidValue {
                field: "objective",
                message: format!("objective does not match {groups} trees per iteration"),
            }),
        }
    }

    /// Convert into a validated [`GBDTModel`].
    pub fn to_model(&self) -> Result<GBDTModel, ReadError> {
        if self.header.average_output {
            return Err(
                ParseError::Unsupported("averaged output (random forest mode)".to_string()).into(),
            );
        }
        let task = self.task()?;
        let n_features = self.num_features();
        let n_groups = self.num_groups();

        let mut forest = Forest::<ScalarLeaf>::new(n_groups as u32);
        for (idx, tree) in self.trees.iter().enumerate() {
            forest.push_tree(convert_tree(tree, idx)?, (idx % n_groups) as u32);
        }

        let mut meta = ModelMeta { n_features, task, ..Default::default() };
        if self.header.feature_names.len() == n_features {
            meta = meta.with_feature_names(self.header.feature_names.clone());
        }
        if let Some(ranges) = parse_feature_infos(&self.header.feature_infos, n_features) {
            meta = meta.with_feature_ranges(ranges);
        }

        Ok(GBDTModel::from_parts(forest, meta, self.parameters.clone())?)
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

fn parse_header(lines: &mut Peekable<Lines<'_>>) -> Result<TextHeader, ParseError> {
    match lines.next().map(str::trim_end) {
        Some("tree") => {}
        _ => {
            return Err(ParseError::InvalidValue {
                field: "model type",
                message: "first line must be `tree`".to_string(),
            });
        }
    }

    let mut header = TextHeader::default();
    let mut kv = HashMap::new();
    while let Some(line) = lines.peek() {
        let line = line.trim_end();
        if line.starts_with("Tree=") || line == "end of trees" {
            break;
        }
        if let Some((key, value)) = line.split_once('=') {
            kv.insert(key.to_string(), value.to_string());
        } else if line == "average_output" {
            header.average_output = true;
        }
        lines.next();
    }

    let get_usize = |key: &'static str| -> Result<Option<usize>, ParseError> {
        kv.get(key)
            .map(|v| {
                v.trim().parse::<usize>().map_err(|_| ParseError::InvalidValue {
                    field: key,
                    message: format!("expected an unsigned integer, got {v:?}"),
                })
            })
            .transpose()
    };

    header.version = kv.get("version").cloned().unwrap_or_default();
    header.num_class = get_usize("num_class")?.ok_or(ParseError::MissingField("num_class"))?;
    header.num_tree_per_iteration =
        get_usize("num_tree_per_iteration")?.unwrap_or(header.num_class.max(1));
    header.max_feature_idx =
        get_usize("max_feature_idx")?.ok_or(ParseError::MissingField("max_feature_idx"))?;
    header.objective = kv.get("objective").map(|o| TextObjective::parse(o));
    if let Some(names) = kv.get("feature_names") {
        header.feature_names = names.split_whitespace().map(str::to_string).collect();
    }
    if let Some(infos) = kv.get("feature_infos") {
        header.feature_infos = infos.split_whitespace().map(str::to_string).collect();
    }
    Ok(header)
}

fn parse_tree(lines: &mut Peekable<Lines<'_>>) -> Result<TextTree, ParseError> {
    let mut kv = HashMap::new();
    while let Some(line) = lines.peek() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with("Tree=") || line == "end of trees" {
            break;
        }
        if let Some((key, value)) = line.split_once('=') {
            kv.insert(key.to_string(), value.to_string());
        }
        lines.next();
    }

    let num_leaves: usize = kv
        .get("num_leaves")
        .ok_or(ParseError::MissingField("num_leaves"))?
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidValue {
            field: "num_leaves",
            message: "not an integer".to_string(),
        })?;
    if num_leaves == 0 {
        return Err(ParseError::InvalidTreeFormat("tree has no leaves".to_string()));
    }

    let mut tree = TextTree {
        num_leaves,
        num_cat: kv.get("num_cat").and_then(|v| v.trim().parse().ok()).unwrap_or(0),
        is_linear: kv.get("is_linear").is_some_and(|v| v.trim() != "0"),
        ..Default::default()
    };

    let leaf_value =
        parse_array::<f64>(&kv, "leaf_value")?.ok_or(ParseError::MissingField("leaf_value"))?;
    validate_array_size("leaf_value", &leaf_value, num_leaves)?;
    tree.leaf_value = leaf_value;
    if num_leaves == 1 {
        return Ok(tree);
    }

    let num_splits = num_leaves - 1;
    let required = |field: &'static str| -> Result<(), ParseError> {
        if kv.contains_key(field) { Ok(()) } else { Err(ParseError::MissingField(field)) }
    };
    required("split_feature")?;
    required("threshold")?;
    required("left_child")?;
    required("right_child")?;

    tree.split_feature = parse_array(&kv, "split_feature")?.unwrap_or_default();
    tree.threshold = parse_array(&kv, "threshold")?.unwrap_or_default();
    tree.left_child = parse_array(&kv, "left_child")?.unwrap_or_default();
    tree.right_child = parse_array(&kv, "right_child")?.unwrap_or_default();
    tree.decision_type = parse_array(&kv, "decision_type")?.unwrap_or_else(|| vec![0; num_splits]);
    tree.split_gain = parse_array(&kv, "split_gain")?.unwrap_or_else(|| vec![0.0; num_splits]);
    tree.leaf_weight = parse_array(&kv, "leaf_weight")?;
    tree.internal_weight = parse_array(&kv, "internal_weight")?;

    validate_array_size("split_feature", &tree.split_feature, num_splits)?;
    validate_array_size("threshold", &tree.threshold, num_splits)?;
    validate_array_size("left_child", &tree.left_child, num_splits)?;
    validate_array_size("right_child", &tree.right_child, num_splits)?;
    validate_array_size("decision_type", &tree.decision_type, num_splits)?;
    validate_array_size("split_gain", &tree.split_gain, num_splits)?;
    if let Some(w) = &tree.leaf_weight {
        validate_array_size("leaf_weight", w, num_leaves)?;
    }
    if let Some(w) = &tree.internal_weight {
        validate_array_size("internal_weight", w, num_splits)?;
    }
    Ok(tree)
}

fn parse_array<T: std::str::FromStr>(
    kv: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<Vec<T>>, ParseError> {
    let Some(raw) = kv.get(field) else {
        return Ok(None);
    };
    raw.split_whitespace()
        .map(|v| {
            v.parse().map_err(|_| ParseError::InvalidValue {
                field,
                message: format!("cannot parse {v:?}"),
            })
        })
        .collect::<Result<Vec<T>, _>>()
        .map(Some)
}

fn validate_array_size<T>(
    field: &'static str,
    arr: &[T],
    expected: usize,
) -> Result<(), ParseError> {
    if arr.len() != expected {
        return Err(ParseError::ArraySizeMismatch { field, expected, actual: arr.len() });
    }
    Ok(())
}

/// `[min:max]` per feature; `None` unless every feature has finite bounds.
fn parse_feature_infos(infos: &[String], n_features: usize) -> Option<Vec<(f32, f32)>> {
    if infos.len() != n_features {
        return None;
    }
    infos
        .iter()
        .map(|info| {
            let (lo, hi) = info.strip_prefix('[')?.strip_suffix(']')?.split_once(':')?;
            let (lo, hi) = (lo.parse::<f32>().ok()?, hi.parse::<f32>().ok()?);
            (lo.is_finite() && hi.is_finite()).then_some((lo, hi))
        })
        .collect()
}

/// Largest `f32` not above `x`, so `v <= x` and `v <= result` agree for
/// every `f32` input `v`.
fn threshold_to_f32(x: f64) -> f32 {
    let t = x as f32;
    if (t as f64) <= x || t.is_nan() {
        return t;
    }
    if t == f32::NEG_INFINITY {
        return t;
    }
    if t == 0.0 {
        return -f32::from_bits(1);
    }
    let bits = t.to_bits();
    if t > 0.0 { f32::from_bits(bits - 1) } else { f32::from_bits(bits + 1) }
}

/// Convert one parsed tree.
///
/// Internal node `i` keeps index `i`; leaf `j` becomes node `num_internal + j`.
fn convert_tree(text: &TextTree, tree_idx: usize) -> Result<Tree<ScalarLeaf>, ParseError> {
    if text.is_linear {
        return Err(ParseError::Unsupported(format!("tree {tree_idx} has linear leaves")));
    }
    if text.num_cat > 0 {
        return Err(ParseError::Unsupported(format!("tree {tree_idx} has categorical splits")));
    }

    let num_internal = text.num_leaves - 1;
    let total = num_internal + text.num_leaves;
    let mut split_indices = vec![0u32; total];
    let mut thresholds = vec![0.0f32; total];
    let mut left = vec![0u32; total];
    let mut right = vec![0u32; total];
    let mut default_left = vec![false; total];
    let mut is_leaf = vec![true; total];
    let mut leaf_values = vec![ScalarLeaf::default(); total];
    let mut gains = vec![0.0f32; total];

    let child_ref = |child: i32, node: usize| -> Result<u32, ParseError> {
        let resolved = if child < 0 {
            let leaf = !child as usize;
            (leaf < text.num_leaves).then_some(num_internal + leaf)
        } else {
            let internal = child as usize;
            (internal < num_internal).then_some(internal)
        };
        resolved.map(|n| n as u32).ok_or_else(|| {
            ParseError::InvalidTreeFormat(format!(
                "tree {tree_idx}: node {node} has invalid child {child}"
            ))
        })
    };

    for node in 0..num_internal {
        let dt = DecisionType::from_bits(text.decision_type[node]);
        if dt.is_categorical {
            return Err(ParseError::Unsupported(format!("tree {tree_idx} has categorical splits")));
        }
        let feature = u32::try_from(text.split_feature[node]).map_err(|_| {
            ParseError::InvalidTreeFormat(format!(
                "tree {tree_idx}: negative split feature at node {node}"
            ))
        })?;
        let threshold = text.threshold[node];
        default_left[node] = match dt.missing_type {
            MissingType::NaN => dt.default_left,
            // Missing values are compared as 0.0.
            MissingType::None => 0.0 <= threshold,
            MissingType::Zero => {
                return Err(ParseError::Unsupported(format!(
                    "tree {tree_idx} treats zero as missing"
                )));
            }
        };
        split_indices[node] = feature;
        thresholds[node] = threshold_to_f32(threshold);
        left[node] = child_ref(text.left_child[node], node)?;
        right[node] = child_ref(text.right_child[node], node)?;
        is_leaf[node] = false;
        gains[node] = text.split_gain[node];
    }
    for (j, &value) in text.leaf_value.iter().enumerate() {
        leaf_values[num_internal + j] = ScalarLeaf(value as f32);
    }

    let mut tree = Tree::new(
        split_indices,
        thresholds,
        left,
        right,
        default_left,
        is_leaf,
        leaf_values,
    )
    .with_gains(gains);
    if let (Some(internal), Some(leaves)) = (&text.internal_weight, &text.leaf_weight) {
        let covers = internal.iter().chain(leaves).map(|&w| w as f32).collect();
        tree = tree.with_covers(covers);
    }
    Ok(tree)
}

// =============================================================================
// Writer
// =============================================================================

/// Breadth-first numbering of a tree's internal nodes and leaves.
struct TreeLayout {
    /// Node ids of internal nodes, in output order.
    internal: Vec<u32>,
    /// Node ids of leaves, in output order.
    leaves: Vec<u32>,
    /// Output reference of every node (`index` or `~leaf_index`).
    refs: Vec<i32>,
}

impl TreeLayout {
    fn new(tree: &Tree<ScalarLeaf>) -> Self {
        let mut layout = TreeLayout {
            internal: Vec::new(),
            leaves: Vec::new(),
            refs: vec![0; tree.n_nodes()],
        };
        let mut queue = VecDeque::from([0u32]);
        while let Some(node) = queue.pop_front() {
            if tree.is_leaf(node) {
                layout.refs[node as usize] = !(layout.leaves.len() as i32);
                layout.leaves.push(node);
            } else {
                layout.refs[node as usize] = layout.internal.len() as i32;
                layout.internal.push(node);
                queue.push_back(tree.left_child(node));
                queue.push_back(tree.right_child(node));
            }
        }
        layout
    }
}

fn join<T: std::fmt::Display>(values: impl IntoIterator<Item = T>) -> String {
    values.into_iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

/// Write one `Tree=N` block. `offset` is added to every leaf value.
fn write_tree(index: usize, tree: &Tree<ScalarLeaf>, offset: f32) -> String {
    let layout = TreeLayout::new(tree);
    let covers = tree.covers();
    let cover = |node: u32| covers.map_or(0.0, |c| c[node as usize] as f64);
    let leaf_value = |node: u32| (tree.leaf_value(node).0 + offset) as f64;

    let mut out = String::new();
    let _ = writeln!(out, "Tree={index}");
    let _ = writeln!(out, "num_leaves={}", layout.leaves.len());
    let _ = writeln!(out, "num_cat=0");
    if !layout.internal.is_empty() {
        let gains = tree.gains();
        let internal = &layout.internal;
        let _ = writeln!(
            out,
            "split_feature={}",
            join(internal.iter().map(|&n| tree.split_index(n)))
        );
        let _ = writeln!(
            out,
            "split_gain={}",
            join(internal.iter().map(|&n| gains.map_or(0.0, |g| g[n as usize])))
        );
        let _ = writeln!(
            out,
            "threshold={}",
            join(internal.iter().map(|&n| tree.split_threshold(n) as f64))
        );
        let _ = writeln!(
            out,
            "decision_type={}",
            join(internal.iter().map(|&n| DecisionType::numeric_nan(tree.default_left(n))))
        );
        let _ = writeln!(
            out,
            "left_child={}",
            join(internal.iter().map(|&n| layout.refs[tree.left_child(n) as usize]))
        );
        let _ = writeln!(
            out,
            "right_child={}",
            join(internal.iter().map(|&n| layout.refs[tree.right_child(n) as usize]))
        );
    }
    let _ = writeln!(out, "leaf_value={}", join(layout.leaves.iter().map(|&n| leaf_value(n))));
    if !layout.internal.is_empty() {
        let _ = writeln!(out, "leaf_weight={}", join(layout.leaves.iter().map(|&n| cover(n))));
        let _ = writeln!(out, "leaf_count={}", join(layout.leaves.iter().map(|_| 0)));
        let _ = writeln!(out, "internal_value={}", join(layout.internal.iter().map(|_| 0)));
        let _ = writeln!(
            out,
            "internal_weight={}",
            join(layout.internal.iter().map(|&n| cover(n)))
        );
        let _ = writeln!(out, "internal_count={}", join(layout.internal.iter().map(|_| 0)));
    }
    let _ = writeln!(out, "is_linear=0");
    let _ = writeln!(out, "shrinkage=1");
    out.push_str("\n\n");
    out
}

/// Feature names with whitespace replaced, as the format requires.
fn text_feature_names(meta: &ModelMeta) -> Vec<String> {
    match &meta.feature_names {
        Some(names) => names
            .iter()
            .map(|n| n.split_whitespace().collect::<Vec<_>>().join("_"))
            .collect(),
        None => (0..meta.n_features).map(|i| format!("Column_{i}")).collect(),
    }
}

/// Render a model in the text format.
///
/// Trees must be stored round-robin over the groups (tree `i` in group
/// `i % n_groups`), which is how boosting produces them.
pub fn write_text(model: &GBDTModel) -> Result<String, WriteError> {
    let forest = model.forest();
    let meta = model.meta();
    let n_groups = forest.n_groups() as usize;

    let out_of_order = forest
        .tree_groups()
        .iter()
        .enumerate()
        .position(|(i, &g)| g as usize != i % n_groups);
    if let Some(i) = out_of_order {
        return Err(WriteError::Unsupported(format!("tree {i} is not in round-robin group order")));
    }
    for (g, &base) in forest.base_score().iter().enumerate() {
        if forest.n_trees() <= g && base != 0.0 {
            return Err(WriteError::Unsupported(format!(
                "group {g} has a base score but no tree to hold it"
            )));
        }
    }

    let blocks: Vec<String> = forest
        .trees()
        .enumerate()
        .map(|(i, tree)| {
            let offset = if i < n_groups { forest.base_score()[i] } else { 0.0 };
            write_tree(i, tree, offset)
        })
        .collect();

    let names = text_feature_names(meta);
    let infos = match &meta.feature_ranges {
        Some(ranges) => join(
            ranges
                .iter()
                .map(|&(lo, hi)| format!("[{}:{}]", lo as f64, hi as f64)),
        ),
        None => join((0..meta.n_features).map(|_| "none")),
    };
    let num_class = match meta.task {
        TaskKind::MulticlassClassification { n_classes } => n_classes,
        _ => 1,
    };

    let mut out = String::new();
    let _ = writeln!(out, "tree");
    let _ = writeln!(out, "version=v4");
    let _ = writeln!(out, "num_class={num_class}");
    let _ = writeln!(out, "num_tree_per_iteration={n_groups}");
    let _ = writeln!(out, "label_index=0");
    let _ = writeln!(out, "max_feature_idx={}", meta.n_features.saturating_sub(1));
    let _ = writeln!(out, "objective={}", TextObjective::for_task(meta.task));
    let _ = writeln!(out, "feature_names={}", join(&names));
    let _ = writeln!(out, "feature_infos={infos}");
    let _ = writeln!(out, "tree_sizes={}", join(blocks.iter().map(String::len)));
    out.push('\n');
    for block in &blocks {
        out.push_str(block);
    }
    out.push_str("end of trees\n\n");

    let importance = model
        .feature_importance(ImportanceType::Split)
        .map_err(|e| WriteError::Unsupported(e.to_string()))?;
    out.push_str("feature_importances:\n");
    for (feature, count) in importance.top_k(meta.n_features) {
        if count > 0.0 {
            let _ = writeln!(out, "{}={}", names[feature], count as u64);
        }
    }

    out.push_str("\nparameters:\n");
    for (key, value) in model.attributes() {
        let _ = writeln!(out, "[{key}: {value}]");
    }
    out.push_str("end of parameters\n\npandas_categorical:null\n");
    Ok(out)
}

/// Parse a model from text.
pub fn parse_text(content: &str) -> Result<GBDTModel, ReadError> {
    TextModel::parse(content)?.to_model()
}

/// Write `model` to `path`. The parent directory must exist.
pub fn save_text(model: &GBDTModel, path: impl AsRef<Path>) -> Result<(), WriteError> {
    let path = path.as_ref();
    let text = write_text(model)?;
    std::fs::write(path, &text)?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "saved text model");
    Ok(())
}

pub fn load_text(path: impl AsRef<Path>) -> Result<GBDTModel, ReadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let model = parse_text(&content)?;
    tracing::debug!(path = %path.display(), trees = model.forest().n_trees(), "loaded text model");
    Ok(model)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Classifier;
    use ndarray::array;

    const SMALL_MODEL: &str = "tree
version=v4
num_class=1
num_tree_per_iteration=1
label_index=0
max_feature_idx=1
objective=binary sigmoid:1
feature_names=x y
feature_infos=[0:10] [-1:1]
tree_sizes=1 1

Tree=0
num_leaves=3
num_cat=0
split_feature=0 1
split_gain=5 2
threshold=4.5 0.25
decision_type=10 0
left_child=-1 -2
right_child=1 -3
leaf_value=-1 0.5 2
is_linear=0
shrinkage=1


Tree=1
num_leaves=1
num_cat=0
leaf_value=0.25
is_linear=0
shrinkage=1


end of trees

parameters:
[boosting: gbdt]
[num_leaves: 3]
end of parameters
";

    #[test]
    fn parse_decision_type() {
        let dt = DecisionType::from_bits(0);
        assert!(!dt.is_categorical && !dt.default_left);
        assert_eq!(dt.missing_type, MissingType::None);

        let dt = DecisionType::from_bits(10);
        assert!(dt.default_left);
        assert_eq!(dt.missing_type, MissingType::NaN);

        assert!(DecisionType::from_bits(1).is_categorical);
        assert_eq!(DecisionType::from_bits(4).missing_type, MissingType::Zero);
        assert_eq!(DecisionType::numeric_nan(true), 10);
        assert_eq!(DecisionType::numeric_nan(false), 8);
    }

    #[test]
    fn parse_objective() {
        assert_eq!(
            TextObjective::parse("regression"),
            TextObjective::Regression("regression".into())
        );
        assert_eq!(
            TextObjective::parse("binary sigmoid:1"),
            TextObjective::Binary { sigmoid: 1.0 }
        );
        assert_eq!(
            TextObjective::parse("multiclass num_class:3"),
            TextObjective::Multiclass { num_class: 3 }
        );
    }

    #[test]
    fn parse_small_model() {
        let parsed = TextModel::parse(SMALL_MODEL).unwrap();
        assert_eq!(parsed.header.version, "v4");
        assert_eq!(parsed.trees.len(), 2);
        assert_eq!(parsed.num_features(), 2);
        assert_eq!(parsed.parameters["num_leaves"], "3");

        let model = parsed.to_model().unwrap();
        assert_eq!(model.meta().task, TaskKind::BinaryClassification);
        assert_eq!(model.meta().feature_ranges, Some(vec![(0.0, 10.0), (-1.0, 1.0)]));

        let x = array![[1.0f32, 0.0], [5.0, 0.0], [5.0, 1.0], [f32::NAN, 0.0], [5.0, f32::NAN]];
        let raw = model.predict_raw(x.view()).unwrap();
        assert_eq!(raw[[0, 0]], -0.75);
        assert_eq!(raw[[1, 0]], 0.75);
        assert_eq!(raw[[2, 0]], 2.25);
        // NaN with default_left on a NaN-missing split.
        assert_eq!(raw[[3, 0]], -0.75);
        // NaN on a None-missing split compares as 0.0 <= 0.25.
        assert_eq!(raw[[4, 0]], 0.75);
        assert_eq!(model.n_classes(), 2);
    }

    #[test]
    fn rejects_missing_end_of_trees() {
        let truncated = SMALL_MODEL.split("end of trees").next().unwrap();
        assert!(matches!(TextModel::parse(truncated), Err(ParseError::MissingEndOfTrees)));
    }

    #[test]
    fn rejects_categorical_and_linear_trees() {
        let categorical = SMALL_MODEL.replace("decision_type=10 0", "decision_type=1 0");
        assert!(matches!(
            parse_text(&categorical),
            Err(ReadError::Parse(ParseError::Unsupported(_)))
        ));

        let linear = SMALL_MODEL.replacen("is_linear=0", "is_linear=1", 1);
        assert!(matches!(parse_text(&linear), Err(ReadError::Parse(ParseError::Unsupported(_)))));
    }

    #[test]
    fn rejects_bad_arrays() {
        let short = SMALL_MODEL.replace("threshold=4.5 0.25", "threshold=4.5");
        assert!(matches!(
            TextModel::parse(&short),
            Err(ParseError::ArraySizeMismatch { field: "threshold", expected: 2, actual: 1 })
        ));

        let garbage = SMALL_MODEL.replace("leaf_value=-1 0.5 2", "leaf_value=-1 nope 2");
        assert!(matches!(
            TextModel::parse(&garbage),
            Err(ParseError::InvalidValue { field: "leaf_value", .. })
        ));

        let bad_child = SMALL_MODEL.replace("right_child=1 -3", "right_child=1 -9");
        assert!(matches!(
            parse_text(&bad_child),
            Err(ReadError::Parse(ParseError::InvalidTreeFormat(_)))
        ));
    }

    #[test]
    fn threshold_rounds_down_to_f32() {
        assert_eq!(threshold_to_f32(0.5), 0.5);
        let exact = 0.1f32;
        assert_eq!(threshold_to_f32(exact as f64), exact);
        // 0.1 as f64 is below 0.1f32, so the f32 below it is used.
        let t = threshold_to_f32(0.1);
        assert!((t as f64) <= 0.1 && t < 0.1f32);
    }

    #[test]
    fn writer_folds_base_score_and_reparses() {
        let model = TextModel::parse(SMALL_MODEL).unwrap().to_model().unwrap();
        let text = write_text(&model).unwrap();
        assert!(text.starts_with("tree\nversion=v4\n"));
        assert!(text.contains("end of trees"));
        assert!(text.contains("[boosting: gbdt]"));

        let back = parse_text(&text).unwrap();
        let x = array![[1.0f32, 0.0], [5.0, 1.0], [f32::NAN, f32::NAN]];
        assert_eq!(back.predict_raw(x.view()).unwrap(), model.predict_raw(x.view()).unwrap());
    }
}
