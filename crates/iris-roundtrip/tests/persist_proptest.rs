//! Property-based tests for the persisted formats.
//!
//! Arbitrary small ensembles go through each format and must predict the
//! same scores afterwards. ONNX sums pre-divided class weights, so its
//! probabilities are compared with a tolerance.

use std::collections::BTreeMap;

use ndarray::Array2;
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use iris_roundtrip::model::{Classifier, GBDTModel, ModelMeta, RandomForestModel};
use iris_roundtrip::persist::onnx::to_onnx_bytes;
use iris_roundtrip::persist::{parse_text, write_text, ObjectModel, OnnxSession, SerializableModel};
use iris_roundtrip::repr::{Forest, LeafValue, MutableTree, ScalarLeaf, Tree, VectorLeaf};

const N_FEATURES: usize = 4;
const N_CLASSES: usize = 3;

// =============================================================================
// Generators
// =============================================================================

fn arb_finite_f32() -> impl Strategy<Value = f32> {
    prop::num::f32::NORMAL.prop_map(|x| x.clamp(-1e3, 1e3))
}

/// Splits and leaves for a tree of up to three internal nodes.
#[derive(Debug, Clone)]
struct TreeShape {
    depth: usize,
    features: Vec<u32>,
    thresholds: Vec<f32>,
    default_left: Vec<bool>,
}

fn arb_shape() -> impl Strategy<Value = TreeShape> {
    (
        0usize..=2,
        prop_vec(0u32..N_FEATURES as u32, 3),
        prop_vec(-10.0f32..10.0, 3),
        prop_vec(any::<bool>(), 3),
    )
        .prop_map(|(depth, features, thresholds, default_left)| TreeShape {
            depth,
            features,
            thresholds,
            default_left,
        })
}

fn build_tree<L: LeafValue>(shape: &TreeShape, mut leaf: impl FnMut(usize) -> L) -> Tree<L> {
    let mut tree = MutableTree::<L>::with_capacity(7);
    let root = tree.init_root();
    let split = |tree: &mut MutableTree<L>, node: u32, i: usize| {
        tree.apply_numeric_split(
            node,
            shape.features[i],
            shape.thresholds[i],
            shape.default_left[i],
        )
    };
    match shape.depth {
        0 => tree.make_leaf(root, leaf(0)),
        1 => {
            let (l, r) = split(&mut tree, root, 0);
            tree.make_leaf(l, leaf(0));
            tree.make_leaf(r, leaf(1));
        }
        _ => {
            let (l, r) = split(&mut tree, root, 0);
            let (ll, lr) = split(&mut tree, l, 1);
            let (rl, rr) = split(&mut tree, r, 2);
            for (i, node) in [ll, lr, rl, rr].into_iter().enumerate() {
                tree.make_leaf(node, leaf(i));
            }
        }
    }
    tree.freeze()
}

/// Boosted ensemble with one tree per class per round.
fn arb_gbdt() -> impl Strategy<Value = GBDTModel> {
    prop_vec((arb_shape(), prop_vec(arb_finite_f32(), 4)), N_CLASSES..=3 * N_CLASSES)
        .prop_map(|trees| {
            let rounds = trees.len() / N_CLASSES;
            let mut forest = Forest::<ScalarLeaf>::new(N_CLASSES as u32);
            for (i, (shape, leaves)) in trees.iter().take(rounds * N_CLASSES).enumerate() {
                let tree = build_tree(shape, |j| ScalarLeaf(leaves[j]));
                forest.push_tree(tree, (i % N_CLASSES) as u32);
            }
            let meta = ModelMeta::for_multiclass(N_FEATURES, N_CLASSES);
            GBDTModel::from_parts(forest, meta, BTreeMap::new()).expect("generated model is valid")
        })
}

/// Random forest whose leaves hold class distributions.
fn arb_forest() -> impl Strategy<Value = RandomForestModel> {
    prop_vec((arb_shape(), prop_vec(prop_vec(0u32..20, N_CLASSES), 4)), 1..8).prop_map(|trees| {
        let mut forest = Forest::<VectorLeaf>::new(N_CLASSES as u32);
        for (shape, counts) in &trees {
            let tree = build_tree(shape, |j| {
                let weights: Vec<f64> = counts[j].iter().map(|&c| c as f64).collect();
                VectorLeaf::from_class_weights(&weights)
            });
            forest.push_tree(tree, 0);
        }
        let meta = ModelMeta::for_multiclass(N_FEATURES, N_CLASSES);
        RandomForestModel::from_parts(forest, meta, BTreeMap::new())
            .expect("generated forest is valid")
    })
}

fn arb_rows() -> impl Strategy<Value = Array2<f32>> {
    prop_vec(-12.0f32..12.0, N_FEATURES * 8)
        .prop_map(|values| {
            Array2::from_shape_vec((8, N_FEATURES), values).expect("row-major shape")
        })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn native_preserves_gbdt(model in arb_gbdt(), rows in arb_rows()) {
        let bytes = model.to_native_bytes().unwrap();
        let reloaded = GBDTModel::from_native_bytes(&bytes).unwrap();
        prop_assert_eq!(&reloaded, &model);
        prop_assert_eq!(
            reloaded.predict_raw(rows.view()).unwrap(),
            model.predict_raw(rows.view()).unwrap()
        );
    }

    #[test]
    fn text_preserves_raw_scores(model in arb_gbdt(), rows in arb_rows()) {
        let text = write_text(&model).unwrap();
        let reloaded = parse_text(&text).unwrap();
        prop_assert_eq!(reloaded.forest().n_trees(), model.forest().n_trees());
        prop_assert_eq!(
            reloaded.predict_raw(rows.view()).unwrap(),
            model.predict_raw(rows.view()).unwrap()
        );
        // Writing the reloaded model again is stable.
        prop_assert_eq!(write_text(&reloaded).unwrap(), text);
    }

    #[test]
    fn object_preserves_forest(model in arb_forest(), rows in arb_rows()) {
        let bytes = model.to_object_bytes().unwrap();
        let reloaded = RandomForestModel::from_object_bytes(&bytes).unwrap();
        prop_assert_eq!(&reloaded, &model);
        prop_assert_eq!(
            reloaded.predict_proba(rows.view()).unwrap(),
            model.predict_proba(rows.view()).unwrap()
        );
    }

    #[test]
    fn onnx_preserves_probabilities(model in arb_forest(), rows in arb_rows()) {
        let session = OnnxSession::from_bytes(&to_onnx_bytes(&model).unwrap()).unwrap();
        let expected = model.predict_proba(rows.view()).unwrap();
        let actual = session.predict_proba(rows.view()).unwrap();
        for (a, e) in actual.iter().zip(expected.iter()) {
            prop_assert!((a - e).abs() <= 1e-5, "{} vs {}", a, e);
        }
    }
}
