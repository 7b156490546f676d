//! End-to-end train and check runs for every backend.
//!
//! Each case writes into its own temporary artifact root, so the cases can
//! run in parallel.

use std::collections::BTreeMap;

use approx::assert_abs_diff_eq;
use rstest::rstest;

use iris_roundtrip::data::load_iris_split;
use iris_roundtrip::harness::{
    check, train, xgboost_preset, Artifact, Backend, HarnessError, ModelLayout,
};
use iris_roundtrip::model::{GBDTModel, ModelMeta};
use iris_roundtrip::persist::{ReadError, SerializableModel};
use iris_roundtrip::repr::{Forest, ScalarLeaf, Tree};

fn temp_layout() -> (tempfile::TempDir, ModelLayout) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let layout = ModelLayout::new(dir.path().join("models/mlserver"));
    (dir, layout)
}

#[rstest]
#[case::lightgbm(Backend::LightGbm)]
#[case::xgboost(Backend::XgBoost)]
#[case::sklearn(Backend::Sklearn)]
#[case::onnx(Backend::Onnx)]
fn train_then_check(#[case] backend: Backend) {
    let (_dir, layout) = temp_layout();

    let evaluation =
        train(backend, &layout).unwrap_or_else(|e| panic!("train {backend}: {:?}", e.chain()));
    assert_eq!((evaluation.train_rows, evaluation.test_rows), (120, 30));
    assert!(evaluation.train_accuracy > 0.8 && evaluation.test_accuracy > 0.8);
    let correct = evaluation.test_accuracy * 30.0;
    assert_abs_diff_eq!(correct, correct.round(), epsilon = 1e-9);

    for &artifact in backend.artifacts() {
        let path = layout.artifact_path(backend, artifact);
        assert!(path.is_file(), "missing {}", path.display());
    }

    check(backend, &layout).unwrap_or_else(|e| panic!("check {backend}: {:?}", e.chain()));
}

#[test]
fn iris_split_is_80_20() {
    let split = load_iris_split().unwrap();
    assert_eq!(split.train.n_samples(), 120);
    assert_eq!(split.test.n_samples(), 30);
    assert_eq!(split.train.n_classes(), 3);
}

#[rstest]
#[case::lightgbm(Backend::LightGbm)]
#[case::onnx(Backend::Onnx)]
fn check_without_artifacts_is_fatal(#[case] backend: Backend) {
    let (_dir, layout) = temp_layout();
    let err = check(backend, &layout).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn missing_file_reports_io_error() {
    let (_dir, layout) = temp_layout();
    let err = check(Backend::XgBoost, &layout).unwrap_err();
    assert!(matches!(err, HarnessError::Read(ReadError::Io(_))), "got {err:?}");
}

/// A model that always predicts class 0 fails the fixture with exit code 1.
#[test]
fn wrong_predictions_fail_validation() {
    let (_dir, layout) = temp_layout();
    let mut forest = Forest::<ScalarLeaf>::new(3);
    for (group, value) in [(0, 5.0), (1, 0.0), (2, 0.0)] {
        forest.push_tree(Tree::leaf(ScalarLeaf(value)), group);
    }
    let meta = ModelMeta::for_multiclass(4, 3);
    let model = GBDTModel::from_parts(forest, meta, BTreeMap::new()).unwrap();

    let dir = layout.prepare(Backend::XgBoost).unwrap();
    model.save_native(dir.join(Artifact::Native.file_name())).unwrap();

    let err = check(Backend::XgBoost, &layout).unwrap_err();
    assert!(matches!(err, HarnessError::Validation(_)), "got {err:?}");
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn training_is_deterministic() {
    let split = load_iris_split().unwrap();
    let config = xgboost_preset().unwrap();
    let a = GBDTModel::train(&split.train, &config, &[]).unwrap();
    let b = GBDTModel::train(&split.train, &config, &[]).unwrap();
    assert_eq!(a.to_native_bytes().unwrap(), b.to_native_bytes().unwrap());
}

#[test]
fn retraining_overwrites_artifacts() {
    let (_dir, layout) = temp_layout();
    train(Backend::Sklearn, &layout).unwrap();
    let path = layout.artifact_path(Backend::Sklearn, Artifact::Object);
    let first = std::fs::read(&path).unwrap();
    train(Backend::Sklearn, &layout).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), first);
}
