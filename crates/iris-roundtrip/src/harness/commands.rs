//! The train and check commands behind the binaries.

use std::path::Path;
use std::process::ExitCode;

use super::backend::{lightgbm_preset, random_forest_preset, xgboost_preset, Artifact, Backend};
use super::error::{HarnessError, ValidationFailure};
use super::evaluate::{check_fixture, evaluate, Evaluation, MIN_ACCURACY};
use super::layout::ModelLayout;
use super::report;
use super::verify::verify_reload;
use crate::data::{load_iris, train_test_split, TrainTestSplit, SPLIT_SEED, TEST_FRACTION};
use crate::fixture::ReferenceFixture;
use crate::model::{Classifier, GBDTModel, RandomForestModel};
use crate::persist::onnx::save_onnx;
use crate::persist::{save_text, ObjectModel, SerializableModel};
use crate::training::EvalSet;

fn load_split() -> Result<TrainTestSplit, HarnessError> {
    report::info("Loading Iris dataset...");
    let dataset = load_iris()?;
    report::info(&format!("Dataset shape: ({}, {})", dataset.n_samples(), dataset.n_features()));
    report::info(&format!("Classes: {:?}", dataset.distinct_labels()));
    report::info(&format!("Feature names: {:?}", dataset.feature_names()));
    let split = train_test_split(&dataset, TEST_FRACTION, SPLIT_SEED)?;
    report::info(&format!(
        "Train rows: {}, test rows: {}",
        split.train.n_samples(),
        split.test.n_samples()
    ));
    Ok(split)
}

/// Accuracy bound and fixture check shared by every training command.
fn evaluate_fitted<C: Classifier + ?Sized>(
    model: &C,
    split: &TrainTestSplit,
    fixture: &ReferenceFixture,
) -> Result<Evaluation, HarnessError> {
    let evaluation = evaluate(model, split)?;
    report::info(&format!("Training accuracy: {:.4}", evaluation.train_accuracy));
    report::info(&format!("Test accuracy: {:.4}", evaluation.test_accuracy));
    evaluation.check_bound(MIN_ACCURACY)?;

    let predicted = model.predict(fixture.features())?;
    report::step("Test predictions for reference data:");
    report::info(&format!("Input: {}", report::format_rows(fixture.features())));
    report::info(&format!("Predictions: {}", report::format_labels(predicted.view())));
    report::info(&format!("Expected: {}", report::format_labels(fixture.expected())));
    check_fixture("trained model", &predicted, fixture)?;
    Ok(evaluation)
}

fn announce_save(path: &Path) {
    report::step(&format!("Saving model to {}...", path.display()));
}

/// Reload `artifact` from `path` and compare it with the in-memory model.
fn verify_artifact<C: Classifier + ?Sized>(
    original: &C,
    artifact: Artifact,
    path: &Path,
    fixture: &ReferenceFixture,
) -> Result<(), HarnessError> {
    let reloaded = artifact.load(path)?;
    let labels = verify_reload(
        artifact.file_name(),
        original,
        reloaded.as_ref(),
        fixture.features(),
        artifact.is_bit_exact(),
    )?;
    report::info(&format!(
        "Loaded {} predictions: {}",
        artifact.file_name(),
        report::format_labels(labels.view())
    ));
    Ok(())
}

fn train_gbdt(
    backend: Backend,
    split: &TrainTestSplit,
    layout: &ModelLayout,
    fixture: &ReferenceFixture,
) -> Result<Evaluation, HarnessError> {
    let config = match backend {
        Backend::LightGbm => lightgbm_preset()?,
        _ => xgboost_preset()?,
    };
    report::step(&format!("Training {} classifier...", backend.display_name()));
    let eval_sets = [
        EvalSet::new("train", split.train.features(), split.train.labels()),
        EvalSet::new("test", split.test.features(), split.test.labels()),
    ];
    let model = GBDTModel::train(&split.train, &config, &eval_sets)?;
    let evaluation = evaluate_fitted(&model, split, fixture)?;

    let dir = layout.prepare(backend)?;
    for &artifact in backend.artifacts() {
        let path = dir.join(artifact.file_name());
        announce_save(&path);
        match artifact {
            Artifact::Text => save_text(&model, &path)?,
            _ => model.save_native(&path)?,
        }
        report::ok("Model saved successfully");
    }

    report::step("Verifying saved model...");
    for &artifact in backend.artifacts() {
        verify_artifact(&model, artifact, &dir.join(artifact.file_name()), fixture)?;
    }
    report::ok("Model verification passed");
    Ok(evaluation)
}

fn train_forest(
    backend: Backend,
    split: &TrainTestSplit,
    layout: &ModelLayout,
    fixture: &ReferenceFixture,
) -> Result<Evaluation, HarnessError> {
    let config = random_forest_preset()?;
    report::step("Training RandomForest classifier...");
    let model = RandomForestModel::train(&split.train, &config)?;
    let evaluation = evaluate_fitted(&model, split, fixture)?;

    let dir = layout.prepare(backend)?;
    for &artifact in backend.artifacts() {
        let path = dir.join(artifact.file_name());
        if artifact == Artifact::Onnx {
            report::step("Converting model to ONNX format...");
        }
        announce_save(&path);
        match artifact {
            Artifact::Onnx => save_onnx(&model, &path)?,
            _ => model.save_object(&path)?,
        }
        report::ok("Model saved successfully");
    }

    report::step("Verifying saved model...");
    for &artifact in backend.artifacts() {
        verify_artifact(&model, artifact, &dir.join(artifact.file_name()), fixture)?;
    }
    report::ok("Model verification passed");
    Ok(evaluation)
}

/// Train the backend's preset, save every artifact and verify the reloads.
///
/// Returns the accuracies the bound was checked against.
pub fn train(backend: Backend, layout: &ModelLayout) -> Result<Evaluation, HarnessError> {
    let fixture = ReferenceFixture::iris();
    let split = load_split()?;
    tracing::info!(
        %backend,
        train_rows = split.train.n_samples(),
        test_rows = split.test.n_samples(),
        "training"
    );
    match backend {
        Backend::LightGbm | Backend::XgBoost => train_gbdt(backend, &split, layout, &fixture),
        Backend::Sklearn | Backend::Onnx => train_forest(backend, &split, layout, &fixture),
    }
}

/// Reload every artifact of `backend` and check the reference fixture.
///
/// All artifacts are checked before the first mismatch is returned.
pub fn check(backend: Backend, layout: &ModelLayout) -> Result<(), HarnessError> {
    let fixture = ReferenceFixture::iris();
    report::banner(&format!("Testing {} Model Inference", backend.display_name()));

    let artifacts = backend.artifacts();
    let mut failures: Vec<ValidationFailure> = Vec::new();
    for (i, &artifact) in artifacts.iter().enumerate() {
        let path = layout.artifact_path(backend, artifact);
        report::step(&format!("[{}/{}] Testing {}", i + 1, artifacts.len(), artifact.file_name()));
        report::info(&format!("Loading model from {}...", path.display()));
        let model = artifact.load(&path)?;
        report::ok("Model loaded successfully");

        report::step("Performing inference on test data:");
        report::info(&format!("Input shape: {:?}", fixture.features().dim()));
        let predicted = model.predict(fixture.features())?;
        report::info(&format!("Predictions: {}", report::format_labels(predicted.view())));
        report::info(&format!("Expected:    {}", report::format_labels(fixture.expected())));

        match check_fixture(artifact.file_name(), &predicted, &fixture) {
            Ok(()) => report::ok(&format!("{} inference validation PASSED", artifact.file_name())),
            Err(failure) => {
                report::fail(&format!("{} inference validation FAILED", artifact.file_name()));
                failures.push(failure);
            }
        }
    }

    report::rule();
    match failures.into_iter().next() {
        None => {
            report::ok("ALL TESTS PASSED");
            Ok(())
        }
        Some(first) => {
            report::fail("SOME TESTS FAILED");
            Err(first.into())
        }
    }
}

fn run(command: impl FnOnce() -> Result<(), HarnessError>) -> ExitCode {
    crate::logging::init_logging();
    match command() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut lines = err.chain().into_iter();
            if let Some(first) = lines.next() {
                eprintln!("error: {first}");
            }
            for cause in lines {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::from(err.exit_code())
        }
    }
}

/// Entry point of the `train-*` binaries.
pub fn main_train(backend: Backend) -> ExitCode {
    run(|| train(backend, &ModelLayout::default()).map(|_| ()))
}

/// Entry point of the `test-*` binaries.
pub fn main_check(backend: Backend) -> ExitCode {
    run(|| check(backend, &ModelLayout::default()))
}
