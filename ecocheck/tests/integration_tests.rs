use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use common::{prediction::Badge, ui::Controls};
use ecocheck::{
    camera::FacingMode,
    fake::{FakeCameraProvider, FakeClassifier, FakeModelLoader},
    model::{Classifier, ModelMetadata, TractClassifier},
    session::{LoopSettings, Session, STATUS_START_FAILED},
    ui::UiBinder,
};

const SETTINGS: LoopSettings = LoopSettings {
    resolution: (64, 48),
    fps: 120,
};

fn new_session(classifier: Arc<FakeClassifier>, cameras: FakeCameraProvider) -> Session {
    let ui = Arc::new(UiBinder::new(SETTINGS.resolution).expect("ui"));
    Session::new(
        ui,
        Box::new(FakeModelLoader::new(classifier)),
        Box::new(cameras),
        SETTINGS,
    )
}

#[tokio::test]
async fn best_class_drives_verdict_and_badge() {
    let classifier = Arc::new(FakeClassifier::new(&[
        ("A", 0.2),
        ("B", 0.9),
        ("C", 0.1),
    ]));
    let mut session = new_session(classifier.clone(), FakeCameraProvider::new());

    session.start().await.expect("start");
    classifier.wait_for_predictions(3).await;
    let snapshot = session.ui().snapshot();
    session.stop().await;

    assert_eq!(snapshot.bars.len(), classifier.total_classes());
    assert_eq!(snapshot.best_label, "B (90.0%)");
    assert_eq!(snapshot.badge, Some(Badge::High));
    assert_eq!(snapshot.bars[0].pct, "0.20");
}

#[tokio::test]
async fn low_confidence_recyclable_verdict() {
    let classifier = Arc::new(FakeClassifier::new(&[
        ("Not recyclable", 0.3),
        ("Recyclable", 0.4),
        ("Background", 0.3),
    ]));
    let mut session = new_session(classifier.clone(), FakeCameraProvider::new());

    session.start().await.expect("start");
    classifier.wait_for_predictions(2).await;
    let snapshot = session.ui().snapshot();
    session.stop().await;

    assert_eq!(snapshot.best_label, "RECYCLABLE (40.0%)");
    assert_eq!(snapshot.badge, Some(Badge::Low));
}

#[tokio::test]
async fn permission_denied_leaves_start_enabled() {
    let classifier = Arc::new(FakeClassifier::new(&[("A", 1.0)]));
    let mut session = new_session(classifier.clone(), FakeCameraProvider::denied());

    assert!(session.start().await.is_err());

    let snapshot = session.ui().snapshot();
    assert_eq!(snapshot.status, STATUS_START_FAILED);
    assert_eq!(snapshot.controls, Controls::new(true, false, false));
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn flip_keeps_classifier_and_resumes() {
    let classifier = Arc::new(FakeClassifier::new(&[("A", 0.6), ("B", 0.4)]));
    let cameras = FakeCameraProvider::new();
    let mut session = new_session(classifier.clone(), cameras.clone());

    session.start().await.expect("start");
    classifier.wait_for_predictions(2).await;

    session.flip().await.expect("flip");
    let before = classifier.calls();
    classifier.wait_for_predictions(before + 2).await;
    assert!(classifier.calls() >= before + 2);

    session.flip().await.expect("flip back");
    session.stop().await;

    let opened = cameras.opened();
    let facings: Vec<_> = opened.iter().map(|camera| camera.facing).collect();
    assert_eq!(
        facings,
        vec![FacingMode::Back, FacingMode::Front, FacingMode::Back]
    );
    assert!(opened.iter().all(|camera| camera.is_stopped()));
    assert!(session.is_model_loaded());
}

const FLATTEN_MODEL: &str = "test_assets/flatten.onnx";

fn channel_labels(image_size: u32) -> anyhow::Result<ModelMetadata> {
    ModelMetadata::from_slice(
        format!(r#"{{"labels": ["red", "green", "blue"], "imageSize": {image_size}}}"#).as_bytes(),
    )
}

#[test]
fn tract_classifier_reports_one_value_per_label() -> anyhow::Result<()> {
    let classifier = TractClassifier::from_path(Path::new(FLATTEN_MODEL), channel_labels(1)?)?;
    assert_eq!(classifier.total_classes(), 3);

    let frame = image::RgbImage::from_pixel(32, 24, image::Rgb([255, 0, 255]));
    let predictions = classifier.predict(&frame)?;

    let labels: Vec<_> = predictions.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, ["red", "green", "blue"]);
    let values: Vec<_> = predictions.iter().map(|p| p.probability).collect();
    for (value, expected) in values.iter().zip([1.0, -1.0, 1.0]) {
        assert!((value - expected).abs() < 1e-5, "{values:?}");
    }

    Ok(())
}

#[test]
fn model_with_more_outputs_than_labels_is_rejected() -> anyhow::Result<()> {
    // A 2x2 input flattens to 12 outputs for 3 labels.
    let result = TractClassifier::from_path(Path::new(FLATTEN_MODEL), channel_labels(2)?);

    let err = result.err().expect("load must fail");
    assert!(format!("{err:#}").contains("12 outputs for 3 labels"), "{err:#}");

    Ok(())
}

/// Runs a real model when `ECOCHECK_TEST_MODEL_DIR` holds `model.onnx` and `metadata.json`.
#[test]
fn tract_classifier_if_available() -> anyhow::Result<()> {
    let Some(dir) = std::env::var_os("ECOCHECK_TEST_MODEL_DIR").map(PathBuf::from) else {
        println!("ECOCHECK_TEST_MODEL_DIR not set, skipping");
        return Ok(());
    };

    let metadata = ModelMetadata::from_path(&dir.join("metadata.json"))?;
    let labels = metadata.labels.clone();
    let classifier = TractClassifier::from_path(&dir.join("model.onnx"), metadata)?;
    assert_eq!(classifier.total_classes(), labels.len());

    let frame = image::RgbImage::from_pixel(480, 360, image::Rgb([90, 120, 60]));
    let predictions = classifier.predict(&frame)?;
    assert_eq!(predictions.len(), labels.len());
    let total: f32 = predictions.iter().map(|p| p.probability).sum();
    assert!((total - 1.0).abs() < 1e-3, "probabilities sum to {total}");

    Ok(())
}
