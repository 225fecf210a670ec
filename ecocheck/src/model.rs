//! Loading the hosted image classifier and running it on frames.
//!
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, ensure, Context, Result};
use common::prediction::ClassPrediction;
use futures::{future::BoxFuture, FutureExt};
use image::RgbImage;
use reqwest::Client;
use serde::Deserialize;
use tract_onnx::prelude::*;

use crate::{
    config::Config,
    utils::{download_file, hashed, join_url},
};

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub const METADATA_FILE: &str = "metadata.json";

/// Side length of the square input when the metadata does not name one.
const DEFAULT_IMAGE_SIZE: u32 = 224;

/// Loaded model producing one probability per class for a frame.
pub trait Classifier: Send + Sync {
    fn total_classes(&self) -> usize;

    /// Classify a frame, returning predictions in class order.
    fn predict(&self, frame: &RgbImage) -> Result<Vec<ClassPrediction>>;
}

/// Source of a classifier handle.
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>>>;
}

/// Class metadata published next to the model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub model_name: Option<String>,
}

fn default_image_size() -> u32 {
    DEFAULT_IMAGE_SIZE
}

impl ModelMetadata {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let metadata: ModelMetadata = serde_json::from_slice(data)?;
        ensure!(!metadata.labels.is_empty(), "metadata lists no labels");
        ensure!(metadata.image_size > 0, "metadata image size is zero");
        Ok(metadata)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    }
}

/// ONNX classifier executed with tract.
///
/// Input is a single NHWC frame of `image_size`² pixels scaled to `[-1, 1]`, output a
/// `[1, N]` probability vector with one entry per label.
pub struct TractClassifier {
    model: NnModel,
    labels: Vec<String>,
    image_size: u32,
}

impl TractClassifier {
    pub fn from_path(model_path: &Path, metadata: ModelMetadata) -> Result<Self> {
        let size = metadata.image_size as usize;
        let input_fact = InferenceFact::dt_shape(f32::datum_type(), tvec!(1, size, size, 3));
        let model = tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(0, input_fact)?
            .into_optimized()?
            .into_runnable()?;

        let classifier = Self {
            model,
            labels: metadata.labels,
            image_size: metadata.image_size,
        };

        // A dry run catches models whose output does not match the labels.
        classifier
            .predict(&RgbImage::new(classifier.image_size, classifier.image_size))
            .context("model does not fit its metadata")?;

        Ok(classifier)
    }
}

/// Resize a frame to `size`² and lay it out as an NHWC tensor scaled to `[-1, 1]`.
pub fn preproc(frame: &RgbImage, size: u32) -> Tensor {
    let resized: RgbImage =
        image::imageops::resize(frame, size, size, image::imageops::FilterType::Triangle);

    let size = size as usize;
    tract_ndarray::Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
        resized[(x as _, y as _)][c] as f32 / 127.5 - 1.0
    })
    .into()
}

impl Classifier for TractClassifier {
    fn total_classes(&self) -> usize {
        self.labels.len()
    }

    fn predict(&self, frame: &RgbImage) -> Result<Vec<ClassPrediction>> {
        // Input and raw outputs live only for the duration of this call.
        let input = preproc(frame, self.image_size);
        let outputs = self.model.run(tvec!(input.into()))?;
        let probabilities = outputs[0].to_array_view::<f32>()?;

        if probabilities.len() != self.labels.len() {
            bail!(
                "model produced {} outputs for {} labels",
                probabilities.len(),
                self.labels.len()
            );
        }

        Ok(self
            .labels
            .iter()
            .zip(probabilities.iter())
            .map(|(label, probability)| ClassPrediction::new(label.clone(), *probability))
            .collect())
    }
}

/// Downloads model and metadata from a base URL, caching both on disk.
pub struct RemoteModelLoader {
    client: Client,
    base_url: String,
    model_file: String,
    cache_dir: PathBuf,
    refresh: bool,
}

impl RemoteModelLoader {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.model_url.clone().context("no model URL configured")?;
        Ok(Self {
            client: Client::new(),
            cache_dir: config.model_cache_root().join(hashed(&base_url)),
            base_url,
            model_file: config.model_file.clone(),
            refresh: config.refresh_model,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of `file` in the cache, downloading it first if needed.
    async fn fetch(&self, file: &str) -> Result<PathBuf> {
        let path = self.cache_dir.join(file);
        if !self.refresh && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            log::debug!("Using cached {}", path.display());
            return Ok(path);
        }

        let url = join_url(&self.base_url, file);
        log::info!("Downloading {}", url);
        download_file(&self.client, &url, &path).await?;

        Ok(path)
    }

    async fn load_classifier(&self) -> Result<Arc<dyn Classifier>> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .with_context(|| format!("creating {}", self.cache_dir.display()))?;

        let metadata = ModelMetadata::from_path(&self.fetch(METADATA_FILE).await?)?;
        let model_path = self.fetch(&self.model_file).await?;

        log::info!(
            "Loading model {} with {} classes",
            metadata.model_name.as_deref().unwrap_or("(unnamed)"),
            metadata.labels.len()
        );

        let classifier =
            tokio::task::spawn_blocking(move || TractClassifier::from_path(&model_path, metadata))
                .await??;

        Ok(Arc::new(classifier))
    }
}

impl ModelLoader for RemoteModelLoader {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>>> {
        self.load_classifier().boxed()
    }
}

#[cfg(test)]
mod test {

    use clap::Parser;

    use super::*;

    #[test]
    fn metadata_fields() -> Result<()> {
        let metadata = ModelMetadata::from_slice(
            br#"{
                "tfjsVersion": "1.3.1",
                "modelName": "tm-my-image-model",
                "labels": ["Recyclable", "Not recyclable", "Background"],
                "imageSize": 224
            }"#,
        )?;

        assert_eq!(metadata.labels.len(), 3);
        assert_eq!(metadata.labels[1], "Not recyclable");
        assert_eq!(metadata.image_size, 224);
        assert_eq!(metadata.model_name.as_deref(), Some("tm-my-image-model"));
        Ok(())
    }

    #[test]
    fn metadata_defaults_image_size() -> Result<()> {
        let metadata = ModelMetadata::from_slice(br#"{"labels": ["a"]}"#)?;
        assert_eq!(metadata.image_size, DEFAULT_IMAGE_SIZE);
        Ok(())
    }

    #[test]
    fn metadata_without_labels_is_rejected() {
        assert!(ModelMetadata::from_slice(br#"{"labels": []}"#).is_err());
        assert!(ModelMetadata::from_slice(br#"{"imageSize": 224}"#).is_err());
        assert!(ModelMetadata::from_slice(b"<html>").is_err());
    }

    #[test]
    fn preproc_scales_to_unit_range_in_nhwc_order() -> Result<()> {
        let mut frame = RgbImage::new(2, 2);
        frame.put_pixel(0, 0, image::Rgb([0, 255, 0]));
        frame.put_pixel(1, 0, image::Rgb([255, 0, 0]));
        frame.put_pixel(0, 1, image::Rgb([0, 0, 255]));
        frame.put_pixel(1, 1, image::Rgb([255, 255, 255]));

        let tensor = preproc(&frame, 2);
        assert_eq!(tensor.shape(), &[1, 2, 2, 3]);

        let view = tensor
            .to_array_view::<f32>()?
            .into_dimensionality::<tract_ndarray::Ix4>()?;
        for y in 0..2 {
            for x in 0..2 {
                for c in 0..3 {
                    let expected = if frame.get_pixel(x, y)[c] == 255 { 1.0 } else { -1.0 };
                    let value = view[(0, y as usize, x as usize, c)];
                    assert!(
                        (value - expected).abs() < 1e-5,
                        "[0,{y},{x},{c}] is {value}, expected {expected}"
                    );
                }
            }
        }
        Ok(())
    }

    #[test]
    fn preproc_resizes_to_model_input() -> Result<()> {
        let frame = RgbImage::from_pixel(64, 48, image::Rgb([255, 0, 255]));

        let tensor = preproc(&frame, 8);
        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);

        let view = tensor
            .to_array_view::<f32>()?
            .into_dimensionality::<tract_ndarray::Ix4>()?;
        assert!((view[(0, 7, 7, 0)] - 1.0).abs() < 1e-5);
        assert!((view[(0, 0, 3, 1)] + 1.0).abs() < 1e-5);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_model_fails_to_load() {
        let cache = std::env::temp_dir().join(format!("ecocheck-model-{}", std::process::id()));
        let config = Config::parse_from([
            "ecocheck",
            "--model-url",
            "http://127.0.0.1:1/models/x/",
            "--cache-dir",
            cache.to_str().unwrap(),
        ]);
        let loader = RemoteModelLoader::new(&config).unwrap();
        assert!(loader.cache_dir().starts_with(&cache));
        assert!(loader
            .cache_dir()
            .ends_with(hashed("http://127.0.0.1:1/models/x/")));

        assert!(loader.load().await.is_err());
    }
}
