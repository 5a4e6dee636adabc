// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Inference adapter: turns a stored image into a disease label and confidence
//!
//! The classifier itself runs behind a model server speaking the TensorFlow
//! Serving REST protocol. This module only prepares the input tensor, sends it
//! and maps the score vector back to a label.

use async_trait::async_trait;
use image::imageops::FilterType;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::{DermaError, Result};

/// A single classification outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub disease_class: String,
    /// Confidence score (0.0 - 100.0)
    pub confidence: f64,
}

/// Anything that can classify a stored image.
///
/// Implementations are loaded once at startup and shared read-only between
/// requests.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Name of this classifier, for logs
    fn name(&self) -> &'static str;

    /// Classify the image stored at `path`
    async fn classify(&self, path: &Path) -> Result<Prediction>;
}

/// Load an image as an RGB tensor of shape `[size][size][3]` scaled to `0.0..=1.0`
pub fn preprocess_image(path: &Path, size: u32) -> Result<Vec<Vec<[f32; 3]>>> {
    let img = image::open(path)?
        .resize_exact(size, size, FilterType::Nearest)
        .to_rgb8();

    let tensor = img
        .rows()
        .map(|row| {
            row.map(|px| {
                let [r, g, b] = px.0;
                [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
            })
            .collect()
        })
        .collect();
    Ok(tensor)
}

/// Pick the highest score and map it to its label
pub fn top_prediction(scores: &[f32], labels: &[String]) -> Result<Prediction> {
    if scores.len() != labels.len() {
        return Err(DermaError::Inference(format!(
            "Model returned {} scores for {} labels",
            scores.len(),
            labels.len()
        )));
    }

    let (index, score) = scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| DermaError::Inference("Model returned no scores".to_string()))?;

    Ok(Prediction {
        disease_class: labels[index].clone(),
        confidence: f64::from(*score) * 100.0,
    })
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [&'a Vec<Vec<[f32; 3]>>; 1],
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f32>>,
}

/// Classifier backed by a model server `:predict` endpoint
pub struct ServingClassifier {
    client: Client,
    url: String,
    input_size: u32,
    labels: Vec<String>,
}

impl ServingClassifier {
    /// Create a new model server client
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            input_size: config.input_size,
            labels: config.labels.clone(),
        })
    }

    /// Model status URL derived from the prediction URL
    fn status_url(&self) -> &str {
        self.url.strip_suffix(":predict").unwrap_or(&self.url)
    }

    /// Check if the model server is reachable
    pub async fn health_check(&self) -> Result<()> {
        let response = self.client
            .get(self.status_url())
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| DermaError::Inference(format!("Cannot reach model server at {}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(DermaError::Inference(format!(
                "Model server returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Classifier for ServingClassifier {
    fn name(&self) -> &'static str {
        "serving"
    }

    async fn classify(&self, path: &Path) -> Result<Prediction> {
        info!("Classifying image: {:?}", path);

        let owned: PathBuf = path.to_path_buf();
        let size = self.input_size;
        let tensor = tokio::task::spawn_blocking(move || preprocess_image(&owned, size))
            .await
            .map_err(|e| DermaError::Inference(format!("Preprocessing task failed: {}", e)))??;

        debug!("Sending predict request to {}", self.url);

        let response = self.client
            .post(&self.url)
            .json(&PredictRequest { instances: [&tensor] })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DermaError::Inference(format!(
                "Model server returned status {}",
                response.status()
            )));
        }

        let body: PredictResponse = response.json().await?;
        let scores = body
            .predictions
            .first()
            .ok_or_else(|| DermaError::Inference("Empty predictions".to_string()))?;

        let prediction = top_prediction(scores, &self.labels)?;
        debug!("Prediction: {} ({:.2}%)", prediction.disease_class, prediction.confidence);
        Ok(prediction)
    }
}
