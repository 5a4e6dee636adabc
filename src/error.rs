// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Dermascan

use thiserror::Error;

/// Result type alias for Dermascan operations
pub type Result<T> = std::result::Result<T, DermaError>;

/// Dermascan error types
#[derive(Error, Debug)]
pub enum DermaError {
    #[error("Analysis not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}
