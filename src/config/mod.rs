// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Dermascan

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::db::catalog::CLASS_NAMES;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Model serving configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Upload storage settings
    #[serde(default)]
    pub uploads: UploadConfig,

    /// History listing defaults
    #[serde(default)]
    pub history: HistoryConfig,

    /// Web UI settings
    #[serde(default)]
    pub web: WebConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    /// Prediction endpoint of the model server
    #[serde(default = "default_model_url")]
    pub url: String,
    /// Square input edge in pixels
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    /// Output labels, in model output order
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload")]
    pub max_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_api_limit")]
    pub api_limit: usize,
    #[serde(default = "default_index_limit")]
    pub index_limit: usize,
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

// Default value functions
fn default_model_url() -> String { "http://localhost:8501/v1/models/skin_disease:predict".to_string() }
fn default_input_size() -> u32 { 224 }
fn default_labels() -> Vec<String> { CLASS_NAMES.iter().map(|s| s.to_string()).collect() }
fn default_timeout() -> u64 { 60 }
fn default_upload_dir() -> String { "static/uploads".to_string() }
fn default_formats() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"]
        .into_iter().map(String::from).collect()
}
fn default_max_upload() -> usize { 16 * 1024 * 1024 }
fn default_api_limit() -> usize { 10 }
fn default_index_limit() -> usize { 5 }
fn default_page_limit() -> usize { 100 }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 5000 }
fn default_db_path() -> String { "skin_analysis.db".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            uploads: UploadConfig::default(),
            history: HistoryConfig::default(),
            web: WebConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            input_size: default_input_size(),
            labels: default_labels(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            formats: default_formats(),
            max_bytes: default_max_upload(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            api_limit: default_api_limit(),
            index_limit: default_index_limit(),
            page_limit: default_page_limit(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl UploadConfig {
    /// Check whether an extension (without the dot) is an accepted image format
    pub fn accepts(&self, extension: &str) -> bool {
        self.formats.iter().any(|f| f.eq_ignore_ascii_case(extension))
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::DermaError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would make every request fail
    pub fn validate(&self) -> crate::Result<()> {
        if self.model.labels.is_empty() {
            return Err(crate::DermaError::Config("model.labels must not be empty".to_string()));
        }
        if self.model.input_size == 0 {
            return Err(crate::DermaError::Config("model.input_size must be positive".to_string()));
        }
        let limits = [
            ("history.api_limit", self.history.api_limit),
            ("history.index_limit", self.history.index_limit),
            ("history.page_limit", self.history.page_limit),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(crate::DermaError::Config(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.history.api_limit, 10);
        assert_eq!(config.history.index_limit, 5);
        assert_eq!(config.history.page_limit, 100);
        assert_eq!(config.model.input_size, 224);
        assert_eq!(config.model.labels.len(), 9);
        assert_eq!(config.database.path, "skin_analysis.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"web": {"port": 9000}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.web.port, 9000);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.uploads.dir, "static/uploads");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.web.port, 5000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.database.path = "other.db".to_string();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.database.path, "other.db");
    }

    #[test]
    fn test_zero_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"history": {"api_limit": 0}}"#).unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, crate::DermaError::Config(_)));
    }

    #[test]
    fn test_upload_formats_case_insensitive() {
        let uploads = UploadConfig::default();
        assert!(uploads.accepts("PNG"));
        assert!(uploads.accepts("jpeg"));
        assert!(!uploads.accepts("exe"));
    }
}
