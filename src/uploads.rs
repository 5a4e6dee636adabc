// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Storage of uploaded images before classification

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::{DermaError, Result};

/// Lower-cased extension of an accepted image file name
pub fn accepted_extension(uploads: &UploadConfig, original_name: &str) -> Result<String> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| DermaError::Upload(format!("File has no extension: {}", original_name)))?;

    if !uploads.accepts(&extension) {
        return Err(DermaError::Upload(format!("Unsupported image format: {}", extension)));
    }
    Ok(extension)
}

/// Persist an upload under a fresh `<uuid>.<ext>` name in the uploads directory
pub async fn store_upload(uploads: &UploadConfig, original_name: &str, data: &[u8]) -> Result<PathBuf> {
    let extension = accepted_extension(uploads, original_name)?;

    tokio::fs::create_dir_all(&uploads.dir).await?;
    let path = PathBuf::from(&uploads.dir).join(format!("{}.{}", Uuid::new_v4(), extension));
    tokio::fs::write(&path, data).await?;

    debug!("Stored upload {:?} as {:?}", original_name, path);
    Ok(path)
}

/// Remove an upload that never made it into the history
pub async fn discard_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Discarded upload {:?}", path),
        Err(e) => warn!("Failed to remove unrecorded upload {:?}: {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploads_in(dir: &Path) -> UploadConfig {
        UploadConfig {
            dir: dir.join("uploads").to_string_lossy().to_string(),
            ..UploadConfig::default()
        }
    }

    #[test]
    fn test_extension_rules() {
        let uploads = UploadConfig::default();
        assert_eq!(accepted_extension(&uploads, "Mole.JPG").unwrap(), "jpg");
        assert!(matches!(accepted_extension(&uploads, "README"), Err(DermaError::Upload(_))));
        assert!(matches!(accepted_extension(&uploads, "payload.svg"), Err(DermaError::Upload(_))));
    }

    #[tokio::test]
    async fn test_store_upload_uses_fresh_names() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = uploads_in(dir.path());

        let first = store_upload(&uploads, "lesion.png", b"one").await.unwrap();
        let second = store_upload(&uploads, "lesion.png", b"two").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(first.extension().unwrap(), "png");
        assert!(first.starts_with(&uploads.dir));
    }

    #[tokio::test]
    async fn test_discard_upload() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = uploads_in(dir.path());
        let stored = store_upload(&uploads, "lesion.jpg", b"jpeg").await.unwrap();

        discard_upload(&stored).await;
        assert!(!stored.exists());

        // Already gone: only logged
        discard_upload(&stored).await;
    }
}
