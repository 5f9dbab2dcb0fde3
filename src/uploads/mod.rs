//! Local-disk storage for user avatars.
//!
//! Every upload gets its own key (`{user_id}-{uuid}-{sanitized name}`), so two
//! uploads with the same original filename never overwrite each other. Bytes are
//! written to a hidden temp file in the target directory and renamed into place.

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid file name '{0}'")]
    InvalidFileName(String),

    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Filename as sent by the client
    pub original_name: String,
    /// Key under the storage root
    pub key: String,
    pub path: PathBuf,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct AvatarStorage {
    root: PathBuf,
}

impl AvatarStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save(
        &self,
        user_id: u64,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, UploadError> {
        let safe_name = sanitize_file_name(original_name)?;
        let key = format!("{}-{}-{}", user_id, Uuid::new_v4().simple(), safe_name);
        let path = self.root.join(&key);
        let temp_path = self.root.join(format!(".{}.part", key));

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| UploadError::Io {
                action: "create directory",
                path: self.root.clone(),
                source,
            })?;

        if let Err(source) = tokio::fs::write(&temp_path, bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(UploadError::Io {
                action: "write",
                path: temp_path,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(UploadError::Io {
                action: "rename into",
                path,
                source,
            });
        }

        tracing::info!(
            "Stored avatar '{}' for user {} as {} ({} bytes)",
            original_name,
            user_id,
            key,
            bytes.len()
        );

        Ok(StoredFile {
            original_name: original_name.to_string(),
            key,
            path,
            size: bytes.len(),
        })
    }
}

/// Strip directory components and replace anything outside `[A-Za-z0-9._-]`
pub fn sanitize_file_name(name: &str) -> Result<String, UploadError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("").trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(UploadError::InvalidFileName(name.to_string()));
    }

    Ok(cleaned)
}
