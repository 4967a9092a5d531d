use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;

/// A file received from a client, ready to hand to a media store.
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub folder: String,
}

#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub secure_url: String,
    /// Playback length for video, when the store can work it out.
    pub duration_seconds: Option<f64>,
}

/// Object storage for thumbnails, lecture videos and profile images.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, AppError>;

    /// Removing a URL the store does not recognise is not an error.
    async fn delete(&self, url: &str) -> Result<(), AppError>;
}

pub type MediaService = Arc<dyn MediaStore>;

/// Stores media on local disk and serves it from `base_url`.
#[derive(Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, base_url: String) -> Self {
        Self {
            root,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn key_for(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.base_url)?.trim_start_matches('/');
        let safe = !key.is_empty()
            && Path::new(key)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| key.to_string())
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    #[instrument(skip(self, upload), fields(folder = %upload.folder, size = upload.bytes.len()))]
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, AppError> {
        let file_name = match extension_of(&upload.file_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let key = format!("{}/{}", upload.folder.trim_matches('/'), file_name);
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::ExternalService(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to write file: {e}")))?;

        info!(key = %key, "Stored media");

        Ok(StoredMedia {
            secure_url: format!("{}/{}", self.base_url, key),
            duration_seconds: None,
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, url: &str) -> Result<(), AppError> {
        let Some(key) = self.key_for(url) else {
            return Ok(());
        };

        let path = self.root.join(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::ExternalService(format!("Failed to delete file: {e}")))?;
        }

        Ok(())
    }
}

/// Cleanup of media that is no longer referenced. Failures are logged only.
pub async fn delete_quietly(media: &dyn MediaStore, url: &str) {
    if url.is_empty() {
        return;
    }

    if let Err(err) = media.delete(url).await {
        warn!(url = %url, error = %err, "Failed to remove media, leaving it orphaned");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_for_rejects_foreign_and_traversal_urls() {
        let store = LocalMediaStore::new(PathBuf::from("media"), "/media/".to_string());

        assert_eq!(
            store.key_for("/media/course-hub/a.png"),
            Some("course-hub/a.png".to_string())
        );
        assert_eq!(store.key_for("https://elsewhere.example/a.png"), None);
        assert_eq!(store.key_for("/media/../secrets.env"), None);
        assert_eq!(store.key_for("/media/"), None);
    }

    #[tokio::test]
    async fn test_upload_then_delete_removes_file() {
        let root = std::env::temp_dir().join(format!("course-hub-media-{}", Uuid::new_v4()));
        let store = LocalMediaStore::new(root.clone(), "/media".to_string());

        let stored = store
            .upload(MediaUpload {
                bytes: b"video".to_vec(),
                file_name: "lecture.MP4".to_string(),
                folder: "course-hub".to_string(),
            })
            .await
            .unwrap();

        assert!(stored.secure_url.starts_with("/media/course-hub/"));
        assert!(stored.secure_url.ends_with(".mp4"));

        let key = store.key_for(&stored.secure_url).unwrap();
        assert!(root.join(&key).exists());

        store.delete(&stored.secure_url).await.unwrap();
        assert!(!root.join(&key).exists());

        let _ = std::fs::remove_dir_all(root);
    }
}
