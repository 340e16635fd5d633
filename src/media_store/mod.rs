mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    /// Public locator handed to clients
    pub url: String,
    /// Opaque key used to delete the object later
    pub filename: String,
}

/// Abstraction over media storage backends.
/// Keys are UUIDs plus the upload's extension.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), MediaStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, MediaStoreError>;
    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), MediaStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, MediaStoreError>;

    /// Public locator for a stored key.
    fn locator(&self, key: &str) -> String;

    /// Store an upload under a fresh key and return its reference.
    async fn store(
        &self,
        data: Bytes,
        original_name: Option<&str>,
    ) -> Result<StoredMedia, MediaStoreError> {
        let filename = media_key(original_name);
        self.put(&filename, data).await?;
        Ok(StoredMedia {
            url: self.locator(&filename),
            filename,
        })
    }
}

/// Fresh UUID key, keeping a short alphanumeric extension from the upload name.
pub fn media_key(original_name: Option<&str>) -> String {
    let id = uuid::Uuid::new_v4();
    let extension = original_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}
