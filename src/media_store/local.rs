use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::{MediaStore, MediaStoreError};

/// Local filesystem media store for development and testing.
///
/// Objects are served back by the `/media/upload/*key` route, so locators
/// look like `{public_url}/upload/{key}`.
pub struct LocalStore {
    base_path: PathBuf,
    public_url: String,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P, public_url: &str) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, MediaStoreError> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
            return Err(MediaStoreError::NotFound(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl MediaStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), MediaStoreError> {
        let path = self.object_path(key)?;
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, MediaStoreError> {
        let path = self.object_path(key)?;
        if !path.exists() {
            return Err(MediaStoreError::NotFound(key.to_string()));
        }
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<(), MediaStoreError> {
        let path = self.object_path(key)?;
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, MediaStoreError> {
        let path = self.object_path(key)?;
        Ok(path.exists())
    }

    fn locator(&self, key: &str) -> String {
        format!("{}/upload/{key}", self.public_url)
    }
}
