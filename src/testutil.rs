//! Shared test helpers for snapgram unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::SocialConfig;
use crate::media_store::{LocalStore, MediaStore, MediaStoreError};
use crate::replication::{ReplicationError, Replicator};
use crate::social::{Principal, SocialService, Upload};
use crate::storage::models::WriteOp;
use crate::storage::Database;

pub struct TestEnv {
    pub db: Database,
    pub media: Arc<dyn MediaStore>,
    pub service: SocialService,
}

/// A service over a temporary database and local media store.
pub fn test_service(temp_dir: &tempfile::TempDir) -> TestEnv {
    let media = LocalStore::new(temp_dir.path().join("media"), "/media")
        .expect("Failed to create test media store");
    build(temp_dir, Arc::new(media))
}

/// Like [`test_service`], but every media delete fails.
pub fn test_service_with_failing_deletes(temp_dir: &tempfile::TempDir) -> TestEnv {
    let inner = LocalStore::new(temp_dir.path().join("media"), "/media")
        .expect("Failed to create test media store");
    build(temp_dir, Arc::new(FailingDeletes { inner }))
}

/// Like [`test_service`], but writes go through an [`Interleaving`] replicator.
pub fn test_service_interleaved(temp_dir: &tempfile::TempDir) -> (TestEnv, Arc<Interleaving>) {
    let mut env = test_service(temp_dir);
    let interleaving = Arc::new(Interleaving {
        db: env.db.clone(),
        queued: Mutex::new(None),
    });
    let replicator: Arc<dyn Replicator> = interleaving.clone();
    env.service = SocialService::new(
        env.db.clone(),
        replicator,
        Arc::clone(&env.media),
        SocialConfig::default(),
    );
    (env, interleaving)
}

fn build(temp_dir: &tempfile::TempDir, media: Arc<dyn MediaStore>) -> TestEnv {
    let db = Database::open(temp_dir.path().join("data")).expect("Failed to open test database");
    let service = SocialService::local(db.clone(), Arc::clone(&media), SocialConfig::default());
    TestEnv { db, media, service }
}

pub fn principal(id: &str, username: &str) -> Principal {
    Principal {
        id: id.to_string(),
        username: username.to_string(),
    }
}

/// Register `username` and return it as a principal.
pub async fn register(service: &SocialService, username: &str) -> Principal {
    let user = service
        .register_user(&format!("{username}@example.com"), username)
        .await
        .expect("Failed to register test user");
    principal(&user.id, &user.username)
}

pub fn upload() -> Upload {
    Upload {
        data: Bytes::from_static(b"\x89PNG fake image bytes"),
        file_name: Some("photo.png".to_string()),
    }
}

struct FailingDeletes {
    inner: LocalStore,
}

#[async_trait]
impl MediaStore for FailingDeletes {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), MediaStoreError> {
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, MediaStoreError> {
        self.inner.get(key).await
    }

    async fn delete(&self, _key: &str) -> Result<(), MediaStoreError> {
        Err(MediaStoreError::Backend("delete unavailable".to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, MediaStoreError> {
        self.inner.exists(key).await
    }

    fn locator(&self, key: &str) -> String {
        self.inner.locator(key)
    }
}

type Trigger = fn(&WriteOp) -> bool;

/// Commits straight to the database, but can slip a queued op in just
/// before a chosen one, the way a concurrent request would land.
pub struct Interleaving {
    db: Database,
    queued: Mutex<Option<(Trigger, WriteOp)>>,
}

impl Interleaving {
    /// Apply `op` right before the next committed op matching `trigger`.
    pub fn before_next(&self, trigger: Trigger, op: WriteOp) {
        *self.queued.lock().unwrap() = Some((trigger, op));
    }
}

#[async_trait]
impl Replicator for Interleaving {
    async fn commit(&self, op: WriteOp) -> Result<(), ReplicationError> {
        let interleaved = {
            let mut queued = self.queued.lock().unwrap();
            match queued.take() {
                Some((trigger, first)) if trigger(&op) => Some(first),
                other => {
                    *queued = other;
                    None
                }
            }
        };
        if let Some(first) = interleaved {
            self.db.commit(first).await?;
        }
        self.db.commit(op).await
    }
}
