//! Content and relationship lifecycle: posts and their images and comments,
//! likes, follows, drafts and profile counters.
//!
//! Every mutation is a [`WriteOp`] committed through a [`Replicator`], so
//! set/count pairs and two-sided follow edges change inside one store
//! transaction.

mod drafts;
mod engagement;
pub mod error;
mod lifecycle;
mod media;
mod profiles;
pub mod validation;
mod views;

use std::sync::Arc;

use serde::Serialize;

use crate::config::SocialConfig;
use crate::media_store::MediaStore;
use crate::replication::Replicator;
use crate::storage::models::{PostRecord, UserRecord, WriteOp};
use crate::storage::Database;

pub use error::{SocialError, SocialResult};
pub use lifecycle::DeletionReport;
pub use media::ReconcileStats;
pub use views::{CommentView, ImageView, PostView, ProfileView, UserSummary};

/// The authenticated identity making a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub id: String,
    pub username: String,
}

/// An uploaded file as received from the transport layer.
#[derive(Debug, Clone)]
pub struct Upload {
    pub data: bytes::Bytes,
    pub file_name: Option<String>,
}

#[derive(Clone)]
pub struct SocialService {
    db: Database,
    replicator: Arc<dyn Replicator>,
    media: Arc<dyn MediaStore>,
    config: SocialConfig,
}

impl SocialService {
    pub fn new(
        db: Database,
        replicator: Arc<dyn Replicator>,
        media: Arc<dyn MediaStore>,
        config: SocialConfig,
    ) -> Self {
        Self {
            db,
            replicator,
            media,
            config,
        }
    }

    /// Service that writes straight to `db`, for single node setups and tests.
    pub fn local(db: Database, media: Arc<dyn MediaStore>, config: SocialConfig) -> Self {
        let replicator: Arc<dyn Replicator> = Arc::new(db.clone());
        Self::new(db, replicator, media, config)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn media_store(&self) -> &Arc<dyn MediaStore> {
        &self.media
    }

    async fn commit(&self, op: WriteOp) -> SocialResult<()> {
        self.replicator.commit(op).await?;
        Ok(())
    }

    /// The user record behind a principal. A principal without one is not signed in.
    fn principal_user(&self, principal: &Principal) -> SocialResult<UserRecord> {
        self.db
            .get_user(&principal.id)?
            .ok_or(SocialError::Unauthenticated)
    }

    /// A post that exists and is not being deleted.
    fn live_post(&self, post_id: &str) -> SocialResult<PostRecord> {
        self.db
            .get_post(post_id)?
            .filter(PostRecord::is_live)
            .ok_or(SocialError::NotFound("Post"))
    }
}

/// Mutations need a principal.
fn require(principal: Option<&Principal>) -> SocialResult<&Principal> {
    principal.ok_or(SocialError::Unauthenticated)
}
