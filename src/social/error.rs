use thiserror::Error;

use crate::media_store::MediaStoreError;
use crate::replication::ReplicationError;
use crate::storage::DatabaseError;

/// Outcome kinds of the content and relationship operations.
#[derive(Debug, Error)]
pub enum SocialError {
    /// Input the caller can correct, tied to a field.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Authenticated, but not allowed to touch this entity.
    #[error("You do not have permission to do that")]
    Forbidden,
    #[error("You must be signed in first")]
    Unauthenticated,
    /// Entity store, replication or media store failure.
    #[error("Dependency failure: {0}")]
    Dependency(String),
}

impl SocialError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        SocialError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<DatabaseError> for SocialError {
    fn from(e: DatabaseError) -> Self {
        SocialError::Dependency(format!("entity store: {e}"))
    }
}

impl From<ReplicationError> for SocialError {
    fn from(e: ReplicationError) -> Self {
        SocialError::Dependency(e.to_string())
    }
}

impl From<MediaStoreError> for SocialError {
    fn from(e: MediaStoreError) -> Self {
        SocialError::Dependency(format!("media store: {e}"))
    }
}

pub type SocialResult<T> = Result<T, SocialError>;
