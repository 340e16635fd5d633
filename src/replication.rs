//! Write path shared by the cluster node and local (single node / test) setups.

use async_trait::async_trait;
use thiserror::Error;

use crate::state_machine::SocialStateMachine;
use crate::storage::models::WriteOp;
use crate::storage::Database;

#[derive(Debug, Error)]
pub enum ReplicationError {
    /// No leader or no quorum; the caller may retry later.
    #[error("Replication unavailable: {0}")]
    Unavailable(String),
    #[error("Replication failed: {0}")]
    Failed(String),
}

/// Commits a write op. Once this returns Ok the op is visible in the local database.
#[async_trait]
pub trait Replicator: Send + Sync {
    async fn commit(&self, op: WriteOp) -> Result<(), ReplicationError>;
}

/// Applies ops straight to the local database.
#[async_trait]
impl Replicator for Database {
    async fn commit(&self, op: WriteOp) -> Result<(), ReplicationError> {
        self.apply(&op)
            .map_err(|e| ReplicationError::Failed(e.to_string()))
    }
}

#[async_trait]
impl Replicator for muster::RedbNode<SocialStateMachine> {
    async fn commit(&self, op: WriteOp) -> Result<(), ReplicationError> {
        self.replicate(op).await.map(|_| ()).map_err(|e| match e {
            muster::MusterError::NotLeader { .. } => {
                ReplicationError::Unavailable("No leader available, retry shortly".to_string())
            }
            muster::MusterError::NoQuorum => ReplicationError::Unavailable(
                "Failed to reach quorum for replication".to_string(),
            ),
            _ => ReplicationError::Failed(e.to_string()),
        })
    }
}
