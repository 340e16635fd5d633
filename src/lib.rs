//! snapgram - Content and relationship lifecycle engine for a photo sharing service
//!
//! This crate provides posts, comments, likes, follows and profiles with:
//! - Atomic toggles and two-sided follow edges (one store transaction per write)
//! - Resumable post deletion cascades with best-effort media cleanup
//! - Swappable media backends (local filesystem, GCS)
//! - State replicated via muster (Raft-like clustering) into a redb database
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod media_store;
pub mod replication;
pub mod social;
pub mod state_machine;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use social::SocialService;
use state_machine::SocialStateMachine;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub node: Arc<muster::RedbNode<SocialStateMachine>>,
    pub social: SocialService,
}
