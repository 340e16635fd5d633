mod apply;
pub mod db;
mod drafts;
pub mod models;
mod posts;
mod tables;
mod users;

pub use db::{Database, DatabaseError, PurgeStats};
pub use tables::*;
