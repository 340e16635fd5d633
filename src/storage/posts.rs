use redb::ReadableTable;

use super::db::{decode, Database, DatabaseError};
use super::models::{CommentRecord, ImageRecord, PostRecord};
use super::tables::*;

impl Database {
    // ========================================================================
    // Post operations
    // ========================================================================

    /// Get a post by its UUID, including posts with a deletion in progress
    pub fn get_post(&self, id: &str) -> Result<Option<PostRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(POSTS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get all posts for an owner, in creation order
    pub fn get_posts_by_owner(&self, owner_id: &str) -> Result<Vec<PostRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_POSTS)?;
        let posts_table = read_txn.open_table(POSTS)?;

        let post_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => decode(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut posts = Vec::new();
        for post_id in post_ids {
            if let Some(data) = posts_table.get(post_id.as_str())? {
                posts.push(decode(data.value())?);
            }
        }

        Ok(posts)
    }

    /// Get all posts (feed, snapshot, recovery)
    pub fn get_all_posts(&self) -> Result<Vec<PostRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(POSTS)?;

        let mut posts = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            posts.push(decode(value.value())?);
        }

        Ok(posts)
    }

    // ========================================================================
    // Image operations
    // ========================================================================

    pub fn get_image(&self, id: &str) -> Result<Option<ImageRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(IMAGES)?;

        match table.get(id)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_all_images(&self) -> Result<Vec<ImageRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(IMAGES)?;

        let mut images = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            images.push(decode(value.value())?);
        }

        Ok(images)
    }

    // ========================================================================
    // Comment operations
    // ========================================================================

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(COMMENTS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve comment ids in order, skipping ids with no record
    pub fn get_comments(&self, ids: &[String]) -> Result<Vec<CommentRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(COMMENTS)?;

        let mut comments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(data) = table.get(id.as_str())? {
                comments.push(decode(data.value())?);
            }
        }
        Ok(comments)
    }

    pub fn get_all_comments(&self) -> Result<Vec<CommentRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(COMMENTS)?;

        let mut comments = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            comments.push(decode(value.value())?);
        }

        Ok(comments)
    }
}
