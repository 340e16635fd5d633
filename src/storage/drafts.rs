use redb::ReadableTable;

use super::db::{decode, Database, DatabaseError};
use super::models::{DraftRecord, OrphanedMedia};
use super::tables::*;

impl Database {
    pub fn get_draft(&self, user_id: &str) -> Result<Option<DraftRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(DRAFTS)?;

        match table.get(user_id)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_all_drafts(&self) -> Result<Vec<DraftRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(DRAFTS)?;

        let mut drafts = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            drafts.push(decode(value.value())?);
        }
        Ok(drafts)
    }

    /// Media objects whose delete still has to be retried
    pub fn get_orphaned_media(&self) -> Result<Vec<OrphanedMedia>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ORPHANED_MEDIA)?;

        let mut orphans = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            orphans.push(decode(value.value())?);
        }
        Ok(orphans)
    }

    pub fn get_orphan(&self, filename: &str) -> Result<Option<OrphanedMedia>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ORPHANED_MEDIA)?;

        match table.get(filename)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }
}
