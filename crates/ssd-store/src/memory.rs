//! In-memory reference store for testing and ephemeral use.
//!
//! [`InMemoryRecordStore`] keeps all records in a `Vec` protected by a
//! `RwLock`. It implements the full [`RecordStore`] trait, including every
//! rule the file store enforces, and is suitable for unit tests and
//! embedding.

use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, StoreError};
use crate::rules::{ensure_alias_free, validate_update};
use crate::traits::{RecordStore, Records};
use crate::types::Record;

/// An in-memory implementation of [`RecordStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<Record>>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Record>>> {
        self.records
            .read()
            .map_err(|e| StoreError::Io(std::io::Error::other(format!("lock poisoned: {e}"))))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Record>>> {
        self.records
            .write()
            .map_err(|e| StoreError::Io(std::io::Error::other(format!("lock poisoned: {e}"))))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn append(&self, record: &Record) -> Result<()> {
        // Same encodability rule as the file store.
        crate::codec::encode_record(record)?;

        let mut records = self.write()?;
        ensure_alias_free(records.iter(), &record.alias)?;
        records.push(record.clone());
        Ok(())
    }

    fn iter(&self) -> Result<Records<'_>> {
        // Snapshot so the lock isn't held across the caller's iteration.
        let snapshot = self.read()?.clone();
        Ok(Box::new(snapshot.into_iter().enumerate().map(Ok)))
    }

    fn update_at(&self, index: usize, record: &Record) -> Result<()> {
        let mut records = self.write()?;
        let len = records.len();
        let current = records
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })?;
        validate_update(index, current, record)?;
        *current = record.clone();
        Ok(())
    }

    fn remove_by_alias(&self, alias: &Path) -> Result<Option<Record>> {
        let mut records = self.write()?;
        Ok(records
            .iter()
            .position(|r| r.claims(alias))
            .map(|position| records.remove(position)))
    }

    fn retain(&self, keep: &mut dyn FnMut(&Record) -> bool) -> Result<usize> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|r| keep(r));
        Ok(before - records.len())
    }
}
