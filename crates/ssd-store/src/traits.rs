//! The [`RecordStore`] trait defining the reference storage interface.
//!
//! Any backend (flat file, in-memory) implements this trait. Linking,
//! materializing and unlinking only ever touch records through it.

use std::path::Path;

use tracing::warn;

use crate::error::Result;
use crate::types::Record;

/// Boxed record sequence returned by [`RecordStore::iter`].
pub type Records<'a> = Box<dyn Iterator<Item = Result<(usize, Record)>> + 'a>;

/// Storage backend for alias records.
///
/// Implementations must enforce the rules in [`crate::rules`] on every
/// mutation, and every mutation must be all-or-nothing.
pub trait RecordStore: Send + Sync {
    /// Append a new record as the last entry.
    ///
    /// Fails with `AliasTaken` if an active record already claims the alias.
    fn append(&self, record: &Record) -> Result<()>;

    /// Iterate all records in storage order.
    ///
    /// Each call starts a fresh pass. Undecodable entries appear as `Err`
    /// items without ending the sequence.
    fn iter(&self) -> Result<Records<'_>>;

    /// Replace the record at `index`.
    ///
    /// Fails with `IndexOutOfRange` if there is no such record, and with
    /// `StatusRegression` or `RecordMismatch` if the replacement breaks a rule.
    fn update_at(&self, index: usize, record: &Record) -> Result<()>;

    /// Physically remove the active record claiming `alias`.
    ///
    /// Returns `Ok(None)` if no active record claims it.
    fn remove_by_alias(&self, alias: &Path) -> Result<Option<Record>>;

    /// Keep only records for which `keep` returns `true`. Returns the
    /// number of records removed.
    fn retain(&self, keep: &mut dyn FnMut(&Record) -> bool) -> Result<usize>;

    /// Find the active record claiming `alias`.
    ///
    /// Undecodable entries are skipped: they cannot claim anything.
    fn find_by_alias(&self, alias: &Path) -> Result<Option<(usize, Record)>> {
        for item in self.iter()? {
            match item {
                Ok((index, record)) if record.claims(alias) => return Ok(Some((index, record))),
                Ok(_) => {}
                Err(e @ crate::StoreError::Corrupt { .. }) => {
                    warn!(error = %e, "skipping corrupt record during lookup");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Collect every decodable record, failing on the first error.
    fn records(&self) -> Result<Vec<(usize, Record)>> {
        self.iter()?.collect()
    }
}
