//! Consistency rules every store backend enforces.
//!
//! - Alias uniqueness: at most one active record claims a given alias.
//! - Status monotonicity: `linked → transferred → deleted`, never backwards.
//! - Positional updates must target the record they think they target: the
//!   record at the index must name the same alias as the replacement.

use std::path::Path;

use crate::error::{Result, StoreError};
use crate::types::{Record, Status};

/// Validate a status change, returning `Ok(())` if it does not move backwards.
///
/// # Examples
///
/// ```
/// use ssd_store::rules::validate_transition;
/// use ssd_store::Status;
///
/// assert!(validate_transition(Status::Linked, Status::Transferred).is_ok());
/// assert!(validate_transition(Status::Transferred, Status::Linked).is_err());
/// ```
pub fn validate_transition(from: Status, to: Status) -> Result<()> {
    if from.can_become(to) {
        Ok(())
    } else {
        Err(StoreError::StatusRegression { from, to })
    }
}

/// Validate replacing `current` (stored at `index`) with `next`.
pub fn validate_update(index: usize, current: &Record, next: &Record) -> Result<()> {
    if current.alias != next.alias {
        return Err(StoreError::RecordMismatch {
            index,
            expected: next.alias.clone(),
            found: current.alias.clone(),
        });
    }
    validate_transition(current.status, next.status)
}

/// Fail with [`StoreError::AliasTaken`] if any active record claims `alias`.
pub fn ensure_alias_free<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    alias: &Path,
) -> Result<()> {
    match records.into_iter().find(|r| r.claims(alias)) {
        Some(existing) => Err(StoreError::AliasTaken {
            alias: alias.to_path_buf(),
            origin: existing.origin.clone(),
        }),
        None => Ok(()),
    }
}
