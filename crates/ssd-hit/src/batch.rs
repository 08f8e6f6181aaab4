//! Batch materialization ("doit").
//!
//! Every `linked` record is materialized and persisted independently. A
//! failure is recorded in the [`BatchReport`] and the batch moves on to the
//! next record.

use std::path::{Path, PathBuf};

use serde::Serialize;
use ssd_store::{ErrorKind, Record, RecordStore, Status, StoreError};
use tracing::{debug, info, warn};

use crate::error::{HitError, Result};
use crate::materialize::Materializer;

/// A record that was materialized and persisted.
#[derive(Clone, Debug, Serialize)]
pub struct BatchSuccess {
    pub index: usize,
    pub record: Record,
}

/// A record the batch could not process.
#[derive(Clone, Debug, Serialize)]
pub struct BatchFailure {
    /// Store position, when known.
    pub index: Option<usize>,
    /// Alias of the failing record; absent for undecodable entries.
    pub alias: Option<PathBuf>,
    pub kind: ErrorKind,
    pub message: String,
}

impl BatchFailure {
    fn from_hit(index: usize, alias: &Path, err: &HitError) -> Self {
        Self {
            index: Some(index),
            alias: Some(alias.to_path_buf()),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    fn from_store(err: &StoreError) -> Self {
        let index = match err {
            StoreError::Corrupt { index, .. } => Some(*index),
            _ => None,
        };
        Self {
            index,
            alias: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of [`run_all`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub transferred: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
    /// Records that were not `linked` and so needed no work.
    pub skipped: usize,
}

impl BatchReport {
    /// `true` when no record failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Materialize every `linked` record in `store`.
///
/// Only opening the store can fail the batch as a whole; every per-record
/// error, including undecodable entries, lands in the report.
pub fn run_all<S: RecordStore + ?Sized>(store: &S, materializer: &Materializer) -> Result<BatchReport> {
    // Snapshot first: each update rewrites the store underneath the reader.
    let entries: Vec<_> = store.iter()?.collect();
    let mut report = BatchReport::default();

    for entry in entries {
        let (index, record) = match entry {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "batch cannot read record");
                report.failed.push(BatchFailure::from_store(&e));
                continue;
            }
        };

        if record.status != Status::Linked {
            debug!(index, alias = %record.alias.display(), status = %record.status, "skipping");
            report.skipped += 1;
            continue;
        }

        let outcome = materializer
            .materialize(&record)
            .and_then(|done| store.update_at(index, &done).map(|()| done).map_err(HitError::from));
        match outcome {
            Ok(done) => report.transferred.push(BatchSuccess { index, record: done }),
            Err(e) => {
                warn!(index, alias = %record.alias.display(), error = %e, "materialization failed");
                report.failed.push(BatchFailure::from_hit(index, &record.alias, &e));
            }
        }
    }

    info!(
        transferred = report.transferred.len(),
        failed = report.failed.len(),
        skipped = report.skipped,
        "batch finished"
    );
    Ok(report)
}
