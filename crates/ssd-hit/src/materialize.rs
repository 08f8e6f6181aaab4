//! Materialization ("hit"): replace an alias symlink with a real copy.
//!
//! The copy is streamed into a temporary file next to the alias and checked
//! against the origin's size before the alias is touched. Only then is the
//! alias removed and the temporary file renamed into its place, so a failed
//! copy leaves the symlink intact and a crash leaves at worst a missing
//! alias, which a retry treats as already removed. The stored record is never
//! written here; it stays `linked` until the caller persists the returned
//! `transferred` record.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use ssd_store::{Record, RecordStore, Status, StoreError};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::classify::{classify, PathKind};
use crate::copy::{copy_stream, CopyError, HitConfig};
use crate::error::{HitError, Result};

/// Replaces alias symlinks with copies of their origins.
#[derive(Clone, Debug, Default)]
pub struct Materializer {
    config: HitConfig,
}

impl Materializer {
    pub fn new(config: HitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HitConfig {
        &self.config
    }

    /// Replace `record.alias` with a copy of `record.origin`.
    ///
    /// Returns the record moved to `transferred`; persisting it is the
    /// caller's job.
    pub fn materialize(&self, record: &Record) -> Result<Record> {
        if record.status != Status::Linked {
            return Err(HitError::NotLinked {
                alias: record.alias.clone(),
                status: record.status,
            });
        }

        let origin = &record.origin;
        let alias = &record.alias;
        let read_failed = |source| HitError::CopySourceReadFailed {
            origin: origin.clone(),
            source,
        };
        let write_failed = |source| HitError::CopyDestWriteFailed {
            alias: alias.clone(),
            source,
        };

        match classify(origin) {
            PathKind::File => {}
            PathKind::NotFound => {
                return Err(read_failed(io::Error::new(
                    io::ErrorKind::NotFound,
                    "origin no longer exists",
                )))
            }
            kind => {
                return Err(HitError::UnsupportedOrigin {
                    origin: origin.clone(),
                    kind,
                })
            }
        }

        let mut source = File::open(origin).map_err(read_failed)?;
        let origin_meta = source.metadata().map_err(read_failed)?;
        let expected = origin_meta.len();

        let dir = match alias.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(write_failed)?;

        let copied = copy_stream(&mut source, staged.as_file_mut(), self.config.buffer_size)
            .map_err(|e| match e {
                CopyError::Read(source) => read_failed(source),
                CopyError::Write(source) => write_failed(source),
            })?;
        staged.as_file().sync_all().map_err(write_failed)?;
        let actual = staged.as_file().metadata().map_err(write_failed)?.len();

        if copied != expected || actual != expected {
            return Err(HitError::CopySizeMismatch {
                alias: alias.clone(),
                expected,
                actual: actual.max(copied),
            });
        }
        fs::set_permissions(staged.path(), origin_meta.permissions()).map_err(write_failed)?;

        remove_alias(alias)?;
        staged
            .persist(alias)
            .map_err(|e| write_failed(e.error))?;

        info!(
            origin = %origin.display(),
            alias = %alias.display(),
            bytes = copied,
            "materialized alias"
        );
        Ok(record.with_status(Status::Transferred))
    }

    /// Materialize the active record claiming `alias` and persist the result.
    pub fn hit<S: RecordStore + ?Sized>(&self, store: &S, alias: &Path) -> Result<Record> {
        let (index, record) = store
            .find_by_alias(alias)?
            .ok_or_else(|| StoreError::AliasNotFound {
                alias: alias.to_path_buf(),
            })?;
        let transferred = self.materialize(&record)?;
        store.update_at(index, &transferred)?;
        Ok(transferred)
    }
}

/// Remove the alias ahead of the rename. An alias that is already gone is
/// fine; a directory is never removed.
fn remove_alias(alias: &Path) -> Result<()> {
    let removal_failed = |source| HitError::AliasRemovalFailed {
        alias: alias.to_path_buf(),
        source,
    };

    match fs::symlink_metadata(alias) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(alias = %alias.display(), "alias already removed");
            Ok(())
        }
        Err(e) => Err(removal_failed(e)),
        Ok(meta) if meta.is_dir() => Err(removal_failed(io::Error::other(
            "alias is a directory",
        ))),
        Ok(_) => crate::fsutil::remove_symlink(alias).map_err(removal_failed),
    }
}
