//! Retiring aliases.

use std::fs;
use std::io;
use std::path::Path;

use ssd_store::{Record, RecordStore, Status, StoreError};
use tracing::{debug, info};

use crate::error::{HitError, Result};
use crate::fsutil::remove_symlink;

/// Stop tracking `alias`.
///
/// A symlink still standing at `alias` is removed; a materialized copy is
/// left on disk. The record is then marked `deleted`, or dropped from the
/// store entirely when `purge` is set. Returns the retired record.
pub fn unlink<S: RecordStore + ?Sized>(store: &S, alias: &Path, purge: bool) -> Result<Record> {
    let (index, record) = store
        .find_by_alias(alias)?
        .ok_or_else(|| StoreError::AliasNotFound {
            alias: alias.to_path_buf(),
        })?;

    match fs::symlink_metadata(alias) {
        Ok(meta) if meta.file_type().is_symlink() => {
            remove_symlink(alias).map_err(|source| HitError::AliasRemovalFailed {
                alias: alias.to_path_buf(),
                source,
            })?;
        }
        Ok(_) => debug!(alias = %alias.display(), "alias holds real content; left in place"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(alias = %alias.display(), "alias already gone")
        }
        Err(source) => {
            return Err(HitError::AliasRemovalFailed {
                alias: alias.to_path_buf(),
                source,
            })
        }
    }

    let retired = if purge {
        store.remove_by_alias(alias)?.unwrap_or(record)
    } else {
        let deleted = record.with_status(Status::Deleted);
        store.update_at(index, &deleted)?;
        deleted
    };

    info!(alias = %alias.display(), purge, "unlinked");
    Ok(retired)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::classify::PathKind;
    use crate::fsutil::{is_symlink, make_symlink};
    use crate::materialize::Materializer;
    use ssd_store::{ErrorKind, InMemoryRecordStore};

    fn linked(dir: &Path, store: &InMemoryRecordStore) -> Record {
        let origin = dir.join("a.txt");
        let alias = dir.join("b.txt");
        fs::write(&origin, b"content").unwrap();
        make_symlink(&origin, &alias, PathKind::File).unwrap();
        let record = Record::linked(origin, alias);
        store.append(&record).unwrap();
        record
    }

    #[test]
    fn unlink_removes_symlink_and_marks_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryRecordStore::new();
        let record = linked(dir.path(), &store);

        let retired = unlink(&store, &record.alias, false).unwrap();
        assert_eq!(retired.status, Status::Deleted);
        assert!(fs::symlink_metadata(&record.alias).is_err());
        assert!(record.origin.exists());

        let all = store.records().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1.status, Status::Deleted);
        assert!(store.find_by_alias(&record.alias).unwrap().is_none());
    }

    #[test]
    fn purge_drops_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryRecordStore::new();
        let record = linked(dir.path(), &store);

        let retired = unlink(&store, &record.alias, true).unwrap();
        assert_eq!(retired.alias, record.alias);
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn transferred_copy_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryRecordStore::new();
        let record = linked(dir.path(), &store);
        Materializer::default().hit(&store, &record.alias).unwrap();

        unlink(&store, &record.alias, false).unwrap();
        assert!(!is_symlink(&record.alias));
        assert_eq!(fs::read(&record.alias).unwrap(), b"content");
    }

    #[test]
    fn missing_alias_on_disk_still_retires_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryRecordStore::new();
        let record = linked(dir.path(), &store);
        fs::remove_file(&record.alias).unwrap();

        assert_eq!(
            unlink(&store, &record.alias, false).unwrap().status,
            Status::Deleted
        );
    }

    #[test]
    fn unknown_alias() {
        let store = InMemoryRecordStore::new();
        let err = unlink(&store, Path::new("/nowhere/b.txt"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RecordNotFound);
    }

    #[test]
    fn alias_can_be_linked_again_after_unlink() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryRecordStore::new();
        let record = linked(dir.path(), &store);
        unlink(&store, &record.alias, false).unwrap();

        crate::Linker::new(&store)
            .create_link(&record.origin, &record.alias)
            .unwrap();
        assert_eq!(store.records().unwrap().len(), 2);
    }
}
