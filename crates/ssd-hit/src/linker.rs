//! Link creation ("ss").
//!
//! A link is only recorded once the symlink exists, and a symlink is never
//! left behind without a record: if the append fails, the symlink is removed
//! again before the error is returned.

use std::env;
use std::io;
use std::path::{self, Path, PathBuf};

use ssd_store::{Record, RecordStore, StoreError};
use tracing::{info, warn};

use crate::classify::{classify, PathKind};
use crate::error::{HitError, Result};
use crate::fsutil::{make_symlink, remove_symlink};

/// Resolve the command-line `origin` and optional `alias` to absolute paths.
///
/// Without an alias, the alias is the origin's base name in the current
/// directory. An alias naming an existing directory receives the origin's
/// base name inside that directory.
pub fn resolve_alias(origin: &Path, alias: Option<&Path>) -> Result<(PathBuf, PathBuf)> {
    let origin_abs = path::absolute(origin).map_err(|_| HitError::OriginNotFound {
        origin: origin.to_path_buf(),
    })?;

    let link_failed = |alias: &Path, source: io::Error| HitError::LinkCreationFailed {
        origin: origin_abs.clone(),
        alias: alias.to_path_buf(),
        source,
    };
    let base_name = || {
        origin_abs.file_name().ok_or_else(|| {
            link_failed(
                alias.unwrap_or(Path::new("")),
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot infer an alias name from the origin",
                ),
            )
        })
    };

    let alias_abs = match alias {
        None => {
            let cwd = env::current_dir().map_err(|e| link_failed(Path::new("."), e))?;
            cwd.join(base_name()?)
        }
        Some(alias) => {
            let alias_abs = path::absolute(alias).map_err(|e| link_failed(alias, e))?;
            if classify(&alias_abs) == PathKind::Directory {
                alias_abs.join(base_name()?)
            } else {
                alias_abs
            }
        }
    };
    Ok((origin_abs, alias_abs))
}

/// Creates tracked aliases.
pub struct Linker<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> Linker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Symlink `alias` to `origin` and record the pair as `linked`.
    ///
    /// Both paths are expected to be absolute (see [`resolve_alias`]).
    pub fn create_link(&self, origin: &Path, alias: &Path) -> Result<Record> {
        let kind = classify(origin);
        if kind == PathKind::NotFound {
            return Err(HitError::OriginNotFound {
                origin: origin.to_path_buf(),
            });
        }

        if let Some((_, existing)) = self.store.find_by_alias(alias)? {
            return Err(HitError::AliasAlreadyLinked {
                alias: alias.to_path_buf(),
                origin: existing.origin,
            });
        }

        make_symlink(origin, alias, kind).map_err(|source| HitError::LinkCreationFailed {
            origin: origin.to_path_buf(),
            alias: alias.to_path_buf(),
            source,
        })?;

        let record = Record::linked(origin, alias);
        if let Err(e) = self.store.append(&record) {
            if let Err(rollback) = remove_symlink(alias) {
                warn!(
                    alias = %alias.display(),
                    error = %rollback,
                    "could not remove symlink after failed append"
                );
            }
            return Err(match e {
                StoreError::AliasTaken { alias, origin } => {
                    HitError::AliasAlreadyLinked { alias, origin }
                }
                other => HitError::Store(other),
            });
        }

        info!(origin = %origin.display(), alias = %alias.display(), "linked");
        Ok(record)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fsutil::is_symlink;
    use ssd_store::{ErrorKind, InMemoryRecordStore, Records, Status};
    use std::fs;

    /// A store whose appends always fail.
    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn append(&self, record: &Record) -> ssd_store::Result<()> {
            Err(StoreError::Encoding {
                field: "alias",
                value: record.alias.display().to_string(),
                reason: "simulated failure".into(),
            })
        }
        fn iter(&self) -> ssd_store::Result<Records<'_>> {
            Ok(Box::new(std::iter::empty()))
        }
        fn update_at(&self, index: usize, _record: &Record) -> ssd_store::Result<()> {
            Err(StoreError::IndexOutOfRange { index, len: 0 })
        }
        fn remove_by_alias(&self, _alias: &Path) -> ssd_store::Result<Option<Record>> {
            Ok(None)
        }
        fn retain(&self, _keep: &mut dyn FnMut(&Record) -> bool) -> ssd_store::Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn link_creates_symlink_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("a.txt");
        fs::write(&origin, b"0123456789").unwrap();
        let alias = dir.path().join("b.txt");
        let store = InMemoryRecordStore::new();

        let record = Linker::new(&store).create_link(&origin, &alias).unwrap();
        assert_eq!(record.status, Status::Linked);
        assert!(is_symlink(&alias));
        assert_eq!(fs::read_link(&alias).unwrap(), origin);
        assert_eq!(store.records().unwrap(), vec![(0, record)]);
    }

    #[test]
    fn link_directory_origin() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("docs");
        fs::create_dir(&origin).unwrap();
        let alias = dir.path().join("docs-link");
        let store = InMemoryRecordStore::new();

        Linker::new(&store).create_link(&origin, &alias).unwrap();
        assert!(is_symlink(&alias));
        assert!(alias.is_dir());
    }

    #[test]
    fn missing_origin_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let alias = dir.path().join("b.txt");
        let store = InMemoryRecordStore::new();

        let err = Linker::new(&store)
            .create_link(&dir.path().join("missing.txt"), &alias)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OriginNotFound);
        assert!(fs::symlink_metadata(&alias).is_err());
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn second_link_to_same_alias_fails() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.txt");
        let second = dir.path().join("c.txt");
        fs::write(&first, b"a").unwrap();
        fs::write(&second, b"c").unwrap();
        let alias = dir.path().join("b.txt");
        let store = InMemoryRecordStore::new();
        let linker = Linker::new(&store);

        linker.create_link(&first, &alias).unwrap();
        let err = linker.create_link(&second, &alias).unwrap_err();
        match err {
            HitError::AliasAlreadyLinked { origin, .. } => assert_eq!(origin, first),
            other => panic!("expected AliasAlreadyLinked, got {other}"),
        }
        assert_eq!(fs::read_link(&alias).unwrap(), first);
        assert_eq!(store.records().unwrap().len(), 1);
    }

    #[test]
    fn existing_file_at_alias_fails_link_creation() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("a.txt");
        fs::write(&origin, b"a").unwrap();
        let alias = dir.path().join("taken.txt");
        fs::write(&alias, b"untracked").unwrap();
        let store = InMemoryRecordStore::new();

        let err = Linker::new(&store).create_link(&origin, &alias).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LinkCreationFailed);
        assert_eq!(fs::read(&alias).unwrap(), b"untracked");
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn missing_alias_parent_fails_link_creation() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("a.txt");
        fs::write(&origin, b"a").unwrap();
        let store = InMemoryRecordStore::new();

        let err = Linker::new(&store)
            .create_link(&origin, &dir.path().join("no").join("b.txt"))
            .unwrap_err();
        assert!(matches!(err, HitError::LinkCreationFailed { .. }));
    }

    #[test]
    fn failed_append_removes_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("a.txt");
        fs::write(&origin, b"a").unwrap();
        let alias = dir.path().join("b.txt");

        let err = Linker::new(&BrokenStore).create_link(&origin, &alias).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingError);
        assert!(fs::symlink_metadata(&alias).is_err());
        assert!(origin.exists());
    }

    #[test]
    fn resolve_explicit_alias() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("a.txt");
        let alias = dir.path().join("b.txt");
        let (o, a) = resolve_alias(&origin, Some(&alias)).unwrap();
        assert_eq!(o, origin);
        assert_eq!(a, alias);
    }

    #[test]
    fn resolve_alias_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("report.pdf");
        let target = dir.path().join("links");
        fs::create_dir(&target).unwrap();

        let (_, alias) = resolve_alias(&origin, Some(&target)).unwrap();
        assert_eq!(alias, target.join("report.pdf"));
    }

    #[test]
    fn resolve_implicit_alias_uses_current_directory() {
        let (origin, alias) = resolve_alias(Path::new("/srv/data/report.pdf"), None).unwrap();
        assert_eq!(origin, PathBuf::from("/srv/data/report.pdf"));
        assert_eq!(alias, env::current_dir().unwrap().join("report.pdf"));
    }

    #[test]
    fn resolve_rejects_origin_without_name() {
        let err = resolve_alias(Path::new("/"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LinkCreationFailed);
    }
}
