//! Flat-file reference store.
//!
//! [`FileRecordStore`] keeps one encoded record per line in a single file
//! (see [`crate::codec`]). Appends write one line in a single `write_all`.
//! Every other mutation loads the whole file, applies the change in memory,
//! writes the result to a temporary file in the same directory, syncs it and
//! renames it over the original. Entries the mutation does not touch are
//! written back byte-for-byte; only new or changed records are re-encoded. All mutations hold the [`StoreLock`] from
//! the first read to the final rename, so readers only ever see a complete
//! old store or a complete new one.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::codec::{encode_record, RawEntry, RecordIter};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::lock::StoreLock;
use crate::rules::{ensure_alias_free, validate_update};
use crate::traits::{RecordStore, Records};
use crate::types::Record;

/// An entry held for a rewrite.
enum Slot {
    /// Read from disk and written back as read. `record` is `None` when the
    /// entry could not be decoded.
    Stored {
        record: Option<Record>,
        bytes: Vec<u8>,
        line: usize,
    },
    /// New or changed; encoded on rewrite.
    Fresh(Record),
}

impl Slot {
    fn record(&self) -> Option<&Record> {
        match self {
            Slot::Stored { record, .. } => record.as_ref(),
            Slot::Fresh(record) => Some(record),
        }
    }
}

/// Whole-store contents loaded under the lock.
struct Snapshot {
    slots: Vec<Slot>,
    torn: bool,
}

impl Snapshot {
    fn records(&self) -> impl Iterator<Item = &Record> {
        self.slots.iter().filter_map(Slot::record)
    }
}

/// Reference store backed by a flat file.
#[derive(Debug)]
pub struct FileRecordStore {
    config: StoreConfig,
}

impl FileRecordStore {
    /// Open (or create) the store described by `config`.
    ///
    /// Creates the containing directory and an empty store file if needed.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let path = config.path.clone();
        let unavailable = |source| StoreError::Unavailable {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(unavailable)?;

        debug!(store = %path.display(), "opened reference store");
        Ok(Self { config })
    }

    /// Open the store at `path` with default lock settings.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(
            &self.config.path,
            self.config.lock_timeout,
            self.config.lock_poll_interval,
        )
    }

    fn open_reader(&self) -> Result<RecordIter<BufReader<File>>> {
        let file = File::open(&self.config.path).map_err(|source| StoreError::Unavailable {
            path: self.config.path.clone(),
            source,
        })?;
        Ok(RecordIter::new(BufReader::new(file)))
    }

    /// Load every entry. Must be called with the lock held.
    fn load(&self) -> Result<Snapshot> {
        let mut reader = self.open_reader()?;
        let mut slots = Vec::new();
        while let Some(entry) = reader.next_entry() {
            let RawEntry {
                bytes, line, record, ..
            } = entry?;
            let record = match record {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "preserving undecodable record");
                    None
                }
            };
            slots.push(Slot::Stored {
                record,
                bytes,
                line,
            });
        }
        Ok(Snapshot {
            slots,
            torn: reader.torn_tail().is_some(),
        })
    }

    /// Atomically replace the store with `slots`. Must be called with the
    /// lock held.
    fn rewrite(&self, slots: &[Slot]) -> Result<()> {
        let path = &self.config.path;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(|source| StoreError::Unavailable {
            path: path.clone(),
            source,
        })?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            for slot in slots {
                match slot {
                    Slot::Stored { bytes, .. } => writer.write_all(bytes)?,
                    Slot::Fresh(record) => writer.write_all(encode_record(record)?.as_bytes())?,
                }
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        // Keep the mode of the file being replaced; temp files start as 0600.
        match fs::metadata(path) {
            Ok(meta) => fs::set_permissions(temp.path(), meta.permissions())?,
            Err(e) => debug!(store = %path.display(), error = %e, "no existing store to copy permissions from"),
        }
        temp.persist(path).map_err(|e| StoreError::Io(e.error))?;

        #[cfg(unix)]
        {
            if let Err(e) = File::open(dir).and_then(|dir| dir.sync_all()) {
                warn!(dir = %dir.display(), error = %e, "could not sync store directory");
            }
        }

        debug!(store = %path.display(), entries = slots.len(), "rewrote reference store");
        Ok(())
    }
}

impl RecordStore for FileRecordStore {
    fn append(&self, record: &Record) -> Result<()> {
        let line = encode_record(record)?;

        let _lock = self.lock()?;
        let mut snapshot = self.load()?;
        ensure_alias_free(snapshot.records(), &record.alias)?;

        if snapshot.torn {
            // A previous writer died mid-append; drop its partial line
            // instead of gluing the new record onto it.
            warn!(store = %self.path().display(), "discarding torn tail before append");
            snapshot.slots.push(Slot::Fresh(record.clone()));
            self.rewrite(&snapshot.slots)?;
        } else {
            let mut file = OpenOptions::new().append(true).open(self.path())?;
            file.write_all(line.as_bytes())?;
            file.sync_data()?;
        }

        debug!(
            origin = %record.origin.display(),
            alias = %record.alias.display(),
            status = %record.status,
            "appended record"
        );
        Ok(())
    }

    fn iter(&self) -> Result<Records<'_>> {
        Ok(Box::new(self.open_reader()?))
    }

    fn update_at(&self, index: usize, record: &Record) -> Result<()> {
        let _lock = self.lock()?;
        let mut snapshot = self.load()?;
        let len = snapshot.slots.len();

        let slot = snapshot
            .slots
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })?;
        match slot {
            Slot::Stored {
                record: None, line, ..
            } => {
                return Err(StoreError::Corrupt {
                    index,
                    line: *line,
                    reason: "cannot update an undecodable record".into(),
                })
            }
            Slot::Stored {
                record: Some(current),
                ..
            }
            | Slot::Fresh(current) => validate_update(index, current, record)?,
        }
        *slot = Slot::Fresh(record.clone());

        self.rewrite(&snapshot.slots)?;
        debug!(index, alias = %record.alias.display(), status = %record.status, "updated record");
        Ok(())
    }

    fn remove_by_alias(&self, alias: &Path) -> Result<Option<Record>> {
        let _lock = self.lock()?;
        let mut snapshot = self.load()?;

        let found = snapshot
            .slots
            .iter()
            .enumerate()
            .find_map(|(position, slot)| {
                slot.record()
                    .filter(|record| record.claims(alias))
                    .map(|record| (position, record.clone()))
            });
        let Some((position, removed)) = found else {
            return Ok(None);
        };

        snapshot.slots.remove(position);
        self.rewrite(&snapshot.slots)?;
        debug!(index = position, alias = %alias.display(), "removed record");
        Ok(Some(removed))
    }

    fn retain(&self, keep: &mut dyn FnMut(&Record) -> bool) -> Result<usize> {
        let _lock = self.lock()?;
        let mut snapshot = self.load()?;

        let before = snapshot.slots.len();
        snapshot
            .slots
            .retain(|slot| slot.record().map_or(true, |record| keep(record)));
        let removed = before - snapshot.slots.len();

        if removed > 0 {
            self.rewrite(&snapshot.slots)?;
        }
        debug!(removed, "pruned records");
        Ok(removed)
    }
}
