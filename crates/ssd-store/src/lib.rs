//! Reference store for ss-hits-doit.
//!
//! This crate owns the durable list of alias records shared by every
//! invocation of the `ssd` tool. A record ties an origin path to the alias
//! (symlink) created for it and tracks where that alias is in its lifecycle.
//!
//! # Architecture
//!
//! - **Records** are `(origin, alias, status)` triples. Status only moves
//!   forward: `linked → transferred → deleted`.
//! - **The line codec** writes one record per line as three comma-separated
//!   fields, quoting any field that would otherwise collide with a delimiter.
//! - **The file store** appends under an exclusive lock and performs every
//!   other mutation as a whole-file rewrite into a temporary file that is
//!   renamed over the original.
//! - Alias uniqueness is enforced by the store itself, under the lock, so two
//!   processes cannot both claim the same alias.
//!
//! # Modules
//!
//! - [`error`]: Error types and the [`ErrorKind`] taxonomy
//! - [`types`]: Core record types [`Record`] and [`Status`]
//! - [`codec`]: Line encoding and the streaming [`RecordIter`] reader
//! - [`rules`]: Transition and uniqueness checks shared by all backends
//! - [`traits`]: The [`RecordStore`] trait defining the storage interface
//! - [`config`]: [`StoreConfig`] and the default store location
//! - [`lock`]: Bounded-wait cross-process [`StoreLock`]
//! - [`file`]: The on-disk [`FileRecordStore`]
//! - [`memory`]: In-memory [`InMemoryRecordStore`] for tests

pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod lock;
pub mod memory;
pub mod rules;
pub mod traits;
pub mod types;

pub use codec::{decode_record, encode_record, RecordIter};
pub use config::{default_store_path, StoreConfig};
pub use error::{ErrorKind, Result, StoreError};
pub use file::FileRecordStore;
pub use lock::StoreLock;
pub use memory::InMemoryRecordStore;
pub use traits::{RecordStore, Records};
pub use types::{Record, Status};
