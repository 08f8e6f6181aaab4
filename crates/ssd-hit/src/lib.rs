//! Alias operations for ss-hits-doit.
//!
//! This crate drives the reference store from `ssd-store` through an alias's
//! whole lifecycle:
//!
//! - [`Linker`] creates a symlink for an origin and records it as `linked`.
//! - [`Materializer`] "hits" a record: it replaces the symlink with a
//!   byte-for-byte copy of the origin and returns the record as
//!   `transferred`.
//! - [`run_all`] applies every pending materialization, isolating failures
//!   per record.
//! - [`unlink`] removes a symlink and retires its record.
//!
//! Every operation reads and writes records only through the
//! [`ssd_store::RecordStore`] trait.

pub mod batch;
pub mod classify;
pub mod copy;
pub mod error;
pub mod fsutil;
pub mod linker;
pub mod materialize;
pub mod unlink;

pub use batch::{run_all, BatchFailure, BatchReport, BatchSuccess};
pub use classify::{classify, PathKind};
pub use copy::{copy_stream, CopyError, HitConfig, DEFAULT_BUFFER_SIZE};
pub use error::{HitError, Result};
pub use linker::{resolve_alias, Linker};
pub use materialize::Materializer;
pub use unlink::unlink;
