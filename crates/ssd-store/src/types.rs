//! Core record types for the reference store.
//!
//! A [`Record`] ties an origin path to the alias created for it. Its
//! [`Status`] tracks whether the alias is still a symlink, has been replaced
//! by a real copy, or has been retired.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a record.
///
/// States are ordered: a record may only move to a state at or after its
/// current one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The alias is a symlink pointing at the origin.
    Linked,
    /// The alias has been replaced by a full copy of the origin.
    Transferred,
    /// The record has been retired and no longer claims its alias.
    Deleted,
}

impl Status {
    /// Canonical text written to the store.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Linked => "linked",
            Status::Transferred => "transferred",
            Status::Deleted => "deleted",
        }
    }

    /// Returns `true` if moving from `self` to `next` is not a regression.
    pub fn can_become(self, next: Status) -> bool {
        next >= self
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when status text is not recognised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status {:?}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for Status {
    type Err = ParseStatusError;

    /// Accepts the canonical words and the older short spellings
    /// (`l`/`ss`, `t`/`hit`, `d`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linked" | "l" | "ss" => Ok(Status::Linked),
            "transferred" | "t" | "hit" => Ok(Status::Transferred),
            "deleted" | "d" => Ok(Status::Deleted),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A single alias record: the atomic unit of the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Absolute path to the real file or directory.
    pub origin: PathBuf,
    /// Absolute path to the symlink, or to the copy once transferred.
    pub alias: PathBuf,
    /// Where the alias is in its lifecycle.
    pub status: Status,
}

impl Record {
    /// A freshly created link.
    pub fn linked(origin: impl Into<PathBuf>, alias: impl Into<PathBuf>) -> Self {
        Self {
            origin: origin.into(),
            alias: alias.into(),
            status: Status::Linked,
        }
    }

    /// The same record moved to `status`.
    pub fn with_status(&self, status: Status) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Active records claim their alias; deleted ones do not.
    pub fn is_active(&self) -> bool {
        self.status != Status::Deleted
    }

    /// Returns `true` if this record is active and claims `alias`.
    pub fn claims(&self, alias: &Path) -> bool {
        self.is_active() && self.alias == alias
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_canonical_and_legacy_spellings() {
        assert_eq!("linked".parse::<Status>().unwrap(), Status::Linked);
        assert_eq!("ss".parse::<Status>().unwrap(), Status::Linked);
        assert_eq!("L".parse::<Status>().unwrap(), Status::Linked);
        assert_eq!("hit".parse::<Status>().unwrap(), Status::Transferred);
        assert_eq!("t".parse::<Status>().unwrap(), Status::Transferred);
        assert_eq!("d".parse::<Status>().unwrap(), Status::Deleted);
        assert_eq!(" deleted ".parse::<Status>().unwrap(), Status::Deleted);
        assert!("pending".parse::<Status>().is_err());
    }

    #[test]
    fn status_only_moves_forward() {
        assert!(Status::Linked.can_become(Status::Transferred));
        assert!(Status::Linked.can_become(Status::Deleted));
        assert!(Status::Transferred.can_become(Status::Deleted));
        assert!(Status::Transferred.can_become(Status::Transferred));
        assert!(!Status::Transferred.can_become(Status::Linked));
        assert!(!Status::Deleted.can_become(Status::Transferred));
    }

    #[test]
    fn deleted_records_release_their_alias() {
        let record = Record::linked("/tmp/a", "/tmp/b");
        assert!(record.claims(Path::new("/tmp/b")));
        assert!(!record.claims(Path::new("/tmp/a")));

        let retired = record.with_status(Status::Deleted);
        assert!(!retired.is_active());
        assert!(!retired.claims(Path::new("/tmp/b")));
    }
}
