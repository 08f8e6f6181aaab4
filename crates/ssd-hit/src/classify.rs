//! Path classification used to decide whether an origin exists and how an
//! implicit alias is named.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

/// What a path names on disk, following symlinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    File,
    Directory,
    /// Exists but is neither (device, socket, fifo) or cannot be inspected.
    Other,
    NotFound,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathKind::File => "file",
            PathKind::Directory => "directory",
            PathKind::Other => "special file",
            PathKind::NotFound => "missing path",
        })
    }
}

/// Classify `path`. A dangling symlink is `NotFound`.
pub fn classify(path: &Path) -> PathKind {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => PathKind::File,
        Ok(meta) if meta.is_dir() => PathKind::Directory,
        Ok(_) => PathKind::Other,
        Err(e) if e.kind() == io::ErrorKind::NotFound => PathKind::NotFound,
        Err(_) => PathKind::Other,
    }
}
