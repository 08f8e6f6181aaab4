//! Platform symlink helpers.

use std::fs;
use std::io;
use std::path::Path;

use crate::classify::PathKind;

/// Create a symlink at `alias` pointing to `origin`.
///
/// `kind` is the origin's kind; Windows needs it to pick a file or
/// directory link.
pub fn make_symlink(origin: &Path, alias: &Path, kind: PathKind) -> io::Result<()> {
    #[cfg(unix)]
    {
        let _ = kind;
        std::os::unix::fs::symlink(origin, alias)
    }
    #[cfg(windows)]
    {
        if kind == PathKind::Directory {
            std::os::windows::fs::symlink_dir(origin, alias)
        } else {
            std::os::windows::fs::symlink_file(origin, alias)
        }
    }
}

/// Returns `true` if `path` itself is a symlink (not followed).
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Remove the symlink at `path` without touching its target.
pub fn remove_symlink(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        // Windows directory links are removed as directories.
        #[cfg(windows)]
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => fs::remove_dir(path),
        other => other,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn make_and_remove_leaves_target() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin.txt");
        fs::write(&origin, b"keep me").unwrap();
        let alias = dir.path().join("alias.txt");

        make_symlink(&origin, &alias, PathKind::File).unwrap();
        assert!(is_symlink(&alias));
        assert!(!is_symlink(&origin));

        remove_symlink(&alias).unwrap();
        assert!(!alias.exists());
        assert_eq!(fs::read(&origin).unwrap(), b"keep me");
    }

    #[test]
    fn symlink_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("docs");
        fs::create_dir(&target).unwrap();
        let alias = dir.path().join("docs-link");

        make_symlink(&target, &alias, PathKind::Directory).unwrap();
        assert!(is_symlink(&alias));
        remove_symlink(&alias).unwrap();
        assert!(target.is_dir());
    }
}
