//! Directory-only depth-first traversal with enter/exit hooks.
//!
//! The build visits the source tree one directory at a time. Files are never
//! visited here; each directory's loader reads the files it cares about when
//! its `enter` hook runs. Every directory receives exactly one `enter` call
//! before any of its descendants and exactly one `exit` call after all of
//! them, which is what keeps the scope stacks balanced.
//!
//! Children are visited in name order so that two builds of the same tree
//! produce the same registration order (and therefore the same winner when
//! tags collide). Hidden directories and symlinks are skipped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Receives the enter/exit events of [`walk`].
pub trait DirVisitor {
    type Error: From<io::Error>;

    /// Called before any child of `dir` is visited.
    fn enter(&mut self, dir: &Path) -> Result<(), Self::Error>;

    /// Called after every child of `dir` has been visited.
    fn exit(&mut self, dir: &Path) -> Result<(), Self::Error>;
}

/// Walk `root` and every directory below it, pre-order `enter`, post-order `exit`.
///
/// The first hook error stops the walk and is returned unchanged; in that
/// case no further hooks run, including the pending `exit` calls.
pub fn walk<V: DirVisitor>(root: &Path, visitor: &mut V) -> Result<(), V::Error> {
    visitor.enter(root)?;
    for child in child_dirs(root)? {
        walk(&child, visitor)?;
    }
    visitor.exit(root)
}

/// Subdirectories of `path` in name order, hidden ones excluded.
///
/// Symlinks are not followed: a link back to an ancestor would otherwise
/// be walked until the path length limit.
fn child_dirs(path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if file_type.is_symlink() {
            tracing::warn!(path = %entry.path().display(), "Skipping symlink in source tree");
            continue;
        }
        if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }

    dirs.sort();
    Ok(dirs)
}
