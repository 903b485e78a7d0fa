//! Static asset copy.
//!
//! Runs after the pages are written. Copies `static_dir` into
//! `output_dir/STATIC`, either the whole tree or only the entries named in a
//! list file (one path per line, relative to `static_dir`).
//!
//! Failures never abort the build: each one is logged at `error`, counted,
//! and skipped.

use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Outcome of one asset copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetReport {
    /// Files copied.
    pub copied: usize,
    /// Entries that could not be copied.
    pub failed: usize,
}

/// Copy static assets from `static_dir` into `dest`.
pub fn copy_static(static_dir: &Path, dest: &Path, list: Option<&Path>) -> AssetReport {
    let mut report = AssetReport::default();
    match list {
        None => {
            tracing::info!(from = %static_dir.display(), to = %dest.display(), "Copying all static files");
            if !static_dir.is_dir() {
                tracing::warn!(dir = %static_dir.display(), "Static directory not found, nothing copied");
                return report;
            }
            copy_tree(static_dir, dest, &mut report);
        }
        Some(list) => {
            tracing::info!(list = %list.display(), "Copying static files from list");
            let entries = match fs::read_to_string(list) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(list = %list.display(), error = %e, "Static list unreadable, no static file copied");
                    return report;
                }
            };
            for entry in entries.lines().map(str::trim).filter(|l| !l.is_empty()) {
                copy_entry(static_dir, dest, entry, &mut report);
            }
        }
    }
    report
}

fn copy_entry(static_dir: &Path, dest: &Path, entry: &str, report: &mut AssetReport) {
    let src = static_dir.join(entry);
    let dst = dest.join(entry);
    if src.is_dir() {
        copy_tree(&src, &dst, report);
    } else if src.is_file() {
        match copy_file(&src, &dst) {
            Ok(()) => report.copied += 1,
            Err(e) => {
                tracing::error!(file = %entry, error = %e, "Failed to copy static file");
                report.failed += 1;
            }
        }
    } else {
        tracing::error!(entry = %entry, "Unknown static file or directory");
        report.failed += 1;
    }
}

fn copy_tree(src: &Path, dst: &Path, report: &mut AssetReport) {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read static directory");
                report.failed += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        match copy_file(entry.path(), &dst.join(relative)) {
            Ok(()) => report.copied += 1,
            Err(e) => {
                tracing::error!(file = %entry.path().display(), error = %e, "Failed to copy static file");
                report.failed += 1;
            }
        }
    }
}

fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn static_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("static");
        fs::create_dir_all(root.join("css/vendor")).unwrap();
        fs::write(root.join("favicon.ico"), "ico").unwrap();
        fs::write(root.join("css/site.css"), "body{}").unwrap();
        fs::write(root.join("css/vendor/reset.css"), "*{}").unwrap();
        fs::write(root.join("robots.txt"), "User-agent: *").unwrap();
        tmp
    }

    #[test]
    fn copies_whole_tree() {
        let tmp = static_tree();
        let dest = tmp.path().join("public/static");

        let report = copy_static(&tmp.path().join("static"), &dest, None);

        assert_eq!(report, AssetReport { copied: 4, failed: 0 });
        assert_eq!(fs::read_to_string(dest.join("css/vendor/reset.css")).unwrap(), "*{}");
        assert!(dest.join("favicon.ico").is_file());
    }

    #[test]
    fn missing_static_dir_copies_nothing() {
        let tmp = TempDir::new().unwrap();
        let report = copy_static(&tmp.path().join("nope"), &tmp.path().join("out"), None);
        assert_eq!(report, AssetReport::default());
    }

    #[test]
    fn copies_only_listed_entries() {
        let tmp = static_tree();
        let list = tmp.path().join("static.list");
        fs::write(&list, "css\n\nrobots.txt\nmissing.png\n").unwrap();
        let dest = tmp.path().join("public/static");

        let report = copy_static(&tmp.path().join("static"), &dest, Some(list.as_path()));

        assert_eq!(report, AssetReport { copied: 3, failed: 1 });
        assert!(dest.join("css/site.css").is_file());
        assert!(dest.join("css/vendor/reset.css").is_file());
        assert!(dest.join("robots.txt").is_file());
        assert!(!dest.join("favicon.ico").exists());
    }

    #[test]
    fn missing_list_copies_nothing() {
        let tmp = static_tree();
        let dest = tmp.path().join("public/static");
        let report = copy_static(
            &tmp.path().join("static"),
            &dest,
            Some(tmp.path().join("absent.list").as_path()),
        );
        assert_eq!(report, AssetReport::default());
        assert!(!dest.exists());
    }
}
