//! Shared test utilities for the treeweave test suite.
//!
//! Provides project scaffolding in a temp directory and output lookups that
//! panic with a clear message on miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = project(&[
//!     ("template.html", "<h1>{$title$}</h1>"),
//!     ("website/variables.yaml", "title: Home"),
//! ]);
//! build_project(tmp.path()).unwrap();
//! assert_eq!(read_page(tmp.path(), "index.html"), "<h1>Home</h1>");
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::build::{self, BuildError, BuildReport};
use crate::config::ProjectConfig;

#[path = "../tests/common/mod.rs"]
mod common;
pub use common::setup_fixtures;

// =========================================================================
// Project setup
// =========================================================================

/// `config.yaml` used when a test does not provide its own.
pub const SITE_CONFIG: &str = "\
LOCATION: https://example.org/
STATIC: static/
DEFAULT_LANGUAGE: en
ALT_LANGUAGES:
  - fr
";

/// Write `(relative path, contents)` pairs under `root`, creating parents.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
    }
}

/// A fresh project with an empty `website/`, [`SITE_CONFIG`] and an empty
/// template, overlaid with `files`.
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("website")).unwrap();
    write_files(
        tmp.path(),
        &[("config.yaml", SITE_CONFIG), ("template.html", "")],
    );
    write_files(tmp.path(), files);
    tmp
}

/// Build the project at `root` with stock project settings.
pub fn build_project(root: &Path) -> Result<BuildReport, BuildError> {
    build::build(root, &ProjectConfig::default(), None)
}

// =========================================================================
// Output lookups: panic with a clear message on miss
// =========================================================================

/// Read a page from `public/`. Panics listing the emitted files if missing.
pub fn read_page(root: &Path, relative: &str) -> String {
    let path = root.join("public").join(relative);
    fs::read_to_string(&path).unwrap_or_else(|_| {
        let available = output_files(root);
        panic!("page '{relative}' not found. Available: {available:?}")
    })
}

/// Every file under `public/`, relative and sorted.
pub fn output_files(root: &Path) -> Vec<String> {
    let public = root.join("public");
    WalkDir::new(&public)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(&public)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}
