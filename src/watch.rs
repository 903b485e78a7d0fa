//! Checksum-driven rebuild loop.
//!
//! Every `interval_ms` the watcher hashes the inputs of a build: the source
//! tree, the static tree, and the input files in the project root. When the
//! hash differs from the one taken before the last build, it runs a full
//! build. The output directory is never part of the hash, so writing the
//! output does not trigger another build.
//!
//! Builds run on the calling thread, one at a time. The stop flag is only
//! checked between polls, so a build in progress always runs to completion.

use crate::build::{self, BuildReport};
use crate::config::{PROJECT_CONFIG_FILE, ProjectConfig, SITE_CONFIG_FILE, TEMPLATE_FILE};
use crate::content::{LOCALE_FILE, VARIABLES_FILE};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use walkdir::WalkDir;

/// Project-root files that feed a build.
const ROOT_INPUTS: [&str; 5] = [
    PROJECT_CONFIG_FILE,
    SITE_CONFIG_FILE,
    TEMPLATE_FILE,
    VARIABLES_FILE,
    LOCALE_FILE,
];

/// Hex SHA-256 over the contents of every file in `dirs` (recursively, in
/// name order) and every file in `files`. Missing paths contribute nothing.
pub fn checksum(dirs: &[PathBuf], files: &[PathBuf]) -> String {
    let mut hasher = Sha256::new();
    for dir in dirs {
        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            hash_file(&mut hasher, entry.path());
        }
    }
    for file in files {
        hash_file(&mut hasher, file);
    }
    format!("{:x}", hasher.finalize())
}

fn hash_file(hasher: &mut Sha256, path: &Path) {
    let Ok(content) = fs::read(path) else {
        return;
    };
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(&content);
}

/// Rebuilds a project whenever its inputs change.
pub struct Watcher {
    root: PathBuf,
    config: ProjectConfig,
    static_list: Option<PathBuf>,
    last_checksum: Option<String>,
}

impl Watcher {
    pub fn new(root: &Path, config: ProjectConfig, static_list: Option<PathBuf>) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            static_list,
            last_checksum: None,
        }
    }

    fn current_checksum(&self) -> String {
        let dirs = [
            self.root.join(&self.config.source_dir),
            self.root.join(&self.config.static_dir),
        ];
        let mut files: Vec<PathBuf> = ROOT_INPUTS.iter().map(|f| self.root.join(f)).collect();
        files.extend(self.static_list.clone());
        checksum(&dirs, &files)
    }

    /// Build if the inputs changed since the last poll.
    ///
    /// Returns `None` when nothing changed. A failed build is logged and
    /// reported as `Some(None)`; the inputs are not retried until they
    /// change again.
    pub fn poll(&mut self) -> Option<Option<BuildReport>> {
        let sum = self.current_checksum();
        if self.last_checksum.as_deref() == Some(sum.as_str()) {
            return None;
        }
        tracing::info!("Change detected, rebuilding");
        self.last_checksum = Some(sum);
        match build::build(&self.root, &self.config, self.static_list.as_deref()) {
            Ok(report) => Some(Some(report)),
            Err(e) => {
                tracing::error!(error = %e, "Build failed, waiting for changes");
                Some(None)
            }
        }
    }

    /// Poll until `stop` is set, calling `on_build` after every successful build.
    pub fn run(&mut self, stop: &AtomicBool, mut on_build: impl FnMut(&BuildReport)) {
        let interval = Duration::from_millis(self.config.watch.interval_ms);
        while !stop.load(Ordering::SeqCst) {
            if let Some(Some(report)) = self.poll() {
                on_build(&report);
            }
            thread::sleep(interval);
        }
        tracing::info!("Watch stopped");
    }
}

/// Set `stop` when Enter is pressed or Ctrl-C is received.
pub fn install_stop_handlers(stop: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    let on_signal = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        tracing::info!("Interrupted, stopping after the current build");
        on_signal.store(true, Ordering::SeqCst);
    })?;

    thread::spawn(move || {
        let mut line = String::new();
        // EOF on stdin counts as a stop too
        let _ = io::stdin().lock().read_line(&mut line);
        stop.store(true, Ordering::SeqCst);
    });
    Ok(())
}
