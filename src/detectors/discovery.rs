//! detectors/discovery.rs
//!
//! Finds test files under a root by file-name convention.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::logger;

pub struct Discovery {
    patterns: Vec<Pattern>,
    ignore_dirs: Vec<String>,
    temp_marker: String,
}

impl Discovery {
    pub fn from_config(cfg: &Config) -> Self {
        let patterns = cfg
            .patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pat) => Some(pat),
                Err(e) => {
                    warn!(target: logger::PROCESSOR, pattern = %p, "ignoring bad pattern: {e}");
                    None
                }
            })
            .collect();

        Self {
            patterns,
            ignore_dirs: cfg.ignore_dirs.clone(),
            temp_marker: cfg.temp_marker.clone(),
        }
    }

    /// Sorted, recursive. A missing root yields an empty list.
    pub fn find(&self, root: &Path) -> Vec<PathBuf> {
        debug!(target: logger::PROCESSOR, root = %root.display(), "searching for test files");

        if !root.exists() {
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !self.is_ignored_dir(e))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.is_test_file(e.file_name().to_string_lossy().as_ref()))
            .map(DirEntry::into_path)
            .collect();

        files.sort();
        debug!(target: logger::PROCESSOR, count = files.len(), "test files found");
        files
    }

    fn is_test_file(&self, name: &str) -> bool {
        // Leftovers from a killed run must never be picked up as tests.
        if !self.temp_marker.is_empty() && name.contains(&format!("{}-", self.temp_marker)) {
            return false;
        }
        self.patterns.iter().any(|p| p.matches(name))
    }

    fn is_ignored_dir(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|n| self.ignore_dirs.iter().any(|d| d == n))
                .unwrap_or(false)
    }
}
