//! Source tree scanning: walks the mounted root and turns every file of the
//! active dialect into node and edge records.

use crate::config::Config;
use crate::error::ScanError;
use crate::model::{EdgeRecord, NodeRecord, ScanStats};
use crate::util;
use anyhow::Result;
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub mod dialect;
pub mod python;

pub use dialect::{ExtractedFile, SourceDialect};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Ignore `.gitignore`/`.ignore` files and walk everything.
    pub no_ignore: bool,
    /// Directory names never descended into.
    pub excluded_dirs: Vec<String>,
    pub max_file_bytes: u64,
}

impl ScanOptions {
    pub fn new(no_ignore: bool) -> Self {
        Self {
            no_ignore,
            ..Self::default()
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        let config = Config::get();
        Self {
            no_ignore: false,
            excluded_dirs: config.excluded_dirs.clone(),
            max_file_bytes: megabytes(config.max_file_mb),
        }
    }
}

fn megabytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

/// Everything one full scan produced.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub stats: ScanStats,
}

impl ScanResult {
    pub fn into_parts(self) -> (Vec<NodeRecord>, Vec<EdgeRecord>) {
        (self.nodes, self.edges)
    }
}

pub struct SourceScanner {
    dialect: Box<dyn SourceDialect>,
    options: ScanOptions,
}

impl SourceScanner {
    pub fn new(dialect: Box<dyn SourceDialect>, options: ScanOptions) -> Self {
        Self { dialect, options }
    }

    pub fn python(options: ScanOptions) -> Result<Self> {
        Ok(Self::new(Box::new(python::PythonDialect::new()?), options))
    }

    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    /// Full scan of `root`. A file that cannot be read or parsed keeps its
    /// file node and loses the rest of its structure; the scan never fails.
    pub fn scan(&mut self, root: &Path) -> ScanResult {
        let mut result = ScanResult::default();
        for (rel_path, abs_path) in self.source_files(root) {
            result.stats.files += 1;
            result
                .nodes
                .push(NodeRecord::file(&rel_path, &util::file_stem(&rel_path)));

            let size = fs::metadata(&abs_path).map(|m| m.len()).unwrap_or(0);
            if size > self.options.max_file_bytes {
                warn!(path = %rel_path, bytes = size, "skipping large file");
                result.stats.skipped_large += 1;
                continue;
            }

            match self.extract_path(&rel_path, &abs_path) {
                Ok(extracted) => {
                    debug!(
                        path = %rel_path,
                        nodes = extracted.nodes.len(),
                        edges = extracted.edges.len(),
                        "extracted"
                    );
                    result.stats.parsed += 1;
                    result.nodes.extend(extracted.nodes);
                    result.edges.extend(extracted.edges);
                }
                Err(err) => {
                    warn!(error = %err, "skipping file structure");
                    result.stats.failed += 1;
                }
            }
        }
        result
    }

    fn extract_path(&mut self, rel_path: &str, abs_path: &Path) -> Result<ExtractedFile, ScanError> {
        let source = util::read_lossy(abs_path).map_err(|source| ScanError::Read {
            path: rel_path.to_string(),
            source,
        })?;
        self.dialect.extract(rel_path, &source)
    }

    /// Files of the active dialect under `root`, sorted by relative path.
    fn source_files(&self, root: &Path) -> Vec<(String, PathBuf)> {
        let mut builder = WalkBuilder::new(root);
        if self.options.no_ignore {
            builder
                .ignore(false)
                .git_ignore(false)
                .git_global(false)
                .git_exclude(false)
                .parents(false);
        } else {
            builder
                .ignore(true)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .parents(true)
                .require_git(false);
        }
        let excluded = self.options.excluded_dirs.clone();
        let walker = builder
            .hidden(false)
            .filter_entry(move |entry| !is_excluded_dir(entry, &excluded))
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(value) => value,
                Err(err) => {
                    warn!(error = %err, "walk error");
                    continue;
                }
            };
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            let handled = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| self.dialect.handles(ext))
                .unwrap_or(false);
            if !handled {
                continue;
            }
            match util::normalize_rel_path(root, path) {
                Ok(rel_path) => files.push((rel_path, path.to_path_buf())),
                Err(err) => warn!(error = %err, "skipping path outside root"),
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }
}

fn is_excluded_dir(entry: &ignore::DirEntry, excluded: &[String]) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
    if !is_dir {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    excluded.iter().any(|candidate| candidate.as_str() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_size_cap_saturates() {
        assert_eq!(megabytes(10), 10 * 1024 * 1024);
        assert_eq!(megabytes(u64::MAX), u64::MAX);
    }
}
