use crate::config::Config;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Entry names pruned wherever they appear below the root.
    pub exclude_dirs: Vec<String>,
    /// Honour `.gitignore`/`.ignore` files.
    pub respect_gitignore: bool,
}

impl ScanOptions {
    pub fn new(exclude_dirs: Vec<String>) -> Self {
        Self {
            exclude_dirs,
            respect_gitignore: false,
        }
    }

    pub fn respect_gitignore(mut self, value: bool) -> Self {
        self.respect_gitignore = value;
        self
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new(Config::default().exclude_dirs)
    }
}

/// Every regular file under `root`, sorted by relative path. Unreadable
/// entries are logged and skipped.
pub fn scan_tree(root: &Path, options: &ScanOptions) -> Vec<ScannedFile> {
    let mut files = Vec::new();
    let mut builder = WalkBuilder::new(root);
    if options.respect_gitignore {
        builder
            .ignore(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .require_git(false);
    } else {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    }
    let excluded: HashSet<OsString> = options
        .exclude_dirs
        .iter()
        .map(OsString::from)
        .collect();
    let walker = builder
        .hidden(false)
        .follow_links(false)
        .filter_entry(move |entry| entry.depth() == 0 || !excluded.contains(entry.file_name()))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let rel_path = match crate::util::normalize_rel_path(root, path) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("skipping {}: {err}", path.display());
                continue;
            }
        };
        files.push(ScannedFile {
            rel_path,
            abs_path: path.to_path_buf(),
        });
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    files
}
