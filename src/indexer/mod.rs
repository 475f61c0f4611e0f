use crate::config::Config;
use crate::db::{self, Db, StoreError};
use crate::indexer::extract::{ExtractStats, FileSource};
use crate::indexer::grammar::{Grammar, GrammarRegistry, Resolution};
use crate::indexer::scan::{ScanOptions, ScannedFile};
use crate::model::{BuildStats, NodeInput};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tree_sitter::Tree;

pub mod category;
pub mod extract;
pub mod grammar;
pub mod scan;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("build root {0} is not a directory")]
    InvalidRoot(PathBuf),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub scan: ScanOptions,
    /// Log progress every N files; 0 disables.
    pub progress_every: usize,
    /// Delete any existing store before building.
    pub fresh: bool,
}

impl BuildOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scan: ScanOptions::new(config.exclude_dirs.clone()),
            progress_every: config.progress_every,
            fresh: false,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

enum FileOutcome {
    Indexed(ExtractStats),
    Unsupported,
    Skipped,
    Failed,
}

pub struct Indexer {
    root: PathBuf,
    db: Db,
    store: StoreFiles,
    registry: GrammarRegistry,
    options: BuildOptions,
}

impl Indexer {
    pub fn new(root: PathBuf, db_path: PathBuf) -> Result<Self, BuildError> {
        Self::new_with_options(root, db_path, BuildOptions::default())
    }

    pub fn new_with_options(
        root: PathBuf,
        db_path: PathBuf,
        options: BuildOptions,
    ) -> Result<Self, BuildError> {
        if !root.is_dir() {
            return Err(BuildError::InvalidRoot(root));
        }
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        if options.fresh {
            tracing::info!("removing existing store {}", db_path.display());
            db::remove_store(&db_path)?;
        }
        let db = Db::open(&db_path)?;
        let store = StoreFiles::new(&db_path);
        Ok(Self {
            root,
            db,
            store,
            registry: GrammarRegistry::new(),
            options,
        })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Attempt every file under the root exactly once. Per-file problems
    /// are counted and logged; only a failure to read the final counts is
    /// returned as an error.
    pub fn build(&mut self) -> Result<BuildStats, BuildError> {
        let started = Instant::now();
        tracing::info!("indexing {}", self.root.display());

        let mut files = scan::scan_tree(&self.root, &self.options.scan);
        files.retain(|file| !self.store.contains(&file.abs_path));
        let total = files.len();
        let mut stats = BuildStats {
            scanned: total,
            ..Default::default()
        };

        for (idx, file) in files.iter().enumerate() {
            match index_file(&mut self.registry, &mut self.db, file) {
                FileOutcome::Indexed(extracted) => {
                    stats.indexed += 1;
                    stats.entities += extracted.entities;
                    stats.edges += extracted.edges;
                }
                FileOutcome::Unsupported => stats.unsupported += 1,
                FileOutcome::Skipped => stats.skipped += 1,
                FileOutcome::Failed => stats.failed += 1,
            }
            let processed = idx + 1;
            if self.options.progress_every > 0 && processed % self.options.progress_every == 0 {
                tracing::info!("processed {processed}/{total} files");
            }
        }

        let missing = self.registry.missing();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|grammar| grammar.name()).collect();
            tracing::warn!("skipped files for unavailable grammars: {}", names.join(", "));
        }

        let counts = self.db.counts()?;
        stats.nodes_total = counts.nodes;
        stats.edges_total = counts.edges;
        stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            indexed = stats.indexed,
            unsupported = stats.unsupported,
            skipped = stats.skipped,
            failed = stats.failed,
            nodes = stats.nodes_total,
            edges = stats.edges_total,
            "graph built in {}ms",
            stats.duration_ms
        );
        Ok(stats)
    }
}

/// The store file and its SQLite side files, which may sit under the root.
struct StoreFiles {
    dir: Option<PathBuf>,
    name: String,
}

impl StoreFiles {
    fn new(db_path: &Path) -> Self {
        let dir = db_path
            .parent()
            .and_then(|parent| std::fs::canonicalize(parent).ok());
        let name = db_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { dir, name }
    }

    fn contains(&self, path: &Path) -> bool {
        let Some(dir) = self.dir.as_deref() else {
            return false;
        };
        // Walked paths hang off the canonical root and links are not followed.
        path.parent() == Some(dir)
            && path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(&self.name))
    }
}

fn index_file(registry: &mut GrammarRegistry, db: &mut Db, file: &ScannedFile) -> FileOutcome {
    let (grammar, parser) = match registry.resolve(&file.abs_path) {
        Resolution::Available { grammar, parser } => (grammar, parser),
        Resolution::Unsupported => {
            tracing::debug!("unsupported file type: {}", file.rel_path);
            return FileOutcome::Unsupported;
        }
        Resolution::BackendMissing { grammar, reason } => {
            tracing::debug!("skipping {} ({grammar}: {reason})", file.rel_path);
            return FileOutcome::Skipped;
        }
    };

    let bytes = match std::fs::read(&file.abs_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("read error {}: {err}", file.rel_path);
            return FileOutcome::Failed;
        }
    };
    let Some(tree) = parser.parse(&bytes, None) else {
        tracing::warn!("parse error {}: parser returned no tree", file.rel_path);
        return FileOutcome::Failed;
    };
    if tree.root_node().has_error() {
        tracing::debug!("{} has syntax errors, indexing what parsed", file.rel_path);
    }

    match store_file(db, grammar, file, &bytes, &tree) {
        Ok(extracted) => FileOutcome::Indexed(extracted),
        Err(err) => {
            tracing::warn!("store error {}: {err}", file.rel_path);
            FileOutcome::Failed
        }
    }
}

/// Write one file's containment tree inside a single transaction.
fn store_file(
    db: &mut Db,
    grammar: Grammar,
    file: &ScannedFile,
    bytes: &[u8],
    tree: &Tree,
) -> db::Result<ExtractStats> {
    let mut txn = db.begin_file()?;
    let end_line = tree.root_node().end_position().row as i64;
    let file_node_id = txn.get_or_create_node(&NodeInput::file(&file.rel_path, end_line))?;
    let source = FileSource {
        rel_path: &file.rel_path,
        bytes,
        grammar,
    };
    let extracted = extract::extract_entities(tree, &source, file_node_id, &mut txn)?;
    txn.commit()?;
    Ok(extracted)
}
