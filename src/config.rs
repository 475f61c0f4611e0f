// Configuration module for archive-graph
// Reads from environment variables with sensible defaults

use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Directories pruned from every build unless overridden.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", "node_modules", "__pycache__"];

/// Store location relative to the project root.
pub const STORE_DIR: &[&str] = &["Agent-Context", "Archives"];
pub const STORE_FILE: &str = "graph.db";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory names skipped during enumeration (ARCHIVE_GRAPH_EXCLUDE_DIRS, comma separated)
    pub exclude_dirs: Vec<String>,

    /// Log a progress line every N files; 0 disables (ARCHIVE_GRAPH_PROGRESS_EVERY)
    pub progress_every: usize,

    /// Depth limit for recursive structure listings (ARCHIVE_GRAPH_MAX_DEPTH)
    pub max_depth: usize,

    /// SQLite busy timeout in seconds (ARCHIVE_GRAPH_BUSY_TIMEOUT_SECS)
    pub busy_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            progress_every: 10,
            max_depth: 64,
            busy_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(val) = lookup("ARCHIVE_GRAPH_EXCLUDE_DIRS") {
            config.exclude_dirs = val
                .split(',')
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .map(str::to_string)
                .collect();
        }

        config.progress_every = parse_var(
            &lookup,
            "ARCHIVE_GRAPH_PROGRESS_EVERY",
            config.progress_every,
        );
        config.max_depth = parse_var(&lookup, "ARCHIVE_GRAPH_MAX_DEPTH", config.max_depth);
        config.busy_timeout_secs = parse_var(
            &lookup,
            "ARCHIVE_GRAPH_BUSY_TIMEOUT_SECS",
            config.busy_timeout_secs,
        );

        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
{
    let Some(val) = lookup(key) else {
        return default;
    };
    match val.trim().parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!("Invalid {key} value: {val}, using default: {default}");
            default
        }
    }
}

/// Where the graph store lives for a given project root.
pub fn default_db_path(root: &Path) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in STORE_DIR {
        path.push(part);
    }
    path.join(STORE_FILE)
}
