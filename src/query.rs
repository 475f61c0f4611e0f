//! Read-only questions against a built graph.

use crate::config::Config;
use crate::db::{self, Db, StoreError};
use crate::model::{EdgeKind, Node, SearchHit, StructureEntry};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Direct children of the file node.
    Shallow,
    /// Everything reachable through `contains` edges.
    Recursive,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StructureOutcome {
    Found {
        file: Node,
        entries: Vec<StructureEntry>,
    },
    NotFound {
        pattern: String,
    },
    Ambiguous {
        pattern: String,
        candidates: Vec<Node>,
    },
}

pub struct QueryEngine {
    db: Db,
    max_depth: usize,
}

impl QueryEngine {
    /// `Ok(None)` when nothing has been indexed at `db_path` yet.
    pub fn open(db_path: &Path) -> db::Result<Option<Self>> {
        if !db_path.is_file() {
            return Ok(None);
        }
        match Db::open_read_only(db_path) {
            Ok(db) => Ok(Some(Self::new(db))),
            Err(StoreError::Uninitialized(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn new(db: Db) -> Self {
        Self {
            db,
            max_depth: Config::get().max_depth,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn list_files(&self) -> db::Result<Vec<Node>> {
        self.db.list_file_nodes()
    }

    /// Resolve `pattern` to exactly one file node, then list its contents.
    ///
    /// A file whose name or path equals `pattern` wins outright; otherwise a
    /// single substring match is required and several are reported back as
    /// ambiguous.
    pub fn structure(&self, pattern: &str, depth: Depth) -> db::Result<StructureOutcome> {
        let mut candidates = self.db.find_file_nodes(pattern)?;
        let exact: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, node)| node.name == pattern || node.file_path == pattern)
            .map(|(idx, _)| idx)
            .collect();

        let file = match (exact.as_slice(), candidates.len()) {
            ([idx], _) => candidates.swap_remove(*idx),
            (_, 0) => {
                return Ok(StructureOutcome::NotFound {
                    pattern: pattern.to_string(),
                });
            }
            (_, 1) => candidates.remove(0),
            _ => {
                return Ok(StructureOutcome::Ambiguous {
                    pattern: pattern.to_string(),
                    candidates,
                });
            }
        };

        let entries = match depth {
            Depth::Shallow => self
                .db
                .children(file.id, EdgeKind::Contains)?
                .into_iter()
                .map(|node| StructureEntry { depth: 1, node })
                .collect(),
            Depth::Recursive => self
                .db
                .descendants(file.id, EdgeKind::Contains, self.max_depth)?,
        };
        Ok(StructureOutcome::Found { file, entries })
    }

    /// Case-insensitive (ASCII) substring search over every node name.
    pub fn search(&self, text: &str) -> db::Result<Vec<SearchHit>> {
        self.db.search_names(text)
    }
}
