use crate::config::Config;
use crate::model::{
    Edge, EdgeKind, GraphCounts, Node, NodeInput, NodeKind, SearchHit, StructureEntry,
};
use crate::util;
use blake3::Hasher;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, Row, Transaction, params};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod schema;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("remove store {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store {path} has schema version {found}, expected {expected}; rebuild it with --fresh")]
    SchemaVersion {
        path: PathBuf,
        found: i64,
        expected: i64,
    },
    #[error("store {0} has not been initialized")]
    Uninitialized(PathBuf),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

const NODE_COLUMNS: &str = "n.id, n.kind, n.name, n.file_path, n.start_line, n.end_line";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDigest {
    pub rows: usize,
    pub hash: String,
}

/// Content digest of the whole graph, independent of surrogate ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDigest {
    pub nodes: TableDigest,
    pub edges: TableDigest,
}

pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open (creating if needed) a writable store and make sure the schema
    /// exists.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(busy_timeout())?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;
        let found = schema::version(&conn)?;
        if found != 0 && found != schema::SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                path: db_path.to_path_buf(),
                found,
                expected: schema::SCHEMA_VERSION,
            });
        }
        schema::init(&conn)?;
        tracing::debug!(path = %db_path.display(), "graph store ready");

        Ok(Self { conn })
    }

    /// Open an existing store for queries. Never creates the file or the
    /// schema, and rejects writes at the SQL level.
    pub fn open_read_only(db_path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout())?;
        conn.pragma_update(None, "query_only", true)?;
        let found = schema::version(&conn)?;
        if found == 0 {
            return Err(StoreError::Uninitialized(db_path.to_path_buf()));
        }
        if found != schema::SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                path: db_path.to_path_buf(),
                found,
                expected: schema::SCHEMA_VERSION,
            });
        }
        Ok(Self { conn })
    }

    /// Start the write transaction for one file. Dropping the returned
    /// handle without `commit` discards everything written through it.
    pub fn begin_file(&mut self) -> Result<FileTxn<'_>> {
        Ok(FileTxn {
            tx: self.conn.transaction()?,
        })
    }

    pub fn get_or_create_node(&self, input: &NodeInput) -> Result<i64> {
        get_or_create_node(&self.conn, input)
    }

    pub fn create_edge(&self, source_id: i64, target_id: i64, kind: EdgeKind) -> Result<bool> {
        create_edge(&self.conn, source_id, target_id, kind)
    }

    pub fn counts(&self) -> Result<GraphCounts> {
        let nodes: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        let edges: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(GraphCounts {
            nodes: nodes as usize,
            edges: edges as usize,
        })
    }

    pub fn list_file_nodes(&self) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS}
             FROM nodes n
             WHERE n.kind = ?1
             ORDER BY n.name, n.file_path"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![NodeKind::File], node_from_row)?;
        collect_rows(rows)
    }

    /// File nodes whose path contains `pattern` (ASCII case-insensitive).
    pub fn find_file_nodes(&self, pattern: &str) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS}
             FROM nodes n
             WHERE n.kind = ?1 AND n.file_path LIKE ?2 ESCAPE '\\'
             ORDER BY n.file_path"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![NodeKind::File, util::contains_pattern(pattern)],
            node_from_row,
        )?;
        collect_rows(rows)
    }

    /// Every node recorded for one file, in source order.
    pub fn nodes_in_file(&self, file_path: &str) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS}
             FROM nodes n
             WHERE n.file_path = ?1
             ORDER BY n.start_line, n.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![file_path], node_from_row)?;
        collect_rows(rows)
    }

    /// Direct targets of `kind` edges leaving `source_id`, by start line.
    pub fn children(&self, source_id: i64, kind: EdgeKind) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS}
             FROM edges e
             JOIN nodes n ON n.id = e.target_id
             WHERE e.source_id = ?1 AND e.kind = ?2
             ORDER BY n.start_line, n.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![source_id, kind], node_from_row)?;
        collect_rows(rows)
    }

    /// Fixed-point closure over `kind` edges from `root_id`, excluding the
    /// root itself. Each node is reported once at its shallowest depth;
    /// `max_depth` bounds the walk even if the edges contain a cycle.
    pub fn descendants(
        &self,
        root_id: i64,
        kind: EdgeKind,
        max_depth: usize,
    ) -> Result<Vec<StructureEntry>> {
        let sql = format!(
            "WITH RECURSIVE tree(id, depth) AS (
                 SELECT ?1, 0
                 UNION
                 SELECT e.target_id, tree.depth + 1
                 FROM edges e
                 JOIN tree ON e.source_id = tree.id
                 WHERE e.kind = ?2 AND tree.depth < ?3
             )
             SELECT {NODE_COLUMNS}, MIN(tree.depth) AS level
             FROM tree
             JOIN nodes n ON n.id = tree.id
             WHERE n.id != ?1
             GROUP BY n.id
             ORDER BY level, n.start_line, n.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![root_id, kind, max_depth as i64], |row| {
            let node = node_from_row(row)?;
            let level: i64 = row.get(6)?;
            Ok(StructureEntry {
                depth: level as usize,
                node,
            })
        })?;
        collect_rows(rows)
    }

    /// Nodes of any kind whose name contains `text` (ASCII
    /// case-insensitive), ordered by kind then name.
    pub fn search_names(&self, text: &str) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, name, file_path, start_line
             FROM nodes
             WHERE name LIKE ?1 ESCAPE '\\'
             ORDER BY kind, name, file_path, start_line",
        )?;
        let rows = stmt.query_map(params![util::contains_pattern(text)], |row| {
            Ok(SearchHit {
                kind: row.get(0)?,
                name: row.get(1)?,
                file_path: row.get(2)?,
                start_line: row.get(3)?,
            })
        })?;
        collect_rows(rows)
    }

    pub fn edges_from(&self, source_id: i64) -> Result<Vec<Edge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, target_id, kind
             FROM edges
             WHERE source_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![source_id], |row| {
            Ok(Edge {
                id: row.get(0)?,
                source_id: row.get(1)?,
                target_id: row.get(2)?,
                kind: row.get(3)?,
            })
        })?;
        collect_rows(rows)
    }

    pub fn digest(&self) -> Result<GraphDigest> {
        Ok(GraphDigest {
            nodes: self.digest_nodes()?,
            edges: self.digest_edges()?,
        })
    }

    fn digest_nodes(&self) -> Result<TableDigest> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, name, file_path, start_line, end_line
             FROM nodes
             ORDER BY file_path, start_line, name, kind",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(0)?;
            let name: String = row.get(1)?;
            let file_path: String = row.get(2)?;
            let start_line: i64 = row.get(3)?;
            let end_line: i64 = row.get(4)?;
            Ok(json!([kind, name, file_path, start_line, end_line]).to_string())
        })?;
        digest_rows(rows)
    }

    fn digest_edges(&self) -> Result<TableDigest> {
        let mut stmt = self.conn.prepare(
            "SELECT s.file_path, s.name, s.start_line, t.file_path, t.name, t.start_line, e.kind
             FROM edges e
             JOIN nodes s ON s.id = e.source_id
             JOIN nodes t ON t.id = e.target_id
             ORDER BY 1, 3, 2, 4, 6, 5, 7",
        )?;
        let rows = stmt.query_map([], |row| {
            let source_path: String = row.get(0)?;
            let source_name: String = row.get(1)?;
            let source_line: i64 = row.get(2)?;
            let target_path: String = row.get(3)?;
            let target_name: String = row.get(4)?;
            let target_line: i64 = row.get(5)?;
            let kind: String = row.get(6)?;
            Ok(json!([
                source_path,
                source_name,
                source_line,
                target_path,
                target_name,
                target_line,
                kind
            ])
            .to_string())
        })?;
        digest_rows(rows)
    }
}

/// One file's worth of writes, committed as a unit.
pub struct FileTxn<'a> {
    tx: Transaction<'a>,
}

impl FileTxn<'_> {
    pub fn get_or_create_node(&self, input: &NodeInput) -> Result<i64> {
        get_or_create_node(&self.tx, input)
    }

    pub fn create_edge(&self, source_id: i64, target_id: i64, kind: EdgeKind) -> Result<bool> {
        create_edge(&self.tx, source_id, target_id, kind)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

/// Delete a store file together with its WAL side files. Missing files are
/// not an error.
pub fn remove_store(db_path: &Path) -> Result<()> {
    let mut targets = vec![db_path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        targets.push(PathBuf::from(name));
    }
    for path in targets {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(StoreError::Remove { path, source }),
        }
    }
    Ok(())
}

// Insert-then-lookup keeps the uniqueness check inside SQLite.
fn get_or_create_node(conn: &Connection, input: &NodeInput) -> Result<i64> {
    conn.prepare_cached(
        "INSERT INTO nodes (kind, name, file_path, start_line, end_line)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(file_path, name, start_line) DO NOTHING",
    )?
    .execute(params![
        input.kind,
        input.name,
        input.file_path,
        input.start_line,
        input.end_line
    ])?;
    let id = conn
        .prepare_cached("SELECT id FROM nodes WHERE file_path = ?1 AND name = ?2 AND start_line = ?3")?
        .query_row(
            params![input.file_path, input.name, input.start_line],
            |row| row.get(0),
        )?;
    Ok(id)
}

fn create_edge(conn: &Connection, source_id: i64, target_id: i64, kind: EdgeKind) -> Result<bool> {
    let inserted = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO edges (source_id, target_id, kind) VALUES (?1, ?2, ?3)",
        )?
        .execute(params![source_id, target_id, kind])?;
    Ok(inserted > 0)
}

fn busy_timeout() -> Duration {
    Duration::from_secs(Config::get().busy_timeout_secs)
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    Ok(Node {
        id: row.get(0)?,
        kind: row.get(1)?,
        name: row.get(2)?,
        file_path: row.get(3)?,
        start_line: row.get(4)?,
        end_line: row.get(5)?,
    })
}

fn collect_rows<T, I>(rows: I) -> Result<Vec<T>>
where
    I: Iterator<Item = rusqlite::Result<T>>,
{
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn digest_rows<I>(rows: I) -> Result<TableDigest>
where
    I: Iterator<Item = rusqlite::Result<String>>,
{
    let mut hasher = Hasher::new();
    let mut count = 0;
    for row in rows {
        let row = row?;
        hasher.update(row.as_bytes());
        hasher.update(b"\n");
        count += 1;
    }
    Ok(TableDigest {
        rows: count,
        hash: hasher.finalize().to_hex().to_string(),
    })
}

impl ToSql for NodeKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for NodeKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for EdgeKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EdgeKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}
