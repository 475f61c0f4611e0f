use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Name given to a recognized construct whose grammar node carries no name.
pub const ANON_NAME: &str = "anon";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Class,
    Function,
    Method,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = UnknownKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "file" => Ok(NodeKind::File),
            "class" => Ok(NodeKind::Class),
            "function" => Ok(NodeKind::Function),
            "method" => Ok(NodeKind::Method),
            other => Err(UnknownKind::new("node", other)),
        }
    }
}

/// Relationship types. Only `Contains` is written today; the other two are
/// reserved by the schema for future extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Contains,
    Calls,
    Imports,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = UnknownKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "contains" => Ok(EdgeKind::Contains),
            "calls" => Ok(EdgeKind::Calls),
            "imports" => Ok(EdgeKind::Imports),
            other => Err(UnknownKind::new("edge", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} kind: {value}")]
pub struct UnknownKind {
    pub what: &'static str,
    pub value: String,
}

impl UnknownKind {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: i64,
    pub kind: NodeKind,
    pub name: String,
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub kind: EdgeKind,
}

/// A node as handed to the store, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInput {
    pub kind: NodeKind,
    pub name: String,
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
}

impl NodeInput {
    /// The synthetic root node of one file's containment tree.
    pub fn file(rel_path: &str, end_line: i64) -> Self {
        let name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();
        Self {
            kind: NodeKind::File,
            name,
            file_path: rel_path.to_string(),
            start_line: 0,
            end_line,
        }
    }
}

/// One row of a structure listing. `depth` is 1 for direct children of the
/// file node.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct StructureEntry {
    pub depth: usize,
    #[serde(flatten)]
    pub node: Node,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub kind: NodeKind,
    pub name: String,
    pub file_path: String,
    pub start_line: i64,
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphCounts {
    pub nodes: usize,
    pub edges: usize,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct BuildStats {
    /// Regular files enumerated under the root.
    pub scanned: usize,
    pub indexed: usize,
    /// Files whose extension maps to no grammar.
    pub unsupported: usize,
    /// Files whose grammar backend could not be loaded.
    pub skipped: usize,
    /// Files that could not be read, parsed or stored.
    pub failed: usize,
    /// Recognized constructs visited during this run.
    pub entities: usize,
    /// `contains` edges newly inserted during this run.
    pub edges: usize,
    pub nodes_total: usize,
    pub edges_total: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_text() {
        for kind in [
            NodeKind::File,
            NodeKind::Class,
            NodeKind::Function,
            NodeKind::Method,
        ] {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
        assert_eq!("contains".parse::<EdgeKind>().unwrap(), EdgeKind::Contains);
        assert!("ref".parse::<NodeKind>().is_err());
    }

    #[test]
    fn file_input_uses_last_path_segment() {
        let input = NodeInput::file("src/pkg/mod.py", 12);
        assert_eq!(input.name, "mod.py");
        assert_eq!(input.file_path, "src/pkg/mod.py");
        assert_eq!(input.start_line, 0);
        assert_eq!(input.end_line, 12);
    }
}
