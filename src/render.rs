use crate::model::{BuildStats, Node, SearchHit};
use crate::query::StructureOutcome;
use std::fmt::Write;
use std::path::Path;

pub const NO_STORE: &str = "No graph database found. Run build first.";
pub const NO_MATCHES: &str = "No matching nodes found.";

pub fn files(nodes: &[Node]) -> String {
    if nodes.is_empty() {
        return "No files indexed.\n".to_string();
    }
    let mut out = String::new();
    for node in nodes {
        let _ = writeln!(out, "{} ({})", node.name, node.file_path);
    }
    out
}

pub fn structure(outcome: &StructureOutcome) -> String {
    let mut out = String::new();
    match outcome {
        StructureOutcome::Found { file, entries } => {
            let _ = writeln!(out, "Structure of {}:", file.file_path);
            for entry in entries {
                let indent = "  ".repeat(entry.depth);
                let _ = writeln!(
                    out,
                    "{indent}[{}] {}: {}",
                    entry.node.start_line, entry.node.kind, entry.node.name
                );
            }
        }
        StructureOutcome::NotFound { pattern } => {
            let _ = writeln!(out, "File not found matching: {pattern}");
        }
        StructureOutcome::Ambiguous {
            pattern,
            candidates,
        } => {
            let _ = writeln!(
                out,
                "{} files match '{pattern}'; narrow the pattern to one of:",
                candidates.len()
            );
            for node in candidates {
                let _ = writeln!(out, "  {}", node.file_path);
            }
        }
    }
    out
}

pub fn search(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("{NO_MATCHES}\n");
    }
    let mut out = String::new();
    let _ = writeln!(out, "Nodes matching '{query}':\n");
    for hit in hits {
        let file_name = hit.file_path.rsplit('/').next().unwrap_or(&hit.file_path);
        let _ = writeln!(
            out,
            "  [{}] {} \t {}:{}",
            hit.kind, hit.name, file_name, hit.start_line
        );
    }
    out
}

pub fn build_summary(stats: &BuildStats, db_path: &Path) -> String {
    format!(
        "Graph built: {} of {} files indexed ({} unsupported, {} skipped, {} failed); \
         {} nodes, {} edges. DB: {}\n",
        stats.indexed,
        stats.scanned,
        stats.unsupported,
        stats.skipped,
        stats.failed,
        stats.nodes_total,
        stats.edges_total,
        db_path.display()
    )
}
