use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "archive-graph",
    version,
    about = "Code knowledge graph builder",
    after_help = r#"Examples:
  archive-graph build --path .
  archive-graph build --path . --fresh --exclude target
  archive-graph query --files
  archive-graph query --structure app.py --recursive
  archive-graph query --query Greeter --json
"#
)]
pub struct Args {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan a project tree and write its code graph.
    Build {
        /// Project root to index.
        #[arg(long)]
        path: PathBuf,
        /// Store location (default: <path>/Agent-Context/Archives/graph.db).
        #[arg(long)]
        db: Option<PathBuf>,
        /// Delete the existing store before building.
        #[arg(long)]
        fresh: bool,
        /// Extra directory names to skip, on top of the configured set.
        #[arg(long = "exclude", value_name = "DIR")]
        exclude: Vec<String>,
        /// Honour .gitignore files while scanning.
        #[arg(long)]
        respect_gitignore: bool,
        /// Print build statistics as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Query an existing code graph.
    Query(QueryArgs),
}

#[derive(clap::Args)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["files", "structure", "query"])
))]
pub struct QueryArgs {
    /// Project root whose graph is queried.
    #[arg(long, default_value = ".")]
    pub path: PathBuf,
    /// Store location (default: <path>/Agent-Context/Archives/graph.db).
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// List all indexed files.
    #[arg(long)]
    pub files: bool,
    /// Show the structure of the file matching PATTERN.
    #[arg(long, value_name = "PATTERN")]
    pub structure: Option<String>,
    /// With --structure, list nested entities too.
    #[arg(long, requires = "structure")]
    pub recursive: bool,
    /// Search node names containing TEXT.
    #[arg(long, value_name = "TEXT")]
    pub query: Option<String>,
    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,
}

pub enum QueryMode<'a> {
    Files,
    Structure { pattern: &'a str, recursive: bool },
    Search { text: &'a str },
}

impl QueryArgs {
    pub fn mode(&self) -> QueryMode<'_> {
        if let Some(pattern) = self.structure.as_deref() {
            QueryMode::Structure {
                pattern,
                recursive: self.recursive,
            }
        } else if let Some(text) = self.query.as_deref() {
            QueryMode::Search { text }
        } else {
            QueryMode::Files
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn query_modes_are_exclusive() {
        assert!(Args::try_parse_from(["archive-graph", "query", "--files", "--query", "x"]).is_err());
        assert!(Args::try_parse_from(["archive-graph", "query"]).is_err());
        assert!(Args::try_parse_from(["archive-graph", "query", "--recursive", "--files"]).is_err());

        let args = Args::try_parse_from([
            "archive-graph",
            "query",
            "--structure",
            "app.py",
            "--recursive",
        ])
        .unwrap();
        let Command::Query(query) = args.command else {
            panic!("expected query");
        };
        assert!(matches!(
            query.mode(),
            QueryMode::Structure {
                pattern: "app.py",
                recursive: true
            }
        ));
    }

    #[test]
    fn build_requires_path() {
        assert!(Args::try_parse_from(["archive-graph", "build"]).is_err());
        let args = Args::try_parse_from([
            "archive-graph",
            "build",
            "--path",
            "repo",
            "--exclude",
            "target",
            "--exclude",
            "dist",
        ])
        .unwrap();
        let Command::Build { exclude, fresh, .. } = args.command else {
            panic!("expected build");
        };
        assert_eq!(exclude, vec!["target", "dist"]);
        assert!(!fresh);
    }
}
