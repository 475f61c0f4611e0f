use anyhow::{Context, Result};
use archive_graph::config::{self, Config};
use archive_graph::indexer::{BuildOptions, Indexer, scan::ScanOptions};
use archive_graph::query::{Depth, QueryEngine};
use archive_graph::{cli, logging, render};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use serde_json::json;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    logging::init(args.verbose);
    let config = Config::get();

    match args.command {
        cli::Command::Build {
            path,
            db,
            fresh,
            exclude,
            respect_gitignore,
            json,
        } => {
            if !path.is_dir() {
                cli::Args::command()
                    .error(
                        ErrorKind::ValueValidation,
                        format!("--path {} is not a directory", path.display()),
                    )
                    .exit();
            }
            let db_path = db.unwrap_or_else(|| config::default_db_path(&path));
            let mut exclude_dirs = config.exclude_dirs.clone();
            exclude_dirs.extend(exclude);
            let options = BuildOptions {
                scan: ScanOptions::new(exclude_dirs).respect_gitignore(respect_gitignore),
                progress_every: config.progress_every,
                fresh,
            };
            let mut indexer = Indexer::new_with_options(path, db_path.clone(), options)
                .with_context(|| format!("open graph store {}", db_path.display()))?;
            let stats = indexer.build()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", render::build_summary(&stats, &db_path));
            }
            Ok(())
        }
        cli::Command::Query(query) => {
            let db_path = query
                .db
                .clone()
                .unwrap_or_else(|| config::default_db_path(&query.path));
            let Some(engine) = QueryEngine::open(&db_path)
                .with_context(|| format!("open graph store {}", db_path.display()))?
            else {
                if query.json {
                    let value = json!({ "status": "no_store", "message": render::NO_STORE });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                } else {
                    println!("{}", render::NO_STORE);
                }
                return Ok(());
            };

            match query.mode() {
                cli::QueryMode::Files => {
                    let files = engine.list_files()?;
                    if query.json {
                        println!("{}", serde_json::to_string_pretty(&files)?);
                    } else {
                        print!("{}", render::files(&files));
                    }
                }
                cli::QueryMode::Structure { pattern, recursive } => {
                    let depth = if recursive {
                        Depth::Recursive
                    } else {
                        Depth::Shallow
                    };
                    let outcome = engine.structure(pattern, depth)?;
                    if query.json {
                        println!("{}", serde_json::to_string_pretty(&outcome)?);
                    } else {
                        print!("{}", render::structure(&outcome));
                    }
                }
                cli::QueryMode::Search { text } => {
                    let hits = engine.search(text)?;
                    if query.json {
                        println!("{}", serde_json::to_string_pretty(&hits)?);
                    } else {
                        print!("{}", render::search(text, &hits));
                    }
                }
            }
            Ok(())
        }
    }
}
