pub mod cli;
pub mod config;
pub mod db;
pub mod indexer;
pub mod logging;
pub mod model;
pub mod query;
pub mod render;
pub mod util;
