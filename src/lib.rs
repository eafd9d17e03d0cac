pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
mod db;
pub mod descriptor;
pub mod mesh;
mod metrics;
pub mod queue;
pub mod search;
pub mod server;
pub mod storage;
pub mod utils;

pub use catalog::{Catalog, CatalogBuilder};
pub use config::Opts;
