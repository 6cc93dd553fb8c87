pub mod cache;
pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod graph;
pub mod model;
pub mod repository;
pub mod resolve;
pub mod runs;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{RelgraphError, Result};
pub use graph::{GraphTraversalEngine, TraversalConfig};
pub use service::TraceService;
