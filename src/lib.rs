//! ECOTOX harvester library
//!
//! Configuration, result logs, and the batch runner behind the `ecotox`
//! binary. The query protocol itself lives in `ecotox-query`.

pub mod batch;
pub mod config;
pub mod output;

pub use batch::{BatchRunner, BatchSummary};
pub use config::{load_config, HarvestConfig, LoadedConfig};
pub use output::ResultLogs;
