pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, ConfiguredSink, ExecutionOptions, SinkKind, SinkSettings};

pub use adapters::{BigQuerySink, LocalTableSink, MemoryDiagnostics, TracingDiagnostics};
pub use crate::core::parser::{parse_row, parse_transaction};
pub use app::pipelines::load_pipeline::TransactionLoadPipeline;
pub use crate::core::etl::EtlEngine;
pub use domain::model::{ParseError, TableSchema, TransactionRecord};
pub use utils::error::{EtlError, Result};
