// Adapters layer: concrete sinks and diagnostics behind the domain ports.

pub mod bigquery;
pub mod diagnostics;
pub mod local_table;

pub use bigquery::{BigQueryConfig, BigQuerySink};
pub use diagnostics::{MemoryDiagnostics, TracingDiagnostics};
pub use local_table::LocalTableSink;
