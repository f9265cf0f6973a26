pub mod etl;
pub mod generator;
pub mod parser;
pub mod sink;

pub use crate::domain::model::{RawRecord, TransactionRecord, TransformResult};
pub use crate::domain::ports::{ConfigProvider, DiagnosticSink, Pipeline, Storage, TableSink};
pub use crate::utils::error::Result;
