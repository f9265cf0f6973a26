use crate::domain::model::{
    DiagnosticEvent, RawRecord, TableSchema, TransactionRecord, TransformResult,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn append_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_table(&self) -> &str;
    fn batch_size(&self) -> usize;
    fn has_header(&self) -> bool;
}

/// Receives rows the parser dropped. Must not influence control flow.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
}

/// An append-only tabular destination.
///
/// Implementations give no retry, idempotency or exactly-once guarantee; a
/// failed `append` leaves earlier batches in place.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Human readable destination, used in logs and errors.
    fn destination(&self) -> String;

    /// Creates the table with `schema` if it does not exist. An existing
    /// table is never altered.
    async fn ensure_table(&self, schema: &TableSchema) -> Result<()>;

    async fn append(&self, rows: &[TransactionRecord]) -> Result<()>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<RawRecord>>;
    async fn transform(&self, data: Vec<RawRecord>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
