use crate::domain::model::{TableReference, TableSchema, TransactionRecord};
use crate::domain::ports::{Storage, TableSink};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;

/// A table kept as files under a [`Storage`]:
/// `[<project>/]<dataset>/<table>/schema.json` plus an append-only `rows.jsonl`.
pub struct LocalTableSink<S: Storage> {
    storage: S,
    table: TableReference,
}

impl<S: Storage> LocalTableSink<S> {
    pub fn new(storage: S, table: TableReference) -> Self {
        Self { storage, table }
    }

    fn table_dir(&self) -> String {
        match &self.table.project {
            Some(project) => format!("{}/{}/{}", project, self.table.dataset, self.table.table),
            None => format!("{}/{}", self.table.dataset, self.table.table),
        }
    }

    pub fn schema_path(&self) -> String {
        format!("{}/schema.json", self.table_dir())
    }

    pub fn rows_path(&self) -> String {
        format!("{}/rows.jsonl", self.table_dir())
    }
}

#[async_trait]
impl<S: Storage> TableSink for LocalTableSink<S> {
    fn destination(&self) -> String {
        self.table.to_string()
    }

    async fn ensure_table(&self, schema: &TableSchema) -> Result<()> {
        let schema_path = self.schema_path();

        if self.storage.exists(&schema_path).await? {
            let existing: TableSchema =
                serde_json::from_slice(&self.storage.read_file(&schema_path).await?)?;

            if &existing != schema {
                return Err(EtlError::sink(
                    self.destination(),
                    "existing table schema does not match the transactions schema",
                ));
            }

            tracing::debug!("Table {} already exists", self.destination());
            return Ok(());
        }

        tracing::info!("🆕 Creating table {}", self.destination());
        let body = serde_json::to_vec_pretty(schema)?;
        self.storage.write_file(&schema_path, &body).await?;
        Ok(())
    }

    async fn append(&self, rows: &[TransactionRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buffer, row)?;
            buffer.push(b'\n');
        }

        self.storage.append_file(&self.rows_path(), &buffer).await?;
        tracing::debug!("Appended {} rows to {}", rows.len(), self.destination());
        Ok(())
    }
}
