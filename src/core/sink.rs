use crate::domain::model::{TableSchema, TransactionRecord};
use crate::domain::ports::TableSink;
use crate::utils::error::Result;

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Drives a [`TableSink`]: creates the table if needed, then appends rows in
/// fixed-size batches as they are pulled from the input.
///
/// The first failing batch aborts the write; batches already appended stay.
pub struct SinkWriter<'a, T: TableSink + ?Sized> {
    sink: &'a T,
    schema: TableSchema,
    batch_size: usize,
}

impl<'a, T: TableSink + ?Sized> SinkWriter<'a, T> {
    pub fn new(sink: &'a T, batch_size: usize) -> Self {
        Self {
            sink,
            schema: TableSchema::transactions(),
            batch_size: batch_size.max(1),
        }
    }

    /// Returns the number of rows appended.
    pub async fn write_all<I>(&self, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = TransactionRecord>,
    {
        self.sink.ensure_table(&self.schema).await?;

        let mut written = 0;
        let mut batch = Vec::with_capacity(self.batch_size);

        for row in rows {
            batch.push(row);
            if batch.len() == self.batch_size {
                written += self.flush(&mut batch).await?;
            }
        }

        if !batch.is_empty() {
            written += self.flush(&mut batch).await?;
        }

        Ok(written)
    }

    async fn flush(&self, batch: &mut Vec<TransactionRecord>) -> Result<usize> {
        let count = batch.len();
        tracing::debug!("Submitting batch of {} rows to {}", count, self.sink.destination());
        self.sink.append(batch.as_slice()).await?;
        batch.clear();
        Ok(count)
    }
}
