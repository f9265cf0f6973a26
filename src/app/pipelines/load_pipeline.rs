use crate::core::parser::parse_row;
use crate::core::sink::SinkWriter;
use crate::core::{
    ConfigProvider, DiagnosticSink, Pipeline, RawRecord, Storage, TableSink, TransformResult,
};
use crate::domain::model::TRANSACTION_COLUMNS;
use crate::utils::error::{EtlError, Result};
use std::sync::Arc;

/// Reads a transactions CSV, parses every line and appends the survivors to a table.
pub struct TransactionLoadPipeline<S: Storage, T: TableSink, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) sink: T,
    pub(crate) config: C,
    pub(crate) diagnostics: Arc<dyn DiagnosticSink>,
}

impl<S: Storage, T: TableSink, C: ConfigProvider> TransactionLoadPipeline<S, T, C> {
    pub fn new(storage: S, sink: T, config: C, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            storage,
            sink,
            config,
            diagnostics,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, T: TableSink, C: ConfigProvider> Pipeline for TransactionLoadPipeline<S, T, C> {
    async fn extract(&self) -> Result<Vec<RawRecord>> {
        let input = self.config.input_path();
        tracing::debug!("Reading input file: {}", input);

        let bytes = self.storage.read_file(input).await?;
        let text = String::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
            message: format!("{} is not valid UTF-8: {}", input, e),
        })?;

        // A file-level BOM marks the encoding, not the first field.
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let mut lines = text.lines().enumerate().map(|(i, line)| RawRecord::new(i + 1, line));

        if self.config.has_header() {
            if let Some(header) = lines.next() {
                let expected = TRANSACTION_COLUMNS.join(",");
                if header.text.trim() != expected {
                    tracing::warn!(
                        "Header '{}' differs from expected '{}', columns are read by position",
                        header.text,
                        expected
                    );
                }
            }
        }

        Ok(lines.collect())
    }

    async fn transform(&self, data: Vec<RawRecord>) -> Result<TransformResult> {
        let diagnostics = self.diagnostics.as_ref();
        let records = data
            .iter()
            .filter_map(|raw| parse_row(raw, diagnostics))
            .collect();

        Ok(TransformResult { records })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let destination = self.sink.destination();
        let written = SinkWriter::new(&self.sink, self.config.batch_size())
            .write_all(result.records)
            .await?;

        tracing::debug!("Appended {} rows to {}", written, destination);
        Ok(destination)
    }
}
