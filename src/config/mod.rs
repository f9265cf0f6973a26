pub mod cli;
pub mod toml_config;

use crate::adapters::{BigQueryConfig, BigQuerySink, LocalTableSink};
use crate::core::sink::DEFAULT_BATCH_SIZE;
use crate::core::{ConfigProvider, TableSink, TransactionRecord};
use crate::domain::model::{TableReference, TableSchema};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_file_extension, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use async_trait::async_trait;
use cli::LocalStorage;
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_OUTPUT_TABLE: &str = "fraud_detection.transactions";
pub const DIRECT_RUNNER: &str = "DirectRunner";
const MAX_BATCH_SIZE: usize = 10_000;

fn default_output_table() -> String {
    DEFAULT_OUTPUT_TABLE.to_string()
}

fn default_output_path() -> String {
    "./output".to_string()
}

fn default_runner() -> String {
    DIRECT_RUNNER.to_string()
}

fn default_job_name() -> String {
    "fraud-etl".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Files under --output-path
    #[default]
    Local,
    /// BigQuery REST API
    Bigquery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct SinkSettings {
    #[cfg_attr(feature = "cli", arg(long = "sink", value_enum, default_value_t = SinkKind::Local))]
    #[serde(rename = "type", default)]
    pub kind: SinkKind,

    /// Destination as [PROJECT:]DATASET.TABLE
    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_OUTPUT_TABLE))]
    #[serde(rename = "table", default = "default_output_table")]
    pub output_table: String,

    /// Root directory of the local sink
    #[cfg_attr(feature = "cli", arg(long, default_value = "./output"))]
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// BigQuery API base URL
    #[cfg_attr(feature = "cli", arg(long))]
    pub api_base: Option<String>,

    /// OAuth bearer token; falls back to GOOGLE_OAUTH_ACCESS_TOKEN
    #[cfg_attr(feature = "cli", arg(long))]
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            kind: SinkKind::Local,
            output_table: default_output_table(),
            output_path: default_output_path(),
            api_base: None,
            access_token: None,
        }
    }
}

impl SinkSettings {
    pub fn table_reference(&self, execution: &ExecutionOptions) -> Result<TableReference> {
        let table: TableReference = self.output_table.parse()?;
        Ok(table.with_default_project(execution.project.as_deref()))
    }

    pub fn build(&self, execution: &ExecutionOptions) -> Result<ConfiguredSink> {
        let table = self.table_reference(execution)?;

        match self.kind {
            SinkKind::Local => Ok(ConfiguredSink::Local(LocalTableSink::new(
                LocalStorage::new(self.output_path.clone()),
                table,
            ))),
            SinkKind::Bigquery => {
                let config = BigQueryConfig::for_table(&table, self.api_base.as_deref())?
                    .with_access_token(self.access_token.clone());
                if config.access_token.is_none() {
                    tracing::warn!("No BigQuery access token configured, requests are sent unauthenticated");
                }
                Ok(ConfiguredSink::BigQuery(BigQuerySink::new(config)))
            }
        }
    }

    pub fn validate_with(&self, execution: &ExecutionOptions) -> Result<()> {
        let table = self.table_reference(execution)?;

        match self.kind {
            SinkKind::Local => validate_path("output_path", &self.output_path)?,
            SinkKind::Bigquery => {
                if table.project.is_none() {
                    return Err(EtlError::MissingConfigError {
                        field: "project (or PROJECT: prefix in output_table)".to_string(),
                    });
                }
                if let Some(api_base) = &self.api_base {
                    validate_url("api_base", api_base)?;
                }
            }
        }
        Ok(())
    }
}

/// Parameters of the batch harness. They label the run and pick the project;
/// the parser and sinks never read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ExecutionOptions {
    /// Project id, used when the output table has no PROJECT: prefix
    #[cfg_attr(feature = "cli", arg(long))]
    pub project: Option<String>,

    #[cfg_attr(feature = "cli", arg(long))]
    pub region: Option<String>,

    #[cfg_attr(feature = "cli", arg(long))]
    pub temp_location: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, default_value = DIRECT_RUNNER))]
    #[serde(default = "default_runner")]
    pub runner: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = "fraud-etl"))]
    #[serde(default = "default_job_name")]
    pub job_name: String,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            project: None,
            region: None,
            temp_location: None,
            runner: default_runner(),
            job_name: default_job_name(),
        }
    }
}

impl ExecutionOptions {
    /// Span carrying the job labels, entered around a run.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "job",
            job_name = %self.job_name,
            runner = %self.runner,
            project = self.project.as_deref().unwrap_or("-"),
            region = self.region.as_deref().unwrap_or("-"),
        )
    }
}

impl Validate for ExecutionOptions {
    fn validate(&self) -> Result<()> {
        crate::utils::validation::validate_non_empty_string("job_name", &self.job_name)?;

        if !self.runner.eq_ignore_ascii_case(DIRECT_RUNNER) && !self.runner.eq_ignore_ascii_case("direct") {
            return Err(EtlError::InvalidConfigValueError {
                field: "runner".to_string(),
                value: self.runner.clone(),
                reason: format!("only {} runs in this process", DIRECT_RUNNER),
            });
        }

        if let Some(temp_location) = &self.temp_location {
            validate_path("temp_location", temp_location)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_job_input(input: &str, batch_size: usize) -> Result<()> {
    validate_path("input", input)?;
    validate_file_extension("input", input, &["csv", "txt"])?;
    validate_positive_number("batch_size", batch_size, 1)?;
    validate_range("batch_size", batch_size, 1, MAX_BATCH_SIZE)?;
    Ok(())
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "fraud-etl")]
#[command(about = "Load a transactions CSV into an append-only table")]
pub struct CliConfig {
    /// Input CSV file
    #[arg(long)]
    pub input: String,

    /// The input has no header line
    #[arg(long)]
    pub no_header: bool,

    /// Rows per append request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[command(flatten)]
    pub sink: SinkSettings,

    #[command(flatten)]
    pub execution: ExecutionOptions,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        &self.input
    }

    fn output_table(&self) -> &str {
        &self.sink.output_table
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn has_header(&self) -> bool {
        !self.no_header
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_job_input(&self.input, self.batch_size)?;
        self.execution.validate()?;
        self.sink.validate_with(&self.execution)
    }
}

/// The sink picked at startup from [`SinkSettings`].
pub enum ConfiguredSink {
    Local(LocalTableSink<LocalStorage>),
    BigQuery(BigQuerySink),
}

#[async_trait]
impl TableSink for ConfiguredSink {
    fn destination(&self) -> String {
        match self {
            ConfiguredSink::Local(sink) => sink.destination(),
            ConfiguredSink::BigQuery(sink) => sink.destination(),
        }
    }

    async fn ensure_table(&self, schema: &TableSchema) -> Result<()> {
        match self {
            ConfiguredSink::Local(sink) => sink.ensure_table(schema).await,
            ConfiguredSink::BigQuery(sink) => sink.ensure_table(schema).await,
        }
    }

    async fn append(&self, rows: &[TransactionRecord]) -> Result<()> {
        match self {
            ConfiguredSink::Local(sink) => sink.append(rows).await,
            ConfiguredSink::BigQuery(sink) => sink.append(rows).await,
        }
    }
}
