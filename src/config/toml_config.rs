use crate::config::{validate_job_input, ExecutionOptions, SinkSettings};
use crate::core::sink::DEFAULT_BATCH_SIZE;
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub job: JobConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub sink: SinkSettings,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub execution: ExecutionOptions,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub input_path: String,
    pub has_header: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadConfig {
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GOOGLE_OAUTH_ACCESS_TOKEN})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        &self.source.input_path
    }

    fn output_table(&self) -> &str {
        &self.sink.output_table
    }

    fn batch_size(&self) -> usize {
        self.load.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    fn has_header(&self) -> bool {
        self.source.has_header.unwrap_or(true)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        crate::utils::validation::validate_non_empty_string("job.name", &self.job.name)?;
        validate_job_input(&self.source.input_path, self.batch_size())?;
        self.execution.validate()?;
        self.sink.validate_with(&self.execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let toml_content = r#"
[job]
name = "load-transactions"

[source]
input_path = "transactions.csv"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.job.name, "load-transactions");
        assert_eq!(config.sink.kind, SinkKind::Local);
        assert_eq!(config.output_table(), "fraud_detection.transactions");
        assert_eq!(config.batch_size(), DEFAULT_BATCH_SIZE);
        assert!(config.has_header());
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_bigquery_config() {
        let toml_content = r#"
[job]
name = "load-transactions"
description = "Daily load"

[source]
input_path = "data/transactions.csv"
has_header = false

[sink]
type = "bigquery"
table = "fraud_detection.transactions"
api_base = "http://localhost:9050/bigquery/v2"

[load]
batch_size = 250

[execution]
project = "demo-project"
region = "us-central1"
job_name = "daily-load"

[monitoring]
enabled = true
json_logs = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.sink.kind, SinkKind::Bigquery);
        assert_eq!(config.batch_size(), 250);
        assert!(!config.has_header());
        assert_eq!(config.execution.runner, "DirectRunner");
        assert_eq!(config.execution.job_name, "daily-load");
        assert!(config.monitoring_enabled());
        assert!(config.json_logs());
        assert!(config.validate().is_ok());
        assert_eq!(
            config
                .sink
                .table_reference(&config.execution)
                .unwrap()
                .to_string(),
            "demo-project:fraud_detection.transactions"
        );
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("FRAUD_ETL_TEST_TOKEN", "secret-token");

        let toml_content = r#"
[job]
name = "test"

[source]
input_path = "transactions.csv"

[sink]
type = "bigquery"
table = "demo:fraud.transactions"
access_token = "${FRAUD_ETL_TEST_TOKEN}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.sink.access_token.as_deref(), Some("secret-token"));

        std::env::remove_var("FRAUD_ETL_TEST_TOKEN");
    }

    #[test]
    fn test_unset_env_var_is_left_in_place() {
        let toml_content = r#"
[job]
name = "test"

[source]
input_path = "${FRAUD_ETL_SURELY_UNSET_VAR}.csv"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.input_path(), "${FRAUD_ETL_SURELY_UNSET_VAR}.csv");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[job]
name = "test"

[source]
input_path = "transactions.csv"

[sink]
type = "bigquery"
table = "fraud.transactions"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(EtlError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[job]
name = "file-test"

[source]
input_path = "transactions.csv"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.job.name, "file-test");
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = TomlConfig::from_toml_str("[job\nname = 1").unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }
}
