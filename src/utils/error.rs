use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Sink error ({destination}): {message}")]
    SinkError {
        destination: String,
        message: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Storage,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn sink(destination: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::SinkError {
            destination: destination.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::IoError(_) | EtlError::SinkError { .. } => ErrorCategory::Storage,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ApiError(_) => {
                "Check network connectivity and that the access token is still valid"
            }
            EtlError::SinkError { .. } => {
                "Check that the destination exists or can be created, and that the credentials allow writes. Rows appended before the failure are kept"
            }
            EtlError::IoError(_) => "Check that the input file exists and the output path is writable",
            EtlError::CsvError(_) | EtlError::SerializationError(_) => {
                "Check that the input is UTF-8 CSV with the expected six columns"
            }
            EtlError::ProcessingError { .. } => "Re-run with --verbose to see which step failed",
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Fix the configuration value and run again (see --help)"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Network => format!("Could not reach the destination service: {}", self),
            ErrorCategory::Storage => format!("Writing or reading data failed: {}", self),
            ErrorCategory::Data => format!("Input data could not be processed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
