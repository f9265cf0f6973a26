use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_table_identifier;

/// Column names of the transactions CSV, in positional order.
pub const TRANSACTION_COLUMNS: [&str; 6] = [
    "transaction_id",
    "card_number",
    "transaction_date",
    "amount",
    "merchant",
    "is_fraud",
];

/// One line of the input file, before any splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number in the source file.
    pub line_number: usize,
    pub text: String,
}

impl RawRecord {
    pub fn new(line_number: usize, text: impl Into<String>) -> Self {
        Self {
            line_number,
            text: text.into(),
        }
    }
}

/// A validated transaction row.
///
/// Only `core::parser` can build one, so every value that reaches a sink has
/// all six fields populated with the right types.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    transaction_id: String,
    card_number: String,
    transaction_date: String,
    amount: f64,
    merchant: String,
    is_fraud: bool,
}

impl TransactionRecord {
    pub(crate) fn from_parts(
        transaction_id: String,
        card_number: String,
        transaction_date: String,
        amount: f64,
        merchant: String,
        is_fraud: bool,
    ) -> Self {
        Self {
            transaction_id,
            card_number,
            transaction_date,
            amount,
            merchant,
            is_fraud,
        }
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn card_number(&self) -> &str {
        &self.card_number
    }

    pub fn transaction_date(&self) -> &str {
        &self.transaction_date
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn merchant(&self) -> &str {
        &self.merchant
    }

    pub fn is_fraud(&self) -> bool {
        self.is_fraud
    }

    /// Renders the record back into its six positional text slots.
    pub fn to_fields(&self) -> [String; 6] {
        [
            self.transaction_id.clone(),
            self.card_number.clone(),
            self.transaction_date.clone(),
            self.amount.to_string(),
            self.merchant.clone(),
            self.is_fraud.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    String,
    Float,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub mode: String,
}

impl ColumnSpec {
    fn nullable(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            mode: "NULLABLE".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<ColumnSpec>,
}

impl TableSchema {
    /// The fixed six-column layout every destination table uses.
    pub fn transactions() -> Self {
        let types = [
            ColumnType::String,
            ColumnType::String,
            ColumnType::String,
            ColumnType::Float,
            ColumnType::String,
            ColumnType::Boolean,
        ];

        Self {
            fields: TRANSACTION_COLUMNS
                .iter()
                .zip(types)
                .map(|(name, column_type)| ColumnSpec::nullable(name, column_type))
                .collect(),
        }
    }
}

/// `project:dataset.table`, or `dataset.table` with the project left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    pub project: Option<String>,
    pub dataset: String,
    pub table: String,
}

impl TableReference {
    pub fn with_default_project(mut self, project: Option<&str>) -> Self {
        if self.project.is_none() {
            self.project = project.map(str::to_string);
        }
        self
    }
}

impl FromStr for TableReference {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        let (project, rest) = match s.split_once(':') {
            Some((project, rest)) => (Some(project.to_string()), rest),
            None => (None, s),
        };

        let (dataset, table) = rest.split_once('.').ok_or_else(|| {
            EtlError::InvalidConfigValueError {
                field: "output_table".to_string(),
                value: s.to_string(),
                reason: "Expected [PROJECT:]DATASET.TABLE".to_string(),
            }
        })?;

        if let Some(project) = &project {
            crate::utils::validation::validate_non_empty_string("output_table.project", project)?;
        }
        validate_table_identifier("output_table.dataset", dataset)?;
        validate_table_identifier("output_table.table", table)?;

        Ok(Self {
            project,
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{}:{}.{}", project, self.dataset, self.table),
            None => write!(f, "{}.{}", self.dataset, self.table),
        }
    }
}

/// Why a raw line could not become a [`TransactionRecord`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("amount '{value}' is not a number: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("malformed delimited text: {0}")]
    Malformed(String),
}

/// A dropped row, as handed to a diagnostic sink.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticEvent {
    pub line_number: usize,
    pub raw: String,
    pub cause: ParseError,
}

#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    pub records: Vec<TransactionRecord>,
}
