use crate::domain::model::TRANSACTION_COLUMNS;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_range, Validate};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::io::Write;

pub const DEFAULT_MERCHANTS: [&str; 5] = ["Amazon", "Walmart", "Best Buy", "Target", "Ebay"];
pub const DEFAULT_RECORDS: usize = 1000;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub records: usize,
    /// Probability of a row being flagged as fraud.
    pub fraud_ratio: f64,
    pub merchants: Vec<String>,
    /// Timestamps fall between January 1st of this moment's year and this moment.
    pub window_end: NaiveDateTime,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            records: DEFAULT_RECORDS,
            fraud_ratio: 0.5,
            merchants: DEFAULT_MERCHANTS.iter().map(|m| m.to_string()).collect(),
            window_end: chrono::Local::now().naive_local(),
            seed: None,
        }
    }
}

impl Validate for GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.fraud_ratio.is_nan() {
            return Err(EtlError::ConfigValidationError {
                field: "fraud_ratio".to_string(),
                message: "must be a number".to_string(),
            });
        }
        validate_range("fraud_ratio", self.fraud_ratio, 0.0, 1.0)?;
        if self.merchants.is_empty() {
            return Err(EtlError::ConfigValidationError {
                field: "merchants".to_string(),
                message: "at least one merchant is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Produces synthetic transaction rows in the input CSV layout.
pub struct TransactionGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    window_start: NaiveDateTime,
}

impl TransactionGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let window_start = NaiveDate::from_ymd_opt(config.window_end.year(), 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| EtlError::ConfigError {
                message: format!("cannot derive start of year from {}", config.window_end),
            })?;

        Ok(Self {
            config,
            rng,
            window_start,
        })
    }

    /// One row as six text fields, in column order.
    pub fn next_row(&mut self) -> [String; 6] {
        let id = uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid();
        let amount: f64 = self.rng.gen_range(1.0..1000.0);
        let merchant = self
            .config
            .merchants
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default();
        let is_fraud = self.rng.gen_bool(self.config.fraud_ratio);

        [
            id.to_string(),
            self.card_number(),
            self.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.2}", amount),
            merchant,
            if is_fraud { "True" } else { "False" }.to_string(),
        ]
    }

    /// Writes the header and `records` rows as CSV.
    pub fn write_csv<W: Write>(&mut self, writer: W) -> Result<usize> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(TRANSACTION_COLUMNS)?;

        for _ in 0..self.config.records {
            let row = self.next_row();
            csv_writer.write_record(&row)?;
        }

        csv_writer.flush()?;
        Ok(self.config.records)
    }

    /// 16 digits, Visa-style `4` prefix, valid Luhn check digit.
    fn card_number(&mut self) -> String {
        let mut digits: Vec<u32> = Vec::with_capacity(16);
        digits.push(4);
        for _ in 0..14 {
            digits.push(self.rng.gen_range(0..10));
        }
        digits.push(luhn_check_digit(&digits));

        digits
            .iter()
            .filter_map(|d| char::from_digit(*d, 10))
            .collect()
    }

    fn timestamp(&mut self) -> NaiveDateTime {
        let span = (self.config.window_end - self.window_start).num_seconds();
        if span <= 0 {
            return self.window_start;
        }
        self.window_start + Duration::seconds(self.rng.gen_range(0..=span))
    }
}

fn luhn_check_digit(payload: &[u32]) -> u32 {
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    (10 - sum % 10) % 10
}
