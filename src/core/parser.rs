use crate::domain::model::{DiagnosticEvent, ParseError, RawRecord, TransactionRecord, TRANSACTION_COLUMNS};
use crate::domain::ports::DiagnosticSink;
use csv::{ReaderBuilder, StringRecord};

const BOM: char = '\u{feff}';

/// Splits one CSV line and converts it into a typed record.
///
/// Quoting follows the `csv` crate defaults (double quotes, doubled quotes as
/// escapes) and fields are not trimmed. The line must hold exactly six
/// fields. `amount` may carry surrounding whitespace but nothing else: no
/// currency symbols, no thousands separators, no `NaN`/`inf`. `is_fraud` is
/// `true` only when it equals `"true"` ignoring ASCII case; any other token,
/// malformed ones included, is `false`.
pub fn parse_transaction(raw: &str) -> Result<TransactionRecord, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let mut fields = StringRecord::new();
    let has_record = reader
        .read_record(&mut fields)
        .map_err(|e| ParseError::Malformed(e.to_string()))?;
    let found = if has_record { fields.len() } else { 0 };

    if found != TRANSACTION_COLUMNS.len() {
        return Err(ParseError::FieldCount {
            expected: TRANSACTION_COLUMNS.len(),
            found,
        });
    }

    let amount = parse_amount(&fields[3])?;

    // The csv reader drops a leading BOM as an encoding marker; inside a
    // single line it belongs to the first field.
    let mut transaction_id = fields[0].to_string();
    if raw.starts_with(BOM) && !transaction_id.starts_with(BOM) {
        transaction_id.insert(0, BOM);
    }

    Ok(TransactionRecord::from_parts(
        transaction_id,
        fields[1].to_string(),
        fields[2].to_string(),
        amount,
        fields[4].to_string(),
        fields[5].eq_ignore_ascii_case("true"),
    ))
}

fn parse_amount(value: &str) -> Result<f64, ParseError> {
    let amount: f64 = value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| ParseError::InvalidAmount {
            value: value.to_string(),
            reason: e.to_string(),
        })?;

    if !amount.is_finite() {
        return Err(ParseError::InvalidAmount {
            value: value.to_string(),
            reason: "not a finite number".to_string(),
        });
    }

    Ok(amount)
}

/// Parses `raw`, reporting a failure to `diagnostics` and yielding nothing.
///
/// At most one record comes out per line and exactly one event is recorded
/// per dropped line.
pub fn parse_row(raw: &RawRecord, diagnostics: &dyn DiagnosticSink) -> Option<TransactionRecord> {
    match parse_transaction(&raw.text) {
        Ok(record) => Some(record),
        Err(cause) => {
            diagnostics.record(DiagnosticEvent {
                line_number: raw.line_number,
                raw: raw.text.clone(),
                cause,
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::diagnostics::MemoryDiagnostics;

    #[test]
    fn test_parses_well_formed_line() {
        let record =
            parse_transaction("a1,4111-1111-1111-1111,2024-01-01T10:00:00,123.45,Amazon,True")
                .unwrap();

        assert_eq!(record.transaction_id(), "a1");
        assert_eq!(record.card_number(), "4111-1111-1111-1111");
        assert_eq!(record.transaction_date(), "2024-01-01T10:00:00");
        assert_eq!(record.amount(), 123.45);
        assert_eq!(record.merchant(), "Amazon");
        assert!(record.is_fraud());
    }

    #[test]
    fn test_non_numeric_amount_is_dropped_and_logged() {
        let diagnostics = MemoryDiagnostics::new();
        let raw = RawRecord::new(3, "a2,1234,2024-01-02,notanumber,Ebay,false");

        assert!(parse_row(&raw, &diagnostics).is_none());

        let events = diagnostics.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_number, 3);
        assert_eq!(events[0].raw, raw.text);
        assert!(matches!(
            &events[0].cause,
            ParseError::InvalidAmount { value, .. } if value == "notanumber"
        ));
    }

    #[test]
    fn test_short_line_is_dropped_and_logged() {
        let diagnostics = MemoryDiagnostics::new();
        let raw = RawRecord::new(4, "a3,5555,2024-01-03,50,Best Buy");

        assert!(parse_row(&raw, &diagnostics).is_none());

        let events = diagnostics.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].raw, "a3,5555,2024-01-03,50,Best Buy");
        assert_eq!(
            events[0].cause,
            ParseError::FieldCount {
                expected: 6,
                found: 5
            }
        );
    }

    #[test]
    fn test_extra_fields_are_rejected() {
        let err = parse_transaction("a4,1,2024-01-04,5,Target,false,extra").unwrap_err();
        assert_eq!(
            err,
            ParseError::FieldCount {
                expected: 6,
                found: 7
            }
        );
    }

    #[test]
    fn test_empty_line_has_no_fields() {
        let err = parse_transaction("").unwrap_err();
        assert_eq!(
            err,
            ParseError::FieldCount {
                expected: 6,
                found: 0
            }
        );
    }

    #[test]
    fn test_quoted_field_keeps_embedded_delimiter() {
        let record =
            parse_transaction(r#"a5,4000,2024-01-05,19.99,"Smith, Jones & ""Co""",false"#).unwrap();
        assert_eq!(record.merchant(), r#"Smith, Jones & "Co""#);
        assert_eq!(record.amount(), 19.99);
        assert!(!record.is_fraud());
    }

    #[test]
    fn test_quoted_amount_is_still_converted() {
        let record = parse_transaction(r#"a6,4000,2024-01-06,"42.5",Walmart,TRUE"#).unwrap();
        assert_eq!(record.amount(), 42.5);
        assert!(record.is_fraud());
    }

    #[test]
    fn test_amount_formatting_is_not_coerced() {
        for amount in ["$12.00", "\"1,234.50\"", "12.5 USD", "NaN", "inf", ""] {
            let line = format!("a7,4000,2024-01-07,{},Amazon,false", amount);
            let err = parse_transaction(&line).unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidAmount { .. }),
                "{} should be rejected, got {:?}",
                amount,
                err
            );
        }
    }

    #[test]
    fn test_amount_whitespace_and_exponent_are_accepted() {
        let record = parse_transaction("a8,4000,2024-01-08, 1e3 ,Amazon,false").unwrap();
        assert_eq!(record.amount(), 1000.0);
    }

    #[test]
    fn test_boolean_coercion_is_case_insensitive_and_lax() {
        let cases = [
            ("true", true),
            ("True", true),
            ("TRUE", true),
            ("tRuE", true),
            ("false", false),
            ("1", false),
            ("yes", false),
            ("", false),
            ("TRU", false),
            ("2", false),
            (" true", false),
        ];

        for (token, expected) in cases {
            let line = format!("a9,4000,2024-01-09,1.0,Amazon,{}", token);
            let record = parse_transaction(&line).unwrap();
            assert_eq!(record.is_fraud(), expected, "token {:?}", token);
        }
    }

    #[test]
    fn test_rendering_restores_text_fields() {
        let line = "id-10,5500000000000004,2024-02-29 23:59:59,250.5,Best Buy,False";
        let record = parse_transaction(line).unwrap();
        let fields = record.to_fields();
        let original: Vec<&str> = line.split(',').collect();

        for slot in [0, 1, 2, 4] {
            assert_eq!(fields[slot], original[slot]);
        }
        assert_eq!(fields[3].parse::<f64>().unwrap(), 250.5);
        assert_eq!(fields[5], "false");

        let reparsed = parse_transaction(&fields.join(",")).unwrap();
        assert_eq!(reparsed, record);
    }

    #[test]
    fn test_leading_bom_stays_in_transaction_id() {
        let line = "\u{feff}id,1,d,1e21,\"M, Inc\",TRUE";
        let record = parse_transaction(line).unwrap();

        assert_eq!(record.transaction_id(), "\u{feff}id");
        assert_eq!(record.merchant(), "M, Inc");
        assert_eq!(record.amount(), 1e21);
        assert!(record.is_fraud());

        let fields = record.to_fields();
        let rendered = format!(
            "{},{},{},{},\"{}\",{}",
            fields[0], fields[1], fields[2], fields[3], fields[4], fields[5]
        );
        let reparsed = parse_transaction(&rendered).unwrap();
        assert_eq!(reparsed.transaction_id(), record.transaction_id());
    }

    #[test]
    fn test_valid_row_records_no_diagnostics() {
        let diagnostics = MemoryDiagnostics::new();
        let raw = RawRecord::new(2, "a1,1,2024-01-01,1,Amazon,false");
        assert!(parse_row(&raw, &diagnostics).is_some());
        assert!(diagnostics.events().is_empty());
    }
}
