//! Payroll parsing: file bytes → ordered instructions.
//!
//! CSV: `walletAddress,amount` per record, RFC 4180 quoting. Header optional
//! (any column order, extra columns ignored, every row as wide as the
//! header); blank lines and `#` comments skipped.
//! JSON: `[{walletAddress, amount}, ...]` or `{"instructions": [...]}`.
//!
//! Any bad entry fails the whole file, reported by 1-based line/entry.

use crate::core::{Amount, WalletAddress};
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollInstruction {
    pub wallet_address: WalletAddress,
    pub amount: Amount,
}

/// Parsed batch. Lives for one engine invocation.
#[derive(Debug, Clone)]
pub struct PayrollBatch {
    pub instructions: Vec<PayrollInstruction>,
    pub source_file_name: String,
    pub received_at: DateTime<Utc>,
}

pub trait PayrollParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<PayrollInstruction>, ValidationError>;
}

fn utf8(bytes: &[u8]) -> Result<&str, ValidationError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ValidationError::Format("payroll file is not UTF-8".into()))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

fn line_error(line: usize, e: ValidationError) -> ValidationError {
    ValidationError::Line { line, reason: e.to_string() }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvPayrollParser;

impl CsvPayrollParser {
    /// Column indices from a header row, if this row is one.
    fn header_columns(fields: &csv::StringRecord) -> Option<(usize, usize)> {
        let norm = |f: &str| f.to_ascii_lowercase().replace(['_', '-', ' '], "");
        let addr = fields.iter().position(|f| matches!(norm(f).as_str(), "walletaddress" | "address" | "wallet"))?;
        let amount = fields.iter().position(|f| norm(f) == "amount")?;
        Some((addr, amount))
    }
}

impl PayrollParser for CsvPayrollParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<PayrollInstruction>, ValidationError> {
        let text = utf8(bytes)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        // (address column, amount column, fields per row)
        let mut layout: Option<(usize, usize, usize)> = None;
        let mut out = Vec::new();

        for row in reader.records() {
            let row = row.map_err(|e| {
                let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                ValidationError::Line { line, reason: format!("malformed CSV: {e}") }
            })?;
            let line_no = row.position().map(|p| p.line() as usize).unwrap_or(0);
            if row.iter().all(str::is_empty) {
                continue;
            }
            let (a, m, width) = match layout {
                Some(l) => l,
                None => {
                    if let Some((a, m)) = Self::header_columns(&row) {
                        layout = Some((a, m, row.len()));
                        continue;
                    }
                    let l = (0, 1, 2);
                    layout = Some(l);
                    l
                }
            };
            if row.len() != width {
                return Err(ValidationError::Line { line: line_no, reason: format!("expected {width} columns, found {}", row.len()) });
            }
            let (Some(addr), Some(amount)) = (row.get(a), row.get(m)) else {
                return Err(ValidationError::Line { line: line_no, reason: "missing column".into() });
            };
            out.push(PayrollInstruction {
                wallet_address: WalletAddress::parse(addr).map_err(|e| line_error(line_no, e))?,
                amount: Amount::parse(amount).map_err(|e| line_error(line_no, e))?,
            });
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayrollParser;

impl PayrollParser for JsonPayrollParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<PayrollInstruction>, ValidationError> {
        let text = utf8(bytes)?;
        let doc: Value = serde_json::from_str(text).map_err(|e| ValidationError::Format(format!("invalid JSON: {e}")))?;
        let entries = match doc {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("instructions") {
                Some(Value::Array(items)) => items,
                _ => return Err(ValidationError::Format("expected an `instructions` array".into())),
            },
            _ => return Err(ValidationError::Format("expected an array of instructions".into())),
        };

        entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                serde_json::from_value::<PayrollInstruction>(entry)
                    .map_err(|e| ValidationError::Line { line: idx + 1, reason: e.to_string() })
            })
            .collect()
    }
}

/// Picks JSON or CSV from the first meaningful byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoPayrollParser;

impl PayrollParser for AutoPayrollParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<PayrollInstruction>, ValidationError> {
        let first = utf8(bytes)?.trim_start().chars().next();
        match first {
            Some('[') | Some('{') => JsonPayrollParser.parse(bytes),
            _ => CsvPayrollParser.parse(bytes),
        }
    }
}
