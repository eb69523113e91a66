//! Collector Record Acquisition
//!
//! Reads the JSON-lines files written by the external forecast and
//! operations collectors and turns each line into a typed record.
//! Malformed or invalid lines are collected as rejects and logged; only
//! an I/O failure on the underlying reader aborts a read.
//!
//! ```text
//! forecasts.jsonl  ──► read_forecasts()  ──► RecordBatch<FeatureSnapshot>
//! operations.jsonl ──► read_operations() ──► RecordBatch<ActualOperation>
//! ```

mod forecast;
mod operations;

pub use forecast::{read_forecasts, ForecastRecord};
pub use operations::{read_operations, OperationRecord};

use std::io::BufRead;

use thiserror::Error;

/// Why a collector line was rejected.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("line {line}: malformed JSON: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {field} {reason}")]
    Invalid {
        line: usize,
        field: &'static str,
        reason: String,
    },

    #[error("failed to read collector input: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordError {
    pub(crate) fn invalid(line: usize, field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            line,
            field,
            reason: reason.into(),
        }
    }
}

/// Records accepted from one collector file plus the lines that were not.
#[derive(Debug)]
pub struct RecordBatch<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RecordError>,
}

impl<T> Default for RecordBatch<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> RecordBatch<T> {
    pub fn accepted(&self) -> usize {
        self.records.len()
    }
}

/// Drive `parse` over every non-blank line of `reader`. Line numbers are
/// 1-based.
fn read_lines<R, T, F>(reader: R, kind: &str, mut parse: F) -> Result<RecordBatch<T>, RecordError>
where
    R: BufRead,
    F: FnMut(usize, &str) -> Result<T, RecordError>,
{
    let mut batch = RecordBatch::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse(idx + 1, trimmed) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                tracing::warn!(kind, error = %e, "Rejected collector record");
                batch.rejected.push(e);
            }
        }
    }

    tracing::debug!(
        kind,
        accepted = batch.records.len(),
        rejected = batch.rejected.len(),
        "Collector file read"
    );
    Ok(batch)
}

fn require_non_empty(line: usize, field: &'static str, value: &str) -> Result<String, RecordError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(RecordError::invalid(line, field, "must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_lines_skips_blank_and_counts_rejects() {
        let input = "1\n\n  \nx\n3\n";
        let batch = read_lines(input.as_bytes(), "numbers", |line, raw| {
            raw.parse::<u32>()
                .map_err(|e| RecordError::invalid(line, "value", e.to_string()))
        })
        .unwrap();

        assert_eq!(batch.records, vec![1, 3]);
        assert_eq!(batch.rejected.len(), 1);
        assert!(matches!(batch.rejected[0], RecordError::Invalid { line: 4, .. }));
    }
}
