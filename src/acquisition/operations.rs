//! Operations collector records

use std::io::BufRead;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::{read_lines, require_non_empty, RecordBatch, RecordError};
use crate::types::{ActualOperation, DepartureTime};

/// One line of the operations collector's output. `departure_time` is
/// kept raw so a bad value is reported against its field.
#[derive(Debug, Deserialize)]
pub struct OperationRecord {
    pub operation_date: NaiveDate,
    pub route_id: String,
    pub departure_time: String,
    #[serde(default)]
    pub status: String,
    pub is_cancelled: bool,
    #[serde(default)]
    pub collected_at: Option<DateTime<Utc>>,
}

impl OperationRecord {
    fn into_operation(self, line: usize, received_at: DateTime<Utc>) -> Result<ActualOperation, RecordError> {
        let route_id = require_non_empty(line, "route_id", &self.route_id)?;
        let departure_time = DepartureTime::parse(&self.departure_time).ok_or_else(|| {
            RecordError::invalid(
                line,
                "departure_time",
                format!("'{}' is not HH:MM", self.departure_time),
            )
        })?;

        Ok(ActualOperation {
            operation_date: self.operation_date,
            route_id,
            departure_time,
            status: self.status.trim().to_string(),
            is_cancelled: self.is_cancelled,
            collected_at: self.collected_at.unwrap_or(received_at),
        })
    }
}

/// Read actual operations from JSON lines.
pub fn read_operations<R: BufRead>(
    reader: R,
    received_at: DateTime<Utc>,
) -> Result<RecordBatch<ActualOperation>, RecordError> {
    read_lines(reader, "operation", |line, raw| {
        let record: OperationRecord = serde_json::from_str(raw)
            .map_err(|source| RecordError::Malformed { line, source })?;
        record.into_operation(line, received_at)
    })
}
