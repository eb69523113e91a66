//! Actual operation records supplied by the operations collector

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{DepartureTime, SailingKey};

/// What actually happened to a sailing.
///
/// Append-only: each collection pass adds a row; evaluation uses the row
/// with the latest `collected_at` per sailing key. `status` is free text
/// (`OPERATED`, `CANCELLED`, `DELAYED`, operator wording); `is_cancelled`
/// is authoritative for classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActualOperation {
    pub operation_date: NaiveDate,
    pub route_id: String,
    pub departure_time: DepartureTime,
    pub status: String,
    pub is_cancelled: bool,
    /// Stamped at ingest when the collector does not supply it
    #[serde(default = "chrono::Utc::now")]
    pub collected_at: DateTime<Utc>,
}

impl ActualOperation {
    pub fn key(&self) -> SailingKey {
        SailingKey::new(self.operation_date, self.route_id.clone(), self.departure_time)
    }

    /// Normalized status for outcome rows: `CANCELLED` when cancelled,
    /// otherwise the collector's status upper-cased (`OPERATED` if blank).
    pub fn normalized_status(&self) -> String {
        if self.is_cancelled {
            return "CANCELLED".to_string();
        }
        let trimmed = self.status.trim();
        if trimmed.is_empty() {
            "OPERATED".to_string()
        } else {
            trimmed.to_uppercase()
        }
    }
}
