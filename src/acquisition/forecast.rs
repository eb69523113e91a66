//! Forecast collector records

use std::io::BufRead;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::{read_lines, require_non_empty, RecordBatch, RecordError};
use crate::types::FeatureSnapshot;

/// One line of the forecast collector's output.
///
/// The collector does not always stamp its records; `generated_at`
/// falls back to the ingest time.
#[derive(Debug, Deserialize)]
pub struct ForecastRecord {
    pub target_date: NaiveDate,
    #[serde(default)]
    pub target_hour: Option<u32>,
    pub location: String,
    pub wind_speed: f64,
    #[serde(default)]
    pub wave_height: Option<f64>,
    #[serde(default)]
    pub visibility: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

impl ForecastRecord {
    fn into_snapshot(self, line: usize, received_at: DateTime<Utc>) -> Result<FeatureSnapshot, RecordError> {
        if let Some(hour) = self.target_hour {
            if hour > 23 {
                return Err(RecordError::invalid(line, "target_hour", format!("{hour} is outside 0-23")));
            }
        }
        let location = require_non_empty(line, "location", &self.location)?;

        Ok(FeatureSnapshot {
            target_date: self.target_date,
            target_hour: self.target_hour,
            location,
            wind_speed: self.wind_speed,
            wave_height: self.wave_height,
            visibility: self.visibility,
            temperature: self.temperature,
            generated_at: self.generated_at.unwrap_or(received_at),
        })
    }
}

/// Read forecast snapshots from JSON lines.
///
/// Numeric plausibility (negative wave height and the like) is left to
/// the scorer, which skips such snapshots without failing the run.
pub fn read_forecasts<R: BufRead>(
    reader: R,
    received_at: DateTime<Utc>,
) -> Result<RecordBatch<FeatureSnapshot>, RecordError> {
    read_lines(reader, "forecast", |line, raw| {
        let record: ForecastRecord = serde_json::from_str(raw)
            .map_err(|source| RecordError::Malformed { line, source })?;
        record.into_snapshot(line, received_at)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_reads_hourly_and_daily_records() {
        let input = r#"
{"target_date":"2026-02-16","target_hour":8,"location":"wakkanai","wind_speed":12.0,"wave_height":1.8,"visibility":15.0,"generated_at":"2026-02-15T06:00:00Z"}
{"target_date":"2026-02-16","target_hour":null,"location":"wakkanai","wind_speed":9.5}
"#;
        let batch = read_forecasts(input.as_bytes(), received()).unwrap();
        assert_eq!(batch.accepted(), 2);
        assert!(batch.rejected.is_empty());

        let hourly = &batch.records[0];
        assert_eq!(hourly.target_hour, Some(8));
        assert_eq!(hourly.wave_height, Some(1.8));
        assert_eq!(hourly.generated_at, Utc.with_ymd_and_hms(2026, 2, 15, 6, 0, 0).unwrap());

        let daily = &batch.records[1];
        assert_eq!(daily.target_hour, None);
        assert_eq!(daily.visibility, None);
        assert_eq!(daily.generated_at, received());
    }

    #[test]
    fn test_rejects_bad_hour_and_missing_location() {
        let input = r#"{"target_date":"2026-02-16","target_hour":24,"location":"x","wind_speed":1.0}
{"target_date":"2026-02-16","location":"  ","wind_speed":1.0}
not json
"#;
        let batch = read_forecasts(input.as_bytes(), received()).unwrap();
        assert_eq!(batch.accepted(), 0);
        assert_eq!(batch.rejected.len(), 3);
        assert!(matches!(batch.rejected[0], RecordError::Invalid { field: "target_hour", .. }));
        assert!(matches!(batch.rejected[1], RecordError::Invalid { field: "location", .. }));
        assert!(matches!(batch.rejected[2], RecordError::Malformed { line: 3, .. }));
    }
}
