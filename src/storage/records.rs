//! Snapshot, prediction, operation and outcome tables

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{date_prefix, decode_date_range, decode_prefix, nanos, replace_prefix, ForecastStore, StoreError};
use crate::types::{ActualOperation, FeatureSnapshot, Prediction, PredictionOutcome, SailingKey};

/// What a prediction upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No row existed for the key
    Inserted,
    /// The stored row was replaced wholesale
    Replaced,
    /// The stored row was byte-identical
    Unchanged,
    /// The stored row came from a newer forecast and was kept
    KeptNewer,
}

impl ForecastStore {
    // ========================================================================
    // Snapshots
    // ========================================================================

    fn snapshot_key(s: &FeatureSnapshot) -> String {
        let hour = s
            .target_hour
            .map_or_else(|| "--".to_string(), |h| format!("{h:02}"));
        format!(
            "{}/{}/{}/{:020}",
            s.target_date,
            s.location,
            hour,
            nanos(s.generated_at)
        )
    }

    /// Store a snapshot. Re-ingesting the same issue overwrites it in place.
    pub fn put_snapshot(&self, snapshot: &FeatureSnapshot) -> Result<(), StoreError> {
        let key = Self::snapshot_key(snapshot);
        self.snapshots.insert(key.as_bytes(), serde_json::to_vec(snapshot)?)?;
        Ok(())
    }

    /// Every stored snapshot for one location on one date, all issues.
    ///
    /// Locations are free text and may contain `/`, so the prefix scan can
    /// also hit `{location}/...`; rows are filtered on the decoded location.
    pub fn snapshots_for(&self, date: NaiveDate, location: &str) -> Result<Vec<FeatureSnapshot>, StoreError> {
        let rows: Vec<FeatureSnapshot> = decode_prefix(&self.snapshots, &format!("{date}/{location}/"))?;
        Ok(rows.into_iter().filter(|s| s.location == location).collect())
    }

    // ========================================================================
    // Predictions
    // ========================================================================

    /// Insert or replace the prediction for its sailing key.
    ///
    /// Last write wins by `generated_at`: a stored row from a newer
    /// forecast is kept, anything else is replaced entirely. The swap is
    /// atomic per key, so concurrent upserts for different sailings need
    /// no extra locking.
    pub fn upsert_prediction(&self, prediction: &Prediction) -> Result<UpsertOutcome, StoreError> {
        let key = prediction.key().storage_key();
        let encoded = serde_json::to_vec(prediction)?;
        let mut outcome = UpsertOutcome::Inserted;

        self.predictions.fetch_and_update(key.as_bytes(), |existing| match existing {
            None => {
                outcome = UpsertOutcome::Inserted;
                Some(encoded.clone())
            }
            Some(stored) if stored == encoded.as_slice() => {
                outcome = UpsertOutcome::Unchanged;
                Some(stored.to_vec())
            }
            Some(stored) => match serde_json::from_slice::<Prediction>(stored) {
                Ok(current) if current.generated_at > prediction.generated_at => {
                    outcome = UpsertOutcome::KeptNewer;
                    Some(stored.to_vec())
                }
                _ => {
                    outcome = UpsertOutcome::Replaced;
                    Some(encoded.clone())
                }
            },
        })?;

        tracing::trace!(key = %key, ?outcome, "Prediction upsert");
        Ok(outcome)
    }

    pub fn prediction(&self, key: &SailingKey) -> Result<Option<Prediction>, StoreError> {
        match self.predictions.get(key.storage_key().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn predictions_for_date(&self, date: NaiveDate) -> Result<Vec<Prediction>, StoreError> {
        decode_prefix(&self.predictions, &date_prefix(date))
    }

    pub fn prediction_count(&self) -> usize {
        self.predictions.len()
    }

    // ========================================================================
    // Actual operations
    // ========================================================================

    /// Append a collected operation. Rows are never overwritten except by an
    /// identical re-ingest.
    pub fn append_operation(&self, op: &ActualOperation) -> Result<(), StoreError> {
        let key = format!("{}/{:020}", op.key().storage_key(), nanos(op.collected_at));
        self.operations.insert(key.as_bytes(), serde_json::to_vec(op)?)?;
        Ok(())
    }

    /// The most recently collected operation per sailing key for `date`,
    /// keyed by the collector's own route label.
    pub fn latest_operations_for_date(&self, date: NaiveDate) -> Result<Vec<ActualOperation>, StoreError> {
        let rows: Vec<ActualOperation> = decode_prefix(&self.operations, &date_prefix(date))?;

        let mut latest: BTreeMap<SailingKey, ActualOperation> = BTreeMap::new();
        for op in rows {
            let key = op.key();
            let newer = latest
                .get(&key)
                .map_or(true, |current| op.collected_at > current.collected_at);
            if newer {
                latest.insert(key, op);
            }
        }
        Ok(latest.into_values().collect())
    }

    // ========================================================================
    // Outcomes
    // ========================================================================

    /// Replace all outcomes of `date` in one atomic batch, so readers never
    /// see a half-written day.
    pub fn replace_outcomes(&self, date: NaiveDate, outcomes: &[PredictionOutcome]) -> Result<(), StoreError> {
        let entries = outcomes
            .iter()
            .map(|o| Ok((o.key().storage_key(), serde_json::to_vec(o)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        replace_prefix(&self.outcomes, &date_prefix(date), entries)
    }

    pub fn outcomes_for_date(&self, date: NaiveDate) -> Result<Vec<PredictionOutcome>, StoreError> {
        decode_prefix(&self.outcomes, &date_prefix(date))
    }

    pub fn outcomes_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PredictionOutcome>, StoreError> {
        decode_date_range(&self.outcomes, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Classification, DepartureTime, RiskTier};
    use chrono::{DateTime, TimeZone, Utc};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).unwrap()
    }

    fn issued(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 15, hour, 0, 0).unwrap()
    }

    fn prediction(tier: RiskTier, generated_at: DateTime<Utc>) -> Prediction {
        Prediction {
            sailing_date: date(),
            route_id: "wakkanai-rishiri".to_string(),
            departure_time: DepartureTime::parse("08:00").unwrap(),
            risk_tier: tier,
            risk_score: 42.0,
            contributing_factors: vec!["[WINTER]".to_string()],
            forecast_wind: 12.0,
            forecast_wave: Some(1.8),
            forecast_visibility: None,
            generated_at,
            profile_version: 0,
        }
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let store = ForecastStore::open_temp().unwrap();
        let early = prediction(RiskTier::Low, issued(6));
        let late = prediction(RiskTier::High, issued(18));

        assert_eq!(store.upsert_prediction(&early).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_prediction(&early).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(store.upsert_prediction(&late).unwrap(), UpsertOutcome::Replaced);
        assert_eq!(store.upsert_prediction(&early).unwrap(), UpsertOutcome::KeptNewer);

        assert_eq!(store.prediction_count(), 1);
        let stored = store.prediction(&late.key()).unwrap().unwrap();
        assert_eq!(stored.risk_tier, RiskTier::High);
    }

    #[test]
    fn test_latest_operation_per_key() {
        let store = ForecastStore::open_temp().unwrap();
        let mut op = ActualOperation {
            operation_date: date(),
            route_id: "Wakkanai-Rishiri".to_string(),
            departure_time: DepartureTime::parse("08:00").unwrap(),
            status: "OPERATED".to_string(),
            is_cancelled: false,
            collected_at: Utc.with_ymd_and_hms(2026, 2, 16, 9, 0, 0).unwrap(),
        };
        store.append_operation(&op).unwrap();
        op.status = "CANCELLED".to_string();
        op.is_cancelled = true;
        op.collected_at = Utc.with_ymd_and_hms(2026, 2, 16, 12, 0, 0).unwrap();
        store.append_operation(&op).unwrap();

        let latest = store.latest_operations_for_date(date()).unwrap();
        assert_eq!(latest.len(), 1);
        assert!(latest[0].is_cancelled);
    }

    #[test]
    fn test_snapshots_scoped_to_location() {
        let store = ForecastStore::open_temp().unwrap();
        let mut snap = FeatureSnapshot {
            target_date: date(),
            target_hour: Some(8),
            location: "wakkanai".to_string(),
            wind_speed: 10.0,
            wave_height: None,
            visibility: None,
            temperature: None,
            generated_at: issued(6),
        };
        store.put_snapshot(&snap).unwrap();
        store.put_snapshot(&snap).unwrap();
        snap.location = "wakkanai-north".to_string();
        store.put_snapshot(&snap).unwrap();

        assert_eq!(store.snapshots_for(date(), "wakkanai").unwrap().len(), 1);
    }

    #[test]
    fn test_snapshots_for_ignores_nested_location_names() {
        let store = ForecastStore::open_temp().unwrap();
        let mut snap = FeatureSnapshot {
            target_date: date(),
            target_hour: Some(8),
            location: "rishiri".to_string(),
            wind_speed: 5.0,
            wave_height: None,
            visibility: None,
            temperature: None,
            generated_at: issued(6),
        };
        store.put_snapshot(&snap).unwrap();
        snap.location = "rishiri/oshidomari".to_string();
        snap.wind_speed = 28.0;
        snap.generated_at = issued(18);
        store.put_snapshot(&snap).unwrap();

        let found = store.snapshots_for(date(), "rishiri").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location, "rishiri");
        assert_eq!(found[0].wind_speed, 5.0);
        assert_eq!(store.snapshots_for(date(), "rishiri/oshidomari").unwrap().len(), 1);
    }

    #[test]
    fn test_replace_outcomes_for_date() {
        let store = ForecastStore::open_temp().unwrap();
        let outcome = PredictionOutcome {
            sailing_date: date(),
            route_id: "wakkanai-rishiri".to_string(),
            departure_time: DepartureTime::parse("08:00").unwrap(),
            predicted_tier: RiskTier::High,
            predicted_score: 80.0,
            actual_status: "CANCELLED".to_string(),
            classification: Classification::TruePositive,
            forecast_wind: 22.0,
            forecast_wave: Some(3.2),
            forecast_visibility: None,
        };
        store.replace_outcomes(date(), &[outcome.clone()]).unwrap();
        store.replace_outcomes(date(), &[outcome]).unwrap();
        assert_eq!(store.outcomes_for_date(date()).unwrap().len(), 1);

        store.replace_outcomes(date(), &[]).unwrap();
        assert!(store.outcomes_in_range(date(), date()).unwrap().is_empty());
    }
}
