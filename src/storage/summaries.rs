//! Daily and per-tier accuracy summaries

use chrono::NaiveDate;

use super::{date_prefix, decode_date_range, replace_prefix, ForecastStore, StoreError};
use crate::types::{DailySummary, TierSummary};

impl ForecastStore {
    /// Write the summary for its date, replacing any earlier one.
    ///
    /// When the stored row already carries the same metrics it is left
    /// untouched, so recomputing a settled day changes nothing on disk.
    /// Returns the row that is stored afterwards.
    pub fn put_daily_summary(&self, summary: &DailySummary) -> Result<DailySummary, StoreError> {
        let key = summary.summary_date.to_string();

        if let Some(bytes) = self.daily_summaries.get(key.as_bytes())? {
            let stored: DailySummary = serde_json::from_slice(&bytes)?;
            if stored.metrics == summary.metrics {
                return Ok(stored);
            }
        }

        self.daily_summaries
            .insert(key.as_bytes(), serde_json::to_vec(summary)?)?;
        Ok(summary.clone())
    }

    pub fn daily_summary(&self, date: NaiveDate) -> Result<Option<DailySummary>, StoreError> {
        match self.daily_summaries.get(date.to_string().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn daily_summaries_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailySummary>, StoreError> {
        decode_date_range(&self.daily_summaries, start, end)
    }

    /// Replace every tier summary of `date`.
    pub fn replace_tier_summaries(&self, date: NaiveDate, tiers: &[TierSummary]) -> Result<(), StoreError> {
        let entries = tiers
            .iter()
            .map(|t| Ok((format!("{}/{}", t.summary_date, t.tier), serde_json::to_vec(t)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        replace_prefix(&self.tier_summaries, &date_prefix(date), entries)
    }

    /// Drop the daily and tier summaries of `date`. Returns whether a daily
    /// summary existed.
    pub fn clear_summaries(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let removed = self.daily_summaries.remove(date.to_string().as_bytes())?;
        replace_prefix(&self.tier_summaries, &date_prefix(date), Vec::new())?;
        Ok(removed.is_some())
    }

    pub fn tier_summaries_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TierSummary>, StoreError> {
        decode_date_range(&self.tier_summaries, start, end)
    }
}
