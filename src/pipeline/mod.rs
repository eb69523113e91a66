//! Batch Pipeline
//!
//! One invocation runs one stage over a date or date range:
//!
//! ```text
//! ingest     collector files ──► snapshots, operations
//! score      schedule × dates ──► select_snapshot ──► RiskScorer ──► predictions (upsert)
//! evaluate   predictions + operations ──► matcher ──► outcomes ──► daily / tier summaries
//! calibrate  outcomes in window ──► ThresholdCalibrator ──► proposal (stored, not applied)
//! apply      proposal ──► new active profile version
//! ```
//!
//! Every stage is idempotent: re-running it over the same inputs leaves
//! the store as it was. Calibrate and apply additionally hold the
//! calibration lock so two runs cannot interleave.

mod select;

pub use select::select_snapshot;

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::acquisition::{read_forecasts, read_operations, RecordError};
use crate::calibration::{CalibrationError, CalibrationProposal, ThresholdCalibrator};
use crate::config::validation::validate_profile;
use crate::config::RiskConfig;
use crate::evaluation::{
    summarize_day, ActualOutcomeMatcher, RouteCanonicalizer, RouteNameMismatch,
};
use crate::report::AccuracyReport;
use crate::scoring::RiskScorer;
use crate::storage::{CalibrationLock, ForecastStore, StoreError, UpsertOutcome};
use crate::types::{
    DailySummary, DataStatus, Prediction, ProfileSet, SailingSchedule, Season,
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("unmapped route labels on {date}: {}", .labels.join(", "))]
    RouteMismatch { date: NaiveDate, labels: Vec<String> },

    #[error("no calibration proposal with id {0}")]
    UnknownProposal(u64),

    #[error("calibration proposal {0} was already applied")]
    AlreadyApplied(u64),

    #[error("stored profile version {version} is invalid: {}", .errors.join("; "))]
    InvalidActiveProfiles { version: u64, errors: Vec<String> },
}

// ============================================================================
// Stage results
// ============================================================================

/// Counts from one ingest call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: usize,
    pub rejected: usize,
}

impl fmt::Display for IngestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} accepted, {} rejected", self.accepted, self.rejected)
    }
}

/// Per-sailing counts from one scoring run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreStats {
    pub profile_version: u64,
    pub sailings: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub kept_newer: usize,
    /// No snapshot for the sailing's location and date
    pub no_forecast: usize,
    /// Selected snapshot failed feature validation
    pub invalid: usize,
}

impl ScoreStats {
    fn record(&mut self, result: SailingResult) {
        self.sailings += 1;
        match result {
            SailingResult::Upserted(UpsertOutcome::Inserted) => self.inserted += 1,
            SailingResult::Upserted(UpsertOutcome::Replaced) => self.replaced += 1,
            SailingResult::Upserted(UpsertOutcome::Unchanged) => self.unchanged += 1,
            SailingResult::Upserted(UpsertOutcome::KeptNewer) => self.kept_newer += 1,
            SailingResult::NoForecast => self.no_forecast += 1,
            SailingResult::Invalid => self.invalid += 1,
        }
    }
}

impl fmt::Display for ScoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sailings (profile v{}): {} inserted, {} replaced, {} unchanged, {} kept newer, {} without forecast, {} invalid",
            self.sailings,
            self.profile_version,
            self.inserted,
            self.replaced,
            self.unchanged,
            self.kept_newer,
            self.no_forecast,
            self.invalid
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum SailingResult {
    Upserted(UpsertOutcome),
    NoForecast,
    Invalid,
}

/// Evaluation result for one sailing date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayResult {
    pub date: NaiveDate,
    pub status: DataStatus,
    pub evaluated: usize,
    pub unmatched: usize,
    pub overdue: usize,
    pub unpredicted_operations: usize,
    pub route_mismatches: Vec<RouteNameMismatch>,
    /// Stored summary after this run; `None` for `NoDataYet`
    pub summary: Option<DailySummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluateStats {
    pub days: Vec<DayResult>,
}

impl EvaluateStats {
    pub fn evaluated_days(&self) -> usize {
        self.days
            .iter()
            .filter(|d| d.status == DataStatus::Evaluated)
            .count()
    }

    pub fn route_mismatches(&self) -> usize {
        self.days.iter().map(|d| d.route_mismatches.len()).sum()
    }
}

impl fmt::Display for EvaluateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcomes: usize = self.days.iter().map(|d| d.evaluated).sum();
        let unmatched: usize = self.days.iter().map(|d| d.unmatched).sum();
        write!(
            f,
            "{} days ({} evaluated), {} outcomes, {} unmatched predictions, {} route mismatches",
            self.days.len(),
            self.evaluated_days(),
            outcomes,
            unmatched,
            self.route_mismatches()
        )
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs the batch stages against one store.
pub struct BatchPipeline {
    config: RiskConfig,
    store: ForecastStore,
}

impl BatchPipeline {
    pub fn new(config: RiskConfig, store: ForecastStore) -> Self {
        Self { config, store }
    }

    /// Open the store under `config.store.data_dir`.
    pub fn open(config: RiskConfig) -> Result<Self, PipelineError> {
        let store = ForecastStore::open(&config.store.data_dir)?;
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn store(&self) -> &ForecastStore {
        &self.store
    }

    /// The profile set scoring runs against: the last applied version, or
    /// version 0 from config when nothing was ever applied.
    pub fn active_profiles(&self) -> Result<ProfileSet, PipelineError> {
        let Some(mut stored) = self.store.active_profile_set()? else {
            return Ok(self.config.profile_set());
        };

        stored.winter.normalize();
        stored.summer.normalize();
        let mut errors = validate_profile(&stored.winter, Season::Winter);
        errors.extend(validate_profile(&stored.summer, Season::Summer));
        if !errors.is_empty() {
            return Err(PipelineError::InvalidActiveProfiles {
                version: stored.version,
                errors,
            });
        }
        Ok(stored)
    }

    // ========================================================================
    // Ingest
    // ========================================================================

    pub fn ingest_forecasts<R: BufRead>(
        &self,
        reader: R,
        received_at: DateTime<Utc>,
    ) -> Result<IngestStats, PipelineError> {
        let batch = read_forecasts(reader, received_at)?;
        for snapshot in &batch.records {
            self.store.put_snapshot(snapshot)?;
        }
        self.store.flush()?;

        let stats = IngestStats {
            accepted: batch.accepted(),
            rejected: batch.rejected.len(),
        };
        info!(accepted = stats.accepted, rejected = stats.rejected, "Forecast snapshots ingested");
        Ok(stats)
    }

    pub fn ingest_operations<R: BufRead>(
        &self,
        reader: R,
        received_at: DateTime<Utc>,
    ) -> Result<IngestStats, PipelineError> {
        let batch = read_operations(reader, received_at)?;
        for op in &batch.records {
            self.store.append_operation(op)?;
        }
        self.store.flush()?;

        let stats = IngestStats {
            accepted: batch.accepted(),
            rejected: batch.rejected.len(),
        };
        info!(accepted = stats.accepted, rejected = stats.rejected, "Actual operations ingested");
        Ok(stats)
    }

    pub fn ingest_forecast_file(
        &self,
        path: &Path,
        received_at: DateTime<Utc>,
    ) -> Result<IngestStats, PipelineError> {
        self.ingest_forecasts(open_reader(path)?, received_at)
    }

    pub fn ingest_operation_file(
        &self,
        path: &Path,
        received_at: DateTime<Utc>,
    ) -> Result<IngestStats, PipelineError> {
        self.ingest_operations(open_reader(path)?, received_at)
    }

    // ========================================================================
    // Score
    // ========================================================================

    /// Score every scheduled departure on every date in `start..=end`.
    ///
    /// Sailings are scored in parallel; each upsert is independent and the
    /// store resolves concurrent writers per key.
    pub fn score(&self, start: NaiveDate, end: NaiveDate) -> Result<ScoreStats, PipelineError> {
        let dates = dates_in(start, end)?;
        let profiles = self.active_profiles()?;
        let profile_version = profiles.version;
        let scorer = RiskScorer::new(profiles, self.config.visibility.clone());

        if self.config.schedule.is_empty() {
            warn!("Schedule is empty, nothing to score");
        }

        let jobs: Vec<(NaiveDate, &SailingSchedule)> = dates
            .iter()
            .flat_map(|date| self.config.schedule.iter().map(move |s| (*date, s)))
            .collect();

        let results = jobs
            .par_iter()
            .map(|(date, sailing)| self.score_sailing(&scorer, *date, sailing))
            .collect::<Result<Vec<_>, PipelineError>>()?;
        self.store.flush()?;

        let mut stats = ScoreStats {
            profile_version,
            ..ScoreStats::default()
        };
        for result in results {
            stats.record(result);
        }
        info!(%start, %end, "{}", stats);
        Ok(stats)
    }

    fn score_sailing(
        &self,
        scorer: &RiskScorer,
        date: NaiveDate,
        sailing: &SailingSchedule,
    ) -> Result<SailingResult, PipelineError> {
        let snapshots = self.store.snapshots_for(date, &sailing.location)?;
        let Some(snapshot) = select_snapshot(&snapshots, sailing.departure_time.hour()) else {
            debug!(
                %date,
                route = %sailing.route_id,
                departure = %sailing.departure_time,
                location = %sailing.location,
                "No forecast snapshot for sailing"
            );
            return Ok(SailingResult::NoForecast);
        };

        let assessment = match scorer.score(snapshot, date) {
            Ok(a) => a,
            Err(e) => {
                warn!(
                    %date,
                    route = %sailing.route_id,
                    departure = %sailing.departure_time,
                    error = %e,
                    "Skipping invalid forecast snapshot"
                );
                return Ok(SailingResult::Invalid);
            }
        };

        let prediction = Prediction {
            sailing_date: date,
            route_id: sailing.route_id.clone(),
            departure_time: sailing.departure_time,
            risk_tier: assessment.risk_tier,
            risk_score: assessment.risk_score,
            contributing_factors: assessment.factors,
            forecast_wind: snapshot.wind_speed,
            forecast_wave: snapshot.wave_height,
            forecast_visibility: snapshot.visibility,
            generated_at: snapshot.generated_at,
            profile_version: assessment.profile_version,
        };
        let outcome = self.store.upsert_prediction(&prediction)?;
        debug!(
            sailing = %prediction.key(),
            tier = ?prediction.risk_tier,
            score = prediction.risk_score,
            ?outcome,
            "Prediction stored"
        );
        Ok(SailingResult::Upserted(outcome))
    }

    // ========================================================================
    // Evaluate
    // ========================================================================

    /// Match predictions to operations for every date in `start..=end` and
    /// recompute that date's summaries from scratch.
    ///
    /// `today` decides which unmatched predictions are overdue.
    pub fn evaluate(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<EvaluateStats, PipelineError> {
        let dates = dates_in(start, end)?;
        let matcher = ActualOutcomeMatcher::new(
            RouteCanonicalizer::from_config(&self.config.routes),
            self.config.evaluation.unmatched_grace_days,
        );

        // Match every date first so strict mode fails before any write.
        let mut reports = Vec::with_capacity(dates.len());
        for date in dates {
            let predictions = self.store.predictions_for_date(date)?;
            let operations = self.store.latest_operations_for_date(date)?;
            let report = matcher.match_date(date, &predictions, &operations, today);

            if self.config.routes.strict && !report.route_mismatches.is_empty() {
                return Err(PipelineError::RouteMismatch {
                    date,
                    labels: report
                        .route_mismatches
                        .iter()
                        .map(|m| m.label.clone())
                        .collect(),
                });
            }
            reports.push((date, report));
        }

        let mut stats = EvaluateStats::default();
        for (date, report) in reports {
            self.store.replace_outcomes(date, &report.outcomes)?;
            let day = summarize_day(date, &report.outcomes, now);
            let summary = match &day.summary {
                Some(summary) => {
                    let stored = self.store.put_daily_summary(summary)?;
                    self.store.replace_tier_summaries(date, &day.tiers)?;
                    info!(
                        %date,
                        total = stored.metrics.total_evaluated,
                        accuracy = %stored.metrics.accuracy,
                        recall = %stored.metrics.recall,
                        "Daily accuracy recorded"
                    );
                    Some(stored)
                }
                None => {
                    if self.store.clear_summaries(date)? {
                        warn!(%date, "Day no longer has outcomes; cleared its stored summaries");
                    }
                    info!(%date, pending = report.unmatched.len(), "No data yet");
                    None
                }
            };

            stats.days.push(DayResult {
                date,
                status: day.status,
                evaluated: report.outcomes.len(),
                unmatched: report.unmatched.len(),
                overdue: report.overdue_count(),
                unpredicted_operations: report.unpredicted_operations,
                route_mismatches: report.route_mismatches,
                summary,
            });
        }
        self.store.flush()?;

        info!(%start, %end, "{}", stats);
        Ok(stats)
    }

    // ========================================================================
    // Calibrate / Apply
    // ========================================================================

    /// Build and store a proposal over the window ending on `end`. The
    /// active profiles are not touched.
    pub fn calibrate(
        &self,
        end: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CalibrationProposal, PipelineError> {
        let _lock = CalibrationLock::acquire(&self.config.store.data_dir)?;

        let base = self.active_profiles()?;
        let calibrator = ThresholdCalibrator::new(self.config.calibration.clone());
        let window = calibrator.window_ending(end);
        let outcomes = self.store.outcomes_in_range(window.0, window.1)?;

        let id = self.store.next_proposal_id()?;
        let proposal = calibrator.propose(id, window, &base, &outcomes, now);
        self.store.put_proposal(&proposal)?;

        info!(
            id,
            window_start = %window.0,
            window_end = %window.1,
            outcomes = outcomes.len(),
            changed = proposal.changed(),
            "Calibration proposal stored"
        );
        Ok(proposal)
    }

    /// Make proposal `id`'s candidate the active profile set.
    pub fn apply(&self, id: u64) -> Result<ProfileSet, PipelineError> {
        let _lock = CalibrationLock::acquire(&self.config.store.data_dir)?;

        let mut proposal = self
            .store
            .proposal(id)?
            .ok_or(PipelineError::UnknownProposal(id))?;
        if proposal.applied {
            return Err(PipelineError::AlreadyApplied(id));
        }

        let active = self.active_profiles()?;
        let candidate = proposal.applicable_to(active.version)?;
        self.store.put_profile_set(&candidate)?;

        proposal.applied = true;
        self.store.put_proposal(&proposal)?;
        self.store.flush()?;

        info!(
            id,
            from_version = active.version,
            to_version = candidate.version,
            "Calibration proposal applied"
        );
        Ok(candidate)
    }

    // ========================================================================
    // Report
    // ========================================================================

    pub fn report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        include_outcomes: bool,
    ) -> Result<AccuracyReport, PipelineError> {
        let dates = dates_in(start, end)?;
        debug!(days = dates.len(), "Building accuracy report");
        let active = self.active_profiles()?;
        Ok(AccuracyReport::build(
            &self.store,
            start,
            end,
            active.version,
            include_outcomes,
        )?)
    }
}

fn open_reader(path: &Path) -> Result<BufReader<File>, PipelineError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| PipelineError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn dates_in(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, PipelineError> {
    if start > end {
        return Err(PipelineError::InvalidRange { start, end });
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schedule_entry;
    use crate::types::{DepartureTime, RiskTier, SailingKey};
    use chrono::TimeZone;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn pipeline() -> BatchPipeline {
        let mut config = RiskConfig::default();
        config.schedule = vec![
            schedule_entry("wakkanai-rishiri", "08:00", "09:40", "wakkanai").unwrap(),
            schedule_entry("wakkanai-rishiri", "14:00", "15:40", "wakkanai").unwrap(),
        ];
        BatchPipeline::new(config, ForecastStore::open_temp().unwrap())
    }

    fn forecast_line(day: u32, hour: u32, wind: f64) -> String {
        format!(
            r#"{{"target_date":"2026-02-{day:02}","target_hour":{hour},"location":"wakkanai","wind_speed":{wind},"wave_height":1.0,"generated_at":"2026-02-{:02}T06:00:00Z"}}"#,
            day - 1
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_dates_in() {
        assert_eq!(dates_in(date(1), date(3)).unwrap().len(), 3);
        assert_eq!(dates_in(date(3), date(3)).unwrap(), vec![date(3)]);
        assert!(matches!(
            dates_in(date(4), date(3)),
            Err(PipelineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_score_uses_matching_hour() {
        let p = pipeline();
        let input = format!("{}\n{}\n", forecast_line(16, 8, 22.0), forecast_line(16, 14, 4.0));
        let ingested = p.ingest_forecasts(input.as_bytes(), now()).unwrap();
        assert_eq!(ingested.accepted, 2);

        let stats = p.score(date(16), date(16)).unwrap();
        assert_eq!(stats.sailings, 2);
        assert_eq!(stats.inserted, 2);

        let morning = SailingKey::new(date(16), "wakkanai-rishiri", DepartureTime::parse("08:00").unwrap());
        let afternoon = SailingKey::new(date(16), "wakkanai-rishiri", DepartureTime::parse("14:00").unwrap());
        let morning = p.store().prediction(&morning).unwrap().unwrap();
        let afternoon = p.store().prediction(&afternoon).unwrap().unwrap();
        assert_eq!(morning.forecast_wind, 22.0);
        assert_eq!(morning.risk_tier, RiskTier::High);
        assert_eq!(afternoon.forecast_wind, 4.0);
        assert_eq!(afternoon.risk_tier, RiskTier::Minimal);
    }

    #[test]
    fn test_rescore_is_unchanged() {
        let p = pipeline();
        p.ingest_forecasts(forecast_line(16, 8, 14.0).as_bytes(), now()).unwrap();

        let first = p.score(date(16), date(16)).unwrap();
        let second = p.score(date(16), date(16)).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(second.unchanged, 2);
        assert_eq!(p.store().prediction_count(), 2);
    }

    #[test]
    fn test_score_without_forecast() {
        let p = pipeline();
        let stats = p.score(date(16), date(17)).unwrap();
        assert_eq!(stats.sailings, 4);
        assert_eq!(stats.no_forecast, 4);
        assert_eq!(p.store().prediction_count(), 0);
    }

    #[test]
    fn test_evaluate_empty_day_is_no_data_yet() {
        let p = pipeline();
        let stats = p.evaluate(date(16), date(16), date(17), now()).unwrap();
        assert_eq!(stats.days[0].status, DataStatus::NoDataYet);
        assert!(p.store().daily_summary(date(16)).unwrap().is_none());
    }

    #[test]
    fn test_missing_ingest_file() {
        let p = pipeline();
        let err = p
            .ingest_forecast_file(Path::new("/nonexistent/forecasts.jsonl"), now())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Open { .. }));
    }
}
