//! Accuracy Aggregator
//!
//! Pure computation: confusion matrices and derived metrics per day, per
//! tier, per wind band and over a date range. Recomputing from the same
//! outcomes always yields the same values; nothing accumulates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::defaults::WIND_BAND_EDGES;
use crate::types::{
    AccuracyMetrics, ConfusionMatrix, DailySummary, DataStatus, PredictionOutcome, RangeSummary,
    Rate, RiskTier, TierSummary, WindBandAccuracy,
};

/// Everything the aggregator derives for one sailing date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayEvaluation {
    pub date: NaiveDate,
    pub status: DataStatus,
    /// `None` when there was nothing to evaluate
    pub summary: Option<DailySummary>,
    pub tiers: Vec<TierSummary>,
}

/// Summarize the outcomes of `date`. Outcomes for other dates are ignored.
///
/// A day with no outcomes is `NoDataYet`, never a 0% summary.
pub fn summarize_day(
    date: NaiveDate,
    outcomes: &[PredictionOutcome],
    calculated_at: DateTime<Utc>,
) -> DayEvaluation {
    let day: Vec<&PredictionOutcome> = outcomes.iter().filter(|o| o.sailing_date == date).collect();

    if day.is_empty() {
        return DayEvaluation {
            date,
            status: DataStatus::NoDataYet,
            summary: None,
            tiers: Vec::new(),
        };
    }

    let matrix = ConfusionMatrix::from_outcomes(day.iter().copied());
    DayEvaluation {
        date,
        status: DataStatus::Evaluated,
        summary: Some(DailySummary {
            summary_date: date,
            metrics: AccuracyMetrics::from_matrix(matrix),
            calculated_at,
        }),
        tiers: tier_summaries(date, &day),
    }
}

/// Per-tier breakdown for one date. Tiers with no predictions are omitted.
pub fn tier_summaries(date: NaiveDate, outcomes: &[&PredictionOutcome]) -> Vec<TierSummary> {
    RiskTier::ALL
        .iter()
        .filter_map(|&tier| {
            let rows: Vec<&PredictionOutcome> = outcomes
                .iter()
                .copied()
                .filter(|o| o.predicted_tier == tier)
                .collect();
            if rows.is_empty() {
                return None;
            }

            let count = count_u32(rows.len());
            let correct = count_u32(rows.iter().filter(|o| o.classification.is_correct()).count());
            let waves: Vec<f64> = rows.iter().filter_map(|o| o.forecast_wave).collect();

            Some(TierSummary {
                summary_date: date,
                tier,
                predictions_count: count,
                correct_count: correct,
                accuracy: Rate::percent(correct, count),
                avg_score: mean(rows.iter().map(|o| o.predicted_score)).unwrap_or(0.0),
                avg_forecast_wind: mean(rows.iter().map(|o| o.forecast_wind)).unwrap_or(0.0),
                avg_forecast_wave: mean(waves.into_iter()),
            })
        })
        .collect()
}

/// Sum daily summaries over `[start, end]`.
///
/// Days without a summary count as `days_without_data`; the range is
/// `NoDataYet` when no day in it was evaluated.
pub fn range_summary(start: NaiveDate, end: NaiveDate, summaries: &[DailySummary]) -> RangeSummary {
    let mut matrix = ConfusionMatrix::default();
    let mut days_evaluated = 0u32;

    for s in summaries
        .iter()
        .filter(|s| s.summary_date >= start && s.summary_date <= end && s.metrics.total_evaluated > 0)
    {
        matrix.merge(&s.metrics.matrix);
        days_evaluated += 1;
    }

    let days_in_range = u32::try_from((end - start).num_days() + 1).unwrap_or(0);

    RangeSummary {
        start,
        end,
        status: if days_evaluated == 0 {
            DataStatus::NoDataYet
        } else {
            DataStatus::Evaluated
        },
        days_evaluated,
        days_without_data: days_in_range.saturating_sub(days_evaluated),
        metrics: AccuracyMetrics::from_matrix(matrix),
    }
}

/// Accuracy and cancellation rate per forecast-wind band. Every band is
/// reported, empty ones with insufficient-data rates.
pub fn wind_band_accuracy(outcomes: &[PredictionOutcome]) -> Vec<WindBandAccuracy> {
    let mut bands: Vec<WindBandAccuracy> = WIND_BAND_EDGES
        .iter()
        .enumerate()
        .map(|(i, &min_wind)| {
            let max_wind = WIND_BAND_EDGES.get(i + 1).copied();
            let label = match max_wind {
                Some(max) => format!("{min_wind:.0}-{max:.0} m/s"),
                None => format!("{min_wind:.0}+ m/s"),
            };
            WindBandAccuracy {
                label,
                min_wind,
                max_wind,
                total: 0,
                correct: 0,
                cancelled: 0,
                accuracy: Rate::insufficient(),
                cancellation_rate: Rate::insufficient(),
            }
        })
        .collect();

    for o in outcomes {
        // Calm or negative readings fall into the first band.
        let idx = WIND_BAND_EDGES
            .iter()
            .rposition(|&edge| o.forecast_wind >= edge)
            .unwrap_or(0);
        let band = &mut bands[idx];
        band.total += 1;
        if o.classification.is_correct() {
            band.correct += 1;
        }
        if o.actually_cancelled() {
            band.cancelled += 1;
        }
    }

    for band in &mut bands {
        band.accuracy = Rate::percent(band.correct, band.total);
        band.cancellation_rate = Rate::percent(band.cancelled, band.total);
    }
    bands
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0u32), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / f64::from(n))
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Classification, DepartureTime};
    use chrono::TimeZone;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn outcome(day: u32, tier: RiskTier, cancelled: bool, wind: f64) -> PredictionOutcome {
        PredictionOutcome {
            sailing_date: d(day),
            route_id: "wakkanai-rishiri".to_string(),
            departure_time: DepartureTime::parse("08:00").unwrap(),
            predicted_tier: tier,
            predicted_score: if tier.implies_cancellation() { 70.0 } else { 10.0 },
            actual_status: if cancelled { "CANCELLED" } else { "OPERATED" }.to_string(),
            classification: Classification::classify(tier, cancelled),
            forecast_wind: wind,
            forecast_wave: None,
            forecast_visibility: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 17, 1, 0, 0).unwrap()
    }

    #[test]
    fn test_day_summary_counts_add_up() {
        let outcomes = vec![
            outcome(16, RiskTier::High, true, 22.0),
            outcome(16, RiskTier::Medium, false, 14.0),
            outcome(16, RiskTier::Low, true, 11.0),
            outcome(16, RiskTier::Minimal, false, 3.0),
            outcome(16, RiskTier::Minimal, false, 4.0),
            outcome(17, RiskTier::High, true, 25.0),
        ];
        let eval = summarize_day(d(16), &outcomes, now());
        assert_eq!(eval.status, DataStatus::Evaluated);

        let m = eval.summary.unwrap().metrics;
        assert_eq!(m.total_evaluated, 5);
        assert_eq!(m.matrix.total(), m.total_evaluated);
        assert_eq!((m.matrix.tp, m.matrix.tn, m.matrix.fp, m.matrix.fn_), (1, 2, 1, 1));
        assert!((m.accuracy.value - 60.0).abs() < 1e-9);
        assert!((m.precision.value - 50.0).abs() < 1e-9);
        assert!((m.recall.value - 50.0).abs() < 1e-9);
        assert!((m.f1.value - 50.0).abs() < 1e-9);

        let minimal = eval.tiers.iter().find(|t| t.tier == RiskTier::Minimal).unwrap();
        assert_eq!(minimal.predictions_count, 2);
        assert!((minimal.avg_forecast_wind - 3.5).abs() < 1e-9);
        assert_eq!(minimal.avg_forecast_wave, None);
    }

    #[test]
    fn test_empty_day_is_no_data_not_zero_accuracy() {
        let eval = summarize_day(d(16), &[], now());
        assert_eq!(eval.status, DataStatus::NoDataYet);
        assert!(eval.summary.is_none());
    }

    #[test]
    fn test_recompute_is_identical() {
        let outcomes = vec![outcome(16, RiskTier::High, false, 18.0), outcome(16, RiskTier::Low, false, 9.0)];
        assert_eq!(summarize_day(d(16), &outcomes, now()), summarize_day(d(16), &outcomes, now()));
    }

    #[test]
    fn test_range_summary_merges_days() {
        let day16 = summarize_day(d(16), &[outcome(16, RiskTier::High, true, 22.0)], now());
        let day18 = summarize_day(d(18), &[outcome(18, RiskTier::Low, true, 12.0)], now());
        let summaries = vec![day16.summary.unwrap(), day18.summary.unwrap()];

        let range = range_summary(d(15), d(21), &summaries);
        assert_eq!(range.status, DataStatus::Evaluated);
        assert_eq!(range.days_evaluated, 2);
        assert_eq!(range.days_without_data, 5);
        assert_eq!(range.metrics.matrix.tp, 1);
        assert_eq!(range.metrics.matrix.fn_, 1);

        let empty = range_summary(d(1), d(7), &[]);
        assert_eq!(empty.status, DataStatus::NoDataYet);
        assert!(empty.metrics.accuracy.insufficient_data);
    }

    #[test]
    fn test_wind_bands() {
        let outcomes = vec![
            outcome(16, RiskTier::Minimal, false, -0.5),
            outcome(16, RiskTier::Low, true, 12.0),
            outcome(16, RiskTier::High, true, 31.0),
        ];
        let bands = wind_band_accuracy(&outcomes);
        assert_eq!(bands.len(), WIND_BAND_EDGES.len());
        assert_eq!(bands[0].total, 1);
        assert_eq!(bands[2].label, "12-15 m/s");
        assert_eq!(bands[2].cancelled, 1);
        assert!((bands[2].accuracy.value - 0.0).abs() < 1e-9);
        assert!(!bands[2].accuracy.insufficient_data);
        assert_eq!(bands[6].label, "30+ m/s");
        assert!((bands[6].cancellation_rate.value - 100.0).abs() < 1e-9);
        assert!(bands[4].accuracy.insufficient_data);
    }
}
