//! Accuracy types: Classification, PredictionOutcome, confusion matrix,
//! DailySummary, TierSummary, WindBandAccuracy, RangeSummary

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{DepartureTime, RiskTier, SailingKey};

// ============================================================================
// Classification
// ============================================================================

/// Confusion-matrix cell for one evaluated sailing. "Positive" = cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Predicted cancel, was cancelled
    #[serde(rename = "TP")]
    TruePositive,
    /// Predicted operate, operated
    #[serde(rename = "TN")]
    TrueNegative,
    /// Predicted cancel, operated (over-warning, the safer error)
    #[serde(rename = "FP")]
    FalsePositive,
    /// Predicted operate, was cancelled (under-warning, the dangerous error)
    #[serde(rename = "FN")]
    FalseNegative,
}

impl Classification {
    pub fn classify(tier: RiskTier, actually_cancelled: bool) -> Self {
        match (tier.implies_cancellation(), actually_cancelled) {
            (true, true) => Classification::TruePositive,
            (false, false) => Classification::TrueNegative,
            (true, false) => Classification::FalsePositive,
            (false, true) => Classification::FalseNegative,
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, Classification::TruePositive | Classification::TrueNegative)
    }

    pub fn short_code(&self) -> &'static str {
        match self {
            Classification::TruePositive => "TP",
            Classification::TrueNegative => "TN",
            Classification::FalsePositive => "FP",
            Classification::FalseNegative => "FN",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_code())
    }
}

// ============================================================================
// Prediction Outcome
// ============================================================================

/// A prediction joined to what actually happened. Materialized for audit
/// and drill-down; one row per sailing key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionOutcome {
    pub sailing_date: NaiveDate,
    /// Canonical route id
    pub route_id: String,
    pub departure_time: DepartureTime,
    pub predicted_tier: RiskTier,
    pub predicted_score: f64,
    pub actual_status: String,
    pub classification: Classification,
    pub forecast_wind: f64,
    pub forecast_wave: Option<f64>,
    pub forecast_visibility: Option<f64>,
}

impl PredictionOutcome {
    pub fn key(&self) -> SailingKey {
        SailingKey::new(self.sailing_date, self.route_id.clone(), self.departure_time)
    }

    pub fn actually_cancelled(&self) -> bool {
        matches!(
            self.classification,
            Classification::TruePositive | Classification::FalseNegative
        )
    }
}

// ============================================================================
// Confusion Matrix & Metrics
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub tp: u32,
    pub tn: u32,
    pub fp: u32,
    #[serde(rename = "fn")]
    pub fn_: u32,
}

impl ConfusionMatrix {
    pub fn from_outcomes<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a PredictionOutcome>,
    {
        let mut m = Self::default();
        for o in outcomes {
            m.record(o.classification);
        }
        m
    }

    pub fn record(&mut self, c: Classification) {
        match c {
            Classification::TruePositive => self.tp += 1,
            Classification::TrueNegative => self.tn += 1,
            Classification::FalsePositive => self.fp += 1,
            Classification::FalseNegative => self.fn_ += 1,
        }
    }

    pub fn merge(&mut self, other: &ConfusionMatrix) {
        self.tp += other.tp;
        self.tn += other.tn;
        self.fp += other.fp;
        self.fn_ += other.fn_;
    }

    pub fn total(&self) -> u32 {
        self.tp + self.tn + self.fp + self.fn_
    }

    pub fn correct(&self) -> u32 {
        self.tp + self.tn
    }
}

/// A percentage that may be undefined for lack of data.
///
/// Undefined values are reported as `0.0` with `insufficient_data = true`,
/// never as NaN, so "no data" stays distinguishable from "all wrong".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rate {
    pub value: f64,
    pub insufficient_data: bool,
}

impl Rate {
    /// `numerator / denominator` as a percentage, zero-guarded.
    pub fn percent(numerator: u32, denominator: u32) -> Self {
        if denominator == 0 {
            Self::insufficient()
        } else {
            Self {
                value: f64::from(numerator) / f64::from(denominator) * 100.0,
                insufficient_data: false,
            }
        }
    }

    pub fn insufficient() -> Self {
        Self {
            value: 0.0,
            insufficient_data: true,
        }
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.insufficient_data {
            write!(f, "n/a")
        } else {
            write!(f, "{:.1}%", self.value)
        }
    }
}

/// Classification quality derived from a confusion matrix. All rates in 0-100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AccuracyMetrics {
    pub total_evaluated: u32,
    pub correct: u32,
    pub accuracy: Rate,
    pub precision: Rate,
    pub recall: Rate,
    pub f1: Rate,
    #[serde(flatten)]
    pub matrix: ConfusionMatrix,
}

impl AccuracyMetrics {
    pub fn from_matrix(matrix: ConfusionMatrix) -> Self {
        let precision = Rate::percent(matrix.tp, matrix.tp + matrix.fp);
        let recall = Rate::percent(matrix.tp, matrix.tp + matrix.fn_);
        let denominator = precision.value + recall.value;
        let f1 = if precision.insufficient_data || recall.insufficient_data || denominator <= 0.0 {
            Rate::insufficient()
        } else {
            Rate {
                value: 2.0 * precision.value * recall.value / denominator,
                insufficient_data: false,
            }
        };

        Self {
            total_evaluated: matrix.total(),
            correct: matrix.correct(),
            accuracy: Rate::percent(matrix.correct(), matrix.total()),
            precision,
            recall,
            f1,
            matrix,
        }
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Whether a period had anything to evaluate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataStatus {
    Evaluated,
    NoDataYet,
}

/// Accuracy for one sailing date. Replaced wholesale on recompute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySummary {
    pub summary_date: NaiveDate,
    #[serde(flatten)]
    pub metrics: AccuracyMetrics,
    pub calculated_at: DateTime<Utc>,
}

/// Accuracy of one risk tier on one date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierSummary {
    pub summary_date: NaiveDate,
    pub tier: RiskTier,
    pub predictions_count: u32,
    pub correct_count: u32,
    pub accuracy: Rate,
    pub avg_score: f64,
    pub avg_forecast_wind: f64,
    /// `None` when no outcome in the tier carried a wave forecast
    pub avg_forecast_wave: Option<f64>,
}

/// Accuracy over one forecast-wind band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindBandAccuracy {
    pub label: String,
    pub min_wind: f64,
    pub max_wind: Option<f64>,
    pub total: u32,
    pub correct: u32,
    pub cancelled: u32,
    pub accuracy: Rate,
    pub cancellation_rate: Rate,
}

/// Confusion matrix summed over a date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub status: DataStatus,
    pub days_evaluated: u32,
    pub days_without_data: u32,
    pub metrics: AccuracyMetrics,
}
