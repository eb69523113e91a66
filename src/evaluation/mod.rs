//! Prediction Evaluation
//!
//! Closes the feedback loop once actual operations arrive:
//!
//! ```text
//! predictions ─┐
//!              ├─► ActualOutcomeMatcher ──► PredictionOutcome ──► aggregator ──► DailySummary
//! operations ──┘     (route canonicalization)                                    TierSummary
//! ```

pub mod aggregator;
pub mod matcher;

pub use aggregator::{range_summary, summarize_day, wind_band_accuracy, DayEvaluation};
pub use matcher::{
    ActualOutcomeMatcher, MatchReport, RouteCanonicalizer, RouteNameMismatch, RouteSource,
    UnmatchedPrediction,
};
