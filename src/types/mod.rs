//! Shared data structures for the sailing risk pipeline
//!
//! - Forecast input: FeatureSnapshot, SailingSchedule
//! - Scoring output: RiskTier, Prediction
//! - Collector input: ActualOperation
//! - Evaluation: PredictionOutcome, confusion matrix, summaries
//! - Configuration data: ThresholdProfile and its parts

mod forecast;
mod prediction;
mod operation;
mod accuracy;
pub mod thresholds;

pub use forecast::*;
pub use prediction::*;
pub use operation::*;
pub use accuracy::*;
pub use thresholds::*;
