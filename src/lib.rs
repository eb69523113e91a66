//! Sailing Risk: ferry cancellation risk scoring with an accuracy feedback loop
//!
//! ## Architecture
//!
//! - **Scoring**: seasonal threshold profiles turn a forecast snapshot into a
//!   risk score and tier per scheduled sailing
//! - **Evaluation**: predictions are matched to actual operations and
//!   summarized into confusion-matrix accuracy per day, tier and wind band
//! - **Calibration**: misclassification patterns propose versioned threshold
//!   changes that an operator applies explicitly
//! - **Storage**: sled trees keyed by sailing date, with idempotent writes

pub mod acquisition;
pub mod calibration;
pub mod config;
pub mod evaluation;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::RiskConfig;

// Re-export commonly used types
pub use types::{
    ActualOperation, Classification, FeatureSnapshot, Prediction, PredictionOutcome, ProfileSet,
    RiskTier, SailingKey, Season, ThresholdProfile,
};

// Re-export the stage entry points
pub use calibration::{CalibrationProposal, ThresholdCalibrator};
pub use evaluation::ActualOutcomeMatcher;
pub use pipeline::{BatchPipeline, PipelineError};
pub use scoring::RiskScorer;
pub use storage::{ForecastStore, StoreError};
