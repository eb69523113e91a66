//! Risk Configuration Module
//!
//! Seasonal threshold profiles, route canonicalization, the sailing
//! timetable and calibration tuning, loaded from one TOML file.
//!
//! ## Loading Order
//!
//! 1. `SAILING_RISK_CONFIG` environment variable (path to TOML file)
//! 2. `sailing_risk.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The loaded config is passed explicitly to each component:
//!
//! ```ignore
//! let config = RiskConfig::load()?;
//! let scorer = RiskScorer::new(config.profile_set(), config.visibility.clone());
//! ```

mod risk_config;
pub mod defaults;
pub mod validation;

pub use risk_config::*;
