//! Prediction-side types: RiskTier, SailingKey, Prediction

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::DepartureTime;

/// Ordinal cancellation-likelihood classification: MINIMAL < LOW < MEDIUM < HIGH.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Minimal,
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [
        RiskTier::Minimal,
        RiskTier::Low,
        RiskTier::Medium,
        RiskTier::High,
    ];

    /// HIGH and MEDIUM predict a cancellation; LOW and MINIMAL predict operation.
    pub fn implies_cancellation(&self) -> bool {
        matches!(self, RiskTier::High | RiskTier::Medium)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Minimal => "MINIMAL",
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one sailing: (date, route, departure).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SailingKey {
    pub sailing_date: NaiveDate,
    pub route_id: String,
    pub departure_time: DepartureTime,
}

impl SailingKey {
    pub fn new(sailing_date: NaiveDate, route_id: impl Into<String>, departure_time: DepartureTime) -> Self {
        Self {
            sailing_date,
            route_id: route_id.into(),
            departure_time,
        }
    }

    /// Storage key: `{date}/{route}/{HH:MM}`. Sorts by date first.
    pub fn storage_key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.sailing_date, self.route_id, self.departure_time
        )
    }
}

impl std::fmt::Display for SailingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.sailing_date, self.route_id, self.departure_time)
    }
}

/// Stored risk forecast for one sailing.
///
/// Exactly one row exists per `SailingKey`; a row with a later
/// `generated_at` replaces the earlier one entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub sailing_date: NaiveDate,
    pub route_id: String,
    pub departure_time: DepartureTime,
    pub risk_tier: RiskTier,
    /// Clamped to 0-100
    pub risk_score: f64,
    /// Season tag first, then one entry per contributing factor
    pub contributing_factors: Vec<String>,
    pub forecast_wind: f64,
    pub forecast_wave: Option<f64>,
    pub forecast_visibility: Option<f64>,
    /// Issue time of the forecast the prediction was scored from
    pub generated_at: DateTime<Utc>,
    /// Profile set version used for scoring
    #[serde(default)]
    pub profile_version: u64,
}

impl Prediction {
    pub fn key(&self) -> SailingKey {
        SailingKey::new(self.sailing_date, self.route_id.clone(), self.departure_time)
    }
}
