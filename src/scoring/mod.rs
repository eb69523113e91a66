//! Risk Scorer - seasonal piecewise scoring of forecast weather
//!
//! Converts one forecast snapshot into a risk tier, a 0-100 score and the
//! list of factors that contributed. Pure and deterministic: the same
//! profile set and inputs always give the same assessment.
//!
//! ## Algorithm
//!
//! 1. Season from the sailing month (Dec-Mar winter) selects the profile
//! 2. Wind: highest matching breakpoint only
//! 3. Wave: highest matching breakpoint only, added to wind
//! 4. Visibility: fixed penalty below 1 km, smaller one below 3 km
//! 5. Multiply by the seasonal multiplier, clamp to [0, 100]
//! 6. Classify against the tier cutoffs, HIGH first

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::VisibilityConfig;
use crate::types::{
    highest_match, FeatureSnapshot, ProfileSet, RiskTier, Season, ThresholdProfile,
};

/// Upper bound of the risk score.
pub const MAX_SCORE: f64 = 100.0;

// ============================================================================
// Errors
// ============================================================================

/// A snapshot that cannot be scored. The caller skips it; it is never
/// persisted as a prediction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidFeatureError {
    #[error("{field} is not a finite number ({value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} cannot be negative ({value})")]
    Negative { field: &'static str, value: f64 },

    #[error("target_hour {0} is outside 0-23")]
    HourOutOfRange(u32),
}

// ============================================================================
// Output
// ============================================================================

/// Result of scoring one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub season: Season,
    pub risk_tier: RiskTier,
    /// Final score after multiplier and clamping
    pub risk_score: f64,
    /// Sum of contributions before the seasonal multiplier
    pub raw_score: f64,
    /// Season tag first, then one entry per contributing factor
    pub factors: Vec<String>,
    pub profile_version: u64,
}

// ============================================================================
// Scorer
// ============================================================================

/// Profile-driven risk scorer. Construct once per run with the active
/// profile set.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    profiles: ProfileSet,
    visibility: VisibilityConfig,
}

impl RiskScorer {
    pub fn new(profiles: ProfileSet, visibility: VisibilityConfig) -> Self {
        Self {
            profiles,
            visibility,
        }
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    pub fn profile_for(&self, date: NaiveDate) -> &ThresholdProfile {
        self.profiles.for_season(Season::for_date(date))
    }

    /// Score a forecast snapshot for a sailing on `sailing_date`.
    pub fn score(
        &self,
        snapshot: &FeatureSnapshot,
        sailing_date: NaiveDate,
    ) -> Result<RiskAssessment, InvalidFeatureError> {
        if let Some(hour) = snapshot.target_hour {
            if hour > 23 {
                return Err(InvalidFeatureError::HourOutOfRange(hour));
            }
        }
        if let Some(t) = snapshot.temperature {
            check_finite("temperature", t)?;
        }
        self.score_conditions(
            snapshot.wind_speed,
            snapshot.wave_height,
            snapshot.visibility,
            sailing_date,
        )
    }

    /// Score raw conditions. Missing wave height or visibility contributes
    /// nothing.
    pub fn score_conditions(
        &self,
        wind_speed: f64,
        wave_height: Option<f64>,
        visibility: Option<f64>,
        sailing_date: NaiveDate,
    ) -> Result<RiskAssessment, InvalidFeatureError> {
        check_finite("wind_speed", wind_speed)?;
        if let Some(w) = wave_height {
            check_finite("wave_height", w)?;
            check_non_negative("wave_height", w)?;
        }
        if let Some(v) = visibility {
            check_finite("visibility", v)?;
            check_non_negative("visibility", v)?;
        }

        let season = Season::for_date(sailing_date);
        let profile = self.profiles.for_season(season);

        let mut raw_score = 0.0;
        let mut factors = vec![season.tag().to_string()];

        if let Some(bp) = highest_match(&profile.wind_breakpoints, wind_speed) {
            raw_score += bp.score;
            factors.push(format!("{} ({wind_speed:.1} m/s)", bp.label));
        }

        if let Some(wave) = wave_height {
            if let Some(bp) = highest_match(&profile.wave_breakpoints, wave) {
                raw_score += bp.score;
                factors.push(format!("{} ({wave:.1} m)", bp.label));
            }
        }

        if let Some(vis) = visibility {
            let v = &self.visibility;
            if vis < v.very_poor_below_km {
                raw_score += v.very_poor_penalty;
                factors.push(format!("Very poor visibility ({vis:.1} km)"));
            } else if vis < v.poor_below_km {
                raw_score += v.poor_penalty;
                factors.push(format!("Poor visibility ({vis:.1} km)"));
            }
        }

        let risk_score = (raw_score * profile.seasonal_multiplier).clamp(0.0, MAX_SCORE);
        let risk_tier = profile.tier_cutoffs.classify(risk_score);

        Ok(RiskAssessment {
            season,
            risk_tier,
            risk_score,
            raw_score,
            factors,
            profile_version: self.profiles.version,
        })
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), InvalidFeatureError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InvalidFeatureError::NonFinite { field, value })
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), InvalidFeatureError> {
    if value < 0.0 {
        Err(InvalidFeatureError::Negative { field, value })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn scorer() -> RiskScorer {
        RiskScorer::new(ProfileSet::default(), VisibilityConfig::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_winter_moderate_conditions_are_medium() {
        let a = scorer()
            .score_conditions(12.0, Some(1.8), Some(15.0), date(2026, 2, 16))
            .unwrap();
        // (25 + 10) * 1.2 = 42
        assert!((a.risk_score - 42.0).abs() < 1e-9);
        assert_eq!(a.risk_tier, RiskTier::Medium);
        assert_eq!(a.factors[0], "[WINTER]");
        assert_eq!(a.factors[1], "Moderate-strong wind (12.0 m/s)");
        assert_eq!(a.factors[2], "Moderate waves (1.8 m)");
    }

    #[test]
    fn test_winter_severe_conditions_clamp_to_100() {
        let a = scorer()
            .score_conditions(25.0, Some(3.5), Some(5.0), date(2026, 2, 16))
            .unwrap();
        assert_eq!(a.risk_tier, RiskTier::High);
        assert_eq!(a.risk_score, 100.0);
        assert!((a.raw_score - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_summer_same_conditions_lower_tier() {
        let a = scorer()
            .score_conditions(12.0, Some(1.8), Some(15.0), date(2026, 7, 15))
            .unwrap();
        assert!(a.risk_tier <= RiskTier::Low);
        assert_eq!(a.factors[0], "[SUMMER]");
    }

    #[test]
    fn test_visibility_stacks_with_wind() {
        let s = scorer();
        let clear = s.score_conditions(16.0, None, Some(10.0), date(2026, 8, 1)).unwrap();
        let poor = s.score_conditions(16.0, None, Some(2.0), date(2026, 8, 1)).unwrap();
        let very_poor = s.score_conditions(16.0, None, Some(0.5), date(2026, 8, 1)).unwrap();
        assert!((poor.risk_score - clear.risk_score - 10.0).abs() < 1e-9);
        assert!((very_poor.risk_score - clear.risk_score - 20.0).abs() < 1e-9);
        assert!(very_poor.factors.iter().any(|f| f.starts_with("Very poor visibility")));
    }

    #[test]
    fn test_missing_wave_and_visibility_contribute_nothing() {
        let a = scorer().score_conditions(9.0, None, None, date(2026, 1, 5)).unwrap();
        // 15 * 1.2 = 18 → LOW
        assert!((a.risk_score - 18.0).abs() < 1e-9);
        assert_eq!(a.risk_tier, RiskTier::Low);
        assert_eq!(a.factors.len(), 2);
    }

    #[test]
    fn test_calm_and_negative_wind_is_valid() {
        let a = scorer().score_conditions(-1.0, Some(0.0), None, date(2026, 5, 1)).unwrap();
        assert_eq!(a.risk_score, 0.0);
        assert_eq!(a.risk_tier, RiskTier::Minimal);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let s = scorer();
        let d = date(2026, 2, 16);
        assert!(matches!(
            s.score_conditions(f64::NAN, None, None, d),
            Err(InvalidFeatureError::NonFinite { field: "wind_speed", .. })
        ));
        assert!(matches!(
            s.score_conditions(10.0, Some(-0.5), None, d),
            Err(InvalidFeatureError::Negative { field: "wave_height", .. })
        ));
        assert!(matches!(
            s.score_conditions(10.0, None, Some(f64::INFINITY), d),
            Err(InvalidFeatureError::NonFinite { field: "visibility", .. })
        ));
    }

    #[test]
    fn test_snapshot_hour_out_of_range() {
        let snap = FeatureSnapshot {
            target_date: date(2026, 2, 16),
            target_hour: Some(24),
            location: "wakkanai".to_string(),
            wind_speed: 5.0,
            wave_height: None,
            visibility: None,
            temperature: None,
            generated_at: Utc.with_ymd_and_hms(2026, 2, 15, 6, 0, 0).unwrap(),
        };
        assert_eq!(
            scorer().score(&snap, snap.target_date),
            Err(InvalidFeatureError::HourOutOfRange(24))
        );
    }

    #[test]
    fn test_profile_version_is_reported() {
        let mut set = ProfileSet::default();
        set.version = 3;
        let s = RiskScorer::new(set, VisibilityConfig::default());
        let a = s.score_conditions(5.0, None, None, date(2026, 6, 1)).unwrap();
        assert_eq!(a.profile_version, 3);
    }
}
