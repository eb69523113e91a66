//! Seasonal threshold profiles: breakpoints, tier cutoffs, seasonal multiplier

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::RiskTier;

/// Months (1-based) treated as winter for threshold selection.
pub const WINTER_MONTHS: [u32; 4] = [12, 1, 2, 3];

// ============================================================================
// Season
// ============================================================================

/// Scoring season, selected from the sailing month.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Winter,
    Summer,
}

impl Season {
    /// Season for a sailing date: WINTER in Dec-Mar, SUMMER otherwise.
    pub fn for_date(date: NaiveDate) -> Self {
        Self::for_month(date.month())
    }

    pub fn for_month(month: u32) -> Self {
        if WINTER_MONTHS.contains(&month) {
            Season::Winter
        } else {
            Season::Summer
        }
    }

    /// Tag prepended to the factor list of every scored prediction.
    pub fn tag(&self) -> &'static str {
        match self {
            Season::Winter => "[WINTER]",
            Season::Summer => "[SUMMER]",
        }
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Season::Winter => write!(f, "WINTER"),
            Season::Summer => write!(f, "SUMMER"),
        }
    }
}

// ============================================================================
// Breakpoints
// ============================================================================

/// One step of the piecewise scoring function.
///
/// Wind breakpoints are written with `speed` (m/s), wave breakpoints with
/// `height` (m); both deserialize into `threshold`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Breakpoint {
    #[serde(alias = "speed", alias = "height")]
    pub threshold: f64,
    pub score: f64,
    pub label: String,
}

impl Breakpoint {
    pub fn new(threshold: f64, score: f64, label: &str) -> Self {
        Self {
            threshold,
            score,
            label: label.to_string(),
        }
    }
}

/// Highest breakpoint whose threshold `value` meets or exceeds.
///
/// Breakpoints are expected in ascending threshold order; the walk runs from
/// the top down so only the single highest match contributes.
pub fn highest_match(breakpoints: &[Breakpoint], value: f64) -> Option<&Breakpoint> {
    breakpoints.iter().rev().find(|bp| value >= bp.threshold)
}

// ============================================================================
// Tier Cutoffs
// ============================================================================

/// Score cutoffs for tier classification, evaluated HIGH first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TierCutoffs {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for TierCutoffs {
    fn default() -> Self {
        Self {
            high: 60.0,
            medium: 35.0,
            low: 15.0,
        }
    }
}

impl TierCutoffs {
    pub fn classify(&self, score: f64) -> RiskTier {
        if score >= self.high {
            RiskTier::High
        } else if score >= self.medium {
            RiskTier::Medium
        } else if score >= self.low {
            RiskTier::Low
        } else {
            RiskTier::Minimal
        }
    }

    /// Cutoff a tier starts at. MINIMAL starts at zero.
    pub fn cutoff_for(&self, tier: RiskTier) -> f64 {
        match tier {
            RiskTier::High => self.high,
            RiskTier::Medium => self.medium,
            RiskTier::Low => self.low,
            RiskTier::Minimal => 0.0,
        }
    }
}

// ============================================================================
// Threshold Profile
// ============================================================================

/// Complete scoring configuration for one season.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdProfile {
    pub season: Season,
    pub wind_breakpoints: Vec<Breakpoint>,
    pub wave_breakpoints: Vec<Breakpoint>,
    #[serde(default)]
    pub tier_cutoffs: TierCutoffs,
    pub seasonal_multiplier: f64,
}

impl ThresholdProfile {
    /// Built-in winter profile: lower wind/wave thresholds, 1.2x multiplier.
    pub fn default_winter() -> Self {
        Self {
            season: Season::Winter,
            wind_breakpoints: vec![
                Breakpoint::new(8.0, 15.0, "Moderate wind"),
                Breakpoint::new(12.0, 25.0, "Moderate-strong wind"),
                Breakpoint::new(15.0, 35.0, "Strong wind"),
                Breakpoint::new(20.0, 50.0, "Very strong wind"),
                Breakpoint::new(25.0, 60.0, "Very dangerous wind"),
                Breakpoint::new(30.0, 70.0, "Extreme wind"),
            ],
            wave_breakpoints: vec![
                Breakpoint::new(1.5, 10.0, "Moderate waves"),
                Breakpoint::new(2.0, 20.0, "Moderate-high waves"),
                Breakpoint::new(3.0, 35.0, "High waves"),
                Breakpoint::new(4.0, 45.0, "Very high waves"),
            ],
            tier_cutoffs: TierCutoffs::default(),
            seasonal_multiplier: 1.2,
        }
    }

    /// Built-in summer profile: standard thresholds, no multiplier.
    pub fn default_summer() -> Self {
        Self {
            season: Season::Summer,
            wind_breakpoints: vec![
                Breakpoint::new(10.0, 10.0, "Light wind"),
                Breakpoint::new(15.0, 20.0, "Moderate wind"),
                Breakpoint::new(20.0, 35.0, "Strong wind"),
                Breakpoint::new(25.0, 50.0, "Very strong wind"),
                Breakpoint::new(30.0, 60.0, "Very dangerous wind"),
                Breakpoint::new(35.0, 70.0, "Extreme wind"),
            ],
            wave_breakpoints: vec![
                Breakpoint::new(2.0, 15.0, "Moderate waves"),
                Breakpoint::new(3.0, 30.0, "High waves"),
                Breakpoint::new(4.0, 40.0, "Very high waves"),
            ],
            tier_cutoffs: TierCutoffs::default(),
            seasonal_multiplier: 1.0,
        }
    }

    /// Sort both breakpoint lists ascending by threshold.
    pub fn normalize(&mut self) {
        self.wind_breakpoints
            .sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
        self.wave_breakpoints
            .sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
    }

    /// Index of the lowest breakpoint that reaches `cutoff` on its own once
    /// the seasonal multiplier is applied.
    pub fn lowest_reaching(&self, breakpoints: &[Breakpoint], cutoff: f64) -> Option<usize> {
        breakpoints
            .iter()
            .position(|bp| bp.score * self.seasonal_multiplier >= cutoff)
    }

    /// The wind breakpoint that alone lifts a sailing to MEDIUM.
    pub fn medium_wind_index(&self) -> Option<usize> {
        self.lowest_reaching(&self.wind_breakpoints, self.tier_cutoffs.medium)
    }

    /// The wind breakpoint that alone lifts a sailing to HIGH.
    pub fn high_wind_index(&self) -> Option<usize> {
        self.lowest_reaching(&self.wind_breakpoints, self.tier_cutoffs.high)
    }

    /// The wave breakpoint that alone lifts a sailing to MEDIUM.
    pub fn medium_wave_index(&self) -> Option<usize> {
        self.lowest_reaching(&self.wave_breakpoints, self.tier_cutoffs.medium)
    }
}

/// The pair of seasonal profiles the scorer runs with, tagged by version.
///
/// Version 0 is the configured baseline; each applied calibration proposal
/// bumps the version by one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileSet {
    pub version: u64,
    pub winter: ThresholdProfile,
    pub summer: ThresholdProfile,
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self {
            version: 0,
            winter: ThresholdProfile::default_winter(),
            summer: ThresholdProfile::default_summer(),
        }
    }
}

impl ProfileSet {
    pub fn for_season(&self, season: Season) -> &ThresholdProfile {
        match season {
            Season::Winter => &self.winter,
            Season::Summer => &self.summer,
        }
    }

    pub fn for_season_mut(&mut self, season: Season) -> &mut ThresholdProfile {
        match season {
            Season::Winter => &mut self.winter,
            Season::Summer => &mut self.summer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_for_month() {
        for m in [12, 1, 2, 3] {
            assert_eq!(Season::for_month(m), Season::Winter);
        }
        for m in 4..=11 {
            assert_eq!(Season::for_month(m), Season::Summer);
        }
    }

    #[test]
    fn test_highest_match_no_stacking() {
        let profile = ThresholdProfile::default_winter();
        let bp = highest_match(&profile.wind_breakpoints, 21.0).unwrap();
        assert_eq!(bp.threshold, 20.0);
        assert!(highest_match(&profile.wind_breakpoints, 3.0).is_none());
    }

    #[test]
    fn test_classify_boundaries() {
        let c = TierCutoffs::default();
        assert_eq!(c.classify(60.0), RiskTier::High);
        assert_eq!(c.classify(59.9), RiskTier::Medium);
        assert_eq!(c.classify(35.0), RiskTier::Medium);
        assert_eq!(c.classify(15.0), RiskTier::Low);
        assert_eq!(c.classify(14.9), RiskTier::Minimal);
    }

    #[test]
    fn test_medium_and_high_wind_breakpoints() {
        let winter = ThresholdProfile::default_winter();
        // 35 * 1.2 = 42 >= 35; 25 * 1.2 = 30 < 35
        assert_eq!(winter.wind_breakpoints[winter.medium_wind_index().unwrap()].threshold, 15.0);
        // 50 * 1.2 = 60 >= 60
        assert_eq!(winter.wind_breakpoints[winter.high_wind_index().unwrap()].threshold, 20.0);

        let summer = ThresholdProfile::default_summer();
        assert_eq!(summer.wind_breakpoints[summer.medium_wind_index().unwrap()].threshold, 20.0);
        assert_eq!(summer.wind_breakpoints[summer.high_wind_index().unwrap()].threshold, 30.0);
    }

    #[test]
    fn test_breakpoint_aliases_deserialize() {
        let bp: Breakpoint = toml::from_str("speed = 12.0\nscore = 25.0\nlabel = \"x\"").unwrap();
        assert_eq!(bp.threshold, 12.0);
        let bp: Breakpoint = toml::from_str("height = 1.5\nscore = 10.0\nlabel = \"y\"").unwrap();
        assert_eq!(bp.threshold, 1.5);
    }
}
