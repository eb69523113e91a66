//! Threshold Calibration
//!
//! Inspects a rolling window of classified outcomes and proposes a revised
//! profile set. The calibrator only proposes; applying a proposal is a
//! separate operator action that re-checks it against the active version.
//!
//! ## Per season
//!
//! 1. Cutoff sweep: move the MEDIUM cutoff when F1 improves without losing recall
//! 2. FN side: lower the MEDIUM breakpoints toward the missed conditions
//! 3. FP side: raise the HIGH wind breakpoint, only if 2 moved nothing
//!
//! Each side either proposes concrete changes or records why it did not.

pub mod breakpoints;
pub mod correlation;
pub mod sweep;

pub use breakpoints::CaseStats;
pub use correlation::Correlation;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::validation::validate_profile;
use crate::config::CalibrationConfig;
use crate::types::{Classification, PredictionOutcome, ProfileSet, Season};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("proposal {id} was built on profile version {base_version}, but version {active_version} is active")]
    StaleProposal {
        id: u64,
        base_version: u64,
        active_version: u64,
    },

    #[error("proposal {0} changes nothing")]
    NothingToApply(u64),

    #[error("proposal {id} candidate is invalid: {}", errors.join("; "))]
    InvalidCandidate { id: u64, errors: Vec<String> },
}

// ============================================================================
// Proposal types
// ============================================================================

/// One proposed parameter move.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdChange {
    pub parameter: String,
    pub from: f64,
    pub to: f64,
    pub rationale: String,
}

/// Result of one calibration side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ProposalSide {
    Proposed { changes: Vec<ThresholdChange> },
    Skipped { reason: String },
}

impl ProposalSide {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_proposed(&self) -> bool {
        matches!(self, Self::Proposed { .. })
    }

    pub fn changes(&self) -> &[ThresholdChange] {
        match self {
            Self::Proposed { changes } => changes,
            Self::Skipped { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonProposal {
    pub season: Season,
    pub outcomes: usize,
    pub false_negatives: CaseStats,
    pub false_positives: CaseStats,
    pub cutoff_side: ProposalSide,
    pub fn_side: ProposalSide,
    pub fp_side: ProposalSide,
}

impl SeasonProposal {
    pub fn changed(&self) -> bool {
        self.cutoff_side.is_proposed() || self.fn_side.is_proposed() || self.fp_side.is_proposed()
    }
}

/// A stored calibration run. `candidate` is the full profile set that
/// applying this proposal would activate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationProposal {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub base_version: u64,
    pub seasons: Vec<SeasonProposal>,
    pub correlations: Vec<Correlation>,
    pub candidate: ProfileSet,
    #[serde(default)]
    pub applied: bool,
}

impl CalibrationProposal {
    pub fn changed(&self) -> bool {
        self.seasons.iter().any(SeasonProposal::changed)
    }

    /// Check that this proposal may replace `active_version` and return the
    /// profile set to store.
    pub fn applicable_to(&self, active_version: u64) -> Result<ProfileSet, CalibrationError> {
        if self.base_version != active_version {
            return Err(CalibrationError::StaleProposal {
                id: self.id,
                base_version: self.base_version,
                active_version,
            });
        }
        if !self.changed() {
            return Err(CalibrationError::NothingToApply(self.id));
        }

        let mut errors = validate_profile(&self.candidate.winter, Season::Winter);
        errors.extend(validate_profile(&self.candidate.summer, Season::Summer));
        if !errors.is_empty() {
            return Err(CalibrationError::InvalidCandidate { id: self.id, errors });
        }

        Ok(self.candidate.clone())
    }
}

// ============================================================================
// Calibrator
// ============================================================================

#[derive(Debug, Clone)]
pub struct ThresholdCalibrator {
    config: CalibrationConfig,
}

impl ThresholdCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Window of `window_days` ending on `end`, inclusive.
    pub fn window_ending(&self, end: NaiveDate) -> (NaiveDate, NaiveDate) {
        let span = i64::from(self.config.window_days.saturating_sub(1));
        let start = end
            .checked_sub_signed(chrono::Duration::days(span))
            .unwrap_or(NaiveDate::MIN);
        (start, end)
    }

    /// Build a proposal from `outcomes` against the active `base` profiles.
    ///
    /// Empty windows and empty FN/FP sets produce skipped sides, never an
    /// error.
    pub fn propose(
        &self,
        id: u64,
        window: (NaiveDate, NaiveDate),
        base: &ProfileSet,
        outcomes: &[PredictionOutcome],
        created_at: DateTime<Utc>,
    ) -> CalibrationProposal {
        let (window_start, window_end) = window;
        let in_window: Vec<&PredictionOutcome> = outcomes
            .iter()
            .filter(|o| o.sailing_date >= window_start && o.sailing_date <= window_end)
            .collect();

        let mut candidate = base.clone();
        candidate.version = base.version + 1;

        let seasons = [Season::Winter, Season::Summer]
            .into_iter()
            .map(|season| {
                let rows: Vec<&PredictionOutcome> = in_window
                    .iter()
                    .copied()
                    .filter(|o| Season::for_date(o.sailing_date) == season)
                    .collect();
                self.propose_season(season, &rows, candidate.for_season_mut(season))
            })
            .collect::<Vec<_>>();

        let window_rows: Vec<PredictionOutcome> = in_window.into_iter().cloned().collect();
        let proposal = CalibrationProposal {
            id,
            created_at,
            window_start,
            window_end,
            base_version: base.version,
            seasons,
            correlations: correlation::window_diagnostics(&window_rows),
            candidate,
            applied: false,
        };

        tracing::info!(
            id,
            base_version = proposal.base_version,
            changed = proposal.changed(),
            outcomes = window_rows.len(),
            "Calibration proposal built"
        );
        proposal
    }

    fn propose_season(
        &self,
        season: Season,
        rows: &[&PredictionOutcome],
        profile: &mut crate::types::ThresholdProfile,
    ) -> SeasonProposal {
        let of_class = |c: Classification| -> Vec<&PredictionOutcome> {
            rows.iter().copied().filter(|o| o.classification == c).collect()
        };
        let false_negatives = CaseStats::from_outcomes(&of_class(Classification::FalseNegative));
        let false_positives = CaseStats::from_outcomes(&of_class(Classification::FalsePositive));

        let cutoff_side = guarded(profile, season, |p| sweep::cutoff_side(p, rows, &self.config));
        let fn_side = guarded(profile, season, |p| breakpoints::fn_side(p, &false_negatives, &self.config));
        let fn_moved = fn_side.is_proposed();
        let fp_side = guarded(profile, season, |p| {
            breakpoints::fp_side(p, &false_positives, &self.config, fn_moved)
        });

        for (name, side) in [("cutoff", &cutoff_side), ("fn", &fn_side), ("fp", &fp_side)] {
            match side {
                ProposalSide::Proposed { changes } => {
                    for c in changes {
                        tracing::info!(%season, side = name, parameter = %c.parameter, from = c.from, to = c.to, "Threshold change proposed");
                    }
                }
                ProposalSide::Skipped { reason } => {
                    tracing::debug!(%season, side = name, reason = %reason, "Calibration side skipped");
                }
            }
        }

        SeasonProposal {
            season,
            outcomes: rows.len(),
            false_negatives,
            false_positives,
            cutoff_side,
            fn_side,
            fp_side,
        }
    }
}

/// Run one side on a scratch copy and keep its changes only if the result
/// still validates.
fn guarded<F>(profile: &mut crate::types::ThresholdProfile, season: Season, side: F) -> ProposalSide
where
    F: FnOnce(&mut crate::types::ThresholdProfile) -> ProposalSide,
{
    let mut scratch = profile.clone();
    let result = side(&mut scratch);
    if !result.is_proposed() {
        return result;
    }

    let errors = validate_profile(&scratch, season);
    if errors.is_empty() {
        *profile = scratch;
        result
    } else {
        ProposalSide::skipped(format!("change would invalidate the profile: {}", errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DepartureTime, RiskTier};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn fn_case(date: NaiveDate, wind: f64) -> PredictionOutcome {
        PredictionOutcome {
            sailing_date: date,
            route_id: "wakkanai-rishiri".to_string(),
            departure_time: DepartureTime::parse("08:00").unwrap(),
            predicted_tier: RiskTier::Low,
            predicted_score: 30.0,
            actual_status: "CANCELLED".to_string(),
            classification: Classification::FalseNegative,
            forecast_wind: wind,
            forecast_wave: None,
            forecast_visibility: None,
        }
    }

    #[test]
    fn test_twenty_false_negatives_at_14ms_propose_12ms_medium() {
        let outcomes: Vec<PredictionOutcome> = (0..20)
            .map(|i| fn_case(d(2, 1 + i % 14), if i % 2 == 0 { 13.0 } else { 15.0 }))
            .collect();
        let calibrator = ThresholdCalibrator::new(CalibrationConfig::default());
        let proposal = calibrator.propose(1, (d(2, 1), d(2, 14)), &ProfileSet::default(), &outcomes, Utc::now());

        let winter = &proposal.seasons[0];
        assert_eq!(winter.season, Season::Winter);
        assert_eq!(winter.false_negatives.count, 20);
        assert!(winter.fn_side.is_proposed());
        assert!(!winter.fp_side.is_proposed());

        let idx = proposal.candidate.winter.medium_wind_index().unwrap();
        let threshold = proposal.candidate.winter.wind_breakpoints[idx].threshold;
        assert!((threshold - 12.0).abs() < 1e-9);
        assert_eq!(proposal.candidate.version, 1);
        assert_eq!(proposal.candidate.summer, ProfileSet::default().summer);
    }

    #[test]
    fn test_empty_window_proposes_nothing() {
        let calibrator = ThresholdCalibrator::new(CalibrationConfig::default());
        let proposal = calibrator.propose(1, (d(2, 1), d(2, 14)), &ProfileSet::default(), &[], Utc::now());
        assert!(!proposal.changed());
        assert!(proposal.correlations.is_empty());
        assert_eq!(
            proposal.applicable_to(0),
            Err(CalibrationError::NothingToApply(1))
        );
    }

    #[test]
    fn test_outcomes_outside_window_ignored() {
        let outcomes = vec![fn_case(d(1, 1), 14.0)];
        let calibrator = ThresholdCalibrator::new(CalibrationConfig::default());
        let proposal = calibrator.propose(1, (d(2, 1), d(2, 14)), &ProfileSet::default(), &outcomes, Utc::now());
        assert!(!proposal.changed());
    }

    #[test]
    fn test_stale_proposal_rejected() {
        let outcomes = vec![fn_case(d(2, 3), 14.0)];
        let calibrator = ThresholdCalibrator::new(CalibrationConfig::default());
        let proposal = calibrator.propose(4, (d(2, 1), d(2, 14)), &ProfileSet::default(), &outcomes, Utc::now());

        assert!(proposal.applicable_to(0).is_ok());
        assert!(matches!(
            proposal.applicable_to(1),
            Err(CalibrationError::StaleProposal { id: 4, base_version: 0, active_version: 1 })
        ));
    }

    #[test]
    fn test_window_ending() {
        let calibrator = ThresholdCalibrator::new(CalibrationConfig::default());
        assert_eq!(calibrator.window_ending(d(2, 14)), (d(2, 1), d(2, 14)));
    }
}
