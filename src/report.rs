//! Accuracy and calibration reports
//!
//! Structured (serde) reports built from stored summaries, plus plain-text
//! renderings for the operator's terminal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationProposal, ProposalSide};
use crate::evaluation::{range_summary, wind_band_accuracy};
use crate::storage::{ForecastStore, StoreError};
use crate::types::{
    DailySummary, DataStatus, PredictionOutcome, RangeSummary, TierSummary,
    WindBandAccuracy,
};

// ============================================================================
// Accuracy report
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccuracyReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub profile_version: u64,
    pub range: RangeSummary,
    pub daily: Vec<DailySummary>,
    pub tiers: Vec<TierSummary>,
    pub wind_bands: Vec<WindBandAccuracy>,
    /// Individual outcomes, only when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<Vec<PredictionOutcome>>,
}

impl AccuracyReport {
    /// Assemble a report for `start..=end` from what the store already
    /// holds. Nothing is recomputed from predictions here.
    pub fn build(
        store: &ForecastStore,
        start: NaiveDate,
        end: NaiveDate,
        profile_version: u64,
        include_outcomes: bool,
    ) -> Result<Self, StoreError> {
        let daily = store.daily_summaries_in_range(start, end)?;
        let tiers = store.tier_summaries_in_range(start, end)?;
        let outcomes = store.outcomes_in_range(start, end)?;

        Ok(Self {
            start,
            end,
            profile_version,
            range: range_summary(start, end, &daily),
            daily,
            tiers,
            wind_bands: wind_band_accuracy(&outcomes),
            outcomes: include_outcomes.then_some(outcomes),
        })
    }

    pub fn render_text(&self) -> String {
        let mut sections = Vec::new();

        let m = &self.range.metrics;
        let headline = match self.range.status {
            DataStatus::NoDataYet => "No data yet: no sailing in this range has been evaluated.".to_string(),
            DataStatus::Evaluated => format!(
                "{} sailings over {} day(s): accuracy {}, precision {}, recall {}, F1 {}\n\
                 TP {}  TN {}  FP {}  FN {}",
                m.total_evaluated,
                self.range.days_evaluated,
                m.accuracy,
                m.precision,
                m.recall,
                m.f1,
                m.matrix.tp,
                m.matrix.tn,
                m.matrix.fp,
                m.matrix.fn_,
            ),
        };
        sections.push(format!(
            "## Accuracy {} to {} (profile v{})\n\n{}",
            self.start, self.end, self.profile_version, headline
        ));

        if !self.daily.is_empty() {
            let mut lines = vec!["## Daily\n".to_string()];
            for d in &self.daily {
                lines.push(format!(
                    "- {}: {} sailings, accuracy {}, recall {}",
                    d.summary_date, d.metrics.total_evaluated, d.metrics.accuracy, d.metrics.recall
                ));
            }
            sections.push(lines.join("\n"));
        }

        if !self.tiers.is_empty() {
            let mut lines = vec!["## By tier\n".to_string()];
            for t in &self.tiers {
                let wave = t
                    .avg_forecast_wave
                    .map_or_else(|| "n/a".to_string(), |w| format!("{w:.1} m"));
                lines.push(format!(
                    "- {} {}: {}/{} correct ({}), avg score {:.1}, avg wind {:.1} m/s, avg wave {}",
                    t.summary_date,
                    t.tier,
                    t.correct_count,
                    t.predictions_count,
                    t.accuracy,
                    t.avg_score,
                    t.avg_forecast_wind,
                    wave
                ));
            }
            sections.push(lines.join("\n"));
        }

        let bands: Vec<&WindBandAccuracy> = self.wind_bands.iter().filter(|b| b.total > 0).collect();
        if !bands.is_empty() {
            let mut lines = vec!["## By forecast wind\n".to_string()];
            for b in bands {
                lines.push(format!(
                    "- {}: {} sailings, accuracy {}, cancelled {}",
                    b.label, b.total, b.accuracy, b.cancellation_rate
                ));
            }
            sections.push(lines.join("\n"));
        }

        if let Some(outcomes) = &self.outcomes {
            let mut lines = vec!["## Outcomes\n".to_string()];
            for o in outcomes {
                lines.push(format!(
                    "- {} {} {}: {} ({:.0}) vs {} -> {}",
                    o.sailing_date,
                    o.route_id,
                    o.departure_time,
                    o.predicted_tier,
                    o.predicted_score,
                    if o.actual_status.is_empty() { "?" } else { o.actual_status.as_str() },
                    o.classification
                ));
            }
            sections.push(lines.join("\n"));
        }

        sections.join("\n\n")
    }
}

// ============================================================================
// Proposal rendering
// ============================================================================

/// Human-readable proposal: per season, what each side proposes or why it
/// was skipped, then the correlation diagnostics.
pub fn render_proposal(proposal: &CalibrationProposal) -> String {
    let mut sections = vec![format!(
        "## Proposal #{} ({} to {}, base v{} -> v{}){}",
        proposal.id,
        proposal.window_start,
        proposal.window_end,
        proposal.base_version,
        proposal.candidate.version,
        if proposal.applied { " [applied]" } else { "" }
    )];

    for season in &proposal.seasons {
        let mut lines = vec![format!(
            "### {}: {} outcomes, {} FN, {} FP",
            season.season, season.outcomes, season.false_negatives.count, season.false_positives.count
        )];
        for (name, side) in [
            ("cutoff", &season.cutoff_side),
            ("false negatives", &season.fn_side),
            ("false positives", &season.fp_side),
        ] {
            match side {
                ProposalSide::Proposed { changes } => {
                    for c in changes {
                        lines.push(format!(
                            "- {name}: {} {:.1} -> {:.1} ({})",
                            c.parameter, c.from, c.to, c.rationale
                        ));
                    }
                }
                ProposalSide::Skipped { reason } => {
                    lines.push(format!("- {name}: no change ({reason})"));
                }
            }
        }
        sections.push(lines.join("\n"));
    }

    if !proposal.correlations.is_empty() {
        let mut lines = vec!["### Correlations".to_string()];
        for c in &proposal.correlations {
            lines.push(format!(
                "- {} vs {}: r={:.3}, p={:.4}, n={}{}",
                c.x,
                c.y,
                c.r,
                c.p_value,
                c.sample_count,
                if c.significant { " (significant)" } else { "" }
            ));
        }
        sections.push(lines.join("\n"));
    }

    if !proposal.changed() {
        sections.push("No threshold changes proposed.".to_string());
    }
    sections.join("\n\n")
}
