//! Tier-cutoff sweep
//!
//! Replays the window's predicted scores against a range of candidate
//! cancel-cutoffs and proposes moving the MEDIUM cutoff to the one with the
//! best F1, as long as recall does not drop.

use serde::{Deserialize, Serialize};

use super::{ProposalSide, ThresholdChange};
use crate::config::CalibrationConfig;
use crate::types::{AccuracyMetrics, ConfusionMatrix, PredictionOutcome, ThresholdProfile, TierCutoffs};

/// Metrics obtained when sailings scoring at or above `cutoff` are treated
/// as predicted cancellations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SweepPoint {
    pub cutoff: f64,
    /// F1 in percent, 0 when undefined
    pub f1: f64,
    /// Recall in percent, 0 when undefined
    pub recall: f64,
}

fn evaluate_cutoff(outcomes: &[&PredictionOutcome], cutoff: f64) -> SweepPoint {
    let mut matrix = ConfusionMatrix::default();
    for o in outcomes {
        let predicted_cancel = o.predicted_score >= cutoff;
        match (predicted_cancel, o.actually_cancelled()) {
            (true, true) => matrix.tp += 1,
            (false, false) => matrix.tn += 1,
            (true, false) => matrix.fp += 1,
            (false, true) => matrix.fn_ += 1,
        }
    }
    let metrics = AccuracyMetrics::from_matrix(matrix);
    SweepPoint {
        cutoff,
        f1: metrics.f1.value,
        recall: metrics.recall.value,
    }
}

/// Every candidate cutoff from `sweep_start` to `sweep_end` inclusive.
pub fn sweep(outcomes: &[&PredictionOutcome], config: &CalibrationConfig) -> Vec<SweepPoint> {
    let mut points = Vec::new();
    let mut cutoff = config.sweep_start;
    // Half a step of slack so float accumulation cannot skip the end point.
    while cutoff <= config.sweep_end + config.sweep_step / 2.0 {
        points.push(evaluate_cutoff(outcomes, cutoff.min(config.sweep_end)));
        cutoff += config.sweep_step;
    }
    points
}

/// Scale HIGH and LOW with the MEDIUM move, keeping `0 < low < medium < high <= 100`.
fn rescaled(cutoffs: &TierCutoffs, new_medium: f64) -> Option<TierCutoffs> {
    let ratio = new_medium / cutoffs.medium;
    let high = (cutoffs.high * ratio).min(100.0).round();
    let low = (cutoffs.low * ratio).round();

    let candidate = TierCutoffs {
        high,
        medium: new_medium,
        low,
    };
    (low > 0.0 && low < new_medium && new_medium < high && high <= 100.0).then_some(candidate)
}

/// Cutoff side for one season. Mutates `profile.tier_cutoffs` only when
/// it proposes.
pub fn cutoff_side(
    profile: &mut ThresholdProfile,
    outcomes: &[&PredictionOutcome],
    config: &CalibrationConfig,
) -> ProposalSide {
    if outcomes.len() < config.sweep_min_data_points {
        return ProposalSide::skipped(format!(
            "{} evaluated sailings, need {}",
            outcomes.len(),
            config.sweep_min_data_points
        ));
    }
    let cancelled = outcomes.iter().filter(|o| o.actually_cancelled()).count();
    if cancelled == 0 || cancelled == outcomes.len() {
        return ProposalSide::skipped("window holds only one class of outcome");
    }

    let current = evaluate_cutoff(outcomes, profile.tier_cutoffs.medium);
    let points = sweep(outcomes, config);

    // Highest F1; ties go to the lower, more sensitive cutoff.
    let Some(best) = points.iter().copied().reduce(|best, p| if p.f1 > best.f1 { p } else { best }) else {
        return ProposalSide::skipped("empty sweep range");
    };

    let gain = best.f1 - current.f1;
    if (best.cutoff - current.cutoff).abs() < f64::EPSILON || gain < config.sweep_min_f1_improvement {
        return ProposalSide::skipped(format!(
            "best cutoff {:.0} gains {gain:.1} F1 points over {:.0}, need {:.1}",
            best.cutoff, current.cutoff, config.sweep_min_f1_improvement
        ));
    }
    if best.recall < current.recall {
        return ProposalSide::skipped(format!(
            "cutoff {:.0} improves F1 to {:.1} but lowers recall {:.1} -> {:.1}",
            best.cutoff, best.f1, current.recall, best.recall
        ));
    }

    let before = profile.tier_cutoffs;
    let Some(after) = rescaled(&before, best.cutoff) else {
        return ProposalSide::skipped(format!(
            "cutoff {:.0} leaves no room for ordered HIGH/LOW cutoffs",
            best.cutoff
        ));
    };
    profile.tier_cutoffs = after;

    let rationale = format!(
        "F1 {:.1} -> {:.1}, recall {:.1} -> {:.1} over {} sailings",
        current.f1,
        best.f1,
        current.recall,
        best.recall,
        outcomes.len()
    );
    let mut changes = vec![ThresholdChange {
        parameter: "tier_cutoffs.medium".to_string(),
        from: before.medium,
        to: after.medium,
        rationale,
    }];
    for (name, from, to) in [("tier_cutoffs.high", before.high, after.high), ("tier_cutoffs.low", before.low, after.low)] {
        if (from - to).abs() > f64::EPSILON {
            changes.push(ThresholdChange {
                parameter: name.to_string(),
                from,
                to,
                rationale: "scaled with MEDIUM".to_string(),
            });
        }
    }
    ProposalSide::Proposed { changes }
}
