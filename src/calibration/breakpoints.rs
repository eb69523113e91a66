//! Breakpoint adjustments driven by misclassification clusters
//!
//! False negatives pull the MEDIUM breakpoints down toward the conditions
//! that were missed. False positives may push the HIGH wind breakpoint up,
//! but only while the sailings it releases still score MEDIUM.

use serde::{Deserialize, Serialize};

use super::{ProposalSide, ThresholdChange};
use crate::config::CalibrationConfig;
use crate::types::{Breakpoint, PredictionOutcome, ThresholdProfile};

/// Mean forecast conditions over one class of misclassified sailings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CaseStats {
    pub count: usize,
    pub mean_wind: Option<f64>,
    /// Over cases that carried a wave forecast
    pub mean_wave: Option<f64>,
}

impl CaseStats {
    pub fn from_outcomes(cases: &[&PredictionOutcome]) -> Self {
        let winds: Vec<f64> = cases.iter().map(|o| o.forecast_wind).collect();
        let waves: Vec<f64> = cases.iter().filter_map(|o| o.forecast_wave).collect();
        Self {
            count: cases.len(),
            mean_wind: mean(&winds),
            mean_wave: mean(&waves),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = values.len() as f64;
        Some(values.iter().sum::<f64>() / n)
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Move `bps[idx]` down to `target`, dropping lower breakpoints that the
/// move overtakes. Those carry lower scores, so no reading scores less
/// than before. Returns the dropped labels.
fn lower_breakpoint(bps: &mut Vec<Breakpoint>, idx: usize, target: f64) -> Vec<String> {
    let mut absorbed = Vec::new();
    let mut kept = Vec::with_capacity(bps.len());

    for (i, mut bp) in bps.drain(..).enumerate() {
        if i == idx {
            bp.threshold = target;
            kept.push(bp);
        } else if i < idx && bp.threshold >= target {
            absorbed.push(bp.label);
        } else {
            kept.push(bp);
        }
    }

    *bps = kept;
    absorbed
}

/// Lower one MEDIUM breakpoint list toward the FN cluster. `None` when the
/// cluster is already covered or no breakpoint reaches MEDIUM.
fn lower_medium(
    profile: &mut ThresholdProfile,
    axis: Axis,
    mean_value: f64,
    margin: f64,
) -> Result<Option<ThresholdChange>, String> {
    let cutoff = profile.tier_cutoffs.medium;
    let multiplier = profile.seasonal_multiplier;
    let bps = axis.breakpoints_mut(profile);

    let Some(idx) = bps.iter().position(|bp| bp.score * multiplier >= cutoff) else {
        return Err(format!("no {} breakpoint reaches MEDIUM on its own", axis.name()));
    };

    let current = bps[idx].threshold;
    let target = round1((mean_value - margin).max(0.0));
    if target >= current {
        return Ok(None);
    }

    let label = bps[idx].label.clone();
    let absorbed = lower_breakpoint(bps, idx, target);

    let mut rationale = format!(
        "mean FN {} {mean_value:.1} {unit} minus {margin:.1} {unit} margin",
        axis.name(),
        unit = axis.unit(),
    );
    if !absorbed.is_empty() {
        rationale.push_str(&format!("; absorbs {}", absorbed.join(", ")));
    }

    Ok(Some(ThresholdChange {
        parameter: format!("{}_breakpoints[{label}]", axis.name()),
        from: current,
        to: target,
        rationale,
    }))
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Wind,
    Wave,
}

impl Axis {
    fn name(self) -> &'static str {
        match self {
            Self::Wind => "wind",
            Self::Wave => "wave",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Self::Wind => "m/s",
            Self::Wave => "m",
        }
    }

    fn breakpoints_mut(self, profile: &mut ThresholdProfile) -> &mut Vec<Breakpoint> {
        match self {
            Self::Wind => &mut profile.wind_breakpoints,
            Self::Wave => &mut profile.wave_breakpoints,
        }
    }
}

/// FN side: lower the MEDIUM wind (and wave) breakpoints so the missed
/// conditions score at least MEDIUM next time. Never raises anything.
pub fn fn_side(profile: &mut ThresholdProfile, stats: &CaseStats, config: &CalibrationConfig) -> ProposalSide {
    if stats.count == 0 {
        return ProposalSide::skipped("no false negatives in window");
    }
    if stats.count < config.min_cases {
        return ProposalSide::skipped(format!(
            "{} false negatives, need {}",
            stats.count, config.min_cases
        ));
    }

    let mut changes = Vec::new();
    let mut notes = Vec::new();

    if let Some(wind) = stats.mean_wind {
        match lower_medium(profile, Axis::Wind, wind, config.wind_margin_ms) {
            Ok(Some(change)) => changes.push(change),
            Ok(None) => notes.push(format!("mean FN wind {wind:.1} m/s already covered")),
            Err(reason) => notes.push(reason),
        }
    }
    if let Some(wave) = stats.mean_wave {
        match lower_medium(profile, Axis::Wave, wave, config.wave_margin_m) {
            Ok(Some(change)) => changes.push(change),
            Ok(None) => notes.push(format!("mean FN wave {wave:.1} m already covered")),
            Err(reason) => notes.push(reason),
        }
    }

    if changes.is_empty() {
        ProposalSide::skipped(notes.join("; "))
    } else {
        ProposalSide::Proposed { changes }
    }
}

/// FP side: raise the HIGH wind breakpoint when over-warnings cluster
/// around it. Rejected outright when the FN side moved anything in the
/// same run, or when the released sailings would fall below MEDIUM.
pub fn fp_side(
    profile: &mut ThresholdProfile,
    stats: &CaseStats,
    config: &CalibrationConfig,
    fn_side_moved: bool,
) -> ProposalSide {
    if stats.count == 0 {
        return ProposalSide::skipped("no false positives in window");
    }
    if fn_side_moved {
        return ProposalSide::skipped(
            "false negatives lowered thresholds in this run; sensitivity is not reduced alongside",
        );
    }
    if stats.count < config.min_cases {
        return ProposalSide::skipped(format!(
            "{} false positives, need {}",
            stats.count, config.min_cases
        ));
    }
    let Some(mean_wind) = stats.mean_wind else {
        return ProposalSide::skipped("no wind data on false positives");
    };
    let Some(idx) = profile.high_wind_index() else {
        return ProposalSide::skipped("no wind breakpoint reaches HIGH on its own");
    };

    let bps = &profile.wind_breakpoints;
    let current = bps[idx].threshold;
    if (mean_wind - current).abs() > config.fp_cluster_band_ms {
        return ProposalSide::skipped(format!(
            "mean FP wind {mean_wind:.1} m/s is not within {:.1} m/s of the HIGH breakpoint {current:.1} m/s",
            config.fp_cluster_band_ms
        ));
    }

    let mut target = round1(mean_wind + config.fp_raise_margin_ms);
    if let Some(next) = bps.get(idx + 1) {
        if target >= next.threshold {
            target = round1((current + next.threshold) / 2.0);
        }
    }
    if target <= current || bps.get(idx + 1).is_some_and(|next| target >= next.threshold) {
        return ProposalSide::skipped(format!(
            "no room to raise the HIGH breakpoint {current:.1} m/s (target {target:.1} m/s)"
        ));
    }

    let fallback_reaches_medium = idx
        .checked_sub(1)
        .and_then(|i| bps.get(i))
        .is_some_and(|bp| bp.score * profile.seasonal_multiplier >= profile.tier_cutoffs.medium);
    if !fallback_reaches_medium {
        return ProposalSide::skipped(format!(
            "raising HIGH to {target:.1} m/s would drop {current:.1}-{target:.1} m/s sailings below MEDIUM"
        ));
    }

    let label = bps[idx].label.clone();
    profile.wind_breakpoints[idx].threshold = target;

    let wave_note = stats
        .mean_wave
        .map(|w| format!(", mean FP wave {w:.1} m"))
        .unwrap_or_default();
    ProposalSide::Proposed {
        changes: vec![ThresholdChange {
            parameter: format!("wind_breakpoints[{label}]"),
            from: current,
            to: target,
            rationale: format!(
                "{} false positives cluster at {mean_wind:.1} m/s{wave_note}; released sailings still score MEDIUM",
                stats.count
            ),
        }],
    }
}
