//! Config validation: unknown-key detection with Levenshtein suggestions,
//! profile consistency and route-table checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::RouteConfig;
use crate::types::{Breakpoint, Season, ThresholdProfile};

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Tables whose keys are user data rather than field names.
const FREE_FORM_TABLES: &[&str] = &["routes.aliases"];

/// Returns the complete set of valid dotted key paths for RiskConfig.
///
/// Maintained by hand to match the struct hierarchy in risk_config.rs.
/// Arrays of tables (`schedule`, breakpoint lists) are not walked.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [store]
        "store",
        "store.data_dir",
        // [profiles]
        "profiles",
        "profiles.winter",
        "profiles.winter.season",
        "profiles.winter.wind_breakpoints",
        "profiles.winter.wave_breakpoints",
        "profiles.winter.seasonal_multiplier",
        "profiles.winter.tier_cutoffs",
        "profiles.winter.tier_cutoffs.high",
        "profiles.winter.tier_cutoffs.medium",
        "profiles.winter.tier_cutoffs.low",
        "profiles.summer",
        "profiles.summer.season",
        "profiles.summer.wind_breakpoints",
        "profiles.summer.wave_breakpoints",
        "profiles.summer.seasonal_multiplier",
        "profiles.summer.tier_cutoffs",
        "profiles.summer.tier_cutoffs.high",
        "profiles.summer.tier_cutoffs.medium",
        "profiles.summer.tier_cutoffs.low",
        // [visibility]
        "visibility",
        "visibility.very_poor_below_km",
        "visibility.very_poor_penalty",
        "visibility.poor_below_km",
        "visibility.poor_penalty",
        // [routes]
        "routes",
        "routes.canonical",
        "routes.aliases",
        "routes.strict",
        // [[schedule]]
        "schedule",
        // [evaluation]
        "evaluation",
        "evaluation.unmatched_grace_days",
        // [calibration]
        "calibration",
        "calibration.window_days",
        "calibration.wind_margin_ms",
        "calibration.wave_margin_m",
        "calibration.fp_cluster_band_ms",
        "calibration.fp_raise_margin_ms",
        "calibration.min_cases",
        "calibration.sweep_min_data_points",
        "calibration.sweep_min_f1_improvement",
        "calibration.sweep_start",
        "calibration.sweep_end",
        "calibration.sweep_step",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`. Children of free-form tables are skipped.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() && !FREE_FORM_TABLES.contains(&path.as_str()) {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        // Ties broken alphabetically so suggestions are stable across runs
        let better = match best {
            None => true,
            Some((bk, bd)) => dist < bd || (dist == bd && k < bk),
        };
        if better {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Unknown keys only warn; they never fail the load.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Profile Validation
// ============================================================================

/// Check one seasonal profile. Returns every problem found.
///
/// Breakpoints must already be normalized (ascending). Scores must be
/// non-decreasing with the threshold; this is what keeps the risk score
/// monotone in wind speed and wave height.
pub fn validate_profile(profile: &ThresholdProfile, slot: Season) -> Vec<String> {
    let mut errors = Vec::new();
    let name = slot.to_string().to_lowercase();

    if profile.season != slot {
        errors.push(format!(
            "profiles.{name}.season is {} but the profile sits in the {slot} slot",
            profile.season
        ));
    }

    if profile.wind_breakpoints.is_empty() {
        errors.push(format!("profiles.{name}.wind_breakpoints must not be empty"));
    }
    check_breakpoints(&profile.wind_breakpoints, &format!("profiles.{name}.wind_breakpoints"), &mut errors);
    check_breakpoints(&profile.wave_breakpoints, &format!("profiles.{name}.wave_breakpoints"), &mut errors);

    let c = &profile.tier_cutoffs;
    if !(c.high.is_finite() && c.medium.is_finite() && c.low.is_finite()) {
        errors.push(format!("profiles.{name}.tier_cutoffs must be finite"));
    } else if !(0.0 < c.low && c.low < c.medium && c.medium < c.high && c.high <= 100.0) {
        errors.push(format!(
            "profiles.{name}.tier_cutoffs must satisfy 0 < low ({:.1}) < medium ({:.1}) < high ({:.1}) <= 100",
            c.low, c.medium, c.high
        ));
    }

    let m = profile.seasonal_multiplier;
    if !m.is_finite() {
        errors.push(format!("profiles.{name}.seasonal_multiplier must be finite"));
    } else {
        match slot {
            Season::Winter if m <= 1.0 => errors.push(format!(
                "profiles.winter.seasonal_multiplier ({m:.2}) must be > 1.0"
            )),
            Season::Summer if (m - 1.0).abs() > f64::EPSILON => errors.push(format!(
                "profiles.summer.seasonal_multiplier ({m:.2}) must be exactly 1.0"
            )),
            _ => {}
        }
    }

    errors
}

fn check_breakpoints(breakpoints: &[Breakpoint], name: &str, errors: &mut Vec<String>) {
    for bp in breakpoints {
        if !bp.threshold.is_finite() || !bp.score.is_finite() {
            errors.push(format!("{name}: '{}' has a non-finite value", bp.label));
            return;
        }
        if bp.threshold < 0.0 || bp.score < 0.0 {
            errors.push(format!(
                "{name}: '{}' threshold ({}) and score ({}) must be >= 0",
                bp.label, bp.threshold, bp.score
            ));
        }
    }
    for pair in breakpoints.windows(2) {
        let (lo, hi) = (&pair[0], &pair[1]);
        if hi.threshold <= lo.threshold {
            errors.push(format!(
                "{name}: duplicate or unsorted threshold {} ('{}' / '{}')",
                hi.threshold, lo.label, hi.label
            ));
        }
        if hi.score < lo.score {
            errors.push(format!(
                "{name}: score must not decrease with threshold ('{}' {} > '{}' {})",
                lo.label, lo.score, hi.label, hi.score
            ));
        }
    }
}

// ============================================================================
// Route Table Validation
// ============================================================================

pub fn validate_routes(routes: &RouteConfig) -> Vec<String> {
    let mut errors = Vec::new();
    let canonical: HashSet<&str> = routes.canonical.iter().map(String::as_str).collect();

    if routes.canonical.iter().any(|r| r.trim().is_empty()) {
        errors.push("routes.canonical contains an empty route id".to_string());
    }
    for (alias, target) in &routes.aliases {
        if target.trim().is_empty() {
            errors.push(format!("routes.aliases.'{alias}' maps to an empty route id"));
        } else if !canonical.is_empty() && !canonical.contains(target.as_str()) {
            errors.push(format!(
                "routes.aliases.'{alias}' maps to '{target}', which is not in routes.canonical"
            ));
        }
    }
    if routes.strict && canonical.is_empty() && routes.aliases.is_empty() {
        errors.push("routes.strict requires routes.canonical or routes.aliases".to_string());
    }

    errors
}

// ============================================================================
// Tests
// ============================================================================
