//! Actual Outcome Matcher
//!
//! Exact-key join of stored predictions against collected operations for
//! one sailing date, after both sides' route labels pass through the
//! configured canonicalization table.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::RouteConfig;
use crate::types::{ActualOperation, Classification, Prediction, PredictionOutcome, SailingKey};

// ============================================================================
// Route canonicalization
// ============================================================================

/// Maps raw route labels to canonical route ids.
///
/// The canonical set is `routes.canonical` plus every alias target. With
/// an empty table every label is its own canonical id.
#[derive(Debug, Clone, Default)]
pub struct RouteCanonicalizer {
    canonical: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
}

impl RouteCanonicalizer {
    pub fn from_config(routes: &RouteConfig) -> Self {
        let mut canonical: BTreeSet<String> =
            routes.canonical.iter().map(|r| r.trim().to_string()).collect();
        canonical.extend(routes.aliases.values().map(|t| t.trim().to_string()));

        let aliases = routes
            .aliases
            .iter()
            .map(|(alias, target)| (alias.trim().to_string(), target.trim().to_string()))
            .collect();

        Self { canonical, aliases }
    }

    pub fn is_identity(&self) -> bool {
        self.canonical.is_empty() && self.aliases.is_empty()
    }

    /// Canonical id for `label`, or `None` when the label is unmapped.
    pub fn canonicalize(&self, label: &str) -> Option<String> {
        let label = label.trim();
        if self.is_identity() || self.canonical.contains(label) {
            return Some(label.to_string());
        }
        self.aliases.get(label).cloned()
    }
}

// ============================================================================
// Match report
// ============================================================================

/// Which collaborator dataset an unmapped route label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Predictions,
    Operations,
}

/// A route label that appears in neither the canonical list nor the alias
/// table. Left unresolved it silently lowers recall, so it is escalated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNameMismatch {
    pub label: String,
    pub source: RouteSource,
    pub occurrences: usize,
}

/// A prediction with no actual operation yet. Excluded from this run's
/// evaluation and retried on the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedPrediction {
    pub key: SailingKey,
    /// Past the grace period; the collector should have caught up by now
    pub overdue: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchReport {
    pub outcomes: Vec<PredictionOutcome>,
    pub unmatched: Vec<UnmatchedPrediction>,
    pub route_mismatches: Vec<RouteNameMismatch>,
    /// Operations with no prediction to compare against
    pub unpredicted_operations: usize,
}

impl MatchReport {
    pub fn overdue_count(&self) -> usize {
        self.unmatched.iter().filter(|u| u.overdue).count()
    }
}

// ============================================================================
// Matcher
// ============================================================================

#[derive(Debug, Clone)]
pub struct ActualOutcomeMatcher {
    routes: RouteCanonicalizer,
    unmatched_grace_days: i64,
}

impl ActualOutcomeMatcher {
    pub fn new(routes: RouteCanonicalizer, unmatched_grace_days: i64) -> Self {
        Self {
            routes,
            unmatched_grace_days,
        }
    }

    /// Join one day's predictions to that day's operations.
    ///
    /// `operations` should already be reduced to the latest collection per
    /// raw key; when two raw labels collapse onto one canonical key the
    /// later collection wins again here.
    pub fn match_date(
        &self,
        date: NaiveDate,
        predictions: &[Prediction],
        operations: &[ActualOperation],
        today: NaiveDate,
    ) -> MatchReport {
        let mut mismatches: BTreeMap<(RouteSource, String), usize> = BTreeMap::new();

        let mut actuals: BTreeMap<SailingKey, &ActualOperation> = BTreeMap::new();
        for op in operations.iter().filter(|op| op.operation_date == date) {
            let Some(route) = self.routes.canonicalize(&op.route_id) else {
                *mismatches
                    .entry((RouteSource::Operations, op.route_id.clone()))
                    .or_default() += 1;
                continue;
            };
            let key = SailingKey::new(date, route, op.departure_time);
            let newer = actuals
                .get(&key)
                .map_or(true, |current| op.collected_at > current.collected_at);
            if newer {
                actuals.insert(key, op);
            }
        }

        let overdue = (today - date).num_days() > self.unmatched_grace_days;
        let mut report = MatchReport::default();
        let mut matched_keys = BTreeSet::new();

        for prediction in predictions.iter().filter(|p| p.sailing_date == date) {
            let Some(route) = self.routes.canonicalize(&prediction.route_id) else {
                *mismatches
                    .entry((RouteSource::Predictions, prediction.route_id.clone()))
                    .or_default() += 1;
                continue;
            };
            let key = SailingKey::new(date, route, prediction.departure_time);

            match actuals.get(&key) {
                Some(op) => {
                    report.outcomes.push(build_outcome(prediction, op, &key.route_id));
                    matched_keys.insert(key);
                }
                None => {
                    if overdue {
                        tracing::warn!(sailing = %key, "No actual operation for prediction past grace period");
                    } else {
                        tracing::debug!(sailing = %key, "Actual operation not collected yet");
                    }
                    report.unmatched.push(UnmatchedPrediction { key, overdue });
                }
            }
        }

        report.unpredicted_operations = actuals
            .keys()
            .filter(|k| !matched_keys.contains(*k))
            .count();

        report.route_mismatches = mismatches
            .into_iter()
            .map(|((source, label), occurrences)| {
                tracing::error!(
                    %date,
                    label = %label,
                    ?source,
                    occurrences,
                    "Route label missing from canonicalization table"
                );
                RouteNameMismatch {
                    label,
                    source,
                    occurrences,
                }
            })
            .collect();

        report
    }
}

fn build_outcome(prediction: &Prediction, op: &ActualOperation, route_id: &str) -> PredictionOutcome {
    PredictionOutcome {
        sailing_date: prediction.sailing_date,
        route_id: route_id.to_string(),
        departure_time: prediction.departure_time,
        predicted_tier: prediction.risk_tier,
        predicted_score: prediction.risk_score,
        actual_status: op.normalized_status(),
        classification: Classification::classify(prediction.risk_tier, op.is_cancelled),
        forecast_wind: prediction.forecast_wind,
        forecast_wave: prediction.forecast_wave,
        forecast_visibility: prediction.forecast_visibility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DepartureTime, RiskTier};
    use chrono::{TimeZone, Utc};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).unwrap()
    }

    fn prediction(route: &str, dep: &str, tier: RiskTier) -> Prediction {
        Prediction {
            sailing_date: date(),
            route_id: route.to_string(),
            departure_time: DepartureTime::parse(dep).unwrap(),
            risk_tier: tier,
            risk_score: 70.0,
            contributing_factors: Vec::new(),
            forecast_wind: 21.0,
            forecast_wave: Some(3.1),
            forecast_visibility: None,
            generated_at: Utc.with_ymd_and_hms(2026, 2, 15, 6, 0, 0).unwrap(),
            profile_version: 0,
        }
    }

    fn operation(route: &str, dep: &str, cancelled: bool, hour: u32) -> ActualOperation {
        ActualOperation {
            operation_date: date(),
            route_id: route.to_string(),
            departure_time: DepartureTime::parse(dep).unwrap(),
            status: if cancelled { "Cancelled" } else { "Operated" }.to_string(),
            is_cancelled: cancelled,
            collected_at: Utc.with_ymd_and_hms(2026, 2, 16, hour, 0, 0).unwrap(),
        }
    }

    fn routes() -> RouteCanonicalizer {
        RouteCanonicalizer::from_config(&RouteConfig {
            canonical: vec!["wakkanai-rishiri".to_string()],
            aliases: [("Wakkanai-Rishiri".to_string(), "wakkanai-rishiri".to_string())]
                .into_iter()
                .collect(),
            strict: false,
        })
    }

    #[test]
    fn test_high_and_cancelled_is_true_positive() {
        let matcher = ActualOutcomeMatcher::new(routes(), 1);
        let report = matcher.match_date(
            date(),
            &[prediction("wakkanai-rishiri", "08:00", RiskTier::High)],
            &[operation("Wakkanai-Rishiri", "08:00", true, 10)],
            date(),
        );
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].classification, Classification::TruePositive);
        assert_eq!(report.outcomes[0].actual_status, "CANCELLED");
        assert!(report.route_mismatches.is_empty());
    }

    #[test]
    fn test_missing_actual_is_excluded_not_false_negative() {
        let matcher = ActualOutcomeMatcher::new(RouteCanonicalizer::default(), 1);
        let report = matcher.match_date(
            date(),
            &[prediction("route-X", "08:00", RiskTier::Low)],
            &[],
            date(),
        );
        assert!(report.outcomes.is_empty());
        assert_eq!(report.unmatched.len(), 1);
        assert!(!report.unmatched[0].overdue);
    }

    #[test]
    fn test_unmatched_becomes_overdue_after_grace() {
        let matcher = ActualOutcomeMatcher::new(RouteCanonicalizer::default(), 1);
        let later = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let report = matcher.match_date(
            date(),
            &[prediction("route-X", "08:00", RiskTier::Low)],
            &[],
            later,
        );
        assert_eq!(report.overdue_count(), 1);
    }

    #[test]
    fn test_unmapped_route_label_is_reported() {
        let matcher = ActualOutcomeMatcher::new(routes(), 1);
        let report = matcher.match_date(
            date(),
            &[prediction("wakkanai-rishiri", "08:00", RiskTier::High)],
            &[
                operation("稚内-利尻", "08:00", true, 10),
                operation("稚内-利尻", "13:00", false, 10),
            ],
            date(),
        );
        assert!(report.outcomes.is_empty());
        assert_eq!(
            report.route_mismatches,
            vec![RouteNameMismatch {
                label: "稚内-利尻".to_string(),
                source: RouteSource::Operations,
                occurrences: 2,
            }]
        );
    }

    #[test]
    fn test_later_collection_wins_across_aliases() {
        let matcher = ActualOutcomeMatcher::new(routes(), 1);
        let report = matcher.match_date(
            date(),
            &[prediction("wakkanai-rishiri", "08:00", RiskTier::Medium)],
            &[
                operation("Wakkanai-Rishiri", "08:00", true, 9),
                operation("wakkanai-rishiri", "08:00", false, 12),
            ],
            date(),
        );
        assert_eq!(report.outcomes[0].classification, Classification::FalsePositive);
    }

    #[test]
    fn test_identity_canonicalizer() {
        let c = RouteCanonicalizer::default();
        assert!(c.is_identity());
        assert_eq!(c.canonicalize(" anything "), Some("anything".to_string()));
    }
}
