//! Property tests for the scorer and the accuracy metrics.

use chrono::NaiveDate;
use proptest::prelude::*;

use sailing_risk::config::VisibilityConfig;
use sailing_risk::scoring::RiskScorer;
use sailing_risk::types::{AccuracyMetrics, ConfusionMatrix, ProfileSet, ThresholdProfile};

fn scorer() -> RiskScorer {
    let profiles = ProfileSet {
        version: 0,
        winter: ThresholdProfile::default_winter(),
        summer: ThresholdProfile::default_summer(),
    };
    RiskScorer::new(profiles, VisibilityConfig::default())
}

fn winter_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 16).unwrap()
}

fn summer_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 15).unwrap()
}

proptest! {
    #[test]
    fn score_stays_within_bounds(
        wind in 0.0f64..60.0,
        wave in proptest::option::of(0.0f64..10.0),
        vis in proptest::option::of(0.0f64..30.0),
        winter in any::<bool>(),
    ) {
        let day = if winter { winter_day() } else { summer_day() };
        let a = scorer().score_conditions(wind, wave, vis, day).unwrap();
        prop_assert!((0.0..=100.0).contains(&a.risk_score));
    }

    #[test]
    fn more_wind_never_lowers_risk(
        wind in 0.0f64..50.0,
        extra in 0.0f64..20.0,
        wave in proptest::option::of(0.0f64..6.0),
        winter in any::<bool>(),
    ) {
        let s = scorer();
        let day = if winter { winter_day() } else { summer_day() };
        let calmer = s.score_conditions(wind, wave, Some(10.0), day).unwrap();
        let windier = s.score_conditions(wind + extra, wave, Some(10.0), day).unwrap();
        prop_assert!(windier.risk_score >= calmer.risk_score);
        prop_assert!(windier.risk_tier >= calmer.risk_tier);
    }

    #[test]
    fn higher_waves_never_lower_risk(
        wind in 0.0f64..40.0,
        wave in 0.0f64..6.0,
        extra in 0.0f64..4.0,
    ) {
        let s = scorer();
        let lower = s.score_conditions(wind, Some(wave), None, winter_day()).unwrap();
        let higher = s.score_conditions(wind, Some(wave + extra), None, winter_day()).unwrap();
        prop_assert!(higher.risk_score >= lower.risk_score);
    }

    #[test]
    fn winter_is_never_milder_than_summer(
        wind in 0.0f64..45.0,
        wave in proptest::option::of(0.0f64..6.0),
    ) {
        let s = scorer();
        let w = s.score_conditions(wind, wave, None, winter_day()).unwrap();
        let su = s.score_conditions(wind, wave, None, summer_day()).unwrap();
        prop_assert!(w.risk_score >= su.risk_score);
        prop_assert!(w.risk_tier >= su.risk_tier);
        prop_assert!((w.risk_score - (w.raw_score * 1.2).min(100.0)).abs() < 1e-9);
    }

    #[test]
    fn metrics_are_percentages_or_flagged(
        tp in 0u32..500,
        tn in 0u32..500,
        fp in 0u32..500,
        fn_ in 0u32..500,
    ) {
        let m = AccuracyMetrics::from_matrix(ConfusionMatrix { tp, tn, fp, fn_ });
        prop_assert_eq!(m.total_evaluated, tp + tn + fp + fn_);
        prop_assert_eq!(m.correct, tp + tn);
        for rate in [m.accuracy, m.precision, m.recall, m.f1] {
            prop_assert!(rate.value.is_finite());
            prop_assert!((0.0..=100.0).contains(&rate.value));
            if rate.insufficient_data {
                prop_assert_eq!(rate.value, 0.0);
            }
        }
        prop_assert_eq!(m.precision.insufficient_data, tp + fp == 0);
        prop_assert_eq!(m.recall.insufficient_data, tp + fn_ == 0);
    }
}
