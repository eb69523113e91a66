//! Config Validation Tests
//!
//! Exercise the config layer through its public surface: typo detection,
//! profile and route validation, and loading from disk.

use std::io::Write;

use sailing_risk::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use sailing_risk::config::{ConfigError, RiskConfig};
use sailing_risk::types::{RiskTier, Season};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_visibility_section_warns_with_suggestion() {
    let warnings = validate_unknown_keys("[visibility]\npoor_below_kms = 3.0\n");
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("poor_below_kms"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("visibility.poor_below_km")
    );
}

#[test]
fn unknown_section_warns_but_still_loads() {
    let toml_str = "[dashboard]\nport = 8080\n";
    assert_eq!(validate_unknown_keys(toml_str).len(), 2);
    assert!(RiskConfig::from_toml_str(toml_str).is_ok());
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[store]
data_dir = "/var/lib/sailing-risk"

[visibility]
very_poor_below_km = 1.0
poor_below_km = 3.0

[routes]
canonical = ["wakkanai_oshidomari", "wakkanai_kafuka"]
strict = true

[routes.aliases]
"Wakkanai-Oshidomari" = "wakkanai_oshidomari"

[evaluation]
unmatched_grace_days = 2

[calibration]
window_days = 14
min_cases = 5

[profiles.winter]
season = "WINTER"
seasonal_multiplier = 1.2

[[profiles.winter.wind_breakpoints]]
speed = 10.0
score = 20.0
label = "Moderate wind"

[[profiles.winter.wind_breakpoints]]
speed = 18.0
score = 45.0
label = "Strong wind"

[[profiles.winter.wave_breakpoints]]
height = 2.0
score = 15.0
label = "Moderate waves"

[[schedule]]
route_id = "wakkanai_oshidomari"
departure_time = "08:00"
arrival_time = "09:40"
location = "wakkanai"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "Unexpected warnings: {warnings:?}");

    let config = RiskConfig::from_toml_str(toml_str).expect("config should load");
    assert_eq!(config.profiles.winter.wind_breakpoints.len(), 2);
    assert_eq!(config.profiles.winter.wind_breakpoints[1].threshold, 18.0);
    assert_eq!(config.evaluation.unmatched_grace_days, 2);
    assert!(config.routes.strict);
}

#[test]
fn garbage_key_gets_no_suggestion() {
    assert!(suggest_correction("qqqqqqqqqqqqqqqqqqqq", &known_config_keys()).is_none());
}

// ============================================================================
// Range and Consistency Validation
// ============================================================================

fn validation_errors(toml_str: &str) -> Vec<String> {
    match RiskConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => errors,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn summer_multiplier_other_than_one_is_rejected() {
    let errors = validation_errors(
        r#"
[profiles.summer]
season = "SUMMER"
seasonal_multiplier = 1.3
wind_breakpoints = [{ speed = 10.0, score = 10.0, label = "Light wind" }]
wave_breakpoints = []
"#,
    );
    assert!(errors.iter().any(|e| e.contains("summer.seasonal_multiplier")), "{errors:?}");
}

#[test]
fn decreasing_breakpoint_scores_are_rejected() {
    let errors = validation_errors(
        r#"
[profiles.winter]
season = "WINTER"
seasonal_multiplier = 1.2
wind_breakpoints = [
    { speed = 10.0, score = 30.0, label = "A" },
    { speed = 15.0, score = 20.0, label = "B" },
]
wave_breakpoints = []
"#,
    );
    assert!(errors.iter().any(|e| e.contains("must not decrease")), "{errors:?}");
}

#[test]
fn duplicate_breakpoint_thresholds_are_rejected() {
    let errors = validation_errors(
        r#"
[profiles.winter]
season = "WINTER"
seasonal_multiplier = 1.2
wind_breakpoints = [
    { speed = 12.0, score = 20.0, label = "A" },
    { speed = 12.0, score = 30.0, label = "B" },
]
wave_breakpoints = []
"#,
    );
    assert!(errors.iter().any(|e| e.contains("duplicate")), "{errors:?}");
}

#[test]
fn inverted_tier_cutoffs_are_rejected() {
    let errors = validation_errors(
        r#"
[profiles.winter]
season = "WINTER"
seasonal_multiplier = 1.2
wind_breakpoints = [{ speed = 10.0, score = 20.0, label = "A" }]
wave_breakpoints = []
tier_cutoffs = { high = 30.0, medium = 40.0, low = 10.0 }
"#,
    );
    assert!(errors.iter().any(|e| e.contains("tier_cutoffs")), "{errors:?}");
}

#[test]
fn alias_to_unknown_route_is_rejected() {
    let errors = validation_errors(
        r#"
[routes]
canonical = ["wakkanai_oshidomari"]
aliases = { "Kafuka" = "wakkanai_kafuka" }
"#,
    );
    assert_eq!(errors.len(), 1, "{errors:?}");
}

#[test]
fn all_problems_reported_together() {
    let errors = validation_errors(
        r#"
[visibility]
very_poor_below_km = 5.0
poor_below_km = 3.0

[calibration]
window_days = 0
sweep_step = 0.0
"#,
    );
    assert!(errors.len() >= 3, "{errors:?}");
}

#[test]
fn default_profiles_keep_winter_stricter() {
    let config = RiskConfig::default();
    let set = config.profile_set();
    assert_eq!(set.version, 0);
    assert!(set.for_season(Season::Winter).seasonal_multiplier > 1.0);
    assert_eq!(set.for_season(Season::Summer).seasonal_multiplier, 1.0);
    assert_eq!(
        set.for_season(Season::Winter).tier_cutoffs.classify(60.0),
        RiskTier::High
    );
}

// ============================================================================
// Loading from disk
// ============================================================================

#[test]
fn load_from_file_reads_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[calibration]\nwindow_days = 28\n").unwrap();

    let config = RiskConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.calibration.window_days, 28);
}

#[test]
fn load_from_file_reports_parse_errors_with_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[calibration\nwindow_days = ").unwrap();

    match RiskConfig::load_from_file(file.path()) {
        Err(ConfigError::Parse(path, _)) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let result = RiskConfig::load_from_file(std::path::Path::new("/nonexistent/sailing_risk.toml"));
    assert!(matches!(result, Err(ConfigError::Io(..))));
}
