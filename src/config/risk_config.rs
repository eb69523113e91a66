//! Risk Configuration - seasonal profiles, routes, schedule and calibration
//! tuning as operator-editable TOML values
//!
//! Each struct implements `Default` with the built-in values, so a missing
//! file or a partial file behaves exactly like the defaults for every key
//! it leaves out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::{DepartureTime, ProfileSet, SailingSchedule, Season, ThresholdProfile};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one deployment.
///
/// Load with `RiskConfig::load()` which searches:
/// 1. `$SAILING_RISK_CONFIG` env var
/// 2. `./sailing_risk.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Data store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Seasonal threshold profiles (version 0 of the active profile set)
    #[serde(default)]
    pub profiles: ProfilesConfig,

    /// Visibility penalties (shared by both seasons)
    #[serde(default)]
    pub visibility: VisibilityConfig,

    /// Route-name canonicalization
    #[serde(default)]
    pub routes: RouteConfig,

    /// Timetable: one entry per scheduled departure
    #[serde(default)]
    pub schedule: Vec<SailingSchedule>,

    /// Outcome matching
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Threshold calibration tuning
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl RiskConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SAILING_RISK_CONFIG` environment variable
    /// 2. `./sailing_risk.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that exists but fails to parse or validate is an error; only
    /// the absence of a file falls through to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), "Loaded config from {}", defaults::CONFIG_ENV_VAR);
                return Ok(config);
            }
            warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded config from ./{}", defaults::LOCAL_CONFIG_FILE);
            return Ok(config);
        }

        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse, normalize and validate a TOML document.
    ///
    /// Unknown keys only produce warnings; validation failures are errors.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in &super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let mut config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Sort breakpoints so scoring can walk them top-down.
    pub fn normalize(&mut self) {
        self.profiles.winter.normalize();
        self.profiles.summer.normalize();
    }

    /// Version-0 profile set built from the configured profiles.
    pub fn profile_set(&self) -> ProfileSet {
        ProfileSet {
            version: 0,
            winter: self.profiles.winter.clone(),
            summer: self.profiles.summer.clone(),
        }
    }

    /// Validate every section, collecting all problems before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        errors.extend(super::validation::validate_profile(
            &self.profiles.winter,
            Season::Winter,
        ));
        errors.extend(super::validation::validate_profile(
            &self.profiles.summer,
            Season::Summer,
        ));

        let v = &self.visibility;
        Self::check_finite(v.very_poor_below_km, "visibility.very_poor_below_km", &mut errors);
        Self::check_finite(v.poor_below_km, "visibility.poor_below_km", &mut errors);
        if v.very_poor_below_km <= 0.0 {
            errors.push("visibility.very_poor_below_km must be > 0".to_string());
        }
        if v.poor_below_km <= v.very_poor_below_km {
            errors.push(format!(
                "visibility.poor_below_km ({:.2}) must be > very_poor_below_km ({:.2})",
                v.poor_below_km, v.very_poor_below_km
            ));
        }
        if v.very_poor_penalty < v.poor_penalty || v.poor_penalty < 0.0 {
            errors.push(format!(
                "visibility penalties must satisfy very_poor ({:.1}) >= poor ({:.1}) >= 0",
                v.very_poor_penalty, v.poor_penalty
            ));
        }

        errors.extend(super::validation::validate_routes(&self.routes));

        let c = &self.calibration;
        if c.window_days == 0 {
            errors.push("calibration.window_days must be > 0".to_string());
        }
        for (value, name) in [
            (c.wind_margin_ms, "calibration.wind_margin_ms"),
            (c.wave_margin_m, "calibration.wave_margin_m"),
            (c.fp_cluster_band_ms, "calibration.fp_cluster_band_ms"),
            (c.fp_raise_margin_ms, "calibration.fp_raise_margin_ms"),
            (c.sweep_min_f1_improvement, "calibration.sweep_min_f1_improvement"),
        ] {
            Self::check_finite(value, name, &mut errors);
            if value < 0.0 {
                errors.push(format!("{name} must be >= 0 (got {value})"));
            }
        }
        if c.min_cases == 0 {
            errors.push("calibration.min_cases must be > 0".to_string());
        }
        if c.sweep_step <= 0.0 {
            errors.push("calibration.sweep_step must be > 0".to_string());
        }
        if c.sweep_start >= c.sweep_end {
            errors.push(format!(
                "calibration.sweep_start ({:.1}) must be < sweep_end ({:.1})",
                c.sweep_start, c.sweep_end
            ));
        }

        if self.evaluation.unmatched_grace_days < 0 {
            errors.push("evaluation.unmatched_grace_days must be >= 0".to_string());
        }

        for entry in &self.schedule {
            if entry.route_id.trim().is_empty() {
                errors.push("schedule entries must have a non-empty route_id".to_string());
            }
            if entry.location.trim().is_empty() {
                errors.push(format!(
                    "schedule entry {} {} has an empty location",
                    entry.route_id, entry.departure_time
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_finite(value: f64, name: &str, errors: &mut Vec<String>) {
        if !value.is_finite() {
            errors.push(format!("{name}: value must be finite (got {value})"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the sled database and the calibration lock file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(defaults::DEFAULT_DATA_DIR)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilesConfig {
    #[serde(default = "ThresholdProfile::default_winter")]
    pub winter: ThresholdProfile,

    #[serde(default = "ThresholdProfile::default_summer")]
    pub summer: ThresholdProfile,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            winter: ThresholdProfile::default_winter(),
            summer: ThresholdProfile::default_summer(),
        }
    }
}

// ============================================================================
// Visibility
// ============================================================================

/// Visibility penalties. Stack on top of wind and wave contributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Below this (km) the "very poor visibility" penalty applies.
    #[serde(default = "default_very_poor_below")]
    pub very_poor_below_km: f64,

    #[serde(default = "default_very_poor_penalty")]
    pub very_poor_penalty: f64,

    /// Below this (km), and not very poor, the "poor visibility" penalty applies.
    #[serde(default = "default_poor_below")]
    pub poor_below_km: f64,

    #[serde(default = "default_poor_penalty")]
    pub poor_penalty: f64,
}

fn default_very_poor_below() -> f64 { 1.0 }
fn default_very_poor_penalty() -> f64 { 20.0 }
fn default_poor_below() -> f64 { 3.0 }
fn default_poor_penalty() -> f64 { 10.0 }

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            very_poor_below_km: default_very_poor_below(),
            very_poor_penalty: default_very_poor_penalty(),
            poor_below_km: default_poor_below(),
            poor_penalty: default_poor_penalty(),
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Route-name canonicalization table.
///
/// The forecast side and the operations side are populated independently
/// and may label the same route differently. Every label must either be a
/// canonical id or appear in `aliases`; anything else is a route-name
/// mismatch. With both lists empty, labels are compared verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Canonical route ids
    #[serde(default)]
    pub canonical: Vec<String>,

    /// Raw label → canonical id
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,

    /// Abort evaluation on an unmapped label instead of reporting it
    #[serde(default)]
    pub strict: bool,
}

// ============================================================================
// Evaluation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Days after the sailing date before a missing actual is logged as a
    /// warning rather than "not collected yet".
    #[serde(default = "default_unmatched_grace_days")]
    pub unmatched_grace_days: i64,
}

fn default_unmatched_grace_days() -> i64 { 1 }

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            unmatched_grace_days: default_unmatched_grace_days(),
        }
    }
}

// ============================================================================
// Calibration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Rolling window length (days, ending at the run's end date)
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Safety buffer subtracted from the mean FN wind (m/s)
    #[serde(default = "default_wind_margin")]
    pub wind_margin_ms: f64,

    /// Safety buffer subtracted from the mean FN wave height (m)
    #[serde(default = "default_wave_margin")]
    pub wave_margin_m: f64,

    /// Mean FP wind within this distance of the HIGH breakpoint counts as clustered (m/s)
    #[serde(default = "default_fp_cluster_band")]
    pub fp_cluster_band_ms: f64,

    /// Added to the mean FP wind when raising the HIGH breakpoint (m/s)
    #[serde(default = "default_fp_raise_margin")]
    pub fp_raise_margin_ms: f64,

    /// Minimum FN (or FP) cases before a side produces a proposal
    #[serde(default = "default_min_cases")]
    pub min_cases: usize,

    /// Minimum evaluated outcomes before the cutoff sweep may propose
    #[serde(default = "default_sweep_min_data_points")]
    pub sweep_min_data_points: usize,

    /// Minimum F1 gain (percentage points) for the cutoff sweep to propose
    #[serde(default = "default_sweep_min_f1_improvement")]
    pub sweep_min_f1_improvement: f64,

    #[serde(default = "default_sweep_start")]
    pub sweep_start: f64,

    #[serde(default = "default_sweep_end")]
    pub sweep_end: f64,

    #[serde(default = "default_sweep_step")]
    pub sweep_step: f64,
}

fn default_window_days() -> u32 { 14 }
fn default_wind_margin() -> f64 { 2.0 }
fn default_wave_margin() -> f64 { 0.5 }
fn default_fp_cluster_band() -> f64 { 2.0 }
fn default_fp_raise_margin() -> f64 { 2.0 }
fn default_min_cases() -> usize { 1 }
fn default_sweep_min_data_points() -> usize { 20 }
fn default_sweep_min_f1_improvement() -> f64 { 2.0 }
fn default_sweep_start() -> f64 { 10.0 }
fn default_sweep_end() -> f64 { 90.0 }
fn default_sweep_step() -> f64 { 5.0 }

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            wind_margin_ms: default_wind_margin(),
            wave_margin_m: default_wave_margin(),
            fp_cluster_band_ms: default_fp_cluster_band(),
            fp_raise_margin_ms: default_fp_raise_margin(),
            min_cases: default_min_cases(),
            sweep_min_data_points: default_sweep_min_data_points(),
            sweep_min_f1_improvement: default_sweep_min_f1_improvement(),
            sweep_start: default_sweep_start(),
            sweep_end: default_sweep_end(),
            sweep_step: default_sweep_step(),
        }
    }
}

/// Convenience for tests and demos: a schedule entry from plain strings.
pub fn schedule_entry(route_id: &str, departure: &str, arrival: &str, location: &str) -> Option<SailingSchedule> {
    Some(SailingSchedule {
        route_id: route_id.to_string(),
        departure_time: DepartureTime::parse(departure)?,
        arrival_time: DepartureTime::parse(arrival)?,
        location: location.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = RiskConfig::default();
        assert!(config.validate().is_ok(), "{:?}", config.validate());
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = RiskConfig::from_toml_str("").unwrap();
        assert_eq!(config.profiles.winter, ThresholdProfile::default_winter());
        assert_eq!(config.calibration.window_days, 14);
        assert!(config.schedule.is_empty());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = RiskConfig::from_toml_str(
            r#"
[calibration]
wind_margin_ms = 3.0
"#,
        )
        .unwrap();
        assert_eq!(config.calibration.wind_margin_ms, 3.0);
        assert_eq!(config.calibration.window_days, 14);
    }

    #[test]
    fn test_schedule_and_routes_parse() {
        let config = RiskConfig::from_toml_str(
            r#"
[routes]
canonical = ["wakkanai_oshidomari"]
aliases = { "稚内⇔鴛泊" = "wakkanai_oshidomari" }

[[schedule]]
route_id = "wakkanai_oshidomari"
departure_time = "08:00"
arrival_time = "09:40"
location = "wakkanai"
"#,
        )
        .unwrap();
        assert_eq!(config.schedule.len(), 1);
        assert_eq!(config.schedule[0].departure_time.to_string(), "08:00");
        assert_eq!(config.routes.aliases["稚内⇔鴛泊"], "wakkanai_oshidomari");
    }

    #[test]
    fn test_validation_collects_multiple_errors() {
        let mut config = RiskConfig::default();
        config.calibration.window_days = 0;
        config.visibility.poor_below_km = 0.5;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert!(errors.len() >= 2, "{errors:?}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unsorted_breakpoints_are_normalized() {
        let mut config = RiskConfig::default();
        config.profiles.winter.wind_breakpoints.reverse();
        config.normalize();
        assert!(config.validate().is_ok());
        assert_eq!(config.profiles.winter.wind_breakpoints[0].threshold, 8.0);
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let config = RiskConfig::default();
        let text = config.to_toml().unwrap();
        let back = RiskConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.profiles.summer, config.profiles.summer);
    }
}
