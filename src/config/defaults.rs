//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Configuration
// ============================================================================

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "SAILING_RISK_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "sailing_risk.toml";

// ============================================================================
// Storage
// ============================================================================

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// sled database directory inside the data directory.
pub const DB_DIR_NAME: &str = "forecast.db";

/// Advisory lock file guarding calibration and profile application.
pub const CALIBRATION_LOCK_FILE: &str = ".calibration.lock";

// ============================================================================
// Evaluation
// ============================================================================

/// Lower edges of the wind bands used for accuracy breakdowns (m/s).
/// The last band is open-ended.
pub const WIND_BAND_EDGES: [f64; 7] = [0.0, 8.0, 12.0, 15.0, 20.0, 25.0, 30.0];

// ============================================================================
// Calibration diagnostics
// ============================================================================

/// Minimum cancelled sailings before a wind/wave correlation is reported.
pub const CORRELATION_MIN_SAMPLES: usize = 5;

/// P-value threshold for calling a correlation significant.
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;
