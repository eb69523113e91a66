//! Forecast-side types: FeatureSnapshot, SailingSchedule, DepartureTime

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Departure Time
// ============================================================================

/// Scheduled departure as wall-clock `HH:MM`.
///
/// Parses `HH:MM` or `HH:MM:SS` (seconds dropped) and always renders as
/// `HH:MM`, so it can be used verbatim inside storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepartureTime(NaiveTime);

impl DepartureTime {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
            .and_then(|t| t.with_second(0))
            .map(Self)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }
}

impl std::fmt::Display for DepartureTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl std::str::FromStr for DepartureTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid departure time '{s}', expected HH:MM"))
    }
}

impl Serialize for DepartureTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DepartureTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Feature Snapshot
// ============================================================================

/// One weather-forecast record as issued by the forecast collector.
///
/// Immutable once created. Several issues may exist for the same
/// (date, hour, location); they differ by `generated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureSnapshot {
    pub target_date: NaiveDate,
    /// Hour of day 0-23, `None` for daily-granularity forecasts
    #[serde(default)]
    pub target_hour: Option<u32>,
    pub location: String,
    /// Wind speed (m/s)
    pub wind_speed: f64,
    /// Significant wave height (m)
    #[serde(default)]
    pub wave_height: Option<f64>,
    /// Visibility (km)
    #[serde(default)]
    pub visibility: Option<f64>,
    /// Air temperature (°C)
    #[serde(default)]
    pub temperature: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// Sailing Schedule
// ============================================================================

/// Static timetable entry. `location` names the forecast point whose
/// snapshots apply to this departure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SailingSchedule {
    pub route_id: String,
    pub departure_time: DepartureTime,
    pub arrival_time: DepartureTime,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_departure_time_normalizes_seconds() {
        let t = DepartureTime::parse("08:00:30").unwrap();
        assert_eq!(t.to_string(), "08:00");
        assert_eq!(t.hour(), 8);
    }

    #[test]
    fn test_departure_time_rejects_garbage() {
        assert!(DepartureTime::parse("8am").is_none());
        assert!(DepartureTime::parse("25:00").is_none());
    }

    #[test]
    fn test_departure_time_serde() {
        let t: DepartureTime = serde_json::from_str("\"13:45\"").unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"13:45\"");
    }

    #[test]
    fn test_snapshot_optional_fields_default_to_none() {
        let json = r#"{"target_date":"2026-02-16","location":"wakkanai","wind_speed":9.5,
                       "generated_at":"2026-02-15T06:00:00Z"}"#;
        let snap: FeatureSnapshot = serde_json::from_str(json).unwrap();
        assert!(snap.target_hour.is_none());
        assert!(snap.wave_height.is_none());
        assert!(snap.visibility.is_none());
    }
}
