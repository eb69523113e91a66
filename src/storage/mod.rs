//! Forecast Store
//!
//! Embedded sled database holding every table the pipeline reads and
//! writes. One named tree per table; values are JSON documents and keys
//! are `/`-separated ASCII strings that sort by date first.
//!
//! | Tree              | Key                                         |
//! |-------------------|---------------------------------------------|
//! | `snapshots`       | `{date}/{location}/{hour\|--}/{nanos:020}`  |
//! | `predictions`     | `{date}/{route}/{HH:MM}`                    |
//! | `operations`      | `{date}/{route}/{HH:MM}/{nanos:020}`        |
//! | `outcomes`        | `{date}/{route}/{HH:MM}`                    |
//! | `daily_summaries` | `{date}`                                    |
//! | `tier_summaries`  | `{date}/{TIER}`                             |
//! | `profiles`        | `{version:010}`                             |
//! | `proposals`       | `{id:010}`                                  |

mod calibration;
mod records;
mod summaries;
pub mod lockfile;

pub use lockfile::CalibrationLock;
pub use records::UpsertOutcome;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use sled::Tree;
use thiserror::Error;

use crate::config::defaults::DB_DIR_NAME;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("profile version {0} already exists")]
    VersionConflict(u64),

    #[error("calibration lock held by running process {pid} ({path})")]
    LockHeld { pid: u32, path: PathBuf },

    #[error("calibration lock {path} has no readable owner yet; retry shortly")]
    LockUnreadable { path: PathBuf },

    #[error("lock file {path}: {source}")]
    LockIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Store
// ============================================================================

/// Handle to the pipeline's database. Cheap to clone; trees are shared.
#[derive(Clone)]
pub struct ForecastStore {
    db: sled::Db,
    snapshots: Tree,
    predictions: Tree,
    operations: Tree,
    outcomes: Tree,
    daily_summaries: Tree,
    tier_summaries: Tree,
    profiles: Tree,
    proposals: Tree,
}

impl ForecastStore {
    /// Open or create the store under `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        let path = data_dir.as_ref().join(DB_DIR_NAME);
        let db = sled::open(&path)?;
        tracing::info!(path = %path.display(), "Forecast store opened");
        Self::with_db(db)
    }

    /// Open a throwaway in-memory store.
    pub fn open_temp() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db)
    }

    fn with_db(db: sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            snapshots: db.open_tree("snapshots")?,
            predictions: db.open_tree("predictions")?,
            operations: db.open_tree("operations")?,
            outcomes: db.open_tree("outcomes")?,
            daily_summaries: db.open_tree("daily_summaries")?,
            tier_summaries: db.open_tree("tier_summaries")?,
            profiles: db.open_tree("profiles")?,
            proposals: db.open_tree("proposals")?,
            db,
        })
    }

    /// Flush dirty pages to disk. Called once at the end of each batch step.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

// ============================================================================
// Key helpers
// ============================================================================

/// Nanoseconds since the epoch, saturating at zero for pre-epoch times
/// so the fixed-width key still sorts.
fn nanos(ts: DateTime<Utc>) -> u64 {
    let n = ts
        .timestamp_nanos_opt()
        .unwrap_or_else(|| ts.timestamp().saturating_mul(1_000_000_000));
    u64::try_from(n).unwrap_or(0)
}

fn date_prefix(date: NaiveDate) -> String {
    format!("{date}/")
}

/// Decode every value in `tree` whose key falls on a date in
/// `[start, end]`.
fn decode_date_range<T: DeserializeOwned>(
    tree: &Tree,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<T>, StoreError> {
    let lower = start.to_string();
    let iter = match end.succ_opt() {
        Some(next) => tree.range(lower.as_bytes()..next.to_string().as_bytes()),
        None => tree.range(lower.as_bytes()..),
    };

    let mut out = Vec::new();
    for item in iter {
        let (_, value) = item?;
        out.push(serde_json::from_slice(&value)?);
    }
    Ok(out)
}

fn decode_prefix<T: DeserializeOwned>(tree: &Tree, prefix: &str) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    for item in tree.scan_prefix(prefix.as_bytes()) {
        let (_, value) = item?;
        out.push(serde_json::from_slice(&value)?);
    }
    Ok(out)
}

/// Atomically replace every entry under `prefix` with `entries`.
fn replace_prefix(tree: &Tree, prefix: &str, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
    let mut batch = sled::Batch::default();
    for item in tree.scan_prefix(prefix.as_bytes()) {
        let (key, _) = item?;
        batch.remove(key);
    }
    for (key, value) in entries {
        batch.insert(key.as_bytes(), value);
    }
    tree.apply_batch(batch)?;
    Ok(())
}
