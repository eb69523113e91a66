//! Snapshot selection for one departure

use crate::types::FeatureSnapshot;

/// Pick the snapshot that applies to a departure at `hour`.
///
/// Preference: the departure's own hour, then the nearest hourly snapshot,
/// then a daily snapshot. Among equally close snapshots the latest issue
/// wins; remaining ties keep store order (earlier hour first).
pub fn select_snapshot(snapshots: &[FeatureSnapshot], hour: u32) -> Option<&FeatureSnapshot> {
    snapshots.iter().min_by(|a, b| {
        distance(a, hour)
            .cmp(&distance(b, hour))
            .then_with(|| b.generated_at.cmp(&a.generated_at))
    })
}

fn distance(snapshot: &FeatureSnapshot, hour: u32) -> u32 {
    snapshot
        .target_hour
        .map_or(u32::MAX, |h| h.abs_diff(hour))
}
