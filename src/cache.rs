//! Per-vessel downsampling cache and the failed-delivery queue.
//!
//! Both are shared between the ingestion worker and the periodic flush
//! and retry tasks, so every operation takes the guarding lock for the
//! whole read-modify-write. Mutation is always whole-entry overwrite or
//! whole-collection swap-and-drain.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::mem;

use metrics::gauge;
use tokio::sync::Mutex;

use crate::models::{Mmsi, MovementReport, VesselStaticInfo};

/// Ship type label that exempts a vessel from downsampling.
const FISHING_SHIP_TYPE: &str = "Fishing";

#[derive(Default)]
struct CacheState {
    movements: HashMap<Mmsi, MovementReport>,
    assets: HashMap<Mmsi, VesselStaticInfo>,
    fishing_vessels: HashSet<Mmsi>,
}

/// Coalesces per-vessel reports between flushes.
///
/// Movement reports are kept last-write-wins per MMSI; static reports
/// are merged per MMSI. Vessels known to be fishing are tracked in a
/// bypass set so their movements can skip downsampling entirely.
#[derive(Default)]
pub struct DownsampleCache {
    state: Mutex<CacheState>,
}

impl DownsampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite any existing movement entry for the report's vessel.
    pub async fn upsert_movement(&self, report: MovementReport) {
        let mut state = self.state.lock().await;
        state.movements.insert(report.mmsi, report);
    }

    /// Upsert static info for the vessel, merging set fields over any
    /// existing record so type 24 part A and part B reconcile.
    pub async fn upsert_static(&self, info: VesselStaticInfo) {
        let mut state = self.state.lock().await;
        match state.assets.entry(info.mmsi) {
            Entry::Occupied(mut entry) => entry.get_mut().merge_from(info),
            Entry::Vacant(entry) => {
                entry.insert(info);
            }
        }
    }

    /// Maintain the fishing-vessel bypass set from incoming static info.
    ///
    /// A "Fishing" ship type marks the vessel; a different, known ship
    /// type clears an existing mark. An unset ship type never clears
    /// anything, informational gaps must not erase state.
    pub async fn mark_fishing_vessel(&self, info: &VesselStaticInfo) {
        let mut state = self.state.lock().await;
        match info.ship_type.as_deref() {
            Some(FISHING_SHIP_TYPE) => {
                state.fishing_vessels.insert(info.mmsi);
            }
            Some(_) => {
                state.fishing_vessels.remove(&info.mmsi);
            }
            None => {}
        }
        gauge!("ais_known_fishing_vessels").set(state.fishing_vessels.len() as f64);
    }

    pub async fn is_known_fishing_vessel(&self, mmsi: &Mmsi) -> bool {
        self.state.lock().await.fishing_vessels.contains(mmsi)
    }

    /// Swap out the whole movement map and return the previous contents.
    ///
    /// Not idempotent: a second flush in the same cycle returns empty.
    pub async fn flush_movements(&self) -> Vec<MovementReport> {
        let mut state = self.state.lock().await;
        mem::take(&mut state.movements).into_values().collect()
    }

    /// Swap out the whole static-info map and return the previous contents.
    pub async fn flush_assets(&self) -> Vec<VesselStaticInfo> {
        let mut state = self.state.lock().await;
        mem::take(&mut state.assets).into_values().collect()
    }

    pub async fn movement_count(&self) -> usize {
        self.state.lock().await.movements.len()
    }

    pub async fn fishing_vessel_count(&self) -> usize {
        self.state.lock().await.fishing_vessels.len()
    }
}

/// Ordered, append-only list of movement reports that failed to publish.
///
/// Drained as a whole batch by the scheduled retry; reports failing
/// again are re-queued by the pipeline. There is deliberately no cap and
/// no expiry, memory is the only bound.
#[derive(Default)]
pub struct FailedDeliveryQueue {
    reports: Mutex<Vec<MovementReport>>,
}

impl FailedDeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn extend(&self, failed: Vec<MovementReport>) {
        if failed.is_empty() {
            return;
        }
        let mut reports = self.reports.lock().await;
        reports.extend(failed);
        gauge!("ais_failed_delivery_queue_depth").set(reports.len() as f64);
    }

    /// Take everything currently queued; the handoff is at-most-once per
    /// cycle regardless of whether the retry itself succeeds.
    pub async fn drain(&self) -> Vec<MovementReport> {
        let mut reports = self.reports.lock().await;
        gauge!("ais_failed_delivery_queue_depth").set(0.0);
        mem::take(&mut *reports)
    }

    pub async fn len(&self) -> usize {
        self.reports.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovementSource;
    use chrono::Utc;

    fn movement(mmsi: u32, course: f64) -> MovementReport {
        MovementReport {
            mmsi: Mmsi::new(mmsi),
            position: None,
            reported_speed: Some(1.0),
            reported_course: course,
            true_heading: None,
            position_accuracy: false,
            position_time: Utc::now(),
            flag_state: "DNK".to_string(),
            source: MovementSource::Ais,
        }
    }

    fn static_info(mmsi: u32, ship_type: Option<&str>) -> VesselStaticInfo {
        VesselStaticInfo {
            ship_type: ship_type.map(str::to_string),
            ..VesselStaticInfo::new(Mmsi::new(mmsi))
        }
    }

    #[tokio::test]
    async fn movement_upsert_is_last_write_wins() {
        let cache = DownsampleCache::new();
        cache.upsert_movement(movement(123456789, 10.0)).await;
        cache.upsert_movement(movement(123456789, 20.0)).await;

        let flushed = cache.flush_movements().await;
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].reported_course, 20.0);
    }

    #[tokio::test]
    async fn second_flush_returns_empty() {
        let cache = DownsampleCache::new();
        cache.upsert_movement(movement(123456789, 10.0)).await;

        assert_eq!(cache.flush_movements().await.len(), 1);
        assert!(cache.flush_movements().await.is_empty());
    }

    #[tokio::test]
    async fn static_upsert_merges_parts() {
        let cache = DownsampleCache::new();
        let mmsi = Mmsi::new(271041815);
        cache
            .upsert_static(VesselStaticInfo {
                name: Some("PROGUY".to_string()),
                ..VesselStaticInfo::new(mmsi)
            })
            .await;
        cache
            .upsert_static(VesselStaticInfo {
                call_sign: Some("TC6163".to_string()),
                ..VesselStaticInfo::new(mmsi)
            })
            .await;

        let flushed = cache.flush_assets().await;
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].name.as_deref(), Some("PROGUY"));
        assert_eq!(flushed[0].call_sign.as_deref(), Some("TC6163"));
    }

    #[tokio::test]
    async fn fishing_mark_follows_ship_type() {
        let cache = DownsampleCache::new();
        let mmsi = Mmsi::new(261061000);

        cache.mark_fishing_vessel(&static_info(261061000, Some("Fishing"))).await;
        assert!(cache.is_known_fishing_vessel(&mmsi).await);

        // an unset ship type never erases the mark
        cache.mark_fishing_vessel(&static_info(261061000, None)).await;
        assert!(cache.is_known_fishing_vessel(&mmsi).await);

        // a different known ship type clears it
        cache.mark_fishing_vessel(&static_info(261061000, Some("Cargo"))).await;
        assert!(!cache.is_known_fishing_vessel(&mmsi).await);
    }

    #[tokio::test]
    async fn non_fishing_ship_type_alone_marks_nothing() {
        let cache = DownsampleCache::new();
        cache.mark_fishing_vessel(&static_info(219024194, Some("Cargo"))).await;
        assert_eq!(cache.fishing_vessel_count().await, 0);
    }

    #[tokio::test]
    async fn failed_queue_drains_completely() {
        let queue = FailedDeliveryQueue::new();
        queue.extend(vec![movement(1, 1.0), movement(2, 2.0)]).await;
        queue.extend(vec![movement(3, 3.0)]).await;
        assert_eq!(queue.len().await, 3);

        let drained = queue.drain().await;
        assert_eq!(drained.len(), 3);
        assert!(queue.is_empty().await);
    }
}
