//! Single-flight snapshot cache for one device.
//!
//! All readers share the latest [`Traits`] snapshot. Refreshes happen under a
//! lock acquired with a bounded wait, so at most one remote read is in flight
//! and callers arriving during a refresh observe its result instead of issuing
//! their own.

use crate::accessor::TraitAccessor;
use crate::client::DeviceApi;
use crate::device_traits::{self, Traits};
use crate::models::sdm::{Connectivity, TemperatureScale};
use crate::status::HapStatus;
use crate::timeout::AdaptiveTimeout;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(500);

/// Notified synchronously, inside the refresh, when the device's display unit changes.
pub trait DisplayUnitObserver: Send + Sync {
    fn display_unit_changed(&self, unit: TemperatureScale);
}

#[derive(Debug)]
struct CacheEntry {
    traits: Arc<Traits>,
    accessor: TraitAccessor,
    fetched_at: Instant,
    observed_at: DateTime<Utc>,
}

pub struct SnapshotCache {
    api: Arc<dyn DeviceApi>,
    device_id: String,
    lock_wait: Duration,
    entry: tokio::sync::Mutex<Option<CacheEntry>>,
    timeout: Mutex<AdaptiveTimeout>,
    force_refresh: AtomicBool,
    observer: Option<Arc<dyn DisplayUnitObserver>>,
}

impl SnapshotCache {
    pub fn new(api: Arc<dyn DeviceApi>, device_id: impl Into<String>, timeout: AdaptiveTimeout, lock_wait: Duration) -> Self {
        SnapshotCache {
            api,
            device_id: device_id.into(),
            lock_wait,
            entry: tokio::sync::Mutex::new(None),
            timeout: Mutex::new(timeout),
            force_refresh: AtomicBool::new(false),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DisplayUnitObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn current_budget(&self) -> Duration {
        self.timeout().current_budget()
    }

    /// Make the next [`get_accessor`](Self::get_accessor) refresh regardless of age.
    /// The current entry stays available as the fallback snapshot.
    pub fn invalidate(&self) {
        self.force_refresh.store(true, Ordering::Release);
    }

    /// Accessor over a snapshot no older than the current staleness budget.
    pub async fn get_accessor(&self) -> Result<TraitAccessor, HapStatus> {
        let mut guard = match tokio::time::timeout(self.lock_wait, self.entry.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                warn!(
                    "Device {}: refresh lock not acquired within {} ms",
                    self.device_id,
                    self.lock_wait.as_millis()
                );
                return Err(HapStatus::ResourceBusy);
            }
        };

        if let Some(entry) = guard.as_ref().filter(|e| self.is_fresh(Some(*e))) {
            debug!(
                "Device {}: serving cached snapshot observed at {}",
                self.device_id,
                entry.observed_at.format("%H:%M:%S%.3f")
            );
        } else {
            self.refresh(&mut guard).await;
        }

        let (accessor, offline) = match guard.as_ref() {
            Some(entry) => (entry.accessor.clone(), entry.traits.is_offline()),
            None => return Err(HapStatus::ServiceCommunicationFailure),
        };
        drop(guard);

        if offline {
            self.timeout().on_unreachable();
            return Err(HapStatus::ServiceCommunicationFailure);
        }
        Ok(accessor)
    }

    fn timeout(&self) -> MutexGuard<'_, AdaptiveTimeout> {
        self.timeout.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: Option<&CacheEntry>) -> bool {
        let Some(entry) = entry else { return false };
        if self.force_refresh.load(Ordering::Acquire) {
            return false;
        }
        entry.fetched_at.elapsed() <= self.current_budget()
    }

    /// One remote read. Failures keep whatever entry is already cached.
    async fn refresh(&self, slot: &mut Option<CacheEntry>) {
        self.force_refresh.store(false, Ordering::Release);
        debug!("Device {}: fetching device document", self.device_id);

        let document = match self.api.get_device(&self.device_id).await {
            Ok(resp) if resp.is_ok() => resp.body,
            Ok(resp) => {
                warn!("Device {}: device read returned http {}", self.device_id, resp.status);
                return;
            }
            Err(e) => {
                warn!("Device {}: device read failed: {}", self.device_id, e);
                return;
            }
        };

        let traits = Arc::new(device_traits::extract(&document));
        let previous = slot.as_ref().map(|e| Arc::clone(&e.traits));

        if let Some(unit) = changed_display_unit(previous.as_deref(), &traits) {
            info!("Device {}: display unit is now {:?}", self.device_id, unit);
            if let Some(observer) = &self.observer {
                observer.display_unit_changed(unit);
            }
        }

        let was = previous.as_ref().and_then(|t| t.connectivity);
        if traits.connectivity != was {
            match traits.connectivity {
                Some(Connectivity::Offline) => warn!("Device {}: reported OFFLINE", self.device_id),
                Some(c) => info!("Device {}: connectivity {:?}", self.device_id, c),
                None => debug!("Device {}: snapshot has no connectivity trait", self.device_id),
            }
        }

        if !traits.is_offline() {
            self.timeout().on_reachable_refresh();
        }

        let accessor = TraitAccessor::new(Arc::clone(&traits));
        *slot = Some(CacheEntry {
            observed_at: accessor.observed_at(),
            accessor,
            traits,
            fetched_at: Instant::now(),
        });
    }
}

fn changed_display_unit(previous: Option<&Traits>, current: &Traits) -> Option<TemperatureScale> {
    let unit = current.display_unit.filter(|u| *u != TemperatureScale::Unknown)?;
    let before = previous.and_then(|t| t.display_unit);
    (before != Some(unit)).then_some(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{thermostat_document, FakeApi};
    use serde_json::json;

    fn cache(api: &Arc<FakeApi>) -> SnapshotCache {
        SnapshotCache::new(
            api.clone(),
            "device-1",
            AdaptiveTimeout::new(Duration::from_secs(3), Duration::from_secs(30)),
            DEFAULT_LOCK_WAIT,
        )
    }

    #[derive(Default)]
    struct RecordingObserver {
        units: Mutex<Vec<TemperatureScale>>,
    }

    impl DisplayUnitObserver for RecordingObserver {
        fn display_unit_changed(&self, unit: TemperatureScale) {
            self.units.lock().unwrap().push(unit);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_read_within_budget_hits_cache() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        let cache = cache(&api);

        let first = cache.get_accessor().await.expect("first read");
        tokio::time::advance(Duration::from_secs(1)).await;
        let second = cache.get_accessor().await.expect("second read");

        assert_eq!(api.reads(), 1);
        assert!(Arc::ptr_eq(first.snapshot(), second.snapshot()));
        assert_eq!(first.observed_at(), second.observed_at());
    }

    #[tokio::test(start_paused = true)]
    async fn read_after_budget_refreshes() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        let cache = cache(&api);

        let first = cache.get_accessor().await.expect("first read");
        tokio::time::advance(Duration::from_secs(4)).await;
        let second = cache.get_accessor().await.expect("second read");

        assert_eq!(api.reads(), 2);
        assert!(!Arc::ptr_eq(first.snapshot(), second.snapshot()));
        assert!(second.observed_at() >= first.observed_at());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_readers_share_one_fetch() {
        let api = Arc::new(FakeApi::new(thermostat_document()).with_delay(Duration::from_millis(50)));
        let cache = Arc::new(cache(&api));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get_accessor().await }));
        }

        let mut snapshots = Vec::new();
        for handle in handles {
            let accessor = handle.await.expect("task joined").expect("accessor");
            snapshots.push(Arc::clone(accessor.snapshot()));
        }

        assert_eq!(api.reads(), 1);
        assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
    }

    #[tokio::test(start_paused = true)]
    async fn contended_lock_fails_busy_without_fetching() {
        let api = Arc::new(FakeApi::new(thermostat_document()).with_delay(Duration::from_secs(2)));
        let cache = Arc::new(cache(&api));

        let slow = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_accessor().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.get_accessor().await.err(), Some(HapStatus::ResourceBusy));
        assert!(slow.await.expect("task joined").is_ok());
        assert_eq!(api.reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_widens_budget_and_online_resets_it() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        api.set_connectivity("OFFLINE");
        let cache = cache(&api);

        assert_eq!(cache.get_accessor().await.err(), Some(HapStatus::ServiceCommunicationFailure));
        assert_eq!(cache.current_budget(), Duration::from_secs(30));

        // Inside the widened window the device is not polled again.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get_accessor().await.err(), Some(HapStatus::ServiceCommunicationFailure));
        assert_eq!(api.reads(), 1);

        api.set_connectivity("ONLINE");
        tokio::time::advance(Duration::from_secs(21)).await;
        let accessor = cache.get_accessor().await.expect("device back online");
        assert_eq!(accessor.connectivity(), Ok(Connectivity::Online));
        assert_eq!(cache.current_budget(), Duration::from_secs(3));
        assert_eq!(api.reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_first_read_is_a_communication_failure() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        api.set_read_status(503);
        let cache = cache(&api);

        assert_eq!(cache.get_accessor().await.err(), Some(HapStatus::ServiceCommunicationFailure));

        api.fail_transport(true);
        assert_eq!(cache.get_accessor().await.err(), Some(HapStatus::ServiceCommunicationFailure));
        assert_eq!(api.reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_previous_snapshot() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        let cache = cache(&api);
        let first = cache.get_accessor().await.expect("first read");

        api.set_read_status(500);
        tokio::time::advance(Duration::from_secs(5)).await;
        let second = cache.get_accessor().await.expect("stale snapshot served");

        assert_eq!(api.reads(), 2);
        assert!(Arc::ptr_eq(first.snapshot(), second.snapshot()));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_next_read() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        let cache = cache(&api);

        cache.get_accessor().await.expect("first read");
        cache.invalidate();
        cache.get_accessor().await.expect("second read");
        cache.get_accessor().await.expect("third read");

        assert_eq!(api.reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn display_unit_change_notifies_once() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        let observer = Arc::new(RecordingObserver::default());
        let cache = cache(&api).with_observer(observer.clone());

        cache.get_accessor().await.expect("first read");
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get_accessor().await.expect("same unit");

        api.set_trait("sdm.devices.traits.Settings", json!({"temperatureScale": "FAHRENHEIT"}));
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get_accessor().await.expect("unit changed");

        assert_eq!(
            *observer.units.lock().unwrap(),
            vec![TemperatureScale::Celsius, TemperatureScale::Fahrenheit]
        );
    }

    #[test]
    fn unknown_display_unit_is_not_a_change() {
        let current = Traits {
            display_unit: Some(TemperatureScale::Unknown),
            ..Traits::default()
        };
        assert_eq!(changed_display_unit(None, &current), None);
    }
}
