use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::types::{DeviceMode, DeviceSnapshot, Temperature};

/// Last-known snapshot of one device, shared between the poller, the command
/// surface and the statistics signal sources.
#[derive(Clone, Default)]
pub struct DeviceStateCache {
    inner: Arc<RwLock<DeviceSnapshot>>,
}

impl DeviceStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        match self.inner.read() {
            Ok(snap) => snap.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the cached snapshot with a fresh successful read.
    pub fn apply_read(&self, mut snapshot: DeviceSnapshot, at: DateTime<Utc>) {
        snapshot.available = true;
        snapshot.last_updated = Some(at);
        self.update(|snap| *snap = snapshot);
    }

    /// Flag the snapshot as stale after a failed read. Temperatures and mode
    /// are kept; the heating output becomes unknown.
    pub fn mark_unavailable(&self) {
        self.update(|snap| {
            snap.available = false;
            snap.is_heating = None;
            snap.heating_output_raw = None;
        });
    }

    pub fn set_target_temperature(&self, temperature: Temperature) {
        self.update(|snap| snap.target_temperature = Some(temperature));
    }

    pub fn set_mode(&self, mode: DeviceMode) {
        self.update(|snap| snap.mode = mode);
    }

    fn update(&self, f: impl FnOnce(&mut DeviceSnapshot)) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(temp: f64, target: f64, heating: bool) -> DeviceSnapshot {
        DeviceSnapshot {
            current_temperature: Some(Temperature::from_celsius(temp)),
            target_temperature: Some(Temperature::from_celsius(target)),
            mode: DeviceMode::On,
            heating_output_raw: Some(if heating { "1" } else { "0" }.to_string()),
            is_heating: Some(heating),
            available: true,
            last_updated: None,
        }
    }

    #[test]
    fn starts_unavailable_and_empty() {
        let cache = DeviceStateCache::new();
        let snap = cache.snapshot();
        assert!(!snap.available);
        assert_eq!(snap.current_temperature, None);
        assert_eq!(snap.hvac_action(), None);
    }

    #[test]
    fn failed_read_keeps_numeric_fields() {
        let cache = DeviceStateCache::new();
        let now = Utc::now();
        cache.apply_read(read(19.5, 21.0, true), now);
        cache.mark_unavailable();

        let snap = cache.snapshot();
        assert!(!snap.available);
        assert_eq!(snap.current_temperature, Some(Temperature::from_celsius(19.5)));
        assert_eq!(snap.target_temperature, Some(Temperature::from_celsius(21.0)));
        assert_eq!(snap.mode, DeviceMode::On);
        assert_eq!(snap.is_heating, None);
        assert_eq!(snap.heating_output_raw, None);
        assert_eq!(snap.last_updated, Some(now));
    }

    #[test]
    fn clones_share_state() {
        let cache = DeviceStateCache::new();
        let other = cache.clone();
        cache.set_target_temperature(Temperature::from_celsius(22.0));
        cache.set_mode(DeviceMode::Off);
        let snap = other.snapshot();
        assert_eq!(snap.target_temperature, Some(Temperature::from_celsius(22.0)));
        assert_eq!(snap.mode, DeviceMode::Off);
    }
}
