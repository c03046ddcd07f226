use crate::accumulator::{SignalSource, SignalState};
use crate::cache::DeviceStateCache;

pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Mirrors the thermostat's running action as a plain state string.
#[derive(Clone)]
pub struct ThermostatStateSensor {
    cache: DeviceStateCache,
}

impl ThermostatStateSensor {
    pub fn new(cache: DeviceStateCache) -> Self {
        Self { cache }
    }

    pub fn state(&self) -> String {
        self.cache
            .snapshot()
            .hvac_action()
            .map(|a| a.as_str())
            .unwrap_or(STATE_UNAVAILABLE)
            .to_string()
    }
}

/// Statistics can be driven from this sensor's exposed state instead of the
/// thermostat directly.
impl SignalSource for ThermostatStateSensor {
    fn read(&self) -> SignalState {
        SignalState::from_state_str(&self.state())
    }
}

/// Binary view of the gateway's heating output (`CH1heatOnOffStatus`).
#[derive(Clone)]
pub struct HeatingOutputSensor {
    cache: DeviceStateCache,
}

impl HeatingOutputSensor {
    pub fn new(cache: DeviceStateCache) -> Self {
        Self { cache }
    }

    /// `None` when the output state is unknown.
    pub fn is_on(&self) -> Option<bool> {
        let snap = self.cache.snapshot();
        snap.is_heating
            .or_else(|| snap.heating_output_raw.as_deref().map(|raw| raw == "1"))
    }

    pub fn available(&self) -> bool {
        self.is_on().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceMode, DeviceSnapshot, Temperature};
    use chrono::Utc;

    fn cache_with(snapshot: DeviceSnapshot) -> DeviceStateCache {
        let cache = DeviceStateCache::new();
        cache.apply_read(snapshot, Utc::now());
        cache
    }

    #[test]
    fn state_sensor_mirrors_action() {
        let cache = cache_with(DeviceSnapshot {
            is_heating: Some(true),
            ..Default::default()
        });
        let sensor = ThermostatStateSensor::new(cache.clone());
        assert_eq!(sensor.state(), "heating");
        assert_eq!(sensor.read(), SignalState::Heating);

        cache.set_mode(DeviceMode::Off);
        assert_eq!(sensor.state(), "off");
        assert_eq!(sensor.read(), SignalState::Idle);

        cache.mark_unavailable();
        assert_eq!(sensor.state(), "unavailable");
        assert_eq!(sensor.read(), SignalState::Unknown);
    }

    #[test]
    fn state_sensor_infers_from_temperatures_when_output_unknown() {
        let cache = cache_with(DeviceSnapshot {
            current_temperature: Some(Temperature::from_celsius(18.0)),
            target_temperature: Some(Temperature::from_celsius(21.0)),
            is_heating: None,
            ..Default::default()
        });
        assert_eq!(ThermostatStateSensor::new(cache).state(), "heating");
    }

    #[test]
    fn heating_output_from_flag() {
        let cache = cache_with(DeviceSnapshot {
            heating_output_raw: Some("1".to_string()),
            is_heating: None,
            ..Default::default()
        });
        let sensor = HeatingOutputSensor::new(cache.clone());
        assert_eq!(sensor.is_on(), Some(true));

        cache.mark_unavailable();
        assert_eq!(sensor.is_on(), None);
        assert!(!sensor.available());
    }
}
