use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, error};

use crate::accumulator::{DeviceSignal, HeatingAccumulator, Rollover};
use crate::cache::DeviceStateCache;
use crate::config::{Config, DEFAULT_NAME};
use crate::error::{Error, GatewayError, Result};
use crate::gateway::DeviceGateway;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::poller::{Callbacks, Poller};
use crate::protocol::{DEFAULT_BASE_URL, Endpoints};
use crate::sensors::{HeatingOutputSensor, ThermostatStateSensor};
use crate::session::{Clock, SessionManager, system_clock};
use crate::store::{Attributes, StateStore};
use crate::types::*;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub struct ThermostatBuilder {
    credentials: Credentials,
    name: String,
    base_url: String,
    timeout: Duration,
    poll_interval: Duration,
    callbacks: Callbacks,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
    clock: Option<Clock>,
}

impl ThermostatBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            name: DEFAULT_NAME.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            callbacks: Callbacks::default(),
            log_mode: None,
            log_path: None,
            clock: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new(config.credentials())
            .name(&config.name)
            .base_url(&config.base_url)
            .timeout(config.request_timeout())
            .poll_interval(config.poll_interval());
        if let Some(log) = &config.message_log {
            builder = builder.message_log(log.mode, &log.path);
        }
        builder
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Upper bound for every portal request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.callbacks.events.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&DeviceSnapshot) + Send + Sync + 'static) -> Self {
        self.callbacks.snapshots.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    /// Time source for token ageing and snapshot timestamps.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Thermostat> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?.shared()),
            _ => None,
        };

        let clock = self.clock.unwrap_or_else(system_clock);
        let session = SessionManager::new(
            http,
            Endpoints::new(self.base_url),
            self.credentials,
            clock.clone(),
            logger,
        );
        let gateway = Arc::new(DeviceGateway::new(session));
        let cache = DeviceStateCache::new();
        let poller = Poller::new(
            gateway.clone(),
            cache.clone(),
            Arc::new(self.callbacks),
            clock,
            self.poll_interval,
        );

        Ok(Thermostat {
            name: self.name,
            gateway,
            cache,
            poller,
        })
    }
}

/// Everything belonging to one configured device: its session and gateway,
/// the cached snapshot, and the command surface.
pub struct Thermostat {
    name: String,
    gateway: Arc<DeviceGateway>,
    cache: DeviceStateCache,
    poller: Poller,
}

impl Thermostat {
    pub fn builder(credentials: Credentials) -> ThermostatBuilder {
        ThermostatBuilder::new(credentials)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        ThermostatBuilder::from_config(config).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_id(&self) -> &str {
        self.gateway.session().device_id()
    }

    pub fn gateway(&self) -> &DeviceGateway {
        &self.gateway
    }

    pub fn cache(&self) -> DeviceStateCache {
        self.cache.clone()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.cache.snapshot()
    }

    pub fn hvac_action(&self) -> Option<HvacAction> {
        self.cache.snapshot().hvac_action()
    }

    pub fn min_temp(&self) -> f64 {
        MIN_SETPOINT_C
    }

    pub fn max_temp(&self) -> f64 {
        MAX_SETPOINT_C
    }

    /// Raw and friendly heating-output values for the host's attribute view.
    pub fn attributes(&self) -> Attributes {
        let snap = self.cache.snapshot();
        let mut attrs = Attributes::new();
        let mut put = |key: &str, value: Option<String>| {
            attrs.insert(key.to_string(), value.unwrap_or_else(|| "unknown".to_string()));
        };
        put("ch1_heat_on_off_status_raw", snap.heating_output_raw.clone());
        put("ch1_heat_on_off_status", snap.heating_status().map(str::to_string));
        put("is_heating", snap.is_heating.map(|h| h.to_string()));
        attrs
    }

    pub fn poller(&self) -> Poller {
        self.poller.clone()
    }

    /// Refresh the snapshot now. Returns whether the device answered.
    pub async fn update(&self) -> bool {
        self.poller.poll_once().await
    }

    /// Record `temperature` as the target and send it to the device. The value
    /// is snapped to 0.1 °C first so the cache holds exactly what is sent.
    ///
    /// The local target is kept even when the portal write fails; the error
    /// is logged and returned.
    pub async fn set_temperature(&self, temperature: f64) -> Result<()> {
        let target = Temperature::from_celsius(temperature).to_setpoint_resolution();
        if !target.is_valid_setpoint() {
            return Err(Error::SetpointOutOfRange(temperature));
        }
        self.cache.set_target_temperature(target);
        debug!(device = %self.device_id(), %target, "setting target temperature");
        let result = self.gateway.write_setpoint(target).await;
        self.report_write("set_temperature", result)
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.cache.set_mode(DeviceMode::On);
        let result = self.gateway.write_mode(false).await;
        self.report_write("turn_on", result)
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.cache.set_mode(DeviceMode::Off);
        let result = self.gateway.write_mode(true).await;
        self.report_write("turn_off", result)
    }

    fn report_write(&self, action: &str, result: std::result::Result<(), GatewayError>) -> Result<()> {
        result.map_err(|e| {
            error!(device = %self.device_id(), action, error = %e, "write failed");
            Error::Gateway(e)
        })
    }

    pub fn state_sensor(&self) -> ThermostatStateSensor {
        ThermostatStateSensor::new(self.cache.clone())
    }

    pub fn heating_output_sensor(&self) -> HeatingOutputSensor {
        HeatingOutputSensor::new(self.cache.clone())
    }

    /// The three standard statistics, restored from `store` where possible:
    /// heating time today, heating time yesterday, and heating time today as
    /// seen through the state sensor.
    pub fn standard_statistics(
        &self,
        store: &dyn StateStore,
        now: NaiveDateTime,
    ) -> Vec<HeatingAccumulator> {
        let slug = slug(&self.name);
        vec![
            HeatingAccumulator::restore_or_new(
                format!("{slug}_heater_history"),
                "Heater History",
                Rollover::SameDay,
                Box::new(DeviceSignal::new(self.cache.clone())),
                store,
                now,
            ),
            HeatingAccumulator::restore_or_new(
                format!("{slug}_yesterday_heater_history"),
                "Yesterday Heater History",
                Rollover::PreviousDay,
                Box::new(DeviceSignal::new(self.cache.clone())),
                store,
                now,
            ),
            HeatingAccumulator::restore_or_new(
                format!("{slug}_heating_time"),
                "Heating Time",
                Rollover::SameDay,
                Box::new(self.state_sensor()),
                store,
                now,
            ),
        ]
    }
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
