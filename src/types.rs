use std::fmt;

use chrono::{DateTime, Utc};

pub const MIN_SETPOINT_C: f64 = 5.0;
pub const MAX_SETPOINT_C: f64 = 34.5;

/// Temperature in Celsius, as reported and accepted by the iT500 portal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    /// Whether the portal accepts this value as a setpoint.
    pub fn is_valid_setpoint(&self) -> bool {
        (MIN_SETPOINT_C..=MAX_SETPOINT_C).contains(&self.0)
    }

    /// Snap to the 0.1 °C resolution the portal stores.
    pub fn to_setpoint_resolution(self) -> Self {
        Self((self.0 * 10.0).round() / 10.0)
    }

    /// Form encoding used by `set.php`: one decimal place.
    pub fn to_salus_setpoint(&self) -> String {
        format!("{:.1}", self.0)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

/// Commanded mode of channel 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceMode {
    #[default]
    On,
    Off,
}

impl DeviceMode {
    /// `CH1heatOnOff` is inverted: "1" means off.
    pub fn from_salus_flag(raw: &str) -> Self {
        if raw == "1" {
            DeviceMode::Off
        } else {
            DeviceMode::On
        }
    }

    pub fn as_salus_flag(&self) -> &'static str {
        match self {
            DeviceMode::On => "0",
            DeviceMode::Off => "1",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceMode::On => "ON",
            DeviceMode::Off => "OFF",
        }
    }
}

/// What the heating system is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacAction {
    Heating,
    Idle,
    Off,
}

impl HvacAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HvacAction::Heating => "heating",
            HvacAction::Idle => "idle",
            HvacAction::Off => "off",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSnapshot {
    pub current_temperature: Option<Temperature>,
    pub target_temperature: Option<Temperature>,
    pub mode: DeviceMode,
    /// `CH1heatOnOffStatus` exactly as stringified from the portal.
    pub heating_output_raw: Option<String>,
    pub is_heating: Option<bool>,
    pub available: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    /// Running action; `None` while the device is unavailable.
    ///
    /// Device-reported heating output wins. Only when it is unknown does this
    /// fall back to comparing the room temperature against the setpoint.
    pub fn hvac_action(&self) -> Option<HvacAction> {
        if !self.available {
            return None;
        }
        if self.mode == DeviceMode::Off {
            return Some(HvacAction::Off);
        }
        if let Some(heating) = self.is_heating {
            return Some(if heating { HvacAction::Heating } else { HvacAction::Idle });
        }
        if let (Some(current), Some(target)) = (self.current_temperature, self.target_temperature)
            && current < target
        {
            return Some(HvacAction::Heating);
        }
        Some(HvacAction::Idle)
    }

    /// "ON"/"OFF" view of the heating output, if known.
    pub fn heating_status(&self) -> Option<&'static str> {
        self.is_heating.map(|h| if h { "ON" } else { "OFF" })
    }
}

/// Login material for one configured device. Never persisted by this crate.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub device_id: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_id: device_id.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// Events emitted by the poller when the cached snapshot changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CurrentTemperatureChanged { temp: Option<Temperature> },
    TargetTemperatureChanged { temp: Option<Temperature> },
    ModeChanged { mode: DeviceMode },
    HeatingChanged { heating: Option<bool> },
    AvailabilityChanged { available: bool },
}
