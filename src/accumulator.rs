//! Heating-time statistics integrated from a polled heating/idle signal.
//!
//! One accumulator type covers every statistic: the signal it samples is a
//! [`SignalSource`] and what happens at local midnight is a [`Rollover`].

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::cache::DeviceStateCache;
use crate::error::PersistenceError;
use crate::store::{Attributes, StateStore};
use crate::types::HvacAction;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const ATTR_RUNNING: &str = "running_total_hours";
const ATTR_PREVIOUS: &str = "previous_period_total_hours";
const ATTR_TODAY: &str = "today_heating";
const ATTR_LAST_TIME: &str = "last_observation_time";
const ATTR_LAST_STATE: &str = "last_observed_state";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Heating,
    Idle,
    Unknown,
}

impl SignalState {
    pub fn from_hvac_action(action: Option<HvacAction>) -> Self {
        match action {
            Some(HvacAction::Heating) => SignalState::Heating,
            Some(HvacAction::Idle | HvacAction::Off) => SignalState::Idle,
            None => SignalState::Unknown,
        }
    }

    /// Classify an exposed state string such as "heating" or "idle".
    pub fn from_state_str(s: &str) -> Self {
        match s {
            "heating" => SignalState::Heating,
            "idle" | "off" => SignalState::Idle,
            _ => SignalState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalState::Heating => "heating",
            SignalState::Idle => "idle",
            SignalState::Unknown => "unknown",
        }
    }
}

/// Where an accumulator samples its heating/idle signal from.
pub trait SignalSource: Send + Sync {
    fn read(&self) -> SignalState;
}

impl<F> SignalSource for F
where
    F: Fn() -> SignalState + Send + Sync,
{
    fn read(&self) -> SignalState {
        self()
    }
}

/// The device's own running action, taken from the state cache.
#[derive(Clone)]
pub struct DeviceSignal {
    cache: DeviceStateCache,
}

impl DeviceSignal {
    pub fn new(cache: DeviceStateCache) -> Self {
        Self { cache }
    }
}

impl SignalSource for DeviceSignal {
    fn read(&self) -> SignalState {
        SignalState::from_hvac_action(self.cache.snapshot().hvac_action())
    }
}

/// What happens to the running total when the local date changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollover {
    /// Reset to zero; the statistic is "heating time so far today".
    SameDay,
    /// Move the finished day's total into the exposed value, then reset.
    PreviousDay,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorState {
    pub running_total_hours: f64,
    pub previous_period_total_hours: f64,
    pub last_observed_state: SignalState,
    pub last_observation_time: NaiveDateTime,
}

impl AccumulatorState {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            running_total_hours: 0.0,
            previous_period_total_hours: 0.0,
            last_observed_state: SignalState::Unknown,
            last_observation_time: now,
        }
    }

    pub fn to_attributes(&self, rollover: Rollover) -> Attributes {
        let mut attrs = BTreeMap::new();
        match rollover {
            Rollover::SameDay => {
                attrs.insert(ATTR_RUNNING.to_string(), self.running_total_hours.to_string());
            }
            Rollover::PreviousDay => {
                attrs.insert(
                    ATTR_PREVIOUS.to_string(),
                    self.previous_period_total_hours.to_string(),
                );
                attrs.insert(ATTR_TODAY.to_string(), self.running_total_hours.to_string());
            }
        }
        attrs.insert(
            ATTR_LAST_TIME.to_string(),
            self.last_observation_time.format(TIME_FORMAT).to_string(),
        );
        attrs.insert(
            ATTR_LAST_STATE.to_string(),
            self.last_observed_state.as_str().to_string(),
        );
        attrs
    }

    pub fn from_attributes(rollover: Rollover, attrs: &Attributes) -> Result<Self, PersistenceError> {
        let (running, previous) = match rollover {
            Rollover::SameDay => (hours_attr(attrs, ATTR_RUNNING)?, 0.0),
            Rollover::PreviousDay => (hours_attr(attrs, ATTR_TODAY)?, hours_attr(attrs, ATTR_PREVIOUS)?),
        };
        let time = required(attrs, ATTR_LAST_TIME)?;
        let last_observation_time = time
            .parse::<NaiveDateTime>()
            .map_err(|e| PersistenceError::Corrupt(format!("{ATTR_LAST_TIME}: {e}")))?;
        Ok(Self {
            running_total_hours: running,
            previous_period_total_hours: previous,
            last_observed_state: SignalState::from_state_str(required(attrs, ATTR_LAST_STATE)?),
            last_observation_time,
        })
    }
}

fn required<'a>(attrs: &'a Attributes, key: &str) -> Result<&'a str, PersistenceError> {
    attrs
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| PersistenceError::Corrupt(format!("missing {key}")))
}

fn hours_attr(attrs: &Attributes, key: &str) -> Result<f64, PersistenceError> {
    let raw = required(attrs, key)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(PersistenceError::Corrupt(format!("{key}: {raw:?}"))),
    }
}

/// Value plus attributes, as exposed to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub attributes: Attributes,
}

pub struct HeatingAccumulator {
    id: String,
    name: String,
    rollover: Rollover,
    source: Box<dyn SignalSource>,
    state: AccumulatorState,
}

impl HeatingAccumulator {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rollover: Rollover,
        source: Box<dyn SignalSource>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rollover,
            source,
            state: AccumulatorState::new(now),
        }
    }

    /// Build from persisted attributes when available. Load or parse failures
    /// fall back to a fresh state.
    pub fn restore_or_new(
        id: impl Into<String>,
        name: impl Into<String>,
        rollover: Rollover,
        source: Box<dyn SignalSource>,
        store: &dyn StateStore,
        now: NaiveDateTime,
    ) -> Self {
        let mut acc = Self::new(id, name, rollover, source, now);
        match store.load(&acc.id) {
            Ok(Some(attrs)) => match AccumulatorState::from_attributes(rollover, &attrs) {
                Ok(state) => {
                    debug!(id = %acc.id, hours = state.running_total_hours, "restored accumulator");
                    acc.state = state;
                }
                Err(e) => warn!(id = %acc.id, error = %e, "ignoring unreadable accumulator state"),
            },
            Ok(None) => debug!(id = %acc.id, "no persisted accumulator state"),
            Err(e) => warn!(id = %acc.id, error = %e, "failed to load accumulator state"),
        }
        acc
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rollover(&self) -> Rollover {
        self.rollover
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    /// Sample the signal source and fold the observation in.
    pub fn update(&mut self, now: NaiveDateTime) {
        let observed = self.source.read();
        self.observe(now, observed);
    }

    /// Credit the interval since the previous observation to the state seen at
    /// its start, roll over on a new local date, then record `observed`.
    pub fn observe(&mut self, now: NaiveDateTime, observed: SignalState) {
        let state = &mut self.state;
        let elapsed_ms = (now - state.last_observation_time).num_milliseconds().max(0);
        let elapsed_hours = elapsed_ms as f64 / 3_600_000.0;

        if state.last_observed_state == SignalState::Heating {
            state.running_total_hours += elapsed_hours;
        }

        if now.date() != state.last_observation_time.date() {
            if self.rollover == Rollover::PreviousDay {
                state.previous_period_total_hours = state.running_total_hours;
            }
            debug!(
                id = %self.id,
                finished_day = %state.last_observation_time.date(),
                hours = state.running_total_hours,
                "day rollover"
            );
            state.running_total_hours = 0.0;
        }

        state.last_observed_state = observed;
        state.last_observation_time = now;
    }

    /// Exposed statistic in hours, rounded to two decimals.
    pub fn value(&self) -> f64 {
        let hours = match self.rollover {
            Rollover::SameDay => self.state.running_total_hours,
            Rollover::PreviousDay => self.state.previous_period_total_hours,
        };
        (hours * 100.0).round() / 100.0
    }

    pub fn attributes(&self) -> Attributes {
        self.state.to_attributes(self.rollover)
    }

    pub fn reading(&self) -> Reading {
        Reading {
            value: self.value(),
            attributes: self.attributes(),
        }
    }

    pub fn save(&self, store: &dyn StateStore) -> Result<(), PersistenceError> {
        store.save(&self.id, &self.attributes())
    }
}
