mod accumulator;
mod cache;
mod config;
mod diff;
mod error;
mod gateway;
mod logger;
mod poller;
mod protocol;
mod sensors;
mod session;
mod store;
mod thermostat;
mod types;

pub use accumulator::{
    AccumulatorState, DeviceSignal, HeatingAccumulator, Reading, Rollover, SignalSource,
    SignalState,
};
pub use cache::DeviceStateCache;
pub use config::{Config, ConfigOverrides, DEFAULT_NAME, MessageLogConfig};
pub use error::{AuthError, Error, GatewayError, PersistenceError, Result};
pub use gateway::DeviceGateway;
pub use logger::MessageLogMode;
pub use poller::{LocalClock, Poller, StatisticsPoller, local_clock};
pub use protocol::{DEFAULT_BASE_URL, extract_token};
pub use sensors::{HeatingOutputSensor, STATE_UNAVAILABLE, ThermostatStateSensor};
pub use session::{Clock, SessionManager, TOKEN_MAX_AGE_SECS, system_clock};
pub use store::{Attributes, JsonFileStore, MemoryStore, StateStore};
pub use thermostat::{Thermostat, ThermostatBuilder};
pub use types::*;
