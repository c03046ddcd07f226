use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::accumulator::HeatingAccumulator;
use crate::cache::DeviceStateCache;
use crate::diff::snapshot_events;
use crate::gateway::DeviceGateway;
use crate::session::Clock;
use crate::store::StateStore;
use crate::types::{DeviceSnapshot, Event};

pub(crate) type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
pub(crate) type SnapshotCallback = Box<dyn Fn(&DeviceSnapshot) + Send + Sync>;

pub type LocalClock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn local_clock() -> LocalClock {
    Arc::new(|| Local::now().naive_local())
}

#[derive(Default)]
pub(crate) struct Callbacks {
    pub(crate) events: Vec<EventCallback>,
    pub(crate) snapshots: Vec<SnapshotCallback>,
}

/// Periodically refreshes the device snapshot. Failures never escape a cycle;
/// they leave the cache marked unavailable and the next tick tries again.
///
/// Clones share one cycle lock, so a manual refresh and the background loop
/// never interleave. Optimistic command updates that land mid-cycle are
/// reported by that cycle's events.
#[derive(Clone)]
pub struct Poller {
    cycle: Arc<Mutex<()>>,
    gateway: Arc<DeviceGateway>,
    cache: DeviceStateCache,
    callbacks: Arc<Callbacks>,
    clock: Clock,
    period: Duration,
}

impl Poller {
    pub(crate) fn new(
        gateway: Arc<DeviceGateway>,
        cache: DeviceStateCache,
        callbacks: Arc<Callbacks>,
        clock: Clock,
        period: Duration,
    ) -> Self {
        Self {
            cycle: Arc::new(Mutex::new(())),
            gateway,
            cache,
            callbacks,
            clock,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one read cycle. Returns whether the device is available afterwards.
    pub async fn poll_once(&self) -> bool {
        let _cycle = self.cycle.lock().await;
        let before = self.cache.snapshot();
        let available = match self.gateway.read_status().await {
            Ok(snapshot) => {
                self.cache.apply_read(snapshot, (self.clock)());
                true
            }
            Err(e) => {
                warn!(
                    device = %self.gateway.session().device_id(),
                    error = %e,
                    retryable = e.is_retryable(),
                    "status poll failed"
                );
                self.cache.mark_unavailable();
                false
            }
        };

        let after = self.cache.snapshot();
        let events = snapshot_events(&before, &after);
        for event in &events {
            for cb in &self.callbacks.events {
                cb(event);
            }
        }
        if available {
            for cb in &self.callbacks.snapshots {
                cb(&after);
            }
        }
        if !events.is_empty() {
            debug!(count = events.len(), "snapshot changed");
        }
        available
    }

    pub async fn run(self) {
        info!(interval_secs = self.period.as_secs(), "device poller started");
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Drives a set of heating-time accumulators on their own cadence and
/// persists each one after it is updated.
pub struct StatisticsPoller {
    accumulators: Vec<Arc<Mutex<HeatingAccumulator>>>,
    store: Arc<dyn StateStore>,
    clock: LocalClock,
    period: Duration,
}

impl StatisticsPoller {
    pub fn new(store: Arc<dyn StateStore>, period: Duration) -> Self {
        Self {
            accumulators: Vec::new(),
            store,
            clock: local_clock(),
            period,
        }
    }

    pub fn with_clock(mut self, clock: LocalClock) -> Self {
        self.clock = clock;
        self
    }

    /// Register an accumulator and return the shared handle used to read it.
    pub fn add(&mut self, accumulator: HeatingAccumulator) -> Arc<Mutex<HeatingAccumulator>> {
        let handle = Arc::new(Mutex::new(accumulator));
        self.accumulators.push(handle.clone());
        handle
    }

    pub async fn tick(&self) {
        let now = (self.clock)();
        for acc in &self.accumulators {
            let mut acc = acc.lock().await;
            acc.update(now);
            if let Err(e) = acc.save(self.store.as_ref()) {
                warn!(id = %acc.id(), error = %e, "failed to persist accumulator");
            }
        }
    }

    pub async fn run(self) {
        info!(
            interval_secs = self.period.as_secs(),
            count = self.accumulators.len(),
            "statistics poller started"
        );
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
