//! # Location Acquisition Task
//!
//! A long-lived task that sleeps until the scheduler requests a location, runs
//! one bounded GNSS search and reports completion with `GNSS_FIN`.
//!
//! The request trigger is a [`Notify`]: a request made while the task is busy
//! is stored as a single permit, so requests coalesce instead of queueing.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::console::Console;
use crate::drivers::{Fix, Gnss};
use crate::events::{EventBus, SharedFlags, GNSS_FIN};

/// Search limit for one acquisition
///
/// Half the reporting interval, capped at `max`. Without an interval the cap
/// applies directly.
pub fn fix_search_timeout(interval: Duration, max: Duration) -> Duration {
    if interval.is_zero() {
        max
    } else {
        (interval / 2).min(max)
    }
}

/// Acquisition task parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionSettings {
    pub search_timeout: Duration,
    /// Skipped cycles (radio busy) before the busy flag is force-cleared
    pub busy_skip_limit: u8,
    pub always_on: bool,
}

/// Handle to the running acquisition task
///
/// Dropping the handle stops the task.
pub struct AcquisitionHandle {
    trigger: Arc<Notify>,
    result: Arc<Mutex<Option<Fix>>>,
    task: JoinHandle<()>,
}

impl AcquisitionHandle {
    /// Spawn the acquisition task
    ///
    /// # Arguments
    ///
    /// * `gnss` - The receiver, owned by the task from now on
    /// * `settings` - Search limit, busy recovery and power policy
    /// * `bus` - Where `GNSS_FIN` is signaled
    /// * `flags` - Shared radio-busy flag
    /// * `console` - Sink for `+EVT:` location notifications
    pub fn spawn(
        gnss: Box<dyn Gnss>,
        settings: AcquisitionSettings,
        bus: Arc<EventBus>,
        flags: Arc<SharedFlags>,
        console: Arc<dyn Console>,
    ) -> Self {
        let trigger = Arc::new(Notify::new());
        let result = Arc::new(Mutex::new(None));

        let worker = AcquisitionWorker {
            gnss,
            settings,
            bus,
            flags,
            console,
            trigger: Arc::clone(&trigger),
            result: Arc::clone(&result),
            busy_skips: 0,
        };
        let task = tokio::spawn(worker.run());

        info!(
            "Acquisition task started (search limit {:?}, always on: {})",
            settings.search_timeout, settings.always_on
        );
        Self { trigger, result, task }
    }

    /// Ask for one acquisition cycle
    pub fn request(&self) {
        self.trigger.notify_one();
    }

    /// Result of the last finished cycle
    ///
    /// `None` when that cycle found no fix or the result was already taken.
    pub fn take_fix(&self) -> Option<Fix> {
        match self.result.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct AcquisitionWorker {
    gnss: Box<dyn Gnss>,
    settings: AcquisitionSettings,
    bus: Arc<EventBus>,
    flags: Arc<SharedFlags>,
    console: Arc<dyn Console>,
    trigger: Arc<Notify>,
    result: Arc<Mutex<Option<Fix>>>,
    busy_skips: u8,
}

impl AcquisitionWorker {
    async fn run(mut self) {
        if !self.settings.always_on {
            self.gnss.power_off();
        }

        loop {
            self.trigger.notified().await;
            debug!("Acquisition requested");

            if self.flags.radio_busy() {
                self.skip_cycle();
                continue;
            }
            self.busy_skips = 0;

            let fix = self.acquire().await;
            self.store(fix);
            self.bus.signal(GNSS_FIN);
        }
    }

    fn skip_cycle(&mut self) {
        self.busy_skips = self.busy_skips.saturating_add(1);
        if self.busy_skips >= self.settings.busy_skip_limit {
            warn!(
                "Radio still busy after {} skipped acquisitions, clearing busy flag",
                self.busy_skips
            );
            self.flags.set_radio_busy(false);
            self.busy_skips = 0;
        } else {
            debug!("Radio busy, acquisition skipped");
        }
        self.console.event("LOCATION_SKIP");
    }

    async fn acquire(&mut self) -> Option<Fix> {
        let limit = self.settings.search_timeout;
        self.console.event("START_LOCATION");

        if !self.settings.always_on {
            self.gnss.power_on();
        }

        // The driver gets the limit too, the outer timeout bounds a driver that ignores it
        let fix = match time::timeout(limit, self.gnss.acquire_fix(limit)).await {
            Ok(fix) => fix,
            Err(_) => {
                debug!("GNSS search hit the {:?} limit", limit);
                None
            }
        };

        if !self.settings.always_on {
            self.gnss.power_off();
        }

        match fix {
            Some(f) => {
                info!(
                    "Location fix {:.6}, {:.6}, {:.1} m (hdop {:.2})",
                    f.latitude_deg(),
                    f.longitude_deg(),
                    f.altitude_m(),
                    f32::from(f.accuracy) / 100.0
                );
                self.console.event("LOCATION FIX");
            }
            None => {
                info!("No location fix");
                self.console.event("LOCATION NOFIX");
            }
        }
        fix
    }

    fn store(&self, fix: Option<Fix>) {
        match self.result.lock() {
            Ok(mut slot) => *slot = fix,
            Err(poisoned) => *poisoned.into_inner() = fix,
        }
    }
}
