//! # Software Timers
//!
//! Periodic and one-shot timers built on tokio tasks. A timer's callback runs
//! in the timer task, the equivalent of a timer ISR, so it must only do
//! minimal work: set event bits, flip a flag.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// A restartable software timer
pub struct SoftTimer {
    name: &'static str,
    callback: Callback,
    period: Duration,
    repeating: bool,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SoftTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftTimer")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("repeating", &self.repeating)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SoftTimer {
    /// Timer that fires every period until stopped
    pub fn periodic<F>(name: &'static str, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(callback), true)
    }

    /// Timer that fires once per start
    pub fn one_shot<F>(name: &'static str, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(callback), false)
    }

    fn new(name: &'static str, callback: Callback, repeating: bool) -> Self {
        Self {
            name,
            callback,
            period: Duration::ZERO,
            repeating,
            handle: None,
        }
    }

    /// Start (or restart) the timer with a new period
    ///
    /// A zero period leaves the timer stopped.
    pub fn start(&mut self, period: Duration) {
        self.period = period;
        self.restart();
    }

    /// Restart the current period from now
    pub fn reset(&mut self) {
        if self.is_running() {
            self.restart();
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn restart(&mut self) {
        self.stop();
        if self.period.is_zero() {
            return;
        }

        let name = self.name;
        let period = self.period;
        let callback = Arc::clone(&self.callback);
        // The period runs from the call, not from the first poll of the task
        let deadline = Instant::now() + period;

        let handle = if self.repeating {
            tokio::spawn(async move {
                let mut ticker = time::interval_at(deadline, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    trace!("{} timer fired", name);
                    callback();
                }
            })
        } else {
            tokio::spawn(async move {
                time::sleep_until(deadline).await;
                trace!("{} timer fired", name);
                callback();
            })
        };
        self.handle = Some(handle);
    }
}

impl Drop for SoftTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
