//! Day rollover.
//!
//! Regenerates the today view when the calendar date changes, checked on
//! every app lifecycle transition and on a fixed interval while running.

mod clock;

pub use clock::*;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::store::TreatmentStore;

/// App lifecycle state reported by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Inactive,
    Background,
}

/// Last observed date plus the store to rebuild when it changes.
pub struct DayRollover {
    clock: Arc<dyn Clock>,
    treatments: Arc<TreatmentStore>,
    last_observed: Mutex<NaiveDate>,
}

impl DayRollover {
    /// Starts observing from the clock's current date.
    pub fn new(clock: Arc<dyn Clock>, treatments: Arc<TreatmentStore>) -> Self {
        let today = clock.today();
        Self {
            clock,
            treatments,
            last_observed: Mutex::new(today),
        }
    }

    pub fn last_observed(&self) -> NaiveDate {
        *self
            .last_observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Compare the current date with the last observed one; on any change,
    /// record it and rebuild today. Returns whether a rollover fired.
    pub fn check(&self) -> bool {
        let now = self.clock.today();
        {
            let mut last = self
                .last_observed
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *last == now {
                return false;
            }
            let previous = *last;
            tracing::info!(from = %previous, to = %now, "Day rollover");
            *last = now;
        }
        self.treatments.rebuild_today();
        true
    }
}

/// Background task driving [`DayRollover::check`].
///
/// Dropping the handle stops the task as well.
pub struct RolloverWatcher {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RolloverWatcher {
    /// Check on every lifecycle event and every `interval`.
    pub fn spawn(
        rollover: Arc<DayRollover>,
        interval: Duration,
        mut lifecycle: broadcast::Receiver<Lifecycle>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut listening = true;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        rollover.check();
                    }
                    event = lifecycle.recv(), if listening => match event {
                        Ok(state) => {
                            tracing::debug!(?state, "Lifecycle transition");
                            rollover.check();
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Lifecycle events lagged");
                            rollover.check();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            listening = false;
                        }
                    },
                }
            }
            tracing::debug!("Rollover watcher stopped");
        });

        Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Stop the timer and listener and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Rollover watcher ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for RolloverWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
