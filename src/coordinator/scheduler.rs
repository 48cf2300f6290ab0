// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic poll loops.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::DeviceCoordinator;
use crate::client::ClientFactory;
use crate::error::Error;

/// Drives one poll loop per coordinator.
///
/// Each loop refreshes its device every poll interval and whenever an
/// immediate refresh is requested. Requests arriving while one is pending
/// are merged. A failed refresh is reported and the loop keeps going; only
/// shutdown or a closed gate ends it.
#[derive(Debug)]
pub struct PollScheduler {
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PollScheduler {
    /// Creates a scheduler with no running loop.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Starts the poll loop of `coordinator`.
    ///
    /// The first scheduled refresh happens one interval from now; setup
    /// already performed the initial one.
    pub fn start<F: ClientFactory>(&self, coordinator: Arc<DeviceCoordinator<F>>) {
        let shutdown = self.shutdown.subscribe();
        let handle = tokio::spawn(poll_loop(coordinator, shutdown));
        self.tasks.lock().push(handle);
    }

    /// Number of loops started and not yet joined.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stops every loop and waits for them to finish.
    ///
    /// A refresh that is already talking to its device completes first.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Poll loop ended abnormally");
            }
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn poll_loop<F: ClientFactory>(
    coordinator: Arc<DeviceCoordinator<F>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let address = coordinator.address();
    let period = coordinator.options().poll_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
    tracing::debug!(%address, interval_ms, "Starting poll loop");

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
            () = coordinator.refresh_requested() => {
                ticker.reset();
            }
        }

        match coordinator.refresh().await {
            Ok(()) => {}
            Err(Error::GateClosed(_)) => break,
            Err(err) => {
                tracing::debug!(%address, error = %err, "Poll loop continues after failure");
            }
        }
    }

    coordinator.stop().await;
    tracing::debug!(%address, "Poll loop stopped");
}
