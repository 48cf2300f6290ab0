// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device coordinator owning the cached snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, Notify, watch};

use super::command::{CommandExecutor, EphemeralClient};
use super::retry::{AttemptOutcome, RefreshCounters, RefreshStats, RetryPolicy, RetryingUpdater};
use crate::client::{ClientFactory, DeviceClient, DeviceCommand};
use crate::error::{ClientError, CommandError, Error, GateClosed, RefreshError};
use crate::event::{DeviceEvent, EventBus};
use crate::gate::TransportGate;
use crate::state::{DeviceState, DeviceVersions};
use crate::types::{DeviceAddress, FanSpeed};

/// Default interval between two scheduled refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// How the poll path obtains its connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollConnection {
    /// One connection per coordinator, opened on first use and reused by
    /// every refresh until the coordinator stops.
    #[default]
    Persistent,
    /// A fresh connection for every update attempt, closed right after it.
    Ephemeral,
}

/// Lifecycle of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorPhase {
    /// No refresh has succeeded yet.
    Initializing,
    /// A snapshot is cached and no refresh is running.
    Ready,
    /// A refresh is running; the previous snapshot is still served.
    Refreshing,
    /// The coordinator was stopped and does no more I/O.
    Stopped,
}

/// Polling behavior of one coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Time between two scheduled refreshes.
    pub poll_interval: Duration,
    /// Retry policy of each refresh.
    pub retry: RetryPolicy,
    /// Connection strategy of the poll path.
    pub poll_connection: PollConnection,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
            poll_connection: PollConnection::default(),
        }
    }
}

type RefreshOutcome = (DeviceState, Option<DeviceVersions>);

/// Keeps the cached snapshot of one device fresh.
///
/// All I/O goes through the line's [`TransportGate`]. The snapshot is
/// replaced in one piece after a successful refresh and is never touched by
/// a failed one, so readers always see a complete snapshot.
///
/// Coordinators are created with [`setup`](Self::setup) and shared behind
/// an `Arc` between the poll loop and the host.
pub struct DeviceCoordinator<F: ClientFactory> {
    address: DeviceAddress,
    host: Arc<str>,
    factory: Arc<F>,
    gate: TransportGate,
    events: EventBus,
    updater: RetryingUpdater,
    options: CoordinatorOptions,
    client: Arc<Mutex<Option<F::Client>>>,
    state_tx: watch::Sender<Option<Arc<DeviceState>>>,
    versions: OnceLock<DeviceVersions>,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
    phase: Mutex<CoordinatorPhase>,
    available: AtomicBool,
    counters: RefreshCounters,
    refresh_requested: Notify,
    refresh_running: AsyncMutex<()>,
    executor: CommandExecutor<F>,
}

impl<F: ClientFactory> DeviceCoordinator<F> {
    fn new(
        address: DeviceAddress,
        host: Arc<str>,
        factory: Arc<F>,
        gate: TransportGate,
        events: EventBus,
        options: CoordinatorOptions,
    ) -> Self {
        let executor = CommandExecutor::new(
            address,
            Arc::clone(&host),
            Arc::clone(&factory),
            gate.clone(),
        );
        let (state_tx, _) = watch::channel(None);

        Self {
            address,
            host,
            factory,
            gate,
            events,
            updater: RetryingUpdater::new(options.retry),
            options,
            client: Arc::new(Mutex::new(None)),
            state_tx,
            versions: OnceLock::new(),
            last_refresh: RwLock::new(None),
            phase: Mutex::new(CoordinatorPhase::Initializing),
            available: AtomicBool::new(false),
            counters: RefreshCounters::default(),
            refresh_requested: Notify::new(),
            refresh_running: AsyncMutex::new(()),
            executor,
        }
    }

    /// Creates a coordinator and runs its first refresh.
    ///
    /// On success the device versions are read, the first snapshot is
    /// cached and [`DeviceEvent::DeviceOnline`] is published.
    ///
    /// # Errors
    ///
    /// Returns `Error::Setup` if the first refresh exhausted its attempts,
    /// or `Error::GateClosed` if the line is shutting down. Any connection
    /// opened by the failed setup is closed.
    pub async fn setup(
        address: DeviceAddress,
        host: impl Into<Arc<str>>,
        factory: Arc<F>,
        gate: TransportGate,
        events: EventBus,
        options: CoordinatorOptions,
    ) -> Result<Arc<Self>, Error> {
        let coordinator = Arc::new(Self::new(
            address,
            host.into(),
            factory,
            gate,
            events,
            options,
        ));

        match coordinator.refresh().await {
            Ok(()) => Ok(coordinator),
            Err(err) => {
                coordinator.close_client().await;
                *coordinator.phase.lock() = CoordinatorPhase::Stopped;
                match err {
                    Error::Refresh(source) => {
                        tracing::warn!(%address, error = %source, "Device setup failed");
                        Err(Error::Setup { address, source })
                    }
                    other => Err(other),
                }
            }
        }
    }

    // ========== Accessors ==========

    /// The device address.
    #[must_use]
    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// The host of the line this device is attached to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The polling options.
    #[must_use]
    pub fn options(&self) -> CoordinatorOptions {
        self.options
    }

    /// The gate shared with the other devices on the line.
    #[must_use]
    pub fn gate(&self) -> &TransportGate {
        &self.gate
    }

    /// Returns the cached snapshot, or `None` before the first refresh.
    #[must_use]
    pub fn state(&self) -> Option<Arc<DeviceState>> {
        self.state_tx.borrow().clone()
    }

    /// Returns a receiver that sees every snapshot replacement.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<Option<Arc<DeviceState>>> {
        self.state_tx.subscribe()
    }

    /// Versions read after the first successful refresh.
    #[must_use]
    pub fn versions(&self) -> Option<&DeviceVersions> {
        self.versions.get()
    }

    /// Time of the last successful refresh.
    #[must_use]
    pub fn last_refresh_time(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.read()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> CoordinatorPhase {
        *self.phase.lock()
    }

    /// Returns true if the last refresh succeeded.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Refresh counters since setup.
    #[must_use]
    pub fn stats(&self) -> RefreshStats {
        self.counters.snapshot()
    }

    // ========== Refresh ==========

    /// Refreshes the cached snapshot.
    ///
    /// Acquires the gate, then runs up to `retry.max_attempts` update
    /// attempts with a fixed delay between them. The gate is held for the
    /// whole sequence.
    ///
    /// # Errors
    ///
    /// Returns `Error::Refresh` if every attempt failed; the previous
    /// snapshot is kept. Returns `Error::GateClosed` if the line is
    /// shutting down or the coordinator was stopped, including a stop that
    /// arrived while this refresh was waiting between attempts.
    pub async fn refresh(&self) -> Result<(), Error> {
        let _running = self.refresh_running.lock().await;
        if self.phase() == CoordinatorPhase::Stopped {
            return Err(GateClosed.into());
        }
        let ticket = Arc::new(self.gate.acquire().await?);
        let was_initializing = self.begin_refresh();

        let result = self
            .updater
            .run(self.address, &self.counters, |attempt| {
                tracing::trace!(address = %self.address, attempt, "Update attempt");
                let stopped = self.phase() == CoordinatorPhase::Stopped;
                let ticket = Arc::clone(&ticket);
                let job = self.attempt_job();
                async move {
                    if stopped {
                        return AttemptOutcome::Cancelled;
                    }
                    let outcome = tokio::task::spawn_blocking(move || {
                        let _ticket = ticket;
                        job.run()
                    })
                    .await;
                    outcome.unwrap_or_else(|err| {
                        AttemptOutcome::Failed(ClientError::Worker(err.to_string()))
                    })
                }
            })
            .await;
        drop(ticket);

        if self.phase() == CoordinatorPhase::Stopped {
            return Err(GateClosed.into());
        }
        match result {
            Ok((state, versions)) => {
                self.apply_success(state, versions, was_initializing);
                Ok(())
            }
            Err(err) => {
                self.apply_failure(&err, was_initializing);
                Err(Error::Refresh(err))
            }
        }
    }

    fn begin_refresh(&self) -> bool {
        let mut phase = self.phase.lock();
        match *phase {
            CoordinatorPhase::Initializing => true,
            CoordinatorPhase::Ready => {
                *phase = CoordinatorPhase::Refreshing;
                false
            }
            CoordinatorPhase::Refreshing | CoordinatorPhase::Stopped => false,
        }
    }

    fn end_refresh(&self, succeeded: bool) {
        let mut phase = self.phase.lock();
        match *phase {
            CoordinatorPhase::Initializing if succeeded => *phase = CoordinatorPhase::Ready,
            CoordinatorPhase::Refreshing => *phase = CoordinatorPhase::Ready,
            _ => {}
        }
    }

    fn attempt_job(&self) -> AttemptJob<F> {
        AttemptJob {
            address: self.address,
            host: Arc::clone(&self.host),
            factory: Arc::clone(&self.factory),
            slot: Arc::clone(&self.client),
            mode: self.options.poll_connection,
            need_versions: self.versions.get().is_none(),
        }
    }

    fn apply_success(
        &self,
        state: DeviceState,
        versions: Option<DeviceVersions>,
        was_initializing: bool,
    ) {
        if let Some(versions) = versions {
            self.versions.get_or_init(|| versions);
        }

        let new_state = Arc::new(state);
        let mut changes = Vec::new();
        let modified = self.state_tx.send_if_modified(|current| {
            let previous = current.clone();
            if previous.as_deref() == Some(&*new_state) {
                return false;
            }
            changes = previous
                .map(|previous| new_state.changes_from(&previous))
                .unwrap_or_default();
            *current = Some(Arc::clone(&new_state));
            true
        });

        *self.last_refresh.write() = Some(Utc::now());
        let was_available = self.available.swap(true, Ordering::AcqRel);
        self.end_refresh(true);

        if was_initializing {
            let versions = self.versions.get().cloned().unwrap_or_default();
            tracing::info!(
                address = %self.address,
                software = %versions.software,
                configuration = %versions.configuration,
                "Device online"
            );
            self.events
                .publish(DeviceEvent::online(self.address, versions, new_state));
            return;
        }

        if !was_available {
            tracing::info!(address = %self.address, "Device available again");
            self.events
                .publish(DeviceEvent::availability(self.address, true));
        }
        if modified {
            tracing::debug!(address = %self.address, ?changes, "Device state changed");
            self.events
                .publish(DeviceEvent::state_changed(self.address, changes, new_state));
        }
    }

    fn apply_failure(&self, err: &RefreshError, was_initializing: bool) {
        self.end_refresh(false);
        if was_initializing {
            return;
        }

        tracing::warn!(address = %self.address, error = %err, "Refresh failed");
        self.events.publish(DeviceEvent::refresh_failed(err.clone()));
        if self.available.swap(false, Ordering::AcqRel) {
            self.events
                .publish(DeviceEvent::availability(self.address, false));
        }
    }

    /// Asks the poll loop to refresh as soon as possible.
    ///
    /// Requests made while one is already pending are merged into it.
    pub fn request_immediate_refresh(&self) {
        tracing::trace!(address = %self.address, "Immediate refresh requested");
        self.refresh_requested.notify_one();
    }

    pub(crate) async fn refresh_requested(&self) {
        self.refresh_requested.notified().await;
    }

    // ========== Commands ==========

    /// Runs an arbitrary mutation on an ephemeral connection.
    ///
    /// The cached snapshot is not touched; call
    /// [`request_immediate_refresh`](Self::request_immediate_refresh) to
    /// resynchronize it.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` if the gate is closed, the connection could
    /// not be opened or the mutation raised.
    pub async fn execute<T, M>(&self, mutation: M) -> Result<T, CommandError>
    where
        T: Send + 'static,
        M: FnOnce(&mut F::Client) -> Result<T, ClientError> + Send + 'static,
    {
        self.executor.execute(mutation).await
    }

    /// Runs a typed command and schedules a refresh once it was accepted.
    ///
    /// # Errors
    ///
    /// Returns `Error::Command` if the command failed or was rejected.
    pub async fn send_command(&self, command: DeviceCommand) -> Result<(), Error> {
        self.executor.run_command(command).await?;
        self.request_immediate_refresh();
        Ok(())
    }

    /// Sets the fan from a percentage (0-100). Zero turns the fan off.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if the percentage is above 100, or any error
    /// of [`send_command`](Self::send_command).
    pub async fn set_fan_percentage(&self, percentage: u8) -> Result<(), Error> {
        let speed = FanSpeed::from_percentage(percentage)?;
        self.send_command(DeviceCommand::SetFanSpeed(speed)).await
    }

    /// Turns the fan on, at `percentage` or at the default on-speed.
    ///
    /// A percentage of zero also selects the default on-speed.
    ///
    /// # Errors
    ///
    /// See [`set_fan_percentage`](Self::set_fan_percentage).
    pub async fn turn_on(&self, percentage: Option<u8>) -> Result<(), Error> {
        let percentage = percentage
            .filter(|percentage| *percentage > 0)
            .unwrap_or(FanSpeed::DEFAULT_ON_PERCENTAGE);
        self.set_fan_percentage(percentage).await
    }

    /// Stops the fan.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn turn_off(&self) -> Result<(), Error> {
        self.send_command(DeviceCommand::TurnOff).await
    }

    /// Enables or disables boost mode.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn set_boost(&self, enabled: bool) -> Result<(), Error> {
        let command = if enabled {
            DeviceCommand::EnableBoost
        } else {
            DeviceCommand::DisableBoost
        };
        self.send_command(command).await
    }

    /// Restarts the filter replacement countdown.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn reset_filters_timer(&self) -> Result<(), Error> {
        self.send_command(DeviceCommand::ResetFiltersTimer).await
    }

    // ========== Teardown ==========

    /// Closes the poll connection and publishes [`DeviceEvent::DeviceStopped`].
    ///
    /// A refresh that is running finishes its current attempt first and
    /// makes no further one. Calling this more than once has no further
    /// effect.
    pub async fn stop(&self) {
        {
            let mut phase = self.phase.lock();
            if *phase == CoordinatorPhase::Stopped {
                return;
            }
            *phase = CoordinatorPhase::Stopped;
        }

        let _running = self.refresh_running.lock().await;
        self.close_client().await;
        tracing::debug!(address = %self.address, "Coordinator stopped");
        self.events.publish(DeviceEvent::stopped(self.address));
    }

    async fn close_client(&self) {
        let client = self.client.lock().take();
        let Some(client) = client else {
            return;
        };

        let address = self.address;
        let closed = tokio::task::spawn_blocking(move || {
            let _client = EphemeralClient::new(address, client);
        })
        .await;
        if let Err(err) = closed {
            tracing::debug!(%address, error = %err, "Close worker failed");
        }
    }
}

impl<F: ClientFactory> std::fmt::Debug for DeviceCoordinator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCoordinator")
            .field("address", &self.address)
            .field("host", &self.host)
            .field("phase", &self.phase())
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

/// Blocking work of one update attempt.
struct AttemptJob<F: ClientFactory> {
    address: DeviceAddress,
    host: Arc<str>,
    factory: Arc<F>,
    slot: Arc<Mutex<Option<F::Client>>>,
    mode: PollConnection,
    need_versions: bool,
}

impl<F: ClientFactory> AttemptJob<F> {
    fn run(self) -> AttemptOutcome<RefreshOutcome> {
        match self.mode {
            PollConnection::Persistent => self.run_persistent(),
            PollConnection::Ephemeral => match self.factory.connect(&self.host, self.address) {
                Ok(client) => {
                    let mut client = EphemeralClient::new(self.address, client);
                    update_and_capture(client.get_mut(), self.need_versions)
                }
                Err(err) => AttemptOutcome::Failed(err),
            },
        }
    }

    fn run_persistent(self) -> AttemptOutcome<RefreshOutcome> {
        let address = self.address;
        let mut slot = self.slot.lock();
        let mut client = match slot.take() {
            Some(client) => client,
            None => match self.factory.connect(&self.host, address) {
                Ok(client) => {
                    tracing::debug!(%address, host = %self.host, "Opened poll connection");
                    client
                }
                Err(err) => return AttemptOutcome::Failed(err),
            },
        };

        let outcome = update_and_capture(&mut client, self.need_versions);
        if matches!(outcome, AttemptOutcome::Failed(_)) {
            // Reconnect on the next attempt
            if let Err(err) = client.close() {
                tracing::debug!(%address, error = %err, "Ignoring close failure");
            }
        } else {
            *slot = Some(client);
        }
        outcome
    }
}

fn update_and_capture<C: DeviceClient>(
    client: &mut C,
    need_versions: bool,
) -> AttemptOutcome<RefreshOutcome> {
    match client.update() {
        Ok(true) => {
            let state = DeviceState::capture(client);
            let versions = need_versions.then(|| DeviceVersions::capture(client));
            AttemptOutcome::Success((state, versions))
        }
        Ok(false) => AttemptOutcome::NoData,
        Err(err) => AttemptOutcome::Failed(err),
    }
}
