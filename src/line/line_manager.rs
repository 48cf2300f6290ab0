// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! All coordinators of one line.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use super::LineConfig;
use crate::client::{ClientFactory, DeviceCommand};
use crate::coordinator::{DeviceCoordinator, PollScheduler};
use crate::error::Error;
use crate::event::{DeviceEvent, EventBus};
use crate::gate::TransportGate;
use crate::state::DeviceState;
use crate::types::DeviceAddress;

/// A line with its devices, their coordinators and poll loops.
///
/// All coordinators share one [`TransportGate`] and one [`EventBus`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use smartyline::client::ClientFactory;
/// use smartyline::line::{Line, LineConfig};
///
/// async fn run<F: ClientFactory>(factory: F) -> smartyline::Result<()> {
///     let config = LineConfig::new("192.168.1.40").with_address_list("1, 5")?;
///     let line = Line::setup(config, Arc::new(factory)).await?;
///
///     let mut events = line.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("{:?}", event);
///         }
///     });
///
///     line.turn_on(line.addresses()[0], Some(100)).await?;
///     line.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Line<F: ClientFactory> {
    config: LineConfig,
    factory: Arc<F>,
    gate: TransportGate,
    events: EventBus,
    coordinators: Vec<Arc<DeviceCoordinator<F>>>,
    scheduler: PollScheduler,
}

impl<F: ClientFactory> Line<F> {
    /// Creates a line without touching any device.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn new(config: LineConfig, factory: Arc<F>) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            gate: TransportGate::new(config.host.clone()),
            events: EventBus::with_capacity(config.event_capacity),
            config,
            factory,
            coordinators: Vec::new(),
            scheduler: PollScheduler::new(),
        })
    }

    /// Creates a line and brings every device online.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new) and [`start`](Self::start).
    pub async fn setup(config: LineConfig, factory: Arc<F>) -> Result<Self, Error> {
        let mut line = Self::new(config, factory)?;
        line.start().await?;
        Ok(line)
    }

    /// Sets up one coordinator per address, in configuration order, then
    /// starts their poll loops.
    ///
    /// First refreshes run one after the other. If one fails, the
    /// coordinators created so far are stopped, the gate is closed and the
    /// error is returned; the line cannot be started again.
    ///
    /// # Errors
    ///
    /// Returns `Error::Setup` for the first device whose initial refresh
    /// failed, or `Error::GateClosed` if the line was already shut down.
    pub async fn start(&mut self) -> Result<(), Error> {
        if !self.coordinators.is_empty() {
            tracing::debug!(host = %self.config.host, "Line already started");
            return Ok(());
        }

        tracing::info!(
            host = %self.config.host,
            devices = self.config.addresses.len(),
            "Setting up line"
        );
        let options = self.config.coordinator_options();
        let host: Arc<str> = Arc::from(self.config.host.as_str());

        for &address in &self.config.addresses {
            let setup = DeviceCoordinator::setup(
                address,
                Arc::clone(&host),
                Arc::clone(&self.factory),
                self.gate.clone(),
                self.events.clone(),
                options,
            )
            .await;

            match setup {
                Ok(coordinator) => self.coordinators.push(coordinator),
                Err(err) => {
                    tracing::warn!(
                        host = %self.config.host,
                        %address,
                        error = %err,
                        "Line setup failed"
                    );
                    self.gate.close();
                    for coordinator in self.coordinators.drain(..) {
                        coordinator.stop().await;
                    }
                    return Err(err);
                }
            }
        }

        for coordinator in &self.coordinators {
            self.scheduler.start(Arc::clone(coordinator));
        }
        Ok(())
    }

    // ========== Accessors ==========

    /// The line configuration.
    #[must_use]
    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    /// The gate serializing this line.
    #[must_use]
    pub fn gate(&self) -> &TransportGate {
        &self.gate
    }

    /// Subscribes to events of every device on the line.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Addresses of the devices that are online, in setup order.
    #[must_use]
    pub fn addresses(&self) -> Vec<DeviceAddress> {
        self.coordinators.iter().map(|c| c.address()).collect()
    }

    /// All coordinators, in setup order.
    #[must_use]
    pub fn coordinators(&self) -> &[Arc<DeviceCoordinator<F>>] {
        &self.coordinators
    }

    /// Returns the coordinator of `address`.
    #[must_use]
    pub fn coordinator(&self, address: DeviceAddress) -> Option<&Arc<DeviceCoordinator<F>>> {
        self.coordinators.iter().find(|c| c.address() == address)
    }

    fn require(&self, address: DeviceAddress) -> Result<&Arc<DeviceCoordinator<F>>, Error> {
        self.coordinator(address).ok_or(Error::DeviceNotFound(address))
    }

    /// Returns the cached snapshot of `address`.
    #[must_use]
    pub fn state(&self, address: DeviceAddress) -> Option<Arc<DeviceState>> {
        self.coordinator(address).and_then(|c| c.state())
    }

    /// Returns a receiver for snapshot replacements of `address`.
    #[must_use]
    pub fn watch_device(
        &self,
        address: DeviceAddress,
    ) -> Option<watch::Receiver<Option<Arc<DeviceState>>>> {
        self.coordinator(address).map(|c| c.watch_state())
    }

    // ========== Commands ==========

    /// Runs a typed command on `address`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown address, or the
    /// command's error.
    pub async fn send_command(
        &self,
        address: DeviceAddress,
        command: DeviceCommand,
    ) -> Result<(), Error> {
        self.require(address)?.send_command(command).await
    }

    /// Sets the fan of `address` from a percentage.
    ///
    /// # Errors
    ///
    /// See [`DeviceCoordinator::set_fan_percentage`].
    pub async fn set_fan_percentage(
        &self,
        address: DeviceAddress,
        percentage: u8,
    ) -> Result<(), Error> {
        self.require(address)?.set_fan_percentage(percentage).await
    }

    /// Turns the fan of `address` on.
    ///
    /// # Errors
    ///
    /// See [`DeviceCoordinator::turn_on`].
    pub async fn turn_on(
        &self,
        address: DeviceAddress,
        percentage: Option<u8>,
    ) -> Result<(), Error> {
        self.require(address)?.turn_on(percentage).await
    }

    /// Stops the fan of `address`.
    ///
    /// # Errors
    ///
    /// See [`DeviceCoordinator::turn_off`].
    pub async fn turn_off(&self, address: DeviceAddress) -> Result<(), Error> {
        self.require(address)?.turn_off().await
    }

    /// Enables or disables boost on `address`.
    ///
    /// # Errors
    ///
    /// See [`DeviceCoordinator::set_boost`].
    pub async fn set_boost(&self, address: DeviceAddress, enabled: bool) -> Result<(), Error> {
        self.require(address)?.set_boost(enabled).await
    }

    /// Restarts the filter replacement countdown of `address`.
    ///
    /// # Errors
    ///
    /// See [`DeviceCoordinator::reset_filters_timer`].
    pub async fn reset_filters_timer(&self, address: DeviceAddress) -> Result<(), Error> {
        self.require(address)?.reset_filters_timer().await
    }

    /// Asks the poll loop of `address` to refresh now.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown address.
    pub fn request_refresh(&self, address: DeviceAddress) -> Result<(), Error> {
        self.require(address)?.request_immediate_refresh();
        Ok(())
    }

    // ========== Teardown ==========

    /// Stops every poll loop and closes the gate.
    ///
    /// Operations already holding the gate complete; everything waiting for
    /// it fails with `GateClosed`.
    pub async fn shutdown(self) {
        tracing::info!(host = %self.config.host, "Shutting down line");
        self.gate.close();
        self.scheduler.shutdown().await;
        for coordinator in &self.coordinators {
            coordinator.stop().await;
        }
    }
}

impl<F: ClientFactory> std::fmt::Debug for Line<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .field("devices", &self.addresses())
            .finish_non_exhaustive()
    }
}
