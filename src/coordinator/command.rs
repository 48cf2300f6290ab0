// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-shot command execution over an ephemeral connection.

use std::sync::Arc;

use crate::client::{ClientFactory, DeviceClient, DeviceCommand};
use crate::error::{ClientError, CommandError, CommandErrorKind};
use crate::gate::TransportGate;
use crate::types::DeviceAddress;

/// Runs device mutations, each on its own connection, under the line's gate.
///
/// The sequence for every command is: acquire the gate, connect, apply the
/// mutation, close, release. The connection is closed on every exit path
/// after a successful connect, and a failing close never replaces the
/// command's own outcome.
pub struct CommandExecutor<F: ClientFactory> {
    address: DeviceAddress,
    host: Arc<str>,
    factory: Arc<F>,
    gate: TransportGate,
}

impl<F: ClientFactory> CommandExecutor<F> {
    /// Creates an executor for one device.
    pub fn new(
        address: DeviceAddress,
        host: impl Into<Arc<str>>,
        factory: Arc<F>,
        gate: TransportGate,
    ) -> Self {
        Self {
            address,
            host: host.into(),
            factory,
            gate,
        }
    }

    /// The device this executor targets.
    #[must_use]
    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// Runs `mutation` on a fresh connection and returns its result.
    ///
    /// # Errors
    ///
    /// - `CommandErrorKind::GateClosed` if the line is shutting down
    /// - `CommandErrorKind::Connect` if the connection could not be opened
    /// - `CommandErrorKind::Communication` if the mutation raised
    /// - `CommandErrorKind::WorkerPanicked` if the mutation panicked
    pub async fn execute<T, M>(&self, mutation: M) -> Result<T, CommandError>
    where
        T: Send + 'static,
        M: FnOnce(&mut F::Client) -> Result<T, ClientError> + Send + 'static,
    {
        let address = self.address;
        let ticket = self
            .gate
            .acquire()
            .await
            .map_err(|_| CommandError::new(address, CommandErrorKind::GateClosed))?;

        let host = Arc::clone(&self.host);
        let factory = Arc::clone(&self.factory);

        let job = tokio::task::spawn_blocking(move || {
            // Released when the job ends, even if the caller stopped waiting
            let _ticket = ticket;

            let client = factory.connect(&host, address).map_err(|err| {
                tracing::debug!(%address, error = %err, "Command connection failed");
                CommandError::new(address, CommandErrorKind::Connect(err))
            })?;
            let mut client = EphemeralClient::new(address, client);

            mutation(client.get_mut())
                .map_err(|err| CommandError::new(address, CommandErrorKind::Communication(err)))
        });

        job.await.map_err(|err| {
            tracing::warn!(%address, error = %err, "Command worker failed");
            CommandError::new(address, CommandErrorKind::WorkerPanicked(err.to_string()))
        })?
    }

    /// Applies a typed command.
    ///
    /// # Errors
    ///
    /// Returns `CommandErrorKind::Rejected` if the device refused the
    /// command, or any error of [`execute`](Self::execute).
    pub async fn run_command(&self, command: DeviceCommand) -> Result<(), CommandError> {
        tracing::debug!(address = %self.address, %command, "Executing command");

        let accepted = self
            .execute(move |client: &mut F::Client| command.apply(client))
            .await?;

        if accepted {
            Ok(())
        } else {
            tracing::warn!(address = %self.address, %command, "Device rejected command");
            Err(CommandError::new(
                self.address,
                CommandErrorKind::Rejected(command.to_string()),
            ))
        }
    }
}

impl<F: ClientFactory> std::fmt::Debug for CommandExecutor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("address", &self.address)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Closes the wrapped client when dropped.
pub(super) struct EphemeralClient<C: DeviceClient> {
    address: DeviceAddress,
    client: C,
}

impl<C: DeviceClient> EphemeralClient<C> {
    pub(super) fn new(address: DeviceAddress, client: C) -> Self {
        Self { address, client }
    }

    pub(super) fn get_mut(&mut self) -> &mut C {
        &mut self.client
    }
}

impl<C: DeviceClient> Drop for EphemeralClient<C> {
    fn drop(&mut self) {
        if let Err(err) = self.client.close() {
            tracing::debug!(address = %self.address, error = %err, "Ignoring close failure");
        }
    }
}
