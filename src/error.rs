// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `smartyline` library.
//!
//! Failures inside a single attempt are classified locally by the retry loop
//! and the command executor. Only the classified outcome crosses a component
//! boundary, and every such error carries the device address it concerns.

use std::fmt;

use thiserror::Error;

use crate::types::DeviceAddress;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The line configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A scheduled refresh exhausted its attempts.
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// A command could not be executed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The first refresh of a device failed, so the device was not brought online.
    #[error("failed to set up device {address}: {source}")]
    Setup {
        /// The device that could not be set up.
        address: DeviceAddress,
        /// The refresh failure that aborted setup.
        source: RefreshError,
    },

    /// No coordinator exists for the requested address.
    #[error("device {0} is not configured on this line")]
    DeviceNotFound(DeviceAddress),

    /// The transport gate was closed because the line is shutting down.
    #[error(transparent)]
    GateClosed(#[from] GateClosed),
}

/// The transport gate of a line was closed; no further I/O is allowed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("transport gate is closed")]
pub struct GateClosed;

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u16,
    },

    /// A string could not be parsed as a device address.
    #[error("invalid device address: {0:?}")]
    InvalidAddress(String),
}

/// Errors related to line configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The host is empty.
    #[error("host must not be empty")]
    EmptyHost,

    /// No device address was configured.
    #[error("at least one device address is required")]
    NoAddresses,

    /// The same address is configured twice.
    #[error("device address {0} is configured more than once")]
    DuplicateAddress(DeviceAddress),

    /// An address in the list is invalid.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// The retry policy allows no attempt at all.
    #[error("retry policy must allow at least one attempt")]
    NoAttempts,

    /// The poll interval is zero.
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    /// The configuration document could not be parsed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single attempt failed to reach the device or got no valid reply.
///
/// Device client implementations return this from every fallible call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The connection could not be opened.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The device did not answer in time.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The device answered with an exception or malformed frame.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Any other transport failure.
    #[error("communication error: {0}")]
    Io(String),

    /// The blocking worker running the call panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(String),
}

/// All attempts of a refresh failed.
///
/// When the final attempt raised a communication error, that error is kept
/// in [`last_error`](Self::last_error). When it only returned no data, the
/// error is the generic "no data" form even if earlier attempts raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshError {
    /// The device that could not be refreshed.
    pub address: DeviceAddress,
    /// Number of attempts made.
    pub attempts: u32,
    /// Communication error raised by the final attempt, if any.
    pub last_error: Option<ClientError>,
}

impl RefreshError {
    /// Returns true if the final attempt raised a communication error.
    #[must_use]
    pub fn is_communication_error(&self) -> bool {
        self.last_error.is_some()
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_error {
            Some(err) => write!(
                f,
                "failed to update device {} after {} attempts: {err}",
                self.address, self.attempts
            ),
            None => write!(
                f,
                "no data from device {} after {} attempts",
                self.address, self.attempts
            ),
        }
    }
}

impl std::error::Error for RefreshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error
            .as_ref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

/// A command could not be executed on a device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("command on device {address} failed: {kind}")]
pub struct CommandError {
    /// The device the command targeted.
    pub address: DeviceAddress,
    /// What went wrong.
    pub kind: CommandErrorKind,
}

impl CommandError {
    /// Creates a command error.
    #[must_use]
    pub fn new(address: DeviceAddress, kind: CommandErrorKind) -> Self {
        Self { address, kind }
    }

    /// Returns true if the device answered but refused the command.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self.kind, CommandErrorKind::Rejected(_))
    }
}

/// Classification of a command failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// The device reported that it did not accept the command.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The ephemeral connection could not be opened.
    #[error("could not connect: {0}")]
    Connect(ClientError),

    /// The command raised a communication error.
    #[error("communication error: {0}")]
    Communication(ClientError),

    /// The line is shutting down.
    #[error("transport gate is closed")]
    GateClosed,

    /// The blocking worker running the command panicked or was cancelled.
    #[error("command worker failed: {0}")]
    WorkerPanicked(String),
}

/// A connection probe could not validate a device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The device could not be reached or answered without data.
    #[error("cannot connect to device {address}")]
    CannotConnect {
        /// The probed device.
        address: DeviceAddress,
        /// The communication error, if one was raised.
        source: Option<ClientError>,
    },

    /// The probe failed for an unexpected reason.
    #[error("unexpected probe failure: {0}")]
    Unknown(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
