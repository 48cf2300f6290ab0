// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use std::sync::Arc;

use crate::error::RefreshError;
use crate::state::{DeviceState, DeviceVersions, StateChange};
use crate::types::DeviceAddress;

/// Events emitted by the coordinators of a line.
///
/// All events carry the address of the device they concern.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// The first refresh succeeded and the device is polled from now on.
    DeviceOnline {
        /// The device address.
        address: DeviceAddress,
        /// Versions read right after the first refresh.
        versions: DeviceVersions,
        /// The first snapshot.
        state: Arc<DeviceState>,
    },

    /// A refresh produced a snapshot that differs from the cached one.
    ///
    /// Refreshes that return identical data emit nothing.
    StateChanged {
        /// The device address.
        address: DeviceAddress,
        /// What differs from the previous snapshot.
        changes: Vec<StateChange>,
        /// The complete new snapshot.
        new_state: Arc<DeviceState>,
    },

    /// A refresh exhausted its attempts. The cached snapshot is kept.
    RefreshFailed {
        /// The device address.
        address: DeviceAddress,
        /// The classified failure.
        error: RefreshError,
    },

    /// The device became available or unavailable.
    ///
    /// A device is unavailable from a failed refresh until the next
    /// successful one.
    AvailabilityChanged {
        /// The device address.
        address: DeviceAddress,
        /// Whether the last refresh succeeded.
        available: bool,
    },

    /// The device's poll loop stopped because the line shut down.
    DeviceStopped {
        /// The device address.
        address: DeviceAddress,
    },
}

impl DeviceEvent {
    /// Returns the device address associated with this event.
    #[must_use]
    pub fn address(&self) -> DeviceAddress {
        match self {
            Self::DeviceOnline { address, .. }
            | Self::StateChanged { address, .. }
            | Self::RefreshFailed { address, .. }
            | Self::AvailabilityChanged { address, .. }
            | Self::DeviceStopped { address } => *address,
        }
    }

    /// Short name of the event variant, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceOnline { .. } => "device_online",
            Self::StateChanged { .. } => "state_changed",
            Self::RefreshFailed { .. } => "refresh_failed",
            Self::AvailabilityChanged { .. } => "availability_changed",
            Self::DeviceStopped { .. } => "device_stopped",
        }
    }

    /// Returns `true` if this is a lifecycle event (online/stopped).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::DeviceOnline { .. } | Self::DeviceStopped { .. })
    }

    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Returns `true` if this reports a failed refresh.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::RefreshFailed { .. })
    }

    /// Creates a device online event.
    #[must_use]
    pub fn online(
        address: DeviceAddress,
        versions: DeviceVersions,
        state: Arc<DeviceState>,
    ) -> Self {
        Self::DeviceOnline {
            address,
            versions,
            state,
        }
    }

    /// Creates a state changed event.
    #[must_use]
    pub fn state_changed(
        address: DeviceAddress,
        changes: Vec<StateChange>,
        new_state: Arc<DeviceState>,
    ) -> Self {
        Self::StateChanged {
            address,
            changes,
            new_state,
        }
    }

    /// Creates a refresh failed event.
    #[must_use]
    pub fn refresh_failed(error: RefreshError) -> Self {
        Self::RefreshFailed {
            address: error.address,
            error,
        }
    }

    /// Creates an availability event.
    #[must_use]
    pub fn availability(address: DeviceAddress, available: bool) -> Self {
        Self::AvailabilityChanged { address, available }
    }

    /// Creates a device stopped event.
    #[must_use]
    pub fn stopped(address: DeviceAddress) -> Self {
        Self::DeviceStopped { address }
    }
}
