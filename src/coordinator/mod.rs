// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device coordination on a shared line.
//!
//! - [`DeviceCoordinator`] caches one device's snapshot and refreshes it
//! - [`RetryingUpdater`] runs the bounded retry of a refresh
//! - [`CommandExecutor`] applies mutations on ephemeral connections
//! - [`PollScheduler`] drives the periodic refresh of every coordinator
//!
//! Everything that talks to a device first acquires the line's
//! [`TransportGate`](crate::gate::TransportGate).

mod command;
mod device_coordinator;
mod retry;
mod scheduler;

pub use command::CommandExecutor;
pub use device_coordinator::{
    CoordinatorOptions, CoordinatorPhase, DEFAULT_POLL_INTERVAL, DeviceCoordinator,
    PollConnection,
};
pub use retry::{
    AttemptKind, AttemptOutcome, MAX_RETRIES, RETRY_DELAY, RefreshAttempt, RefreshCounters,
    RefreshStats, RetryPolicy, RetryingUpdater,
};
pub use scheduler::PollScheduler;
