// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `smartyline` - Serialized polling of ventilation units sharing one line.
//!
//! Several Salda Smarty units can hang off the same serial bus behind one
//! gateway. This library keeps a cached snapshot of each unit fresh while
//! guaranteeing that only one request is ever in flight on the line.
//!
//! # Overview
//!
//! - [`TransportGate`](gate::TransportGate): one per line, serializes every
//!   poll and command
//! - [`DeviceCoordinator`](coordinator::DeviceCoordinator): caches one
//!   unit's snapshot and refreshes it with bounded retries
//! - [`CommandExecutor`](coordinator::CommandExecutor): runs mutations on
//!   ephemeral connections
//! - [`PollScheduler`](coordinator::PollScheduler): periodic and on-demand
//!   refreshes
//! - [`Line`](line::Line): sets up and tears down all of the above
//!
//! The wire protocol is not part of this crate. Implement
//! [`DeviceClient`](client::DeviceClient) and
//! [`ClientFactory`](client::ClientFactory) for your protocol client.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use smartyline::client::ClientFactory;
//! use smartyline::line::{Line, LineConfig};
//!
//! async fn run<F: ClientFactory>(factory: F) -> smartyline::Result<()> {
//!     let config = LineConfig::new("192.168.1.40").with_address_list("1, 5")?;
//!     let line = Line::setup(config, Arc::new(factory)).await?;
//!
//!     for address in line.addresses() {
//!         if let Some(state) = line.state(address) {
//!             println!("{address}: speed {}, boost {}", state.fan_speed(), state.boost());
//!         }
//!     }
//!
//!     line.set_boost(line.addresses()[0], true).await?;
//!     line.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod gate;
pub mod line;
pub mod state;
pub mod types;

pub use client::{ClientFactory, DeviceClient, DeviceCommand};
pub use coordinator::{
    CommandExecutor, CoordinatorOptions, CoordinatorPhase, DeviceCoordinator, PollConnection,
    PollScheduler, RefreshStats, RetryPolicy, RetryingUpdater,
};
pub use error::{
    ClientError, CommandError, CommandErrorKind, ConfigError, Error, GateClosed, ProbeError,
    RefreshError, Result, ValueError,
};
pub use event::{DeviceEvent, EventBus};
pub use gate::{GateTicket, TransportGate};
pub use line::{Line, LineConfig, probe};
pub use state::{DeviceState, DeviceVersions, StateChange};
pub use types::{DeviceAddress, FanSpeed};
