// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lines and their configuration.
//!
//! A [`Line`] owns everything attached to one physical connection: the
//! [`TransportGate`](crate::gate::TransportGate), one coordinator per
//! configured address and the poll loops driving them.
//!
//! # Examples
//!
//! ## Configuration entry
//!
//! ```
//! use smartyline::line::LineConfig;
//!
//! let config = LineConfig::from_json(r#"{"host": "192.168.1.40", "slaves": [1, 5]}"#)?;
//! assert_eq!(config.addresses.len(), 2);
//! # Ok::<(), smartyline::error::ConfigError>(())
//! ```
//!
//! ## Watching device state
//!
//! ```no_run
//! use std::sync::Arc;
//! use smartyline::client::ClientFactory;
//! use smartyline::line::{Line, LineConfig};
//! use smartyline::types::DeviceAddress;
//!
//! # async fn example<F: ClientFactory>(factory: F) -> smartyline::Result<()> {
//! let line = Line::setup(LineConfig::new("192.168.1.40"), Arc::new(factory)).await?;
//!
//! if let Some(mut state_rx) = line.watch_device(DeviceAddress::default()) {
//!     tokio::spawn(async move {
//!         while state_rx.changed().await.is_ok() {
//!             if let Some(state) = state_rx.borrow().as_ref() {
//!                 println!("Fan speed: {}", state.fan_speed());
//!             }
//!         }
//!     });
//! }
//! # Ok(())
//! # }
//! ```

mod line_config;
mod line_manager;
mod probe;

pub use crate::coordinator::PollConnection;
pub use line_config::LineConfig;
pub use line_manager::Line;
pub use probe::probe;
