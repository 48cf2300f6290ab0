// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for coordinator notifications.
//!
//! Coordinators publish [`DeviceEvent`]s on the [`EventBus`] of their line:
//! state changes, failed refreshes and availability transitions. The bus
//! uses tokio's broadcast channel so any number of subscribers can listen.
//!
//! # Examples
//!
//! ```
//! use smartyline::event::{DeviceEvent, EventBus};
//! use smartyline::types::DeviceAddress;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(DeviceEvent::availability(DeviceAddress::new(5).unwrap(), false));
//! ```

mod device_event;
mod event_bus;

pub use device_event::DeviceEvent;
pub use event_bus::EventBus;
