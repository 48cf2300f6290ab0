// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state types.
//!
//! [`DeviceState`] is the snapshot a coordinator caches for its device.
//! [`StateChange`] describes how one snapshot differs from the previous one.
//!
//! # Examples
//!
//! ```
//! use smartyline::state::{DeviceState, StateChange};
//! use smartyline::types::FanSpeed;
//!
//! let before = DeviceState::new(FanSpeed::LOW, false);
//! let after = DeviceState::new(FanSpeed::HIGH, false);
//!
//! assert_eq!(
//!     after.changes_from(&before),
//!     vec![StateChange::FanSpeed(FanSpeed::HIGH)]
//! );
//! ```

mod device_state;
mod state_change;

pub use device_state::{DeviceState, DeviceVersions};
pub use state_change::StateChange;
