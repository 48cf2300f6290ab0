// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for ventilation unit control.
//!
//! Each type ensures values are within their valid ranges at construction
//! time.
//!
//! # Types
//!
//! - [`DeviceAddress`] - Address of a device on a shared line (1-247)
//! - [`FanSpeed`] - Fan speed level (0-3, 0 = off)

mod address;
mod fan_speed;

pub use address::DeviceAddress;
pub use fan_speed::FanSpeed;
