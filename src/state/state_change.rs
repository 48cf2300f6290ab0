// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! Changes describe how a new snapshot differs from the previous one. They
//! are informational: snapshots are always replaced as a whole, and changes
//! are only computed to tell subscribers what moved.

use crate::types::FanSpeed;

/// One attribute group that differs between two snapshots.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StateChange {
    /// Fan speed changed.
    FanSpeed(FanSpeed),

    /// Boost mode was switched.
    Boost(bool),

    /// At least one air temperature changed.
    Temperatures {
        /// Supply air temperature in °C.
        supply: Option<f32>,
        /// Extract air temperature in °C.
        extract: Option<f32>,
        /// Outdoor air temperature in °C.
        outdoor: Option<f32>,
    },

    /// At least one fan RPM reading changed.
    FanRpm {
        /// Supply fan RPM.
        supply: Option<u16>,
        /// Extract fan RPM.
        extract: Option<u16>,
    },

    /// Filter countdown changed.
    FilterDaysLeft(Option<u16>),

    /// Alarm flag changed.
    Alarm(bool),

    /// Warning flag changed.
    Warning(bool),
}

impl StateChange {
    /// Returns true for changes caused by user-controllable attributes.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self, Self::FanSpeed(_) | Self::Boost(_))
    }

    /// Returns true for alarm or warning changes.
    #[must_use]
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Alarm(_) | Self::Warning(_))
    }
}
