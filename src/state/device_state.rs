// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state snapshot.

use crate::client::DeviceClient;
use crate::types::FanSpeed;

use super::StateChange;

/// Snapshot of a ventilation unit's readable attributes.
///
/// A snapshot is captured in one piece from a client right after a
/// successful update and never modified afterwards. Coordinators replace
/// their cached snapshot wholesale; they never merge individual fields.
///
/// # Examples
///
/// ```
/// use smartyline::state::DeviceState;
/// use smartyline::types::FanSpeed;
///
/// let state = DeviceState::new(FanSpeed::MEDIUM, false);
/// assert_eq!(state.fan_speed(), FanSpeed::MEDIUM);
/// assert!(state.is_on());
/// ```
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeviceState {
    fan_speed: FanSpeed,
    boost: bool,
    supply_air_temperature: Option<f32>,
    extract_air_temperature: Option<f32>,
    outdoor_air_temperature: Option<f32>,
    supply_fan_rpm: Option<u16>,
    extract_fan_rpm: Option<u16>,
    filter_days_left: Option<u16>,
    alarm: bool,
    warning: bool,
}

impl DeviceState {
    /// Creates a snapshot with only fan speed and boost known.
    #[must_use]
    pub fn new(fan_speed: FanSpeed, boost: bool) -> Self {
        Self {
            fan_speed,
            boost,
            ..Self::default()
        }
    }

    /// Captures every readable attribute of a client.
    ///
    /// Call this only after `update()` reported success, otherwise the
    /// client returns whatever it read last. A temperature reported as NaN
    /// is stored as unknown.
    #[must_use]
    pub fn capture<C: DeviceClient + ?Sized>(client: &C) -> Self {
        Self {
            fan_speed: client.fan_speed(),
            boost: client.boost(),
            supply_air_temperature: reading(client.supply_air_temperature()),
            extract_air_temperature: reading(client.extract_air_temperature()),
            outdoor_air_temperature: reading(client.outdoor_air_temperature()),
            supply_fan_rpm: client.supply_fan_rpm(),
            extract_fan_rpm: client.extract_fan_rpm(),
            filter_days_left: client.filter_days_left(),
            alarm: client.alarm(),
            warning: client.warning(),
        }
    }

    // ========== Fan ==========

    /// Current fan speed.
    #[must_use]
    pub fn fan_speed(&self) -> FanSpeed {
        self.fan_speed
    }

    /// Returns true if the fan is running.
    #[must_use]
    pub fn is_on(&self) -> bool {
        !self.fan_speed.is_off()
    }

    /// Whether boost mode is active.
    #[must_use]
    pub fn boost(&self) -> bool {
        self.boost
    }

    /// Supply fan speed in RPM.
    #[must_use]
    pub fn supply_fan_rpm(&self) -> Option<u16> {
        self.supply_fan_rpm
    }

    /// Extract fan speed in RPM.
    #[must_use]
    pub fn extract_fan_rpm(&self) -> Option<u16> {
        self.extract_fan_rpm
    }

    // ========== Temperatures ==========

    /// Supply air temperature in °C.
    #[must_use]
    pub fn supply_air_temperature(&self) -> Option<f32> {
        self.supply_air_temperature
    }

    /// Extract air temperature in °C.
    #[must_use]
    pub fn extract_air_temperature(&self) -> Option<f32> {
        self.extract_air_temperature
    }

    /// Outdoor air temperature in °C.
    #[must_use]
    pub fn outdoor_air_temperature(&self) -> Option<f32> {
        self.outdoor_air_temperature
    }

    // ========== Maintenance ==========

    /// Days left until the filter should be replaced.
    #[must_use]
    pub fn filter_days_left(&self) -> Option<u16> {
        self.filter_days_left
    }

    /// Whether an alarm is active.
    #[must_use]
    pub fn alarm(&self) -> bool {
        self.alarm
    }

    /// Whether a warning is active.
    #[must_use]
    pub fn warning(&self) -> bool {
        self.warning
    }

    /// Lists the attributes that differ between `previous` and this snapshot.
    ///
    /// The list is empty when both snapshots are equal.
    #[must_use]
    pub fn changes_from(&self, previous: &Self) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if self.fan_speed != previous.fan_speed {
            changes.push(StateChange::FanSpeed(self.fan_speed));
        }
        if self.boost != previous.boost {
            changes.push(StateChange::Boost(self.boost));
        }
        if self.supply_air_temperature != previous.supply_air_temperature
            || self.extract_air_temperature != previous.extract_air_temperature
            || self.outdoor_air_temperature != previous.outdoor_air_temperature
        {
            changes.push(StateChange::Temperatures {
                supply: self.supply_air_temperature,
                extract: self.extract_air_temperature,
                outdoor: self.outdoor_air_temperature,
            });
        }
        if self.supply_fan_rpm != previous.supply_fan_rpm
            || self.extract_fan_rpm != previous.extract_fan_rpm
        {
            changes.push(StateChange::FanRpm {
                supply: self.supply_fan_rpm,
                extract: self.extract_fan_rpm,
            });
        }
        if self.filter_days_left != previous.filter_days_left {
            changes.push(StateChange::FilterDaysLeft(self.filter_days_left));
        }
        if self.alarm != previous.alarm {
            changes.push(StateChange::Alarm(self.alarm));
        }
        if self.warning != previous.warning {
            changes.push(StateChange::Warning(self.warning));
        }

        changes
    }

    /// Returns a copy with the given temperatures.
    #[must_use]
    pub fn with_temperatures(
        mut self,
        supply: Option<f32>,
        extract: Option<f32>,
        outdoor: Option<f32>,
    ) -> Self {
        self.supply_air_temperature = reading(supply);
        self.extract_air_temperature = reading(extract);
        self.outdoor_air_temperature = reading(outdoor);
        self
    }

    /// Returns a copy with the given alarm and warning flags.
    #[must_use]
    pub fn with_alerts(mut self, alarm: bool, warning: bool) -> Self {
        self.alarm = alarm;
        self.warning = warning;
        self
    }
}

// NaN is stored as unknown so equal readings always compare equal
fn reading(value: Option<f32>) -> Option<f32> {
    value.filter(|value| !value.is_nan())
}

/// Firmware and configuration versions of a unit.
///
/// Read once right after the first successful refresh and never re-read.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeviceVersions {
    /// Firmware version.
    pub software: String,
    /// Configuration version.
    pub configuration: String,
}

impl DeviceVersions {
    /// Reads both versions from a client.
    #[must_use]
    pub fn capture<C: DeviceClient + ?Sized>(client: &C) -> Self {
        Self {
            software: client.software_version(),
            configuration: client.configuration_version(),
        }
    }
}
