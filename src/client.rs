// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability interface of the device protocol client.
//!
//! The wire protocol lives outside this crate. A protocol implementation
//! plugs in by implementing [`DeviceClient`] for its connection type and
//! [`ClientFactory`] for whatever opens such connections.
//!
//! All methods are blocking. The coordinator only ever calls them from the
//! blocking worker pool and never shares one client between two concurrent
//! operations.

use crate::error::ClientError;
use crate::types::{DeviceAddress, FanSpeed};

/// A connection to one ventilation unit.
///
/// [`update`](Self::update) reads the device registers into the client; the
/// getters then return the values read by the last successful update.
pub trait DeviceClient: Send + 'static {
    /// Reads the current device registers.
    ///
    /// Returns `Ok(false)` if the call completed but produced no new data.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the device could not be reached.
    fn update(&mut self) -> Result<bool, ClientError>;

    // ========== Getters ==========

    /// Current fan speed level.
    fn fan_speed(&self) -> FanSpeed;

    /// Whether boost mode is active.
    fn boost(&self) -> bool;

    /// Firmware version string.
    fn software_version(&self) -> String;

    /// Configuration version string.
    fn configuration_version(&self) -> String;

    /// Supply air temperature in °C.
    fn supply_air_temperature(&self) -> Option<f32> {
        None
    }

    /// Extract air temperature in °C.
    fn extract_air_temperature(&self) -> Option<f32> {
        None
    }

    /// Outdoor air temperature in °C.
    fn outdoor_air_temperature(&self) -> Option<f32> {
        None
    }

    /// Supply fan speed in RPM.
    fn supply_fan_rpm(&self) -> Option<u16> {
        None
    }

    /// Extract fan speed in RPM.
    fn extract_fan_rpm(&self) -> Option<u16> {
        None
    }

    /// Days left until the filter should be replaced.
    fn filter_days_left(&self) -> Option<u16> {
        None
    }

    /// Whether an alarm is active.
    fn alarm(&self) -> bool {
        false
    }

    /// Whether a warning is active.
    fn warning(&self) -> bool {
        false
    }

    // ========== Commands ==========

    /// Sets the fan speed (1-3).
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the device could not be reached.
    fn set_fan_speed(&mut self, speed: FanSpeed) -> Result<bool, ClientError>;

    /// Enables boost mode.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the device could not be reached.
    fn enable_boost(&mut self) -> Result<bool, ClientError>;

    /// Disables boost mode.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the device could not be reached.
    fn disable_boost(&mut self) -> Result<bool, ClientError>;

    /// Stops the fan.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the device could not be reached.
    fn turn_off(&mut self) -> Result<bool, ClientError>;

    /// Restarts the filter replacement countdown.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the device could not be reached.
    fn reset_filters_timer(&mut self) -> Result<bool, ClientError>;

    /// Closes the underlying connection.
    ///
    /// Must be safe to call on a connection that was never opened or is
    /// already closed.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if closing failed. Callers ignore this error.
    fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens device clients for addresses on a line.
pub trait ClientFactory: Send + Sync + 'static {
    /// The client type produced by this factory.
    type Client: DeviceClient;

    /// Opens a client for `address` on the line reachable at `host`.
    ///
    /// This may block while the connection is established.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the connection could not be opened.
    fn connect(&self, host: &str, address: DeviceAddress) -> Result<Self::Client, ClientError>;
}

/// A typed device mutation.
///
/// Commands can also be given to the executor as plain closures; this enum
/// names the ones the units support so hosts can forward them without
/// writing closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeviceCommand {
    /// Set the fan to a running speed.
    SetFanSpeed(FanSpeed),
    /// Turn boost mode on.
    EnableBoost,
    /// Turn boost mode off.
    DisableBoost,
    /// Stop the fan.
    TurnOff,
    /// Restart the filter replacement countdown.
    ResetFiltersTimer,
}

impl DeviceCommand {
    /// Applies the command to a client and returns whether it was accepted.
    ///
    /// Setting speed 0 is sent as [`TurnOff`](Self::TurnOff).
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the device could not be reached.
    pub fn apply<C: DeviceClient + ?Sized>(&self, client: &mut C) -> Result<bool, ClientError> {
        match *self {
            Self::SetFanSpeed(speed) if speed.is_off() => client.turn_off(),
            Self::SetFanSpeed(speed) => client.set_fan_speed(speed),
            Self::EnableBoost => client.enable_boost(),
            Self::DisableBoost => client.disable_boost(),
            Self::TurnOff => client.turn_off(),
            Self::ResetFiltersTimer => client.reset_filters_timer(),
        }
    }
}

impl std::fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetFanSpeed(speed) => write!(f, "set fan speed to {speed}"),
            Self::EnableBoost => write!(f, "enable boost"),
            Self::DisableBoost => write!(f, "disable boost"),
            Self::TurnOff => write!(f, "turn off"),
            Self::ResetFiltersTimer => write!(f, "reset filters timer"),
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted in-memory client for unit tests.

    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{ClientFactory, DeviceClient};
    use crate::error::ClientError;
    use crate::types::{DeviceAddress, FanSpeed};

    /// Outcome of one scripted `update` call.
    #[derive(Debug, Clone)]
    pub(crate) enum Reply {
        Data { fan_speed: u8, boost: bool },
        NoData,
        Fail(ClientError),
    }

    /// State shared by every client a [`FakeFactory`] opens.
    #[derive(Debug, Default)]
    pub(crate) struct Shared {
        pub replies: VecDeque<Reply>,
        pub updates: u32,
        pub connects: u32,
        pub closes: u32,
        pub commands: Vec<String>,
        pub accept_commands: bool,
        pub fail_close: bool,
        pub supply_temperature: Option<f32>,
    }

    #[derive(Debug, Clone)]
    pub(crate) struct FakeFactory {
        pub shared: Arc<Mutex<Shared>>,
    }

    impl FakeFactory {
        pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
            let shared = Shared {
                replies: replies.into_iter().collect(),
                accept_commands: true,
                ..Shared::default()
            };
            Self {
                shared: Arc::new(Mutex::new(shared)),
            }
        }
    }

    impl ClientFactory for FakeFactory {
        type Client = FakeClient;

        fn connect(&self, _host: &str, _address: DeviceAddress) -> Result<FakeClient, ClientError> {
            self.shared.lock().connects += 1;
            Ok(FakeClient {
                shared: Arc::clone(&self.shared),
                fan_speed: FanSpeed::OFF,
                boost: false,
            })
        }
    }

    #[derive(Debug)]
    pub(crate) struct FakeClient {
        shared: Arc<Mutex<Shared>>,
        fan_speed: FanSpeed,
        boost: bool,
    }

    impl DeviceClient for FakeClient {
        fn update(&mut self) -> Result<bool, ClientError> {
            let mut shared = self.shared.lock();
            shared.updates += 1;
            match shared.replies.pop_front() {
                Some(Reply::Data { fan_speed, boost }) => {
                    self.fan_speed = FanSpeed::new(fan_speed).unwrap();
                    self.boost = boost;
                    Ok(true)
                }
                Some(Reply::NoData) | None => Ok(false),
                Some(Reply::Fail(err)) => Err(err),
            }
        }

        fn fan_speed(&self) -> FanSpeed {
            self.fan_speed
        }

        fn boost(&self) -> bool {
            self.boost
        }

        fn supply_air_temperature(&self) -> Option<f32> {
            self.shared.lock().supply_temperature
        }

        fn software_version(&self) -> String {
            "1.10".to_string()
        }

        fn configuration_version(&self) -> String {
            "1.3".to_string()
        }

        fn set_fan_speed(&mut self, speed: FanSpeed) -> Result<bool, ClientError> {
            let mut shared = self.shared.lock();
            shared.commands.push(format!("speed {speed}"));
            Ok(shared.accept_commands)
        }

        fn enable_boost(&mut self) -> Result<bool, ClientError> {
            let mut shared = self.shared.lock();
            shared.commands.push("boost on".to_string());
            Ok(shared.accept_commands)
        }

        fn disable_boost(&mut self) -> Result<bool, ClientError> {
            let mut shared = self.shared.lock();
            shared.commands.push("boost off".to_string());
            Ok(shared.accept_commands)
        }

        fn turn_off(&mut self) -> Result<bool, ClientError> {
            let mut shared = self.shared.lock();
            shared.commands.push("off".to_string());
            Ok(shared.accept_commands)
        }

        fn reset_filters_timer(&mut self) -> Result<bool, ClientError> {
            let mut shared = self.shared.lock();
            shared.commands.push("reset filters".to_string());
            Ok(shared.accept_commands)
        }

        fn close(&mut self) -> Result<(), ClientError> {
            let mut shared = self.shared.lock();
            shared.closes += 1;
            if shared.fail_close {
                return Err(ClientError::Io("socket already gone".to_string()));
            }
            Ok(())
        }
    }
}
