// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device address type.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// Address of one device on a shared line (1-247).
///
/// Address 0 is the bus broadcast address and 248-255 are reserved, so
/// neither can name a single device.
///
/// # Examples
///
/// ```
/// use smartyline::types::DeviceAddress;
///
/// let address = DeviceAddress::new(12).unwrap();
/// assert_eq!(address.value(), 12);
///
/// assert!(DeviceAddress::new(0).is_err());
/// assert!(DeviceAddress::new(248).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    /// Lowest valid device address.
    pub const MIN: u8 = 1;

    /// Highest valid device address.
    pub const MAX: u8 = 247;

    /// Creates a new device address.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value is outside [1, 247].
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValueError::OutOfRange {
                min: u16::from(Self::MIN),
                max: u16::from(Self::MAX),
                actual: u16::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Returns the raw address.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Parses a comma separated address list such as `"1, 5, 12"`.
    ///
    /// Empty items are skipped. The list must contain at least one address.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidAddress` for an item that is not a number
    /// or for an empty list, and `ValueError::OutOfRange` for a number
    /// outside [1, 247].
    ///
    /// # Examples
    ///
    /// ```
    /// use smartyline::types::DeviceAddress;
    ///
    /// let addresses = DeviceAddress::parse_list(" 1, 5,,12 ").unwrap();
    /// let values: Vec<u8> = addresses.iter().map(|a| a.value()).collect();
    /// assert_eq!(values, vec![1, 5, 12]);
    /// ```
    pub fn parse_list(input: &str) -> Result<Vec<Self>, ValueError> {
        let addresses = input
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Self>, _>>()?;

        if addresses.is_empty() {
            return Err(ValueError::InvalidAddress(input.to_string()));
        }
        Ok(addresses)
    }
}

impl Default for DeviceAddress {
    /// Units leave the factory on address 1.
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for DeviceAddress {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceAddress> for u8 {
    fn from(address: DeviceAddress) -> Self {
        address.0
    }
}

impl FromStr for DeviceAddress {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u16 = s
            .trim()
            .parse()
            .map_err(|_| ValueError::InvalidAddress(s.to_string()))?;
        let value = u8::try_from(value).map_err(|_| ValueError::OutOfRange {
            min: u16::from(Self::MIN),
            max: u16::from(Self::MAX),
            actual: value,
        })?;
        Self::new(value)
    }
}
