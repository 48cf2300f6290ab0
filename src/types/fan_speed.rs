// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan speed type for ventilation control.
//!
//! Units run at one of three speeds. Speed 0 is reported while the fan is
//! stopped, and hosts usually present the speed as a percentage.

use std::fmt;

use crate::error::ValueError;

/// Fan speed level (0-3), where 0 means the fan is off.
///
/// # Examples
///
/// ```
/// use smartyline::types::FanSpeed;
///
/// let speed = FanSpeed::new(2).unwrap();
/// assert_eq!(speed.percentage(), 66);
///
/// // Percentages round up to the next speed
/// assert_eq!(FanSpeed::from_percentage(34).unwrap().value(), 2);
/// assert!(FanSpeed::from_percentage(0).unwrap().is_off());
///
/// assert!(FanSpeed::new(4).is_err());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct FanSpeed(u8);

impl FanSpeed {
    /// Fan stopped.
    pub const OFF: Self = Self(0);

    /// Lowest running speed.
    pub const LOW: Self = Self(1);

    /// Medium speed.
    pub const MEDIUM: Self = Self(2);

    /// Highest running speed.
    pub const HIGH: Self = Self(3);

    /// Number of running speeds (off excluded).
    pub const SPEED_COUNT: u8 = 3;

    /// Percentage used when the fan is turned on without an explicit value.
    pub const DEFAULT_ON_PERCENTAGE: u8 = 66;

    /// Creates a new fan speed.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 3.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > Self::SPEED_COUNT {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: u16::from(Self::SPEED_COUNT),
                actual: u16::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Converts a percentage (0-100) to a speed, rounding up.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if percentage exceeds 100.
    pub fn from_percentage(percentage: u8) -> Result<Self, ValueError> {
        if percentage > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: u16::from(percentage),
            });
        }
        let scaled = u16::from(percentage) * u16::from(Self::SPEED_COUNT);
        // Safe: scaled <= 300, so the quotient is at most 3
        #[allow(clippy::cast_possible_truncation)]
        let speed = scaled.div_ceil(100) as u8;
        Ok(Self(speed))
    }

    /// Returns the speed level.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns true if the fan is stopped.
    #[must_use]
    pub const fn is_off(&self) -> bool {
        self.0 == 0
    }

    /// Returns the speed as a percentage (0, 33, 66 or 100).
    #[must_use]
    pub const fn percentage(&self) -> u8 {
        // Safe: at most 300 / 3
        #[allow(clippy::cast_possible_truncation)]
        let pct = (self.0 as u16 * 100 / Self::SPEED_COUNT as u16) as u8;
        pct
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_off() {
            write!(f, "off")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl TryFrom<u8> for FanSpeed {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FanSpeed> for u8 {
    fn from(speed: FanSpeed) -> Self {
        speed.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_speed_valid() {
        for v in 0..=3 {
            assert_eq!(FanSpeed::new(v).unwrap().value(), v);
        }
        assert!(FanSpeed::new(4).is_err());
    }

    #[test]
    fn percentage_of_each_speed() {
        assert_eq!(FanSpeed::OFF.percentage(), 0);
        assert_eq!(FanSpeed::LOW.percentage(), 33);
        assert_eq!(FanSpeed::MEDIUM.percentage(), 66);
        assert_eq!(FanSpeed::HIGH.percentage(), 100);
    }

    #[test]
    fn from_percentage_rounds_up() {
        assert_eq!(FanSpeed::from_percentage(0).unwrap(), FanSpeed::OFF);
        assert_eq!(FanSpeed::from_percentage(1).unwrap(), FanSpeed::LOW);
        assert_eq!(FanSpeed::from_percentage(33).unwrap(), FanSpeed::LOW);
        assert_eq!(FanSpeed::from_percentage(34).unwrap(), FanSpeed::MEDIUM);
        assert_eq!(FanSpeed::from_percentage(66).unwrap(), FanSpeed::MEDIUM);
        assert_eq!(FanSpeed::from_percentage(67).unwrap(), FanSpeed::HIGH);
        assert_eq!(FanSpeed::from_percentage(100).unwrap(), FanSpeed::HIGH);
        assert!(FanSpeed::from_percentage(101).is_err());
    }

    #[test]
    fn percentage_round_trips_through_speed() {
        for speed in [FanSpeed::LOW, FanSpeed::MEDIUM, FanSpeed::HIGH] {
            assert_eq!(FanSpeed::from_percentage(speed.percentage()).unwrap(), speed);
        }
    }

    #[test]
    fn default_on_percentage_is_medium() {
        assert_eq!(
            FanSpeed::from_percentage(FanSpeed::DEFAULT_ON_PERCENTAGE).unwrap(),
            FanSpeed::MEDIUM
        );
    }

    #[test]
    fn display() {
        assert_eq!(FanSpeed::OFF.to_string(), "off");
        assert_eq!(FanSpeed::HIGH.to_string(), "3");
    }
}
