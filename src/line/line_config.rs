// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line configuration.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use crate::coordinator::{
    CoordinatorOptions, DEFAULT_POLL_INTERVAL, PollConnection, RETRY_DELAY, RetryPolicy,
};
use crate::error::ConfigError;
use crate::event::EventBus;
use crate::types::DeviceAddress;

/// Configuration of one line and the devices attached to it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use smartyline::line::{LineConfig, PollConnection};
///
/// let config = LineConfig::new("192.168.1.40")
///     .with_address_list("1, 5, 12")?
///     .with_poll_interval(Duration::from_secs(15))
///     .with_poll_connection(PollConnection::Ephemeral);
///
/// assert_eq!(config.addresses.len(), 3);
/// config.validate()?;
/// # Ok::<(), smartyline::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineConfig {
    /// Host of the line gateway.
    pub host: String,
    /// Device addresses, in setup order.
    pub addresses: Vec<DeviceAddress>,
    /// Time between two scheduled refreshes.
    pub poll_interval: Duration,
    /// Retry policy of every refresh.
    pub retry: RetryPolicy,
    /// Connection strategy of the poll path.
    pub poll_connection: PollConnection,
    /// Capacity of the event channel.
    pub event_capacity: usize,
}

impl LineConfig {
    /// Creates a configuration with a single device at the default address.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            addresses: vec![DeviceAddress::default()],
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
            poll_connection: PollConnection::default(),
            event_capacity: EventBus::DEFAULT_CAPACITY,
        }
    }

    /// Replaces the device addresses.
    #[must_use]
    pub fn with_addresses(mut self, addresses: impl IntoIterator<Item = DeviceAddress>) -> Self {
        self.addresses = addresses.into_iter().collect();
        self
    }

    /// Replaces the device addresses with a comma separated list.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Value` if the list is empty or holds an
    /// invalid address.
    pub fn with_address_list(mut self, list: &str) -> Result<Self, ConfigError> {
        self.addresses = DeviceAddress::parse_list(list)?;
        Ok(self)
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the poll connection strategy.
    #[must_use]
    pub fn with_poll_connection(mut self, poll_connection: PollConnection) -> Self {
        self.poll_connection = poll_connection;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Parses a configuration entry.
    ///
    /// The document has the form `{"host": "...", "slaves": [1, 5]}`.
    /// `slaves` defaults to `[1]`; the optional keys `poll_interval_secs`,
    /// `retry_attempts`, `retry_delay_ms` and `poll_connection` override the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` if the document is malformed, or any
    /// error of [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let entry: ConfigEntry = serde_json::from_str(json)?;
        let retry_delay = entry
            .retry_delay_ms
            .map_or(RETRY_DELAY, Duration::from_millis);

        let config = Self::new(entry.host)
            .with_addresses(entry.slaves)
            .with_poll_interval(
                entry
                    .poll_interval_secs
                    .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs),
            )
            .with_retry(RetryPolicy::new(
                entry.retry_attempts.unwrap_or(crate::coordinator::MAX_RETRIES),
                retry_delay,
            ))
            .with_poll_connection(entry.poll_connection);

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for errors.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.addresses.is_empty() {
            return Err(ConfigError::NoAddresses);
        }

        let mut seen = HashSet::with_capacity(self.addresses.len());
        for address in &self.addresses {
            if !seen.insert(*address) {
                return Err(ConfigError::DuplicateAddress(*address));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Options handed to every coordinator of the line.
    #[must_use]
    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            poll_interval: self.poll_interval,
            retry: self.retry,
            poll_connection: self.poll_connection,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigEntry {
    host: String,
    #[serde(default = "default_slaves")]
    slaves: Vec<DeviceAddress>,
    #[serde(default)]
    poll_interval_secs: Option<u64>,
    #[serde(default)]
    retry_attempts: Option<u32>,
    #[serde(default)]
    retry_delay_ms: Option<u64>,
    #[serde(default)]
    poll_connection: PollConnection,
}

fn default_slaves() -> Vec<DeviceAddress> {
    vec![DeviceAddress::default()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(value: u8) -> DeviceAddress {
        DeviceAddress::new(value).unwrap()
    }

    #[test]
    fn defaults() {
        let config = LineConfig::new("192.168.1.40");
        assert_eq!(config.addresses, vec![address(1)]);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.poll_connection, PollConnection::Persistent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn address_list_keeps_order() {
        let config = LineConfig::new("host")
            .with_address_list(" 12, 5 ,1")
            .unwrap();
        assert_eq!(config.addresses, vec![address(12), address(5), address(1)]);
    }

    #[test]
    fn address_list_rejects_invalid_entries() {
        assert!(LineConfig::new("host").with_address_list("1, 300").is_err());
        assert!(LineConfig::new("host").with_address_list("").is_err());
    }

    #[test]
    fn validate_rejects_bad_configs() {
        assert!(matches!(
            LineConfig::new("  ").validate(),
            Err(ConfigError::EmptyHost)
        ));
        assert!(matches!(
            LineConfig::new("host").with_addresses([]).validate(),
            Err(ConfigError::NoAddresses)
        ));
        assert!(matches!(
            LineConfig::new("host")
                .with_addresses([address(3), address(4), address(3)])
                .validate(),
            Err(ConfigError::DuplicateAddress(a)) if a == address(3)
        ));
        assert!(matches!(
            LineConfig::new("host")
                .with_retry(RetryPolicy::new(0, Duration::ZERO))
                .validate(),
            Err(ConfigError::NoAttempts)
        ));
        assert!(matches!(
            LineConfig::new("host")
                .with_poll_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroPollInterval)
        ));
    }

    #[test]
    fn from_json_minimal_entry() {
        let config = LineConfig::from_json(r#"{"host": "10.0.0.7"}"#).unwrap();
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.addresses, vec![address(1)]);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn from_json_full_entry() {
        let config = LineConfig::from_json(
            r#"{
                "host": "10.0.0.7",
                "slaves": [1, 5],
                "poll_interval_secs": 10,
                "retry_attempts": 2,
                "retry_delay_ms": 1000,
                "poll_connection": "ephemeral"
            }"#,
        )
        .unwrap();

        assert_eq!(config.addresses, vec![address(1), address(5)]);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.retry, RetryPolicy::new(2, Duration::from_secs(1)));
        assert_eq!(config.poll_connection, PollConnection::Ephemeral);
    }

    #[test]
    fn from_json_rejects_out_of_range_address() {
        let err = LineConfig::from_json(r#"{"host": "h", "slaves": [0]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn from_json_validates() {
        let err = LineConfig::from_json(r#"{"host": "h", "slaves": [2, 2]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAddress(_)));
    }
}
