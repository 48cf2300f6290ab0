// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded retry for device refreshes.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{ClientError, RefreshError};
use crate::types::DeviceAddress;

/// Default number of update attempts per refresh.
pub const MAX_RETRIES: u32 = 3;

/// Default fixed wait between two attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// How often and how patiently a refresh retries.
///
/// The delay is fixed; there is no backoff.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use smartyline::coordinator::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 3);
/// assert_eq!(policy.delay, Duration::from_secs(2));
///
/// let fast = RetryPolicy::new(5, Duration::from_millis(250));
/// assert_eq!(fast.max_attempts, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of attempts, including the first one.
    pub max_attempts: u32,
    /// Wait between two attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A policy that makes a single attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRIES, RETRY_DELAY)
    }
}

/// Outcome of one update attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// The update returned data.
    Success(T),
    /// The update completed but signaled no new data.
    NoData,
    /// The update raised a communication error.
    Failed(ClientError),
    /// The attempt was skipped because its owner stopped; no I/O was done.
    Cancelled,
}

/// One attempt of a refresh, as reported to tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshAttempt {
    /// 1-based attempt number.
    pub attempt_number: u32,
    /// How the attempt ended.
    pub outcome: AttemptKind,
}

/// Classification of an attempt, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    /// Data was read.
    Success,
    /// The update signaled no new data.
    SoftFailure,
    /// The update raised a communication error.
    HardFailure,
}

/// Counters describing the refresh history of one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Update attempts made.
    pub attempts: u64,
    /// Attempts that returned data.
    pub successes: u64,
    /// Attempts that completed without data.
    pub soft_failures: u64,
    /// Attempts that raised a communication error.
    pub hard_failures: u64,
    /// Waits between two attempts.
    pub retry_delays: u64,
    /// Refreshes that exhausted every attempt.
    pub exhausted: u64,
}

/// Live refresh counters, updated by [`RetryingUpdater::run`].
#[derive(Debug, Default)]
pub struct RefreshCounters {
    attempts: AtomicU64,
    successes: AtomicU64,
    soft_failures: AtomicU64,
    hard_failures: AtomicU64,
    retry_delays: AtomicU64,
    exhausted: AtomicU64,
}

impl RefreshCounters {
    fn record(&self, kind: AttemptKind) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let counter = match kind {
            AttemptKind::Success => &self.successes,
            AttemptKind::SoftFailure => &self.soft_failures,
            AttemptKind::HardFailure => &self.hard_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> RefreshStats {
        RefreshStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            soft_failures: self.soft_failures.load(Ordering::Relaxed),
            hard_failures: self.hard_failures.load(Ordering::Relaxed),
            retry_delays: self.retry_delays.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Runs update attempts until one succeeds or the policy is exhausted.
///
/// The caller holds the transport gate for the whole sequence; the
/// updater itself takes no lock.
#[derive(Debug, Clone, Copy)]
pub struct RetryingUpdater {
    policy: RetryPolicy,
}

impl RetryingUpdater {
    /// Creates an updater with the given policy.
    ///
    /// A policy with zero attempts is treated as a single attempt.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy in use.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `attempt` (called with the 1-based attempt number) until it
    /// returns data.
    ///
    /// # Errors
    ///
    /// Returns `RefreshError` once every attempt failed. The error carries
    /// the communication error of the final attempt, or none if the final
    /// attempt only returned no data.
    pub async fn run<T, F, Fut>(
        &self,
        address: DeviceAddress,
        counters: &RefreshCounters,
        mut attempt: F,
    ) -> Result<T, RefreshError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt_number in 1..=max_attempts {
            let outcome = attempt(attempt_number).await;
            let kind = match &outcome {
                AttemptOutcome::Success(_) => AttemptKind::Success,
                AttemptOutcome::NoData => AttemptKind::SoftFailure,
                AttemptOutcome::Failed(_) => AttemptKind::HardFailure,
                AttemptOutcome::Cancelled => {
                    tracing::debug!(%address, attempt = attempt_number, "Refresh cancelled");
                    return Err(RefreshError {
                        address,
                        attempts: attempt_number - 1,
                        last_error,
                    });
                }
            };
            let report = RefreshAttempt {
                attempt_number,
                outcome: kind,
            };
            counters.record(kind);

            match outcome {
                AttemptOutcome::Success(value) => {
                    if attempt_number > 1 {
                        tracing::debug!(
                            %address,
                            attempt = attempt_number,
                            "Update succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                AttemptOutcome::NoData => {
                    tracing::debug!(%address, ?report, "Update returned no data");
                    last_error = None;
                }
                AttemptOutcome::Failed(err) => {
                    tracing::debug!(%address, ?report, error = %err, "Update attempt failed");
                    last_error = Some(err);
                }
                AttemptOutcome::Cancelled => {}
            }

            if attempt_number < max_attempts {
                counters.retry_delays.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        counters.exhausted.fetch_add(1, Ordering::Relaxed);
        Err(RefreshError {
            address,
            attempts: max_attempts,
            last_error,
        })
    }
}

impl Default for RetryingUpdater {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
