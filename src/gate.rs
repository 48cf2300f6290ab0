// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport gate serializing all I/O on one physical line.
//!
//! Every coordinator attached to a line holds a clone of the same
//! [`TransportGate`]. A poll or a command acquires a [`GateTicket`] before it
//! opens a connection and keeps it until the connection is closed, so two
//! devices on the line never interleave partial requests.
//!
//! Waiters are served in arrival order. Closing the gate lets the current
//! holder finish and makes every later acquisition fail.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::error::GateClosed;

/// Mutual-exclusion gate for one line.
///
/// Cloning is cheap; clones share the same gate.
///
/// # Examples
///
/// ```
/// use smartyline::gate::TransportGate;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), smartyline::error::GateClosed> {
/// let gate = TransportGate::new("192.168.1.40");
///
/// {
///     let _ticket = gate.acquire().await?;
///     assert!(gate.is_busy());
/// }
///
/// assert!(!gate.is_busy());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TransportGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    line: String,
    semaphore: Arc<Semaphore>,
    acquisitions: AtomicU64,
}

impl TransportGate {
    /// Creates an open gate for the line reachable at `line`.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                line: line.into(),
                semaphore: Arc::new(Semaphore::new(1)),
                acquisitions: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the line this gate serializes.
    #[must_use]
    pub fn line(&self) -> &str {
        &self.inner.line
    }

    /// Waits until the line is free and takes it.
    ///
    /// The line is released when the returned ticket is dropped, on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// Returns `GateClosed` if the gate was closed before or while waiting.
    pub async fn acquire(&self) -> Result<GateTicket, GateClosed> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;

        let sequence = self.inner.acquisitions.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(line = %self.inner.line, sequence, "Transport gate acquired");

        Ok(GateTicket {
            _permit: permit,
            line: Arc::clone(&self.inner),
            sequence,
            acquired_at: Instant::now(),
        })
    }

    /// Closes the gate permanently.
    ///
    /// A ticket that is currently held stays valid until dropped; every
    /// pending and future [`acquire`](Self::acquire) fails.
    pub fn close(&self) {
        if !self.inner.semaphore.is_closed() {
            tracing::debug!(line = %self.inner.line, "Closing transport gate");
        }
        self.inner.semaphore.close();
    }

    /// Returns true if the gate was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    /// Returns true if a ticket is currently held.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.semaphore.available_permits() == 0
    }

    /// Number of tickets handed out so far.
    #[must_use]
    pub fn acquisitions(&self) -> u64 {
        self.inner.acquisitions.load(Ordering::Relaxed)
    }

    /// Returns true if both handles refer to the same gate.
    #[must_use]
    pub fn same_gate(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for TransportGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportGate")
            .field("line", &self.inner.line)
            .field("busy", &self.is_busy())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Exclusive right to use the line, released on drop.
///
/// Blocking I/O jobs take ownership of the ticket (or a shared handle to
/// it) so the line stays taken until the job itself ends, even when the
/// future that started it is dropped.
pub struct GateTicket {
    _permit: OwnedSemaphorePermit,
    line: Arc<GateInner>,
    sequence: u64,
    acquired_at: Instant,
}

impl GateTicket {
    /// Position of this ticket in the line's acquisition order (1-based).
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Drop for GateTicket {
    fn drop(&mut self) {
        tracing::trace!(
            line = %self.line.line,
            sequence = self.sequence,
            held_ms = u64::try_from(self.acquired_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Transport gate released"
        );
    }
}

impl fmt::Debug for GateTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateTicket")
            .field("line", &self.line.line)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
