// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting coordinator events.

use tokio::sync::broadcast;

use super::DeviceEvent;

/// Event bus for broadcasting device events to multiple subscribers.
///
/// One bus exists per line. Every coordinator of the line publishes on it,
/// and each subscriber gets its own copy of each event.
///
/// # Capacity
///
/// The event bus has a fixed capacity (default 256). If the channel fills
/// up because a subscriber is slow, older events may be dropped for that
/// subscriber (they will receive a `RecvError::Lagged` error).
///
/// # Examples
///
/// ```
/// use smartyline::event::{DeviceEvent, EventBus};
/// use smartyline::types::DeviceAddress;
///
/// let bus = EventBus::new();
///
/// // Create a subscriber
/// let mut rx = bus.subscribe();
///
/// // Publish an event
/// bus.publish(DeviceEvent::stopped(DeviceAddress::new(5).unwrap()));
///
/// // Multiple subscribers can exist
/// let mut rx2 = bus.subscribe();
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Default channel capacity.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a new event bus with the specified capacity.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events that can be buffered; zero
    ///   is raised to one
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to device events.
    ///
    /// Returns a receiver that will receive all events published after
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event to all subscribers.
    ///
    /// If there are no subscribers, the event is discarded. A subscriber
    /// whose buffer is full loses its oldest events.
    pub fn publish(&self, event: DeviceEvent) {
        let _ = self.publish_counted(event);
    }

    /// Publishes an event and returns the number of receivers that got it.
    ///
    /// Returns 0 if there are no subscribers.
    #[must_use]
    pub fn publish_counted(&self, event: DeviceEvent) -> usize {
        let address = event.address();
        let kind = event.kind();

        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::trace!(%address, kind, receivers, "Event published");
        receivers
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceAddress;

    fn event() -> DeviceEvent {
        DeviceEvent::stopped(DeviceAddress::new(12).unwrap())
    }

    #[test]
    fn new_bus_has_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscribe_and_drop_track_count() {
        let bus = EventBus::new();

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn publish_delivers_to_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(event());

        assert_eq!(rx1.recv().await.unwrap().address().value(), 12);
        assert_eq!(rx2.recv().await.unwrap().address().value(), 12);
    }

    #[test]
    fn publish_counted_returns_receiver_count() {
        let bus = EventBus::new();
        assert_eq!(bus.publish_counted(event()), 0);

        let _rx = bus.subscribe();
        assert_eq!(bus.publish_counted(event()), 1);
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = EventBus::with_capacity(16);
        let bus2 = bus1.clone();

        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
