// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting device events.

use tokio::sync::broadcast;

use crate::capabilities::{Capability, CapabilityValue};
use crate::state::{DeviceState, StateChange};

use super::{DeviceEvent, DeviceId};

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcasts device events to any number of subscribers.
///
/// A slow subscriber that falls more than the capacity behind loses the
/// oldest events (`RecvError::Lagged`); publishers never block.
///
/// # Examples
///
/// ```
/// use relaylink_lib::event::{DeviceEvent, DeviceId, EventBus};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
/// bus.publish(DeviceEvent::DeviceRemoved { device_id: DeviceId::new() });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event. Without subscribers the event is discarded.
    pub fn publish(&self, event: DeviceEvent) {
        let _ = self.sender.send(event);
    }

    /// Returns an emitter that stamps every event with `device_id`.
    #[must_use]
    pub fn emitter(&self, device_id: DeviceId) -> DeviceEmitter {
        DeviceEmitter {
            device_id,
            bus: self.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// The event bus as seen by one device.
#[derive(Debug, Clone)]
pub struct DeviceEmitter {
    device_id: DeviceId,
    bus: EventBus,
}

impl DeviceEmitter {
    /// Returns the device this emitter reports for.
    #[must_use]
    pub const fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub(crate) fn state_changed(&self, change: StateChange, new_state: DeviceState) {
        self.bus.publish(DeviceEvent::StateChanged {
            device_id: self.device_id,
            change,
            new_state,
        });
    }

    pub(crate) fn reverted(
        &self,
        capability: Capability,
        attempted: CapabilityValue,
        restored: Option<CapabilityValue>,
    ) {
        self.bus.publish(DeviceEvent::StateReverted {
            device_id: self.device_id,
            capability,
            attempted,
            restored,
        });
    }

    pub(crate) fn availability(&self, available: bool, reason: Option<String>) {
        self.bus.publish(DeviceEvent::AvailabilityChanged {
            device_id: self.device_id,
            available,
            reason,
        });
    }

    pub(crate) fn renamed(&self, name: String) {
        self.bus.publish(DeviceEvent::Renamed {
            device_id: self.device_id,
            name,
        });
    }

    pub(crate) fn unconfirmed(&self, capability: Capability, topic: String) {
        self.bus.publish(DeviceEvent::CommandUnconfirmed {
            device_id: self.device_id,
            capability,
            topic,
        });
    }
}
