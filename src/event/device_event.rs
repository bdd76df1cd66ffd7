// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use crate::capabilities::{Capability, CapabilityValue};
use crate::state::{DeviceState, StateChange};

use super::DeviceId;

/// Outcomes reported to the platform.
///
/// Reconcilers never call back into the platform directly; everything the
/// platform must reflect arrives as one of these events.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A device was added to a driver.
    DeviceAdded {
        /// The ID of the added device.
        device_id: DeviceId,
        /// The device's external id.
        external_id: String,
    },

    /// A device was removed from a driver.
    DeviceRemoved {
        /// The ID of the removed device.
        device_id: DeviceId,
    },

    /// The device became available or unavailable.
    AvailabilityChanged {
        /// The ID of the device.
        device_id: DeviceId,
        /// Whether the device now accepts commands.
        available: bool,
        /// Why the device became unavailable.
        reason: Option<String>,
    },

    /// A capability took a new value.
    ///
    /// Emitted for every applied update, including one that repeats the
    /// current value.
    StateChanged {
        /// The ID of the device.
        device_id: DeviceId,
        /// The applied change.
        change: StateChange,
        /// The complete state after the change.
        new_state: DeviceState,
    },

    /// An optimistic value was rolled back because the command failed.
    StateReverted {
        /// The ID of the device.
        device_id: DeviceId,
        /// The capability that was rolled back.
        capability: Capability,
        /// The value that was attempted.
        attempted: CapabilityValue,
        /// The value that is visible again.
        restored: Option<CapabilityValue>,
    },

    /// The device's display name changed on the server.
    Renamed {
        /// The ID of the device.
        device_id: DeviceId,
        /// The new display name.
        name: String,
    },

    /// A published command was never confirmed by the device.
    CommandUnconfirmed {
        /// The ID of the device.
        device_id: DeviceId,
        /// The capability the command targeted.
        capability: Capability,
        /// The topic the command was published on.
        topic: String,
    },
}

impl DeviceEvent {
    /// Returns the device ID associated with this event.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::DeviceAdded { device_id, .. }
            | Self::DeviceRemoved { device_id }
            | Self::AvailabilityChanged { device_id, .. }
            | Self::StateChanged { device_id, .. }
            | Self::StateReverted { device_id, .. }
            | Self::Renamed { device_id, .. }
            | Self::CommandUnconfirmed { device_id, .. } => *device_id,
        }
    }

    /// Returns the state change if this is a `StateChanged` event.
    #[must_use]
    pub fn as_state_change(&self) -> Option<&StateChange> {
        match self {
            Self::StateChanged { change, .. } => Some(change),
            _ => None,
        }
    }

    /// Returns `true` if this is an availability event.
    #[must_use]
    pub fn is_availability(&self) -> bool {
        matches!(self, Self::AvailabilityChanged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::DeviceMode;

    #[test]
    fn device_id_extraction() {
        let id = DeviceId::new();
        let events = [
            DeviceEvent::DeviceRemoved { device_id: id },
            DeviceEvent::Renamed {
                device_id: id,
                name: "Porch".to_string(),
            },
            DeviceEvent::AvailabilityChanged {
                device_id: id,
                available: false,
                reason: Some("connection lost".to_string()),
            },
        ];
        for event in events {
            assert_eq!(event.device_id(), id);
        }
    }

    #[test]
    fn state_change_accessor() {
        let id = DeviceId::new();
        let change = StateChange::switch(Capability::OnOff, true);
        let event = DeviceEvent::StateChanged {
            device_id: id,
            change: change.clone(),
            new_state: DeviceState::new(DeviceMode::SingleRelay),
        };
        assert_eq!(event.as_state_change(), Some(&change));
        assert!(!event.is_availability());
    }
}
