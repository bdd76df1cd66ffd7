// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Platform-facing device state.

use std::collections::BTreeMap;

use crate::capabilities::{Capability, CapabilityValue, DeviceMode};
use crate::error::{DeviceError, Error};
use crate::types::Level;

use super::StateChange;

/// Platform-visible capability values of one device.
///
/// The set of slots is fixed by the [`DeviceMode`] at construction. A slot
/// holds `None` until the device reports it or a command sets it.
///
/// # Examples
///
/// ```
/// use relaylink_lib::capabilities::{Capability, DeviceMode};
/// use relaylink_lib::state::{DeviceState, StateChange};
///
/// let mut state = DeviceState::new(DeviceMode::DoubleRelay);
/// state.apply(&StateChange::switch(Capability::OnOff2, true)).unwrap();
/// assert_eq!(state.switch(Capability::OnOff2), Some(true));
/// assert_eq!(state.switch(Capability::OnOff1), None);
///
/// // Not a slot of this mode
/// assert!(state.apply(&StateChange::switch(Capability::OnOff, true)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    mode: DeviceMode,
    values: BTreeMap<Capability, Option<CapabilityValue>>,
}

impl DeviceState {
    /// Creates an empty state with one slot per capability of `mode`.
    #[must_use]
    pub fn new(mode: DeviceMode) -> Self {
        let values = mode.capabilities().iter().map(|&c| (c, None)).collect();
        Self { mode, values }
    }

    /// Returns the device mode.
    #[must_use]
    pub const fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Returns the current value of a capability.
    #[must_use]
    pub fn get(&self, capability: Capability) -> Option<&CapabilityValue> {
        self.values.get(&capability).and_then(Option::as_ref)
    }

    /// Returns the current on/off value of a switch capability.
    #[must_use]
    pub fn switch(&self, capability: Capability) -> Option<bool> {
        self.get(capability).and_then(CapabilityValue::as_bool)
    }

    /// Returns the current level of a level capability.
    #[must_use]
    pub fn level(&self, capability: Capability) -> Option<Level> {
        self.get(capability).and_then(CapabilityValue::as_level)
    }

    /// Applies a change.
    ///
    /// Re-applying the current value is allowed and leaves the state as it
    /// was; the return value tells whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::UnsupportedCapability` if the capability is not a
    /// slot of this mode, or `ValueError::KindMismatch` if the value has the
    /// wrong kind.
    pub fn apply(&mut self, change: &StateChange) -> Result<bool, Error> {
        let capability = change.capability();
        let slot = self
            .values
            .get_mut(&capability)
            .ok_or_else(|| DeviceError::UnsupportedCapability {
                capability: capability.id().to_string(),
                mode: self.mode.name().to_string(),
            })?;
        capability.check(change.value())?;
        let changed = slot.as_ref() != Some(change.value());
        *slot = Some(change.value().clone());
        Ok(changed)
    }

    /// Restores a slot to a previous value, including "unknown".
    pub(crate) fn restore(&mut self, capability: Capability, previous: Option<CapabilityValue>) {
        if let Some(slot) = self.values.get_mut(&capability) {
            *slot = previous;
        }
    }

    /// Returns all known values in capability order.
    #[must_use]
    pub fn known(&self) -> Vec<StateChange> {
        self.values
            .iter()
            .filter_map(|(&c, v)| v.clone().map(|v| StateChange::new(c, v)))
            .collect()
    }
}
