// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! A [`StateChange`] is one capability taking one value. Changes are produced
//! by the reconcilers (from RPC responses, inbound topic messages, or a
//! revert) and applied to a [`DeviceState`](super::DeviceState).
//!
//! # Examples
//!
//! ```
//! use relaylink_lib::capabilities::Capability;
//! use relaylink_lib::state::StateChange;
//! use relaylink_lib::types::Level;
//!
//! let on = StateChange::switch(Capability::OnOff2, true);
//! let dim = StateChange::level(Capability::Dim, Level::new(0.75).unwrap());
//! assert_eq!(on.capability(), Capability::OnOff2);
//! assert_eq!(dim.value().as_level().map(|l| l.get()), Some(0.75));
//! ```

use std::fmt;

use crate::capabilities::{Capability, CapabilityValue};
use crate::types::Level;

/// One capability taking one value.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    capability: Capability,
    value: CapabilityValue,
}

impl StateChange {
    /// Creates a change from its parts.
    #[must_use]
    pub fn new(capability: Capability, value: CapabilityValue) -> Self {
        Self { capability, value }
    }

    /// Creates an on/off change.
    #[must_use]
    pub fn switch(capability: Capability, on: bool) -> Self {
        Self::new(capability, CapabilityValue::Bool(on))
    }

    /// Creates a level change.
    #[must_use]
    pub fn level(capability: Capability, level: Level) -> Self {
        Self::new(capability, CapabilityValue::Level(level))
    }

    /// Returns the capability being changed.
    #[must_use]
    pub const fn capability(&self) -> Capability {
        self.capability
    }

    /// Returns the new value.
    #[must_use]
    pub const fn value(&self) -> &CapabilityValue {
        &self.value
    }

    /// Splits the change into its parts.
    #[must_use]
    pub fn into_parts(self) -> (Capability, CapabilityValue) {
        (self.capability, self.value)
    }
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.capability, self.value)
    }
}
