// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Platform-facing device state.
//!
//! [`DeviceState`] holds the value of every capability slot of one device,
//! and [`StateChange`] is a single update to one slot. Only the reconciler
//! that owns a device mutates its state.

mod device_state;
mod state_change;

pub use device_state::DeviceState;
pub use state_change::StateChange;
