// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drivers: one per device class.
//!
//! A driver owns the endpoint of its server, the transport shared by its
//! devices and the set of devices already paired. It pairs new devices
//! through [`discovery`](crate::discovery) and starts each paired device on
//! its own task.

#[cfg(feature = "mqtt")]
mod espurna;
#[cfg(feature = "grpc")]
mod relay;

#[cfg(feature = "mqtt")]
pub use espurna::EspurnaDriver;
#[cfg(feature = "grpc")]
pub use relay::PiRelayDriver;
