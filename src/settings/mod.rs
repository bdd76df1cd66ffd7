// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Settings and endpoint resolution.
//!
//! Two levels of settings exist:
//!
//! - [`AppSettings`]: where the server is (address, port, credentials),
//!   shared by every device of a driver and held by a [`Settings`] handle.
//! - [`DeviceSettings`]: per-device topic and control mode.
//!
//! [`EndpointResolver`] turns the former into an [`Endpoint`], falling back
//! to a network advertisement when the settings are incomplete.

mod device;
mod endpoint;
mod store;

pub use device::{DeviceSettings, SettingsDiff};
pub use endpoint::{AdvertisedRecord, Credentials, Endpoint, EndpointResolver};
pub use store::{AppSettings, JsonFileStore, MemoryStore, Settings, SettingsStore};
