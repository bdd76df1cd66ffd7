// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `RelayLink` Lib - A Rust library bridging relay boards and Espurna
//! devices to a home-automation platform.
//!
//! Two device classes are supported:
//!
//! - **Relay boards** reached over a unary RPC service (gRPC), one platform
//!   device per relay
//! - **Espurna firmware devices** reached over MQTT: single and dual relay
//!   switches and RGB / white-channel LED controllers
//!
//! Every device keeps a platform-side [`DeviceState`] of normalized
//! capability values and reconciles it with the hardware in both
//! directions: platform commands are encoded onto the transport, and
//! telemetry from the device is decoded back into state changes published
//! on an [`EventBus`].
//!
//! # Modules
//!
//! - [`capabilities`]: capability ids, device modes and their capability sets
//! - [`codec`]: conversions between normalized levels and wire values
//! - [`discovery`]: time-boxed pairing sessions
//! - [`driver`]: per-class drivers that pair and start devices
//! - [`reconciler`]: per-device state reconciliation and device tasks
//! - [`settings`]: application and device settings, endpoint resolution
//! - [`protocol`]: gRPC and MQTT transports
//!
//! # Quick Start
//!
//! ## Espurna switch over MQTT
//!
//! ```no_run
//! use relaylink_lib::{DeviceMode, EspurnaDriver, EventBus, PairingSession};
//! use relaylink_lib::settings::{AppSettings, Settings};
//!
//! #[tokio::main]
//! async fn main() -> relaylink_lib::Result<()> {
//!     let settings = Settings::in_memory(AppSettings {
//!         address: Some("192.168.1.50".to_string()),
//!         port: Some(1883),
//!         ..AppSettings::default()
//!     });
//!     let driver = EspurnaDriver::new(DeviceMode::SingleRelay, settings, EventBus::new());
//!
//!     let found = driver
//!         .pair(&PairingSession::for_espurna(), |list| {
//!             println!("{} devices found so far", list.len());
//!         })
//!         .await?;
//!
//!     for candidate in &found {
//!         let device = driver.add_device(candidate, None, Vec::new()).await?;
//!         device.set_capability_named("onoff", true.into()).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Relay board over gRPC
//!
//! ```no_run
//! use relaylink_lib::{EventBus, PiRelayDriver};
//! use relaylink_lib::settings::{AdvertisedRecord, JsonFileStore, Settings};
//!
//! #[tokio::main]
//! async fn main() -> relaylink_lib::Result<()> {
//!     let settings = Settings::load(JsonFileStore::new("settings.json"))?;
//!     let driver = PiRelayDriver::new(settings, EventBus::new());
//!
//!     // Used only while the settings hold no address yet
//!     let advertised = AdvertisedRecord::from_txt([("ip", "192.168.1.30"), ("port", "50051")]);
//!     let device = driver.add_device(0, "Garden pump", Some(&advertised)).await?;
//!
//!     let mut events = driver.subscribe();
//!     device.set_capability_named("onoff", true.into()).await?;
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod capabilities;
pub mod codec;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod event;
pub mod protocol;
pub mod reconciler;
pub mod settings;
pub mod state;
pub mod types;

pub use capabilities::{Capability, CapabilityValue, ControlMode, DeviceMode};
pub use discovery::{Candidate, PairingSession};
#[cfg(feature = "mqtt")]
pub use driver::EspurnaDriver;
#[cfg(feature = "grpc")]
pub use driver::PiRelayDriver;
pub use error::{DeviceError, Error, Result, TransportError, ValidationError, ValueError};
pub use event::{DeviceEvent, DeviceId, EventBus};
pub use reconciler::{DeviceHandle, LinkState, Reconcile, Snapshot};
pub use settings::{AppSettings, DeviceSettings, Settings};
pub use state::{DeviceState, StateChange};
pub use types::{HsvColor, Level};
