// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for relay boards behind the relay gRPC service.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};

use crate::discovery::{Candidate, PairingSession, discover_relays};
use crate::error::Error;
use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::protocol::{GrpcConfig, GrpcRelayClient};
use crate::reconciler::{DeviceHandle, RelayReconciler, spawn_device};
use crate::settings::{AdvertisedRecord, Endpoint, EndpointResolver, Settings};

/// Pairs and runs relay board devices, one device per relay.
///
/// All devices share one client, opened on first use. If the resolved
/// endpoint changes, the next device gets a client for the new endpoint;
/// devices already running keep theirs.
///
/// # Examples
///
/// ```no_run
/// use relaylink_lib::driver::PiRelayDriver;
/// use relaylink_lib::event::EventBus;
/// use relaylink_lib::settings::{AppSettings, Settings};
///
/// # async fn example() -> relaylink_lib::Result<()> {
/// let settings = Settings::in_memory(AppSettings {
///     address: Some("192.168.1.30".to_string()),
///     port: Some(50051),
///     ..AppSettings::default()
/// });
/// let driver = PiRelayDriver::new(settings, EventBus::new());
///
/// let device = driver.add_device(2, "Garden pump", None).await?;
/// device.set_capability_named("onoff", true.into()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PiRelayDriver {
    resolver: EndpointResolver,
    bus: EventBus,
    timeout: Option<Duration>,
    client: Mutex<Option<(Endpoint, Arc<GrpcRelayClient>)>>,
    devices: parking_lot::Mutex<HashMap<DeviceId, u32>>,
}

impl PiRelayDriver {
    /// Creates a driver reporting on `bus`.
    #[must_use]
    pub fn new(settings: Settings, bus: EventBus) -> Self {
        Self {
            resolver: EndpointResolver::new(settings),
            bus,
            timeout: None,
            client: Mutex::new(None),
            devices: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Sets the per-call timeout of new clients.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Subscribes to device events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.bus.subscribe()
    }

    /// Returns the ids of the relays already paired.
    #[must_use]
    pub fn paired_relays(&self) -> BTreeSet<String> {
        self.devices
            .lock()
            .values()
            .map(ToString::to_string)
            .collect()
    }

    /// Returns the number of running devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    async fn client(
        &self,
        advertised: Option<&AdvertisedRecord>,
    ) -> Result<Arc<GrpcRelayClient>, Error> {
        let endpoint = self.resolver.resolve(advertised)?;
        let mut client = self.client.lock().await;
        if let Some((_, shared)) = client.as_ref().filter(|(current, _)| *current == endpoint) {
            return Ok(Arc::clone(shared));
        }

        tracing::info!(endpoint = %endpoint, "Creating relay service client");
        let mut config = GrpcConfig::new(endpoint.host.clone(), endpoint.port);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        let shared = Arc::new(GrpcRelayClient::new(config));
        *client = Some((endpoint, Arc::clone(&shared)));
        Ok(shared)
    }

    /// Lists the board's relays that are not paired yet.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnresolvedEndpoint` if no server address is known, or
    /// the enumeration error.
    pub async fn pair(
        &self,
        advertised: Option<&AdvertisedRecord>,
        session: &PairingSession,
        emit: impl FnMut(&[Candidate]) + Send,
    ) -> Result<Vec<Candidate>, Error> {
        let client = match self.client(advertised).await {
            Ok(client) => client,
            Err(e) => {
                session.stop();
                return Err(e);
            }
        };
        discover_relays(&*client, &self.paired_relays(), session, emit).await
    }

    /// Starts a device for `relay`.
    ///
    /// The device reads its initial state in the background; if that fails
    /// it reports itself unavailable.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnresolvedEndpoint` if no server address is known.
    pub async fn add_device(
        &self,
        relay: u32,
        name: impl Into<String>,
        advertised: Option<&AdvertisedRecord>,
    ) -> Result<DeviceHandle, Error> {
        let client = self.client(advertised).await?;
        let device_id = DeviceId::new();
        let name = name.into();
        tracing::info!(device = %device_id, relay, name = %name, "Adding relay device");

        let reconciler = RelayReconciler::new(client, relay, name, self.bus.emitter(device_id));
        self.devices.lock().insert(device_id, relay);
        self.bus.publish(DeviceEvent::DeviceAdded {
            device_id,
            external_id: relay.to_string(),
        });
        Ok(spawn_device(reconciler, None))
    }

    /// Stops a device and forgets it.
    pub async fn remove_device(&self, handle: DeviceHandle) {
        let device_id = handle.device_id();
        handle.shutdown().await;
        if self.devices.lock().remove(&device_id).is_some() {
            tracing::info!(device = %device_id, "Relay device removed");
            self.bus.publish(DeviceEvent::DeviceRemoved { device_id });
        }
    }
}
