// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for Espurna devices on an MQTT broker.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::{Mutex, broadcast};

use crate::capabilities::DeviceMode;
use crate::discovery::{Candidate, PairingSession, discover_espurna};
use crate::error::Error;
use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::protocol::MqttConnection;
use crate::reconciler::{DeviceHandle, TopicReconciler, spawn_device};
use crate::settings::{DeviceSettings, EndpointResolver, Settings};
use crate::state::StateChange;

/// Pairs and runs Espurna devices of one [`DeviceMode`].
///
/// Every device of the driver shares one broker connection. It is opened on
/// demand and closed again when the last device is removed or a pairing
/// session ends with no devices left.
///
/// # Examples
///
/// ```no_run
/// use relaylink_lib::capabilities::DeviceMode;
/// use relaylink_lib::discovery::{Candidate, PairingSession};
/// use relaylink_lib::driver::EspurnaDriver;
/// use relaylink_lib::event::EventBus;
/// use relaylink_lib::settings::{AppSettings, Settings};
///
/// # async fn example() -> relaylink_lib::Result<()> {
/// let settings = Settings::in_memory(AppSettings {
///     address: Some("192.168.1.50".to_string()),
///     port: Some(1883),
///     ..AppSettings::default()
/// });
/// let driver = EspurnaDriver::new(DeviceMode::DoubleRelay, settings, EventBus::new());
///
/// let found = driver.pair(&PairingSession::for_espurna(), |_| {}).await?;
/// if let Some(candidate) = found.first() {
///     let device = driver.add_device(candidate, None, Vec::new()).await?;
///     device.set_capability_named("onoff.2", true.into()).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EspurnaDriver {
    mode: DeviceMode,
    resolver: EndpointResolver,
    bus: EventBus,
    connection: Mutex<Option<MqttConnection>>,
    devices: parking_lot::Mutex<HashMap<DeviceId, String>>,
}

impl EspurnaDriver {
    /// Creates a driver for devices of `mode`, reporting on `bus`.
    #[must_use]
    pub fn new(mode: DeviceMode, settings: Settings, bus: EventBus) -> Self {
        Self {
            mode,
            resolver: EndpointResolver::new(settings),
            bus,
            connection: Mutex::new(None),
            devices: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Returns the device mode this driver pairs.
    #[must_use]
    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Subscribes to device events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.bus.subscribe()
    }

    /// Returns the topics of the devices already paired.
    #[must_use]
    pub fn paired_topics(&self) -> BTreeSet<String> {
        self.devices.lock().values().cloned().collect()
    }

    /// Returns the number of running devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    async fn connection(&self) -> Result<MqttConnection, Error> {
        let mut connection = self.connection.lock().await;
        if let Some(current) = connection.as_ref().filter(|c| c.is_connected()) {
            return Ok(current.clone());
        }

        let endpoint = self.resolver.resolve(None)?;
        tracing::info!(endpoint = %endpoint, mode = %self.mode, "Connecting to MQTT broker");
        let mut builder = MqttConnection::builder()
            .host(endpoint.host.clone())
            .port(endpoint.port);
        if let Some(credentials) = &endpoint.credentials {
            builder = builder.credentials(&credentials.username, &credentials.password);
        }
        let fresh = builder.build().await?;
        *connection = Some(fresh.clone());
        Ok(fresh)
    }

    /// Closes the shared connection if no device uses it.
    async fn release_if_idle(&self) {
        if self.device_count() > 0 {
            return;
        }
        let Some(connection) = self.connection.lock().await.take() else {
            return;
        };
        if let Err(e) = connection.disconnect().await {
            tracing::warn!(error = %e, "Failed to disconnect idle MQTT connection");
        }
    }

    /// Lists Espurna devices of this driver's mode that are not paired yet.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnresolvedEndpoint` if no broker is configured, or the
    /// connection error.
    pub async fn pair(
        &self,
        session: &PairingSession,
        emit: impl FnMut(&[Candidate]) + Send,
    ) -> Result<Vec<Candidate>, Error> {
        let connection = match self.connection().await {
            Ok(connection) => connection,
            Err(e) => {
                session.stop();
                return Err(e);
            }
        };
        let (link, inbound) = connection.link(DeviceId::new());
        let paired = self.paired_topics();
        let found = discover_espurna(&link, inbound, self.mode, &paired, session, emit).await;
        self.release_if_idle().await;
        found
    }

    /// Starts a device for a paired candidate.
    ///
    /// `stored` are the device's persisted settings, if any; the candidate's
    /// topic is used otherwise. `restored` are platform values from before a
    /// restart.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidTopic` for an unusable topic, or the
    /// connection error.
    pub async fn add_device(
        &self,
        identity: &Candidate,
        stored: Option<DeviceSettings>,
        restored: Vec<StateChange>,
    ) -> Result<DeviceHandle, Error> {
        let stored = stored.unwrap_or_else(|| DeviceSettings::new(identity.external_id.clone()));
        let settings = DeviceSettings::defaults_for(self.mode, &identity.name, Some(stored));
        settings.validate()?;

        let connection = self.connection().await?;
        let device_id = DeviceId::new();
        let (link, inbound) = connection.link(device_id);
        let reconciler = TopicReconciler::new(
            link,
            self.mode,
            identity.name.clone(),
            &settings,
            self.bus.emitter(device_id),
        )?
        .with_restored(restored);

        tracing::info!(device = %device_id, topic = %settings.topic, "Adding Espurna device");
        self.devices.lock().insert(device_id, settings.topic.clone());
        self.bus.publish(DeviceEvent::DeviceAdded {
            device_id,
            external_id: settings.topic,
        });
        Ok(spawn_device(reconciler, Some(inbound)))
    }

    /// Applies new settings to a running device and tracks its topic.
    ///
    /// # Errors
    ///
    /// Returns whatever the device rejects the settings with.
    pub async fn update_settings(
        &self,
        handle: &DeviceHandle,
        settings: DeviceSettings,
    ) -> Result<(), Error> {
        let topic = settings.topic.clone();
        handle.update_settings(settings).await?;
        if let Some(known) = self.devices.lock().get_mut(&handle.device_id()) {
            *known = topic;
        }
        Ok(())
    }

    /// Stops a device, releases its subscriptions and forgets it.
    ///
    /// The broker connection is closed when this was the last device.
    pub async fn remove_device(&self, handle: DeviceHandle) {
        let device_id = handle.device_id();
        handle.shutdown().await;
        let removed = self.devices.lock().remove(&device_id);
        if let Some(topic) = removed {
            tracing::info!(device = %device_id, topic = %topic, "Espurna device removed");
            self.bus.publish(DeviceEvent::DeviceRemoved { device_id });
        }
        self.release_if_idle().await;
    }
}
