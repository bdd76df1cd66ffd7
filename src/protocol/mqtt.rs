// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared MQTT connection for Espurna devices.
//!
//! One [`MqttConnection`] serves every device on a broker. Each device gets
//! an [`MqttLink`]: its own view of the connection that owns a set of topic
//! filters and receives matching messages on a private queue.
//!
//! # Examples
//!
//! ```no_run
//! use relaylink_lib::event::DeviceId;
//! use relaylink_lib::protocol::{MqttConnection, PubSub};
//!
//! # async fn example() -> relaylink_lib::Result<()> {
//! let connection = MqttConnection::builder()
//!     .host("192.168.1.50")
//!     .credentials("user", "password")
//!     .build()
//!     .await?;
//!
//! let (link, mut inbound) = connection.link(DeviceId::new());
//! link.subscribe(&["kitchen/relay/+".to_string()]).await?;
//! link.publish("kitchen/relay/0/set", "1").await?;
//!
//! while let Some(message) = inbound.recv().await {
//!     println!("{message:?}");
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::error::{Error, TransportError};
use crate::event::DeviceId;
use crate::protocol::{Inbound, PubSub, topic_matches};

/// Counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Default capacity of each link's inbound queue.
pub const DEFAULT_LINK_CAPACITY: usize = 64;

/// Configuration for an MQTT connection.
#[derive(Debug, Clone)]
struct MqttConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    connection_timeout: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// Filter ownership and per-owner queues.
#[derive(Default)]
struct Routes {
    /// Filter to the devices that asked for it.
    filters: HashMap<String, BTreeSet<DeviceId>>,
    /// Inbound queue of each linked device.
    links: HashMap<DeviceId, mpsc::Sender<Inbound>>,
}

/// A broker connection shared by many devices.
///
/// Cheap to clone. Subscription changes are serialized through one lock per
/// connection, so two devices never interleave a subscribe and an
/// unsubscribe of the same filter. Delivery never waits on a device: each
/// link has a bounded queue and a full queue drops the message with a
/// warning. Connection loss notices are never dropped.
#[derive(Clone)]
pub struct MqttConnection {
    inner: Arc<Inner>,
}

struct Inner {
    client: AsyncClient,
    config: MqttConfig,
    connected: AtomicBool,
    routes: RwLock<Routes>,
    /// Serializes subscription-set mutations.
    subscribe_lock: Mutex<()>,
}

impl MqttConnection {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> MqttConnectionBuilder {
        MqttConnectionBuilder::default()
    }

    /// Returns whether the connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Creates a link for `owner` with the default queue capacity.
    #[must_use]
    pub fn link(&self, owner: DeviceId) -> (MqttLink, mpsc::Receiver<Inbound>) {
        self.link_with_capacity(owner, DEFAULT_LINK_CAPACITY)
    }

    /// Creates a link for `owner` whose inbound queue holds `capacity` messages.
    ///
    /// Linking the same owner twice replaces the previous queue.
    #[must_use]
    pub fn link_with_capacity(
        &self,
        owner: DeviceId,
        capacity: usize,
    ) -> (MqttLink, mpsc::Receiver<Inbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        self.inner.routes.write().links.insert(owner, tx);
        let link = MqttLink {
            owner,
            connection: self.clone(),
        };
        (link, rx)
    }

    /// Returns the number of linked devices.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.inner.routes.read().links.len()
    }

    /// Returns the number of distinct filters subscribed on the broker.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.inner.routes.read().filters.len()
    }

    /// Publishes a payload.
    ///
    /// # Errors
    ///
    /// Returns error if the connection is down or the client queue is closed.
    pub async fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionFailed(
                "MQTT connection is closed".to_string(),
            ));
        }
        tracing::debug!(topic = %topic, payload = %payload, "Publishing");
        self.inner
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .await?;
        Ok(())
    }

    /// Adds `owner` to each filter.
    ///
    /// A filter is subscribed at the broker whenever it gains an owner, even
    /// if another link already holds it, so the broker replays retained
    /// state for the new device. Links already holding the filter receive
    /// that replay too.
    async fn subscribe(&self, owner: DeviceId, filters: &[String]) -> Result<(), TransportError> {
        let _guard = self.inner.subscribe_lock.lock().await;

        for filter in filters {
            let owned = self
                .inner
                .routes
                .read()
                .filters
                .get(filter)
                .is_some_and(|owners| owners.contains(&owner));
            if owned {
                continue;
            }
            self.inner
                .client
                .subscribe(filter.as_str(), QoS::AtLeastOnce)
                .await?;
            tracing::debug!(filter = %filter, device = %owner, "Subscribed");
            // recorded right away so a later failure leaves nothing untracked
            self.inner
                .routes
                .write()
                .filters
                .entry(filter.clone())
                .or_default()
                .insert(owner);
        }
        Ok(())
    }

    async fn unsubscribe(&self, owner: DeviceId, filters: &[String]) -> Result<(), TransportError> {
        let _guard = self.inner.subscribe_lock.lock().await;

        let released: Vec<String> = {
            let mut routes = self.inner.routes.write();
            let mut released = Vec::new();
            for filter in filters {
                if let Some(owners) = routes.filters.get_mut(filter) {
                    owners.remove(&owner);
                    if owners.is_empty() {
                        routes.filters.remove(filter);
                        released.push(filter.clone());
                    }
                }
            }
            released
        };

        if !self.is_connected() {
            return Ok(());
        }
        for filter in released {
            self.inner.client.unsubscribe(filter.as_str()).await?;
            tracing::debug!(filter = %filter, "Unsubscribed");
        }
        Ok(())
    }

    /// Drops every filter and the queue of `owner`.
    async fn release(&self, owner: DeviceId) -> Result<(), TransportError> {
        let owned: Vec<String> = {
            let mut routes = self.inner.routes.write();
            routes.links.remove(&owner);
            routes
                .filters
                .iter()
                .filter(|(_, owners)| owners.contains(&owner))
                .map(|(filter, _)| filter.clone())
                .collect()
        };
        self.unsubscribe(owner, &owned).await
    }

    /// Delivers a message to every link whose filters match `topic`.
    fn route_message(&self, topic: &str, payload: &str) {
        let routes = self.inner.routes.read();
        let owners: BTreeSet<DeviceId> = routes
            .filters
            .iter()
            .filter(|(filter, _)| topic_matches(filter, topic))
            .flat_map(|(_, owners)| owners.iter().copied())
            .collect();

        for owner in owners {
            let Some(tx) = routes.links.get(&owner) else {
                continue;
            };
            let message = Inbound::Message {
                topic: topic.to_string(),
                payload: payload.to_string(),
            };
            match tx.try_send(message) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(device = %owner, topic = %topic, "Inbound queue full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(device = %owner, topic = %topic, "Link closed, message dropped");
                }
            }
        }
    }

    /// Marks the connection down and tells every link.
    ///
    /// A link whose queue is full gets the notice as soon as it has room.
    fn connection_lost(&self, reason: &str) {
        self.inner.connected.store(false, Ordering::Release);
        let routes = self.inner.routes.read();
        for (owner, tx) in &routes.links {
            let notice = Inbound::ConnectionLost(reason.to_string());
            match tx.try_send(notice) {
                Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
                Err(mpsc::error::TrySendError::Full(notice)) => {
                    // the notice must not be dropped: wait for room off the event loop
                    tracing::debug!(device = %owner, "Inbound queue full, queueing loss notice");
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let _ = tx.send(notice).await;
                    });
                }
            }
        }
    }

    /// Disconnects from the broker and forgets every link.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        tracing::info!(
            host = %self.inner.config.host,
            port = %self.inner.config.port,
            "Disconnecting from MQTT broker"
        );
        {
            let mut routes = self.inner.routes.write();
            routes.filters.clear();
            routes.links.clear();
        }
        self.inner.connected.store(false, Ordering::Release);
        self.inner.client.disconnect().await?;
        Ok(())
    }
}

impl std::fmt::Debug for MqttConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConnection")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// One device's view of a shared [`MqttConnection`].
#[derive(Debug, Clone)]
pub struct MqttLink {
    owner: DeviceId,
    connection: MqttConnection,
}

impl MqttLink {
    /// Returns the device owning this link.
    #[must_use]
    pub fn owner(&self) -> DeviceId {
        self.owner
    }

    /// Returns the shared connection.
    #[must_use]
    pub fn connection(&self) -> &MqttConnection {
        &self.connection
    }
}

impl PubSub for MqttLink {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), Error> {
        Ok(self.connection.publish(topic, payload).await?)
    }

    async fn subscribe(&self, filters: &[String]) -> Result<(), Error> {
        Ok(self.connection.subscribe(self.owner, filters).await?)
    }

    async fn unsubscribe(&self, filters: &[String]) -> Result<(), Error> {
        Ok(self.connection.unsubscribe(self.owner, filters).await?)
    }

    async fn close(&self) -> Result<(), Error> {
        Ok(self.connection.release(self.owner).await?)
    }
}

/// Builder for an [`MqttConnection`].
#[derive(Debug, Default)]
pub struct MqttConnectionBuilder {
    config: MqttConfig,
}

impl MqttConnectionBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets how long to wait for the broker's ConnAck (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Connects to the broker.
    ///
    /// Returns once the broker has acknowledged the connection.
    ///
    /// # Errors
    ///
    /// Returns error if the host is empty, the event loop dies, or no
    /// ConnAck arrives within the connection timeout.
    pub async fn build(self) -> Result<MqttConnection, TransportError> {
        if self.config.host.is_empty() {
            return Err(TransportError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!("relaylink_{}_{}", std::process::id(), counter);

        let mut options = MqttOptions::new(&client_id, &self.config.host, self.config.port);
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(true);
        if let Some((ref username, ref password)) = self.config.credentials {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 32);
        let connection = MqttConnection {
            inner: Arc::new(Inner {
                client,
                config: self.config.clone(),
                connected: AtomicBool::new(false),
                routes: RwLock::new(Routes::default()),
                subscribe_lock: Mutex::new(()),
            }),
        };

        let (connack_tx, connack_rx) = oneshot::channel();
        let loop_connection = connection.clone();
        tokio::spawn(async move {
            handle_events(event_loop, loop_connection, connack_tx).await;
        });

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    "Connected to MQTT broker"
                );
                Ok(connection)
            }
            Ok(Err(_)) => Err(TransportError::ConnectionFailed(
                "MQTT event loop terminated before ConnAck".to_string(),
            )),
            Err(_) => Err(TransportError::ConnectionFailed(format!(
                "MQTT connection timeout after {}s",
                timeout.as_secs()
            ))),
        }
    }
}

/// Reads the broker until the connection fails.
///
/// The loop never awaits a device: routing only does non-blocking sends.
/// On any error the loop exits, which drops the event loop and closes the
/// socket. Reconnecting is up to the owner of the connection.
async fn handle_events(
    mut event_loop: EventLoop,
    connection: MqttConnection,
    connack_tx: oneshot::Sender<()>,
) {
    use rumqttc::{Event, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT connection acknowledged");
                connection.inner.connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match std::str::from_utf8(&publish.payload) {
                    Ok(payload) => {
                        tracing::debug!(topic = %publish.topic, payload = %payload, "MQTT message received");
                        connection.route_message(&publish.topic, payload);
                    }
                    Err(_) => {
                        tracing::debug!(topic = %publish.topic, "Ignoring non-UTF-8 payload");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker closed the connection");
                connection.connection_lost("broker sent disconnect");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "MQTT event loop error, closing connection");
                connection.connection_lost(&e.to_string());
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_default_values() {
        let builder = MqttConnectionBuilder::default();
        assert_eq!(builder.config.port, 1883);
        assert!(builder.config.host.is_empty());
        assert!(builder.config.credentials.is_none());
        assert_eq!(builder.config.keep_alive, Duration::from_secs(30));
        assert_eq!(builder.config.connection_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builder_chain() {
        let builder = MqttConnectionBuilder::default()
            .host("10.0.0.5")
            .port(8883)
            .credentials("espurna", "secret")
            .keep_alive(Duration::from_secs(45))
            .connection_timeout(Duration::from_secs(3));
        assert_eq!(builder.config.host, "10.0.0.5");
        assert_eq!(builder.config.port, 8883);
        assert_eq!(
            builder.config.credentials,
            Some(("espurna".to_string(), "secret".to_string()))
        );
        assert_eq!(builder.config.connection_timeout, Duration::from_secs(3));
    }

    /// Connection whose event loop is never polled.
    fn offline() -> MqttConnection {
        let (client, _event_loop) = AsyncClient::new(MqttOptions::new("test", "127.0.0.1", 1883), 8);
        MqttConnection {
            inner: Arc::new(Inner {
                client,
                config: MqttConfig::default(),
                connected: AtomicBool::new(true),
                routes: RwLock::new(Routes::default()),
                subscribe_lock: Mutex::new(()),
            }),
        }
    }

    fn watch(connection: &MqttConnection, owner: DeviceId, filter: &str) {
        connection
            .inner
            .routes
            .write()
            .filters
            .entry(filter.to_string())
            .or_default()
            .insert(owner);
    }

    #[tokio::test]
    async fn loss_notice_survives_full_queue() {
        let connection = offline();
        let owner = DeviceId::new();
        let (_link, mut inbound) = connection.link_with_capacity(owner, 1);
        watch(&connection, owner, "kitchen/relay/+");

        connection.route_message("kitchen/relay/0", "1");
        connection.connection_lost("broker died");
        assert!(!connection.is_connected());

        assert_eq!(
            inbound.recv().await,
            Some(Inbound::Message {
                topic: "kitchen/relay/0".to_string(),
                payload: "1".to_string(),
            })
        );
        assert_eq!(
            inbound.recv().await,
            Some(Inbound::ConnectionLost("broker died".to_string()))
        );
    }

    #[tokio::test]
    async fn new_owner_resubscribes_shared_filter() {
        // the event loop of an offline connection is gone, so any broker request fails
        let connection = offline();
        let kitchen = DeviceId::new();
        let porch = DeviceId::new();
        let filters = vec!["kitchen/relay/+".to_string()];
        watch(&connection, kitchen, "kitchen/relay/+");

        assert!(connection.subscribe(kitchen, &filters).await.is_ok());
        assert!(connection.subscribe(porch, &filters).await.is_err());

        let routes = connection.inner.routes.read();
        let owners = &routes.filters["kitchen/relay/+"];
        assert!(owners.contains(&kitchen));
        assert!(!owners.contains(&porch));
    }

    #[tokio::test]
    async fn routing_follows_filters() {
        let connection = offline();
        let kitchen = DeviceId::new();
        let porch = DeviceId::new();
        let (_k, mut kitchen_rx) = connection.link(kitchen);
        let (_p, mut porch_rx) = connection.link(porch);
        watch(&connection, kitchen, "kitchen/relay/+");
        watch(&connection, porch, "porch/relay/+");

        connection.route_message("porch/relay/0", "0");
        assert!(kitchen_rx.try_recv().is_err());
        assert!(matches!(porch_rx.try_recv(), Ok(Inbound::Message { .. })));
    }

    #[tokio::test]
    async fn missing_host_fails() {
        let err = MqttConnectionBuilder::default().build().await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn unreachable_broker_times_out_or_fails() {
        let result = MqttConnectionBuilder::default()
            .host("127.0.0.1")
            .port(1)
            .connection_timeout(Duration::from_millis(300))
            .build()
            .await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}
