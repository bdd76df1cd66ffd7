// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport adapters.
//!
//! Two kinds of channel reach the hardware:
//!
//! - [`RelayRpc`]: unary request/response calls to a relay board service,
//!   implemented over gRPC by [`GrpcRelayClient`]
//! - [`PubSub`]: topic-addressed publish/subscribe, implemented over MQTT by
//!   [`MqttLink`] on a shared [`MqttConnection`]
//!
//! Reconcilers are generic over these traits, so tests drive them with
//! in-memory transports.

#[cfg(feature = "grpc")]
mod grpc;
#[cfg(feature = "mqtt")]
mod mqtt;
pub mod rpc;
mod topic;

use std::future::Future;
use std::sync::Arc;

#[cfg(feature = "grpc")]
pub use grpc::{DEFAULT_SERVICE, GrpcConfig, GrpcRelayClient};
#[cfg(feature = "mqtt")]
pub use mqtt::{DEFAULT_LINK_CAPACITY, MqttConnection, MqttConnectionBuilder, MqttLink};
pub use rpc::{RelayAck, RelayItem, RenameAck};
pub use topic::{DeviceTopic, ParsedTopic, Subtopic, subscriptions_for, topic_matches};

use crate::error::Error;

/// Calls to a relay board service.
///
/// Implementations validate responses before returning them, so a
/// malformed payload surfaces as [`Error::Validation`] and a failed call as
/// [`Error::Transport`]. Calls are never retried.
pub trait RelayRpc: Send + Sync + 'static {
    /// Lists relays, or only `relay` when given.
    fn enumerate(
        &self,
        relay: Option<u32>,
    ) -> impl Future<Output = Result<Vec<RelayItem>, Error>> + Send;

    /// Switches a relay.
    fn set_relay(
        &self,
        relay: u32,
        state: bool,
    ) -> impl Future<Output = Result<RelayAck, Error>> + Send;

    /// Renames a relay on the server.
    fn rename_relay(
        &self,
        relay: u32,
        new_name: &str,
    ) -> impl Future<Output = Result<RenameAck, Error>> + Send;
}

impl<T: RelayRpc> RelayRpc for Arc<T> {
    fn enumerate(
        &self,
        relay: Option<u32>,
    ) -> impl Future<Output = Result<Vec<RelayItem>, Error>> + Send {
        (**self).enumerate(relay)
    }

    fn set_relay(
        &self,
        relay: u32,
        state: bool,
    ) -> impl Future<Output = Result<RelayAck, Error>> + Send {
        (**self).set_relay(relay, state)
    }

    fn rename_relay(
        &self,
        relay: u32,
        new_name: &str,
    ) -> impl Future<Output = Result<RenameAck, Error>> + Send {
        (**self).rename_relay(relay, new_name)
    }
}

/// Topic-addressed messaging for one device.
///
/// Inbound messages are not returned from these calls; they arrive as
/// [`Inbound`] values on the queue handed out with the link.
pub trait PubSub: Send + Sync + 'static {
    /// Publishes `payload` on `topic`.
    fn publish(&self, topic: &str, payload: &str)
    -> impl Future<Output = Result<(), Error>> + Send;

    /// Adds topic filters.
    fn subscribe(&self, filters: &[String]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes topic filters.
    fn unsubscribe(&self, filters: &[String]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Releases every filter and stops delivery.
    fn close(&self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Something delivered to a device by its pub/sub link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A message on one of the device's filters.
    Message {
        /// Full topic.
        topic: String,
        /// UTF-8 payload.
        payload: String,
    },
    /// The shared connection failed and was closed.
    ConnectionLost(String),
}
