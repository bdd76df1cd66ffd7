// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! gRPC client for the relay board service.
//!
//! # Examples
//!
//! ```no_run
//! use relaylink_lib::protocol::{GrpcConfig, GrpcRelayClient, RelayRpc};
//!
//! # async fn example() -> relaylink_lib::Result<()> {
//! let client = GrpcRelayClient::new(GrpcConfig::new("192.168.1.20", 50051));
//!
//! // The channel is opened by the first call and reused afterwards.
//! for relay in client.enumerate(None).await? {
//!     println!("{} {} {}", relay.relay, relay.name, relay.state);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::OnceCell;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};

use crate::error::{Error, TransportError};
use crate::protocol::RelayRpc;
use crate::protocol::rpc::{
    GetRelaysRequest, GetRelaysResponse, RelayAck, RelayItem, RenameAck, RenameRelayRequest,
    RenameRelayResponse, SetRelayRequest, SetRelayResponse, validate_rename_relay,
    validate_set_relay,
};

/// Default fully-qualified service name.
pub const DEFAULT_SERVICE: &str = "com.github.daviwil2.grpc.v1.PiRelayService";

/// Connection settings for [`GrpcRelayClient`].
#[derive(Debug, Clone)]
pub struct GrpcConfig {
    host: String,
    port: u16,
    service: String,
    timeout: Duration,
    connect_timeout: Duration,
}

impl GrpcConfig {
    /// Creates a configuration for `host:port` with default timeouts.
    ///
    /// Defaults: 10 s per call, 5 s to connect.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            service: DEFAULT_SERVICE.to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Overrides the service name used in method paths.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the server port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Relay service client.
///
/// The underlying channel is opened on first use and kept for the lifetime
/// of the client. Failed calls are never retried.
#[derive(Debug)]
pub struct GrpcRelayClient {
    config: GrpcConfig,
    channel: OnceCell<Grpc<Channel>>,
}

impl GrpcRelayClient {
    /// Creates a client. No connection is made until the first call.
    #[must_use]
    pub fn new(config: GrpcConfig) -> Self {
        Self {
            config,
            channel: OnceCell::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GrpcConfig {
        &self.config
    }

    /// Returns `true` once the channel has been opened.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.channel.initialized()
    }

    async fn grpc(&self) -> Result<Grpc<Channel>, TransportError> {
        let grpc = self
            .channel
            .get_or_try_init(|| async {
                let uri = format!("http://{}:{}", self.config.host, self.config.port);
                tracing::info!(uri = %uri, "Opening gRPC channel");
                let channel = Endpoint::from_shared(uri.clone())
                    .map_err(|e| TransportError::InvalidAddress(format!("{uri}: {e}")))?
                    .connect_timeout(self.config.connect_timeout)
                    .connect()
                    .await
                    .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
                Ok::<_, TransportError>(Grpc::new(channel))
            })
            .await?;
        Ok(grpc.clone())
    }

    async fn unary<Req, Resp>(&self, method: &'static str, request: Req) -> Result<Resp, Error>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let path = PathAndQuery::try_from(format!("/{}/{method}", self.config.service))
            .map_err(|e| TransportError::InvalidAddress(e.to_string()))?;
        let timeout = self.config.timeout;

        let call = async {
            let mut grpc = self.grpc().await?;
            grpc.ready()
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            tracing::debug!(method, "gRPC call");
            let response = grpc
                .unary(tonic::Request::new(request), path, ProstCodec::default())
                .await?;
            Ok::<Resp, TransportError>(response.into_inner())
        };

        let response = tokio::time::timeout(timeout, call).await.map_err(|_| {
            // Safe: timeouts are seconds, far below u64::MAX milliseconds
            #[allow(clippy::cast_possible_truncation)]
            let millis = timeout.as_millis() as u64;
            TransportError::Timeout(millis)
        })?;
        response.map_err(|e| {
            tracing::warn!(method, error = %e, "gRPC call failed");
            Error::from(e)
        })
    }
}

impl RelayRpc for GrpcRelayClient {
    async fn enumerate(&self, relay: Option<u32>) -> Result<Vec<RelayItem>, Error> {
        let response: GetRelaysResponse = self
            .unary("GetRelays", GetRelaysRequest { relay })
            .await?;
        Ok(response.pi_relays.into_iter().map(RelayItem::from).collect())
    }

    async fn set_relay(&self, relay: u32, state: bool) -> Result<RelayAck, Error> {
        let response: SetRelayResponse = self
            .unary("SetRelay", SetRelayRequest { relay, state })
            .await?;
        let ack = validate_set_relay(relay, response)?;
        tracing::debug!(relay, at = %ack.timestamp, succeeded = ack.succeeded, "SetRelay answered");
        Ok(ack)
    }

    async fn rename_relay(&self, relay: u32, new_name: &str) -> Result<RenameAck, Error> {
        let request = RenameRelayRequest {
            relay,
            new_name: new_name.to_string(),
        };
        let response: RenameRelayResponse = self.unary("RenameRelay", request).await?;
        let ack = validate_rename_relay(relay, response)?;
        tracing::debug!(relay, at = %ack.timestamp, succeeded = ack.succeeded, "RenameRelay answered");
        Ok(ack)
    }
}
