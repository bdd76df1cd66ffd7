// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `RelayLink` library.
//!
//! Errors are split by where they are detected:
//!
//! - [`ValueError`]: malformed input rejected before any side effect
//!   (out-of-range values, bad HSV tuples, invalid topic characters)
//! - [`TransportError`]: the RPC channel or MQTT connection failed
//! - [`ValidationError`]: a response arrived but its payload is malformed
//! - [`DeviceError`]: the device refused or cannot accept the operation

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Input was rejected before reaching a transport.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The transport failed to carry the request.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A response payload failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The device refused or cannot accept the operation.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Neither persisted settings nor a network advertisement yield an endpoint.
    #[error("no usable endpoint: {0}")]
    UnresolvedEndpoint(String),

    /// Reading or writing persisted settings failed.
    #[error("settings error: {0}")]
    Settings(String),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// A normalized value is outside `[0, 1]` or not finite.
    #[error("normalized value {0} is out of range [0, 1]")]
    OutOfUnitRange(f64),

    /// A wire value is outside its native range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: i64,
    },

    /// A wire token could not be parsed.
    #[error("invalid wire token for {field}: {token:?}")]
    InvalidToken {
        /// What the token was supposed to encode.
        field: &'static str,
        /// The token as received.
        token: String,
    },

    /// An HSV tuple did not contain exactly three integers.
    #[error("invalid HSV tuple: {0:?}")]
    InvalidHsv(String),

    /// A topic contains characters that would break the topic grammar.
    #[error("invalid topic {0:?}: must be non-empty and contain no '/', '+' or '#'")]
    InvalidTopic(String),

    /// A capability name is not known at all.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// A device mode name is not known.
    #[error("unknown device mode: {0}")]
    UnknownMode(String),

    /// A control mode name is not known.
    #[error("unknown control mode: {0}")]
    UnknownControlMode(String),

    /// The value's kind does not match the capability (e.g. a float for `onoff`).
    #[error("capability {capability} expects a {expected} value")]
    KindMismatch {
        /// The capability being set.
        capability: String,
        /// The kind of value the capability accepts.
        expected: &'static str,
    },
}

/// Errors raised by the transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote side answered with a gRPC status.
    #[cfg(feature = "grpc")]
    #[error("RPC failed: {0}")]
    Status(#[from] tonic::Status),

    /// MQTT client request failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the server failed or was lost.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors raised while validating a response payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent.
    #[error("missing field in {method} response: {field}")]
    MissingField {
        /// The RPC method that produced the response.
        method: &'static str,
        /// The absent field.
        field: &'static str,
    },

    /// The response timestamp cannot be turned into an instant.
    #[error("malformed timestamp in {method} response: {detail}")]
    MalformedTimestamp {
        /// The RPC method that produced the response.
        method: &'static str,
        /// Why the timestamp was rejected.
        detail: String,
    },

    /// The response refers to a different relay than the request.
    #[error("{method} response is for relay {actual}, expected {expected}")]
    RelayMismatch {
        /// The RPC method that produced the response.
        method: &'static str,
        /// The relay addressed by the request.
        expected: u32,
        /// The relay named in the response.
        actual: u32,
    },
}

/// Errors related to device operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The capability does not exist for this device's mode.
    #[error("device mode {mode} does not support {capability}")]
    UnsupportedCapability {
        /// The capability that was requested.
        capability: String,
        /// The device mode.
        mode: String,
    },

    /// The operation only exists on another transport.
    #[error("{operation} is not supported by this device")]
    UnsupportedOperation {
        /// The operation that was requested.
        operation: &'static str,
    },

    /// The device lost its transport and accepts no further commands.
    #[error("device is unavailable: {0}")]
    Unavailable(String),

    /// The device has not finished starting.
    #[error("device is not ready")]
    NotReady,

    /// The hardware reported that it did not carry out the command.
    #[error("relay {relay} rejected the command")]
    CommandRejected {
        /// The relay that rejected the command.
        relay: u32,
    },

    /// The server refused to rename the relay.
    #[error("relay {relay} could not be renamed to {name:?}")]
    RenameRejected {
        /// The relay being renamed.
        relay: u32,
        /// The requested name.
        name: String,
    },

    /// The device task has stopped.
    #[error("device task has stopped")]
    Stopped,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
